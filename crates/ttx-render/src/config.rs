// SPDX-License-Identifier: MIT
//
// Render thread configuration.
//
// Everything has a default, and a config file only needs to name what it
// changes:
//
//   min_frame_interval_ms = 16
//
//   [capabilities]
//   color_depth = "indexed256"

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::encode::Capabilities;
use crate::error::{Error, Result};

/// Default pacing: at most ~120 frames per second.
pub const DEFAULT_MIN_FRAME_INTERVAL_MS: u64 = 8;

/// Default bound on how long shutdown waits for the last frame.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 500;

/// Settings for the render thread and its encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Minimum time between the starts of two write cycles. Snapshots that
    /// arrive in between coalesce. Zero disables pacing.
    pub min_frame_interval_ms: u64,
    /// How long `shutdown` waits for the final frame before giving up.
    pub shutdown_timeout_ms: u64,
    /// Terminal capabilities used by the encoder.
    pub capabilities: Capabilities,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_frame_interval_ms: DEFAULT_MIN_FRAME_INTERVAL_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            capabilities: Capabilities::default(),
        }
    }
}

impl RenderConfig {
    /// Parse from TOML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed TOML or unknown values.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    /// [`min_frame_interval_ms`](Self::min_frame_interval_ms) as a `Duration`.
    #[must_use]
    pub const fn min_frame_interval(&self) -> Duration {
        Duration::from_millis(self.min_frame_interval_ms)
    }

    /// [`shutdown_timeout_ms`](Self::shutdown_timeout_ms) as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Same config with other capabilities.
    #[must_use]
    pub const fn with_capabilities(self, capabilities: Capabilities) -> Self {
        Self {
            capabilities,
            ..self
        }
    }
}
