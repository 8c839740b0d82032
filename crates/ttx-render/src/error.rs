// SPDX-License-Identifier: MIT
//
// Error types for the render core.
//
// Three families, handled differently by the render thread:
//
//   - Invariant violations (bad palette index, mismatched dimensions, broken
//     wide-char pairs) are bugs in whoever built the snapshot. The offending
//     snapshot is rejected and the committed state is left untouched.
//
//   - Staleness is expected when several producers race. It is reported so
//     callers can see it, but it is a no-op and never surfaces to the user.
//
//   - Output failures are fatal to the render thread. Nothing is retried: a
//     half-written escape sequence on a terminal is worse than a dead one.

use std::io;

use thiserror::Error;

/// Error type for render core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Palette index outside `0..=255`.
    #[error("invalid color index: {0} (palette has 256 entries)")]
    InvalidColorIndex(u16),

    /// Two screens of different size were handed to the incremental diff,
    /// or a snapshot does not match the declared terminal size.
    #[error("dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        /// Expected `(rows, cols)`.
        expected: (u16, u16),
        /// Actual `(rows, cols)`.
        actual: (u16, u16),
    },

    /// A wide cell without its continuation, or a continuation without its
    /// wide cell, or a continuation that changed while its lead did not.
    #[error("invalid wide character pairing at row {row}, col {col}")]
    InvalidWideCharPairing {
        /// Row of the offending cell.
        row: u16,
        /// Column of the offending cell.
        col: u16,
    },

    /// Snapshot sequence number is not newer than what is already committed
    /// or pending.
    #[error("stale snapshot: seq {seq} is not newer than {latest}")]
    StaleSnapshot {
        /// Sequence number of the rejected snapshot.
        seq: u64,
        /// Newest sequence number already accepted.
        latest: u64,
    },

    /// Writing a frame to the output sink failed.
    #[error("output write failure: {0}")]
    OutputWriteFailure(#[source] io::Error),

    /// The render thread no longer accepts work.
    #[error("render thread is shut down")]
    ShutDown,

    /// The render thread is in the failed state and needs a reset.
    #[error("render thread failed; reset required")]
    Failed,

    /// The render thread did not finish within the shutdown timeout.
    #[error("render thread did not stop within the shutdown timeout")]
    ShutdownTimeout,

    /// Invalid configuration.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error outside the frame write path (thread spawn, terminal setup).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Whether this condition is part of normal operation and should be
    /// ignored by callers.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::StaleSnapshot { .. })
    }

    /// Whether the snapshot that caused this error is at fault (as opposed to
    /// the thread or the output stream).
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidColorIndex(_)
                | Self::DimensionMismatch { .. }
                | Self::InvalidWideCharPairing { .. }
        )
    }
}

/// Result alias for render core operations.
pub type Result<T> = std::result::Result<T, Error>;
