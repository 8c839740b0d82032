// SPDX-License-Identifier: MIT
//
// ttx-render: the render core of the ttx terminal multiplexer.
//
// Producers (pane emulators, the status line, the compositor) describe the
// screen as an immutable Snapshot: a grid of styled cells plus a cursor,
// tagged with a sequence number. The render thread owns the terminal. It
// diffs each snapshot against the last one it actually wrote, turns the
// difference into the fewest escape sequences it can, and writes the whole
// frame with a single write.
//
// Layers, bottom up:
//
//   color, cell, grid   screen model
//   snapshot            immutable, cheaply cloned frames
//   diff                snapshot pair -> UpdatePlan (terminal-agnostic ops)
//   ansi, encode        UpdatePlan -> bytes, adapted to Capabilities
//   output, render      one frame buffer, prepare / flush / commit
//   thread              latest-wins mailbox and the render thread
//   terminal            raw mode and alternate screen for a driver

pub mod ansi;
pub mod cell;
pub mod color;
pub mod config;
pub mod diff;
pub mod encode;
pub mod error;
pub mod grid;
pub mod output;
pub mod render;
pub mod snapshot;
pub mod terminal;
pub mod thread;

pub use ansi::CursorShape;
pub use cell::{Attr, Cell, Style, UnderlineStyle};
pub use color::Color;
pub use config::RenderConfig;
pub use diff::{Op, TerminalState, UpdatePlan};
pub use encode::{Capabilities, ColorDepth, Encoder};
pub use error::{Error, Result};
pub use grid::{Cursor, Grid};
pub use render::{RenderStats, Renderer};
pub use snapshot::Snapshot;
pub use thread::{RenderHandle, RenderState, RenderThread, Report};
