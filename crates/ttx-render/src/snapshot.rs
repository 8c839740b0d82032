// SPDX-License-Identifier: MIT
//
// Snapshot: an immutable, sequenced screen.
//
// Producers (the compositor) build a Grid, freeze it into a Snapshot with the
// next sequence number, and submit it. The grid sits behind an `Arc`, so the
// render thread and any producer that wants to keep a copy share one
// allocation and nobody can mutate it after submission.

use std::sync::Arc;

use crate::grid::{Cursor, Grid};

/// An immutable grid tagged with a monotonically increasing sequence number.
///
/// # Examples
///
/// ```
/// use ttx_render::grid::Grid;
/// use ttx_render::snapshot::Snapshot;
///
/// let snap = Snapshot::new(1, Grid::new(24, 80));
/// let copy = snap.clone();
/// assert_eq!(copy.seq(), 1);
/// assert_eq!((copy.rows(), copy.cols()), (24, 80));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    seq: u64,
    grid: Arc<Grid>,
}

impl Snapshot {
    /// Freeze `grid` under sequence number `seq`.
    #[must_use]
    pub fn new(seq: u64, grid: Grid) -> Self {
        Self {
            seq,
            grid: Arc::new(grid),
        }
    }

    /// The all-default screen: blank cells, visible cursor at the origin.
    ///
    /// This is what a terminal looks like right after a clear, and the
    /// baseline the full repaint path diffs against.
    #[must_use]
    pub fn blank(seq: u64, rows: u16, cols: u16) -> Self {
        Self::new(seq, Grid::new(rows, cols))
    }

    /// Sequence number.
    #[inline]
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// The frozen grid.
    #[inline]
    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    /// Height in rows.
    #[inline]
    #[must_use]
    pub fn rows(&self) -> u16 {
        self.grid.rows()
    }

    /// Width in columns.
    #[inline]
    #[must_use]
    pub fn cols(&self) -> u16 {
        self.grid.cols()
    }

    /// `(rows, cols)`.
    #[inline]
    #[must_use]
    pub fn size(&self) -> (u16, u16) {
        self.grid.size()
    }

    /// The target cursor.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> Cursor {
        self.grid.cursor()
    }
}
