// SPDX-License-Identifier: MIT
//
// Grid: the composited screen a snapshot is made of.
//
// The compositor blits each pane into one Grid, draws borders on top, places
// the cursor, and hands the result to the render thread. The diff engine then
// compares it row by row against the last committed Grid.
//
// Design:
//
//   - Flat `Vec<Cell>` with row-major indexing: `index = row * cols + col`.
//     A row's cells are contiguous, so the diff engine's row-skip is a single
//     slice comparison.
//
//   - Wide characters (CJK, emoji) occupy two columns: the lead cell and a
//     continuation cell. Every mutating method keeps pairs intact. Writing
//     over either half blanks the other half; a wide grapheme that does not
//     fit at the right edge is replaced by a blank.
//
//   - The cursor is part of the screen state and always sits inside the
//     grid. Zero-area grids keep it at (0, 0).

use std::fmt;

use unicode_segmentation::UnicodeSegmentation;

use crate::ansi::CursorShape;
use crate::cell::{Cell, Style};
use crate::error::{Error, Result};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Where the terminal cursor should be shown, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cursor {
    /// Zero-based row.
    pub row: u16,
    /// Zero-based column.
    pub col: u16,
    /// Whether the cursor is shown.
    pub visible: bool,
    /// DECSCUSR shape.
    pub shape: CursorShape,
}

impl Cursor {
    /// Visible cursor with the terminal's default shape at `(row, col)`.
    #[inline]
    #[must_use]
    pub const fn at(row: u16, col: u16) -> Self {
        Self {
            row,
            col,
            visible: true,
            shape: CursorShape::Default,
        }
    }

    /// Same cursor, hidden.
    #[inline]
    #[must_use]
    pub const fn hidden(self) -> Self {
        Self {
            visible: false,
            ..self
        }
    }

    /// Same cursor with a different shape.
    #[inline]
    #[must_use]
    pub const fn with_shape(self, shape: CursorShape) -> Self {
        Self { shape, ..self }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::at(0, 0)
    }
}

// ─── Grid ────────────────────────────────────────────────────────────────────

/// A fixed-size 2D array of cells plus a cursor.
///
/// # Examples
///
/// ```
/// use ttx_render::cell::Style;
/// use ttx_render::grid::Grid;
///
/// let mut grid = Grid::new(24, 80);
/// let written = grid.put_str(0, 0, "hello 世界", Style::default());
/// assert_eq!(written, 10);
/// assert_eq!(grid.row_text(0).trim_end(), "hello 世界");
/// assert!(grid.get(0, 7).unwrap().is_continuation());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Grid {
    rows: u16,
    cols: u16,
    cells: Vec<Cell>,
    cursor: Cursor,
}

impl Grid {
    // ─── Construction ────────────────────────────────────────────────────

    /// Create a grid of blank cells with the cursor at the origin.
    #[must_use]
    pub fn new(rows: u16, cols: u16) -> Self {
        let size = usize::from(rows) * usize::from(cols);
        Self {
            rows,
            cols,
            cells: vec![Cell::BLANK; size],
            cursor: Cursor::default(),
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Height in rows.
    #[inline]
    #[must_use]
    pub const fn rows(&self) -> u16 {
        self.rows
    }

    /// Width in columns.
    #[inline]
    #[must_use]
    pub const fn cols(&self) -> u16 {
        self.cols
    }

    /// `(rows, cols)`, the shape used in dimension errors.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> (u16, u16) {
        (self.rows, self.cols)
    }

    /// Whether the grid has no cells at all.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Whether `(row, col)` is inside the grid.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, row: u16, col: u16) -> bool {
        row < self.rows && col < self.cols
    }

    #[inline]
    const fn index(&self, row: u16, col: u16) -> usize {
        row as usize * self.cols as usize + col as usize
    }

    /// Get a cell, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, row: u16, col: u16) -> Option<&Cell> {
        if self.in_bounds(row, col) {
            Some(&self.cells[self.index(row, col)])
        } else {
            None
        }
    }

    /// A single row as a slice, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        if row < self.rows {
            let start = self.index(row, 0);
            Some(&self.cells[start..start + usize::from(self.cols)])
        } else {
            None
        }
    }

    /// All rows, top to bottom.
    pub fn row_slices(&self) -> impl Iterator<Item = &[Cell]> {
        // chunks_exact panics on zero; an empty grid has no cells anyway.
        self.cells.chunks_exact(usize::from(self.cols).max(1))
    }

    /// The raw cell slice.
    #[inline]
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// The text of a row, continuation cells omitted. Handy in tests and logs.
    #[must_use]
    pub fn row_text(&self, row: u16) -> String {
        let mut out = String::new();
        for cell in self.row(row).unwrap_or_default() {
            cell.push_grapheme(&mut out);
        }
        out
    }

    // ─── Cursor ──────────────────────────────────────────────────────────

    /// The cursor.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Place the cursor, clamping its position into the grid.
    pub fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = Cursor {
            row: cursor.row.min(self.rows.saturating_sub(1)),
            col: cursor.col.min(self.cols.saturating_sub(1)),
            ..cursor
        };
    }

    // ─── Clear & Fill ────────────────────────────────────────────────────

    /// Reset every cell to blank. The cursor is left alone.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    /// Reset every cell to a space with the given style.
    pub fn fill(&mut self, style: Style) {
        self.cells.fill(Cell::blank(style));
    }

    // ─── Direct Cell Access ──────────────────────────────────────────────

    /// Write a cell with wide-character cleanup.
    ///
    /// Writing over either half of an existing wide pair blanks the other
    /// half. A wide cell also claims the next column for its continuation;
    /// a wide cell in the last column is replaced by a blank. Continuation
    /// cells cannot be written on their own.
    ///
    /// Returns `true` if the position was in bounds and the write happened.
    pub fn set(&mut self, row: u16, col: u16, cell: Cell) -> bool {
        if !self.in_bounds(row, col) || cell.is_continuation() {
            return false;
        }

        self.break_wide_char_at(row, col);
        let idx = self.index(row, col);

        if cell.is_wide() {
            if col + 1 >= self.cols {
                self.cells[idx] = Cell::blank(cell.style);
                return true;
            }
            self.break_wide_char_at(row, col + 1);
            self.cells[idx + 1] = Cell::continuation(cell.style);
        }

        self.cells[idx] = cell;
        true
    }

    /// Write a cell verbatim, without wide-character cleanup.
    ///
    /// This can break pairing; [`validate`](Self::validate) and the diff
    /// engine report the result. Meant for compositors that copy cells
    /// they already trust, and for exercising those error paths.
    pub fn set_raw(&mut self, row: u16, col: u16, cell: Cell) -> bool {
        if !self.in_bounds(row, col) {
            return false;
        }
        let idx = self.index(row, col);
        self.cells[idx] = cell;
        true
    }

    /// Break any wide character that touches `(row, col)`.
    fn break_wide_char_at(&mut self, row: u16, col: u16) {
        let idx = self.index(row, col);

        if self.cells[idx].is_continuation() && col > 0 && self.cells[idx - 1].is_wide() {
            let style = self.cells[idx - 1].style;
            self.cells[idx - 1] = Cell::blank(style);
        }

        if self.cells[idx].is_wide() && col + 1 < self.cols && self.cells[idx + 1].is_continuation()
        {
            let style = self.cells[idx + 1].style;
            self.cells[idx + 1] = Cell::blank(style);
        }
    }

    // ─── Text ────────────────────────────────────────────────────────────

    /// Write a string starting at `(row, col)`.
    ///
    /// The text is split into extended grapheme clusters, so combining marks
    /// and ZWJ sequences land in a single cell. Writing stops at the right
    /// edge; a wide grapheme that would straddle it is replaced by a blank.
    ///
    /// Returns the number of columns written.
    pub fn put_str(&mut self, row: u16, col: u16, text: &str, style: Style) -> u16 {
        if row >= self.rows {
            return 0;
        }

        let mut at = col;
        for grapheme in text.graphemes(true) {
            if at >= self.cols {
                break;
            }
            let cell = Cell::styled(grapheme, style);
            let width = u16::from(cell.width());
            if width == 2 && at + 1 >= self.cols {
                self.set(row, at, Cell::blank(style));
                at += 1;
                break;
            }
            self.set(row, at, cell);
            at += width;
        }
        at - col
    }

    // ─── Composition ─────────────────────────────────────────────────────

    /// Copy `src` into this grid with its top-left at `(row, col)`.
    ///
    /// Clipped at the right and bottom edges. Wide pairs that would be cut by
    /// the right edge become blanks. The cursor is not copied.
    pub fn blit(&mut self, src: &Self, row: u16, col: u16) {
        for (src_row, cells) in src.row_slices().enumerate() {
            let Ok(src_row) = u16::try_from(src_row) else {
                break;
            };
            let dst_row = row.saturating_add(src_row);
            if dst_row >= self.rows {
                break;
            }
            for (src_col, cell) in cells.iter().enumerate() {
                let Ok(src_col) = u16::try_from(src_col) else {
                    break;
                };
                let dst_col = col.saturating_add(src_col);
                if dst_col >= self.cols {
                    break;
                }
                // Continuations are placed by their lead.
                if !cell.is_continuation() {
                    self.set(dst_row, dst_col, cell.clone());
                }
            }
        }
    }

    // ─── Resize ──────────────────────────────────────────────────────────

    /// Change dimensions, keeping the overlapping top-left region.
    ///
    /// New cells are blank. A wide character whose continuation falls off the
    /// new right edge becomes a blank. The cursor is clamped.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        if rows == self.rows && cols == self.cols {
            return;
        }

        let mut next = Self::new(rows, cols);
        let keep_rows = rows.min(self.rows);
        let keep_cols = usize::from(cols.min(self.cols));

        for r in 0..keep_rows {
            let src = self.index(r, 0);
            let dst = next.index(r, 0);
            next.cells[dst..dst + keep_cols].clone_from_slice(&self.cells[src..src + keep_cols]);

            if keep_cols > 0 {
                let last = dst + keep_cols - 1;
                if next.cells[last].is_wide() && keep_cols == usize::from(cols) {
                    let style = next.cells[last].style;
                    next.cells[last] = Cell::blank(style);
                }
            }
        }

        next.set_cursor(self.cursor);
        *self = next;
    }

    // ─── Validation ──────────────────────────────────────────────────────

    /// Check that every wide cell is followed by exactly one continuation
    /// and every continuation follows a wide cell.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWideCharPairing`] at the first offending cell.
    pub fn validate(&self) -> Result<()> {
        for (r, cells) in self.row_slices().enumerate() {
            check_row(cells, u16::try_from(r).unwrap_or(u16::MAX))?;
        }
        Ok(())
    }
}

/// Check wide-character pairing in one row.
pub(crate) fn check_row(cells: &[Cell], row: u16) -> Result<()> {
    let mut col = 0;
    while col < cells.len() {
        let cell = &cells[col];
        let at = u16::try_from(col).unwrap_or(u16::MAX);
        if cell.is_continuation() {
            return Err(Error::InvalidWideCharPairing { row, col: at });
        }
        if cell.is_wide() {
            if !cells.get(col + 1).is_some_and(Cell::is_continuation) {
                return Err(Error::InvalidWideCharPairing { row, col: at });
            }
            col += 2;
        } else {
            col += 1;
        }
    }
    Ok(())
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Grid({}x{}, {:?})", self.rows, self.cols, self.cursor)?;
        for r in 0..self.rows {
            writeln!(f, "  |{}|", self.row_text(r))?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
