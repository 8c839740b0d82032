// SPDX-License-Identifier: MIT
//
// Diff engine: turns two snapshots into a minimal update plan.
//
// Instead of redrawing the screen every frame, we compare the new snapshot
// against the last committed one and describe only what changed: where to
// move, which style to switch to, which text to write. In a multiplexer most
// frames touch a handful of cells (one pane's cursor line, a clock in a
// status bar), so this turns a full repaint into a surgical update.
//
// The output is an `UpdatePlan`, a list of abstract ops. Turning ops into
// bytes is the encoder's job; keeping the two apart makes the plan easy to
// assert on and lets the byte dialect vary with terminal capabilities.
//
// Optimizations:
//
//   - Row-level skip: unchanged rows are detected with one slice comparison
//     and never walked cell by cell.
//   - Gap bridging: two changed spans separated by up to 3 unchanged cells
//     that already have the running style are merged, since rewriting those
//     cells is no longer than a cursor move.
//   - Sequential writes: the believed cursor ("pen") is tracked, so runs that
//     continue where the previous write stopped need no move.
//   - Erase-to-end-of-line: a changed tail of 4 or more blank cells with
//     nothing but blanks after it becomes one EL instead of spaces.
//
// Wide characters are units: a lead cell plus its continuation. A unit is
// written whole or not at all; no op ever targets the continuation column.

use std::fmt;

use crate::ansi::{self, CursorShape};
use crate::cell::{Cell, Style};
use crate::error::{Error, Result};
use crate::grid::{Cursor, Grid, check_row};
use crate::snapshot::Snapshot;

/// Longest run of unchanged cells that may be rewritten to join two spans.
const MAX_BRIDGE: usize = 3;

/// Shortest blank tail worth replacing with EL.
const MIN_ERASE: usize = 4;

// ─── Op ──────────────────────────────────────────────────────────────────────

/// One step of an update plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Reset the pen style and clear the whole screen.
    ClearScreen,
    /// Place the cursor.
    MoveTo {
        /// Zero-based row.
        row: u16,
        /// Zero-based column.
        col: u16,
    },
    /// Switch the active style.
    SetStyle(Style),
    /// Write graphemes at the cursor in the active style.
    Text {
        /// Concatenated graphemes.
        text: String,
        /// Columns covered, counting both halves of wide characters.
        width: u16,
    },
    /// Erase from the cursor to the end of the line. Always preceded by
    /// a switch to the default style.
    EraseToEndOfLine,
    /// Make the cursor visible.
    ShowCursor,
    /// Hide the cursor.
    HideCursor,
    /// Change the cursor shape.
    SetCursorShape(CursorShape),
}

// ─── TerminalState ───────────────────────────────────────────────────────────

/// What we believe about the real terminal's cursor. `None` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminalState {
    /// Cursor position `(row, col)`.
    pub position: Option<(u16, u16)>,
    /// Cursor visibility.
    pub visible: Option<bool>,
    /// Cursor shape.
    pub shape: Option<CursorShape>,
}

impl TerminalState {
    /// Nothing known: the state after startup, a write failure, or a reset.
    pub const UNKNOWN: Self = Self {
        position: None,
        visible: None,
        shape: None,
    };

    /// Fully known state matching `cursor`.
    #[must_use]
    pub const fn from_cursor(cursor: Cursor) -> Self {
        Self {
            position: Some((cursor.row, cursor.col)),
            visible: Some(cursor.visible),
            shape: Some(cursor.shape),
        }
    }
}

// ─── UpdatePlan ──────────────────────────────────────────────────────────────

/// Counters from one diff pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiffStats {
    /// Cells written by `Text` ops or cleared by `EraseToEndOfLine`.
    pub cells_rendered: usize,
    /// Cells left alone.
    pub cells_skipped: usize,
    /// Rows skipped without a cell walk.
    pub rows_skipped: usize,
}

/// The ordered ops that take the terminal from the previous screen to the
/// current one.
#[derive(Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    /// Ops in emission order.
    pub ops: Vec<Op>,
    /// Grid height.
    pub rows: u16,
    /// Grid width.
    pub cols: u16,
    /// Believed cursor position before the first op.
    pub origin: Option<(u16, u16)>,
    /// Target cursor.
    pub cursor: Cursor,
    /// What the terminal's cursor state is once the plan is applied.
    pub after: TerminalState,
    /// Counters.
    pub stats: DiffStats,
}

impl UpdatePlan {
    /// Whether the plan does nothing.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Whether this is a full repaint (starts by clearing the screen).
    #[inline]
    #[must_use]
    pub fn is_repaint(&self) -> bool {
        self.ops.first() == Some(&Op::ClearScreen)
    }
}

impl fmt::Debug for UpdatePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "UpdatePlan({}x{}, origin {:?}) [", self.rows, self.cols, self.origin)?;
        for op in &self.ops {
            writeln!(f, "  {op:?}")?;
        }
        write!(f, "]")
    }
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Compute the ops that turn `previous` into `current` on a terminal whose
/// cursor state is `terminal`.
///
/// Pure: no I/O, no shared state.
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] when the snapshots differ in size.
/// - [`Error::InvalidWideCharPairing`] when a compared row breaks the
///   wide-character invariant, or a wide character's continuation changed
///   while its lead did not.
pub fn diff(previous: &Snapshot, current: &Snapshot, terminal: TerminalState) -> Result<UpdatePlan> {
    diff_grids(previous.grid(), current.grid(), terminal)
}

/// The full repaint path: clear the screen, then draw `current` over a blank
/// screen with nothing assumed about the cursor.
///
/// # Errors
///
/// [`Error::InvalidWideCharPairing`] when `current` breaks the wide-character
/// invariant.
pub fn repaint(current: &Snapshot) -> Result<UpdatePlan> {
    let (rows, cols) = current.size();
    let blank = Grid::new(rows, cols);
    let mut plan = diff_grids(&blank, current.grid(), TerminalState::UNKNOWN)?;
    plan.ops.insert(0, Op::ClearScreen);
    Ok(plan)
}

fn diff_grids(prev: &Grid, curr: &Grid, terminal: TerminalState) -> Result<UpdatePlan> {
    if prev.size() != curr.size() {
        return Err(Error::DimensionMismatch {
            expected: prev.size(),
            actual: curr.size(),
        });
    }

    let (rows, cols) = curr.size();
    let cursor = curr.cursor();
    let total = usize::from(rows) * usize::from(cols);

    if curr.is_empty() {
        return Ok(UpdatePlan {
            ops: Vec::new(),
            rows,
            cols,
            origin: terminal.position,
            cursor,
            after: terminal,
            stats: DiffStats::default(),
        });
    }

    let mut planner = Planner::new(cols, terminal.position);

    for (row, (prev_row, curr_row)) in (0..rows).zip(prev.row_slices().zip(curr.row_slices())) {
        if prev_row == curr_row {
            planner.stats.rows_skipped += 1;
            continue;
        }
        planner.diff_row(row, prev_row, curr_row)?;
    }

    planner.set_style(Style::DEFAULT);
    planner.place_cursor(cursor, terminal);

    let mut stats = planner.stats;
    stats.cells_skipped = total.saturating_sub(stats.cells_rendered);

    Ok(UpdatePlan {
        ops: planner.ops,
        rows,
        cols,
        origin: terminal.position,
        cursor,
        after: TerminalState::from_cursor(cursor),
        stats,
    })
}

// ─── Planner ─────────────────────────────────────────────────────────────────

/// Running state while a plan is built.
struct Planner {
    ops: Vec<Op>,
    cols: u16,
    /// Believed cursor position; `None` after writing into the last column.
    pen: Option<(u16, u16)>,
    /// Style the terminal is in. Plans start and end in the default style.
    active: Style,
    stats: DiffStats,
}

impl Planner {
    fn new(cols: u16, pen: Option<(u16, u16)>) -> Self {
        Self {
            ops: Vec::new(),
            cols,
            pen,
            active: Style::DEFAULT,
            stats: DiffStats::default(),
        }
    }

    fn move_to(&mut self, row: u16, col: u16) {
        if self.pen != Some((row, col)) {
            self.ops.push(Op::MoveTo { row, col });
            self.pen = Some((row, col));
        }
    }

    fn set_style(&mut self, style: Style) {
        if self.active != style {
            self.ops.push(Op::SetStyle(style));
            self.active = style;
        }
    }

    fn text(&mut self, row: u16, col: u16, text: String, width: u16) {
        self.ops.push(Op::Text { text, width });
        self.stats.cells_rendered += usize::from(width);
        let end = col + width;
        // Pending wrap: the next printable would land on the next row, and
        // terminals disagree on where a cursor move goes from here.
        self.pen = if end >= self.cols { None } else { Some((row, end)) };
    }

    /// EL clears through the last column, not just the changed cells.
    fn erase_to_eol(&mut self, row: u16, col: u16) {
        self.move_to(row, col);
        self.set_style(Style::DEFAULT);
        self.ops.push(Op::EraseToEndOfLine);
        self.stats.cells_rendered += usize::from(self.cols.saturating_sub(col));
    }

    // ─── Rows ────────────────────────────────────────────────────────────

    fn diff_row(&mut self, row: u16, prev: &[Cell], curr: &[Cell]) -> Result<()> {
        check_row(prev, row)?;
        check_row(curr, row)?;

        let spans = changed_spans(row, prev, curr)?;
        let last = spans.len().saturating_sub(1);

        for (i, &(start, end)) in spans.iter().enumerate() {
            let mut text_end = end;
            if i == last && curr[end..].iter().all(Cell::is_blank) {
                let mut tail = end;
                while tail > start && curr[tail - 1].is_blank() {
                    tail -= 1;
                }
                if end - tail >= MIN_ERASE {
                    text_end = tail;
                }
            }

            self.write_runs(row, curr, start, text_end);

            if text_end < end {
                self.erase_to_eol(row, to_col(text_end));
            }
        }
        Ok(())
    }

    /// Emit `curr[start..end]` as style runs.
    fn write_runs(&mut self, row: u16, curr: &[Cell], start: usize, end: usize) {
        let mut col = start;
        while col < end {
            let style = curr[col].style;
            let run_start = col;
            let mut text = String::new();
            while col < end && curr[col].style == style {
                let cell = &curr[col];
                cell.push_grapheme(&mut text);
                col += unit_width(cell);
            }
            let start = to_col(run_start);
            self.move_to(row, start);
            self.set_style(style);
            self.text(row, start, text, to_col(col - run_start));
        }
    }

    // ─── Cursor ──────────────────────────────────────────────────────────

    fn place_cursor(&mut self, cursor: Cursor, terminal: TerminalState) {
        self.move_to(cursor.row, cursor.col);
        if terminal.shape != Some(cursor.shape) {
            self.ops.push(Op::SetCursorShape(cursor.shape));
        }
        if terminal.visible != Some(cursor.visible) {
            self.ops.push(if cursor.visible {
                Op::ShowCursor
            } else {
                Op::HideCursor
            });
        }
    }
}

/// Group the changed units of a row into `[start, end)` spans, bridging
/// short gaps of unchanged cells.
fn changed_spans(row: u16, prev: &[Cell], curr: &[Cell]) -> Result<Vec<(usize, usize)>> {
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut col = 0;

    while col < curr.len() {
        let width = unit_width(&curr[col]);
        let lead_same = curr[col] == prev[col];
        let tail_same = width == 1 || curr[col + 1] == prev[col + 1];

        if lead_same && !tail_same {
            return Err(Error::InvalidWideCharPairing {
                row,
                col: to_col(col + 1),
            });
        }

        if !lead_same {
            match spans.last_mut() {
                Some((_, end)) if *end == col || can_bridge(curr, *end, col) => *end = col + width,
                _ => spans.push((col, col + width)),
            }
        }
        col += width;
    }
    Ok(spans)
}

/// Whether rewriting `curr[from..to]` is no longer than skipping it.
///
/// The cells must be narrow and already in the style the pen will be in
/// after writing `curr[from - 1]`.
fn can_bridge(curr: &[Cell], from: usize, to: usize) -> bool {
    let gap = to - from;
    if gap > MAX_BRIDGE || from == 0 {
        return false;
    }
    let running = curr[from - 1].style;
    let cells = &curr[from..to];
    if !cells
        .iter()
        .all(|c| c.width() == 1 && c.style == running)
    {
        return false;
    }
    let bytes: usize = cells.iter().map(Cell::grapheme_len).sum();
    bytes <= ansi::relative_len(to_col(gap))
}

#[inline]
fn unit_width(cell: &Cell) -> usize {
    if cell.is_wide() { 2 } else { 1 }
}

/// Column index back to `u16`. Rows are at most `u16::MAX` wide, so this
/// never saturates for in-range indices.
#[inline]
fn to_col(col: usize) -> u16 {
    u16::try_from(col).unwrap_or(u16::MAX)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
