// SPDX-License-Identifier: MIT
//
// A small virtual terminal for checking rendered output.
//
// Bytes go through a real VT parser (vte) and are applied to a cell grid the
// way xterm-like terminals do it: pending wrap after the last column, wide
// characters occupying two cells, erase with the current background. Anything
// it does not understand is recorded, so a test can also assert that the
// renderer emitted nothing unexpected.
//
// Only what the renderer needs is modeled. There is no scrolling region, no
// tab stops, no charsets.

#![allow(dead_code)]

use unicode_width::UnicodeWidthChar;
use vte::{Params, Parser, Perform};

use ttx_render::{Attr, Color, CursorShape, Grid, Style, UnderlineStyle};

// ─── Cell ────────────────────────────────────────────────────────────────────

/// One cell as the virtual terminal shows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtCell {
    /// Grapheme, or empty for the right half of a wide character.
    pub text: String,
    pub style: Style,
    pub continuation: bool,
}

impl VtCell {
    fn blank(bg: Color) -> Self {
        Self {
            text: " ".into(),
            style: Style::DEFAULT.with_bg(bg),
            continuation: false,
        }
    }
}

// ─── Screen state ────────────────────────────────────────────────────────────

struct Screen {
    rows: u16,
    cols: u16,
    cells: Vec<VtCell>,
    row: u16,
    col: u16,
    /// Last write hit the right margin; the next printable wraps first.
    pending_wrap: bool,
    pen: Style,
    visible: bool,
    shape: CursorShape,
    /// Index of the last printed cell, for combining marks.
    last: Option<usize>,
    unhandled: Vec<String>,
}

impl Screen {
    fn new(rows: u16, cols: u16) -> Self {
        Self {
            rows,
            cols,
            cells: vec![VtCell::blank(Color::Default); usize::from(rows) * usize::from(cols)],
            row: 0,
            col: 0,
            pending_wrap: false,
            pen: Style::DEFAULT,
            visible: true,
            shape: CursorShape::Default,
            last: None,
            unhandled: Vec::new(),
        }
    }

    fn index(&self, row: u16, col: u16) -> usize {
        usize::from(row) * usize::from(self.cols) + usize::from(col)
    }

    fn blank(&self) -> VtCell {
        VtCell::blank(self.pen.bg)
    }

    /// Overwriting either half of a wide pair destroys the other half.
    fn split_pair(&mut self, row: u16, col: u16) {
        let idx = self.index(row, col);
        if self.cells[idx].continuation && col > 0 {
            self.cells[idx - 1] = VtCell::blank(Color::Default);
        }
        if col + 1 < self.cols && self.cells[idx + 1].continuation {
            self.cells[idx + 1] = VtCell::blank(Color::Default);
        }
    }

    fn linefeed(&mut self) {
        if self.row + 1 < self.rows {
            self.row += 1;
        } else {
            let cols = usize::from(self.cols);
            self.cells.drain(..cols);
            let blank = self.blank();
            self.cells.extend(std::iter::repeat_n(blank, cols));
        }
    }

    fn move_to(&mut self, row: u16, col: u16) {
        self.row = row.min(self.rows.saturating_sub(1));
        self.col = col.min(self.cols.saturating_sub(1));
        self.pending_wrap = false;
        self.last = None;
    }

    fn erase(&mut self, from: usize, to: usize) {
        let blank = self.blank();
        for cell in &mut self.cells[from..to] {
            *cell = blank.clone();
        }
    }

    fn erase_line(&mut self, mode: u16) {
        let start = self.index(self.row, 0);
        let here = self.index(self.row, self.col);
        let end = start + usize::from(self.cols);
        match mode {
            0 => {
                self.split_pair(self.row, self.col);
                self.erase(here, end);
            }
            1 => {
                self.split_pair(self.row, self.col);
                self.erase(start, here + 1);
            }
            2 => self.erase(start, end),
            _ => self.unhandled.push(format!("EL {mode}")),
        }
    }

    fn erase_display(&mut self, mode: u16) {
        let here = self.index(self.row, self.col);
        let len = self.cells.len();
        match mode {
            0 => {
                self.split_pair(self.row, self.col);
                self.erase(here, len);
            }
            1 => {
                self.split_pair(self.row, self.col);
                self.erase(0, here + 1);
            }
            2 | 3 => self.erase(0, len),
            _ => self.unhandled.push(format!("ED {mode}")),
        }
    }

    fn sgr(&mut self, groups: &[&[u16]]) {
        if groups.is_empty() {
            self.pen = Style::DEFAULT;
            return;
        }

        let mut i = 0;
        while i < groups.len() {
            let group = groups[i];
            let code = group.first().copied().unwrap_or(0);
            match code {
                0 => self.pen = Style::DEFAULT,
                1 => self.pen.attrs.insert(Attr::BOLD),
                2 => self.pen.attrs.insert(Attr::FAINT),
                3 => self.pen.attrs.insert(Attr::ITALIC),
                4 => {
                    self.pen.underline = match group.get(1) {
                        None => UnderlineStyle::Straight,
                        Some(&n) => underline_from(n),
                    };
                }
                5 => self.pen.attrs.insert(Attr::BLINK),
                6 => self.pen.attrs.insert(Attr::RAPID_BLINK),
                7 => self.pen.attrs.insert(Attr::REVERSE),
                8 => self.pen.attrs.insert(Attr::INVISIBLE),
                9 => self.pen.attrs.insert(Attr::STRIKETHROUGH),
                21 => self.pen.underline = UnderlineStyle::Double,
                22 => self.pen.attrs.remove(Attr::BOLD | Attr::FAINT),
                23 => self.pen.attrs.remove(Attr::ITALIC),
                24 => self.pen.underline = UnderlineStyle::None,
                25 => self.pen.attrs.remove(Attr::BLINK | Attr::RAPID_BLINK),
                27 => self.pen.attrs.remove(Attr::REVERSE),
                28 => self.pen.attrs.remove(Attr::INVISIBLE),
                29 => self.pen.attrs.remove(Attr::STRIKETHROUGH),
                30..=37 => self.pen.fg = Color::Indexed(byte(code - 30)),
                39 => self.pen.fg = Color::Default,
                40..=47 => self.pen.bg = Color::Indexed(byte(code - 40)),
                49 => self.pen.bg = Color::Default,
                53 => self.pen.attrs.insert(Attr::OVERLINE),
                55 => self.pen.attrs.remove(Attr::OVERLINE),
                59 => self.pen.underline_color = Color::Default,
                90..=97 => self.pen.fg = Color::Indexed(byte(code - 90 + 8)),
                100..=107 => self.pen.bg = Color::Indexed(byte(code - 100 + 8)),
                38 | 48 | 58 => match extended_color(&groups[i..]) {
                    Some((color, used)) => {
                        match code {
                            38 => self.pen.fg = color,
                            48 => self.pen.bg = color,
                            _ => self.pen.underline_color = color,
                        }
                        i += used;
                    }
                    None => self.unhandled.push(format!("SGR {groups:?}")),
                },
                _ => self.unhandled.push(format!("SGR {code}")),
            }
            i += 1;
        }
    }
}

fn byte(n: u16) -> u8 {
    u8::try_from(n).unwrap_or(u8::MAX)
}

fn underline_from(n: u16) -> UnderlineStyle {
    match n {
        0 => UnderlineStyle::None,
        2 => UnderlineStyle::Double,
        3 => UnderlineStyle::Curly,
        4 => UnderlineStyle::Dotted,
        5 => UnderlineStyle::Dashed,
        _ => UnderlineStyle::Straight,
    }
}

/// Parse `38;5;n`, `38;2;r;g;b` or their colon forms. Returns the color and
/// how many extra parameter groups were consumed.
fn extended_color(groups: &[&[u16]]) -> Option<(Color, usize)> {
    let head = groups.first()?;
    if head.len() > 1 {
        return match head.get(1)? {
            5 => Some((Color::Indexed(byte(*head.get(2)?)), 0)),
            2 => {
                let rgb = &head[head.len().checked_sub(3)?..];
                Some((Color::TrueColor(byte(rgb[0]), byte(rgb[1]), byte(rgb[2])), 0))
            }
            _ => None,
        };
    }

    let arg = |i: usize| groups.get(i).and_then(|g| g.first()).copied();
    match arg(1)? {
        5 => Some((Color::Indexed(byte(arg(2)?)), 2)),
        2 => Some((Color::TrueColor(byte(arg(2)?), byte(arg(3)?), byte(arg(4)?)), 4)),
        _ => None,
    }
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        let width = c.width().unwrap_or(0);
        if width == 0 {
            if let Some(idx) = self.last {
                self.cells[idx].text.push(c);
            }
            return;
        }

        if self.pending_wrap {
            self.col = 0;
            self.pending_wrap = false;
            self.linefeed();
        }
        if width == 2 && self.col + 1 >= self.cols {
            // Does not fit: the terminal wraps it whole.
            self.split_pair(self.row, self.col);
            let idx = self.index(self.row, self.col);
            self.cells[idx] = self.blank();
            self.col = 0;
            self.linefeed();
        }

        let (row, col) = (self.row, self.col);
        self.split_pair(row, col);
        if width == 2 {
            self.split_pair(row, col + 1);
        }

        let idx = self.index(row, col);
        self.cells[idx] = VtCell {
            text: c.to_string(),
            style: self.pen,
            continuation: false,
        };
        if width == 2 {
            self.cells[idx + 1] = VtCell {
                text: String::new(),
                style: self.pen,
                continuation: true,
            };
        }
        self.last = Some(idx);

        let next = col + u16::try_from(width).unwrap_or(1);
        if next >= self.cols {
            self.col = self.cols - 1;
            self.pending_wrap = true;
        } else {
            self.col = next;
        }
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\r' => {
                self.col = 0;
                self.pending_wrap = false;
                self.last = None;
            }
            b'\n' | 0x0b | 0x0c => {
                self.pending_wrap = false;
                self.last = None;
                self.linefeed();
            }
            0x08 => {
                let col = self.col.saturating_sub(1);
                self.move_to(self.row, col);
            }
            _ => self.unhandled.push(format!("C0 {byte:#04x}")),
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, action: char) {
        let groups: Vec<&[u16]> = params.iter().collect();
        let raw = |i: usize| groups.get(i).and_then(|g| g.first()).copied().unwrap_or(0);
        // Cursor movement treats 0 as 1.
        let count = |i: usize| raw(i).max(1);

        match (intermediates, action) {
            ([], 'H' | 'f') => self.move_to(count(0) - 1, count(1) - 1),
            ([], 'G') => self.move_to(self.row, count(0) - 1),
            ([], 'A') => self.move_to(self.row.saturating_sub(count(0)), self.col),
            ([], 'B') => self.move_to(self.row.saturating_add(count(0)), self.col),
            ([], 'C') => self.move_to(self.row, self.col.saturating_add(count(0))),
            ([], 'D') => self.move_to(self.row, self.col.saturating_sub(count(0))),
            ([], 'J') => self.erase_display(raw(0)),
            ([], 'K') => self.erase_line(raw(0)),
            ([], 'm') => self.sgr(&groups),
            ([b'?'], 'h' | 'l') => {
                for mode in groups.iter().filter_map(|g| g.first().copied()) {
                    match mode {
                        25 => self.visible = action == 'h',
                        // Synchronized output and the alternate screen do not
                        // change what the grid shows.
                        1049 | 2026 => {}
                        _ => self.unhandled.push(format!("DECSET {mode}{action}")),
                    }
                }
            }
            ([b' '], 'q') => self.shape = CursorShape::from_param(raw(0)),
            _ => self.unhandled.push(format!("CSI {intermediates:?} {groups:?} {action}")),
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        self.unhandled.push(format!("ESC {intermediates:?} {}", char::from(byte)));
    }
}

// ─── VirtualTerminal ─────────────────────────────────────────────────────────

/// A terminal screen that rendered bytes can be fed into.
pub struct VirtualTerminal {
    parser: Parser,
    screen: Screen,
}

impl VirtualTerminal {
    /// A blank screen with the cursor at the origin, visible.
    pub fn new(rows: u16, cols: u16) -> Self {
        Self {
            parser: Parser::new(),
            screen: Screen::new(rows, cols),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.advance(&mut self.screen, bytes);
    }

    /// Change the screen size, keeping the overlapping content.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        let mut next = Screen::new(rows, cols);
        for r in 0..rows.min(self.screen.rows) {
            for c in 0..cols.min(self.screen.cols) {
                let idx = next.index(r, c);
                next.cells[idx] = self.screen.cells[self.screen.index(r, c)].clone();
            }
        }
        next.pen = self.screen.pen;
        next.visible = self.screen.visible;
        next.shape = self.screen.shape;
        next.move_to(self.screen.row, self.screen.col);
        self.screen = next;
    }

    pub fn cell(&self, row: u16, col: u16) -> &VtCell {
        &self.screen.cells[self.screen.index(row, col)]
    }

    /// Text of a row, continuation cells skipped.
    pub fn row_text(&self, row: u16) -> String {
        (0..self.screen.cols)
            .map(|col| self.cell(row, col))
            .filter(|cell| !cell.continuation)
            .map(|cell| cell.text.as_str())
            .collect()
    }

    pub fn cursor(&self) -> (u16, u16) {
        (self.screen.row, self.screen.col)
    }

    pub fn cursor_visible(&self) -> bool {
        self.screen.visible
    }

    pub fn cursor_shape(&self) -> CursorShape {
        self.screen.shape
    }

    /// Sequences the model did not understand.
    pub fn unhandled(&self) -> &[String] {
        &self.screen.unhandled
    }

    /// Every difference between the screen and `grid`, including the cursor.
    pub fn mismatches(&self, grid: &Grid) -> Vec<String> {
        let mut out = Vec::new();
        if grid.size() != (self.screen.rows, self.screen.cols) {
            out.push(format!(
                "size: screen {}x{}, grid {:?}",
                self.screen.rows,
                self.screen.cols,
                grid.size()
            ));
            return out;
        }

        for row in 0..grid.rows() {
            for col in 0..grid.cols() {
                let got = self.cell(row, col);
                let Some(want) = grid.get(row, col) else {
                    continue;
                };
                if want.is_continuation() || got.continuation {
                    if want.is_continuation() != got.continuation {
                        out.push(format!("({row},{col}): continuation mismatch, got {got:?}"));
                    }
                    continue;
                }
                if got.text != want.grapheme() || got.style != want.style {
                    out.push(format!("({row},{col}): got {got:?}, want {want:?}"));
                }
            }
        }

        let cursor = grid.cursor();
        if self.cursor() != (cursor.row, cursor.col) {
            out.push(format!("cursor at {:?}, want ({}, {})", self.cursor(), cursor.row, cursor.col));
        }
        if self.screen.visible != cursor.visible {
            out.push(format!("cursor visible {}, want {}", self.screen.visible, cursor.visible));
        }
        if self.screen.shape != cursor.shape {
            out.push(format!("cursor shape {:?}, want {:?}", self.screen.shape, cursor.shape));
        }
        out
    }

    /// Panic with a readable report unless the screen shows exactly `grid`.
    #[track_caller]
    pub fn assert_shows(&self, grid: &Grid) {
        let mismatches = self.mismatches(grid);
        assert!(
            mismatches.is_empty(),
            "screen differs from grid:\n  {}",
            mismatches.join("\n  ")
        );
        assert!(self.unhandled().is_empty(), "unhandled sequences: {:?}", self.unhandled());
    }
}
