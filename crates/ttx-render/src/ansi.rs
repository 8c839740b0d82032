// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Pure functions that write escape sequences to any `impl Write`. No state,
// no decisions about when or which sequence to emit: that is the encoder's
// job. This module only knows the byte-level encoding of each command.
//
// All positions are 0-indexed in our API and converted to the terminal's
// 1-indexed form here. Parameters equal to the terminal's default (1) are
// omitted, since every byte counts in a frame.
//
// SGR is built through `SgrParams`, which collects parameters so a whole
// style change goes out as one CSI sequence, and lets the encoder compare
// the length of competing transitions before writing either.
use std::fmt::Write as _;
use std::io::{self, Write};

use crate::cell::{Attr, UnderlineStyle};
use crate::color::Color;

// ─── Cursor Movement ─────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` with CUP.
///
/// Home is `ESC[H`; column 0 drops the column parameter.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    match (row, col) {
        (0, 0) => w.write_all(b"\x1b[H"),
        (r, 0) => write!(w, "\x1b[{}H", u32::from(r) + 1),
        (r, c) => write!(w, "\x1b[{};{}H", u32::from(r) + 1, u32::from(c) + 1),
    }
}

/// Move to column `col` of the current row (CHA).
#[inline]
pub fn cursor_column(w: &mut impl Write, col: u16) -> io::Result<()> {
    if col == 0 {
        w.write_all(b"\x1b[G")
    } else {
        write!(w, "\x1b[{}G", u32::from(col) + 1)
    }
}

fn relative(w: &mut impl Write, n: u16, final_byte: char) -> io::Result<()> {
    if n == 1 {
        write!(w, "\x1b[{final_byte}")
    } else {
        write!(w, "\x1b[{n}{final_byte}")
    }
}

/// Move right `n` columns (CUF).
#[inline]
pub fn cursor_forward(w: &mut impl Write, n: u16) -> io::Result<()> {
    relative(w, n, 'C')
}

/// Move left `n` columns (CUB).
#[inline]
pub fn cursor_back(w: &mut impl Write, n: u16) -> io::Result<()> {
    relative(w, n, 'D')
}

/// Move up `n` rows (CUU).
#[inline]
pub fn cursor_up(w: &mut impl Write, n: u16) -> io::Result<()> {
    relative(w, n, 'A')
}

/// Move down `n` rows (CUD).
#[inline]
pub fn cursor_down(w: &mut impl Write, n: u16) -> io::Result<()> {
    relative(w, n, 'B')
}

/// Byte length of the CUP sequence [`cursor_to`] would write.
#[must_use]
pub fn cursor_to_len(row: u16, col: u16) -> usize {
    match (row, col) {
        (0, 0) => 3,
        (r, 0) => 3 + digits(u32::from(r) + 1),
        (r, c) => 4 + digits(u32::from(r) + 1) + digits(u32::from(c) + 1),
    }
}

/// Byte length of the CHA sequence [`cursor_column`] would write.
#[must_use]
pub fn cursor_column_len(col: u16) -> usize {
    if col == 0 { 3 } else { 3 + digits(u32::from(col) + 1) }
}

/// Byte length of a CUF/CUB/CUU/CUD sequence moving `n` cells.
#[must_use]
pub fn relative_len(n: u16) -> usize {
    if n == 1 { 3 } else { 3 + digits(u32::from(n)) }
}

const fn digits(mut n: u32) -> usize {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

// ─── Cursor Visibility ───────────────────────────────────────────────────────

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2). Erased cells take the current background,
/// so callers reset SGR first.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase from the cursor to the end of the line (EL 0).
#[inline]
pub fn erase_to_eol(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

/// Reset all SGR attributes to terminal defaults (SGR 0).
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── SGR ─────────────────────────────────────────────────────────────────────

/// Parameters of one SGR sequence, collected before writing.
///
/// ```
/// use ttx_render::ansi::SgrParams;
/// use ttx_render::cell::Attr;
///
/// let mut sgr = SgrParams::new();
/// sgr.push_attrs(Attr::BOLD | Attr::ITALIC);
/// sgr.push(31);
/// let mut out = Vec::new();
/// sgr.write_to(&mut out).unwrap();
/// assert_eq!(out, b"\x1b[1;3;31m");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SgrParams {
    params: String,
}

impl SgrParams {
    /// No parameters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            params: String::new(),
        }
    }

    /// Whether no parameter has been pushed.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Byte length of the full sequence, `ESC [ params m`.
    #[inline]
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        if self.is_empty() { 0 } else { self.params.len() + 3 }
    }

    fn sep(&mut self) {
        if !self.params.is_empty() {
            self.params.push(';');
        }
    }

    /// Append a plain numeric parameter.
    pub fn push(&mut self, code: u8) {
        self.sep();
        let _ = write!(self.params, "{code}");
    }

    /// Append a colon sub-parameter group such as `4:3`.
    fn push_sub(&mut self, code: u8, sub: u8) {
        self.sep();
        let _ = write!(self.params, "{code}:{sub}");
    }

    /// Append the "on" codes for every attribute in `attrs`.
    pub fn push_attrs(&mut self, attrs: Attr) {
        const CODES: [(Attr, u8); 9] = [
            (Attr::BOLD, 1),
            (Attr::FAINT, 2),
            (Attr::ITALIC, 3),
            (Attr::BLINK, 5),
            (Attr::RAPID_BLINK, 6),
            (Attr::REVERSE, 7),
            (Attr::INVISIBLE, 8),
            (Attr::STRIKETHROUGH, 9),
            (Attr::OVERLINE, 53),
        ];
        for (flag, code) in CODES {
            if attrs.contains(flag) {
                self.push(code);
            }
        }
    }

    /// Append an underline style.
    ///
    /// With `styled` the colon form `4:n` is used for variants; without it
    /// every variant degrades to a plain underline (`4`).
    pub fn push_underline(&mut self, style: UnderlineStyle, styled: bool) {
        match style {
            UnderlineStyle::None => self.push(24),
            UnderlineStyle::Straight => self.push(4),
            other if styled => self.push_sub(4, other as u8),
            _ => self.push(4),
        }
    }

    /// Append a foreground color (30–37, 90–97, 38;5;n, 38;2;r;g;b, 39).
    pub fn push_fg(&mut self, color: Color) {
        self.push_color(color, 30, 90, 38);
    }

    /// Append a background color (40–47, 100–107, 48;5;n, 48;2;r;g;b, 49).
    pub fn push_bg(&mut self, color: Color) {
        self.push_color(color, 40, 100, 48);
    }

    /// Append an underline color (58;5;n, 58;2;r;g;b, 59).
    pub fn push_underline_color(&mut self, color: Color) {
        self.sep();
        let _ = match color {
            Color::Default => write!(self.params, "59"),
            Color::Indexed(i) => write!(self.params, "58;5;{i}"),
            Color::TrueColor(r, g, b) => write!(self.params, "58;2;{r};{g};{b}"),
        };
    }

    fn push_color(&mut self, color: Color, base: u8, bright: u8, extended: u8) {
        self.sep();
        let _ = match color {
            Color::Default => write!(self.params, "{}", extended + 1),
            Color::Indexed(i) if i < 8 => write!(self.params, "{}", base + i),
            Color::Indexed(i) if i < 16 => write!(self.params, "{}", bright + i - 8),
            Color::Indexed(i) => write!(self.params, "{extended};5;{i}"),
            Color::TrueColor(r, g, b) => write!(self.params, "{extended};2;{r};{g};{b}"),
        };
    }

    /// Write `ESC [ params m`. Writes nothing when empty.
    pub fn write_to(&self, w: &mut impl Write) -> io::Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        w.write_all(b"\x1b[")?;
        w.write_all(self.params.as_bytes())?;
        w.write_all(b"m")
    }
}

// ─── Synchronized Output ─────────────────────────────────────────────────────

/// Begin synchronized output (DEC Private Mode 2026).
///
/// The terminal buffers everything until [`end_sync`], so a frame is
/// displayed whole or not at all.
#[inline]
pub fn begin_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026h")
}

/// End synchronized output: the terminal shows the buffered frame.
#[inline]
pub fn end_sync(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?2026l")
}

// ─── Alternate Screen ────────────────────────────────────────────────────────

/// Enter the alternate screen buffer (DEC Private Mode 1049).
#[inline]
pub fn enter_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049h")
}

/// Exit the alternate screen buffer and restore the original content.
#[inline]
pub fn exit_alt_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?1049l")
}

// ─── Cursor Shape ────────────────────────────────────────────────────────────

/// Terminal cursor shape (DECSCUSR: Set Cursor Style).
///
/// Panes running editors switch shapes for modal editing; the multiplexer
/// forwards the focused pane's choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CursorShape {
    /// Terminal default (usually blinking block).
    #[default]
    Default,
    /// Blinking block cursor.
    BlinkBlock,
    /// Steady (non-blinking) block cursor.
    SteadyBlock,
    /// Blinking underline cursor.
    BlinkUnderline,
    /// Steady underline cursor.
    SteadyUnderline,
    /// Blinking bar (I-beam) cursor.
    BlinkBar,
    /// Steady bar (I-beam) cursor.
    SteadyBar,
}

impl CursorShape {
    /// The DECSCUSR parameter for this shape.
    #[must_use]
    pub const fn param(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::BlinkBlock => 1,
            Self::SteadyBlock => 2,
            Self::BlinkUnderline => 3,
            Self::SteadyUnderline => 4,
            Self::BlinkBar => 5,
            Self::SteadyBar => 6,
        }
    }

    /// Inverse of [`param`](Self::param). Unknown values map to `Default`.
    #[must_use]
    pub const fn from_param(n: u16) -> Self {
        match n {
            1 => Self::BlinkBlock,
            2 => Self::SteadyBlock,
            3 => Self::BlinkUnderline,
            4 => Self::SteadyUnderline,
            5 => Self::BlinkBar,
            6 => Self::SteadyBar,
            _ => Self::Default,
        }
    }
}

/// Set the cursor shape using DECSCUSR.
#[inline]
pub fn set_cursor_shape(w: &mut impl Write, shape: CursorShape) -> io::Result<()> {
    write!(w, "\x1b[{} q", shape.param())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
