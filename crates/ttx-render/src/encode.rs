// SPDX-License-Identifier: MIT
//
// Output encoder: turns an UpdatePlan into terminal bytes.
//
// The diff engine decides WHAT changes; the encoder decides HOW to say it in
// the fewest bytes the terminal understands. It keeps its own running state
// (active style, believed cursor) for one pass only; every pass starts from
// the plan's origin and the default style, so nothing leaks between frames.
//
// Byte savings come from two choices made per op:
//
//   - Style changes: the incremental transition (only what changed, using
//     the per-attribute "off" codes) is compared with the reset-based one
//     (`0` plus the full target) and the shorter wins. One merged SGR per
//     change, never one sequence per attribute.
//
//   - Cursor moves: absolute CUP competes with CHA, CUF/CUB, CUU/CUD, CR and
//     CR LF. Relative forms are only used while the cursor is known.
//
// What the terminal can do is described by `Capabilities`; colors and
// underline styles beyond it are downgraded before any comparison, so two
// styles that look the same on this terminal never cost a byte.

use std::env;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::ansi::{self, SgrParams};
use crate::cell::{Attr, Style, UnderlineStyle};
use crate::color::Color;
use crate::diff::{Op, UpdatePlan};

// ─── Capabilities ────────────────────────────────────────────────────────────

/// How many colors the terminal can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColorDepth {
    /// 24-bit RGB (`38;2;r;g;b`).
    #[default]
    TrueColor,
    /// The xterm 256-color palette (`38;5;n`).
    Indexed256,
    /// The 16 system colors only (30–37, 90–97).
    Ansi16,
}

/// What the output terminal supports.
///
/// ```
/// use ttx_render::encode::{Capabilities, ColorDepth};
///
/// let caps = Capabilities::detect_from(|name| match name {
///     "TERM" => Some("xterm-256color".to_string()),
///     _ => None,
/// });
/// assert_eq!(caps.color_depth, ColorDepth::Indexed256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capabilities {
    /// Color depth; richer colors are mapped to the nearest available one.
    pub color_depth: ColorDepth,
    /// Underline variants (`4:n`) and underline color (`58`).
    pub styled_underline: bool,
    /// DEC private mode 2026 frame bracketing.
    pub synchronized_output: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            color_depth: ColorDepth::TrueColor,
            styled_underline: true,
            synchronized_output: true,
        }
    }
}

impl Capabilities {
    /// Everything off: 16 colors, plain underline, no frame bracketing.
    pub const MINIMAL: Self = Self {
        color_depth: ColorDepth::Ansi16,
        styled_underline: false,
        synchronized_output: false,
    };

    /// Best guess from `COLORTERM`, `TERM` and `TERM_PROGRAM`.
    #[must_use]
    pub fn detect_from_env() -> Self {
        Self::detect_from(|name| env::var(name).ok())
    }

    /// Best guess from an environment lookup function.
    pub fn detect_from(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let colorterm = lookup("COLORTERM").unwrap_or_default().to_ascii_lowercase();
        let term = lookup("TERM").unwrap_or_default().to_ascii_lowercase();
        let program = lookup("TERM_PROGRAM").unwrap_or_default().to_ascii_lowercase();

        let color_depth = if colorterm == "truecolor" || colorterm == "24bit" {
            ColorDepth::TrueColor
        } else if term.contains("256color") {
            ColorDepth::Indexed256
        } else {
            ColorDepth::Ansi16
        };

        let modern = ["kitty", "wezterm", "ghostty", "foot", "alacritty"]
            .iter()
            .any(|name| term.contains(name) || program.contains(name));
        let styled_underline = modern || program == "iterm.app" || program == "vscode";

        let synchronized_output = !matches!(term.as_str(), "" | "dumb" | "linux");

        Self {
            color_depth,
            styled_underline,
            synchronized_output,
        }
    }

    /// Map a color to what this terminal can show.
    #[must_use]
    pub fn adapt_color(&self, color: Color) -> Color {
        match self.color_depth {
            ColorDepth::TrueColor => color,
            ColorDepth::Indexed256 => color.to_indexed256(),
            ColorDepth::Ansi16 => color.to_ansi16(),
        }
    }

    /// Map a style to what this terminal can show.
    #[must_use]
    pub fn adapt_style(&self, style: Style) -> Style {
        let mut out = Style {
            fg: self.adapt_color(style.fg),
            bg: self.adapt_color(style.bg),
            underline_color: self.adapt_color(style.underline_color),
            ..style
        };
        if !self.styled_underline {
            out.underline_color = Color::Default;
            if out.underline.is_underlined() {
                out.underline = UnderlineStyle::Straight;
            }
        }
        out
    }
}

// ─── SGR transitions ─────────────────────────────────────────────────────────

/// Attribute pairs that share one "off" code.
const INTENSITY: Attr = Attr::BOLD.union(Attr::FAINT);
const BLINKING: Attr = Attr::BLINK.union(Attr::RAPID_BLINK);

/// Attributes with an "off" code of their own.
const TOGGLES: [(Attr, u8); 5] = [
    (Attr::ITALIC, 23),
    (Attr::REVERSE, 27),
    (Attr::INVISIBLE, 28),
    (Attr::STRIKETHROUGH, 29),
    (Attr::OVERLINE, 55),
];

/// Parameters that change only what differs between `from` and `to`.
fn incremental(from: &Style, to: &Style, styled: bool) -> SgrParams {
    let mut sgr = SgrParams::new();
    let removed = from.attrs.difference(to.attrs);
    let added = to.attrs.difference(from.attrs);

    for (group, off) in [(INTENSITY, 22), (BLINKING, 25)] {
        if removed.intersects(group) {
            sgr.push(off);
            sgr.push_attrs(to.attrs.intersection(group));
        } else {
            sgr.push_attrs(added.intersection(group));
        }
    }
    for (flag, off) in TOGGLES {
        if removed.contains(flag) {
            sgr.push(off);
        } else if added.contains(flag) {
            sgr.push_attrs(flag);
        }
    }

    if from.underline != to.underline {
        sgr.push_underline(to.underline, styled);
    }
    if from.fg != to.fg {
        sgr.push_fg(to.fg);
    }
    if from.bg != to.bg {
        sgr.push_bg(to.bg);
    }
    if from.underline_color != to.underline_color {
        sgr.push_underline_color(to.underline_color);
    }
    sgr
}

/// Parameters that reset everything, then set `to` from scratch.
fn from_reset(to: &Style, styled: bool) -> SgrParams {
    let mut sgr = SgrParams::new();
    sgr.push(0);
    sgr.push_attrs(to.attrs);
    if to.underline.is_underlined() {
        sgr.push_underline(to.underline, styled);
    }
    if !to.fg.is_default() {
        sgr.push_fg(to.fg);
    }
    if !to.bg.is_default() {
        sgr.push_bg(to.bg);
    }
    if !to.underline_color.is_default() {
        sgr.push_underline_color(to.underline_color);
    }
    sgr
}

/// The shorter of the two transitions; empty when nothing changes.
fn transition(from: &Style, to: &Style, styled: bool) -> SgrParams {
    if from == to {
        return SgrParams::new();
    }
    let inc = incremental(from, to, styled);
    let reset = from_reset(to, styled);
    if reset.encoded_len() < inc.encoded_len() { reset } else { inc }
}

// ─── Cursor movement ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertical {
    Stay,
    Up(u16),
    Down(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Horizontal {
    Stay,
    Return,
    Column(u16),
    Forward(u16),
    Back(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Absolute(u16, u16),
    NextLine,
    Relative(Vertical, Horizontal),
}

fn vertical(from: u16, to: u16) -> (usize, Vertical) {
    match to.cmp(&from) {
        std::cmp::Ordering::Equal => (0, Vertical::Stay),
        std::cmp::Ordering::Less => (ansi::relative_len(from - to), Vertical::Up(from - to)),
        std::cmp::Ordering::Greater => (ansi::relative_len(to - from), Vertical::Down(to - from)),
    }
}

fn horizontal(from: u16, to: u16) -> (usize, Horizontal) {
    if from == to {
        return (0, Horizontal::Stay);
    }
    if to == 0 {
        return (1, Horizontal::Return);
    }
    let relative = if to > from {
        (ansi::relative_len(to - from), Horizontal::Forward(to - from))
    } else {
        (ansi::relative_len(from - to), Horizontal::Back(from - to))
    };
    let column = (ansi::cursor_column_len(to), Horizontal::Column(to));
    if column.0 < relative.0 { column } else { relative }
}

/// Cheapest way from `from` (if known) to `to`. Ties go to CUP.
fn best_move(from: Option<(u16, u16)>, to: (u16, u16)) -> Move {
    let absolute = Move::Absolute(to.0, to.1);
    let Some((fr, fc)) = from else {
        return absolute;
    };

    let mut best = (ansi::cursor_to_len(to.0, to.1), absolute);

    if fr.checked_add(1) == Some(to.0) && to.1 == 0 && 2 < best.0 {
        best = (2, Move::NextLine);
    }

    let (vlen, v) = vertical(fr, to.0);
    let (hlen, h) = horizontal(fc, to.1);
    if vlen + hlen < best.0 {
        best = (vlen + hlen, Move::Relative(v, h));
    }
    best.1
}

fn write_move(w: &mut impl Write, mv: Move) -> io::Result<()> {
    match mv {
        Move::Absolute(row, col) => ansi::cursor_to(w, row, col),
        Move::NextLine => w.write_all(b"\r\n"),
        Move::Relative(v, h) => {
            match v {
                Vertical::Stay => {}
                Vertical::Up(n) => ansi::cursor_up(w, n)?,
                Vertical::Down(n) => ansi::cursor_down(w, n)?,
            }
            match h {
                Horizontal::Stay => Ok(()),
                Horizontal::Return => w.write_all(b"\r"),
                Horizontal::Column(c) => ansi::cursor_column(w, c),
                Horizontal::Forward(n) => ansi::cursor_forward(w, n),
                Horizontal::Back(n) => ansi::cursor_back(w, n),
            }
        }
    }
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Stateless between passes; holds only the capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Encoder {
    caps: Capabilities,
}

impl Encoder {
    /// Create an encoder for a terminal with `caps`.
    #[must_use]
    pub const fn new(caps: Capabilities) -> Self {
        Self { caps }
    }

    /// The capabilities in use.
    #[must_use]
    pub const fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Write the bytes for `plan` to `w`.
    ///
    /// An empty plan writes nothing at all, not even synchronization
    /// markers.
    ///
    /// # Errors
    ///
    /// Propagates errors from `w`. Never fails for an `OutputBuffer`.
    pub fn encode(&self, plan: &UpdatePlan, w: &mut impl Write) -> io::Result<()> {
        if plan.is_empty() {
            return Ok(());
        }

        let styled = self.caps.styled_underline;
        let mut cursor = plan.origin;
        let mut active = Style::DEFAULT;

        if self.caps.synchronized_output {
            ansi::begin_sync(w)?;
        }

        for op in &plan.ops {
            match op {
                Op::ClearScreen => {
                    // The terminal's SGR state is unknown here; ED fills with
                    // the current background, so reset first.
                    ansi::reset(w)?;
                    ansi::clear_screen(w)?;
                    active = Style::DEFAULT;
                }
                Op::MoveTo { row, col } => {
                    if cursor != Some((*row, *col)) {
                        write_move(w, best_move(cursor, (*row, *col)))?;
                        cursor = Some((*row, *col));
                    }
                }
                Op::SetStyle(style) => {
                    let target = self.caps.adapt_style(*style);
                    transition(&active, &target, styled).write_to(w)?;
                    active = target;
                }
                Op::Text { text, width } => {
                    w.write_all(text.as_bytes())?;
                    cursor = cursor.and_then(|(row, col)| {
                        let end = col.saturating_add(*width);
                        (end < plan.cols).then_some((row, end))
                    });
                }
                Op::EraseToEndOfLine => ansi::erase_to_eol(w)?,
                Op::ShowCursor => ansi::cursor_show(w)?,
                Op::HideCursor => ansi::cursor_hide(w)?,
                Op::SetCursorShape(shape) => ansi::set_cursor_shape(w, *shape)?,
            }
        }

        if self.caps.synchronized_output {
            ansi::end_sync(w)?;
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
