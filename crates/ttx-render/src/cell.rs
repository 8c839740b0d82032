// SPDX-License-Identifier: MIT
//
// Cell: the atomic unit of the composited screen.
//
// Every character position on screen is a Cell: one grapheme (a user-visible
// character, which may be several code points: combining marks, emoji ZWJ
// sequences, flags), its display width, and its Style.
//
// Wide characters (CJK, most emoji) occupy two columns. The first cell holds
// the grapheme with width 2; the second is a continuation cell with width 0,
// no content, and the same style. The pair is one unit for the diff engine
// and the encoder: nothing ever addresses the continuation half alone.
//
// Most cells hold a single `char`, so graphemes are stored inline and only
// multi-code-point clusters allocate.

use std::borrow::Cow;
use std::fmt;

use unicode_width::UnicodeWidthStr;

use crate::color::Color;

// ─── Text Attributes ─────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes stored as a compact bitfield.
    ///
    /// These map directly to SGR (Select Graphic Rendition) parameters.
    /// Combine with bitwise OR:
    ///
    /// ```
    /// use ttx_render::cell::Attr;
    ///
    /// let style = Attr::BOLD | Attr::ITALIC;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::FAINT));
    /// assert_eq!(Attr::ITALIC | Attr::BOLD, style);
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u16 {
        /// SGR 1: increased intensity.
        const BOLD          = 1 << 0;
        /// SGR 2: decreased intensity.
        const FAINT         = 1 << 1;
        /// SGR 3: italic.
        const ITALIC        = 1 << 2;
        /// SGR 5: slow blink.
        const BLINK         = 1 << 3;
        /// SGR 6: rapid blink.
        const RAPID_BLINK   = 1 << 4;
        /// SGR 7: swap foreground and background.
        const REVERSE       = 1 << 5;
        /// SGR 8: invisible text.
        const INVISIBLE     = 1 << 6;
        /// SGR 9: crossed-out text.
        const STRIKETHROUGH = 1 << 7;
        /// SGR 53: line above the text.
        const OVERLINE      = 1 << 8;
    }
}

// ─── Underline Style ─────────────────────────────────────────────────────────

/// Underline style for a cell.
///
/// Kept apart from [`Attr`] so "is underlined" and "which underline" can
/// never disagree. Anything other than `None` means underlined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
#[repr(u8)]
pub enum UnderlineStyle {
    /// No underline.
    #[default]
    None = 0,
    /// SGR 4: straight underline.
    Straight = 1,
    /// SGR 4:2 (or 21): double underline.
    Double = 2,
    /// SGR 4:3: curly underline.
    Curly = 3,
    /// SGR 4:4: dotted underline.
    Dotted = 4,
    /// SGR 4:5: dashed underline.
    Dashed = 5,
}

impl UnderlineStyle {
    /// Whether any underline is active.
    #[inline]
    #[must_use]
    pub const fn is_underlined(self) -> bool {
        !matches!(self, Self::None)
    }
}

// ─── Style ───────────────────────────────────────────────────────────────────

/// Everything about a cell's appearance except its text.
///
/// `Style::default()` is exactly what SGR 0 leaves the terminal in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Style {
    /// Foreground (text) color.
    pub fg: Color,
    /// Background color.
    pub bg: Color,
    /// Text attributes.
    pub attrs: Attr,
    /// Underline style.
    pub underline: UnderlineStyle,
    /// Underline color (SGR 58). `Default` follows the foreground.
    pub underline_color: Color,
}

impl Style {
    /// The reset style: default colors, no attributes, no underline.
    pub const DEFAULT: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
        underline: UnderlineStyle::None,
        underline_color: Color::Default,
    };

    /// Whether this is the reset style.
    #[inline]
    #[must_use]
    pub fn is_default(&self) -> bool {
        *self == Self::DEFAULT
    }

    /// Set the foreground color.
    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    /// Set the background color.
    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    /// Set text attributes.
    #[inline]
    #[must_use]
    pub const fn with_attrs(self, attrs: Attr) -> Self {
        Self { attrs, ..self }
    }

    /// Set underline style.
    #[inline]
    #[must_use]
    pub const fn with_underline(self, underline: UnderlineStyle) -> Self {
        Self { underline, ..self }
    }

    /// Set underline color.
    #[inline]
    #[must_use]
    pub const fn with_underline_color(self, underline_color: Color) -> Self {
        Self {
            underline_color,
            ..self
        }
    }
}

impl fmt::Debug for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Style(")?;
        let mut sep = "";
        if !self.fg.is_default() {
            write!(f, "fg={:?}", self.fg)?;
            sep = ", ";
        }
        if !self.bg.is_default() {
            write!(f, "{sep}bg={:?}", self.bg)?;
            sep = ", ";
        }
        if !self.attrs.is_empty() {
            write!(f, "{sep}{:?}", self.attrs)?;
            sep = ", ";
        }
        if self.underline.is_underlined() {
            write!(f, "{sep}{:?}", self.underline)?;
            sep = ", ";
        }
        if !self.underline_color.is_default() {
            write!(f, "{sep}ul={:?}", self.underline_color)?;
        }
        write!(f, ")")
    }
}

// ─── Grapheme storage ────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq, Hash)]
enum Grapheme {
    /// Second column of a wide character.
    Continuation,
    /// A single code point (the overwhelmingly common case).
    Char(char),
    /// A multi-code-point cluster.
    Cluster(Box<str>),
}

impl Grapheme {
    fn from_str(s: &str) -> Self {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Self::Char(' '),
            (Some(c), None) => Self::Char(c),
            _ => Self::Cluster(s.into()),
        }
    }
}

/// Replacement for graphemes that would inject control bytes into the
/// output stream or print without moving the cursor.
const REPLACEMENT: char = '?';

// ─── Cell ────────────────────────────────────────────────────────────────────

/// A single terminal cell.
///
/// # Examples
///
/// ```
/// use ttx_render::cell::Cell;
///
/// let a = Cell::new("a");
/// assert_eq!(a.width(), 1);
///
/// let wide = Cell::new("中");
/// assert_eq!(wide.width(), 2);
///
/// let family = Cell::new("👨‍👩‍👧");
/// assert_eq!(family.grapheme(), "👨‍👩‍👧");
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Cell {
    grapheme: Grapheme,
    width: u8,
    /// Colors and attributes.
    pub style: Style,
}

impl Cell {
    /// An empty cell: space, default style.
    pub const BLANK: Self = Self {
        grapheme: Grapheme::Char(' '),
        width: 1,
        style: Style::DEFAULT,
    };

    /// Create a cell from one grapheme with the default style.
    ///
    /// Width comes from Unicode East Asian Width and is clamped to 1..=2.
    /// An empty string becomes a blank; graphemes containing control
    /// characters or of zero width (a lone combining mark, U+200B) are
    /// replaced with `?`.
    #[must_use]
    pub fn new(grapheme: &str) -> Self {
        Self::styled(grapheme, Style::DEFAULT)
    }

    /// Create a cell from one grapheme with a style.
    #[must_use]
    pub fn styled(grapheme: &str, style: Style) -> Self {
        if grapheme.is_empty() {
            return Self::blank(style);
        }
        let width = UnicodeWidthStr::width(grapheme);
        // A terminal does not advance over these, so the pen would drift.
        if width == 0 || grapheme.chars().any(char::is_control) {
            return Self {
                grapheme: Grapheme::Char(REPLACEMENT),
                width: 1,
                style,
            };
        }
        Self {
            grapheme: Grapheme::from_str(grapheme),
            width: u8::try_from(width.min(2)).unwrap_or(1),
            style,
        }
    }

    /// Create a cell from a single character.
    #[must_use]
    pub fn from_char(ch: char) -> Self {
        let mut buf = [0u8; 4];
        Self::new(ch.encode_utf8(&mut buf))
    }

    /// Create the continuation half of a wide character.
    ///
    /// Carries the lead cell's style so the pair compares consistently.
    #[inline]
    #[must_use]
    pub const fn continuation(style: Style) -> Self {
        Self {
            grapheme: Grapheme::Continuation,
            width: 0,
            style,
        }
    }

    /// A blank cell with the given style (used for background fills).
    #[inline]
    #[must_use]
    pub const fn blank(style: Style) -> Self {
        Self {
            grapheme: Grapheme::Char(' '),
            width: 1,
            style,
        }
    }

    // ─── Queries ──────────────────────────────────────────────────────────

    /// Display width in columns: 1 or 2, or 0 for a continuation cell.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u8 {
        self.width
    }

    /// Whether this is the second column of a wide character.
    #[inline]
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Whether this cell is the first column of a wide character.
    #[inline]
    #[must_use]
    pub const fn is_wide(&self) -> bool {
        self.width == 2
    }

    /// Whether this cell is a space with the default style.
    #[inline]
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.grapheme == Grapheme::Char(' ') && self.style.is_default()
    }

    /// Whether this cell shows nothing but its background (a space).
    #[inline]
    #[must_use]
    pub fn is_space(&self) -> bool {
        self.grapheme == Grapheme::Char(' ')
    }

    /// The grapheme text. Empty for continuation cells.
    #[must_use]
    pub fn grapheme(&self) -> Cow<'_, str> {
        match &self.grapheme {
            Grapheme::Continuation => Cow::Borrowed(""),
            Grapheme::Char(c) => Cow::Owned(c.to_string()),
            Grapheme::Cluster(s) => Cow::Borrowed(s),
        }
    }

    /// Byte length of the grapheme in UTF-8.
    #[must_use]
    pub fn grapheme_len(&self) -> usize {
        match &self.grapheme {
            Grapheme::Continuation => 0,
            Grapheme::Char(c) => c.len_utf8(),
            Grapheme::Cluster(s) => s.len(),
        }
    }

    /// Append the grapheme to `out` without an intermediate allocation.
    pub fn push_grapheme(&self, out: &mut String) {
        match &self.grapheme {
            Grapheme::Continuation => {}
            Grapheme::Char(c) => out.push(*c),
            Grapheme::Cluster(s) => out.push_str(s),
        }
    }

    // ─── Builders ─────────────────────────────────────────────────────────

    /// Replace the style.
    #[inline]
    #[must_use]
    pub fn with_style(self, style: Style) -> Self {
        Self { style, ..self }
    }

    /// Set the foreground color.
    #[inline]
    #[must_use]
    pub fn with_fg(self, fg: Color) -> Self {
        let style = self.style.with_fg(fg);
        Self { style, ..self }
    }

    /// Set the background color.
    #[inline]
    #[must_use]
    pub fn with_bg(self, bg: Color) -> Self {
        let style = self.style.with_bg(bg);
        Self { style, ..self }
    }

    /// Set text attributes.
    #[inline]
    #[must_use]
    pub fn with_attrs(self, attrs: Attr) -> Self {
        let style = self.style.with_attrs(attrs);
        Self { style, ..self }
    }

    /// Reset this cell to blank.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::BLANK;
    }
}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::BLANK
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_continuation() {
            return write!(f, "Cell(continuation)");
        }
        write!(f, "Cell({:?}", self.grapheme())?;
        if self.width == 2 {
            write!(f, ", wide")?;
        }
        if !self.style.is_default() {
            write!(f, ", {:?}", self.style)?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
