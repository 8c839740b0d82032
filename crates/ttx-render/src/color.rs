// SPDX-License-Identifier: MIT
//
// Cell colors: the three things a terminal can be told about color.
//
// A cell's foreground, background, or underline color is either the
// terminal's configured default, an entry of the 256-color palette, or a
// 24-bit RGB triple. That is all the SGR dialect can express, so that is all
// we store. Colors are small `Copy` values; equality is structural (same
// variant, same payload), which is exactly what the diff engine needs.
//
// Terminals that cannot do 24-bit color get a downgraded value at encode
// time (see `to_indexed256` / `to_ansi16`). Snapshots always keep the exact
// color the compositor asked for.

use std::fmt;

use crate::error::{Error, Result};

// ─── Color ───────────────────────────────────────────────────────────────────

/// A terminal cell color.
///
/// # Examples
///
/// ```
/// use ttx_render::color::Color;
///
/// let red = Color::rgb(255, 0, 0);
/// let palette = Color::indexed(196).unwrap();
///
/// assert_ne!(red, palette);                   // different variants
/// assert!(!red.visually_distinguishable(&palette)); // same on screen
/// assert!(Color::indexed(256).is_err());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// Terminal default color (inherits the user's terminal theme).
    #[default]
    Default,

    /// 256-color palette index.
    Indexed(u8),

    /// 24-bit `TrueColor`.
    TrueColor(u8, u8, u8),
}

/// Per-channel tolerance below which two resolved colors count as the same
/// on screen.
const DISTINGUISHABLE_TOLERANCE: u8 = 2;

impl Color {
    /// Palette color from an index coming from a wider integer (parsed
    /// escape parameters, configuration).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidColorIndex`] if `index > 255`.
    pub fn indexed(index: u16) -> Result<Self> {
        u8::try_from(index)
            .map(Self::Indexed)
            .map_err(|_| Error::InvalidColorIndex(index))
    }

    /// 24-bit color.
    #[inline]
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::TrueColor(r, g, b)
    }

    /// Parse `#RGB` or `#RRGGBB` (the `#` is optional).
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.strip_prefix('#').unwrap_or(s);
        let bytes = s.as_bytes();
        match bytes.len() {
            3 => {
                let r = parse_hex_digit(bytes[0])?;
                let g = parse_hex_digit(bytes[1])?;
                let b = parse_hex_digit(bytes[2])?;
                Some(Self::rgb(r << 4 | r, g << 4 | g, b << 4 | b))
            }
            6 => Some(Self::rgb(
                parse_hex_byte(&bytes[0..2])?,
                parse_hex_byte(&bytes[2..4])?,
                parse_hex_byte(&bytes[4..6])?,
            )),
            _ => None,
        }
    }

    /// Whether this is the terminal default color.
    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// Resolve to RGB. Palette entries use the xterm reference palette;
    /// [`Color::Default`] has no fixed value and returns `None`.
    #[must_use]
    pub fn to_rgb(self) -> Option<(u8, u8, u8)> {
        match self {
            Self::Default => None,
            Self::Indexed(idx) => Some(palette::ansi256_to_rgb(idx)),
            Self::TrueColor(r, g, b) => Some((r, g, b)),
        }
    }

    /// Whether two colors would look different on a terminal using the
    /// reference palette. `Default` is only indistinguishable from itself.
    #[must_use]
    pub fn visually_distinguishable(&self, other: &Self) -> bool {
        match (self.to_rgb(), other.to_rgb()) {
            (None, None) => false,
            (Some(a), Some(b)) => {
                a.0.abs_diff(b.0) > DISTINGUISHABLE_TOLERANCE
                    || a.1.abs_diff(b.1) > DISTINGUISHABLE_TOLERANCE
                    || a.2.abs_diff(b.2) > DISTINGUISHABLE_TOLERANCE
            }
            _ => true,
        }
    }

    /// Downgrade to the 256-color palette (for terminals without `TrueColor`).
    #[must_use]
    pub fn to_indexed256(self) -> Self {
        match self {
            Self::TrueColor(r, g, b) => Self::Indexed(palette::nearest_ansi256(r, g, b)),
            other => other,
        }
    }

    /// Downgrade to the 16 system colors (for minimal terminals).
    #[must_use]
    pub fn to_ansi16(self) -> Self {
        match self {
            Self::Default => Self::Default,
            Self::Indexed(idx) if idx < 16 => self,
            other => match other.to_rgb() {
                Some((r, g, b)) => Self::Indexed(palette::nearest_ansi16(r, g, b)),
                None => Self::Default,
            },
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TrueColor(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
            Self::Indexed(idx) => write!(f, "indexed({idx})"),
            Self::Default => write!(f, "default"),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[inline]
const fn parse_hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

#[inline]
fn parse_hex_byte(bytes: &[u8]) -> Option<u8> {
    let hi = parse_hex_digit(bytes[0])?;
    let lo = parse_hex_digit(bytes[1])?;
    Some(hi << 4 | lo)
}

// ─── Palette ─────────────────────────────────────────────────────────────────

pub mod palette {
    //! The xterm 256-color palette and nearest-match helpers.
    //!
    //! - Colors 0–7: standard colors
    //! - Colors 8–15: bright variants
    //! - Colors 16–231: a 6×6×6 RGB cube
    //! - Colors 232–255: a 24-step grayscale ramp

    /// The 16 system colors as RGB values (xterm defaults).
    pub const ANSI16_RGB: [(u8, u8, u8); 16] = [
        (0, 0, 0),       // 0: Black
        (128, 0, 0),     // 1: Red
        (0, 128, 0),     // 2: Green
        (128, 128, 0),   // 3: Yellow
        (0, 0, 128),     // 4: Blue
        (128, 0, 128),   // 5: Magenta
        (0, 128, 128),   // 6: Cyan
        (192, 192, 192), // 7: White
        (128, 128, 128), // 8: Bright Black
        (255, 0, 0),     // 9: Bright Red
        (0, 255, 0),     // 10: Bright Green
        (255, 255, 0),   // 11: Bright Yellow
        (0, 0, 255),     // 12: Bright Blue
        (255, 0, 255),   // 13: Bright Magenta
        (0, 255, 255),   // 14: Bright Cyan
        (255, 255, 255), // 15: Bright White
    ];

    /// Channel levels of the 6×6×6 cube.
    const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

    /// Convert a palette index to RGB values.
    #[must_use]
    pub fn ansi256_to_rgb(idx: u8) -> (u8, u8, u8) {
        match idx {
            0..=15 => ANSI16_RGB[idx as usize],
            16..=231 => {
                let idx = idx - 16;
                (
                    CUBE_LEVELS[usize::from(idx / 36)],
                    CUBE_LEVELS[usize::from((idx % 36) / 6)],
                    CUBE_LEVELS[usize::from(idx % 6)],
                )
            }
            232..=255 => {
                let v = 8 + 10 * (idx - 232);
                (v, v, v)
            }
        }
    }

    /// Squared RGB distance.
    fn distance(a: (u8, u8, u8), b: (u8, u8, u8)) -> u32 {
        let dr = u32::from(a.0.abs_diff(b.0));
        let dg = u32::from(a.1.abs_diff(b.1));
        let db = u32::from(a.2.abs_diff(b.2));
        dr * dr + dg * dg + db * db
    }

    /// Index of the cube level nearest to `v`.
    #[allow(clippy::cast_possible_truncation)]
    fn nearest_level(v: u8) -> u8 {
        CUBE_LEVELS
            .iter()
            .enumerate()
            .min_by_key(|&(_, &level)| level.abs_diff(v))
            .map_or(0, |(i, _)| i as u8)
    }

    /// Nearest entry in the cube or the grey ramp (indices 16–255).
    ///
    /// The system colors 0–15 are skipped: users re-theme them, so they are
    /// not a stable target for an exact RGB request.
    #[must_use]
    pub fn nearest_ansi256(r: u8, g: u8, b: u8) -> u8 {
        let (ri, gi, bi) = (nearest_level(r), nearest_level(g), nearest_level(b));
        let cube_idx = 16 + 36 * ri + 6 * gi + bi;
        let cube_rgb = ansi256_to_rgb(cube_idx);

        let avg = (u16::from(r) + u16::from(g) + u16::from(b)) / 3;
        let grey_step = u8::try_from(avg.saturating_sub(3) / 10).unwrap_or(23).min(23);
        let grey_idx = 232 + grey_step;
        let grey_rgb = ansi256_to_rgb(grey_idx);

        if distance((r, g, b), grey_rgb) < distance((r, g, b), cube_rgb) {
            grey_idx
        } else {
            cube_idx
        }
    }

    /// Nearest of the 16 system colors.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn nearest_ansi16(r: u8, g: u8, b: u8) -> u8 {
        ANSI16_RGB
            .iter()
            .enumerate()
            .min_by_key(|&(_, &rgb)| distance((r, g, b), rgb))
            .map_or(0, |(i, _)| i as u8)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Construction ─────────────────────────────────────────────────────

    #[test]
    fn indexed_accepts_full_palette() {
        assert_eq!(Color::indexed(0).unwrap(), Color::Indexed(0));
        assert_eq!(Color::indexed(255).unwrap(), Color::Indexed(255));
    }

    #[test]
    fn indexed_rejects_out_of_range() {
        let err = Color::indexed(256).unwrap_err();
        assert!(matches!(err, Error::InvalidColorIndex(256)));
    }

    #[test]
    fn default_is_default_variant() {
        assert_eq!(Color::default(), Color::Default);
        assert!(Color::Default.is_default());
        assert!(!Color::rgb(0, 0, 0).is_default());
    }

    #[test]
    fn hex_parsing() {
        assert_eq!(Color::from_hex("#ff8000"), Some(Color::rgb(255, 128, 0)));
        assert_eq!(Color::from_hex("f80"), Some(Color::rgb(255, 136, 0)));
        assert_eq!(Color::from_hex("#zzzzzz"), None);
        assert_eq!(Color::from_hex("#12345"), None);
    }

    // ── Equality ─────────────────────────────────────────────────────────

    #[test]
    fn equality_is_structural() {
        assert_eq!(Color::rgb(1, 2, 3), Color::TrueColor(1, 2, 3));
        assert_ne!(Color::Indexed(1), Color::rgb(128, 0, 0));
        assert_ne!(Color::Default, Color::Indexed(0));
    }

    // ── Palette ──────────────────────────────────────────────────────────

    #[test]
    fn palette_cube_corners() {
        assert_eq!(palette::ansi256_to_rgb(16), (0, 0, 0));
        assert_eq!(palette::ansi256_to_rgb(196), (255, 0, 0));
        assert_eq!(palette::ansi256_to_rgb(231), (255, 255, 255));
    }

    #[test]
    fn palette_grey_ramp() {
        assert_eq!(palette::ansi256_to_rgb(232), (8, 8, 8));
        assert_eq!(palette::ansi256_to_rgb(255), (238, 238, 238));
    }

    #[test]
    fn nearest_ansi256_exact_cube_hit() {
        assert_eq!(palette::nearest_ansi256(255, 0, 0), 196);
        assert_eq!(palette::nearest_ansi256(0, 95, 135), 16 + 6 + 2);
    }

    #[test]
    fn nearest_ansi256_prefers_grey_ramp() {
        let idx = palette::nearest_ansi256(128, 128, 128);
        assert!((232..=255).contains(&idx), "got {idx}");
    }

    #[test]
    fn nearest_ansi16_primary() {
        assert_eq!(palette::nearest_ansi16(250, 5, 5), 9);
        assert_eq!(palette::nearest_ansi16(0, 0, 0), 0);
    }

    // ── Downgrade ────────────────────────────────────────────────────────

    #[test]
    fn downgrade_keeps_default_and_palette() {
        assert_eq!(Color::Default.to_indexed256(), Color::Default);
        assert_eq!(Color::Indexed(42).to_indexed256(), Color::Indexed(42));
        assert_eq!(Color::Default.to_ansi16(), Color::Default);
        assert_eq!(Color::Indexed(3).to_ansi16(), Color::Indexed(3));
    }

    #[test]
    fn downgrade_truecolor() {
        assert_eq!(Color::rgb(255, 0, 0).to_indexed256(), Color::Indexed(196));
        assert_eq!(Color::rgb(255, 0, 0).to_ansi16(), Color::Indexed(9));
        assert_eq!(Color::Indexed(196).to_ansi16(), Color::Indexed(9));
    }

    // ── Visual distinguishability ────────────────────────────────────────

    #[test]
    fn palette_and_rgb_can_look_the_same() {
        let a = Color::Indexed(196);
        let b = Color::rgb(255, 0, 0);
        assert!(!a.visually_distinguishable(&b));
        assert!(!b.visually_distinguishable(&a));
    }

    #[test]
    fn default_only_matches_default() {
        assert!(!Color::Default.visually_distinguishable(&Color::Default));
        assert!(Color::Default.visually_distinguishable(&Color::rgb(0, 0, 0)));
    }

    #[test]
    fn close_rgb_values_are_indistinguishable() {
        assert!(!Color::rgb(100, 100, 100).visually_distinguishable(&Color::rgb(101, 99, 100)));
        assert!(Color::rgb(100, 100, 100).visually_distinguishable(&Color::rgb(110, 100, 100)));
    }

    // ── Debug ────────────────────────────────────────────────────────────

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Color::rgb(255, 0, 16)), "#ff0010");
        assert_eq!(format!("{:?}", Color::Indexed(7)), "indexed(7)");
        assert_eq!(format!("{}", Color::Default), "default");
    }
}
