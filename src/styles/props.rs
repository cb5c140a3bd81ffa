//! Typed CSS values.

use std::fmt;

/// A CSS color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    Rgba { r: u8, g: u8, b: u8, a: u8 },
    Transparent,
    CurrentColor,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self::Rgba { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 255)
    }

    /// Same color with a different alpha (0-255). Keywords are unchanged.
    pub const fn alpha(self, a: u8) -> Self {
        match self {
            Self::Rgba { r, g, b, .. } => Self::Rgba { r, g, b, a },
            other => other,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rgba { r, g, b, a } => {
                write!(f, "rgba({r},{g},{b},{:.2})", f32::from(*a) / 255.0)
            }
            Self::Transparent => f.write_str("transparent"),
            Self::CurrentColor => f.write_str("currentColor"),
        }
    }
}

/// A CSS length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Unit {
    Px(f32),
    Rem(f32),
    Em(f32),
    Percent(f32),
    /// Unitless, e.g. `0` or a line-height multiplier
    Raw(f32),
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Px(n) => write!(f, "{n}px"),
            Self::Rem(n) => write!(f, "{n}rem"),
            Self::Em(n) => write!(f, "{n}em"),
            Self::Percent(n) => write!(f, "{n}%"),
            Self::Raw(n) => write!(f, "{n}"),
        }
    }
}

/// Tailwind-style palette and scale used by the components.
pub mod palette {
    use super::{Color, Unit};

    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const NEUTRAL_100: Color = Color::rgb(245, 245, 245);
    pub const NEUTRAL_300: Color = Color::rgb(212, 212, 212);
    pub const NEUTRAL_400: Color = Color::rgb(163, 163, 163);
    pub const NEUTRAL_500: Color = Color::rgb(115, 115, 115);
    pub const NEUTRAL_600: Color = Color::rgb(82, 82, 82);
    pub const NEUTRAL_900: Color = Color::rgb(23, 23, 23);
    pub const RED_600: Color = Color::rgb(220, 38, 38);
    pub const RED_700: Color = Color::rgb(185, 28, 28);

    pub const FONT_SM: Unit = Unit::Rem(0.875);
    pub const LEADING_TIGHT: Unit = Unit::Rem(1.25);
    pub const RADIUS_SM: Unit = Unit::Rem(0.25);
    pub const RADIUS: Unit = Unit::Rem(0.375);
    pub const SIZE_1: Unit = Unit::Rem(0.25);
    pub const SIZE_2: Unit = Unit::Rem(0.5);
    pub const SIZE_3: Unit = Unit::Rem(0.75);
    pub const SIZE_4: Unit = Unit::Rem(1.0);
    pub const SIZE_10: Unit = Unit::Rem(2.5);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_display() {
        assert_eq!(Color::rgb(23, 23, 23).to_string(), "rgba(23,23,23,1.00)");
        assert_eq!(Color::rgb(0, 0, 0).alpha(230).to_string(), "rgba(0,0,0,0.90)");
        assert_eq!(Color::rgba(1, 2, 3, 0).to_string(), "rgba(1,2,3,0.00)");
        assert_eq!(Color::Transparent.to_string(), "transparent");
        assert_eq!(Color::Transparent.alpha(10), Color::Transparent);
    }

    #[test]
    fn test_unit_display() {
        assert_eq!(Unit::Px(1.0).to_string(), "1px");
        assert_eq!(Unit::Rem(0.875).to_string(), "0.875rem");
        assert_eq!(Unit::Rem(-0.25).to_string(), "-0.25rem");
        assert_eq!(Unit::Em(1.0).to_string(), "1em");
        assert_eq!(Unit::Percent(100.0).to_string(), "100%");
        assert_eq!(Unit::Raw(0.0).to_string(), "0");
    }
}
