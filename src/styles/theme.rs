use std::fmt::{self, Write};

use super::props::palette::{
    NEUTRAL_100, NEUTRAL_300, NEUTRAL_400, NEUTRAL_500, NEUTRAL_600, NEUTRAL_900, RED_600,
    RED_700, WHITE,
};
use super::{Color, Style};

/// Hover states darken or lighten by dropping to this alpha.
const HOVER_ALPHA: u8 = 230;

/// A color palette applied under a media query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub media_query: String,
    pub background: Color,
    pub foreground: Color,
    pub primary: Color,
    pub primary_foreground: Color,
    pub secondary: Color,
    pub secondary_foreground: Color,
    pub destructive: Color,
    pub border: Color,
    pub muted_foreground: Color,
}

impl Theme {
    pub fn light() -> Self {
        Self {
            media_query: "@media (prefers-color-scheme: light)".to_string(),
            background: WHITE,
            foreground: NEUTRAL_900,
            primary: NEUTRAL_900,
            primary_foreground: WHITE,
            secondary: NEUTRAL_300,
            secondary_foreground: NEUTRAL_900,
            destructive: RED_700,
            border: NEUTRAL_300,
            muted_foreground: NEUTRAL_500,
        }
    }

    pub fn dark() -> Self {
        Self {
            media_query: "@media (prefers-color-scheme: dark)".to_string(),
            background: NEUTRAL_900,
            foreground: NEUTRAL_100,
            primary: WHITE,
            primary_foreground: NEUTRAL_900,
            secondary: NEUTRAL_600,
            secondary_foreground: NEUTRAL_900,
            destructive: RED_600,
            border: NEUTRAL_600,
            muted_foreground: NEUTRAL_400,
        }
    }

    /// Color rules for every component, in component order.
    pub fn styles(&self) -> Vec<Style> {
        let hover = self.secondary.alpha(HOVER_ALPHA);

        vec![
            // base
            Style::new("body")
                .prop("background-color", self.background)
                .prop("color", self.foreground),
            // buttons
            Style::new(".ui-button-primary")
                .prop("background-color", self.primary)
                .prop("color", self.primary_foreground),
            Style::new(".ui-button-primary:hover")
                .prop("background-color", self.primary.alpha(HOVER_ALPHA)),
            Style::new(".ui-button-secondary")
                .prop("background-color", self.secondary)
                .prop("color", self.secondary_foreground),
            Style::new(".ui-button-secondary:hover").prop("background-color", hover),
            Style::new(".ui-button-ghost").prop("background-color", Color::Transparent),
            Style::new(".ui-button-ghost:hover").prop("background-color", hover),
            // form
            Style::new(".ui-input")
                .prop("background-color", self.background)
                .prop("border-color", self.border),
            Style::new(".ui-input-help").prop("color", self.muted_foreground),
            Style::new(".ui-input-error").prop("color", self.destructive),
            Style::new(".ui-select")
                .prop("background-color", self.background)
                .prop("border-color", self.border),
            // menu
            Style::new(".ui-menu")
                .prop("background-color", self.background)
                .prop("border-color", self.border),
            Style::new(".ui-menu-separator").prop("background-color", self.border),
            Style::new(".ui-menu-item:hover").prop("background-color", hover),
        ]
    }

    /// Render as `media_query{rules}`.
    pub fn write_css<W: Write>(&self, w: &mut W) -> fmt::Result {
        w.write_str(&self.media_query)?;
        w.write_char('{')?;
        for style in self.styles() {
            style.write_css(w)?;
        }
        w.write_char('}')
    }
}
