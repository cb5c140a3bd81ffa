//! Layout rules for the UI components. Colors live in [`super::theme`].

use super::props::Unit;
use super::props::palette::{
    FONT_SM, LEADING_TIGHT, RADIUS, RADIUS_SM, SIZE_1, SIZE_2, SIZE_3, SIZE_4, SIZE_10,
};
use super::{Color, Style};

const CHEVRON_DOWN: &str = "url(data:image/svg+xml;base64,PHN2ZyB4bWxucz0iaHR0cDovL3d3dy53My5vcmcvMjAwMC9zdmciIHdpZHRoPSIxZW0iIGhlaWdodD0iMWVtIiB2aWV3Qm94PSIwIDAgMjQgMjQiPjxwYXRoIGZpbGw9Im5vbmUiIHN0cm9rZT0iY3VycmVudENvbG9yIiBzdHJva2UtbGluZWNhcD0icm91bmQiIHN0cm9rZS1saW5lam9pbj0icm91bmQiIHN0cm9rZS13aWR0aD0iMiIgZD0ibTE5IDlsLTcgN2wtNy03Ii8+PC9zdmc+)";

fn padding(vertical: Unit, horizontal: Unit) -> String {
    format!("{vertical} {horizontal}")
}

/// Minimal preflight so components render the same across browsers.
pub fn resets() -> Vec<Style> {
    vec![
        Style::new("*,::after,::before")
            .prop("box-sizing", "border-box")
            .prop("border", "0 solid")
            .prop("margin", 0)
            .prop("padding", 0),
        Style::new("html")
            .prop("line-height", 1.5)
            .prop("-webkit-text-size-adjust", "100%")
            .prop(
                "font-family",
                "ui-sans-serif,system-ui,sans-serif,\"Apple Color Emoji\",\"Segoe UI Emoji\"",
            ),
        Style::new("a")
            .prop("color", "inherit")
            .prop("text-decoration", "inherit"),
        Style::new("button,input,select,textarea")
            .prop("font", "inherit")
            .prop("color", "inherit")
            .prop("background-color", Color::Transparent),
        Style::new("img,svg,video")
            .prop("display", "block")
            .prop("max-width", Unit::Percent(100.0)),
    ]
}

pub fn base() -> Vec<Style> {
    vec![
        Style::new("body")
            .prop("min-height", "100vh")
            .prop("-webkit-font-smoothing", "antialiased")
            .prop("-moz-osx-font-smoothing", "grayscale"),
    ]
}

pub fn buttons() -> Vec<Style> {
    vec![
        Style::new(".ui-button")
            .prop("align-items", "center")
            .prop("border-radius", RADIUS)
            .prop("display", "inline-flex")
            .prop("font-size", FONT_SM)
            .prop("font-weight", 500)
            .prop("height", SIZE_10)
            .prop("justify-content", "center")
            .prop("line-height", LEADING_TIGHT)
            .prop("padding", padding(SIZE_2, SIZE_4)),
        Style::new(".ui-button:hover").prop("cursor", "pointer"),
    ]
}

pub fn form() -> Vec<Style> {
    vec![
        Style::new(".ui-input,.ui-select")
            .prop("border", "1px solid")
            .prop("border-radius", RADIUS)
            .prop("display", "flex")
            .prop("font-size", FONT_SM)
            .prop("height", SIZE_10)
            .prop("line-height", LEADING_TIGHT)
            .prop("padding", padding(SIZE_2, SIZE_3))
            .prop("width", Unit::Percent(100.0)),
        Style::new(".ui-input::file-selector-button")
            .prop("background-color", Color::Transparent)
            .prop("border-width", Unit::Raw(0.0))
            .prop("font-size", FONT_SM)
            .prop("font-weight", 500),
        Style::new(".ui-input-label")
            .prop("font-size", FONT_SM)
            .prop("font-weight", 500)
            .prop("line-height", LEADING_TIGHT),
        Style::new(".ui-input-help").prop("font-size", FONT_SM),
        Style::new(".ui-input-error").prop("font-size", FONT_SM),
        Style::new(".ui-select:where(:not([size]))")
            .prop("appearance", "none")
            .prop("padding-right", SIZE_10)
            .prop("print-color-adjust", "exact")
            .prop("background-image", CHEVRON_DOWN)
            .prop("background-position", format!("right {SIZE_3} center"))
            .prop("background-repeat", "no-repeat")
            .prop("background-size", "1em 1em"),
    ]
}

pub fn menu() -> Vec<Style> {
    vec![
        Style::new(".ui-menu")
            .prop("border", "1px solid")
            .prop("border-radius", RADIUS)
            .prop("min-width", Unit::Rem(10.0))
            .prop("overflow", "hidden")
            .prop("padding", SIZE_1),
        Style::new(".ui-menu-label")
            .prop("font-size", FONT_SM)
            .prop("padding", padding(SIZE_1, SIZE_2)),
        Style::new(".ui-menu-separator")
            .prop("height", Unit::Px(1.0))
            .prop("margin", format!("{SIZE_1} {}", Unit::Rem(-0.25))),
        Style::new(".ui-menu-item")
            .prop("border-radius", RADIUS_SM)
            .prop("display", "block")
            .prop("font-size", FONT_SM)
            .prop("font-weight", 500)
            .prop("line-height", LEADING_TIGHT)
            .prop("padding", padding(SIZE_1, SIZE_2)),
    ]
}

/// Page scaffolding used by the templates; inline styles are blocked by the
/// default Content-Security-Policy.
pub fn layout() -> Vec<Style> {
    vec![
        Style::new(".ui-center")
            .prop("display", "grid")
            .prop("place-items", "center")
            .prop("min-height", "100vh"),
        Style::new(".ui-stack")
            .prop("display", "grid")
            .prop("gap", SIZE_4)
            .prop("width", Unit::Rem(20.0)),
        Style::new(".ui-header")
            .prop("align-items", "center")
            .prop("display", "flex")
            .prop("justify-content", "space-between")
            .prop("padding", SIZE_4),
        Style::new(".ui-container").prop("padding", SIZE_4),
        Style::new(".ui-menu-anchor").prop("position", "relative"),
        Style::new(".ui-menu-popup")
            .prop("position", "absolute")
            .prop("right", 0)
            .prop("margin-top", SIZE_1),
    ]
}
