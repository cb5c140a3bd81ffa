//! CSS generated from code and served as `/ui.css`.
//!
//! Components (`.ui-button`, `.ui-input`, `.ui-menu`, ...) get their layout
//! from [`components`] and their colors from each [`Theme`], so a palette
//! change never touches layout rules.

pub mod components;
pub mod props;
pub mod sheet;
pub mod style;
pub mod theme;

pub use props::{Color, Unit};
pub use sheet::StyleSheet;
pub use style::Style;
pub use theme::Theme;
