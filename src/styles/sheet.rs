use std::fmt::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use super::Theme;
use super::components;

/// The complete `/ui.css` stylesheet.
///
/// Rendered on first use and cached; later calls return the same buffer.
#[derive(Debug)]
pub struct StyleSheet {
    pub themes: Vec<Theme>,
    css: Mutex<Option<Arc<str>>>,
}

impl Default for StyleSheet {
    fn default() -> Self {
        Self::with_themes(vec![Theme::light(), Theme::dark()])
    }
}

impl StyleSheet {
    /// Light and dark `prefers-color-scheme` themes.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_themes(themes: Vec<Theme>) -> Self {
        Self {
            themes,
            css: Mutex::new(None),
        }
    }

    /// Rendered CSS, from the cache after the first call.
    pub fn css(&self) -> Result<Arc<str>, fmt::Error> {
        let mut cached = self.css.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(css) = cached.as_ref() {
            return Ok(css.clone());
        }

        let mut out = String::with_capacity(8 * 1024);
        self.write_css(&mut out)?;
        let css: Arc<str> = Arc::from(out);
        *cached = Some(css.clone());
        Ok(css)
    }

    /// Render without touching the cache.
    pub fn write_css<W: Write>(&self, w: &mut W) -> fmt::Result {
        let structural = [
            components::resets(),
            components::base(),
            components::buttons(),
            components::form(),
            components::menu(),
            components::layout(),
        ];
        for style in structural.iter().flatten() {
            style.write_css(w)?;
        }
        for theme in &self.themes {
            theme.write_css(w)?;
        }
        Ok(())
    }
}
