use std::fmt::{self, Display, Write};

/// One CSS rule: a selector and its declarations in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Style {
    pub selector: String,
    pub props: Vec<(&'static str, String)>,
}

impl Style {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            props: Vec::new(),
        }
    }

    #[must_use]
    pub fn prop(mut self, name: &'static str, value: impl Display) -> Self {
        self.props.push((name, value.to_string()));
        self
    }

    /// Render as `selector{name:value;...}`.
    pub fn write_css<W: Write>(&self, w: &mut W) -> fmt::Result {
        write!(w, "{}{{", self.selector)?;
        for (name, value) in &self.props {
            write!(w, "{name}:{value};")?;
        }
        w.write_char('}')
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::styles::props::{Color, Unit};

    #[test]
    fn test_write_css_keeps_declaration_order() {
        let style = Style::new(".a,.b")
            .prop("width", Unit::Percent(100.0))
            .prop("color", Color::rgb(0, 0, 0))
            .prop("display", "flex");

        let mut css = String::new();
        style.write_css(&mut css).unwrap();
        assert_eq!(css, ".a,.b{width:100%;color:rgba(0,0,0,1.00);display:flex;}");
    }

    #[test]
    fn test_empty_rule() {
        let mut css = String::new();
        Style::new("body").write_css(&mut css).unwrap();
        assert_eq!(css, "body{}");
    }
}
