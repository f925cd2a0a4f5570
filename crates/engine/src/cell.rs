//! Cells and cell formatting

use serde::{Deserialize, Serialize};

use crate::formula::eval::Value;

/// Horizontal text alignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Vertical text alignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum VerticalAlignment {
    Top,
    Middle,
    Bottom,
}

/// Cell formatting options.
///
/// Alignment fields are `None` until the user (or a rule) sets them, so
/// "never styled" is distinguishable from an explicit choice. Rules that
/// default alignment must not clobber an explicit override.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CellFormat {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub align: Option<Alignment>,
    pub vertical_align: Option<VerticalAlignment>,
    pub fill_color: Option<String>,
    pub font_family: Option<String>, // None = inherit from settings
}

impl CellFormat {
    pub fn is_default(&self) -> bool {
        *self == CellFormat::default()
    }
}

/// A single cell: the raw text the user committed, the computed value, and
/// formatting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    pub content: String,
    pub computed: Value,
    pub format: CellFormat,
}

impl Cell {
    pub fn is_formula(&self) -> bool {
        self.content.starts_with('=')
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Coerce literal (non-formula) input to a value: number, boolean, or text.
pub fn literal_value(input: &str) -> Value {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Value::Empty;
    }
    if let Ok(num) = trimmed.parse::<f64>() {
        return Value::Number(num);
    }
    if trimmed.eq_ignore_ascii_case("TRUE") {
        return Value::Boolean(true);
    }
    if trimmed.eq_ignore_ascii_case("FALSE") {
        return Value::Boolean(false);
    }
    Value::Text(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_default_has_no_alignment() {
        let format = CellFormat::default();
        assert_eq!(format.align, None);
        assert_eq!(format.vertical_align, None);
        assert!(format.is_default());
    }

    #[test]
    fn test_literal_number() {
        assert_eq!(literal_value("42"), Value::Number(42.0));
        assert_eq!(literal_value(" 3.5 "), Value::Number(3.5));
        assert_eq!(literal_value("-1"), Value::Number(-1.0));
    }

    #[test]
    fn test_literal_boolean_case_insensitive() {
        assert_eq!(literal_value("TRUE"), Value::Boolean(true));
        assert_eq!(literal_value("false"), Value::Boolean(false));
    }

    #[test]
    fn test_literal_text_and_empty() {
        assert_eq!(literal_value("hello"), Value::Text("hello".to_string()));
        assert_eq!(literal_value(""), Value::Empty);
        assert_eq!(literal_value("   "), Value::Empty);
    }

    #[test]
    fn test_is_formula() {
        let mut cell = Cell::default();
        cell.content = "=SUM(1,2)".to_string();
        assert!(cell.is_formula());
        cell.content = "12".to_string();
        assert!(!cell.is_formula());
    }
}
