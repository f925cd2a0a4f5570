//! Sheet - sparse cell storage, recalculation, and presentation
//!
//! The sheet owns committed cell content, computed values, formats, and the
//! validation rules that apply to it. The function registry is handed in by
//! the caller on every mutation so registry changes are visible immediately,
//! with no caching staleness window.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::cell::{Alignment, Cell, CellFormat, VerticalAlignment};
use crate::formula::eval::{self, Value};
use crate::formula::registry::FunctionRegistry;
use crate::validation::{recognize_boolean, RuleKind, ValidationRule, ValidationSet};
use crate::zone::Zone;

/// How a cell should be presented to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellDisplay {
    Blank,
    Text(String),
    /// Checkbox glyph instead of text. Non-interactive when the cell holds
    /// a formula or the sheet is read-only.
    Checkbox { checked: bool, interactive: bool },
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    cells: FxHashMap<(usize, usize), Cell>,
    pub validations: ValidationSet,
    pub read_only: bool,
}

impl Sheet {
    pub fn new() -> Sheet {
        Sheet::default()
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.cells.get(&(row, col))
    }

    pub fn content(&self, row: usize, col: usize) -> &str {
        self.cells.get(&(row, col)).map_or("", |c| c.content.as_str())
    }

    /// Computed value; Empty for absent cells.
    pub fn value(&self, row: usize, col: usize) -> Value {
        self.cells.get(&(row, col)).map_or(Value::Empty, |c| c.computed.clone())
    }

    pub fn is_empty_cell(&self, row: usize, col: usize) -> bool {
        self.cells.get(&(row, col)).map_or(true, |c| c.is_empty())
    }

    fn cell_entry(&mut self, row: usize, col: usize) -> &mut Cell {
        self.cells.entry((row, col)).or_default()
    }

    /// Commit content into a cell and recalculate. Clearing content on an
    /// unformatted cell drops the entry entirely.
    pub fn set_content(&mut self, row: usize, col: usize, text: &str, registry: &FunctionRegistry) {
        let text = text.trim();
        if text.is_empty() {
            let drop_entry = match self.cells.get_mut(&(row, col)) {
                Some(cell) => {
                    cell.content.clear();
                    cell.computed = Value::Empty;
                    cell.format.is_default()
                }
                None => false,
            };
            if drop_entry {
                self.cells.remove(&(row, col));
            }
        } else {
            let cell = self.cell_entry(row, col);
            cell.content = text.to_string();
        }
        self.recalculate(registry);
    }

    /// Recompute every cell holding content. A whole-sheet sweep keeps
    /// formulas consistent with the latest literals and registry state.
    pub fn recalculate(&mut self, registry: &FunctionRegistry) {
        for cell in self.cells.values_mut() {
            if !cell.content.is_empty() {
                cell.computed = eval::evaluate(&cell.content, registry);
            }
        }
    }

    pub fn format(&self, row: usize, col: usize) -> CellFormat {
        self.cells.get(&(row, col)).map_or_else(CellFormat::default, |c| c.format.clone())
    }

    pub fn format_mut(&mut self, row: usize, col: usize) -> &mut CellFormat {
        &mut self.cell_entry(row, col).format
    }

    /// Add a validation rule. A boolean rule defaults every covered cell to
    /// center/middle alignment at add time, but never overwrites an explicit
    /// alignment override or any unrelated style property.
    pub fn add_validation(&mut self, rule: ValidationRule) {
        if let RuleKind::IsBoolean { .. } = rule.kind {
            for zone in rule.zones.clone() {
                for row in zone.top..=zone.bottom {
                    for col in zone.left..=zone.right {
                        let format = self.format_mut(row, col);
                        if format.align.is_none() {
                            format.align = Some(Alignment::Center);
                        }
                        if format.vertical_align.is_none() {
                            format.vertical_align = Some(VerticalAlignment::Middle);
                        }
                    }
                }
            }
        }
        self.validations.add(rule);
    }

    pub fn remove_validation(&mut self, id: &str) -> Option<ValidationRule> {
        self.validations.remove(id)
    }

    /// Decide how a cell renders, consulting any validation rule covering it.
    pub fn display(&self, row: usize, col: usize) -> CellDisplay {
        let value = self.value(row, col);
        let Some(rule) = self.validations.rule_for(row, col) else {
            return match value {
                Value::Empty => CellDisplay::Blank,
                other => CellDisplay::Text(other.to_display()),
            };
        };
        match &rule.kind {
            RuleKind::IsBoolean { accepted } => {
                let is_formula = self.cells.get(&(row, col)).map_or(false, |c| c.is_formula());
                let interactive = !is_formula && !self.read_only;
                match recognize_boolean(&value, accepted) {
                    Some(checked) => CellDisplay::Checkbox { checked, interactive },
                    // An empty covered cell is an unchecked checkbox; any
                    // other unrecognized value renders as literal text
                    None if value == Value::Empty => {
                        CellDisplay::Checkbox { checked: false, interactive }
                    }
                    None => CellDisplay::Text(value.to_display()),
                }
            }
        }
    }

    /// Expand a single-cell anchor to the contiguous block of non-empty
    /// cells around it (table auto-detection for sort and similar actions).
    pub fn expand_to_table(&self, row: usize, col: usize) -> Zone {
        let mut zone = Zone::cell(row, col);
        loop {
            let mut grew = false;

            if zone.top > 0
                && (zone.left..=zone.right).any(|c| !self.is_empty_cell(zone.top - 1, c))
            {
                zone.top -= 1;
                grew = true;
            }
            if (zone.left..=zone.right).any(|c| !self.is_empty_cell(zone.bottom + 1, c)) {
                zone.bottom += 1;
                grew = true;
            }
            if zone.left > 0
                && (zone.top..=zone.bottom).any(|r| !self.is_empty_cell(r, zone.left - 1))
            {
                zone.left -= 1;
                grew = true;
            }
            if (zone.top..=zone.bottom).any(|r| !self.is_empty_cell(r, zone.right + 1)) {
                zone.right += 1;
                grew = true;
            }

            if !grew {
                return zone;
            }
        }
    }

    /// Swap the full cell payload between two positions. Used by the sort
    /// engine to move rows atomically, styling included.
    pub(crate) fn take_cell(&mut self, row: usize, col: usize) -> Option<Cell> {
        self.cells.remove(&(row, col))
    }

    pub(crate) fn put_cell(&mut self, row: usize, col: usize, cell: Option<Cell>) {
        match cell {
            Some(cell) => {
                self.cells.insert((row, col), cell);
            }
            None => {
                self.cells.remove(&(row, col));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> FunctionRegistry {
        FunctionRegistry::with_builtins()
    }

    fn sheet_with(contents: &[(usize, usize, &str)]) -> Sheet {
        let registry = registry();
        let mut sheet = Sheet::new();
        for (row, col, text) in contents {
            sheet.set_content(*row, *col, text, &registry);
        }
        sheet
    }

    // =========================================================================
    // Content and recalculation
    // =========================================================================

    #[test]
    fn test_set_content_computes_value() {
        let sheet = sheet_with(&[(0, 0, "=SUM(1,2)")]);
        assert_eq!(sheet.value(0, 0), Value::Number(3.0));
    }

    #[test]
    fn test_unknown_function_is_stored_as_error() {
        let sheet = sheet_with(&[(0, 0, "=NOPE(1)")]);
        assert!(sheet.value(0, 0).is_error());
        // Content is preserved even though computation failed
        assert_eq!(sheet.content(0, 0), "=NOPE(1)");
    }

    #[test]
    fn test_registry_changes_visible_on_recalculate() {
        let mut registry = registry();
        let mut sheet = Sheet::new();
        sheet.set_content(0, 0, "=DOUBLE(4)", &registry);
        assert!(sheet.value(0, 0).is_error());

        registry.add(crate::formula::registry::FunctionDescriptor::new(
            "DOUBLE",
            "",
            |args| match args.first() {
                Some(Value::Number(n)) => Ok(Value::Number(n * 2.0)),
                _ => Ok(Value::Empty),
            },
        ));
        sheet.recalculate(&registry);
        assert_eq!(sheet.value(0, 0), Value::Number(8.0));
    }

    #[test]
    fn test_clearing_unformatted_cell_drops_it() {
        let registry = registry();
        let mut sheet = sheet_with(&[(0, 0, "x")]);
        sheet.set_content(0, 0, "", &registry);
        assert!(sheet.cell(0, 0).is_none());
    }

    #[test]
    fn test_clearing_formatted_cell_keeps_format() {
        let registry = registry();
        let mut sheet = sheet_with(&[(0, 0, "x")]);
        sheet.format_mut(0, 0).bold = true;
        sheet.set_content(0, 0, "", &registry);
        assert!(sheet.cell(0, 0).is_some());
        assert!(sheet.format(0, 0).bold);
    }

    // =========================================================================
    // Validation: alignment defaulting
    // =========================================================================

    #[test]
    fn test_boolean_rule_defaults_alignment() {
        let mut sheet = Sheet::new();
        sheet.add_validation(ValidationRule::is_boolean(
            "id",
            vec![Zone::new(0, 0, 1, 0).unwrap()],
        ));
        for row in 0..=1 {
            let format = sheet.format(row, 0);
            assert_eq!(format.align, Some(Alignment::Center));
            assert_eq!(format.vertical_align, Some(VerticalAlignment::Middle));
        }
    }

    #[test]
    fn test_boolean_rule_does_not_overwrite_explicit_alignment() {
        let mut sheet = Sheet::new();
        sheet.format_mut(0, 0).align = Some(Alignment::Left);
        sheet.format_mut(0, 0).vertical_align = Some(VerticalAlignment::Top);
        sheet.format_mut(1, 0).fill_color = Some("#FF0000".to_string());

        sheet.add_validation(ValidationRule::is_boolean(
            "id",
            vec![Zone::new(0, 0, 1, 0).unwrap()],
        ));

        let format = sheet.format(0, 0);
        assert_eq!(format.align, Some(Alignment::Left));
        assert_eq!(format.vertical_align, Some(VerticalAlignment::Top));

        // Unrelated style on the second cell survives, alignment defaulted
        let format = sheet.format(1, 0);
        assert_eq!(format.fill_color, Some("#FF0000".to_string()));
        assert_eq!(format.align, Some(Alignment::Center));
        assert_eq!(format.vertical_align, Some(VerticalAlignment::Middle));
    }

    // =========================================================================
    // Validation: checkbox presentation
    // =========================================================================

    #[test]
    fn test_valid_boolean_renders_as_checkbox() {
        let mut sheet = sheet_with(&[(1, 1, "TRUE")]);
        sheet.add_validation(ValidationRule::is_boolean("id", vec![Zone::cell(1, 1)]));
        assert_eq!(
            sheet.display(1, 1),
            CellDisplay::Checkbox { checked: true, interactive: true }
        );
    }

    #[test]
    fn test_invalid_value_renders_as_text() {
        let mut sheet = sheet_with(&[(1, 1, "hello")]);
        sheet.add_validation(ValidationRule::is_boolean("id", vec![Zone::cell(1, 1)]));
        assert_eq!(sheet.display(1, 1), CellDisplay::Text("hello".to_string()));
        // The stored value is untouched by the failed validation
        assert_eq!(sheet.value(1, 1), Value::Text("hello".to_string()));
    }

    #[test]
    fn test_formula_checkbox_is_not_interactive() {
        let mut sheet = sheet_with(&[(0, 0, "=TRUE")]);
        sheet.add_validation(ValidationRule::is_boolean("id", vec![Zone::cell(0, 0)]));
        assert_eq!(
            sheet.display(0, 0),
            CellDisplay::Checkbox { checked: true, interactive: false }
        );
    }

    #[test]
    fn test_readonly_checkbox_is_not_interactive() {
        let mut sheet = sheet_with(&[(0, 0, "TRUE")]);
        sheet.add_validation(ValidationRule::is_boolean("id", vec![Zone::cell(0, 0)]));
        sheet.read_only = true;
        assert_eq!(
            sheet.display(0, 0),
            CellDisplay::Checkbox { checked: true, interactive: false }
        );
    }

    #[test]
    fn test_empty_covered_cell_is_unchecked_checkbox() {
        let mut sheet = Sheet::new();
        sheet.add_validation(ValidationRule::is_boolean("id", vec![Zone::cell(0, 0)]));
        assert_eq!(
            sheet.display(0, 0),
            CellDisplay::Checkbox { checked: false, interactive: true }
        );
    }

    #[test]
    fn test_uncovered_cell_renders_plainly() {
        let sheet = sheet_with(&[(0, 0, "12")]);
        assert_eq!(sheet.display(0, 0), CellDisplay::Text("12".to_string()));
        assert_eq!(sheet.display(5, 5), CellDisplay::Blank);
    }

    // =========================================================================
    // Table auto-detection
    // =========================================================================

    #[test]
    fn test_expand_to_table() {
        let sheet = sheet_with(&[
            (1, 1, "a"),
            (1, 2, "b"),
            (2, 1, "c"),
            (2, 2, "d"),
            (3, 1, "e"),
            // Detached island
            (8, 8, "far"),
        ]);
        assert_eq!(sheet.expand_to_table(2, 1), Zone::new(1, 1, 3, 2).unwrap());
        assert_eq!(sheet.expand_to_table(8, 8), Zone::cell(8, 8));
    }

    #[test]
    fn test_expand_to_table_on_empty_cell() {
        let sheet = Sheet::new();
        assert_eq!(sheet.expand_to_table(4, 4), Zone::cell(4, 4));
    }
}
