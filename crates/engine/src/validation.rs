//! Data validation rules
//!
//! Rules constrain how cell values are presented, not what gets stored: a
//! failing value still holds its computed result, it just renders as plain
//! text instead of the rule's special presentation (e.g. a checkbox).
//!
//! ## Matching
//!
//! Boolean recognition is case-insensitive over the rule's accepted
//! representations (`TRUE`/`FALSE` by default). Richer per-cell precedence
//! between overlapping rules is the surrounding system's concern: here the
//! first rule covering a cell, in registration order, wins.

use serde::{Deserialize, Serialize};

use crate::formula::eval::Value;
use crate::zone::Zone;

/// What a rule checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RuleKind {
    /// Cell must hold a boolean; recognized values render as a checkbox.
    /// Empty `accepted` means the default representations TRUE/FALSE.
    IsBoolean { accepted: Vec<String> },
}

/// A validation rule attached to one or more zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: String,
    pub zones: Vec<Zone>,
    pub kind: RuleKind,
}

impl ValidationRule {
    pub fn is_boolean(id: impl Into<String>, zones: Vec<Zone>) -> ValidationRule {
        ValidationRule { id: id.into(), zones, kind: RuleKind::IsBoolean { accepted: Vec::new() } }
    }

    pub fn covers(&self, row: usize, col: usize) -> bool {
        self.zones.iter().any(|z| z.contains(row, col))
    }

    /// Does `value` satisfy this rule? Presentation-only: a `false` answer
    /// never blocks the value from being stored.
    pub fn accepts(&self, value: &Value) -> bool {
        match &self.kind {
            RuleKind::IsBoolean { accepted } => recognize_boolean(value, accepted).is_some(),
        }
    }
}

/// Recognize `value` as a boolean under the rule's accepted representations.
pub fn recognize_boolean(value: &Value, accepted: &[String]) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Text(t) => {
            if accepted.is_empty() {
                if t.eq_ignore_ascii_case("TRUE") {
                    Some(true)
                } else if t.eq_ignore_ascii_case("FALSE") {
                    Some(false)
                } else {
                    None
                }
            } else {
                // Custom representations: first entry is the truthy one
                accepted
                    .iter()
                    .position(|a| a.eq_ignore_ascii_case(t))
                    .map(|idx| idx == 0)
            }
        }
        _ => None,
    }
}

/// The rules active for a sheet. Process-lifetime; mutated only by explicit
/// add/remove, never implicitly by evaluation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationSet {
    rules: Vec<ValidationRule>,
}

impl ValidationSet {
    pub fn new() -> ValidationSet {
        ValidationSet::default()
    }

    /// Add a rule. Re-adding an id replaces the existing rule in place.
    pub fn add(&mut self, rule: ValidationRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(slot) => *slot = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<ValidationRule> {
        let pos = self.rules.iter().position(|r| r.id == id)?;
        Some(self.rules.remove(pos))
    }

    /// First rule covering the cell, in registration order.
    pub fn rule_for(&self, row: usize, col: usize) -> Option<&ValidationRule> {
        self.rules.iter().find(|r| r.covers(row, col))
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut [ValidationRule] {
        &mut self.rules
    }
}
