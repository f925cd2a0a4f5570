//! Function-name autocomplete ranking
//!
//! `rank` is a pure function from a partial symbol and the registry to a
//! fresh candidate list. Lists are replaced wholesale on every qualifying
//! edit, never mutated in place, so a stale focused index can't survive a
//! text change.

use gridlet_engine::formula::registry::FunctionRegistry;

/// Dropdown cap: never offer more than this many names.
pub const MAX_CANDIDATES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusDirection {
    Next,
    Previous,
}

/// Ranked, capped list of completion candidates with a focused entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateList {
    names: Vec<String>,
    focused: usize,
}

impl CandidateList {
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn focused_index(&self) -> usize {
        self.focused
    }

    pub fn focused_name(&self) -> Option<&str> {
        self.names.get(self.focused).map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Move the focus, wrapping at both ends.
    pub fn advance(&mut self, direction: FocusDirection) {
        if self.names.is_empty() {
            return;
        }
        self.focused = match direction {
            FocusDirection::Next => (self.focused + 1) % self.names.len(),
            FocusDirection::Previous => {
                if self.focused == 0 {
                    self.names.len() - 1
                } else {
                    self.focused - 1
                }
            }
        };
    }

    /// Set the focus directly (e.g. hover), ignoring out-of-range indices.
    pub fn focus(&mut self, index: usize) {
        if index < self.names.len() {
            self.focused = index;
        }
    }
}

/// Do `partial`'s characters appear in `name` in order (not necessarily
/// contiguous), case-insensitive?
fn fuzzy_contains(name: &str, partial: &str) -> bool {
    let mut name_chars = name.chars().map(|c| c.to_ascii_uppercase());
    partial
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .all(|p| name_chars.any(|n| n == p))
}

/// Rank completion candidates for a partial symbol.
///
/// A name qualifies when it is not hidden, fuzzy-contains the partial, and
/// is not an exact case-insensitive match for it (no self-suggestion once
/// the full token is typed, boolean keywords included). Order: ascending
/// name length, then lexicographic, then registration order - the stable
/// sort keeps registration order for keys that compare equal.
pub fn rank(partial: &str, registry: &FunctionRegistry) -> CandidateList {
    if partial.is_empty() {
        return CandidateList { names: Vec::new(), focused: 0 };
    }
    let mut names: Vec<String> = registry
        .list()
        .iter()
        .filter(|d| !d.hidden)
        .filter(|d| !d.name.eq_ignore_ascii_case(partial))
        .filter(|d| fuzzy_contains(&d.name, partial))
        .map(|d| d.name.clone())
        .collect();
    names.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    names.truncate(MAX_CANDIDATES);
    CandidateList { names, focused: 0 }
}
