//! Composer edit state machine
//!
//! Owns the live formula text, the cursor, and the edit sub-state while a
//! cell is being edited. The host feeds it logical edit operations and reads
//! back the buffer, cursor, mode, and candidate list after each one.
//!
//! Range selection and the autocomplete dropdown are sub-modes of editing,
//! not separate states: they are independent flags on top of the `Editing`
//! mode and may be active simultaneously. Candidates are always re-derived
//! from the current buffer and cursor, never replayed from a cache, so the
//! machine tolerates being driven against text that has changed again.

use log::debug;

use gridlet_engine::formula::lexer::{self, Token, TokenKind};
use gridlet_engine::formula::registry::FunctionRegistry;

use crate::autocomplete::{self, CandidateList, FocusDirection};

/// Discrete edit state. Sub-modes (range selection, open dropdown) stack on
/// top of `Editing` as flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    #[default]
    Idle,
    Editing,
}

/// The live formula-editing session.
#[derive(Debug, Default)]
pub struct Composer {
    buffer: String,
    cursor_start: usize,
    cursor_end: usize,
    mode: EditMode,
    selecting_range: bool,
    candidates: Option<CandidateList>,
}

impl Composer {
    pub fn new() -> Composer {
        Composer::default()
    }

    // ========================================================================
    // Host-visible state
    // ========================================================================

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Cursor as byte offsets `(start, end)`; equal when collapsed.
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_start, self.cursor_end)
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn is_editing(&self) -> bool {
        self.mode == EditMode::Editing
    }

    /// True while the next navigation input should be interpreted as a
    /// range/reference pick rather than text.
    pub fn is_selecting_range(&self) -> bool {
        self.selecting_range
    }

    pub fn candidates(&self) -> Option<&CandidateList> {
        self.candidates.as_ref()
    }

    pub fn is_autocomplete_open(&self) -> bool {
        self.candidates.is_some()
    }

    // ========================================================================
    // Edit operations
    // ========================================================================

    /// Begin editing with the given initial content, cursor at the end.
    /// Never opens the dropdown: revisiting committed text is not a
    /// qualifying text change.
    pub fn start_edit(&mut self, initial: &str) {
        self.buffer = initial.to_string();
        self.cursor_start = self.buffer.len();
        self.cursor_end = self.buffer.len();
        self.mode = EditMode::Editing;
        self.selecting_range = false;
        self.candidates = None;
        debug!("composer: start edit ({} bytes)", self.buffer.len());
    }

    /// Insert text at the cursor, replacing any selection, then re-derive
    /// the autocomplete state from the new buffer.
    pub fn insert_text(&mut self, text: &str, registry: &FunctionRegistry) {
        if self.mode == EditMode::Idle {
            self.start_edit("");
        }
        let (start, end) = (self.cursor_start, self.cursor_end);
        self.buffer.replace_range(start..end, text);
        self.cursor_start = start + text.len();
        self.cursor_end = self.cursor_start;
        self.selecting_range = false;
        self.refresh_candidates(registry);
    }

    /// Move the cursor. Clamped to the buffer; closes the dropdown (cursor
    /// motion is not a qualifying text change) and ends range selection.
    pub fn set_cursor(&mut self, start: usize, end: usize) {
        if self.mode == EditMode::Idle {
            return;
        }
        self.cursor_start = clamp_to_char_boundary(&self.buffer, start);
        self.cursor_end = clamp_to_char_boundary(&self.buffer, end.max(start));
        self.selecting_range = false;
        self.candidates = None;
    }

    /// Move the dropdown focus.
    pub fn advance_focus(&mut self, direction: FocusDirection) {
        if let Some(list) = self.candidates.as_mut() {
            list.advance(direction);
        }
    }

    /// Close the dropdown without accepting. It reopens only on a later
    /// qualifying text change.
    pub fn dismiss_candidates(&mut self) {
        self.candidates = None;
    }

    /// Accept the focused candidate.
    pub fn accept_focused(&mut self, registry: &FunctionRegistry) {
        if let Some(index) = self.candidates.as_ref().map(|l| l.focused_index()) {
            self.accept_candidate(index, registry);
        }
    }

    /// Replace the partial symbol with the chosen candidate, ensure an
    /// opening parenthesis after it, and enter range selection so the next
    /// input reads as a first argument.
    pub fn accept_candidate(&mut self, index: usize, registry: &FunctionRegistry) {
        let Some(name) = self.candidates.as_ref().and_then(|l| l.get(index)).map(String::from)
        else {
            return;
        };
        // Re-derive the span from current state, not from when the list
        // was computed
        let Some(token) = self.symbol_at_cursor() else {
            self.candidates = None;
            return;
        };
        let (start, end) = (token.start, token.end);
        self.buffer.replace_range(start..end, &name);
        let after_name = start + name.len();
        self.cursor_start = if !registry.contains(&name) {
            // Not a callable: no parenthesis, stay after the name
            after_name
        } else if self.buffer[after_name..].starts_with('(') {
            after_name + 1
        } else {
            self.buffer.insert(after_name, '(');
            after_name + 1
        };
        self.cursor_end = self.cursor_start;
        self.candidates = None;
        self.selecting_range = registry.contains(&name);
        debug!("composer: accepted {:?}, selecting range", name);
    }

    /// End the edit: balance parentheses, reset to idle, and hand back the
    /// finalized text for the host to store.
    pub fn commit(&mut self) -> String {
        let mut text = std::mem::take(&mut self.buffer);
        if text.starts_with('=') {
            for _ in 0..unclosed_parens(&text) {
                text.push(')');
            }
        }
        self.reset();
        debug!("composer: committed {:?}", text);
        text
    }

    /// Discard the edit entirely. The previously committed content is the
    /// host's to keep; nothing is written.
    pub fn cancel(&mut self) {
        self.buffer.clear();
        self.reset();
        debug!("composer: cancelled");
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.cursor_start = 0;
        self.cursor_end = 0;
        self.mode = EditMode::Idle;
        self.selecting_range = false;
        self.candidates = None;
    }

    // ========================================================================
    // Candidate derivation
    // ========================================================================

    /// The symbol-like token the collapsed cursor is inside of or directly
    /// after. References, numbers, strings, and operators don't count: a
    /// dropdown there would complete the wrong thing.
    fn symbol_at_cursor(&self) -> Option<Token> {
        if !self.buffer.starts_with('=') || self.cursor_start != self.cursor_end {
            return None;
        }
        let cursor = self.cursor_start;
        lexer::tokenize(&self.buffer)
            .into_iter()
            .find(|t| t.is_symbol_like() && t.start < cursor && cursor <= t.end)
    }

    fn refresh_candidates(&mut self, registry: &FunctionRegistry) {
        let list = self
            .symbol_at_cursor()
            .map(|token| autocomplete::rank(&token.text, registry))
            .filter(|list| !list.is_empty());
        self.candidates = list;
    }
}

/// Number of opening parentheses without a matching close, ignoring any
/// parenthesis inside a string literal (those are String tokens, not
/// structural parens).
fn unclosed_parens(text: &str) -> usize {
    let mut depth: usize = 0;
    for token in lexer::tokenize(text) {
        match token.kind {
            TokenKind::LeftParen => depth += 1,
            TokenKind::RightParen => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth
}

/// Clamp a byte offset into the buffer, snapping down to a char boundary.
fn clamp_to_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while offset > 0 && !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlet_engine::formula::eval::Value;
    use gridlet_engine::formula::registry::FunctionDescriptor;

    fn test_registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        for name in ["IF", "SUM", "SZZ"] {
            registry.add(FunctionDescriptor::new(name, "", |_| Ok(Value::Number(1.0))));
        }
        registry.add(FunctionDescriptor::new("HIDDEN", "", |_| Ok(Value::Number(1.0))).hidden());
        registry
    }

    fn type_text(composer: &mut Composer, registry: &FunctionRegistry, text: &str) {
        for c in text.chars() {
            composer.insert_text(&c.to_string(), registry);
        }
    }

    fn candidate_names(composer: &Composer) -> Vec<&str> {
        composer
            .candidates()
            .map(|l| l.names().iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    // =========================================================================
    // Dropdown opening rules
    // =========================================================================

    #[test]
    fn test_bare_equals_shows_no_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=");
        assert!(composer.is_editing());
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_partial_symbol_opens_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        assert_eq!(candidate_names(&composer), vec!["SUM", "SZZ"]);
        assert_eq!(composer.candidates().unwrap().focused_index(), 0);
    }

    #[test]
    fn test_hidden_partial_shows_nothing() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=HI");
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_no_match_shows_nothing() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=SX");
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_reference_shows_no_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=a3");
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_trailing_operator_shows_no_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=a3+");
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_symbol_inside_call_opens_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=sum(s");
        assert_eq!(candidate_names(&composer), vec!["SUM", "SZZ"]);
    }

    #[test]
    fn test_non_formula_text_shows_nothing() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "sum");
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_dropdown_closes_when_match_disappears() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        assert!(composer.is_autocomplete_open());
        type_text(&mut composer, &registry, "X");
        assert!(!composer.is_autocomplete_open());
    }

    // =========================================================================
    // Focus movement
    // =========================================================================

    #[test]
    fn test_focus_cycles() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        let focused = |c: &Composer| c.candidates().unwrap().focused_name().unwrap().to_string();
        assert_eq!(focused(&composer), "SUM");
        composer.advance_focus(FocusDirection::Next);
        assert_eq!(focused(&composer), "SZZ");
        composer.advance_focus(FocusDirection::Next);
        assert_eq!(focused(&composer), "SUM");
        composer.advance_focus(FocusDirection::Previous);
        assert_eq!(focused(&composer), "SZZ");
    }

    // =========================================================================
    // Accepting candidates
    // =========================================================================

    #[test]
    fn test_accept_completes_and_enters_range_selection() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.accept_focused(&registry);
        assert_eq!(composer.buffer(), "=SUM(");
        assert_eq!(composer.cursor(), (5, 5));
        assert!(composer.is_selecting_range());
        assert!(!composer.is_autocomplete_open());
    }

    #[test]
    fn test_accept_by_index() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.accept_candidate(1, &registry);
        assert_eq!(composer.buffer(), "=SZZ(");
        assert_eq!(composer.cursor(), (5, 5));
        assert!(composer.is_selecting_range());
    }

    #[test]
    fn test_accept_sole_candidate_for_su() {
        let mut registry = FunctionRegistry::new();
        registry.add(FunctionDescriptor::new("SUM", "", |_| Ok(Value::Number(1.0))));
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=SU");
        assert_eq!(candidate_names(&composer), vec!["SUM"]);
        composer.accept_focused(&registry);
        assert_eq!(composer.buffer(), "=SUM(");
        assert_eq!(composer.cursor(), (5, 5));
        assert!(composer.is_selecting_range());
    }

    #[test]
    fn test_accept_before_existing_paren_does_not_duplicate_it() {
        let registry = test_registry();
        let mut composer = Composer::new();
        // Start from committed "=S(" and edit the name in place
        composer.start_edit("=S(");
        composer.set_cursor(2, 2);
        composer.insert_text("U", &registry);
        assert_eq!(composer.buffer(), "=SU(");
        assert_eq!(composer.cursor(), (3, 3));
        assert_eq!(candidate_names(&composer), vec!["SUM"]);
        composer.accept_focused(&registry);
        assert_eq!(composer.buffer(), "=SUM(");
        assert_eq!(composer.cursor(), (5, 5));
        assert!(composer.is_selecting_range());
    }

    #[test]
    fn test_accept_with_no_dropdown_is_a_no_op() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=a3");
        composer.accept_candidate(0, &registry);
        assert_eq!(composer.buffer(), "=a3");
    }

    // =========================================================================
    // Dismiss / reopen rules
    // =========================================================================

    #[test]
    fn test_dismissed_dropdown_does_not_reopen_on_cursor_motion() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.dismiss_candidates();
        composer.set_cursor(2, 2);
        assert!(!composer.is_autocomplete_open());
        // A new qualifying text change reopens it
        composer.insert_text("U", &registry);
        assert!(composer.is_autocomplete_open());
    }

    #[test]
    fn test_reediting_committed_content_does_not_reopen_dropdown() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.commit();
        composer.start_edit("=S");
        assert!(!composer.is_autocomplete_open());
    }

    // =========================================================================
    // Commit: parenthesis balancing
    // =========================================================================

    #[test]
    fn test_commit_closes_one_paren() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=sum(1,2");
        assert_eq!(composer.commit(), "=sum(1,2)");
        assert_eq!(composer.mode(), EditMode::Idle);
    }

    #[test]
    fn test_commit_closes_nested_parens() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=sum(sum(1,2");
        assert_eq!(composer.commit(), "=sum(sum(1,2))");
    }

    #[test]
    fn test_commit_ignores_parens_inside_strings() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=sum(\"((((((((\")");
        assert_eq!(composer.commit(), "=sum(\"((((((((\")");
    }

    #[test]
    fn test_commit_balanced_formula_is_unchanged() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=sum(1,2)");
        assert_eq!(composer.commit(), "=sum(1,2)");
    }

    #[test]
    fn test_commit_does_not_touch_plain_text() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "hello (world");
        assert_eq!(composer.commit(), "hello (world");
    }

    #[test]
    fn test_commit_with_unterminated_string() {
        let registry = test_registry();
        let mut composer = Composer::new();
        // The open paren before the string is structural; the one inside
        // the unterminated literal is not
        type_text(&mut composer, &registry, "=sum(\"(");
        assert_eq!(composer.commit(), "=sum(\"()");
    }

    // =========================================================================
    // Cancel
    // =========================================================================

    #[test]
    fn test_cancel_discards_everything() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=SUM(1");
        composer.cancel();
        assert_eq!(composer.mode(), EditMode::Idle);
        assert_eq!(composer.buffer(), "");
        assert!(!composer.is_autocomplete_open());
        assert!(!composer.is_selecting_range());
    }

    // =========================================================================
    // Cursor and selection handling
    // =========================================================================

    #[test]
    fn test_insert_replaces_selection() {
        let registry = test_registry();
        let mut composer = Composer::new();
        composer.start_edit("=if(1,2)");
        composer.set_cursor(1, 3);
        composer.insert_text("SUM", &registry);
        assert_eq!(composer.buffer(), "=SUM(1,2)");
    }

    #[test]
    fn test_set_cursor_clamps() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.set_cursor(100, 200);
        assert_eq!(composer.cursor(), (2, 2));
    }

    #[test]
    fn test_typing_ends_range_selection() {
        let registry = test_registry();
        let mut composer = Composer::new();
        type_text(&mut composer, &registry, "=S");
        composer.accept_focused(&registry);
        assert!(composer.is_selecting_range());
        composer.insert_text("1", &registry);
        assert!(!composer.is_selecting_range());
    }
}
