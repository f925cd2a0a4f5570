//! Formula lexer - converts formula text into a flat token stream
//!
//! The lexer runs on every keystroke while the user edits a formula, so it
//! never fails: malformed input (unterminated strings, unbalanced parens)
//! produces a best-effort stream and downstream consumers tolerate it.
//!
//! Invariant: tokens are contiguous and non-overlapping, and concatenating
//! their texts in order reconstructs the source exactly. Whitespace and
//! unrecognized characters get their own tokens to keep this true.

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    String,
    Operator,
    /// A1-style cell reference (with optional `$` anchors)
    Reference,
    /// Identifier directly followed by `(`
    FunctionName,
    LeftParen,
    RightParen,
    Comma,
    /// Identifier that is neither a reference nor a call
    Symbol,
    Space,
    Unknown,
}

/// A token with its byte span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub start: usize,
    pub end: usize,
}

impl Token {
    fn new(kind: TokenKind, text: &str, start: usize) -> Token {
        Token { kind, text: text.to_string(), start, end: start + text.len() }
    }

    /// True for the token kinds an autocomplete partial can live in.
    pub fn is_symbol_like(&self) -> bool {
        matches!(self.kind, TokenKind::Symbol | TokenKind::FunctionName)
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '$' | '.' | '!')
}

/// Does `text` match the A1 reference grammar: `$?letters$?digits`?
fn is_cell_reference(text: &str) -> bool {
    let mut chars = text.chars().peekable();
    if chars.peek() == Some(&'$') {
        chars.next();
    }
    let mut letters = 0;
    while chars.peek().map_or(false, |c| c.is_ascii_alphabetic()) {
        chars.next();
        letters += 1;
    }
    if letters == 0 || letters > 3 {
        return false;
    }
    if chars.peek() == Some(&'$') {
        chars.next();
    }
    let mut digits = 0;
    while chars.peek().map_or(false, |c| c.is_ascii_digit()) {
        chars.next();
        digits += 1;
    }
    digits > 0 && chars.next().is_none()
}

/// Tokenize formula text, including the leading `=` if present.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens: Vec<Token> = Vec::new();
    let bytes = text.as_bytes();
    let mut pos = 0;

    while pos < text.len() {
        let rest = &text[pos..];
        let c = rest.chars().next().unwrap_or('\0');

        let token = match c {
            ' ' | '\t' => {
                let len = rest.find(|ch| ch != ' ' && ch != '\t').unwrap_or(rest.len());
                Token::new(TokenKind::Space, &rest[..len], pos)
            }
            '"' => Token::new(TokenKind::String, read_string(rest), pos),
            '(' => Token::new(TokenKind::LeftParen, "(", pos),
            ')' => Token::new(TokenKind::RightParen, ")", pos),
            ',' => Token::new(TokenKind::Comma, ",", pos),
            '<' => {
                // <= and <> are single operators
                let len = match bytes.get(pos + 1) {
                    Some(b'=') | Some(b'>') => 2,
                    _ => 1,
                };
                Token::new(TokenKind::Operator, &rest[..len], pos)
            }
            '>' => {
                let len = if bytes.get(pos + 1) == Some(&b'=') { 2 } else { 1 };
                Token::new(TokenKind::Operator, &rest[..len], pos)
            }
            '+' | '-' | '*' | '/' | '^' | '%' | '&' | '=' | ':' => {
                Token::new(TokenKind::Operator, &rest[..c.len_utf8()], pos)
            }
            _ if c.is_ascii_digit() => Token::new(TokenKind::Number, read_number(rest), pos),
            _ if is_symbol_char(c) => {
                let len = rest.find(|ch| !is_symbol_char(ch)).unwrap_or(rest.len());
                let word = &rest[..len];
                let next_is_paren = bytes.get(pos + len) == Some(&b'(');
                let kind = if next_is_paren {
                    TokenKind::FunctionName
                } else if is_cell_reference(word) {
                    TokenKind::Reference
                } else {
                    TokenKind::Symbol
                };
                Token::new(kind, word, pos)
            }
            _ => Token::new(TokenKind::Unknown, &rest[..c.len_utf8()], pos),
        };

        pos = token.end;
        tokens.push(token);
    }

    tokens
}

/// Read a string literal starting at `"`. Backslash escapes the next
/// character; an unterminated literal runs to end of input.
fn read_string(rest: &str) -> &str {
    let mut escaped = false;
    for (i, c) in rest.char_indices().skip(1) {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '"' => return &rest[..i + 1],
            _ => {}
        }
    }
    rest
}

/// Read a number literal: digits with at most one decimal point.
fn read_number(rest: &str) -> &str {
    let mut seen_dot = false;
    for (i, c) in rest.char_indices() {
        match c {
            '0'..='9' => {}
            '.' if !seen_dot => seen_dot = true,
            _ => return &rest[..i],
        }
    }
    rest
}
