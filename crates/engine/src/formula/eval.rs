//! Formula evaluation
//!
//! Parses the lexer's token stream into a small expression tree and
//! evaluates it against a function registry. Evaluation never panics and
//! never throws across the evaluation boundary: failures become
//! `Value::Error(..)` attached to the cell.

use serde::{Deserialize, Serialize};

use super::lexer::{self, Token, TokenKind};
use super::registry::FunctionRegistry;

/// A computed cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Boolean(bool),
    Error(EvalError),
}

impl Value {
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Display text for a value. Whole numbers drop the fraction.
    pub fn to_display(&self) -> String {
        match self {
            Value::Empty => String::new(),
            Value::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Error(e) => format!("#ERROR: {}", e),
        }
    }
}

/// Why a formula failed to produce a plain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvalError {
    /// Formula text does not parse as a complete expression. Tolerated
    /// mid-edit; surfaced only if the user commits it anyway.
    ParseIncomplete,
    /// Call to a name the registry does not know.
    UnknownFunction(String),
    /// An argument a function could not work with.
    InvalidArgument(String),
    /// A range argument with inverted or unusable corners.
    MalformedRange,
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::ParseIncomplete => write!(f, "incomplete formula"),
            EvalError::UnknownFunction(name) => write!(f, "unknown function {}", name),
            EvalError::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            EvalError::MalformedRange => write!(f, "malformed range"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Expression tree produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    /// Cell or range reference. Reference resolution belongs to the
    /// surrounding system; inside this core a reference evaluates to Empty.
    Reference(String),
    Call { name: String, args: Vec<Expr> },
    BinaryOp { op: Op, left: Box<Expr>, right: Box<Expr> },
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    Concat,
}

/// Evaluate committed cell text. Formula text (leading `=`) is parsed and
/// computed against the registry; anything else is coerced as a literal.
pub fn evaluate(text: &str, registry: &FunctionRegistry) -> Value {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix('=') else {
        return crate::cell::literal_value(trimmed);
    };
    match parse(body) {
        Ok(expr) => eval_expr(&expr, registry),
        Err(e) => Value::Error(e),
    }
}

/// Parse formula body text (without the leading `=`) into an expression.
pub fn parse(body: &str) -> Result<Expr, EvalError> {
    let tokens: Vec<Token> = lexer::tokenize(body)
        .into_iter()
        .filter(|t| t.kind != TokenKind::Space)
        .collect();
    if tokens.is_empty() {
        return Ok(Expr::Empty);
    }
    let mut parser = Parser { tokens: &tokens, pos: 0 };
    let expr = parser.parse_concat()?;
    if parser.pos != tokens.len() {
        return Err(EvalError::ParseIncomplete);
    }
    Ok(expr)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat_operator(&mut self, ops: &[&str]) -> Option<&'a str> {
        let token = self.peek()?;
        if token.kind == TokenKind::Operator && ops.contains(&token.text.as_str()) {
            self.pos += 1;
            Some(&token.text)
        } else {
            None
        }
    }

    // Precedence: & < (+ -) < (* /) < primary
    fn parse_concat(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_additive()?;
        while self.eat_operator(&["&"]).is_some() {
            let right = self.parse_additive()?;
            left = Expr::BinaryOp { op: Op::Concat, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.eat_operator(&["+", "-"]) {
            let op = if op == "+" { Op::Add } else { Op::Sub };
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_primary()?;
        while let Some(op) = self.eat_operator(&["*", "/"]) {
            let op = if op == "*" { Op::Mul } else { Op::Div };
            let right = self.parse_primary()?;
            left = Expr::BinaryOp { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        let Some(token) = self.bump() else {
            return Err(EvalError::ParseIncomplete);
        };
        match token.kind {
            TokenKind::Number => token
                .text
                .parse::<f64>()
                .map(Expr::Number)
                .map_err(|_| EvalError::ParseIncomplete),
            TokenKind::String => Ok(Expr::Text(unquote(&token.text))),
            TokenKind::Operator if token.text == "-" => {
                let inner = self.parse_primary()?;
                Ok(Expr::BinaryOp {
                    op: Op::Sub,
                    left: Box::new(Expr::Number(0.0)),
                    right: Box::new(inner),
                })
            }
            TokenKind::Reference => {
                let mut text = token.text.clone();
                // Range literal: REF ':' REF folds into one reference node
                if self.peek().map_or(false, |t| t.kind == TokenKind::Operator && t.text == ":") {
                    let colon_pos = self.pos;
                    self.pos += 1;
                    match self.peek() {
                        Some(t) if t.kind == TokenKind::Reference => {
                            text.push(':');
                            text.push_str(&t.text);
                            self.pos += 1;
                        }
                        _ => self.pos = colon_pos,
                    }
                }
                Ok(Expr::Reference(text))
            }
            TokenKind::FunctionName => {
                let name = token.text.to_ascii_uppercase();
                // The lexer only classifies FunctionName directly before '('
                self.expect(TokenKind::LeftParen)?;
                let args = self.parse_args()?;
                Ok(Expr::Call { name, args })
            }
            TokenKind::Symbol => {
                // Bare symbol: a keyword call without parens (=TRUE)
                Ok(Expr::Call { name: token.text.to_ascii_uppercase(), args: Vec::new() })
            }
            TokenKind::LeftParen => {
                let inner = self.parse_concat()?;
                self.expect(TokenKind::RightParen)?;
                Ok(inner)
            }
            _ => Err(EvalError::ParseIncomplete),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, EvalError> {
        let mut args = Vec::new();
        if self.peek().map_or(false, |t| t.kind == TokenKind::RightParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            // Omitted argument slot, e.g. `IF(a,b,)`
            let at_separator = self
                .peek()
                .map_or(true, |t| matches!(t.kind, TokenKind::Comma | TokenKind::RightParen));
            if at_separator {
                args.push(Expr::Empty);
            } else {
                args.push(self.parse_concat()?);
            }
            match self.bump() {
                Some(t) if t.kind == TokenKind::Comma => continue,
                Some(t) if t.kind == TokenKind::RightParen => break,
                _ => return Err(EvalError::ParseIncomplete),
            }
        }
        Ok(args)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), EvalError> {
        match self.bump() {
            Some(t) if t.kind == kind => Ok(()),
            _ => Err(EvalError::ParseIncomplete),
        }
    }
}

fn unquote(text: &str) -> String {
    let body = text.strip_prefix('"').unwrap_or(text);
    let body = body.strip_suffix('"').unwrap_or(body);
    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            out.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

fn eval_expr(expr: &Expr, registry: &FunctionRegistry) -> Value {
    match expr {
        Expr::Number(n) => Value::Number(*n),
        Expr::Text(s) => Value::Text(s.clone()),
        Expr::Empty => Value::Empty,
        // Reference resolution is the host's concern in this core
        Expr::Reference(_) => Value::Empty,
        Expr::Call { name, args } => {
            let Some(descriptor) = registry.lookup(name) else {
                return Value::Error(EvalError::UnknownFunction(name.clone()));
            };
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(eval_expr(arg, registry));
            }
            match (descriptor.compute)(&values) {
                Ok(value) => value,
                Err(e) => Value::Error(e),
            }
        }
        Expr::BinaryOp { op, left, right } => {
            let left = eval_expr(left, registry);
            let right = eval_expr(right, registry);
            apply_op(*op, &left, &right)
        }
    }
}

fn apply_op(op: Op, left: &Value, right: &Value) -> Value {
    if let Value::Error(e) = left {
        return Value::Error(e.clone());
    }
    if let Value::Error(e) = right {
        return Value::Error(e.clone());
    }
    if op == Op::Concat {
        return Value::Text(format!("{}{}", left.to_display(), right.to_display()));
    }
    let (Some(a), Some(b)) = (coerce_number(left), coerce_number(right)) else {
        return Value::Error(EvalError::InvalidArgument(format!(
            "cannot apply {:?} to {} and {}",
            op,
            left.to_display(),
            right.to_display()
        )));
    };
    match op {
        Op::Add => Value::Number(a + b),
        Op::Sub => Value::Number(a - b),
        Op::Mul => Value::Number(a * b),
        Op::Div => {
            if b == 0.0 {
                Value::Error(EvalError::InvalidArgument("division by zero".to_string()))
            } else {
                Value::Number(a / b)
            }
        }
        Op::Concat => unreachable!(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Empty => Some(0.0),
        Value::Text(t) => t.trim().parse::<f64>().ok(),
        Value::Error(_) => None,
    }
}
