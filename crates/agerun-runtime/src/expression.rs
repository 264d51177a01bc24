//! Expression evaluator (§4.B): recursive-descent parse-and-evaluate over
//! memory/context/message, fused into a single pass since nothing in this
//! grammar needs a separate AST stage before evaluation.

use crate::error::EvalError;
use agerun_core::Value;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::CharIndices;

/// The read-only triple an expression is evaluated against.
pub struct Env<'a> {
    pub memory: &'a Value,
    pub context: Option<&'a Value>,
    pub message: &'a Value,
}

/// Either an evaluator-created value (owned) or a reference into
/// memory/context/message (borrowed). This is the Rust encoding of the
/// source's hand-tracked `own_`/`ref_` distinction (Design Notes §9):
/// assignment and `send` require `Owned`, arithmetic/comparisons read
/// either freely.
pub enum EvalResult<'a> {
    Owned(Value),
    Borrowed(&'a Value),
}

impl<'a> EvalResult<'a> {
    pub fn as_value(&self) -> &Value {
        match self {
            EvalResult::Owned(v) => v,
            EvalResult::Borrowed(v) => v,
        }
    }

    /// Takes ownership: moves an already-owned value, deep-clones a
    /// borrowed one. Used wherever the spec calls for "ownership if
    /// already owned, else deep-copy" (the `if` instruction, §4.D).
    pub fn into_owned(self) -> Value {
        match self {
            EvalResult::Owned(v) => v,
            EvalResult::Borrowed(v) => v.deep_clone(),
        }
    }

    /// Ownership without ever deep-copying: used where the spec's chosen
    /// behavior is that a borrow-only result is a failure (plain
    /// assignment RHS, `send`'s message argument — Open Question,
    /// resolved in DESIGN.md).
    pub fn require_owned(self) -> Option<Value> {
        match self {
            EvalResult::Owned(v) => Some(v),
            EvalResult::Borrowed(_) => None,
        }
    }
}

/// Parses and evaluates `src` as a single expression against `env`.
pub fn eval<'a>(src: &str, env: &Env<'a>) -> Result<EvalResult<'a>, EvalError> {
    let mut parser = ExprParser {
        chars: src.char_indices().peekable(),
        src,
        env,
    };
    parser.skip_ws();
    let result = parser.parse_comparison()?;
    parser.skip_ws();
    if let Some(&(pos, ch)) = parser.chars.peek() {
        return Err(EvalError::Syntax {
            message: format!("unexpected trailing character '{ch}'"),
            column: pos + 1,
        });
    }
    Ok(result)
}

struct ExprParser<'s, 'a> {
    chars: Peekable<CharIndices<'s>>,
    src: &'s str,
    env: &'s Env<'a>,
}

impl<'s, 'a> ExprParser<'s, 'a> {
    fn skip_ws(&mut self) {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn pos(&mut self) -> usize {
        self.chars.peek().map(|&(p, _)| p).unwrap_or(self.src.len())
    }

    fn syntax_err(&mut self, message: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            message: message.into(),
            column: self.pos() + 1,
        }
    }

    fn starts_with_at(&self, pos: usize, needle: &str) -> bool {
        self.src[pos..].starts_with(needle)
    }

    /// comparison := additive (('=' | '<>' | '<' | '<=' | '>' | '>=') additive)?
    fn parse_comparison(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let lhs = self.parse_additive()?;
        self.skip_ws();
        let pos = self.pos();
        let op = if self.starts_with_at(pos, "<>") {
            Some(("<>", 2))
        } else if self.starts_with_at(pos, "<=") {
            Some(("<=", 2))
        } else if self.starts_with_at(pos, ">=") {
            Some((">=", 2))
        } else if self.starts_with_at(pos, "=") {
            Some(("=", 1))
        } else if self.starts_with_at(pos, "<") {
            Some(("<", 1))
        } else if self.starts_with_at(pos, ">") {
            Some((">", 1))
        } else {
            None
        };
        let Some((op, len)) = op else {
            return Ok(lhs);
        };
        for _ in 0..len {
            self.chars.next();
        }
        self.skip_ws();
        let rhs = self.parse_additive()?;
        Ok(EvalResult::Owned(compare(op, lhs.as_value(), rhs.as_value())))
    }

    /// additive := multiplicative (('+' | '-') multiplicative)*
    fn parse_additive(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let mut acc = self.parse_multiplicative()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some(&(_, '+')) => {
                    self.chars.next();
                    self.skip_ws();
                    let rhs = self.parse_multiplicative()?;
                    acc = EvalResult::Owned(add(acc.as_value(), rhs.as_value()));
                }
                Some(&(_, '-')) => {
                    self.chars.next();
                    self.skip_ws();
                    let rhs = self.parse_multiplicative()?;
                    acc = EvalResult::Owned(arith(acc.as_value(), rhs.as_value(), '-'));
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    /// multiplicative := primary (('*' | '/') primary)*
    fn parse_multiplicative(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let mut acc = self.parse_primary()?;
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some(&(_, '*')) => {
                    self.chars.next();
                    self.skip_ws();
                    let rhs = self.parse_primary()?;
                    acc = EvalResult::Owned(arith(acc.as_value(), rhs.as_value(), '*'));
                }
                Some(&(_, '/')) => {
                    self.chars.next();
                    self.skip_ws();
                    let rhs = self.parse_primary()?;
                    acc = EvalResult::Owned(arith(acc.as_value(), rhs.as_value(), '/'));
                }
                _ => break,
            }
        }
        Ok(acc)
    }

    /// primary := string | number | memory-access | '(' expr ')'
    fn parse_primary(&mut self) -> Result<EvalResult<'a>, EvalError> {
        self.skip_ws();
        match self.chars.peek().copied() {
            Some((_, '"')) => self.parse_string(),
            Some((_, '(')) => {
                self.chars.next();
                self.skip_ws();
                let inner = self.parse_comparison()?;
                self.skip_ws();
                match self.chars.peek() {
                    Some(&(_, ')')) => {
                        self.chars.next();
                        Ok(inner)
                    }
                    _ => Err(self.syntax_err("expected closing ')'")),
                }
            }
            Some((_, c)) if c == '-' || c.is_ascii_digit() => self.parse_number(),
            Some((_, c)) if c.is_ascii_alphabetic() => self.parse_ident(),
            Some((_, c)) => Err(self.syntax_err(format!("unexpected character '{c}'"))),
            None => Err(self.syntax_err("unexpected end of expression")),
        }
    }

    fn parse_string(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let (start, _) = self.chars.next().expect("caller checked for '\"'");
        let mut end = self.src.len();
        let mut found = false;
        for (i, c) in self.chars.by_ref() {
            if c == '"' {
                end = i;
                found = true;
                break;
            }
        }
        if !found {
            return Err(EvalError::Syntax {
                message: "unterminated string literal".to_string(),
                column: start + 1,
            });
        }
        Ok(EvalResult::Owned(Value::string(&self.src[start + 1..end])))
    }

    fn parse_number(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let start = self.pos();
        if matches!(self.chars.peek(), Some(&(_, '-'))) {
            self.chars.next();
        }
        let mut saw_digit = false;
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
            self.chars.next();
            saw_digit = true;
        }
        if !saw_digit {
            return Err(self.syntax_err("expected a digit"));
        }
        let mut is_double = false;
        if matches!(self.chars.peek(), Some(&(_, '.'))) {
            is_double = true;
            self.chars.next();
            let mut saw_frac_digit = false;
            while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_digit()) {
                self.chars.next();
                saw_frac_digit = true;
            }
            if !saw_frac_digit {
                return Err(self.syntax_err("expected a digit after '.'"));
            }
        }
        let end = self.pos();
        let text = &self.src[start..end];
        if is_double {
            let v: f64 = text.parse().map_err(|_| self.syntax_err("invalid number"))?;
            Ok(EvalResult::Owned(Value::double(v)))
        } else {
            let v: i64 = text.parse().map_err(|_| self.syntax_err("invalid number"))?;
            Ok(EvalResult::Owned(Value::int(v)))
        }
    }

    fn parse_ident(&mut self) -> Result<EvalResult<'a>, EvalError> {
        let start = self.pos();
        while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_alphanumeric() || c == '_') {
            self.chars.next();
        }
        let end = self.pos();
        let ident = &self.src[start..end];

        self.skip_ws();
        if matches!(self.chars.peek(), Some(&(_, '('))) {
            return Err(EvalError::Syntax {
                message: format!("'{ident}(' is a function call, not valid in expression position"),
                column: start + 1,
            });
        }

        let root: &'a Value = match ident {
            "memory" => self.env.memory,
            "context" => match self.env.context {
                Some(c) => c,
                None => {
                    return Err(EvalError::PathNotFound("context".to_string()));
                }
            },
            "message" => self.env.message,
            other => {
                return Err(EvalError::Syntax {
                    message: format!("unknown identifier '{other}'"),
                    column: start + 1,
                });
            }
        };

        let mut path_start = None;
        while matches!(self.chars.peek(), Some(&(_, '.'))) {
            let (dot_pos, _) = self.chars.next().unwrap();
            if path_start.is_none() {
                path_start = Some(dot_pos + 1);
            }
            while matches!(self.chars.peek(), Some(&(_, c)) if c.is_ascii_alphanumeric() || c == '_') {
                self.chars.next();
            }
        }

        match path_start {
            None => Ok(EvalResult::Borrowed(root)),
            Some(start) => {
                let end = self.pos();
                let path = &self.src[start..end];
                root.get_path(path)
                    .map(EvalResult::Borrowed)
                    .ok_or_else(|| EvalError::PathNotFound(format!("{ident}.{path}")))
            }
        }
    }
}

fn arith(lhs: &Value, rhs: &Value, op: char) -> Value {
    match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => Value::Int(match op {
            '+' => a.wrapping_add(*b),
            '-' => a.wrapping_sub(*b),
            '*' => a.wrapping_mul(*b),
            '/' => {
                if *b == 0 {
                    0
                } else {
                    a / b
                }
            }
            _ => unreachable!(),
        }),
        (Value::Double(_), _) | (_, Value::Double(_)) if is_numeric(lhs) && is_numeric(rhs) => {
            let a = as_f64(lhs);
            let b = as_f64(rhs);
            Value::Double(match op {
                '+' => a + b,
                '-' => a - b,
                '*' => a * b,
                '/' => {
                    if b == 0.0 {
                        0.0
                    } else {
                        a / b
                    }
                }
                _ => unreachable!(),
            })
        }
        _ => Value::Int(0),
    }
}

/// `+` additionally means string concatenation whenever either operand is
/// a String (§4.B).
fn add(lhs: &Value, rhs: &Value) -> Value {
    if matches!(lhs, Value::String(_)) || matches!(rhs, Value::String(_)) {
        let mut s = lhs.coerce_to_string();
        s.push_str(&rhs.coerce_to_string());
        return Value::String(s);
    }
    arith(lhs, rhs, '+')
}

fn is_numeric(v: &Value) -> bool {
    matches!(v, Value::Int(_) | Value::Double(_))
}

fn as_f64(v: &Value) -> f64 {
    match v {
        Value::Int(n) => *n as f64,
        Value::Double(d) => *d,
        _ => 0.0,
    }
}

fn compare(op: &str, lhs: &Value, rhs: &Value) -> Value {
    let ordering = if is_numeric(lhs) && is_numeric(rhs) {
        as_f64(lhs).partial_cmp(&as_f64(rhs)).unwrap_or(Ordering::Equal)
    } else if matches!(lhs, Value::String(_)) && matches!(rhs, Value::String(_)) {
        lhs.as_str().unwrap_or("").cmp(rhs.as_str().unwrap_or(""))
    } else {
        lhs.coerce_to_string().cmp(&rhs.coerce_to_string())
    };

    let result = match op {
        "=" => ordering == Ordering::Equal,
        "<>" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        ">=" => ordering != Ordering::Less,
        _ => unreachable!(),
    };
    Value::Int(if result { 1 } else { 0 })
}
