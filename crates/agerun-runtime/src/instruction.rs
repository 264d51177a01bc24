//! Instruction parser (§4.C): turns one trimmed source line into an
//! [`Instruction`] AST node. Expression sub-strings are kept as raw text —
//! the expression evaluator parses and evaluates them together at
//! execution time (§4.B), so there is no separate expression AST here.

use crate::error::ParseError;

/// One parsed instruction line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Assign { path: String, expr: String },
    Send { target: String, message: String, assign: Option<String> },
    If { cond: String, when_true: String, when_false: String, assign: Option<String> },
    Parse { template: String, input: String, assign: Option<String> },
    Build { template: String, values: String, assign: Option<String> },
    Method { name: String, source: String, version: String, assign: Option<String> },
    Agent { method_name: String, version: String, context: String, assign: Option<String> },
    DestroyAgent { id: String, assign: Option<String> },
    DestroyMethod { name: String, version: String, assign: Option<String> },
}

const FUNCTIONS: &[(&str, usize)] = &[
    ("send", 2),
    ("if", 3),
    ("parse", 2),
    ("build", 2),
    ("method", 3),
    ("agent", 3),
    ("destroy", 1), // destroy/2 is matched separately below
];

impl Instruction {
    /// The memory path this instruction's result is stored to, if any.
    pub fn assign(&self) -> Option<&str> {
        match self {
            Instruction::Assign { path, .. } => Some(path),
            Instruction::Send { assign, .. }
            | Instruction::If { assign, .. }
            | Instruction::Parse { assign, .. }
            | Instruction::Build { assign, .. }
            | Instruction::Method { assign, .. }
            | Instruction::Agent { assign, .. }
            | Instruction::DestroyAgent { assign, .. }
            | Instruction::DestroyMethod { assign, .. } => assign.as_deref(),
        }
    }

    /// Parses one already-trimmed, non-blank, non-comment line.
    pub fn parse(line: &str) -> Result<Instruction, ParseError> {
        match find_top_level_assign(line) {
            Some(eq_pos) => {
                let lhs = line[..eq_pos].trim();
                let rhs_region = &line[eq_pos + 2..];
                let rhs = rhs_region.trim();
                let rhs_column = eq_pos + 2 + (rhs_region.len() - rhs_region.trim_start().len());
                let path = memory_path(lhs).ok_or_else(|| ParseError {
                    message: "only 'memory' is a legal assignment target".to_string(),
                    column: 1,
                })?;
                match parse_func_call(rhs, rhs_column) {
                    Ok(Some(call)) => Ok(with_assign(call, path)),
                    Ok(None) => Ok(Instruction::Assign { path, expr: rhs.to_string() }),
                    Err(e) => Err(e),
                }
            }
            None => match parse_func_call(line, 0)? {
                Some(call) => Ok(call),
                None => Err(ParseError {
                    message: "expected an assignment or a function call".to_string(),
                    column: 1,
                }),
            },
        }
    }
}

fn with_assign(call: Instruction, path: String) -> Instruction {
    match call {
        Instruction::Send { target, message, .. } => {
            Instruction::Send { target, message, assign: Some(path) }
        }
        Instruction::If { cond, when_true, when_false, .. } => {
            Instruction::If { cond, when_true, when_false, assign: Some(path) }
        }
        Instruction::Parse { template, input, .. } => {
            Instruction::Parse { template, input, assign: Some(path) }
        }
        Instruction::Build { template, values, .. } => {
            Instruction::Build { template, values, assign: Some(path) }
        }
        Instruction::Method { name, source, version, .. } => {
            Instruction::Method { name, source, version, assign: Some(path) }
        }
        Instruction::Agent { method_name, version, context, .. } => {
            Instruction::Agent { method_name, version, context, assign: Some(path) }
        }
        Instruction::DestroyAgent { id, .. } => Instruction::DestroyAgent { id, assign: Some(path) },
        Instruction::DestroyMethod { name, version, .. } => {
            Instruction::DestroyMethod { name, version, assign: Some(path) }
        }
        other => other,
    }
}

/// A legal assignment target: `memory` alone, or `memory.path...`. Returns
/// the path with the `memory.` prefix stripped (empty string for bare
/// `memory`, which is not a useful target but is rejected downstream by
/// `Value::set_path`'s empty-path check).
fn memory_path(lhs: &str) -> Option<String> {
    if lhs == "memory" {
        return Some(String::new());
    }
    lhs.strip_prefix("memory.").map(|p| p.to_string())
}

/// Finds the first top-level (not inside a string literal) `:=`.
fn find_top_level_assign(line: &str) -> Option<usize> {
    let bytes = line.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i + 1 < bytes.len() {
        match bytes[i] {
            b'"' => in_string = !in_string,
            b':' if !in_string && bytes[i + 1] == b'=' => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

/// Attempts to parse `text` as `ident(arg, arg, ...)`. Returns `Ok(None)`
/// if `text` isn't shaped like a function call at all (so the caller can
/// fall back to treating it as a plain expression), and `Err` if it looks
/// like a call but is malformed (unknown name, wrong arity, unmatched
/// parens).
fn parse_func_call(text: &str, base_column: usize) -> Result<Option<Instruction>, ParseError> {
    let text = text.trim();
    let Some(paren) = text.find('(') else {
        return Ok(None);
    };
    let name = text[..paren].trim();
    if name.is_empty() || !is_ident(name) {
        return Ok(None);
    }
    if !text.ends_with(')') {
        return Err(ParseError {
            message: format!("expected closing ')' for '{name}('"),
            column: base_column + text.len() + 1,
        });
    }
    let known = FUNCTIONS.iter().any(|(n, _)| *n == name);
    if !known {
        return Err(ParseError {
            message: format!("unknown function '{name}'"),
            column: base_column + 1,
        });
    }

    let inner = &text[paren + 1..text.len() - 1];
    let args = split_top_level_commas(inner);
    let args: Vec<&str> = args.iter().map(|s| s.trim()).collect();

    let instr = match (name, args.len()) {
        ("send", 2) => Instruction::Send {
            target: args[0].to_string(),
            message: args[1].to_string(),
            assign: None,
        },
        ("if", 3) => Instruction::If {
            cond: args[0].to_string(),
            when_true: args[1].to_string(),
            when_false: args[2].to_string(),
            assign: None,
        },
        ("parse", 2) => Instruction::Parse {
            template: args[0].to_string(),
            input: args[1].to_string(),
            assign: None,
        },
        ("build", 2) => Instruction::Build {
            template: args[0].to_string(),
            values: args[1].to_string(),
            assign: None,
        },
        ("method", 3) => Instruction::Method {
            name: args[0].to_string(),
            source: args[1].to_string(),
            version: args[2].to_string(),
            assign: None,
        },
        ("agent", 3) => Instruction::Agent {
            method_name: args[0].to_string(),
            version: args[1].to_string(),
            context: args[2].to_string(),
            assign: None,
        },
        ("destroy", 1) => Instruction::DestroyAgent { id: args[0].to_string(), assign: None },
        ("destroy", 2) => Instruction::DestroyMethod {
            name: args[0].to_string(),
            version: args[1].to_string(),
            assign: None,
        },
        (name, n) => {
            return Err(ParseError {
                message: format!("'{name}' does not take {n} argument(s)"),
                column: base_column + 1,
            });
        }
    };
    Ok(Some(instr))
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Splits `text` on commas that are not nested inside parentheses or
/// string literals.
fn split_top_level_commas(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match c {
            '"' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => depth -= 1,
            ',' if !in_string && depth == 0 => {
                parts.push(chars[start..i].iter().collect());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(chars[start..].iter().collect());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_assignment() {
        let i = Instruction::parse("memory.x := 2 + 3 * 4").unwrap();
        assert_eq!(
            i,
            Instruction::Assign { path: "x".to_string(), expr: "2 + 3 * 4".to_string() }
        );
    }

    #[test]
    fn parses_send_without_assignment() {
        let i = Instruction::parse("send(0, message)").unwrap();
        assert_eq!(
            i,
            Instruction::Send { target: "0".to_string(), message: "message".to_string(), assign: None }
        );
    }

    #[test]
    fn parses_assigned_function_call() {
        let i = Instruction::parse(r#"memory.r := if(0, "yes", "no")"#).unwrap();
        assert_eq!(
            i,
            Instruction::If {
                cond: "0".to_string(),
                when_true: "\"yes\"".to_string(),
                when_false: "\"no\"".to_string(),
                assign: Some("r".to_string()),
            }
        );
    }

    #[test]
    fn distinguishes_destroy_arities() {
        assert_eq!(
            Instruction::parse("destroy(3)").unwrap(),
            Instruction::DestroyAgent { id: "3".to_string(), assign: None }
        );
        assert_eq!(
            Instruction::parse("destroy(\"echo\", \"1.0.0\")").unwrap(),
            Instruction::DestroyMethod {
                name: "\"echo\"".to_string(),
                version: "\"1.0.0\"".to_string(),
                assign: None,
            }
        );
    }

    #[test]
    fn rejects_non_memory_assignment_target() {
        assert!(Instruction::parse("context.x := 1").is_err());
    }

    #[test]
    fn splits_nested_parens_and_quoted_commas() {
        let args = split_top_level_commas(r#"1 + (2, 3), "a, b", message"#);
        assert_eq!(args, vec!["1 + (2, 3)".to_string(), " \"a, b\"".to_string(), " message".to_string()]);
    }
}
