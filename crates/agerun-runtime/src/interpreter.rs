//! Interpreter (§4.D): executes one method's source against an agent and
//! a single dequeued message, dispatching each parsed [`Instruction`] and
//! calling back into [`expression::eval`] for every sub-expression.

use crate::agency::Agency;
use crate::error::RuntimeError;
use crate::expression::{self, Env, EvalResult};
use crate::instruction::Instruction;
use crate::methodology::Methodology;
use crate::semver::Semver;
use agerun_core::Value;

/// Runs `source` line by line against the agent named by `id` and a single
/// dequeued `message`, stopping at the first instruction that fails with no
/// assignment target to absorb the failure (§4.D "any line failure stops
/// execution... but does not destroy the agent").
///
/// Every sub-expression is evaluated by looking `id` up in `agency` fresh
/// each time, rather than holding a `&mut Agent` borrowed out for the whole
/// run — the agent stays addressed by id, and present in the registry, for
/// the entire method body, so a `send`/`destroy` instruction that targets
/// the agent's own id reaches the live registry entry exactly like it would
/// for any other target (§4.H, matching `ar__system__process_next_message`
/// dispatching by id rather than by a held-out reference).
pub fn run_method(source: &str, agency: &mut Agency, id: i64, message: Value, methodology: &mut Methodology) {
    for raw_line in source.lines() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if agency.agent(id).is_none() {
            tracing::debug!(agent = id, "agent destroyed itself, stopping method");
            break;
        }

        let instr = match Instruction::parse(line) {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(agent = id, %e, line, "instruction parse failed, stopping method");
                break;
            }
        };

        if let Err(e) = execute(&instr, agency, id, &message, methodology) {
            match instr.assign() {
                Some(path) => {
                    tracing::debug!(agent = id, %e, line, "instruction failed, result defaults to 0");
                    if let Some(agent) = agency.agent_mut(id) {
                        let _ = agent.memory_mut().set_path(path, Value::int(0));
                    }
                }
                None => {
                    tracing::warn!(agent = id, %e, line, "instruction failed, stopping method");
                    break;
                }
            }
        }
    }
}

fn execute(
    instr: &Instruction,
    agency: &mut Agency,
    id: i64,
    message: &Value,
    methodology: &mut Methodology,
) -> Result<(), RuntimeError> {
    match instr {
        Instruction::Assign { path, expr } => {
            let value = eval_owned(agency, id, message, expr)?;
            let agent = agency.agent_mut(id).ok_or(RuntimeError::AgentGone)?;
            agent.memory_mut().set_path(path, value)?;
            Ok(())
        }
        Instruction::Send { target, message: msg_expr, assign } => {
            let target_id = eval_int(agency, id, message, target)?;
            let msg = eval_send_message(agency, id, message, msg_expr)?;
            let ok = agency.send(target_id, msg);
            store(agency, id, assign, Value::int(ok as i64))
        }
        Instruction::If { cond, when_true, when_false, assign } => {
            let cond_val = eval_any(agency, id, message, cond)?;
            let truthy = cond_val.as_value().is_truthy();
            // Both branches are evaluated unconditionally, and either one
            // failing fails the whole instruction — only the selected
            // branch's value is kept, but the untaken branch is not exempt
            // from evaluation errors.
            let true_val = eval_any(agency, id, message, when_true)?;
            let false_val = eval_any(agency, id, message, when_false)?;
            let result = if truthy { true_val.into_owned() } else { false_val.into_owned() };
            store(agency, id, assign, result)
        }
        Instruction::Parse { template, input, assign } => {
            let template = eval_string(agency, id, message, template)?;
            let input = eval_string(agency, id, message, input)?;
            let result = parse_template(&template, &input);
            store(agency, id, assign, result)
        }
        Instruction::Build { template, values, assign } => {
            let template = eval_string(agency, id, message, template)?;
            let values = eval_any(agency, id, message, values)?;
            let map = values
                .as_value()
                .as_map()
                .ok_or_else(|| RuntimeError::TypeMismatch("build's values argument must be a Map".to_string()))?;
            let result = build_template(&template, map);
            store(agency, id, assign, Value::string(result))
        }
        Instruction::Method { name, source, version, assign } => {
            let name = eval_string(agency, id, message, name)?;
            let source = eval_string(agency, id, message, source)?;
            let version = eval_version_string(agency, id, message, version)?;
            let ok = methodology.register_method(&name, &source, &version, agency).is_ok();
            store(agency, id, assign, Value::int(ok as i64))
        }
        Instruction::Agent { method_name, version, context, assign } => {
            let method_name = eval_string(agency, id, message, method_name)?;
            let version = eval_string(agency, id, message, version)?;
            // A context expression that fails to evaluate (typically a
            // memory/context path that doesn't resolve) defaults to an
            // empty Map rather than failing the whole call, matching the
            // source falling back to `ar__data__create_map()` whenever its
            // context expression evaluates to NULL.
            let context_map = match eval_any(agency, id, message, context) {
                Ok(result) => match result.into_owned() {
                    v @ Value::Map(_) => v,
                    _ => return Err(RuntimeError::ContextNotMap),
                },
                Err(_) => Value::empty_map(),
            };
            let new_id = agency
                .create_agent(methodology, &method_name, &version, Some(context_map))
                .unwrap_or(0);
            store(agency, id, assign, Value::int(new_id))
        }
        Instruction::DestroyAgent { id: target_expr, assign } => {
            let target = eval_int(agency, id, message, target_expr)?;
            let ok = agency.destroy_agent(target);
            store(agency, id, assign, Value::int(ok as i64))
        }
        Instruction::DestroyMethod { name, version, assign } => {
            let name = eval_string(agency, id, message, name)?;
            let version_str = eval_string(agency, id, message, version)?;
            let version = Semver::parse(&version_str).map_err(|_| {
                RuntimeError::TypeMismatch(format!("'{version_str}' is not a valid version"))
            })?;
            let targets = agency.sleep_agents_using(&name, version);
            for target in &targets {
                agency.destroy_agent(*target);
            }
            let ok = methodology.unregister(&name, version).is_some();
            store(agency, id, assign, Value::int(ok as i64))
        }
    }
}

/// Stores `value` at `assign`'s path on the dispatching agent, if it still
/// exists — a self-`destroy` earlier in the same instruction can have
/// already removed it, in which case there is nothing left to store to.
fn store(agency: &mut Agency, id: i64, assign: &Option<String>, value: Value) -> Result<(), RuntimeError> {
    if let Some(path) = assign {
        if let Some(agent) = agency.agent_mut(id) {
            agent.memory_mut().set_path(path, value)?;
        }
    }
    Ok(())
}

fn eval_any<'a>(agency: &'a Agency, id: i64, message: &'a Value, expr: &str) -> Result<EvalResult<'a>, RuntimeError> {
    let agent = agency.agent(id).ok_or(RuntimeError::AgentGone)?;
    let env = Env { memory: agent.memory(), context: agent.context(), message };
    Ok(expression::eval(expr, &env)?)
}

/// Evaluates `expr` and requires ownership, matching the resolved Open
/// Question: a bare borrow on an assignment/`send` RHS is a failure
/// rather than an implicit deep copy. `on_borrow` lets callers raise the
/// instruction-specific borrow error (`BorrowedAssignment` vs
/// `BorrowedSendMessage`).
fn eval_require_owned(
    agency: &Agency,
    id: i64,
    message: &Value,
    expr: &str,
    on_borrow: RuntimeError,
) -> Result<Value, RuntimeError> {
    let result = eval_any(agency, id, message, expr)?;
    result.require_owned().ok_or(on_borrow)
}

fn eval_owned(agency: &Agency, id: i64, message: &Value, expr: &str) -> Result<Value, RuntimeError> {
    eval_require_owned(agency, id, message, expr, RuntimeError::BorrowedAssignment)
}

fn eval_send_message(agency: &Agency, id: i64, message: &Value, expr: &str) -> Result<Value, RuntimeError> {
    eval_require_owned(agency, id, message, expr, RuntimeError::BorrowedSendMessage)
}

fn eval_string(agency: &Agency, id: i64, message: &Value, expr: &str) -> Result<String, RuntimeError> {
    let result = eval_any(agency, id, message, expr)?;
    match result.as_value().as_str() {
        Some(s) => Ok(s.to_string()),
        None => Err(RuntimeError::TypeMismatch("expected a String".to_string())),
    }
}

fn eval_int(agency: &Agency, id: i64, message: &Value, expr: &str) -> Result<i64, RuntimeError> {
    let result = eval_any(agency, id, message, expr)?;
    match result.as_value().as_int() {
        Some(n) => Ok(n),
        None => Err(RuntimeError::TypeMismatch("expected an Int".to_string())),
    }
}

/// `version` in `method(name, source, version)` may be a String or an
/// Int, with `N` formatted as `"N.0.0"` (§4.D).
fn eval_version_string(agency: &Agency, id: i64, message: &Value, expr: &str) -> Result<String, RuntimeError> {
    let result = eval_any(agency, id, message, expr)?;
    match result.as_value() {
        Value::String(s) => Ok(s.clone()),
        Value::Int(n) => Ok(format!("{n}.0.0")),
        _ => Err(RuntimeError::TypeMismatch("version must be a String or Int".to_string())),
    }
}

/// Matches `input` against `template`'s literal chunks and `{name}`
/// placeholders, coercing each extracted token to Int, then Double, then
/// String (§4.D `parse`). Any literal mismatch yields an empty Map.
fn parse_template(template: &str, input: &str) -> Value {
    let mut result = Value::empty_map();
    let mut rest = input;
    let mut t = template;

    loop {
        let (literal, remainder) = match t.find('{') {
            Some(idx) => (&t[..idx], &t[idx..]),
            None => (t, ""),
        };
        if !rest.starts_with(literal) {
            return Value::empty_map();
        }
        rest = &rest[literal.len()..];
        if remainder.is_empty() {
            break;
        }

        let Some(close) = remainder.find('}') else {
            return Value::empty_map();
        };
        let name = &remainder[1..close];
        t = &remainder[close + 1..];

        let next_literal_start = t.find('{').map(|i| &t[..i]).unwrap_or(t);
        let token = match next_literal_start.is_empty() {
            true => rest,
            false => match rest.find(next_literal_start) {
                Some(idx) => &rest[..idx],
                None => return Value::empty_map(),
            },
        };
        rest = &rest[token.len()..];

        let value = coerce_token(token);
        if result.map_set(name, value).is_err() {
            return Value::empty_map();
        }
    }

    result
}

fn coerce_token(token: &str) -> Value {
    if let Ok(n) = token.parse::<i64>() {
        return Value::Int(n);
    }
    if token.contains('.') {
        if let Ok(d) = token.parse::<f64>() {
            return Value::Double(d);
        }
    }
    Value::String(token.to_string())
}

/// Replaces each `{name}` placeholder with `values[name]` formatted the
/// same way arithmetic coerces to String; an unresolved placeholder is
/// left verbatim (§4.D `build`).
fn build_template(template: &str, values: &std::collections::HashMap<String, Value>) -> String {
    let mut out = String::new();
    let mut t = template;
    loop {
        match t.find('{') {
            Some(idx) => {
                out.push_str(&t[..idx]);
                let remainder = &t[idx..];
                let Some(close) = remainder.find('}') else {
                    out.push_str(remainder);
                    break;
                };
                let name = &remainder[1..close];
                match values.get(name) {
                    Some(v) => out.push_str(&v.coerce_to_string()),
                    None => {
                        out.push('{');
                        out.push_str(name);
                        out.push('}');
                    }
                }
                t = &remainder[close + 1..];
            }
            None => {
                out.push_str(t);
                break;
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, MethodRef};

    /// Inserts a bare agent (no pending messages) bound to method `t 1.0.0`
    /// directly into `agency`'s registry and returns its id.
    fn new_agent(agency: &mut Agency) -> i64 {
        let agent = Agent::new(1, MethodRef { name: "t".to_string(), version: Semver::new(1, 0, 0) }, None);
        let id = agent.id();
        agency.insert_agent(agent);
        id
    }

    #[test]
    fn echo_sends_message_back_to_sender() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        let a = agency.create_agent(&methodology, "echo", "1.0.0", None).unwrap();
        agency.send(a, Value::string("hi"));
        let processed = agency.process_all_messages(&mut methodology);
        assert!(processed >= 2);
        assert!(agency.agent(a).is_some());
    }

    #[test]
    fn integer_path_assignment() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        execute(
            &Instruction::Assign { path: "x".to_string(), expr: "2 + 3 * 4".to_string() },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap();
        assert_eq!(agency.agent(id).unwrap().memory().get_path("x"), Some(&Value::int(14)));
    }

    #[test]
    fn string_concat_and_assign() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        let mut message = Value::empty_map();
        message.map_set("name", Value::string("Alice")).unwrap();
        execute(
            &Instruction::Assign {
                path: "greeting".to_string(),
                expr: r#""Hello, " + message.name"#.to_string(),
            },
            &mut agency,
            id,
            &message,
            &mut methodology,
        )
        .unwrap();
        assert_eq!(
            agency.agent(id).unwrap().memory().get_path("greeting"),
            Some(&Value::string("Hello, Alice"))
        );
    }

    #[test]
    fn if_expression_picks_branch_by_truthiness() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        execute(
            &Instruction::If {
                cond: "0".to_string(),
                when_true: "\"yes\"".to_string(),
                when_false: "\"no\"".to_string(),
                assign: Some("r".to_string()),
            },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap();
        assert_eq!(agency.agent(id).unwrap().memory().get_path("r"), Some(&Value::string("no")));
    }

    #[test]
    fn if_fails_when_untaken_branch_fails_to_evaluate() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        let err = execute(
            &Instruction::If {
                cond: "1".to_string(),
                when_true: "\"yes\"".to_string(),
                when_false: "memory.nonexistent".to_string(),
                assign: Some("r".to_string()),
            },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Eval(_)));
        assert_eq!(agency.agent(id).unwrap().memory().get_path("r"), None);
    }

    #[test]
    fn bare_memory_to_memory_assignment_fails() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        agency.agent_mut(id).unwrap().memory_mut().map_set("y", Value::int(3)).unwrap();
        let err = execute(
            &Instruction::Assign { path: "x".to_string(), expr: "memory.y".to_string() },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::BorrowedAssignment));
    }

    #[test]
    fn send_with_borrowed_message_raises_borrowed_send_message() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        let id = new_agent(&mut agency);
        agency.agent_mut(id).unwrap().memory_mut().map_set("y", Value::int(3)).unwrap();
        let err = execute(
            &Instruction::Send { target: "0".to_string(), message: "memory.y".to_string(), assign: None },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::BorrowedSendMessage));
    }

    #[test]
    fn agent_with_unresolved_context_path_falls_back_to_empty_map() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        let id = new_agent(&mut agency);
        execute(
            &Instruction::Agent {
                method_name: "\"echo\"".to_string(),
                version: "\"1.0.0\"".to_string(),
                context: "memory.nonexistent".to_string(),
                assign: Some("child".to_string()),
            },
            &mut agency,
            id,
            &Value::empty_map(),
            &mut methodology,
        )
        .unwrap();
        let new_id = agency.agent(id).unwrap().memory().get_path("child").unwrap().as_int().unwrap();
        assert!(agency.agent(new_id).unwrap().context().unwrap().as_map().unwrap().is_empty());
    }

    #[test]
    fn self_send_reaches_the_dispatching_agents_own_queue() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("loopback", "send(1, \"again\")", "1.0.0", &mut agency).unwrap();
        let id = agency.create_agent(&methodology, "loopback", "1.0.0", None).unwrap();
        assert_eq!(id, 1);
        agency.process_next_message(&mut methodology); // drains __wake__, self-sends "again"
        assert!(agency.agent(id).unwrap().has_messages());
    }

    #[test]
    fn self_destroy_actually_removes_the_agent() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("suicide", "destroy(1)", "1.0.0", &mut agency).unwrap();
        let id = agency.create_agent(&methodology, "suicide", "1.0.0", None).unwrap();
        assert_eq!(id, 1);
        agency.process_next_message(&mut methodology); // drains __wake__, self-destroys
        assert!(agency.agent(id).is_none());
    }

    #[test]
    fn parse_extracts_typed_fields() {
        let result = parse_template("name={name} age={age}", "name=Alice age=30");
        let map = result.as_map().unwrap();
        assert_eq!(map.get("name"), Some(&Value::string("Alice")));
        assert_eq!(map.get("age"), Some(&Value::int(30)));
    }

    #[test]
    fn parse_literal_mismatch_yields_empty_map() {
        let result = parse_template("name={name}", "nope=Alice");
        assert_eq!(result, Value::empty_map());
    }

    #[test]
    fn build_substitutes_known_keys_and_leaves_unknown_verbatim() {
        let mut values = std::collections::HashMap::new();
        values.insert("name".to_string(), Value::string("Bob"));
        let out = build_template("hi {name}, code {code}", &values);
        assert_eq!(out, "hi Bob, code {code}");
    }

    #[test]
    fn method_upgrade_enqueues_sleep_then_wake() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        let id = agency.create_agent(&methodology, "echo", "1.0.0", None).unwrap();
        agency.process_next_message(&mut methodology); // drains __wake__

        methodology.register_method("echo", "send(0, message)", "1.1.0", &mut agency).unwrap();
        let agent = agency.agent(id).unwrap();
        assert_eq!(agent.method().version, Semver::new(1, 1, 0));
    }
}
