//! Agency / scheduler (§4.H): the process-wide registry of live agents
//! and the single-message dispatch loop.
//!
//! Ascending-id iteration is the one place this workspace favors a
//! `BTreeMap` over the teacher's usual `HashMap`: §4.H's dispatch order
//! ("the first agent whose queue is non-empty, in ascending-id order") is
//! a first-class correctness requirement, not an incidental detail.

use crate::agent::{Agent, MethodRef, WAKE_MESSAGE};
use crate::error::RuntimeError;
use crate::interpreter;
use crate::methodology::Methodology;
use agerun_core::Value;
use std::collections::BTreeMap;

pub struct Agency {
    registry: BTreeMap<i64, Agent>,
    next_id: i64,
}

impl Agency {
    pub fn new() -> Agency {
        Agency { registry: BTreeMap::new(), next_id: 1 }
    }

    /// Creates an agent bound to `method_name`/`version` (resolved through
    /// `methodology`), enqueues the implicit `__wake__` message, and
    /// returns its id.
    pub fn create_agent(
        &mut self,
        methodology: &Methodology,
        method_name: &str,
        version: &str,
        context: Option<Value>,
    ) -> Result<i64, RuntimeError> {
        let method = methodology.get_method(method_name, version).ok_or_else(|| {
            RuntimeError::MethodNotFound { name: method_name.to_string(), version: version.to_string() }
        })?;
        let method_ref = MethodRef { name: method.name().to_string(), version: method.version() };
        let id = self.next_id;
        self.next_id += 1;
        let mut agent = Agent::new(id, method_ref, context);
        agent.enqueue(Value::string(WAKE_MESSAGE));
        self.registry.insert(id, agent);
        Ok(id)
    }

    /// Inserts an already-constructed agent (used by the persistence
    /// loader, which reconstructs agents without replaying `__wake__`).
    pub fn insert_agent(&mut self, agent: Agent) {
        if agent.id() >= self.next_id {
            self.next_id = agent.id() + 1;
        }
        self.registry.insert(agent.id(), agent);
    }

    pub fn destroy_agent(&mut self, id: i64) -> bool {
        self.registry.remove(&id).is_some()
    }

    pub fn agent(&self, id: i64) -> Option<&Agent> {
        self.registry.get(&id)
    }

    pub fn agent_mut(&mut self, id: i64) -> Option<&mut Agent> {
        self.registry.get_mut(&id)
    }

    pub fn agent_count(&self) -> usize {
        self.registry.len()
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.registry.values()
    }

    /// Enqueues `msg` on `target`'s queue, taking ownership of it. `0` is
    /// always a valid sink — the message is silently dropped and the call
    /// reports success (§4.D `send`).
    pub fn send(&mut self, target: i64, msg: Value) -> bool {
        if target == 0 {
            return true;
        }
        match self.registry.get_mut(&target) {
            Some(agent) => {
                agent.enqueue(msg);
                true
            }
            None => false,
        }
    }

    /// Moves every agent bound to `old` onto `new`, sending `__sleep__`/
    /// `__wake__` around the swap. Returns the number of agents migrated.
    pub fn update_agent_methods(&mut self, old: &MethodRef, new: &MethodRef) -> usize {
        let mut count = 0;
        for agent in self.registry.values_mut() {
            if agent.method() == old {
                agent.update_method(new.clone(), true);
                count += 1;
            }
        }
        count
    }

    /// Enqueues `__sleep__` on every agent bound to `(name, version)`,
    /// ahead of a `destroy(name, version)` instruction destroying them
    /// (§4.D).
    pub fn sleep_agents_using(&mut self, name: &str, version: crate::semver::Semver) -> Vec<i64> {
        let mut ids = Vec::new();
        for (id, agent) in self.registry.iter_mut() {
            if agent.method().name == name && agent.method().version == version {
                agent.enqueue(Value::string(crate::agent::SLEEP_MESSAGE));
                ids.push(*id);
            }
        }
        ids
    }

    /// Dispatches exactly one message: the lowest-id agent with a
    /// non-empty queue has its head message popped and run through the
    /// interpreter. Returns `true` if a message was processed.
    ///
    /// The agent stays in the registry, addressed by id, for the whole
    /// dispatch — the interpreter looks it up again by id every time it
    /// needs to evaluate against its memory/context, rather than this call
    /// holding a `&mut Agent` borrowed out for the duration. This keeps a
    /// method that `send`s or `destroy`s its own id reaching the live
    /// registry entry instead of a temporarily-absent one.
    pub fn process_next_message(&mut self, methodology: &mut Methodology) -> bool {
        let Some(&id) = self.registry.iter().find(|(_, a)| a.has_messages()).map(|(id, _)| id) else {
            return false;
        };
        let agent = self.registry.get_mut(&id).expect("id came from this registry");
        let message = agent.get_message().expect("checked has_messages above");
        let method_ref = agent.method().clone();

        match methodology.get_method(&method_ref.name, &method_ref.version.to_string()) {
            Some(method) => {
                let source = method.source().to_string();
                interpreter::run_method(&source, self, id, message, methodology);
            }
            None => {
                tracing::warn!(
                    agent = id,
                    method = %method_ref.name,
                    version = %method_ref.version,
                    "dropping message: agent's method is no longer registered"
                );
            }
        }
        true
    }

    /// Drains all pending messages across all agents, restarting from the
    /// lowest id after each dispatch (§4.H "fair-ish drain"). Returns the
    /// number of messages processed.
    pub fn process_all_messages(&mut self, methodology: &mut Methodology) -> usize {
        let mut count = 0;
        while self.process_next_message(methodology) {
            count += 1;
        }
        count
    }
}

impl Default for Agency {
    fn default() -> Self {
        Agency::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_picks_lowest_id_with_work() {
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        let a = agency.create_agent(&methodology, "echo", "", None).unwrap();
        let b = agency.create_agent(&methodology, "echo", "", None).unwrap();
        agency.send(b, Value::string("ping"));

        // a has only its implicit wake message; it should still be chosen
        // over b because a < b, even though b also has work.
        assert!(agency.process_next_message(&mut methodology));
        assert!(!agency.agent(a).unwrap().has_messages());
        assert!(agency.agent(b).unwrap().has_messages());
    }

    #[test]
    fn send_to_zero_is_a_no_op_success() {
        let mut agency = Agency::new();
        assert!(agency.send(0, Value::int(1)));
    }

    #[test]
    fn send_to_unknown_agent_fails() {
        let mut agency = Agency::new();
        assert!(!agency.send(999, Value::int(1)));
    }
}
