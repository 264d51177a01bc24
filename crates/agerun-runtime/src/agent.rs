//! Agent (§4.G): the pure data holder an Agency schedules and the
//! interpreter runs a method against — id, a reference to the method it's
//! bound to, its mutable memory, an optional read-only context, a FIFO
//! message queue, and an activity flag.

use crate::semver::Semver;
use agerun_core::Value;
use std::collections::VecDeque;

pub const WAKE_MESSAGE: &str = "__wake__";
pub const SLEEP_MESSAGE: &str = "__sleep__";

/// Which (name, version) a method an agent currently runs. The source's
/// borrowed pointer into Methodology becomes a lookup key here — an
/// `Agent` owns no reference into `Methodology`, it just names the method
/// it's bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub name: String,
    pub version: Semver,
}

#[derive(Debug)]
pub struct Agent {
    id: i64,
    method: MethodRef,
    memory: Value,
    context: Option<Value>,
    queue: VecDeque<Value>,
    active: bool,
}

impl Agent {
    pub fn new(id: i64, method: MethodRef, context: Option<Value>) -> Agent {
        Agent {
            id,
            method,
            memory: Value::empty_map(),
            context,
            queue: VecDeque::new(),
            active: true,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn memory(&self) -> &Value {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Value {
        &mut self.memory
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn has_messages(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Pops and returns ownership of the head of the queue, if any.
    pub fn get_message(&mut self) -> Option<Value> {
        self.queue.pop_front()
    }

    /// Enqueues a message, taking ownership of it (§4.G `send`).
    pub fn enqueue(&mut self, message: Value) {
        self.queue.push_back(message);
    }

    /// Swaps the method reference. When `send_lifecycle` is set, enqueues
    /// `__sleep__` before the swap and `__wake__` after, matching §4.G's
    /// method-upgrade protocol.
    pub fn update_method(&mut self, new_method: MethodRef, send_lifecycle: bool) {
        if send_lifecycle {
            self.enqueue(Value::string(SLEEP_MESSAGE));
        }
        self.method = new_method;
        if send_lifecycle {
            self.enqueue(Value::string(WAKE_MESSAGE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method_ref(major: u32) -> MethodRef {
        MethodRef { name: "echo".to_string(), version: Semver::new(major, 0, 0) }
    }

    #[test]
    fn queue_is_strict_fifo() {
        let mut a = Agent::new(1, method_ref(1), None);
        a.enqueue(Value::int(1));
        a.enqueue(Value::int(2));
        assert_eq!(a.get_message(), Some(Value::int(1)));
        assert_eq!(a.get_message(), Some(Value::int(2)));
        assert_eq!(a.get_message(), None);
    }

    #[test]
    fn lifecycle_update_enqueues_sleep_then_wake() {
        let mut a = Agent::new(1, method_ref(1), None);
        a.update_method(method_ref(2), true);
        assert_eq!(a.get_message(), Some(Value::string(SLEEP_MESSAGE)));
        assert_eq!(a.get_message(), Some(Value::string(WAKE_MESSAGE)));
        assert_eq!(a.method().version, Semver::new(2, 0, 0));
    }

    #[test]
    fn non_lifecycle_update_swaps_silently() {
        let mut a = Agent::new(1, method_ref(1), None);
        a.update_method(method_ref(2), false);
        assert!(!a.has_messages());
    }
}
