//! Value: the tagged sum every agent's memory, context and message are made of.
//!
//! A `Value` owns everything beneath it — `List`/`Map` children are plain
//! `Value`s, never references — so the tree is acyclic by construction and a
//! `Value` can be dropped (or deep-cloned) by ordinary Rust ownership rules,
//! no arena or reference counting required.

use crate::error::CoreError;
use std::collections::HashMap;

/// Which variant a [`Value`] currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Int,
    Double,
    String,
    List,
    Map,
}

/// The dynamic data model: integer, double, string, ordered list, or a
/// string-keyed map of more `Value`s.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Double(f64),
    String(String),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    pub fn int(v: i64) -> Self {
        Value::Int(v)
    }

    pub fn double(v: f64) -> Self {
        Value::Double(v)
    }

    pub fn string(v: impl Into<String>) -> Self {
        Value::String(v.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(items)
    }

    pub fn map(entries: HashMap<String, Value>) -> Self {
        Value::Map(entries)
    }

    pub fn empty_map() -> Self {
        Value::Map(HashMap::new())
    }

    pub fn empty_list() -> Self {
        Value::List(Vec::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Double(_) => ValueKind::Double,
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
        }
    }

    /// True under the interpreter's `if` semantics: nonzero Int, nonzero
    /// Double, non-empty String. Lists and Maps have no truthiness in the
    /// source language and are treated as falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Double(d) => *d != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => false,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Formats this value the way the expression evaluator's `+` and string
    /// comparison operators coerce operands: integers as `%d`, doubles as
    /// `%.2f`, strings verbatim. Lists and Maps have no string form in the
    /// source language and format as empty.
    pub fn coerce_to_string(&self) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Double(d) => format!("{:.2}", d),
            Value::String(s) => s.clone(),
            Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// A single path segment lookup into a Map: `get_map_data` in the source.
    /// Returns `None` (not an error) on a missing key or a non-Map receiver,
    /// matching the neutral-default convention documented in §4.A.
    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.as_map()?.get(key)
    }

    /// Deep key-path lookup: `seg0.seg1...segN`. An empty path returns the
    /// whole value (the "memory-access without dots" case is handled by
    /// callers passing an empty path here).
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return Some(self);
        }
        let mut current = self;
        for segment in path.split('.') {
            current = current.get_field(segment)?;
        }
        Some(current)
    }

    /// Deep key-path store: transfers ownership of `value` into the final
    /// Map along `path`. Intermediate Maps must already exist — this never
    /// auto-creates them, matching §3/§4.A.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), CoreError> {
        if path.is_empty() {
            return Err(CoreError::InvalidArg("empty path".into()));
        }
        let mut segments = path.split('.');
        let last = segments.next_back().expect("split always yields >=1 item");

        let mut current = self;
        for segment in segments {
            current = current
                .as_map_mut()
                .ok_or_else(|| CoreError::TypeMismatch(format!("{segment} is not a map")))?
                .get_mut(segment)
                .ok_or_else(|| CoreError::InvalidArg(format!("no such intermediate map {segment}")))?;
        }

        let map = current
            .as_map_mut()
            .ok_or_else(|| CoreError::TypeMismatch(format!("{last}'s parent is not a map")))?;
        map.insert(last.to_string(), value);
        Ok(())
    }

    /// Sets a single field on this Map directly (one level, no path descent).
    pub fn map_set(&mut self, key: impl Into<String>, value: Value) -> Result<(), CoreError> {
        let map = self
            .as_map_mut()
            .ok_or_else(|| CoreError::TypeMismatch("map_set on non-Map".into()))?;
        map.insert(key.into(), value);
        Ok(())
    }

    /// Returns an owned `List` of owned `String` values: the map's keys in
    /// unspecified order (the source's capped hash layout has no ordering
    /// guarantee either).
    pub fn map_keys(&self) -> Result<Value, CoreError> {
        let map = self
            .as_map()
            .ok_or_else(|| CoreError::TypeMismatch("map_keys on non-Map".into()))?;
        Ok(Value::List(
            map.keys().map(|k| Value::String(k.clone())).collect(),
        ))
    }

    pub fn list_push_front(&mut self, value: Value) -> Result<(), CoreError> {
        let items = self
            .as_list_mut()
            .ok_or_else(|| CoreError::TypeMismatch("list_push_front on non-List".into()))?;
        items.insert(0, value);
        Ok(())
    }

    pub fn list_push_back(&mut self, value: Value) -> Result<(), CoreError> {
        let items = self
            .as_list_mut()
            .ok_or_else(|| CoreError::TypeMismatch("list_push_back on non-List".into()))?;
        items.push(value);
        Ok(())
    }

    /// Removes and returns ownership of the first element, if any.
    pub fn list_remove_first(&mut self) -> Option<Value> {
        match self {
            Value::List(items) if !items.is_empty() => Some(items.remove(0)),
            _ => None,
        }
    }

    /// Removes and returns ownership of the last element, if any.
    pub fn list_remove_last(&mut self) -> Option<Value> {
        match self {
            Value::List(items) => items.pop(),
            _ => None,
        }
    }

    fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Recursive deep copy of the full tree. Required whenever a borrowed
    /// reference produced by a path lookup must be handed to a consumer
    /// expecting ownership (the evaluator's memory-access branch, per
    /// §4.B/§9).
    pub fn deep_clone(&self) -> Value {
        match self {
            Value::Int(n) => Value::Int(*n),
            Value::Double(d) => Value::Double(*d),
            Value::String(s) => Value::String(s.clone()),
            Value::List(items) => Value::List(items.iter().map(Value::deep_clone).collect()),
            Value::Map(m) => {
                Value::Map(m.iter().map(|(k, v)| (k.clone(), v.deep_clone())).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_round_trips_through_nested_maps() {
        let mut inner = HashMap::new();
        inner.insert("y".to_string(), Value::int(1));
        let mut root = HashMap::new();
        root.insert("x".to_string(), Value::map(inner));
        let mut v = Value::map(root);

        v.set_path("x.y", Value::int(42)).unwrap();
        assert_eq!(v.get_path("x.y"), Some(&Value::int(42)));
    }

    #[test]
    fn set_path_does_not_auto_create_intermediate_maps() {
        let mut v = Value::empty_map();
        let err = v.set_path("missing.leaf", Value::int(1)).unwrap_err();
        assert!(matches!(err, CoreError::InvalidArg(_)));
    }

    #[test]
    fn second_set_replaces_prior_leaf() {
        let mut v = Value::empty_map();
        v.map_set("a", Value::int(1)).unwrap();
        v.map_set("a", Value::int(2)).unwrap();
        assert_eq!(v.get_field("a"), Some(&Value::int(2)));
    }

    #[test]
    fn deep_clone_produces_equal_but_independent_tree() {
        let mut root = HashMap::new();
        root.insert("list".to_string(), Value::list(vec![Value::int(1), Value::int(2)]));
        let v = Value::map(root);
        let cloned = v.deep_clone();
        assert_eq!(v, cloned);
    }

    #[test]
    fn coerce_formats_match_spec_formatters() {
        assert_eq!(Value::int(7).coerce_to_string(), "7");
        assert_eq!(Value::double(1.5).coerce_to_string(), "1.50");
        assert_eq!(Value::string("hi").coerce_to_string(), "hi");
    }

    #[test]
    fn truthiness_matches_if_semantics() {
        assert!(!Value::int(0).is_truthy());
        assert!(Value::int(1).is_truthy());
        assert!(!Value::double(0.0).is_truthy());
        assert!(!Value::string("").is_truthy());
        assert!(Value::string("x").is_truthy());
    }

    #[test]
    fn list_remove_returns_ownership() {
        let mut v = Value::list(vec![Value::int(1), Value::int(2), Value::int(3)]);
        assert_eq!(v.list_remove_first(), Some(Value::int(1)));
        assert_eq!(v.list_remove_last(), Some(Value::int(3)));
        assert_eq!(v, Value::list(vec![Value::int(2)]));
    }
}
