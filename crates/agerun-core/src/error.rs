//! Error types for the core data model.
//!
//! Mirrors the hand-rolled `Display`-based error style used throughout this
//! workspace rather than reaching for a derive macro: each variant explains
//! itself in `fmt`, and callers match on the variant when they need to.

use std::fmt;

/// Errors raised by [`crate::value::Value`] accessors and path operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A required argument was null/empty/out of range (unknown path,
    /// missing intermediate map, empty key segment).
    InvalidArg(String),
    /// An accessor or path descent hit a `Value` of the wrong variant.
    TypeMismatch(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidArg(msg) => write!(f, "invalid argument: {msg}"),
            CoreError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
        }
    }
}

impl std::error::Error for CoreError {}
