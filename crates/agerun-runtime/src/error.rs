//! Error taxonomy for the expression evaluator, instruction parser,
//! interpreter, methodology registry and persistence layer.
//!
//! Each enum follows the hand-rolled `Display` convention used across this
//! workspace (see `agerun-core::error::CoreError`) rather than a derive
//! macro, so the message shown to a caller is controlled exactly.

use std::fmt;

/// Failures from evaluating a single expression (§4.B / §7 `TypeMismatch`,
/// `SyntaxError`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// A memory/context/message path did not resolve to a value.
    PathNotFound(String),
    /// A token did not match any grammar production.
    Syntax { message: String, column: usize },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::PathNotFound(path) => write!(f, "path not found: {path}"),
            EvalError::Syntax { message, column } => {
                write!(f, "syntax error at column {column}: {message}")
            }
        }
    }
}

impl std::error::Error for EvalError {}

/// Failures from parsing one instruction line (§4.C / §7 `SyntaxError`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub column: usize,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at column {}: {}", self.column, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Failures from executing a parsed instruction (§4.D / §7 `RuntimeFailure`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// RHS of a bare assignment evaluated to a borrowed reference; the
    /// interpreter requires ownership on assignment RHS (Open Question,
    /// resolved in DESIGN.md).
    BorrowedAssignment,
    /// A `send` whose message expression evaluated to a borrowed reference.
    BorrowedSendMessage,
    /// `agent(...)`/`method(...)` referenced a method that does not exist.
    MethodNotFound { name: String, version: String },
    /// `agent(...)`'s context argument did not evaluate to a Map.
    ContextNotMap,
    /// The dispatching agent no longer exists in the registry (it
    /// destroyed itself earlier in the same method body).
    AgentGone,
    /// `parse`/`build`'s template or input was not a String, or `build`'s
    /// values argument was not a Map.
    TypeMismatch(String),
    /// Expression evaluation failed (wraps `EvalError`).
    Eval(EvalError),
    /// Underlying `Value` operation failed (wraps `agerun_core::CoreError`).
    Core(agerun_core::CoreError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::BorrowedAssignment => {
                write!(f, "assignment requires an owned value, found a borrowed reference")
            }
            RuntimeError::BorrowedSendMessage => {
                write!(f, "send requires an owned message, found a borrowed reference")
            }
            RuntimeError::MethodNotFound { name, version } => {
                write!(f, "no such method {name} {version}")
            }
            RuntimeError::ContextNotMap => write!(f, "agent context must be a Map"),
            RuntimeError::AgentGone => write!(f, "agent no longer exists"),
            RuntimeError::TypeMismatch(msg) => write!(f, "type mismatch: {msg}"),
            RuntimeError::Eval(e) => write!(f, "{e}"),
            RuntimeError::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<EvalError> for RuntimeError {
    fn from(e: EvalError) -> Self {
        RuntimeError::Eval(e)
    }
}

impl From<agerun_core::CoreError> for RuntimeError {
    fn from(e: agerun_core::CoreError) -> Self {
        RuntimeError::Core(e)
    }
}

/// Semver parsing failures, used by both method registration and lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SemverError(pub String);

impl fmt::Display for SemverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid version: {}", self.0)
    }
}

impl std::error::Error for SemverError {}

/// Failures registering or looking up methods (§4.F / §7 `CapacityExceeded`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodologyError {
    /// `(name, version)` already registered — see DESIGN.md's Open Question
    /// decision to reject rather than warn-and-insert.
    DuplicateVersion { name: String, version: String },
    /// The method name exceeds 63 bytes.
    NameTooLong(String),
    /// The method source exceeds 16 KiB.
    SourceTooLarge { name: String, len: usize },
    /// A name's bucket already holds 64 versions.
    CapacityExceeded(String),
    InvalidVersion(SemverError),
}

impl fmt::Display for MethodologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MethodologyError::DuplicateVersion { name, version } => {
                write!(f, "{name} {version} is already registered")
            }
            MethodologyError::NameTooLong(name) => {
                write!(f, "method name '{name}' exceeds 63 bytes")
            }
            MethodologyError::SourceTooLarge { name, len } => {
                write!(f, "method '{name}' source is {len} bytes, exceeds 16 KiB")
            }
            MethodologyError::CapacityExceeded(name) => {
                write!(f, "method '{name}' already has 64 registered versions")
            }
            MethodologyError::InvalidVersion(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for MethodologyError {}

impl From<SemverError> for MethodologyError {
    fn from(e: SemverError) -> Self {
        MethodologyError::InvalidVersion(e)
    }
}

/// Failures loading or saving the methodology/agency persistence files
/// (§4.I / §7 `PersistenceCorruption`). Every variant other than `Io` is
/// swallowed by the loader's salvage path — the loader never actually
/// returns these to its caller, but they document each rejected grammar
/// violation precisely for the `.bak` diagnostic trail.
#[derive(Debug)]
pub enum PersistenceError {
    Io(std::io::Error),
    Corrupt(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceError::Io(e) => write!(f, "io error: {e}"),
            PersistenceError::Corrupt(msg) => write!(f, "corrupt persistence file: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistenceError::Io(e) => Some(e),
            PersistenceError::Corrupt(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError::Io(e)
    }
}
