//! Expression evaluator, instruction interpreter, method/methodology
//! registry and agent/agency scheduler for the agerun actor runtime.

pub mod agency;
pub mod agent;
pub mod error;
pub mod expression;
pub mod instruction;
pub mod interpreter;
pub mod method;
pub mod methodology;
pub mod persistence;
pub mod semver;

pub use agerun_core::Value;
pub use agency::Agency;
pub use agent::{Agent, MethodRef, SLEEP_MESSAGE, WAKE_MESSAGE};
pub use error::{EvalError, MethodologyError, ParseError, PersistenceError, RuntimeError, SemverError};
pub use expression::{Env, EvalResult};
pub use instruction::Instruction;
pub use method::Method;
pub use methodology::Methodology;
pub use semver::{Semver, VersionQuery};
