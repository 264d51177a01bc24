//! Method (§4.E): an immutable (name, version, source) triple. No
//! behavior beyond accessors — name, version and source are fixed at
//! construction and never change.

use crate::error::MethodologyError;
use crate::semver::Semver;

pub const MAX_NAME_LEN: usize = 63;
pub const MAX_SOURCE_LEN: usize = 16 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    name: String,
    version: Semver,
    source: String,
}

impl Method {
    pub fn new(name: impl Into<String>, version: Semver, source: impl Into<String>) -> Result<Method, MethodologyError> {
        let name = name.into();
        let source = source.into();
        if name.len() > MAX_NAME_LEN {
            return Err(MethodologyError::NameTooLong(name));
        }
        if source.len() > MAX_SOURCE_LEN {
            return Err(MethodologyError::SourceTooLarge { name, len: source.len() });
        }
        Ok(Method { name, version, source })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Semver {
        self.version
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}
