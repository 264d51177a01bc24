//! Methodology registry (§4.F): name -> versions -> Method, with
//! semver-driven lookup and compatibility-triggered agent migration.
//!
//! Ported from `original_source/modules/agerun_methodology.c`'s bucket
//! layout: an insertion-ordered list of name buckets, each bucket an
//! insertion-ordered list of methods capped at 64 versions.

use crate::agency::Agency;
use crate::agent::MethodRef;
use crate::error::MethodologyError;
use crate::method::Method;
use crate::semver::{Semver, VersionQuery};

const MAX_VERSIONS_PER_METHOD: usize = 64;

struct Bucket {
    name: String,
    versions: Vec<Method>,
}

pub struct Methodology {
    buckets: Vec<Bucket>,
}

impl Methodology {
    pub fn new() -> Methodology {
        Methodology { buckets: Vec::new() }
    }

    /// Registers a method, then migrates every live agent on a strictly
    /// older, same-major version of this name onto the new one (§4.F).
    ///
    /// Duplicate `(name, version)` registration is rejected outright — see
    /// DESIGN.md's Open Question decision; the source itself warns and
    /// inserts anyway, which this implementation treats as a mistake worth
    /// surfacing rather than silently shadowing.
    pub fn register_method(
        &mut self,
        name: &str,
        source: &str,
        version: &str,
        agency: &mut Agency,
    ) -> Result<(), MethodologyError> {
        let version = Semver::parse(version)?;
        let method = Method::new(name, version, source)?;

        let bucket = self.bucket_mut_or_insert(name);
        if bucket.versions.iter().any(|m| m.version() == version) {
            return Err(MethodologyError::DuplicateVersion {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        if bucket.versions.len() >= MAX_VERSIONS_PER_METHOD {
            return Err(MethodologyError::CapacityExceeded(name.to_string()));
        }

        let older_compatible: Vec<Semver> = bucket
            .versions
            .iter()
            .map(Method::version)
            .filter(|v| v.compatible(&version) && *v < version)
            .collect();

        bucket.versions.push(method);

        let new_ref = MethodRef { name: name.to_string(), version };
        for old_version in older_compatible {
            let old_ref = MethodRef { name: name.to_string(), version: old_version };
            agency.update_agent_methods(&old_ref, &new_ref);
        }

        Ok(())
    }

    /// Resolves a (possibly empty/partial) version string to the latest
    /// matching method for `name` (§4.F).
    pub fn get_method(&self, name: &str, version: &str) -> Option<&Method> {
        let query = VersionQuery::parse(version).ok()?;
        let bucket = self.buckets.iter().find(|b| b.name == name)?;
        bucket
            .versions
            .iter()
            .filter(|m| query.matches(&m.version()))
            .max_by_key(|m| m.version())
    }

    /// Inserts a method read back from disk, skipping the migration step
    /// since the persistence loader runs before any agent exists. Still
    /// enforces the duplicate/capacity checks `register_method` does.
    pub(crate) fn insert_loaded(&mut self, name: &str, version: Semver, source: &str) -> Result<(), MethodologyError> {
        let method = Method::new(name, version, source)?;
        let bucket = self.bucket_mut_or_insert(name);
        if bucket.versions.iter().any(|m| m.version() == version) {
            return Err(MethodologyError::DuplicateVersion {
                name: name.to_string(),
                version: version.to_string(),
            });
        }
        if bucket.versions.len() >= MAX_VERSIONS_PER_METHOD {
            return Err(MethodologyError::CapacityExceeded(name.to_string()));
        }
        bucket.versions.push(method);
        Ok(())
    }

    /// Removes and returns the `(name, version)` entry, compacting its
    /// bucket. Callers are expected to have already destroyed any agent
    /// still bound to it.
    pub fn unregister(&mut self, name: &str, version: Semver) -> Option<Method> {
        let bucket_idx = self.buckets.iter().position(|b| b.name == name)?;
        let bucket = &mut self.buckets[bucket_idx];
        let idx = bucket.versions.iter().position(|m| m.version() == version)?;
        let removed = bucket.versions.remove(idx);
        if bucket.versions.is_empty() {
            self.buckets.remove(bucket_idx);
        }
        Some(removed)
    }

    /// All live `(name, version)` method identities, in insertion order —
    /// used by the persistence layer's save path.
    pub fn all_methods(&self) -> impl Iterator<Item = &Method> {
        self.buckets.iter().flat_map(|b| b.versions.iter())
    }

    /// Name-ordered view of the registry, for the persistence layer's save
    /// path.
    pub(crate) fn buckets(&self) -> impl Iterator<Item = (&str, &[Method])> {
        self.buckets.iter().map(|b| (b.name.as_str(), b.versions.as_slice()))
    }

    fn bucket_mut_or_insert(&mut self, name: &str) -> &mut Bucket {
        if let Some(idx) = self.buckets.iter().position(|b| b.name == name) {
            return &mut self.buckets[idx];
        }
        self.buckets.push(Bucket { name: name.to_string(), versions: Vec::new() });
        self.buckets.last_mut().expect("just pushed")
    }
}

impl Default for Methodology {
    fn default() -> Self {
        Methodology::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_empty_version_returns_latest() {
        let mut agency = Agency::new();
        let mut m = Methodology::new();
        m.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        m.register_method("echo", "send(0, message)", "1.1.0", &mut agency).unwrap();
        assert_eq!(m.get_method("echo", "").unwrap().version(), Semver::new(1, 1, 0));
    }

    #[test]
    fn lookup_partial_version_restricts_to_prefix() {
        let mut agency = Agency::new();
        let mut m = Methodology::new();
        m.register_method("echo", "x", "1.0.0", &mut agency).unwrap();
        m.register_method("echo", "x", "2.0.0", &mut agency).unwrap();
        assert_eq!(m.get_method("echo", "1").unwrap().version(), Semver::new(1, 0, 0));
    }

    #[test]
    fn duplicate_version_is_rejected() {
        let mut agency = Agency::new();
        let mut m = Methodology::new();
        m.register_method("echo", "x", "1.0.0", &mut agency).unwrap();
        let err = m.register_method("echo", "x", "1.0.0", &mut agency).unwrap_err();
        assert!(matches!(err, MethodologyError::DuplicateVersion { .. }));
    }

    #[test]
    fn registering_a_new_major_does_not_migrate_agents() {
        let mut agency = Agency::new();
        let mut m = Methodology::new();
        m.register_method("echo", "x", "1.0.0", &mut agency).unwrap();
        let id = agency
            .create_agent(&m, "echo", "1.0.0", None)
            .expect("agent creation should succeed");
        m.register_method("echo", "x", "2.0.0", &mut agency).unwrap();
        assert_eq!(agency.agent(id).unwrap().method().version, Semver::new(1, 0, 0));
    }
}
