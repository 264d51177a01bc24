//! Semantic version parsing and comparison.
//!
//! Ported directly from `original_source/modules/agerun_semver.c`: each
//! component is a nonnegative integer, trailing pre-release/build tags
//! (anything after a `-` or `+`) are ignored, and a version string may be
//! partial (`"1"` or `"1.2"`) for lookup purposes even though every
//! *stored* method version is always a full `MAJOR.MINOR.PATCH`.

use crate::error::SemverError;
use std::cmp::Ordering;
use std::fmt;

/// A full `MAJOR.MINOR.PATCH` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Semver {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Semver {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Semver { major, minor, patch }
    }

    /// Parses a full `MAJOR.MINOR.PATCH` version (used when *storing* a
    /// method). Partial versions are rejected here; use
    /// [`VersionQuery::parse`] for lookup strings.
    pub fn parse(s: &str) -> Result<Semver, SemverError> {
        match parse_components(s)? {
            (major, Some(minor), Some(patch)) => Ok(Semver { major, minor, patch }),
            _ => Err(SemverError(format!("'{s}' is not a full MAJOR.MINOR.PATCH version"))),
        }
    }

    /// Orders by major, then minor, then patch.
    pub fn compare(&self, other: &Semver) -> Ordering {
        self.cmp(other)
    }

    /// Two versions are compatible iff they share the same major number.
    pub fn compatible(&self, other: &Semver) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for Semver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A (possibly partial) version string used to look a method up:
/// empty selects the latest version of a name, a bare major or
/// major.minor restricts the candidate set to that prefix, and a full
/// version is an exact match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionQuery {
    Latest,
    Exact(Semver),
    MajorOnly(u32),
    MajorMinor(u32, u32),
}

impl VersionQuery {
    pub fn parse(s: &str) -> Result<VersionQuery, SemverError> {
        if s.trim().is_empty() {
            return Ok(VersionQuery::Latest);
        }
        match parse_components(s)? {
            (major, None, None) => Ok(VersionQuery::MajorOnly(major)),
            (major, Some(minor), None) => Ok(VersionQuery::MajorMinor(major, minor)),
            (major, Some(minor), Some(patch)) => Ok(VersionQuery::Exact(Semver::new(major, minor, patch))),
            (_, None, Some(_)) => unreachable!("parse_components never yields patch without minor"),
        }
    }

    /// True if `version` falls within this query's restriction.
    pub fn matches(&self, version: &Semver) -> bool {
        match self {
            VersionQuery::Latest => true,
            VersionQuery::Exact(v) => v == version,
            VersionQuery::MajorOnly(major) => version.major == *major,
            VersionQuery::MajorMinor(major, minor) => {
                version.major == *major && version.minor == *minor
            }
        }
    }
}

/// Parses up to three dot-separated nonnegative integer components,
/// ignoring anything from a trailing `-` or `+` onward. Returns
/// `(major, minor, patch)` with `None` for components absent from the
/// input.
fn parse_components(s: &str) -> Result<(u32, Option<u32>, Option<u32>), SemverError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SemverError("empty version string".to_string()));
    }

    let core = match s.find(['-', '+']) {
        Some(idx) => &s[..idx],
        None => s,
    };

    let mut parts = core.split('.');
    let major = parse_component(parts.next(), s)?;
    let minor = match parts.next() {
        Some(p) => Some(parse_component(Some(p), s)?),
        None => None,
    };
    let patch = match parts.next() {
        Some(p) => Some(parse_component(Some(p), s)?),
        None => None,
    };
    if parts.next().is_some() {
        return Err(SemverError(format!("'{s}' has more than three components")));
    }

    Ok((major, minor, patch))
}

fn parse_component(part: Option<&str>, whole: &str) -> Result<u32, SemverError> {
    let part = part.ok_or_else(|| SemverError(format!("'{whole}' is missing a version component")))?;
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SemverError(format!("'{whole}' has a non-numeric version component")));
    }
    part.parse::<u32>()
        .map_err(|_| SemverError(format!("'{whole}' has an out-of-range version component")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compare_is_reflexive_and_antisymmetric() {
        let a = Semver::new(1, 2, 3);
        assert_eq!(a.compare(&a), Ordering::Equal);
        let b = Semver::new(1, 3, 0);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(b.compare(&a), Ordering::Greater);
    }

    #[test]
    fn compatible_iff_same_major() {
        assert!(Semver::new(1, 0, 0).compatible(&Semver::new(1, 9, 9)));
        assert!(!Semver::new(1, 0, 0).compatible(&Semver::new(2, 0, 0)));
    }

    #[test]
    fn parses_partial_and_full_versions() {
        assert_eq!(VersionQuery::parse("").unwrap(), VersionQuery::Latest);
        assert_eq!(VersionQuery::parse("1").unwrap(), VersionQuery::MajorOnly(1));
        assert_eq!(VersionQuery::parse("1.2").unwrap(), VersionQuery::MajorMinor(1, 2));
        assert_eq!(
            VersionQuery::parse("1.2.3").unwrap(),
            VersionQuery::Exact(Semver::new(1, 2, 3))
        );
    }

    #[test]
    fn ignores_prerelease_and_build_tags() {
        assert_eq!(Semver::parse("1.2.3-rc1").unwrap(), Semver::new(1, 2, 3));
        assert_eq!(Semver::parse("1.2.3+build7").unwrap(), Semver::new(1, 2, 3));
    }

    #[test]
    fn rejects_non_numeric_and_too_many_components() {
        assert!(Semver::parse("1.x.3").is_err());
        assert!(Semver::parse("1.2.3.4").is_err());
    }
}
