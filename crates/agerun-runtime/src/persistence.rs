//! Persistence (§4.I): textual save/load of the methodology and agency
//! registries, with atomic tmp-then-rename writes and a validate-then-load
//! reader that salvages a corrupt file instead of failing the process.
//!
//! Grounded on `original_source/modules/agerun_methodology.c`'s save/load
//! pair: method count, then one `<name> <version-count>` header per name
//! followed by `<version>`/`<source>` line pairs per version. The agency
//! file follows the same shape for `<id> <name> <version> <memory>`
//! rows. Method sources are frequently multi-line scripts, so unlike the
//! source (which writes them verbatim and therefore can't round-trip a
//! script with embedded newlines through its one-line-per-source grammar)
//! this implementation escapes newlines on save and unescapes them on
//! load, keeping the on-disk format exactly one physical line per field.

use crate::agency::Agency;
use crate::agent::{Agent, MethodRef};
use crate::error::PersistenceError;
use crate::methodology::Methodology;
use crate::semver::Semver;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const METHODOLOGY_FILE_NAME: &str = "methodology.agerun";
pub const AGENCY_FILE_NAME: &str = "agency.agerun";

/// The on-disk placeholder for an agent's memory field — round-tripping
/// agent memory is an open question the source leaves unresolved (§9).
const MEMORY_PLACEHOLDER: &str = "-";

pub fn save_methodology(path: &Path, methodology: &Methodology) -> Result<(), PersistenceError> {
    let mut text = String::new();
    let name_count = methodology.buckets().count();
    text.push_str(&format!("{name_count}\n"));
    for (name, versions) in methodology.buckets() {
        text.push_str(&format!("{name} {}\n", versions.len()));
        for m in versions {
            text.push_str(&format!("{}\n", m.version()));
            text.push_str(&format!("{}\n", escape(m.source())));
        }
    }
    atomic_write(path, &text)
}

/// Loads `path`, salvaging (backup + wipe + empty state) on any grammar
/// violation. A missing file is treated the same as an empty one — not a
/// corruption.
pub fn load_methodology(path: &Path) -> Result<Methodology, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Methodology::new()),
        Err(e) => return Err(e.into()),
    };
    match parse_methodology(&text) {
        Ok(entries) => Ok(build_methodology(entries)),
        Err(reason) => {
            tracing::warn!(path = %path.display(), reason, "methodology file failed validation, salvaging");
            salvage(path)?;
            Ok(Methodology::new())
        }
    }
}

pub fn save_agency(path: &Path, agency: &Agency) -> Result<(), PersistenceError> {
    let mut text = String::new();
    text.push_str(&format!("{}\n", agency.agent_count()));
    for agent in agency.agents() {
        text.push_str(&format!(
            "{} {} {} {}\n",
            agent.id(),
            agent.method().name,
            agent.method().version,
            MEMORY_PLACEHOLDER
        ));
    }
    atomic_write(path, &text)
}

/// Loads `path` against `methodology` to resolve each stored method
/// reference. An agent whose method is no longer registered is dropped
/// with a warning rather than failing the whole load.
pub fn load_agency(path: &Path, methodology: &Methodology) -> Result<Agency, PersistenceError> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Agency::new()),
        Err(e) => return Err(e.into()),
    };
    match parse_agency(&text) {
        Ok(entries) => Ok(build_agency(entries, methodology)),
        Err(reason) => {
            tracing::warn!(path = %path.display(), reason, "agency file failed validation, salvaging");
            salvage(path)?;
            Ok(Agency::new())
        }
    }
}

fn parse_methodology(text: &str) -> Result<Vec<(String, Semver, String)>, String> {
    let mut lines = text.lines();
    let count_line = lines.next().ok_or("missing method count line")?;
    let name_count: usize = count_line
        .trim()
        .parse()
        .map_err(|_| format!("invalid method count '{count_line}'"))?;

    let mut entries = Vec::new();
    for i in 0..name_count {
        let header = lines.next().ok_or(format!("missing header for method {i}"))?;
        let mut fields = header.split_whitespace();
        let name = fields.next().ok_or(format!("missing name in header {i}"))?;
        let version_count_field = fields.next().ok_or(format!("missing version count in header {i}"))?;
        if fields.next().is_some() {
            return Err(format!("header {i} has more than 2 fields"));
        }
        if name.is_empty() {
            return Err(format!("empty method name at entry {i}"));
        }
        let version_count: usize = version_count_field
            .parse()
            .map_err(|_| format!("invalid version count '{version_count_field}' for {name}"))?;

        for _ in 0..version_count {
            let version_line = lines.next().ok_or(format!("missing version line for {name}"))?;
            let version = Semver::parse(version_line.trim()).map_err(|e| e.to_string())?;
            let source_line = lines.next().ok_or(format!("missing source line for {name}"))?;
            entries.push((name.to_string(), version, unescape(source_line)));
        }
    }
    Ok(entries)
}

fn build_methodology(entries: Vec<(String, Semver, String)>) -> Methodology {
    let mut methodology = Methodology::new();
    for (name, version, source) in entries {
        if let Err(e) = methodology.insert_loaded(&name, version, &source) {
            tracing::warn!(%name, %version, %e, "dropping method entry while rebuilding methodology");
        }
    }
    methodology
}

fn parse_agency(text: &str) -> Result<Vec<(i64, String, Semver)>, String> {
    let mut lines = text.lines();
    let count_line = lines.next().ok_or("missing agent count line")?;
    let agent_count: usize = count_line
        .trim()
        .parse()
        .map_err(|_| format!("invalid agent count '{count_line}'"))?;

    let mut entries = Vec::new();
    for i in 0..agent_count {
        let line = lines.next().ok_or(format!("missing agent row {i}"))?;
        let mut fields = line.split_whitespace();
        let id: i64 = fields
            .next()
            .ok_or(format!("missing id in agent row {i}"))?
            .parse()
            .map_err(|_| format!("invalid id in agent row {i}"))?;
        if id <= 0 {
            return Err(format!("non-positive agent id {id}"));
        }
        let name = fields.next().ok_or(format!("missing method name in agent row {i}"))?;
        let version_field = fields.next().ok_or(format!("missing version in agent row {i}"))?;
        let version = Semver::parse(version_field).map_err(|e| e.to_string())?;
        let _memory_placeholder = fields.next().ok_or(format!("missing memory field in agent row {i}"))?;
        if fields.next().is_some() {
            return Err(format!("agent row {i} has more than 4 fields"));
        }
        entries.push((id, name.to_string(), version));
    }
    Ok(entries)
}

fn build_agency(entries: Vec<(i64, String, Semver)>, methodology: &Methodology) -> Agency {
    let mut agency = Agency::new();
    for (id, name, version) in entries {
        if methodology.get_method(&name, &version.to_string()).is_none() {
            tracing::warn!(id, %name, %version, "dropping agent: method no longer registered");
            continue;
        }
        agency.insert_agent(Agent::new(id, MethodRef { name, version }, None));
    }
    agency
}

fn salvage(path: &Path) -> Result<(), PersistenceError> {
    let backup = backup_path(path);
    fs::copy(path, &backup)?;
    fs::remove_file(path)?;
    Ok(())
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    path.with_file_name(name)
}

/// Writes `contents` to `<path>.tmp`, flushes, tightens permissions to
/// owner read/write, then renames over `path` (atomic replace).
fn atomic_write(path: &Path, contents: &str) -> Result<(), PersistenceError> {
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    let mut file = fs::File::create(&tmp_path)?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    drop(file);
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn escape(source: &str) -> String {
    source.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('\\') => out.push('\\'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn methodology_round_trips_through_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METHODOLOGY_FILE_NAME);
        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology
            .register_method("echo", "send(0, message)\nmemory.x := 1", "1.0.0", &mut agency)
            .unwrap();
        methodology.register_method("counter", "memory.n := memory.n + 1", "2.3.1", &mut agency).unwrap();

        save_methodology(&path, &methodology).unwrap();
        let loaded = load_methodology(&path).unwrap();

        let a: Vec<_> = methodology.all_methods().map(|m| (m.name().to_string(), m.version(), m.source().to_string())).collect();
        let b: Vec<_> = loaded.all_methods().map(|m| (m.name().to_string(), m.version(), m.source().to_string())).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn corrupt_methodology_file_is_salvaged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METHODOLOGY_FILE_NAME);
        fs::write(&path, "garbage\n").unwrap();

        let loaded = load_methodology(&path).unwrap();
        assert_eq!(loaded.all_methods().count(), 0);
        assert!(!path.exists());
        assert!(backup_path(&path).exists());
    }

    #[test]
    fn missing_methodology_file_loads_as_empty_without_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(METHODOLOGY_FILE_NAME);
        let loaded = load_methodology(&path).unwrap();
        assert_eq!(loaded.all_methods().count(), 0);
    }

    #[test]
    fn agency_round_trips_id_and_method_reference() {
        let dir = tempdir().unwrap();
        let methodology_path = dir.path().join(METHODOLOGY_FILE_NAME);
        let agency_path = dir.path().join(AGENCY_FILE_NAME);

        let mut agency = Agency::new();
        let mut methodology = Methodology::new();
        methodology.register_method("echo", "send(0, message)", "1.0.0", &mut agency).unwrap();
        let id = agency.create_agent(&methodology, "echo", "1.0.0", None).unwrap();

        save_methodology(&methodology_path, &methodology).unwrap();
        save_agency(&agency_path, &agency).unwrap();

        let loaded_methodology = load_methodology(&methodology_path).unwrap();
        let loaded_agency = load_agency(&agency_path, &loaded_methodology).unwrap();

        let agent = loaded_agency.agent(id).unwrap();
        assert_eq!(agent.method().name, "echo");
        assert_eq!(agent.method().version, Semver::new(1, 0, 0));
    }

    #[test]
    fn agent_bound_to_an_unregistered_method_is_dropped_on_load() {
        let dir = tempdir().unwrap();
        let agency_path = dir.path().join(AGENCY_FILE_NAME);
        fs::write(&agency_path, "1\n7 ghost 1.0.0 -\n").unwrap();

        let empty_methodology = Methodology::new();
        let loaded = load_agency(&agency_path, &empty_methodology).unwrap();
        assert_eq!(loaded.agent_count(), 0);
    }
}
