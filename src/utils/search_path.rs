//! Executable search path (`PATH`) stores and idempotent registration.
//!
//! On Windows the persistent stores live in the registry:
//! `HKEY_CURRENT_USER\Environment\Path` for the user scope and
//! `HKEY_LOCAL_MACHINE\SYSTEM\CurrentControlSet\Control\Session Manager\Environment\Path`
//! for the machine scope. Elsewhere only the running process's `PATH` is touched.

use crate::error::{PgkitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[cfg(windows)]
const USER_ENVIRONMENT: &str = "Environment";
#[cfg(windows)]
const MACHINE_ENVIRONMENT: &str = r"SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

const SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathScope {
    User,
    Machine,
}

impl fmt::Display for PathScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathScope::User => f.write_str("user"),
            PathScope::Machine => f.write_str("machine"),
        }
    }
}

impl FromStr for PathScope {
    type Err = PgkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Ok(PathScope::User),
            "machine" | "system" => Ok(PathScope::Machine),
            other => Err(PgkitError::config_error(format!(
                "unknown search path scope '{other}' (expected 'user' or 'machine')"
            ))),
        }
    }
}

/// A place where one `PATH`-style list is stored.
pub trait SearchPathStore {
    fn scope(&self) -> PathScope;

    /// The raw separator-joined list. Empty when unset.
    fn read(&self) -> Result<String>;

    fn write(&mut self, value: &str) -> Result<()>;
}

/// The `PATH` of the running process.
pub struct ProcessPathStore {
    scope: PathScope,
}

impl ProcessPathStore {
    pub fn new(scope: PathScope) -> Self {
        Self { scope }
    }
}

impl SearchPathStore for ProcessPathStore {
    fn scope(&self) -> PathScope {
        self.scope
    }

    fn read(&self) -> Result<String> {
        Ok(std::env::var_os("PATH")
            .map(|path| path.to_string_lossy().into_owned())
            .unwrap_or_default())
    }

    fn write(&mut self, value: &str) -> Result<()> {
        std::env::set_var("PATH", value);
        Ok(())
    }
}

#[cfg(windows)]
pub struct RegistryPathStore {
    scope: PathScope,
}

#[cfg(windows)]
impl RegistryPathStore {
    pub fn new(scope: PathScope) -> Self {
        Self { scope }
    }

    fn open(&self, flags: u32) -> Result<winreg::RegKey> {
        use winreg::enums::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
        use winreg::RegKey;

        let (root, subkey) = match self.scope {
            PathScope::User => (HKEY_CURRENT_USER, USER_ENVIRONMENT),
            PathScope::Machine => (HKEY_LOCAL_MACHINE, MACHINE_ENVIRONMENT),
        };

        RegKey::predef(root)
            .open_subkey_with_flags(subkey, flags)
            .map_err(|e| {
                PgkitError::search_path(format!(
                    "failed to open {} environment registry key: {e}",
                    self.scope
                ))
            })
    }
}

#[cfg(windows)]
impl SearchPathStore for RegistryPathStore {
    fn scope(&self) -> PathScope {
        self.scope
    }

    fn read(&self) -> Result<String> {
        use winreg::enums::KEY_READ;

        match self.open(KEY_READ)?.get_value::<String, _>("Path") {
            Ok(value) => Ok(value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(PgkitError::search_path(format!(
                "failed to read {} PATH: {e}",
                self.scope
            ))),
        }
    }

    fn write(&mut self, value: &str) -> Result<()> {
        use winreg::enums::{RegType, KEY_READ, KEY_WRITE};
        use winreg::types::ToRegValue;

        let previous = self.read()?;

        // Stored as REG_EXPAND_SZ so entries such as %SystemRoot% keep expanding.
        let mut raw = value.to_string().to_reg_value();
        raw.vtype = RegType::REG_EXPAND_SZ;

        self.open(KEY_READ | KEY_WRITE)?
            .set_raw_value("Path", &raw)
            .map_err(|e| {
                PgkitError::search_path(format!("failed to update {} PATH: {e}", self.scope))
            })?;

        // New processes pick the registry up. This one only gets the entries
        // the write introduced.
        let mut process = ProcessPathStore::new(self.scope);
        for entry in added_entries(&previous, value) {
            register_directory(&mut process, &entry)?;
        }
        Ok(())
    }
}

/// The persistent store for `scope` on this platform.
pub fn system_store(scope: PathScope) -> Box<dyn SearchPathStore> {
    #[cfg(windows)]
    let store: Box<dyn SearchPathStore> = Box::new(RegistryPathStore::new(scope));
    #[cfg(not(windows))]
    let store: Box<dyn SearchPathStore> = Box::new(ProcessPathStore::new(scope));
    store
}

/// True when the current principal may change the machine-wide search path.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    use winreg::enums::{HKEY_LOCAL_MACHINE, KEY_WRITE};
    use winreg::RegKey;

    RegKey::predef(HKEY_LOCAL_MACHINE)
        .open_subkey_with_flags(MACHINE_ENVIRONMENT, KEY_WRITE)
        .is_ok()
}

#[cfg(not(windows))]
pub fn is_elevated() -> bool {
    false
}

/// Machine-wide when elevated, the current user otherwise.
pub fn detect_scope() -> PathScope {
    if is_elevated() {
        PathScope::Machine
    } else {
        PathScope::User
    }
}

pub fn entries(store: &dyn SearchPathStore) -> Result<Vec<PathBuf>> {
    let raw = store.read()?;
    Ok(std::env::split_paths(&raw)
        .filter(|entry| !entry.as_os_str().is_empty())
        .collect())
}

pub fn contains(store: &dyn SearchPathStore, dir: &Path) -> Result<bool> {
    Ok(entries(store)?.iter().any(|entry| same_entry(entry, dir)))
}

/// Append `dir` to the store unless an equivalent entry is already present.
///
/// Returns whether the store was changed.
pub fn register_directory(store: &mut dyn SearchPathStore, dir: &Path) -> Result<bool> {
    let dir_str = dir.to_string_lossy();
    if dir_str.contains(SEPARATOR) {
        return Err(PgkitError::search_path(format!(
            "'{dir_str}' contains the path separator '{SEPARATOR}'"
        )));
    }

    if contains(store, dir)? {
        return Ok(false);
    }

    let current = store.read()?;
    let current = current.trim_end_matches(SEPARATOR);
    let updated = if current.trim().is_empty() {
        dir_str.into_owned()
    } else {
        format!("{current}{SEPARATOR}{dir_str}")
    };

    store.write(&updated)?;
    tracing::info!("Registered {} in the {} search path", dir.display(), store.scope());
    Ok(true)
}

/// Entries of `updated` with no equivalent in `previous`.
#[cfg_attr(not(windows), allow(dead_code))]
fn added_entries(previous: &str, updated: &str) -> Vec<PathBuf> {
    let before: Vec<PathBuf> = std::env::split_paths(previous).collect();
    std::env::split_paths(updated)
        .filter(|entry| !entry.as_os_str().is_empty())
        .filter(|entry| !before.iter().any(|old| same_entry(old, entry)))
        .collect()
}

/// Replace `%NAME%` references with `lookup(NAME)`. Unknown names and a lone
/// `%` are kept as written, the way the Windows shell leaves them.
fn expand_variables(raw: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut expanded = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('%') {
        expanded.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let Some(end) = after.find('%') else {
            rest = &rest[start..];
            break;
        };

        let name = &after[..end];
        match lookup(name).filter(|_| !name.is_empty()) {
            Some(value) => {
                expanded.push_str(&value);
                rest = &after[end + 1..];
            }
            None => {
                expanded.push('%');
                expanded.push_str(name);
                rest = &after[end..];
            }
        }
    }

    expanded.push_str(rest);
    expanded
}

/// Look `name` up on the store's search path the way a shell would.
///
/// Registry values are `REG_EXPAND_SZ`, so on Windows `%VAR%` entries are
/// expanded against the process environment first.
pub fn locate_executable(store: &dyn SearchPathStore, name: &str) -> Result<Option<PathBuf>> {
    let mut paths = store.read()?;
    if paths.trim().is_empty() {
        return Ok(None);
    }
    if cfg!(windows) {
        paths = expand_variables(&paths, |var| std::env::var(var).ok());
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    Ok(which::which_in(name, Some(paths), cwd).ok())
}

fn same_entry(a: &Path, b: &Path) -> bool {
    let a = a.to_string_lossy();
    let b = b.to_string_lossy();
    let a = a.trim_end_matches(['/', '\\']);
    let b = b.trim_end_matches(['/', '\\']);

    if cfg!(windows) {
        a.eq_ignore_ascii_case(b)
    } else {
        a == b
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// A search path held in memory.
    pub struct MemoryPathStore {
        pub scope: PathScope,
        pub value: String,
        pub writes: usize,
    }

    impl MemoryPathStore {
        pub fn new(value: &str) -> Self {
            Self {
                scope: PathScope::User,
                value: value.to_string(),
                writes: 0,
            }
        }
    }

    impl SearchPathStore for MemoryPathStore {
        fn scope(&self) -> PathScope {
            self.scope
        }

        fn read(&self) -> Result<String> {
            Ok(self.value.clone())
        }

        fn write(&mut self, value: &str) -> Result<()> {
            self.value = value.to_string();
            self.writes += 1;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::MemoryPathStore;
    use super::*;
    use pretty_assertions::assert_eq;

    fn joined(parts: &[&str]) -> String {
        parts.join(&SEPARATOR.to_string())
    }

    #[test]
    fn test_register_is_idempotent() {
        let existing = std::env::temp_dir().join("existing");
        let target = std::env::temp_dir().join("pgkit-bin");
        let mut store = MemoryPathStore::new(&existing.to_string_lossy());

        assert!(register_directory(&mut store, &target).unwrap());
        assert!(!register_directory(&mut store, &target).unwrap());

        let found = entries(&store).unwrap();
        assert_eq!(found.iter().filter(|e| **e == target).count(), 1);
        assert_eq!(found.len(), 2);
        assert_eq!(store.writes, 1);
    }

    #[test]
    fn test_register_into_empty_store() {
        let target = std::env::temp_dir().join("pgkit-bin");
        let mut store = MemoryPathStore::new("");

        assert!(register_directory(&mut store, &target).unwrap());
        assert_eq!(store.value, target.to_string_lossy());
    }

    #[test]
    fn test_trailing_separator_is_ignored() {
        let target = std::env::temp_dir().join("pgkit-bin");
        let with_slash = format!("{}{}", target.display(), std::path::MAIN_SEPARATOR);
        let mut store = MemoryPathStore::new(&joined(&[&with_slash, ""]));

        assert!(contains(&store, &target).unwrap());
        assert!(!register_directory(&mut store, &target).unwrap());
        assert_eq!(store.writes, 0);
    }

    #[test]
    fn test_rejects_separator_in_directory() {
        let bad = PathBuf::from(format!("a{SEPARATOR}b"));
        let mut store = MemoryPathStore::new("");
        assert!(matches!(
            register_directory(&mut store, &bad),
            Err(PgkitError::SearchPath { .. })
        ));
    }

    #[test]
    fn test_added_entries_are_only_the_new_ones() {
        let tmp = std::env::temp_dir();
        let home = tmp.join("home").to_string_lossy().into_owned();
        let tools = tmp.join("tools").to_string_lossy().into_owned();
        let target = tmp.join("pgkit-bin");
        let with_slash = format!("{tools}{}", std::path::MAIN_SEPARATOR);

        let previous = joined(&[&home, &tools]);
        let updated = joined(&[&home, &with_slash, &target.to_string_lossy()]);

        assert_eq!(added_entries(&previous, &updated), vec![target]);
        assert!(added_entries(&previous, &previous).is_empty());
        assert_eq!(added_entries("", &home), vec![PathBuf::from(&home)]);
    }

    #[test]
    fn test_expand_variables() {
        let lookup = |name: &str| match name {
            "SystemRoot" => Some(r"C:\Windows".to_string()),
            "USERPROFILE" => Some(r"C:\Users\dev".to_string()),
            _ => None,
        };

        assert_eq!(
            expand_variables(r"%SystemRoot%\system32;%USERPROFILE%\bin", lookup),
            r"C:\Windows\system32;C:\Users\dev\bin"
        );
        assert_eq!(expand_variables(r"%MISSING%\bin", lookup), r"%MISSING%\bin");
        assert_eq!(expand_variables("100%", lookup), "100%");
        assert_eq!(
            expand_variables(r"50% off %SystemRoot%", lookup),
            r"50% off C:\Windows"
        );
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!("user".parse::<PathScope>().unwrap(), PathScope::User);
        assert_eq!("Machine".parse::<PathScope>().unwrap(), PathScope::Machine);
        assert!("global".parse::<PathScope>().is_err());
        assert_eq!(PathScope::Machine.to_string(), "machine");
    }

    #[test]
    fn test_process_store_reads_path() {
        let store = ProcessPathStore::new(PathScope::User);
        let expected = std::env::var_os("PATH")
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        assert_eq!(store.read().unwrap(), expected);
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_executable_on_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("pg_dump");
        std::fs::write(&tool, "#!/bin/sh\n").unwrap();
        crate::utils::fs::make_executable(&tool).unwrap();

        let store = MemoryPathStore::new(&dir.path().to_string_lossy());
        assert_eq!(locate_executable(&store, "pg_dump").unwrap(), Some(tool));
        assert_eq!(locate_executable(&store, "psql").unwrap(), None);
        assert_eq!(
            locate_executable(&MemoryPathStore::new(""), "pg_dump").unwrap(),
            None
        );
    }
}
