use crate::core::config::InstallerConfig;
use crate::error::Result;
use crate::utils::fs;
use crate::utils::search_path::{self, SearchPathStore};

/// What the doctor found, one flag per check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnosis {
    pub target_exists: bool,
    pub installed: Vec<String>,
    pub missing: Vec<String>,
    pub marker_installed: bool,
    pub on_search_path: bool,
    pub marker_found: bool,
}

impl Diagnosis {
    pub fn issues(&self) -> usize {
        [
            self.target_exists,
            self.marker_installed,
            self.on_search_path,
            self.marker_found,
        ]
        .iter()
        .filter(|ok| !**ok)
        .count()
    }
}

pub fn diagnose(config: &InstallerConfig, store: &dyn SearchPathStore) -> Result<Diagnosis> {
    let target = &config.target_dir;
    let present = fs::list_file_names(target)?;

    let (installed, missing): (Vec<String>, Vec<String>) = config
        .files
        .iter()
        .cloned()
        .partition(|file| present.contains(file));

    let marker_installed = installed.iter().any(|file| {
        std::path::Path::new(file)
            .file_stem()
            .is_some_and(|stem| stem.eq_ignore_ascii_case(&config.marker_executable))
    });

    Ok(Diagnosis {
        target_exists: target.is_dir(),
        installed,
        missing,
        marker_installed,
        on_search_path: search_path::contains(store, target)?,
        marker_found: search_path::locate_executable(store, &config.marker_executable)?.is_some(),
    })
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "✅"
    } else {
        "❌"
    }
}

pub fn check_environment(config: &InstallerConfig) -> Result<bool> {
    println!("🔍 pgkit - Environment Check");
    println!();

    let scope = config.scope.unwrap_or_else(search_path::detect_scope);
    let store = search_path::system_store(scope);
    let diagnosis = diagnose(config, store.as_ref())?;

    println!("⚙️  Configuration:");
    println!("  architecture: {}", config.architecture);
    println!("  download page: {}", config.page_url);
    println!("  search path scope: {scope}");
    println!("  elevated: {}", search_path::is_elevated());
    println!();

    println!("📁 Target Directory:");
    println!("  {}", config.target_dir.display());
    println!(
        "    {} {}",
        mark(diagnosis.target_exists),
        if diagnosis.target_exists { "exists" } else { "missing" }
    );
    println!();

    println!("📦 Installed Files:");
    if diagnosis.installed.is_empty() {
        println!("  ⚠️  None of the client files are installed");
    }
    for file in &diagnosis.installed {
        println!("  ✅ {file}");
    }
    for file in &diagnosis.missing {
        println!("  ·  {file} (not present)");
    }
    println!(
        "  {} {} installed",
        mark(diagnosis.marker_installed),
        config.marker_executable
    );
    println!();

    println!("🛣️  PATH Configuration:");
    println!(
        "  {} target directory {} the {scope} PATH",
        mark(diagnosis.on_search_path),
        if diagnosis.on_search_path { "is on" } else { "is NOT on" }
    );
    println!(
        "  {} '{}' {}",
        mark(diagnosis.marker_found),
        config.marker_executable,
        if diagnosis.marker_found {
            "resolves from PATH"
        } else {
            "not found on PATH"
        }
    );
    println!();

    let issues = diagnosis.issues();
    if issues == 0 {
        println!("🎉 Environment looks good! No issues found.");
    } else {
        println!("⚠️  Found {issues} issue(s) that need attention.");
        println!();
        println!("💡 To fix issues:");
        println!("  - Run 'pgkit install' to download and register the client tools");
        println!("  - Run 'pgkit --scope machine install' from an elevated prompt for all users");
    }

    Ok(issues == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Architecture;
    use crate::utils::search_path::testing::MemoryPathStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fresh_machine_reports_everything_missing() {
        let root = tempfile::tempdir().unwrap();
        let mut config = InstallerConfig::for_architecture(Architecture::X64);
        config.target_dir = root.path().join("bin");

        let diagnosis = diagnose(&config, &MemoryPathStore::new("")).unwrap();
        assert!(!diagnosis.target_exists);
        assert!(diagnosis.installed.is_empty());
        assert_eq!(diagnosis.missing.len(), config.files.len());
        assert_eq!(diagnosis.issues(), 4);
    }

    #[test]
    fn test_installed_files_are_partitioned() {
        let root = tempfile::tempdir().unwrap();
        let mut config = InstallerConfig::for_architecture(Architecture::X64);
        config.target_dir = root.path().to_path_buf();
        config.files = vec!["psql.exe".to_string(), "pg_dump.exe".to_string()];
        std::fs::write(root.path().join("pg_dump.exe"), "").unwrap();

        let store = MemoryPathStore::new(&root.path().to_string_lossy());
        let diagnosis = diagnose(&config, &store).unwrap();

        assert_eq!(diagnosis.installed, vec!["pg_dump.exe".to_string()]);
        assert_eq!(diagnosis.missing, vec!["psql.exe".to_string()]);
        assert!(diagnosis.marker_installed);
        assert!(diagnosis.on_search_path);
    }
}
