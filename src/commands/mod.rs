pub mod config;
pub mod doctor;
pub mod ensure;
pub mod install;
pub mod reporter;
pub mod resolve;

use crate::core::config::{Architecture, InstallerConfig};
use crate::core::events::DiagnosticSink;
use crate::core::installer::Installer;
use crate::error::{PgkitError, Result};
use crate::utils::search_path::PathScope;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub target: Option<PathBuf>,
    pub architecture: Option<Architecture>,
    pub scope: Option<PathScope>,
    pub page_url: Option<String>,
}

impl Overrides {
    pub fn apply(&self, config: &mut InstallerConfig) {
        if let Some(target) = &self.target {
            config.target_dir = target.clone();
        }
        if let Some(architecture) = self.architecture {
            config.architecture = architecture;
        }
        if let Some(scope) = self.scope {
            config.scope = Some(scope);
        }
        if let Some(page_url) = &self.page_url {
            config.page_url = page_url.clone();
        }
    }
}

pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<InstallerConfig> {
    let mut config = InstallerConfig::load(path)?;
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Mirror every install event as one line of text into `log_file`, truncating it.
pub fn attach_log_file(installer: &mut Installer, log_file: Option<&Path>) -> Result<()> {
    let Some(path) = log_file else {
        return Ok(());
    };

    let file = File::create(path).map_err(|e| PgkitError::filesystem(path, e))?;
    installer.subscribe(DiagnosticSink::new(file));
    tracing::debug!("Writing install events to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::http::testing::{FakeTransport, Route};
    use crate::utils::search_path::testing::MemoryPathStore;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "architecture": "x64", "target_dir": "/from/file", "scope": "machine" }"#,
        )
        .unwrap();

        let overrides = Overrides {
            target: Some(PathBuf::from("/from/flag")),
            architecture: Some(Architecture::X86),
            scope: Some(PathScope::User),
            page_url: None,
        };
        let config = load_config(Some(&path), &overrides).unwrap();

        assert_eq!(config.target_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.scope, Some(PathScope::User));
        assert_eq!(config.relative_pattern(), "postgresql-*-binaries-win32");
    }

    #[test]
    fn test_empty_overrides_keep_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "page_url": "https://mirror.example/pg" }"#).unwrap();

        let config = load_config(Some(&path), &Overrides::default()).unwrap();
        assert_eq!(config.page_url, "https://mirror.example/pg");
    }

    #[test]
    fn test_log_file_receives_failure_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("install.log");
        let mut config = InstallerConfig::for_architecture(Architecture::X64);
        config.page_url = "https://vendor.example/binaries".to_string();
        config.target_dir = dir.path().join("bin");
        config.scope = Some(PathScope::User);

        let transport = FakeTransport::new().route(&config.page_url, Route::Unreachable);
        let mut installer = Installer::new(config)
            .with_transport(transport)
            .with_search_path(MemoryPathStore::new(""));
        attach_log_file(&mut installer, Some(&log)).unwrap();

        assert!(!installer.install());
        assert_eq!(std::fs::read_to_string(&log).unwrap(), "Download error.\n");
    }

    #[test]
    fn test_log_file_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("nope").join("install.log");
        let mut installer = Installer::new(InstallerConfig::for_architecture(Architecture::X64));

        assert!(matches!(
            attach_log_file(&mut installer, Some(&log)),
            Err(PgkitError::Filesystem { .. })
        ));
        assert!(attach_log_file(&mut installer, None).is_ok());
    }
}
