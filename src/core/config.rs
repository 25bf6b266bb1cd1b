use crate::core::extract::FileFilter;
use crate::core::resolver::LinkPatterns;
use crate::error::{PgkitError, Result};
use crate::utils::fs;
use crate::utils::search_path::PathScope;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PAGE_URL: &str = "https://www.enterprisedb.com/download-postgresql-binaries";

const X64_RELATIVE: &str = "postgresql-*-binaries-win64";
const X64_ABSOLUTE: &str =
    "https://get.enterprisedb.com/postgresql/postgresql-*-windows-x64-binaries.zip";
const X86_RELATIVE: &str = "postgresql-*-binaries-win32";
const X86_ABSOLUTE: &str = "https://get.enterprisedb.com/postgresql/postgresql-*-windows-binaries.zip";

/// Client tools and the libraries they load.
const CLIENT_FILES: &[&str] = &[
    "psql.exe",
    "pg_dump.exe",
    "pg_dumpall.exe",
    "pg_restore.exe",
    "libpq.dll",
    "libiconv-2.dll",
    "libintl-8.dll",
    "libintl-9.dll",
    "libssl-1_1-x64.dll",
    "libcrypto-1_1-x64.dll",
    "libssl-1_1.dll",
    "libcrypto-1_1.dll",
    "libssl-3-x64.dll",
    "libcrypto-3-x64.dll",
    "zlib1.dll",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    X64,
    X86,
}

impl Architecture {
    /// Architecture of the host, as reported by the OS.
    ///
    /// A 32-bit process on 64-bit Windows still reports `X64`.
    pub fn detect() -> Self {
        let reported = if cfg!(windows) {
            std::env::var("PROCESSOR_ARCHITEW6432")
                .or_else(|_| std::env::var("PROCESSOR_ARCHITECTURE"))
                .unwrap_or_else(|_| std::env::consts::ARCH.to_string())
        } else {
            std::env::consts::ARCH.to_string()
        };

        Self::from_reported(&reported)
    }

    fn from_reported(reported: &str) -> Self {
        match reported.to_ascii_lowercase().as_str() {
            "x86" | "i386" | "i586" | "i686" => Architecture::X86,
            _ => Architecture::X64,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::X64 => f.write_str("x64"),
            Architecture::X86 => f.write_str("x86"),
        }
    }
}

impl FromStr for Architecture {
    type Err = PgkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "x64" | "amd64" | "x86_64" | "win64" => Ok(Architecture::X64),
            "x86" | "win32" | "i686" => Ok(Architecture::X86),
            other => Err(PgkitError::config_error(format!(
                "unknown architecture '{other}' (expected 'x64' or 'x86')"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct InstallerConfig {
    pub page_url: String,
    pub architecture: Architecture,
    /// Overrides the architecture's built-in relative pattern.
    pub relative_pattern: Option<String>,
    /// Overrides the architecture's built-in absolute pattern.
    pub absolute_pattern: Option<String>,
    pub archive_directory: String,
    pub files: Vec<String>,
    pub target_dir: PathBuf,
    pub marker_executable: String,
    /// `None` picks machine or user scope from the caller's privilege.
    pub scope: Option<PathScope>,
    pub user_agent: String,
    pub connect_timeout_secs: u64,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self::for_architecture(Architecture::detect())
    }
}

impl InstallerConfig {
    pub fn for_architecture(architecture: Architecture) -> Self {
        InstallerConfig {
            page_url: DEFAULT_PAGE_URL.to_string(),
            architecture,
            relative_pattern: None,
            absolute_pattern: None,
            archive_directory: "pgsql/bin".to_string(),
            files: CLIENT_FILES.iter().map(|f| f.to_string()).collect(),
            target_dir: default_target_dir(),
            marker_executable: "pg_dump".to_string(),
            scope: None,
            user_agent: format!("pgkit/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 30,
        }
    }

    /// Load `path` if given, otherwise the user config file if it exists,
    /// otherwise the defaults for this host.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }

        match default_config_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| PgkitError::filesystem(path, e))?;
        let config: InstallerConfig = serde_json::from_str(&content).map_err(|e| {
            PgkitError::config_error(format!("{}: {e}", path.display()))
        })?;
        config.validate()?;

        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::ensure_dir_exists(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| PgkitError::filesystem(path, e))?;

        Ok(())
    }

    pub fn relative_pattern(&self) -> &str {
        self.relative_pattern
            .as_deref()
            .unwrap_or(match self.architecture {
                Architecture::X64 => X64_RELATIVE,
                Architecture::X86 => X86_RELATIVE,
            })
    }

    pub fn absolute_pattern(&self) -> &str {
        self.absolute_pattern
            .as_deref()
            .unwrap_or(match self.architecture {
                Architecture::X64 => X64_ABSOLUTE,
                Architecture::X86 => X86_ABSOLUTE,
            })
    }

    pub fn link_patterns(&self) -> Result<LinkPatterns> {
        LinkPatterns::new(self.relative_pattern(), self.absolute_pattern())
    }

    pub fn file_filter(&self) -> FileFilter {
        FileFilter::new(&self.archive_directory, self.files.iter().cloned())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.link_patterns()?;

        if self.files.is_empty() {
            return Err(PgkitError::config_error("the file allow-list is empty"));
        }
        if let Some(bad) = self.files.iter().find(|f| f.contains(['/', '\\']) || f.is_empty()) {
            return Err(PgkitError::config_error(format!(
                "allow-list entry '{bad}' must be a bare file name"
            )));
        }
        if self.marker_executable.trim().is_empty() {
            return Err(PgkitError::config_error("marker executable is empty"));
        }
        if self.target_dir.as_os_str().is_empty() {
            return Err(PgkitError::config_error("target directory is empty"));
        }

        Ok(())
    }

    /// A copy with the built-in patterns written out, for display or saving.
    pub fn materialized(&self) -> Self {
        let mut config = self.clone();
        config.relative_pattern = Some(self.relative_pattern().to_string());
        config.absolute_pattern = Some(self.absolute_pattern().to_string());
        config
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pgkit").join("config.json"))
}

fn default_target_dir() -> PathBuf {
    if cfg!(windows) {
        let program_files = std::env::var_os("ProgramFiles")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(r"C:\Program Files"));
        return program_files.join("PostgreSQL").join("bin");
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".pgkit"))
        .join("pgkit")
        .join("bin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_architecture_patterns() {
        let x64 = InstallerConfig::for_architecture(Architecture::X64);
        assert_eq!(x64.relative_pattern(), "postgresql-*-binaries-win64");
        assert!(x64.absolute_pattern().ends_with("windows-x64-binaries.zip"));

        let x86 = InstallerConfig::for_architecture(Architecture::X86);
        assert_eq!(x86.relative_pattern(), "postgresql-*-binaries-win32");
        assert!(x86.absolute_pattern().ends_with("windows-binaries.zip"));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = InstallerConfig::for_architecture(Architecture::X64);
        config.validate().unwrap();

        let filter = config.file_filter();
        assert_eq!(filter.directory, "pgsql/bin");
        assert!(filter.files.contains("psql.exe"));
        assert!(filter.files.contains("pg_dump.exe"));
        assert_eq!(config.marker_executable, "pg_dump");
    }

    #[test]
    fn test_reported_architecture() {
        assert_eq!(Architecture::from_reported("AMD64"), Architecture::X64);
        assert_eq!(Architecture::from_reported("x86"), Architecture::X86);
        assert_eq!(Architecture::from_reported("i686"), Architecture::X86);
        assert_eq!(Architecture::from_reported("aarch64"), Architecture::X64);
        assert_eq!("win32".parse::<Architecture>().unwrap(), Architecture::X86);
        assert!("sparc".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_partial_file_takes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{ "architecture": "x86", "target_dir": "/opt/pg/bin", "scope": "user" }"#,
        )
        .unwrap();

        let config = InstallerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.architecture, Architecture::X86);
        assert_eq!(config.target_dir, PathBuf::from("/opt/pg/bin"));
        assert_eq!(config.scope, Some(PathScope::User));
        assert_eq!(config.page_url, DEFAULT_PAGE_URL);
        assert_eq!(config.relative_pattern(), "postgresql-*-binaries-win32");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = InstallerConfig::for_architecture(Architecture::X64);
        config.files = vec!["psql.exe".to_string()];
        config.materialized().save_to(&path).unwrap();

        let loaded = InstallerConfig::load_from(&path).unwrap();
        assert_eq!(loaded.files, vec!["psql.exe".to_string()]);
        assert_eq!(
            loaded.relative_pattern.as_deref(),
            Some("postgresql-*-binaries-win64")
        );
    }

    #[test]
    fn test_invalid_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();

        let bad_pattern = dir.path().join("pattern.json");
        std::fs::write(&bad_pattern, r#"{ "relative_pattern": "no-wildcard" }"#).unwrap();
        assert!(matches!(
            InstallerConfig::load_from(&bad_pattern),
            Err(PgkitError::InvalidPattern { .. })
        ));

        let empty_list = dir.path().join("files.json");
        std::fs::write(&empty_list, r#"{ "files": [] }"#).unwrap();
        assert!(matches!(
            InstallerConfig::load_from(&empty_list),
            Err(PgkitError::Config { .. })
        ));

        let garbage = dir.path().join("garbage.json");
        std::fs::write(&garbage, "not json").unwrap();
        assert!(matches!(
            InstallerConfig::load_from(&garbage),
            Err(PgkitError::Config { .. })
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = InstallerConfig::load(Some(&dir.path().join("absent.json")));
        assert!(matches!(result, Err(PgkitError::Filesystem { .. })));
    }
}
