use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PgkitError>;

#[derive(Error, Debug)]
pub enum PgkitError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Transfer failed: {message}")]
    Transfer { message: String },

    #[error("Archive error: {message}")]
    Archive { message: String },

    #[error("Filesystem error at {path}: {message}")]
    Filesystem { path: PathBuf, message: String },

    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Search path error: {message}")]
    SearchPath { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Procedure '{procedure}' failed: {message}")]
    Procedure { procedure: String, message: String },

    #[error("Procedure '{procedure}' returned no rows")]
    NoRows { procedure: String },

    #[error("Value conversion error: {message}")]
    Conversion { message: String },
}

impl PgkitError {
    pub fn network<U: Into<String>, M: Into<String>>(url: U, message: M) -> Self {
        PgkitError::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn transfer<S: Into<String>>(message: S) -> Self {
        PgkitError::Transfer {
            message: message.into(),
        }
    }

    pub fn archive<S: Into<String>>(message: S) -> Self {
        PgkitError::Archive {
            message: message.into(),
        }
    }

    pub fn config_error<S: Into<String>>(message: S) -> Self {
        PgkitError::Config {
            message: message.into(),
        }
    }

    pub fn search_path<S: Into<String>>(message: S) -> Self {
        PgkitError::SearchPath {
            message: message.into(),
        }
    }

    pub fn conversion<S: Into<String>>(message: S) -> Self {
        PgkitError::Conversion {
            message: message.into(),
        }
    }

    /// Maps a filesystem `io::Error` on `path`, keeping permission problems distinct.
    pub fn filesystem(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        let path = path.into();
        match error.kind() {
            std::io::ErrorKind::PermissionDenied => PgkitError::PermissionDenied { path },
            _ => PgkitError::Filesystem {
                path,
                message: error.to_string(),
            },
        }
    }

    /// True for the failures reported to the user as a download problem.
    pub fn is_download_failure(&self) -> bool {
        matches!(
            self,
            PgkitError::Network { .. } | PgkitError::Transfer { .. } | PgkitError::Http(_)
        )
    }
}
