//! Lifecycle notifications raised while an install runs.
//!
//! Events are delivered synchronously on the installing thread, interleaved with
//! the I/O that triggers them. An observer runs inline and stalls the transfer
//! while it works, so observers should return quickly.

use crate::utils::search_path::PathScope;
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallEvent {
    LinkFound {
        url: String,
        version: String,
    },
    DownloadStarted {
        url: String,
        /// From `Content-Length`; `None` suppresses percentage reporting.
        total: Option<u64>,
    },
    /// Strictly increasing, at most once per integer percentage.
    DownloadProgress {
        percent: u8,
    },
    /// Raised instead of `DownloadProgress` when the total size is unknown.
    DownloadHeartbeat {
        transferred: u64,
    },
    DownloadCompleted {
        transferred: u64,
    },
    ExtractingFile {
        name: String,
    },
    FileExtracted {
        name: String,
        bytes: u64,
    },
    PathRegistered {
        directory: PathBuf,
        scope: PathScope,
        /// False when the directory was already present.
        added: bool,
    },
    Failed {
        message: String,
    },
}

impl fmt::Display for InstallEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallEvent::LinkFound { url, version } => {
                write!(f, "Link found: {url} (version {version})")
            }
            InstallEvent::DownloadStarted { url, total } => match total {
                Some(total) => write!(f, "Download started: {url} ({})", format_bytes(*total)),
                None => write!(f, "Download started: {url} (size unknown)"),
            },
            InstallEvent::DownloadProgress { percent } => {
                write!(f, "Download progress: {percent}%")
            }
            InstallEvent::DownloadHeartbeat { transferred } => {
                write!(f, "Downloaded {}", format_bytes(*transferred))
            }
            InstallEvent::DownloadCompleted { transferred } => {
                write!(f, "Download completed ({})", format_bytes(*transferred))
            }
            InstallEvent::ExtractingFile { name } => write!(f, "Extracting {name}..."),
            InstallEvent::FileExtracted { name, bytes } => {
                write!(f, "Extracted {name} ({})", format_bytes(*bytes))
            }
            InstallEvent::PathRegistered {
                directory,
                scope,
                added,
            } => {
                if *added {
                    write!(f, "Added {} to the {scope} search path", directory.display())
                } else {
                    write!(
                        f,
                        "{} is already on the {scope} search path",
                        directory.display()
                    )
                }
            }
            InstallEvent::Failed { message } => f.write_str(message),
        }
    }
}

pub trait InstallObserver {
    fn notify(&self, event: &InstallEvent);
}

impl<F> InstallObserver for F
where
    F: Fn(&InstallEvent),
{
    fn notify(&self, event: &InstallEvent) {
        self(event)
    }
}

/// Fans every event out to its subscribers, in subscription order.
#[derive(Default)]
pub struct EventBus {
    observers: Vec<Box<dyn InstallObserver>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: impl InstallObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl InstallObserver for EventBus {
    fn notify(&self, event: &InstallEvent) {
        tracing::debug!(target: "pgkit::events", "{event}");
        for observer in &self.observers {
            observer.notify(event);
        }
    }
}

/// Mirrors each event as one line of text to a writer.
pub struct DiagnosticSink<W: Write> {
    writer: RefCell<W>,
}

impl<W: Write> DiagnosticSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> InstallObserver for DiagnosticSink<W> {
    fn notify(&self, event: &InstallEvent) {
        let mut writer = self.writer.borrow_mut();
        if let Err(e) = writeln!(writer, "{event}").and_then(|_| writer.flush()) {
            tracing::warn!("Diagnostic sink write failed: {e}");
        }
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}
