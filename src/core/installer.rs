//! The install pipeline: ensure the target directory, resolve the newest
//! archive, stream it through the extractor, then put the target on the
//! search path.
//!
//! The target directory is registered only after extraction has finished
//! without error.

use crate::core::cancel::CancelToken;
use crate::core::config::InstallerConfig;
use crate::core::download::Downloader;
use crate::core::events::{EventBus, InstallEvent, InstallObserver};
use crate::core::extract::ArchiveExtractor;
use crate::core::http::{HttpTransport, ReqwestTransport};
use crate::core::resolver::LinkResolver;
use crate::error::Result;
use crate::utils::fs;
use crate::utils::search_path::{self, PathScope, ProcessPathStore, SearchPathStore};
use std::cell::Cell;
use std::path::PathBuf;

/// Message reported for network failures and for pages without a matching link.
pub const DOWNLOAD_ERROR_MESSAGE: &str = "Download error.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Idle,
    DirectoryEnsured,
    LinkResolved,
    Downloading,
    Extracting,
    PathRegistered,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: String,
    pub url: String,
    pub target_dir: PathBuf,
    pub files: Vec<PathBuf>,
    pub downloaded_bytes: u64,
    pub scope: PathScope,
    /// False when the target directory was already on the search path.
    pub path_added: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed(InstallReport),
    /// The page carried no link matching the configured pattern.
    NothingToInstall,
}

/// Forwards events to the bus and moves the state to `Extracting` when the
/// first selected entry comes off the stream.
struct StageTracker<'a> {
    events: &'a EventBus,
    state: &'a Cell<InstallState>,
}

impl InstallObserver for StageTracker<'_> {
    fn notify(&self, event: &InstallEvent) {
        if matches!(event, InstallEvent::ExtractingFile { .. })
            && self.state.get() == InstallState::Downloading
        {
            self.state.set(InstallState::Extracting);
        }
        self.events.notify(event);
    }
}

pub struct Installer {
    config: InstallerConfig,
    transport: Option<Box<dyn HttpTransport>>,
    search_path: Option<Box<dyn SearchPathStore>>,
    process_path: Box<dyn SearchPathStore>,
    events: EventBus,
    cancel: CancelToken,
    state: Cell<InstallState>,
    failed_in: Option<InstallState>,
}

impl Installer {
    pub fn new(config: InstallerConfig) -> Self {
        Self {
            config,
            transport: None,
            search_path: None,
            process_path: Box::new(ProcessPathStore::new(PathScope::User)),
            events: EventBus::new(),
            cancel: CancelToken::new(),
            state: Cell::new(InstallState::Idle),
            failed_in: None,
        }
    }

    /// Use `transport` instead of the default `reqwest` client.
    pub fn with_transport(mut self, transport: impl HttpTransport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Register into `store` instead of the platform store for the configured scope.
    pub fn with_search_path(mut self, store: impl SearchPathStore + 'static) -> Self {
        self.search_path = Some(Box::new(store));
        self
    }

    /// Resolve executables from `store` instead of this process's `PATH`.
    pub fn with_process_path(mut self, store: impl SearchPathStore + 'static) -> Self {
        self.process_path = Box::new(store);
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn subscribe(&mut self, observer: impl InstallObserver + 'static) {
        self.events.subscribe(observer);
    }

    pub fn config(&self) -> &InstallerConfig {
        &self.config
    }

    pub fn state(&self) -> InstallState {
        self.state.get()
    }

    /// The stage the last run stopped in, if it did not finish.
    pub fn failed_in(&self) -> Option<InstallState> {
        self.failed_in
    }

    /// The store registration goes to, once one has been chosen.
    pub fn search_path(&self) -> Option<&dyn SearchPathStore> {
        self.search_path.as_deref()
    }

    /// Run the pipeline and report success as a flag.
    ///
    /// Every failure is reported through a `Failed` event before returning false.
    pub fn install(&mut self) -> bool {
        let message = match self.run() {
            Ok(InstallOutcome::Installed(_)) => return true,
            Ok(InstallOutcome::NothingToInstall) => DOWNLOAD_ERROR_MESSAGE.to_string(),
            Err(e) if e.is_download_failure() => DOWNLOAD_ERROR_MESSAGE.to_string(),
            Err(e) => format!("Installation failed: {e}"),
        };

        self.events.notify(&InstallEvent::Failed { message });
        false
    }

    /// Succeed without work when the marker executable is already on the search
    /// path, install otherwise.
    pub fn ensure_installed(&mut self) -> bool {
        let marker = self.config.marker_executable.clone();

        match self.locate_marker(&marker) {
            Ok(Some(found)) => {
                tracing::info!("{marker} already available at {}", found.display());
                true
            }
            Ok(None) => {
                tracing::info!("{marker} not found on the search path, installing");
                self.install()
            }
            Err(e) => {
                tracing::warn!("Could not search for {marker}: {e}");
                self.install()
            }
        }
    }

    /// The process's own search path first, then the registration store, which
    /// may hold an entry added after this process started.
    fn locate_marker(&mut self, marker: &str) -> Result<Option<PathBuf>> {
        if let Some(found) = search_path::locate_executable(self.process_path.as_ref(), marker)? {
            return Ok(Some(found));
        }
        search_path::locate_executable(self.store(), marker)
    }

    /// The pipeline with typed errors. Never retries.
    pub fn run(&mut self) -> Result<InstallOutcome> {
        self.failed_in = None;
        let result = self.execute();

        match &result {
            Ok(InstallOutcome::Installed(_)) => {}
            Ok(InstallOutcome::NothingToInstall) => {
                self.failed_in = Some(self.state.get());
                self.state.set(InstallState::Failed);
            }
            Err(e) => {
                tracing::warn!("Install failed in state {:?}: {e}", self.state.get());
                self.failed_in = Some(self.state.get());
                self.state.set(InstallState::Failed);
            }
        }
        result
    }

    fn execute(&mut self) -> Result<InstallOutcome> {
        self.state.set(InstallState::Idle);

        let patterns = self.config.link_patterns()?;
        let filter = self.config.file_filter();
        let target_dir = self.config.target_dir.clone();

        fs::ensure_dir_exists(&target_dir)?;
        self.state.set(InstallState::DirectoryEnsured);

        let default_transport;
        let transport: &dyn HttpTransport = match &self.transport {
            Some(transport) => transport.as_ref(),
            None => {
                default_transport =
                    ReqwestTransport::new(&self.config.user_agent, self.config.connect_timeout())?;
                &default_transport
            }
        };
        let tracker = StageTracker {
            events: &self.events,
            state: &self.state,
        };
        let observer: &dyn InstallObserver = &tracker;

        let Some(link) = LinkResolver::new(transport).resolve(&self.config.page_url, &patterns)?
        else {
            return Ok(InstallOutcome::NothingToInstall);
        };
        self.state.set(InstallState::LinkResolved);
        observer.notify(&InstallEvent::LinkFound {
            url: link.url.clone(),
            version: link.version.clone(),
        });

        let downloader = Downloader::new(transport, observer, self.cancel.clone());
        let mut stream = downloader.open(&link.url)?;
        self.state.set(InstallState::Downloading);

        let extractor = ArchiveExtractor::new(&filter, observer, self.cancel.clone());
        let files = extractor.extract(&mut stream, &target_dir)?;
        let downloaded_bytes = stream.close()?;

        let store = self.store();
        let scope = store.scope();
        let path_added = search_path::register_directory(store, &target_dir)?;
        self.state.set(InstallState::PathRegistered);

        self.events.notify(&InstallEvent::PathRegistered {
            directory: target_dir.clone(),
            scope,
            added: path_added,
        });

        Ok(InstallOutcome::Installed(InstallReport {
            version: link.version,
            url: link.url,
            target_dir,
            files,
            downloaded_bytes,
            scope,
            path_added,
        }))
    }

    /// The configured store, or the platform store for the configured scope.
    fn store(&mut self) -> &mut dyn SearchPathStore {
        let scope = self.config.scope.unwrap_or_else(search_path::detect_scope);
        &mut **self
            .search_path
            .get_or_insert_with(|| search_path::system_store(scope))
    }
}
