use crate::commands::{self, reporter::ConsoleReporter};
use crate::core::cancel::CancelToken;
use crate::core::config::InstallerConfig;
use crate::core::installer::{InstallState, Installer};
use crate::error::Result;
use std::path::Path;

pub fn ensure_binaries(
    config: InstallerConfig,
    cancel: CancelToken,
    log_file: Option<&Path>,
) -> Result<bool> {
    let marker = config.marker_executable.clone();

    let mut installer = Installer::new(config).with_cancel_token(cancel);
    installer.subscribe(ConsoleReporter::new());
    commands::attach_log_file(&mut installer, log_file)?;

    let ok = installer.ensure_installed();
    if ok && installer.state() == InstallState::Idle {
        println!("✅ {marker} is already on the search path, nothing to do.");
    }
    Ok(ok)
}
