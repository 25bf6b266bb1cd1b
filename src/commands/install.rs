use crate::commands::{self, reporter::ConsoleReporter};
use crate::core::cancel::CancelToken;
use crate::core::config::InstallerConfig;
use crate::core::installer::Installer;
use crate::error::Result;
use std::path::Path;

pub fn install_binaries(
    config: InstallerConfig,
    cancel: CancelToken,
    log_file: Option<&Path>,
) -> Result<bool> {
    println!("Installing PostgreSQL client tools ({})", config.architecture);
    println!("Target directory: {}", config.target_dir.display());
    println!();

    let mut installer = Installer::new(config).with_cancel_token(cancel);
    installer.subscribe(ConsoleReporter::new());
    commands::attach_log_file(&mut installer, log_file)?;

    if !installer.install() {
        return Ok(false);
    }

    println!();
    println!("🎉 PostgreSQL client tools installed.");
    println!("   Open a new terminal for the updated PATH to take effect.");
    Ok(true)
}
