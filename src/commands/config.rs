use crate::core::config::{default_config_path, InstallerConfig};
use crate::error::{PgkitError, Result};
use std::path::Path;

/// Print the effective configuration, and write it to `save_to` when given.
pub fn show_config(config: &InstallerConfig, save_to: Option<&Path>) -> Result<()> {
    let effective = config.materialized();
    println!("{}", serde_json::to_string_pretty(&effective)?);

    if let Some(path) = save_to {
        effective.save_to(path)?;
        println!();
        println!("✅ Saved to {}", path.display());
    }
    Ok(())
}

/// Where `config --save` writes when no `--config` file was given.
pub fn save_path(explicit: Option<&Path>) -> Result<std::path::PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path()
            .ok_or_else(|| PgkitError::config_error("no user configuration directory")),
    }
}
