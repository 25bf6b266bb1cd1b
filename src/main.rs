use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use pgkit::commands::{self, Overrides};
use pgkit::core::cancel::CancelToken;
use pgkit::core::config::Architecture;
use pgkit::utils::search_path::PathScope;

#[derive(Parser)]
#[clap(name = "pgkit")]
#[clap(about = "Installs the PostgreSQL client tools on Windows")]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (default: the user config file, if present)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// Print debug diagnostics to stderr
    #[clap(short, long, global = true)]
    verbose: bool,

    /// Directory the client tools are installed into
    #[clap(long, global = true)]
    target: Option<PathBuf>,

    /// Archive flavour to install: x64 or x86
    #[clap(long, global = true)]
    arch: Option<Architecture>,

    /// Search path to register in: user or machine
    #[clap(long, global = true)]
    scope: Option<PathScope>,

    /// Vendor page listing the binary archives
    #[clap(long, global = true)]
    page_url: Option<String>,

    /// Also write install and ensure progress lines to this file
    #[clap(long, global = true)]
    log_file: Option<PathBuf>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the newest client tools and register them on PATH
    Install,
    /// Install only if the marker executable is not already on PATH
    Ensure,
    /// Show the newest download link without downloading
    Resolve,
    /// Check the installation and PATH setup
    Doctor,
    /// Print the effective configuration
    Config {
        /// Also write it to the configuration file
        #[clap(long)]
        save: bool,
    },
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let overrides = Overrides {
        target: cli.target,
        architecture: cli.arch,
        scope: cli.scope,
        page_url: cli.page_url,
    };
    let config = commands::load_config(cli.config.as_deref(), &overrides)
        .map_err(|e| anyhow::anyhow!(e))?;

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || on_interrupt.cancel()) {
        tracing::warn!("Ctrl+C handler not installed: {e}");
    }

    let succeeded = match cli.command {
        Commands::Install => {
            commands::install::install_binaries(config, cancel, cli.log_file.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?
        }
        Commands::Ensure => {
            commands::ensure::ensure_binaries(config, cancel, cli.log_file.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?
        }
        Commands::Resolve => {
            commands::resolve::show_latest(&config).map_err(|e| anyhow::anyhow!(e))?
        }
        Commands::Doctor => {
            commands::doctor::check_environment(&config).map_err(|e| anyhow::anyhow!(e))?
        }
        Commands::Config { save } => {
            let save_to = if save {
                Some(commands::config::save_path(cli.config.as_deref())?)
            } else {
                None
            };
            commands::config::show_config(&config, save_to.as_deref())
                .map_err(|e| anyhow::anyhow!(e))?;
            true
        }
    };

    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}
