//! Configuration CLI commands.

use clap::Subcommand;
use cruisemap::config::{config_path, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the configuration file path
    Path,

    /// Print the effective configuration as INI
    Show,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Path => run_path(),
        ConfigCommands::Show => run_show(),
    }
}

fn run_path() -> Result<(), CliError> {
    let path = config_path().ok_or_else(|| {
        CliError::Config("Could not determine the platform config directory".to_string())
    })?;
    println!("{}", path.display());
    Ok(())
}

fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load()?;
    print!("{}", ConfigFile::to_string(&config));
    Ok(())
}
