//! CruiseMap CLI - cruise positions and routes from the command line
//!
//! Every command builds a [`cruisemap::CruiseEngine`] from the config file,
//! starts it in the map mode the command needs and prints what it found.

mod commands;
mod error;
mod runner;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::cruises::CruisesArgs;
use commands::locations::{LocationKindArg, LocationsArgs};
use commands::position::PositionArgs;
use error::CliError;
use runner::{CliRunner, GlobalArgs};

#[derive(Debug, Parser)]
#[command(name = "cruisemap", version, about = "Cruise ship positions and routes")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List cruises, optionally filtered
    Cruises(CruisesArgs),

    /// Show where a cruise or ship is at a given time
    Position(PositionArgs),

    /// List stops or showplaces by id
    Locations {
        /// Location kind
        #[arg(value_enum)]
        kind: LocationKindArg,

        /// Location ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Config { action } => commands::config::run(action),
        Commands::Cruises(args) => with_runner(&cli.global, |r| commands::cruises::run(r, args)),
        Commands::Position(args) => with_runner(&cli.global, |r| commands::position::run(r, args)),
        Commands::Locations { kind, ids } => with_runner(&cli.global, |r| {
            commands::locations::run(r, LocationsArgs { kind, ids })
        }),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn with_runner<F>(global: &GlobalArgs, command: F) -> Result<(), CliError>
where
    F: FnOnce(&CliRunner) -> Result<(), CliError>,
{
    let runner = CliRunner::new(global)?;
    command(&runner)
}
