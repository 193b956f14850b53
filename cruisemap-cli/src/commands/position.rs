//! Position command - where a cruise or ship is at a given time.
//!
//! Cruises and ships are looked up in the fleet listing and their route is
//! loaded progressively up to `--stages`. With `--single` a cruise is started
//! in single-cruise mode instead, which delivers the complete route at once.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::Args;
use cruisemap::loader::COMPLETE_STAGE;
use cruisemap::model::Cruise;
use cruisemap::{CruiseEngine, LoadPriority, MapMode};
use tracing::debug;

use super::common::{cruise_line, format_time, position_line};
use crate::error::CliError;
use crate::runner::{parse_date_arg, CliRunner};

/// Arguments for the position command.
#[derive(Debug, Args)]
pub struct PositionArgs {
    /// Cruise id
    #[arg(long, conflicts_with = "ship", required_unless_present = "ship")]
    pub cruise: Option<String>,

    /// Ship id
    #[arg(long)]
    pub ship: Option<String>,

    /// Point in time (defaults to now)
    #[arg(long)]
    pub at: Option<String>,

    /// Load the cruise on its own, with its complete route
    #[arg(long, requires = "cruise", conflicts_with = "ship")]
    pub single: bool,

    /// Route detail to load, 1 (coarse) to 4 (complete)
    #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(u8).range(1..=4))]
    pub stages: u8,
}

/// Run the position command.
pub fn run(runner: &CliRunner, args: PositionArgs) -> Result<(), CliError> {
    runner.log_startup("position");
    let at = match &args.at {
        Some(at) => parse_date_arg(at)?,
        None => Utc::now(),
    };

    let engine = runner.engine()?;
    let result = runner.block_on(async {
        match (&args.cruise, &args.ship) {
            (Some(id), _) if args.single => show_single_cruise(&engine, id, at).await,
            (Some(id), _) => show_cruise(&engine, id, at, args.stages).await,
            (None, Some(id)) => show_ship(&engine, id, at, args.stages).await,
            (None, None) => Err(CliError::Config("Either --cruise or --ship is required".to_string())),
        }
    });
    engine.shutdown();
    result
}

async fn show_single_cruise(engine: &CruiseEngine, id: &str, at: DateTime<Utc>) -> Result<(), CliError> {
    engine.start(MapMode::Cruise(id.to_string())).await;
    let cruise = find_cruise(engine, id)?;
    print_position(&cruise, at).await;
    print_locations(&cruise).await;
    Ok(())
}

async fn show_cruise(engine: &CruiseEngine, id: &str, at: DateTime<Utc>, stages: u8) -> Result<(), CliError> {
    engine.start(MapMode::Fleet).await;
    let cruise = find_cruise(engine, id)?;
    load_stages(&cruise, stages).await;
    print_position(&cruise, at).await;
    print_locations(&cruise).await;
    Ok(())
}

fn find_cruise(engine: &CruiseEngine, id: &str) -> Result<Arc<Cruise>, CliError> {
    engine.cruise(id).ok_or_else(|| CliError::NotFound {
        kind: "Cruise",
        id: id.to_string(),
    })
}

async fn print_locations(cruise: &Cruise) {
    let stops = cruise.stops().await;
    if !stops.is_empty() {
        println!();
        println!("Stops:");
        for stop in &stops {
            println!("  {}  {}", format_time(stop.arrival), stop.location.name);
        }
    }
    let gateways = cruise.gateways().await;
    if !gateways.is_empty() {
        println!();
        println!("Gateways:");
        for gateway in &gateways {
            println!("  {}  {}", format_time(gateway.arrival), gateway.location.name);
        }
    }
}

async fn show_ship(engine: &CruiseEngine, id: &str, at: DateTime<Utc>, stages: u8) -> Result<(), CliError> {
    engine.start(MapMode::Fleet).await;
    let ship = engine.ship(id).ok_or_else(|| CliError::NotFound {
        kind: "Ship",
        id: id.to_string(),
    })?;

    let Some(cruise) = engine.cruise_on(id, at) else {
        println!("{} is not sailing on {}", ship.name, format_time(at));
        return Ok(());
    };

    load_stages(&cruise, stages).await;
    print_position(&cruise, at).await;
    Ok(())
}

/// Loads route stages until `target` is reached or loading stalls.
async fn load_stages(cruise: &Cruise, target: u8) {
    cruise.route().await;
    while cruise.route_ready_stage() < target.min(COMPLETE_STAGE) {
        let before = cruise.route_ready_stage();
        cruise.load_track_progressive(LoadPriority::High).await;
        if cruise.route_ready_stage() == before {
            debug!(cruise_id = %cruise.id, stage = before, "Route loading stalled");
            break;
        }
    }
    cruise.cancel_load_track();
}

async fn print_position(cruise: &Cruise, at: DateTime<Utc>) {
    println!("{}", cruise_line(cruise));
    println!("  route stage {} of {}", cruise.route_ready_stage(), COMPLETE_STAGE);
    if cruise.is_in_progress_at(at) {
        println!("  position: {}", position_line(&cruise.position_at(at).await));
    } else {
        println!("  not in progress on {}", format_time(at));
    }
}
