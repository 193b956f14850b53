//! Locations command - list stops or showplaces by id.

use clap::ValueEnum;
use cruisemap::MapMode;

use super::common::location_line;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Location kind selection for CLI arguments.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq)]
pub enum LocationKindArg {
    /// Ports of call
    Stops,
    /// Showplaces along the rivers
    Places,
}

/// Arguments for the locations command.
pub struct LocationsArgs {
    pub kind: LocationKindArg,
    pub ids: Vec<String>,
}

impl LocationsArgs {
    fn mode(&self) -> MapMode {
        match (self.kind, self.ids.as_slice()) {
            (LocationKindArg::Stops, [id]) => MapMode::SingleStop(id.clone()),
            (LocationKindArg::Stops, ids) => MapMode::Stops(ids.to_vec()),
            (LocationKindArg::Places, [id]) => MapMode::SinglePlace(id.clone()),
            (LocationKindArg::Places, ids) => MapMode::Places(ids.to_vec()),
        }
    }
}

/// Run the locations command.
pub fn run(runner: &CliRunner, args: LocationsArgs) -> Result<(), CliError> {
    runner.log_startup("locations");

    let engine = runner.engine()?;
    runner.block_on(engine.start(args.mode()));

    let locations = match args.kind {
        LocationKindArg::Stops => engine.all_stops(),
        LocationKindArg::Places => engine.all_sights(),
    };
    for location in &locations {
        println!("{}", location_line(location));
    }

    engine.shutdown();
    if locations.is_empty() {
        return Err(CliError::NotFound {
            kind: "Location",
            id: args.ids.join(","),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_selection() {
        let one = LocationsArgs {
            kind: LocationKindArg::Stops,
            ids: vec!["1".into()],
        };
        assert_eq!(one.mode(), MapMode::SingleStop("1".into()));

        let many = LocationsArgs {
            kind: LocationKindArg::Places,
            ids: vec!["1".into(), "2".into()],
        };
        assert_eq!(many.mode(), MapMode::Places(vec!["1".into(), "2".into()]));
    }
}
