//! Cruises command - list the fleet's cruises.

use clap::Args;
use cruisemap::{FilterUpdate, MapMode};

use super::common::{cruise_line, format_time};
use crate::error::CliError;
use crate::runner::{parse_date_arg, CliRunner};

/// Arguments for the cruises command.
#[derive(Debug, Args)]
pub struct CruisesArgs {
    /// Company name fragment (case-insensitive)
    #[arg(long)]
    pub company: Option<String>,

    /// Ship name fragment (case-insensitive)
    #[arg(long)]
    pub ship: Option<String>,

    /// Only cruises departing on or after this date
    #[arg(long)]
    pub from: Option<String>,

    /// Only cruises arriving on or before this date
    #[arg(long)]
    pub to: Option<String>,

    /// Print at most this many cruises
    #[arg(long)]
    pub limit: Option<usize>,
}

impl CruisesArgs {
    fn filter(&self) -> Result<FilterUpdate, CliError> {
        let mut update = FilterUpdate::new();
        if let Some(company) = &self.company {
            update = update.company_name(company.as_str());
        }
        if let Some(ship) = &self.ship {
            update = update.ship_name(ship.as_str());
        }
        if let Some(from) = &self.from {
            update = update.start_date(Some(parse_date_arg(from)?));
        }
        if let Some(to) = &self.to {
            update = update.end_date(Some(parse_date_arg(to)?));
        }
        Ok(update)
    }
}

/// Run the cruises command.
pub fn run(runner: &CliRunner, args: CruisesArgs) -> Result<(), CliError> {
    runner.log_startup("cruises");
    let filter = args.filter()?;

    let engine = runner.engine()?;
    runner.block_on(engine.start(MapMode::Fleet));
    engine.set_filter(filter);

    let cruises = engine.all_cruises();
    let limit = args.limit.unwrap_or(cruises.len());
    for cruise in cruises.iter().take(limit) {
        println!("{}", cruise_line(cruise));
    }

    println!();
    println!(
        "{} cruises, {} ships, {} companies",
        cruises.len(),
        engine.all_ships().len(),
        engine.all_companies().len()
    );
    if let (Some(start), Some(end)) = (engine.navigation_start_date(), engine.navigation_end_date()) {
        println!("Navigation: {} - {}", format_time(start), format_time(end));
    }

    engine.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> CruisesArgs {
        CruisesArgs {
            company: None,
            ship: None,
            from: None,
            to: None,
            limit: None,
        }
    }

    #[test]
    fn test_no_options_is_empty_filter() {
        assert!(args().filter().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        let args = CruisesArgs {
            from: Some("someday".into()),
            ..args()
        };
        assert!(matches!(args.filter(), Err(CliError::InvalidDate(_))));
    }

    #[test]
    fn test_options_build_filter() {
        let args = CruisesArgs {
            company: Some("Vodohod".into()),
            to: Some("2024-06-30".into()),
            ..args()
        };
        assert!(!args.filter().unwrap().is_empty());
    }
}
