use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use sectordemand::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    snapshot::write_snapshot,
    systems::{BookkeepingSystem, DemandSystem},
    telemetry,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Sector service demand calibration and projection")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/two_region.yaml")]
    scenario: PathBuf,

    /// Number of periods to run (uses scenario default when omitted)
    #[arg(long)]
    periods: Option<usize>,

    /// Override snapshot interval in periods
    #[arg(long)]
    snapshot_interval: Option<u64>,

    /// Directory for snapshots
    #[arg(long)]
    snapshot_dir: Option<PathBuf>,

    /// Write the final period's snapshot to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(&cli.log)?;

    let loader = ScenarioLoader::new(".");
    let scenario = loader.load(&cli.scenario)?;
    let mut world = scenario.build_world()?;
    let periods = scenario.periods(cli.periods)?;
    let snapshot_interval = cli
        .snapshot_interval
        .unwrap_or(scenario.snapshot_interval_periods);
    let snapshot_dir = cli
        .snapshot_dir
        .unwrap_or_else(|| PathBuf::from("snapshots"));

    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        snapshot_interval_periods: snapshot_interval,
        snapshot_dir,
    };

    let mut engine = EngineBuilder::new(settings)
        .with_system(DemandSystem::new())
        .with_system(BookkeepingSystem::new())
        .build();

    let mut last = None;
    engine.run_with_hook(&mut world, periods, |snapshot| last = Some(snapshot))?;

    println!(
        "Scenario '{}' completed for {} periods.",
        scenario.name, periods
    );
    for totals in &world.bookkeeping().totals {
        let line = totals
            .regions
            .iter()
            .map(|r| format!("{} {:>12.3}", r.region, r.service))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{:>6}  {}", totals.year, line);
    }
    let warnings = world
        .diagnostics()
        .count_at(sectordemand::demand::DiagnosticLevel::Warning);
    if warnings > 0 {
        println!("{warnings} calibration warning(s); see log output.");
    }

    if let (Some(path), Some(snapshot)) = (cli.report, last) {
        write_snapshot(&path, &snapshot)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report written to {}", path.display());
    }
    Ok(())
}
