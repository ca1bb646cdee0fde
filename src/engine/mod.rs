use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::{
    snapshot::SnapshotWriter,
    world::{World, WorldSnapshot},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub snapshot_interval_periods: u64,
    pub snapshot_dir: PathBuf,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        Engine {
            systems: self.systems,
            snapshot_writer: SnapshotWriter::new(
                &self.settings.snapshot_dir,
                self.settings.snapshot_interval_periods,
            ),
            settings: self.settings,
        }
    }
}

pub struct Engine {
    systems: Vec<Box<dyn System>>,
    snapshot_writer: SnapshotWriter,
    settings: EngineSettings,
}

impl Engine {
    pub fn run(&mut self, world: &mut World, periods: usize) -> Result<()> {
        self.run_with_hook(world, periods, |_| {})
    }

    /// Steps `periods` model periods, handing each period's snapshot to `hook`.
    pub fn run_with_hook<F>(&mut self, world: &mut World, periods: usize, mut hook: F) -> Result<()>
    where
        F: FnMut(WorldSnapshot),
    {
        let remaining = world.remaining_periods();
        if periods > remaining {
            bail!(
                "requested {periods} periods but only {remaining} remain in the model horizon"
            );
        }

        for _ in 0..periods {
            let period = world.period();
            let ctx = SystemContext {
                period,
                year: world.modeltime().period_to_year(period)?,
                timestep: world.modeltime().timestep(period)?,
                scenario_name: &self.settings.scenario_name,
            };
            info!(period, year = ctx.year, "computing period");
            for system in &mut self.systems {
                let name = system.name().to_string();
                system
                    .run(&ctx, world)
                    .with_context(|| format!("system '{name}' failed in period {period}"))?;
                debug!(system = %name, period, "system finished");
            }

            let snapshot = world.snapshot(&self.settings.scenario_name, period)?;
            if let Some(path) = self.snapshot_writer.maybe_write(&snapshot)? {
                debug!(path = %path.display(), "snapshot written");
            }
            hook(snapshot);
            world.advance_period();
        }
        Ok(())
    }
}

pub struct SystemContext<'a> {
    pub period: usize,
    pub year: i32,
    /// Years covered by the period.
    pub timestep: f64,
    pub scenario_name: &'a str,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()>;
}
