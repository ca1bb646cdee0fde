use anyhow::Result;
use tracing::info;

use crate::{
    engine::{System, SystemContext},
    world::{PeriodTotals, RegionTotal, World},
};

/// Records per-region service totals once demand has run.
pub struct BookkeepingSystem;

impl BookkeepingSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BookkeepingSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for BookkeepingSystem {
    fn name(&self) -> &str {
        "bookkeeping"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        let regions: Vec<RegionTotal> = world
            .entity_ids()
            .into_iter()
            .filter_map(|id| {
                let region = world.region(id)?;
                Some(RegionTotal {
                    region: region.name.clone(),
                    service: world.region_service(id, ctx.period),
                })
            })
            .collect();
        let total: f64 = regions.iter().map(|r| r.service).sum();
        info!(
            scenario = ctx.scenario_name,
            year = ctx.year,
            total,
            "period service demand"
        );
        world.bookkeeping.totals.push(PeriodTotals {
            period: ctx.period,
            year: ctx.year,
            regions,
        });
        Ok(())
    }
}
