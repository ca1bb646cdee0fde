use anyhow::{Context, Result};
use tracing::debug;

use crate::{
    demand::PeriodContext,
    engine::{System, SystemContext},
    world::{EntityId, World},
};

/// Computes service demand for every region-sector in the current period.
pub struct DemandSystem;

impl DemandSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DemandSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for DemandSystem {
    fn name(&self) -> &str {
        "demand"
    }

    fn run(&mut self, ctx: &SystemContext, world: &mut World) -> Result<()> {
        let mut ids: Vec<EntityId> = world.regions.keys().cloned().collect();
        ids.sort();
        for id in ids {
            let region = match world.regions.get(&id) {
                Some(region) => region,
                None => continue,
            };
            let sectors = match world.sectors.get_mut(&id) {
                Some(sectors) => sectors,
                None => continue,
            };
            for sector in sectors.iter_mut() {
                sector.init_calc(ctx.period, region);
                let sector_name = sector.name().to_string();
                let period_ctx = PeriodContext {
                    period: ctx.period,
                    timestep: ctx.timestep,
                    region: &region.name,
                    sector: &sector_name,
                };
                let service = sector
                    .calc_period(&period_ctx, &region.gdp, &mut world.diagnostics)
                    .with_context(|| {
                        format!(
                            "demand for sector '{}' in region '{}' failed in period {}",
                            sector_name, region.name, ctx.period
                        )
                    })?;
                debug!(
                    region = %region.name,
                    sector = %sector_name,
                    period = ctx.period,
                    service,
                    "service demand"
                );
            }
        }
        Ok(())
    }
}
