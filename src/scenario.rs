use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, ensure, Context, Result};
use serde::Deserialize;

use crate::{
    demand::{BuildingDemand, DemandStrategy, Elasticities, ServiceDemand, TransportDemand},
    drivers::{PriceHistory, RegionGdp},
    modeltime::Modeltime,
    sector::{DemandSector, Subsector},
    world::{RegionComponent, World},
};

fn default_scaled() -> bool {
    true
}

fn default_share_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub modeltime: ModeltimeConfig,
    #[serde(default)]
    pub periods: Option<usize>,
    #[serde(default)]
    pub snapshot_interval_periods: u64,
    pub regions: Vec<ScenarioRegion>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeltimeConfig {
    pub years: Vec<i32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioRegion {
    pub name: String,
    pub gdp: Vec<f64>,
    pub population: Vec<f64>,
    /// Normalise GDP and GDP per capita to the first period.
    #[serde(default = "default_scaled")]
    pub scaled: bool,
    #[serde(default)]
    pub heating_degree_days: f64,
    #[serde(default)]
    pub cooling_degree_days: f64,
    #[serde(default)]
    pub sectors: Vec<ScenarioSector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectorKind {
    Building,
    Transport,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSector {
    pub name: String,
    pub kind: SectorKind,
    #[serde(default)]
    pub per_capita_based: bool,
    pub price_elasticity: Vec<f64>,
    pub income_elasticity: Vec<f64>,
    #[serde(default)]
    pub prices: Vec<f64>,
    /// Observed service by period; `~` or a negative value leaves a period uncalibrated.
    #[serde(default)]
    pub base_service: Vec<Option<f64>>,
    #[serde(default)]
    pub percent_licensed: Vec<f64>,
    #[serde(default)]
    pub aeei: Vec<f64>,
    #[serde(default)]
    pub subsectors: Vec<ScenarioSubsector>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioSubsector {
    pub name: String,
    #[serde(default = "default_share_weight")]
    pub share_weight: f64,
    #[serde(default)]
    pub calibrated_output: Vec<Option<f64>>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(data: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(data).context("invalid scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn modeltime(&self) -> Result<Modeltime> {
        Modeltime::new(self.modeltime.years.clone()).map_err(|msg| anyhow!(msg))
    }

    /// Configuration checks the demand calculation relies on.
    pub fn validate(&self) -> Result<()> {
        let max_periods = self.modeltime()?.max_periods();
        ensure!(!self.regions.is_empty(), "scenario must define at least one region");
        if let Some(periods) = self.periods {
            ensure!(
                periods <= max_periods,
                "scenario runs {periods} periods but modeltime only has {max_periods}"
            );
        }

        let mut region_names = HashSet::new();
        for region in &self.regions {
            ensure!(
                region_names.insert(region.name.as_str()),
                "region '{}' defined more than once",
                region.name
            );
            ensure!(
                region.gdp.len() >= max_periods && region.population.len() >= max_periods,
                "region '{}' needs gdp and population for all {max_periods} periods",
                region.name
            );
            let mut sector_names = HashSet::new();
            for sector in &region.sectors {
                ensure!(
                    sector_names.insert(sector.name.as_str()),
                    "sector '{}' defined more than once in region '{}'",
                    sector.name,
                    region.name
                );
                sector.validate(max_periods).with_context(|| {
                    format!("sector '{}' in region '{}'", sector.name, region.name)
                })?;
            }
        }
        Ok(())
    }

    pub fn build_world(&self) -> Result<World> {
        let modeltime = self.modeltime()?;
        let max_periods = modeltime.max_periods();
        let mut world = World::new(modeltime);
        for region in &self.regions {
            let gdp = if region.scaled {
                RegionGdp::new(region.gdp.clone(), region.population.clone())
            } else {
                RegionGdp::prescaled(region.gdp.clone(), region.population.clone())
            };
            let sectors = region
                .sectors
                .iter()
                .map(|sector| sector.build(&region.name, max_periods))
                .collect::<Result<Vec<_>>>()?;
            let component = RegionComponent {
                name: region.name.clone(),
                gdp,
                heating_degree_days: region.heating_degree_days,
                cooling_degree_days: region.cooling_degree_days,
            };
            world.spawn_region(component, sectors);
        }
        Ok(world)
    }

    pub fn periods(&self, override_periods: Option<usize>) -> Result<usize> {
        let max_periods = self.modeltime()?.max_periods();
        Ok(override_periods.or(self.periods).unwrap_or(max_periods))
    }
}

impl ScenarioSector {
    fn validate(&self, max_periods: usize) -> Result<()> {
        ensure!(
            !self.price_elasticity.is_empty() && !self.income_elasticity.is_empty(),
            "price and income elasticities are required"
        );
        for (label, len) in [
            ("price_elasticity", self.price_elasticity.len()),
            ("income_elasticity", self.income_elasticity.len()),
            ("prices", self.prices.len()),
            ("base_service", self.base_service.len()),
            ("percent_licensed", self.percent_licensed.len()),
            ("aeei", self.aeei.len()),
        ] {
            ensure!(
                len <= max_periods,
                "{label} has {len} values but modeltime only has {max_periods} periods"
            );
        }
        if let Some(share) = self
            .percent_licensed
            .iter()
            .find(|share| !(0.0..=1.0).contains(*share))
        {
            bail!("percent_licensed value {share} is outside [0, 1]");
        }

        match self.kind {
            SectorKind::Building => {
                ensure!(
                    self.percent_licensed.is_empty() && self.aeei.is_empty(),
                    "percent_licensed and aeei only apply to transport sectors"
                );
            }
            SectorKind::Transport => {
                let window = max_periods.min(2);
                for period in 0..window {
                    let observed = self.base_service.get(period).copied().flatten();
                    ensure!(
                        observed.map_or(false, |value| value >= 0.0),
                        "transport base service is required for base period {period}"
                    );
                }
            }
        }

        for subsector in &self.subsectors {
            ensure!(
                subsector.share_weight >= 0.0,
                "subsector '{}' has a negative share weight",
                subsector.name
            );
            ensure!(
                subsector.calibrated_output.len() <= max_periods,
                "subsector '{}' has calibrated output beyond the model horizon",
                subsector.name
            );
        }
        Ok(())
    }

    fn build(&self, region: &str, max_periods: usize) -> Result<DemandSector> {
        let elasticities =
            Elasticities::new(&self.price_elasticity, &self.income_elasticity, max_periods);
        let mut demand = match self.kind {
            SectorKind::Building => ServiceDemand::Building(BuildingDemand::new(
                elasticities,
                self.per_capita_based,
                max_periods,
            )),
            SectorKind::Transport => ServiceDemand::Transport(
                TransportDemand::new(elasticities, self.per_capita_based, max_periods)
                    .with_aeei(&self.aeei),
            ),
        };

        let state = demand.state_mut();
        for (period, observed) in self.base_service.iter().enumerate() {
            if let Some(value) = observed {
                state.record_observed_service(period, *value)?;
            }
        }
        for (period, share) in self.percent_licensed.iter().enumerate() {
            state.set_segment_share(period, *share)?;
        }

        let prices = PriceHistory::from_series(&self.prices, max_periods);
        let mut sector = DemandSector::new(region, self.name.clone(), demand, prices);
        for subsector in &self.subsectors {
            sector = sector.with_subsector(
                Subsector::new(subsector.name.clone(), subsector.share_weight, max_periods)
                    .with_calibrated_output(&subsector.calibrated_output),
            );
        }
        Ok(sector)
    }
}
