use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::demand::{DemandError, DemandStrategy, DiagnosticEvent, DiagnosticLog};
use crate::drivers::{GdpProvider, RegionGdp};
use crate::modeltime::Modeltime;
use crate::sector::DemandSector;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegionComponent {
    pub name: String,
    pub gdp: RegionGdp,
    pub heating_degree_days: f64,
    pub cooling_degree_days: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionTotal {
    pub region: String,
    pub service: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub period: usize,
    pub year: i32,
    pub regions: Vec<RegionTotal>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct BookkeepingState {
    pub totals: Vec<PeriodTotals>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubsectorSnapshot {
    pub name: String,
    pub output: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorSnapshot {
    pub name: String,
    pub kind: String,
    pub price: Option<f64>,
    pub price_ratio: f64,
    pub price_ratio_not_lic: f64,
    pub base_scaler: Option<f64>,
    pub base_scaler_not_lic: Option<f64>,
    pub base_service: Option<f64>,
    pub segment_share: f64,
    pub service_pre_tech_change: Option<f64>,
    pub service: Option<f64>,
    pub output: f64,
    pub info: BTreeMap<String, f64>,
    pub subsectors: Vec<SubsectorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionSnapshot {
    pub id: u64,
    pub name: String,
    pub scaled_gdp: Option<f64>,
    pub scaled_gdp_per_capita: Option<f64>,
    pub sectors: Vec<SectorSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub scenario: String,
    pub period: usize,
    pub year: i32,
    pub regions: Vec<RegionSnapshot>,
    pub diagnostics: Vec<DiagnosticEvent>,
}

pub struct World {
    next_entity: u64,
    modeltime: Modeltime,
    period: usize,
    pub(crate) regions: HashMap<EntityId, RegionComponent>,
    pub(crate) sectors: HashMap<EntityId, Vec<DemandSector>>,
    pub(crate) diagnostics: DiagnosticLog,
    pub(crate) bookkeeping: BookkeepingState,
}

impl World {
    pub fn new(modeltime: Modeltime) -> Self {
        Self {
            next_entity: 0,
            modeltime,
            period: 0,
            regions: HashMap::new(),
            sectors: HashMap::new(),
            diagnostics: DiagnosticLog::new(),
            bookkeeping: BookkeepingState::default(),
        }
    }

    pub fn spawn_region(&mut self, region: RegionComponent, sectors: Vec<DemandSector>) -> EntityId {
        let id = self.allocate();
        self.regions.insert(id, region);
        self.sectors.insert(id, sectors);
        id
    }

    pub fn modeltime(&self) -> &Modeltime {
        &self.modeltime
    }

    /// The period the next engine step will compute.
    pub fn period(&self) -> usize {
        self.period
    }

    pub fn remaining_periods(&self) -> usize {
        self.modeltime.max_periods().saturating_sub(self.period)
    }

    pub fn advance_period(&mut self) {
        self.period += 1;
    }

    pub fn entity_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.regions.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn region(&self, id: EntityId) -> Option<&RegionComponent> {
        self.regions.get(&id)
    }

    pub fn region_named(&self, name: &str) -> Option<EntityId> {
        self.entity_ids()
            .into_iter()
            .find(|id| self.regions.get(id).map(|r| r.name.as_str()) == Some(name))
    }

    pub fn sectors(&self, id: EntityId) -> &[DemandSector] {
        self.sectors.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sectors_mut(&mut self, id: EntityId) -> Option<&mut Vec<DemandSector>> {
        self.sectors.get_mut(&id)
    }

    pub fn sector(&self, id: EntityId, name: &str) -> Option<&DemandSector> {
        self.sectors(id).iter().find(|s| s.name() == name)
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn bookkeeping(&self) -> &BookkeepingState {
        &self.bookkeeping
    }

    /// Total service of all sectors in a region, skipping sectors not yet computed.
    pub fn region_service(&self, id: EntityId, period: usize) -> f64 {
        self.sectors(id)
            .iter()
            .filter_map(|s| s.service(period))
            .sum()
    }

    /// State of the world for `period`.
    pub fn snapshot(&self, scenario: &str, period: usize) -> Result<WorldSnapshot, DemandError> {
        let year = self.modeltime.period_to_year(period)?;
        let mut regions = Vec::with_capacity(self.regions.len());
        for id in self.entity_ids() {
            let Some(region) = self.regions.get(&id) else {
                continue;
            };
            let sectors = self
                .sectors(id)
                .iter()
                .map(|sector| sector_snapshot(sector, period))
                .collect();
            regions.push(RegionSnapshot {
                id: id.raw(),
                name: region.name.clone(),
                scaled_gdp: region.gdp.scaled_gdp(period).ok(),
                scaled_gdp_per_capita: region.gdp.scaled_gdp_per_capita(period).ok(),
                sectors,
            });
        }
        Ok(WorldSnapshot {
            scenario: scenario.to_string(),
            period,
            year,
            regions,
            diagnostics: self.diagnostics.events().to_vec(),
        })
    }

    fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;
        id
    }
}

fn sector_snapshot(sector: &DemandSector, period: usize) -> SectorSnapshot {
    let state = sector.demand().state();
    SectorSnapshot {
        name: sector.name().to_string(),
        kind: sector.demand().kind().to_string(),
        price: sector.prices().price(period),
        price_ratio: state.price_ratio(),
        price_ratio_not_lic: state.price_ratio_not_lic(),
        base_scaler: state.fitted_scaler(),
        base_scaler_not_lic: state.fitted_scaler_not_lic(),
        base_service: state.base_service(period),
        segment_share: state.segment_share(period),
        service_pre_tech_change: state.service_pre_tech_change(period),
        service: state.service(period),
        output: sector.output(period),
        info: sector.info().clone(),
        subsectors: sector
            .subsectors()
            .iter()
            .map(|s| SubsectorSnapshot {
                name: s.name().to_string(),
                output: s.output(period),
            })
            .collect(),
    }
}
