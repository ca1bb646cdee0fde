//! Demand sectors: a demand strategy plus the sector's prices and subsectors.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::demand::{
    DemandDrivers, DemandError, DemandStrategy, DiagnosticSink, PeriodContext, ServiceDemand,
};
use crate::drivers::{GdpProvider, PriceHistory};
use crate::world::RegionComponent;

pub const HEATING_DEGREE_DAYS: &str = "heating_degree_days";
pub const COOLING_DEGREE_DAYS: &str = "cooling_degree_days";

/// Receives the service demand computed for a period.
pub trait OutputSink {
    fn distribute_demand(&mut self, value: f64, period: usize);
}

/// Reports whether every input of a sector has a calibrated value.
pub trait FixedInputOracle {
    fn all_inputs_fixed(&self, period: usize) -> bool;
    fn calibrated_output_total(&self, period: usize) -> f64;
}

#[derive(Debug, Clone, Serialize)]
pub struct Subsector {
    name: String,
    share_weight: f64,
    calibrated_output: Vec<Option<f64>>,
    output: Vec<f64>,
}

impl Subsector {
    pub fn new(name: impl Into<String>, share_weight: f64, max_periods: usize) -> Self {
        Self {
            name: name.into(),
            share_weight,
            calibrated_output: vec![None; max_periods],
            output: vec![0.0; max_periods],
        }
    }

    pub fn with_calibrated_output(mut self, values: &[Option<f64>]) -> Self {
        for (slot, value) in self.calibrated_output.iter_mut().zip(values) {
            *slot = *value;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn share_weight(&self) -> f64 {
        self.share_weight
    }

    pub fn calibrated_output(&self, period: usize) -> Option<f64> {
        self.calibrated_output.get(period).copied().flatten()
    }

    pub fn output(&self, period: usize) -> f64 {
        self.output.get(period).copied().unwrap_or(0.0)
    }
}

pub struct DemandSector {
    name: String,
    region: String,
    demand: ServiceDemand,
    prices: PriceHistory,
    subsectors: Vec<Subsector>,
    output: Vec<f64>,
    info: BTreeMap<String, f64>,
}

impl DemandSector {
    pub fn new(
        region: impl Into<String>,
        name: impl Into<String>,
        demand: ServiceDemand,
        prices: PriceHistory,
    ) -> Self {
        let max_periods = demand.state().max_periods();
        Self {
            name: name.into(),
            region: region.into(),
            demand,
            prices,
            subsectors: Vec::new(),
            output: vec![0.0; max_periods],
            info: BTreeMap::new(),
        }
    }

    pub fn with_subsector(mut self, subsector: Subsector) -> Self {
        self.subsectors.push(subsector);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn demand(&self) -> &ServiceDemand {
        &self.demand
    }

    pub fn demand_mut(&mut self) -> &mut ServiceDemand {
        &mut self.demand
    }

    pub fn prices(&self) -> &PriceHistory {
        &self.prices
    }

    pub fn prices_mut(&mut self) -> &mut PriceHistory {
        &mut self.prices
    }

    pub fn subsectors(&self) -> &[Subsector] {
        &self.subsectors
    }

    pub fn info(&self) -> &BTreeMap<String, f64> {
        &self.info
    }

    pub fn service(&self, period: usize) -> Option<f64> {
        self.demand.service(period)
    }

    pub fn service_pre_tech_change(&self, period: usize) -> Option<f64> {
        self.demand.service_pre_tech_change(period)
    }

    /// Summed subsector output.
    pub fn output(&self, period: usize) -> f64 {
        self.output.get(period).copied().unwrap_or(0.0)
    }

    /// Period setup. Building sectors publish the region's degree days so that
    /// subsectors can read them.
    pub fn init_calc(&mut self, _period: usize, region: &RegionComponent) {
        if let ServiceDemand::Building(_) = self.demand {
            self.info
                .insert(HEATING_DEGREE_DAYS.to_string(), region.heating_degree_days);
            self.info
                .insert(COOLING_DEGREE_DAYS.to_string(), region.cooling_degree_days);
        }
    }

    pub fn drivers(
        &self,
        period: usize,
        gdp: &dyn GdpProvider,
    ) -> Result<DemandDrivers, DemandError> {
        let gdp_per_capita = gdp.scaled_gdp_per_capita(period)?;
        let total = gdp.scaled_gdp(period)?;
        if period > 1 {
            Ok(DemandDrivers::new(
                gdp_per_capita,
                total,
                self.prices.require(period)?,
                self.prices.require(period - 1)?,
            ))
        } else {
            Ok(DemandDrivers::without_prices(gdp_per_capita, total))
        }
    }

    /// Computes service demand for the period and hands it to the subsectors.
    pub fn aggregate_demand(
        &mut self,
        ctx: &PeriodContext<'_>,
        gdp: &dyn GdpProvider,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError> {
        let drivers = self.drivers(ctx.period, gdp)?;
        let service = self.demand.compute_demand(ctx, &drivers, diagnostics)?;
        self.distribute_demand(service, ctx.period);
        Ok(service)
    }

    /// Runs a full period for this sector, including reconciliation against fully
    /// calibrated inputs.
    ///
    /// Inside the base window reconciliation adjusts the observed service before the
    /// scalers are fitted; afterwards it adjusts the projection and redistributes it.
    pub fn calc_period(
        &mut self,
        ctx: &PeriodContext<'_>,
        gdp: &dyn GdpProvider,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError> {
        let period = ctx.period;
        let reconciles = matches!(self.demand, ServiceDemand::Transport(_));
        let fixed_total = self
            .all_inputs_fixed(period)
            .then(|| self.calibrated_output_total(period));

        match fixed_total {
            Some(total) if reconciles => {
                if self.demand.state().is_calibration_period(period) {
                    self.reconcile(ctx, total, diagnostics)?;
                    self.aggregate_demand(ctx, gdp, diagnostics)
                } else {
                    self.aggregate_demand(ctx, gdp, diagnostics)?;
                    self.reconcile(ctx, total, diagnostics)?;
                    self.distribute_demand(total, period);
                    Ok(total)
                }
            }
            _ => self.aggregate_demand(ctx, gdp, diagnostics),
        }
    }

    fn reconcile(
        &mut self,
        ctx: &PeriodContext<'_>,
        total: f64,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<(), DemandError> {
        if let Some(transport) = self.demand.as_transport_mut() {
            transport.reconcile_with_fixed_inputs(ctx, total, diagnostics)?;
        }
        Ok(())
    }

    fn sum_output(&mut self, period: usize) {
        let total: f64 = self.subsectors.iter().map(|s| s.output(period)).sum();
        if let Some(slot) = self.output.get_mut(period) {
            *slot = total;
        }
    }
}

impl OutputSink for DemandSector {
    /// Splits demand across subsectors by share weight, equally when no subsector
    /// carries weight. A sector without subsectors records the demand as its output.
    fn distribute_demand(&mut self, value: f64, period: usize) {
        if self.subsectors.is_empty() {
            if let Some(slot) = self.output.get_mut(period) {
                *slot = value;
            }
            return;
        }
        let total_weight: f64 = self.subsectors.iter().map(|s| s.share_weight.max(0.0)).sum();
        let count = self.subsectors.len() as f64;
        for subsector in &mut self.subsectors {
            let share = if total_weight > 0.0 {
                subsector.share_weight.max(0.0) / total_weight
            } else {
                1.0 / count
            };
            if let Some(slot) = subsector.output.get_mut(period) {
                *slot = value * share;
            }
        }
        self.sum_output(period);
    }
}

impl FixedInputOracle for DemandSector {
    fn all_inputs_fixed(&self, period: usize) -> bool {
        !self.subsectors.is_empty()
            && self
                .subsectors
                .iter()
                .all(|s| s.calibrated_output(period).is_some())
    }

    fn calibrated_output_total(&self, period: usize) -> f64 {
        self.subsectors
            .iter()
            .filter_map(|s| s.calibrated_output(period))
            .sum()
    }
}
