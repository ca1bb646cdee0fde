//! Aggregate service-demand calibration and projection.
//!
//! A sector's service demand is fitted to observed data in calibration periods and
//! projected from price and income drivers afterwards. Two strategies share the
//! [`DemandStrategy`] contract:
//!
//! - [`BuildingDemand`]: one scaler, calibration wherever observed service exists.
//! - [`TransportDemand`]: licensed / not-licensed population split over a fixed
//!   two-period base window, with an autonomous efficiency trend in projections.

pub mod building;
pub mod diagnostics;
pub mod state;
pub mod transport;

use serde::Serialize;
use thiserror::Error;

pub use building::BuildingDemand;
pub use diagnostics::{
    DiagnosticEvent, DiagnosticLevel, DiagnosticLog, DiagnosticSink, ScalerSegment,
};
pub use state::{CalibrationRule, CalibrationState, Elasticities};
pub use transport::TransportDemand;

/// Scaler substituted when a projection runs before any calibration.
pub const FALLBACK_SCALER: f64 = 1.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DemandError {
    #[error("period {period} is outside the model horizon of {max_periods} periods")]
    PeriodOutOfRange { period: usize, max_periods: usize },
    #[error("driver '{driver}' is missing for period {period}")]
    MissingDriver { driver: &'static str, period: usize },
    #[error("driver '{driver}' has unusable value {value} in period {period}")]
    NonFiniteDriver {
        driver: &'static str,
        period: usize,
        value: f64,
    },
    #[error("fitted scaler is not finite ({value}) in period {period}")]
    NonFiniteScaler { period: usize, value: f64 },
    #[error("computed service demand is not finite ({value}) in period {period}")]
    NonFiniteDemand { period: usize, value: f64 },
    #[error("no observed service recorded for base period {period}")]
    MissingObservedService { period: usize },
    #[error("service demand for period {period} has not been computed yet")]
    ServiceNotComputed { period: usize },
    #[error("scalers are frozen outside calibration periods (period {period})")]
    ScalerFrozen { period: usize },
}

/// Macroeconomic and price inputs for one region-sector in one period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DemandDrivers {
    pub gdp_per_capita: f64,
    pub gdp: f64,
    pub price_current: f64,
    pub price_previous: f64,
}

impl DemandDrivers {
    pub fn new(gdp_per_capita: f64, gdp: f64, price_current: f64, price_previous: f64) -> Self {
        Self {
            gdp_per_capita,
            gdp,
            price_current,
            price_previous,
        }
    }

    /// Drivers for a base period where prices do not enter the calculation.
    pub fn without_prices(gdp_per_capita: f64, gdp: f64) -> Self {
        Self::new(gdp_per_capita, gdp, 1.0, 1.0)
    }

    /// Own-price ratio against the previous period. Prices are not reliable before
    /// period 2, so the first two periods always use 1.
    pub fn price_ratio(&self, period: usize) -> f64 {
        if period > 1 {
            self.price_current / self.price_previous
        } else {
            1.0
        }
    }

    /// Rejects drivers that would put a non-finite value into scaler fits or demand.
    pub fn validate(&self, period: usize, per_capita_based: bool) -> Result<(), DemandError> {
        check_positive("gdp", period, self.gdp)?;
        if per_capita_based {
            check_positive("gdp_per_capita", period, self.gdp_per_capita)?;
        }
        if period > 1 {
            check_positive("price_current", period, self.price_current)?;
            check_positive("price_previous", period, self.price_previous)?;
        }
        Ok(())
    }
}

fn check_positive(driver: &'static str, period: usize, value: f64) -> Result<(), DemandError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(DemandError::NonFiniteDriver {
            driver,
            period,
            value,
        })
    }
}

/// Income response term shared by both strategies.
///
/// Per-capita mode multiplies by `gdp / gdp_per_capita`, which is the population
/// ratio to the base year when both drivers are scaled to it.
pub fn income_term(drivers: &DemandDrivers, per_capita_based: bool, income_elasticity: f64) -> f64 {
    if per_capita_based {
        drivers.gdp_per_capita.powf(income_elasticity) * (drivers.gdp / drivers.gdp_per_capita)
    } else {
        drivers.gdp.powf(income_elasticity)
    }
}

/// Explicit per-call simulation context.
#[derive(Debug, Clone, Copy)]
pub struct PeriodContext<'a> {
    pub period: usize,
    /// Length of the period in years.
    pub timestep: f64,
    pub region: &'a str,
    pub sector: &'a str,
}

pub trait DemandStrategy {
    fn state(&self) -> &CalibrationState;

    fn state_mut(&mut self) -> &mut CalibrationState;

    /// Computes service demand for `ctx.period`, updating calibration state and the
    /// per-period service arrays.
    fn compute_demand(
        &mut self,
        ctx: &PeriodContext<'_>,
        drivers: &DemandDrivers,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError>;

    fn service(&self, period: usize) -> Option<f64> {
        self.state().service(period)
    }

    fn service_pre_tech_change(&self, period: usize) -> Option<f64> {
        self.state().service_pre_tech_change(period)
    }
}

/// A scaler looked up for a projection, possibly the uncalibrated fallback.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ResolvedScaler {
    segment: ScalerSegment,
    value: f64,
    fallback: bool,
}

impl ResolvedScaler {
    pub(crate) fn value(&self) -> f64 {
        self.value
    }

    /// Stores a fallback scaler and warns about it. Only call once the demand
    /// computed with it has been validated.
    pub(crate) fn commit(
        self,
        state: &mut CalibrationState,
        ctx: &PeriodContext<'_>,
        diagnostics: &mut dyn DiagnosticSink,
    ) {
        if !self.fallback {
            return;
        }
        state.install_fallback_scaler(self.segment, self.value);
        diagnostics.emit(DiagnosticEvent::UncalibratedScaler {
            region: ctx.region.to_string(),
            sector: ctx.sector.to_string(),
            period: ctx.period,
            segment: self.segment,
            fallback: self.value,
        });
    }
}

/// Returns the fitted scaler for `segment`, or the fallback when it was never
/// calibrated.
pub(crate) fn resolve_scaler(state: &CalibrationState, segment: ScalerSegment) -> ResolvedScaler {
    let fitted = match segment {
        ScalerSegment::Primary => state.fitted_scaler(),
        ScalerSegment::NotLicensed => state.fitted_scaler_not_lic(),
    };
    ResolvedScaler {
        segment,
        value: fitted.unwrap_or(FALLBACK_SCALER),
        fallback: fitted.is_none(),
    }
}

pub(crate) fn ensure_finite_demand(period: usize, value: f64) -> Result<f64, DemandError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(DemandError::NonFiniteDemand { period, value })
    }
}

pub(crate) fn ensure_finite_scaler(period: usize, value: f64) -> Result<f64, DemandError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(DemandError::NonFiniteScaler { period, value })
    }
}

/// The demand strategy a sector was configured with.
#[derive(Debug, Clone)]
pub enum ServiceDemand {
    Building(BuildingDemand),
    Transport(TransportDemand),
}

impl ServiceDemand {
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceDemand::Building(_) => "building",
            ServiceDemand::Transport(_) => "transport",
        }
    }

    pub fn as_transport_mut(&mut self) -> Option<&mut TransportDemand> {
        match self {
            ServiceDemand::Transport(transport) => Some(transport),
            ServiceDemand::Building(_) => None,
        }
    }

    fn strategy(&self) -> &dyn DemandStrategy {
        match self {
            ServiceDemand::Building(building) => building,
            ServiceDemand::Transport(transport) => transport,
        }
    }

    fn strategy_mut(&mut self) -> &mut dyn DemandStrategy {
        match self {
            ServiceDemand::Building(building) => building,
            ServiceDemand::Transport(transport) => transport,
        }
    }
}

impl DemandStrategy for ServiceDemand {
    fn state(&self) -> &CalibrationState {
        self.strategy().state()
    }

    fn state_mut(&mut self) -> &mut CalibrationState {
        self.strategy_mut().state_mut()
    }

    fn compute_demand(
        &mut self,
        ctx: &PeriodContext<'_>,
        drivers: &DemandDrivers,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError> {
        self.strategy_mut().compute_demand(ctx, drivers, diagnostics)
    }
}
