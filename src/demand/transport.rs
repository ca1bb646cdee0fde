//! Transport service demand.
//!
//! The first two periods are the base window: observed service is split between the
//! licensed and not-licensed population and one scaler is fitted per segment.
//! Later periods sum both segments' price and income responses and divide by the
//! autonomous end-use energy intensity improvement (AEEI) over the timestep.

use super::state::{carry_forward, TRANSPORT_BASE_WINDOW};
use super::{
    ensure_finite_demand, ensure_finite_scaler, income_term, resolve_scaler, CalibrationRule,
    CalibrationState, DemandDrivers, DemandError, DemandStrategy, DiagnosticEvent, DiagnosticSink,
    Elasticities, PeriodContext, ScalerSegment,
};

#[derive(Debug, Clone)]
pub struct TransportDemand {
    state: CalibrationState,
    aeei: Vec<f64>,
}

impl TransportDemand {
    pub fn new(elasticities: Elasticities, per_capita_based: bool, max_periods: usize) -> Self {
        Self {
            state: CalibrationState::new(
                CalibrationRule::BaseWindow {
                    periods: TRANSPORT_BASE_WINDOW,
                },
                elasticities,
                per_capita_based,
                max_periods,
            ),
            aeei: vec![0.0; max_periods],
        }
    }

    /// Sets the per-period AEEI rate. Short series carry their last value forward.
    pub fn with_aeei(mut self, aeei: &[f64]) -> Self {
        self.aeei = carry_forward(aeei, self.state.max_periods());
        self
    }

    pub fn aeei(&self, period: usize) -> f64 {
        self.aeei.get(period).copied().unwrap_or(0.0)
    }

    /// Replaces service with the total of fully calibrated inputs and returns the
    /// scale factor that was applied, or `None` when a zero service was raised to a
    /// positive total.
    pub fn reconcile_with_fixed_inputs(
        &mut self,
        ctx: &PeriodContext<'_>,
        observed_total: f64,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<Option<f64>, DemandError> {
        let period = ctx.period;
        self.state.check_period(period)?;
        let service = self
            .state
            .service(period)
            .ok_or(DemandError::ServiceNotComputed { period })?;
        if !observed_total.is_finite() || observed_total < 0.0 {
            return Err(DemandError::NonFiniteDriver {
                driver: "calibrated_output_total",
                period,
                value: observed_total,
            });
        }

        let scale_factor = if service > 0.0 {
            Some(observed_total / service)
        } else if observed_total == 0.0 {
            Some(1.0)
        } else {
            None
        };
        self.state.overwrite_service(period, observed_total);
        self.state.write_output(period, observed_total);
        diagnostics.emit(DiagnosticEvent::CalibrationScaled {
            region: ctx.region.to_string(),
            sector: ctx.sector.to_string(),
            period,
            scale_factor,
        });
        Ok(scale_factor)
    }

    fn calibrate(
        &mut self,
        period: usize,
        drivers: &DemandDrivers,
        income_elasticity: f64,
    ) -> Result<f64, DemandError> {
        let observed = self
            .state
            .service(period)
            .ok_or(DemandError::MissingObservedService { period })?;
        let share = self.state.segment_share(period);
        let income = income_term(drivers, self.state.per_capita_based(), income_elasticity);

        let licensed = ensure_finite_scaler(period, observed * share / income)?;
        let not_licensed = ensure_finite_scaler(period, observed * (1.0 - share) / income)?;

        self.state.set_price_ratios(1.0, 1.0);
        self.state
            .set_fitted_scaler(period, licensed, Some(not_licensed))?;
        self.state.write_service(period, observed, observed);
        Ok(observed)
    }

    fn project(
        &mut self,
        ctx: &PeriodContext<'_>,
        drivers: &DemandDrivers,
        income_elasticity: f64,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError> {
        let period = ctx.period;
        let price_elasticity = self.state.elasticities().price(period)?;
        // both segments currently see the same own-price ratio
        let price_ratio = drivers.price_ratio(period);
        let price_ratio_not_lic = price_ratio;
        let income = income_term(drivers, self.state.per_capita_based(), income_elasticity);

        let licensed = resolve_scaler(&self.state, ScalerSegment::Primary);
        let not_licensed = resolve_scaler(&self.state, ScalerSegment::NotLicensed);

        let raw = ensure_finite_demand(
            period,
            (licensed.value() * price_ratio.powf(price_elasticity)
                + not_licensed.value() * price_ratio_not_lic.powf(price_elasticity))
                * income,
        )?;
        // not cumulative: each period only applies its own timestep of AEEI
        let trend = (1.0 + self.aeei(period)).powf(ctx.timestep);
        let service = ensure_finite_demand(period, raw / trend)?;

        licensed.commit(&mut self.state, ctx, diagnostics);
        not_licensed.commit(&mut self.state, ctx, diagnostics);
        self.state.set_price_ratios(price_ratio, price_ratio_not_lic);
        self.state.write_service(period, raw, service);
        Ok(service)
    }
}

impl DemandStrategy for TransportDemand {
    fn state(&self) -> &CalibrationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut CalibrationState {
        &mut self.state
    }

    fn compute_demand(
        &mut self,
        ctx: &PeriodContext<'_>,
        drivers: &DemandDrivers,
        diagnostics: &mut dyn DiagnosticSink,
    ) -> Result<f64, DemandError> {
        let period = ctx.period;
        self.state.check_period(period)?;
        drivers.validate(period, self.state.per_capita_based())?;
        let income_elasticity = self.state.elasticities().income(period)?;

        let service = if self.state.is_calibration_period(period) {
            self.calibrate(period, drivers, income_elasticity)?
        } else {
            self.project(ctx, drivers, income_elasticity, diagnostics)?
        };
        self.state.write_output(period, service);
        Ok(service)
    }
}
