//! Building service demand.
//!
//! Demand is proportional to GDP to a power, or to GDP per capita to a power times
//! population, scaled by the own-price ratio to the previous period. Any period with
//! observed base service refits the scaler and passes the observation through.

use super::{
    ensure_finite_demand, ensure_finite_scaler, income_term, resolve_scaler, CalibrationRule,
    CalibrationState, DemandDrivers, DemandError, DemandStrategy, DiagnosticSink, Elasticities,
    PeriodContext, ScalerSegment,
};

#[derive(Debug, Clone)]
pub struct BuildingDemand {
    state: CalibrationState,
}

impl BuildingDemand {
    pub fn new(elasticities: Elasticities, per_capita_based: bool, max_periods: usize) -> Self {
        Self {
            state: CalibrationState::new(
                CalibrationRule::ObservedService,
                elasticities,
                per_capita_based,
                max_periods,
            ),
        }
    }
}

impl DemandStrategy for BuildingDemand {
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
        let per_capita_based = self.state.per_capita_based();
        drivers.validate(period, per_capita_based)?;

        let price_ratio = drivers.price_ratio(period);
        let price_term = price_ratio.powf(self.state.elasticities().price(period)?);
        let income_elasticity = self.state.elasticities().income(period)?;
        let income = income_term(drivers, per_capita_based, income_elasticity);

        let demand = match self.state.base_service(period) {
            Some(observed) => {
                let scaler = ensure_finite_scaler(period, observed / (price_term * income))?;
                self.state.set_fitted_scaler(period, scaler, None)?;
                observed
            }
            None => {
                let scaler = resolve_scaler(&self.state, ScalerSegment::Primary);
                let demand = ensure_finite_demand(period, scaler.value() * price_term * income)?;
                scaler.commit(&mut self.state, ctx, diagnostics);
                demand
            }
        };

        self.state.set_price_ratios(price_ratio, price_ratio);
        self.state.write_service(period, demand, demand);
        Ok(demand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demand::test_support::{assert_approx, ctx};
    use crate::demand::DiagnosticEvent;

    fn building(price: f64, income: f64, per_capita_based: bool) -> BuildingDemand {
        BuildingDemand::new(Elasticities::constant(price, income, 6), per_capita_based, 6)
    }

    #[test]
    fn calibrates_then_projects_aggregate_gdp() {
        let mut demand = building(-0.3, 0.5, false);
        demand.state_mut().record_observed_service(1, 100.0).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();

        let base = demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(1.0, 100.0), &mut events)
            .unwrap();
        assert_eq!(base, 100.0);
        assert_approx(demand.state().fitted_scaler().unwrap(), 10.0, 1e-12);

        let projected = demand
            .compute_demand(&ctx(2), &DemandDrivers::new(1.0, 121.0, 1.0, 1.0), &mut events)
            .unwrap();
        assert_approx(projected, 110.0, 1e-9);
        assert_eq!(demand.service(2), Some(projected));
        assert_eq!(demand.service_pre_tech_change(2), Some(projected));
        assert!(events.is_empty());
    }

    #[test]
    fn calibration_passes_observed_service_through() {
        let mut demand = building(-0.4, 0.8, true);
        demand.state_mut().record_observed_service(0, 73.25).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        let service = demand
            .compute_demand(&ctx(0), &DemandDrivers::without_prices(1.7, 3.1), &mut events)
            .unwrap();
        assert_eq!(service, 73.25);
        assert_eq!(demand.service(0), Some(73.25));
    }

    #[test]
    fn per_capita_projection_scales_with_population() {
        let mut demand = building(0.0, 0.5, true);
        demand.state_mut().record_observed_service(1, 50.0).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(1.0, 1.0), &mut events)
            .unwrap();
        // per-capita GDP quadruples, population doubles
        let projected = demand
            .compute_demand(&ctx(2), &DemandDrivers::new(4.0, 8.0, 1.0, 1.0), &mut events)
            .unwrap();
        assert_approx(projected, 50.0 * 2.0 * 2.0, 1e-9);
    }

    #[test]
    fn identical_drivers_give_identical_projections() {
        let mut demand = building(-0.3, 0.6, true);
        demand.state_mut().record_observed_service(1, 80.0).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(1.2, 2.0), &mut events)
            .unwrap();
        let drivers = DemandDrivers::new(1.5, 2.6, 1.1, 1.0);
        let a = demand.compute_demand(&ctx(2), &drivers, &mut events).unwrap();
        let b = demand.compute_demand(&ctx(4), &drivers, &mut events).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn overflowing_fallback_projection_leaves_scaler_unset() {
        let mut demand = building(0.0, 2.0, false);
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        let err = demand
            .compute_demand(&ctx(0), &DemandDrivers::without_prices(1.0, 1e300), &mut events)
            .unwrap_err();
        assert!(matches!(err, DemandError::NonFiniteDemand { period: 0, .. }));
        assert_eq!(demand.state().fitted_scaler(), None);
        assert_eq!(demand.service(0), None);
        assert!(events.is_empty());

        // the warning is raised by the first period that succeeds
        demand
            .compute_demand(&ctx(0), &DemandDrivers::without_prices(1.0, 2.0), &mut events)
            .unwrap();
        assert_eq!(demand.state().fitted_scaler(), Some(1.0));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn higher_price_ratio_lowers_demand() {
        let mut demand = building(-0.5, 0.5, false);
        demand.state_mut().record_observed_service(1, 100.0).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(1.0, 100.0), &mut events)
            .unwrap();
        let cheap = demand
            .compute_demand(&ctx(2), &DemandDrivers::new(1.0, 110.0, 1.0, 1.0), &mut events)
            .unwrap();
        let dear = demand
            .compute_demand(&ctx(3), &DemandDrivers::new(1.0, 110.0, 1.3, 1.0), &mut events)
            .unwrap();
        assert!(dear < cheap, "{dear} should be below {cheap}");
    }

    #[test]
    fn per_capita_and_aggregate_agree_for_unit_population() {
        let drivers_base = DemandDrivers::without_prices(3.0, 3.0);
        let drivers_next = DemandDrivers::new(4.5, 4.5, 1.2, 1.0);
        let mut results = Vec::new();
        for per_capita_based in [true, false] {
            let mut demand = building(-0.2, 0.7, per_capita_based);
            demand.state_mut().record_observed_service(1, 40.0).unwrap();
            let mut events: Vec<DiagnosticEvent> = Vec::new();
            demand.compute_demand(&ctx(1), &drivers_base, &mut events).unwrap();
            results.push(demand.compute_demand(&ctx(2), &drivers_next, &mut events).unwrap());
        }
        assert_approx(results[0], results[1], 1e-9);
    }

    #[test]
    fn later_observed_service_refits_scaler() {
        let mut demand = building(0.0, 1.0, false);
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        demand.state_mut().record_observed_service(0, 10.0).unwrap();
        demand.state_mut().record_observed_service(1, 30.0).unwrap();
        demand
            .compute_demand(&ctx(0), &DemandDrivers::without_prices(1.0, 10.0), &mut events)
            .unwrap();
        assert_approx(demand.state().fitted_scaler().unwrap(), 1.0, 1e-12);
        demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(1.0, 10.0), &mut events)
            .unwrap();
        assert_approx(demand.state().fitted_scaler().unwrap(), 3.0, 1e-12);
    }

    #[test]
    fn uncalibrated_projection_uses_fallback_and_warns() {
        let mut demand = building(-0.3, 0.5, false);
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        let service = demand
            .compute_demand(&ctx(2), &DemandDrivers::new(1.0, 4.0, 1.0, 1.0), &mut events)
            .unwrap();
        assert_approx(service, 2.0, 1e-12);
        assert!(service.is_finite() && service >= 0.0);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            DiagnosticEvent::UncalibratedScaler {
                period: 2,
                segment: ScalerSegment::Primary,
                ..
            }
        ));

        // fallback is kept, so the warning is not repeated
        demand
            .compute_demand(&ctx(3), &DemandDrivers::new(1.0, 4.0, 1.0, 1.0), &mut events)
            .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn zero_gdp_per_capita_fails_without_touching_state() {
        let mut demand = building(0.0, 0.5, true);
        demand.state_mut().record_observed_service(1, 100.0).unwrap();
        let mut events: Vec<DiagnosticEvent> = Vec::new();
        let err = demand
            .compute_demand(&ctx(1), &DemandDrivers::without_prices(0.0, 5.0), &mut events)
            .unwrap_err();
        assert!(matches!(err, DemandError::NonFiniteDriver { period: 1, .. }));
        assert_eq!(demand.state().fitted_scaler(), None);
        assert_eq!(demand.service(1), None);
    }
}
