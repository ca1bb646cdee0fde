use serde::Serialize;

use super::{DemandError, ScalerSegment};

/// Number of leading periods the transport strategy always calibrates on.
pub const TRANSPORT_BASE_WINDOW: usize = 2;

/// Decides which periods fit scalers instead of projecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum CalibrationRule {
    /// Any period with recorded observed service.
    ObservedService,
    /// The first `periods` periods, regardless of observed data.
    BaseWindow { periods: usize },
}

/// Per-period own-price and income elasticities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Elasticities {
    price: Vec<f64>,
    income: Vec<f64>,
}

impl Elasticities {
    /// Builds period tables over `max_periods`. Configured series shorter than the
    /// horizon carry their last value forward; an empty series is zero.
    pub fn new(price: &[f64], income: &[f64], max_periods: usize) -> Self {
        Self {
            price: carry_forward(price, max_periods),
            income: carry_forward(income, max_periods),
        }
    }

    pub fn constant(price: f64, income: f64, max_periods: usize) -> Self {
        Self::new(&[price], &[income], max_periods)
    }

    pub fn price(&self, period: usize) -> Result<f64, DemandError> {
        lookup(&self.price, period)
    }

    pub fn income(&self, period: usize) -> Result<f64, DemandError> {
        lookup(&self.income, period)
    }
}

pub(crate) fn carry_forward(values: &[f64], max_periods: usize) -> Vec<f64> {
    let fill = values.last().copied().unwrap_or(0.0);
    let mut out: Vec<f64> = values.iter().copied().take(max_periods).collect();
    out.resize(max_periods, fill);
    out
}

fn lookup(values: &[f64], period: usize) -> Result<f64, DemandError> {
    values
        .get(period)
        .copied()
        .ok_or(DemandError::PeriodOutOfRange {
            period,
            max_periods: values.len(),
        })
}

/// Per region-sector calibration state.
///
/// Scalers are `None` until fitted. Once fitted they only change in a later
/// calibration period, or when a projection installs the fallback for a scaler that
/// was never fitted.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationState {
    rule: CalibrationRule,
    base_scaler: Option<f64>,
    base_scaler_not_lic: Option<f64>,
    base_service: Vec<Option<f64>>,
    segment_share: Vec<f64>,
    price_ratio: f64,
    price_ratio_not_lic: f64,
    elasticities: Elasticities,
    per_capita_based: bool,
    service_pre_tech_change: Vec<Option<f64>>,
    service: Vec<Option<f64>>,
    output: Vec<Option<f64>>,
}

impl CalibrationState {
    pub fn new(
        rule: CalibrationRule,
        elasticities: Elasticities,
        per_capita_based: bool,
        max_periods: usize,
    ) -> Self {
        Self {
            rule,
            base_scaler: None,
            base_scaler_not_lic: None,
            base_service: vec![None; max_periods],
            segment_share: vec![1.0; max_periods],
            price_ratio: 1.0,
            price_ratio_not_lic: 1.0,
            elasticities,
            per_capita_based,
            service_pre_tech_change: vec![None; max_periods],
            service: vec![None; max_periods],
            output: vec![None; max_periods],
        }
    }

    pub fn rule(&self) -> CalibrationRule {
        self.rule
    }

    pub fn max_periods(&self) -> usize {
        self.service.len()
    }

    pub fn check_period(&self, period: usize) -> Result<(), DemandError> {
        if period < self.max_periods() {
            Ok(())
        } else {
            Err(DemandError::PeriodOutOfRange {
                period,
                max_periods: self.max_periods(),
            })
        }
    }

    pub fn is_calibration_period(&self, period: usize) -> bool {
        match self.rule {
            CalibrationRule::ObservedService => self.base_service(period).is_some(),
            CalibrationRule::BaseWindow { periods } => {
                period < periods && period < self.max_periods()
            }
        }
    }

    pub fn fitted_scaler(&self) -> Option<f64> {
        self.base_scaler
    }

    pub fn fitted_scaler_not_lic(&self) -> Option<f64> {
        self.base_scaler_not_lic
    }

    /// Stores scalers fitted in a calibration period.
    pub fn set_fitted_scaler(
        &mut self,
        period: usize,
        primary: f64,
        not_lic: Option<f64>,
    ) -> Result<(), DemandError> {
        self.check_period(period)?;
        if !self.is_calibration_period(period) {
            return Err(DemandError::ScalerFrozen { period });
        }
        self.base_scaler = Some(primary);
        if not_lic.is_some() {
            self.base_scaler_not_lic = not_lic;
        }
        Ok(())
    }

    /// Installs `value` for a scaler that has never been fitted. A fitted scaler is
    /// left untouched.
    pub fn install_fallback_scaler(&mut self, segment: ScalerSegment, value: f64) {
        let slot = match segment {
            ScalerSegment::Primary => &mut self.base_scaler,
            ScalerSegment::NotLicensed => &mut self.base_scaler_not_lic,
        };
        slot.get_or_insert(value);
    }

    /// Records observed service for `period`. Negative values are the "no
    /// calibration" sentinel and clear the entry.
    ///
    /// Base-window sectors read their observed service from the service array, so
    /// it is seeded there as well.
    pub fn record_observed_service(&mut self, period: usize, value: f64) -> Result<(), DemandError> {
        self.check_period(period)?;
        let observed = (value >= 0.0).then_some(value);
        self.base_service[period] = observed;
        if let CalibrationRule::BaseWindow { periods } = self.rule {
            if period < periods {
                self.service[period] = observed;
            }
        }
        Ok(())
    }

    pub fn base_service(&self, period: usize) -> Option<f64> {
        self.base_service.get(period).copied().flatten()
    }

    pub fn segment_share(&self, period: usize) -> f64 {
        self.segment_share.get(period).copied().unwrap_or(1.0)
    }

    pub fn set_segment_share(&mut self, period: usize, share: f64) -> Result<(), DemandError> {
        self.check_period(period)?;
        self.segment_share[period] = share;
        Ok(())
    }

    pub fn price_ratio(&self) -> f64 {
        self.price_ratio
    }

    pub fn price_ratio_not_lic(&self) -> f64 {
        self.price_ratio_not_lic
    }

    pub(crate) fn set_price_ratios(&mut self, primary: f64, not_lic: f64) {
        self.price_ratio = primary;
        self.price_ratio_not_lic = not_lic;
    }

    pub fn elasticities(&self) -> &Elasticities {
        &self.elasticities
    }

    pub fn per_capita_based(&self) -> bool {
        self.per_capita_based
    }

    pub fn service(&self, period: usize) -> Option<f64> {
        self.service.get(period).copied().flatten()
    }

    pub fn service_pre_tech_change(&self, period: usize) -> Option<f64> {
        self.service_pre_tech_change.get(period).copied().flatten()
    }

    pub fn output(&self, period: usize) -> Option<f64> {
        self.output.get(period).copied().flatten()
    }

    pub(crate) fn write_service(&mut self, period: usize, pre_tech_change: f64, service: f64) {
        self.service_pre_tech_change[period] = Some(pre_tech_change);
        self.service[period] = Some(service);
    }

    pub(crate) fn overwrite_service(&mut self, period: usize, service: f64) {
        self.service[period] = Some(service);
    }

    pub(crate) fn write_output(&mut self, period: usize, output: f64) {
        self.output[period] = Some(output);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed_state() -> CalibrationState {
        CalibrationState::new(
            CalibrationRule::ObservedService,
            Elasticities::constant(-0.2, 0.5, 5),
            false,
            5,
        )
    }

    #[test]
    fn observed_rule_follows_recorded_service() {
        let mut state = observed_state();
        assert!(!state.is_calibration_period(1));
        state.record_observed_service(1, 100.0).unwrap();
        assert!(state.is_calibration_period(1));
        assert_eq!(state.base_service(1), Some(100.0));
        // service array is untouched for this rule
        assert_eq!(state.service(1), None);
    }

    #[test]
    fn negative_observed_service_clears_calibration() {
        let mut state = observed_state();
        state.record_observed_service(2, 50.0).unwrap();
        state.record_observed_service(2, -1.0).unwrap();
        assert!(!state.is_calibration_period(2));
    }

    #[test]
    fn base_window_ignores_observed_service() {
        let mut state = CalibrationState::new(
            CalibrationRule::BaseWindow {
                periods: TRANSPORT_BASE_WINDOW,
            },
            Elasticities::constant(0.0, 1.0, 4),
            true,
            4,
        );
        assert!(state.is_calibration_period(0));
        assert!(state.is_calibration_period(1));
        state.record_observed_service(3, 10.0).unwrap();
        assert!(!state.is_calibration_period(3));
        state.record_observed_service(1, 42.0).unwrap();
        assert_eq!(state.service(1), Some(42.0));
    }

    #[test]
    fn scalers_are_frozen_outside_calibration_periods() {
        let mut state = observed_state();
        state.record_observed_service(0, 10.0).unwrap();
        state.set_fitted_scaler(0, 3.0, None).unwrap();
        assert_eq!(
            state.set_fitted_scaler(1, 4.0, None),
            Err(DemandError::ScalerFrozen { period: 1 })
        );
        assert_eq!(state.fitted_scaler(), Some(3.0));
    }

    #[test]
    fn fallback_never_replaces_a_fitted_scaler() {
        let mut state = observed_state();
        state.install_fallback_scaler(ScalerSegment::Primary, 1.0);
        assert_eq!(state.fitted_scaler(), Some(1.0));

        let mut fitted = observed_state();
        fitted.record_observed_service(0, 10.0).unwrap();
        fitted.set_fitted_scaler(0, 7.5, None).unwrap();
        fitted.install_fallback_scaler(ScalerSegment::Primary, 1.0);
        assert_eq!(fitted.fitted_scaler(), Some(7.5));
    }

    #[test]
    fn elasticities_carry_last_value_forward() {
        let elasticities = Elasticities::new(&[0.0, -0.3], &[], 4);
        assert_eq!(elasticities.price(3).unwrap(), -0.3);
        assert_eq!(elasticities.income(2).unwrap(), 0.0);
        assert!(elasticities.price(4).is_err());
    }

    #[test]
    fn out_of_range_periods_are_rejected() {
        let mut state = observed_state();
        assert!(matches!(
            state.record_observed_service(5, 1.0),
            Err(DemandError::PeriodOutOfRange { period: 5, .. })
        ));
    }
}
