//! Economic drivers and sector price history.

use serde::Serialize;

use crate::demand::DemandError;

/// Supplies GDP drivers for one region.
pub trait GdpProvider {
    fn scaled_gdp(&self, period: usize) -> Result<f64, DemandError>;
    fn scaled_gdp_per_capita(&self, period: usize) -> Result<f64, DemandError>;
}

/// GDP and population series for a region.
///
/// With `scaled` set the drivers are normalised to period 0, so the per-capita
/// multiplier `gdp / gdp_per_capita` is the population ratio to the base year.
/// Otherwise the series are taken as already scaled.
#[derive(Debug, Clone, Serialize)]
pub struct RegionGdp {
    gdp: Vec<f64>,
    population: Vec<f64>,
    scaled: bool,
}

impl RegionGdp {
    pub fn new(gdp: Vec<f64>, population: Vec<f64>) -> Self {
        Self {
            gdp,
            population,
            scaled: true,
        }
    }

    /// Series that are used as given.
    pub fn prescaled(gdp: Vec<f64>, gdp_per_capita: Vec<f64>) -> Self {
        let population = gdp
            .iter()
            .zip(&gdp_per_capita)
            .map(|(total, per_capita)| total / per_capita)
            .collect();
        Self {
            gdp,
            population,
            scaled: false,
        }
    }

    pub fn is_scaled(&self) -> bool {
        self.scaled
    }

    fn gdp_at(&self, period: usize) -> Result<f64, DemandError> {
        self.gdp
            .get(period)
            .copied()
            .ok_or(DemandError::MissingDriver {
                driver: "gdp",
                period,
            })
    }

    fn population_at(&self, period: usize) -> Result<f64, DemandError> {
        self.population
            .get(period)
            .copied()
            .ok_or(DemandError::MissingDriver {
                driver: "population",
                period,
            })
    }

    fn per_capita_at(&self, period: usize) -> Result<f64, DemandError> {
        Ok(self.gdp_at(period)? / self.population_at(period)?)
    }
}

impl GdpProvider for RegionGdp {
    fn scaled_gdp(&self, period: usize) -> Result<f64, DemandError> {
        let gdp = self.gdp_at(period)?;
        if self.scaled {
            Ok(gdp / self.gdp_at(0)?)
        } else {
            Ok(gdp)
        }
    }

    fn scaled_gdp_per_capita(&self, period: usize) -> Result<f64, DemandError> {
        let per_capita = self.per_capita_at(period)?;
        if self.scaled {
            Ok(per_capita / self.per_capita_at(0)?)
        } else {
            Ok(per_capita)
        }
    }
}

/// Own-price history of a sector.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceHistory {
    prices: Vec<Option<f64>>,
}

impl PriceHistory {
    pub fn new(max_periods: usize) -> Self {
        Self {
            prices: vec![None; max_periods],
        }
    }

    pub fn from_series(series: &[f64], max_periods: usize) -> Self {
        let mut history = Self::new(max_periods);
        for (period, price) in series.iter().take(max_periods).enumerate() {
            history.prices[period] = Some(*price);
        }
        history
    }

    pub fn set_price(&mut self, period: usize, price: f64) -> Result<(), DemandError> {
        let max_periods = self.prices.len();
        let slot = self
            .prices
            .get_mut(period)
            .ok_or(DemandError::PeriodOutOfRange {
                period,
                max_periods,
            })?;
        *slot = Some(price);
        Ok(())
    }

    pub fn price(&self, period: usize) -> Option<f64> {
        self.prices.get(period).copied().flatten()
    }

    pub fn require(&self, period: usize) -> Result<f64, DemandError> {
        self.price(period).ok_or(DemandError::MissingDriver {
            driver: "price",
            period,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_drivers_are_relative_to_base_period() {
        let gdp = RegionGdp::new(vec![200.0, 300.0, 480.0], vec![10.0, 12.0, 16.0]);
        assert_eq!(gdp.scaled_gdp(0).unwrap(), 1.0);
        assert_eq!(gdp.scaled_gdp(2).unwrap(), 2.4);
        // per capita: 20, 25, 30
        assert_eq!(gdp.scaled_gdp_per_capita(1).unwrap(), 1.25);
        assert_eq!(gdp.scaled_gdp_per_capita(2).unwrap(), 1.5);
        // population ratio recovered from the two drivers
        let ratio = gdp.scaled_gdp(2).unwrap() / gdp.scaled_gdp_per_capita(2).unwrap();
        assert!((ratio - 1.6).abs() < 1e-12);
    }

    #[test]
    fn prescaled_drivers_pass_through() {
        let gdp = RegionGdp::prescaled(vec![100.0, 121.0], vec![100.0, 121.0]);
        assert!(!gdp.is_scaled());
        assert_eq!(gdp.scaled_gdp(1).unwrap(), 121.0);
        assert_eq!(gdp.scaled_gdp_per_capita(1).unwrap(), 121.0);
    }

    #[test]
    fn zero_population_yields_non_finite_per_capita() {
        let gdp = RegionGdp::prescaled(vec![1.0], vec![1.0]);
        let broken = RegionGdp::new(vec![1.0, 2.0], vec![1.0, 0.0]);
        assert!(gdp.scaled_gdp_per_capita(0).unwrap().is_finite());
        assert!(!broken.scaled_gdp_per_capita(1).unwrap().is_finite());
    }

    #[test]
    fn missing_periods_are_reported() {
        let gdp = RegionGdp::new(vec![1.0], vec![1.0]);
        assert_eq!(
            gdp.scaled_gdp(3),
            Err(DemandError::MissingDriver {
                driver: "gdp",
                period: 3
            })
        );
    }

    #[test]
    fn price_history_tracks_set_periods() {
        let mut prices = PriceHistory::from_series(&[1.0, 1.1], 4);
        assert_eq!(prices.price(1), Some(1.1));
        assert_eq!(prices.price(2), None);
        prices.set_price(2, 1.3).unwrap();
        assert_eq!(prices.require(2).unwrap(), 1.3);
        assert!(prices.require(3).is_err());
        assert!(prices.set_price(4, 1.0).is_err());
    }
}
