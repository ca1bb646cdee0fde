//! Model period calendar.
//!
//! Periods are indexed from 0 and each maps to a calendar year. The timestep of a
//! period is the number of years since the previous period; period 0 borrows the
//! first interval so that it has a usable length.

use serde::{Deserialize, Serialize};

use crate::demand::DemandError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modeltime {
    years: Vec<i32>,
}

impl Modeltime {
    pub fn new(years: Vec<i32>) -> Result<Self, &'static str> {
        check_period_years(&years)?;
        Ok(Self { years })
    }

    pub fn max_periods(&self) -> usize {
        self.years.len()
    }

    pub fn years(&self) -> &[i32] {
        &self.years
    }

    pub fn period_to_year(&self, period: usize) -> Result<i32, DemandError> {
        self.years
            .get(period)
            .copied()
            .ok_or(DemandError::PeriodOutOfRange {
                period,
                max_periods: self.years.len(),
            })
    }

    pub fn year_to_period(&self, year: i32) -> Option<usize> {
        self.years.iter().position(|y| *y == year)
    }

    /// Length in years of `period`.
    pub fn timestep(&self, period: usize) -> Result<f64, DemandError> {
        let year = self.period_to_year(period)?;
        let span = match period {
            0 => match self.years.get(1) {
                Some(next) => next - year,
                None => 1,
            },
            _ => year - self.years[period - 1],
        };
        Ok(span as f64)
    }
}

fn check_period_years(years: &[i32]) -> Result<(), &'static str> {
    if years.is_empty() {
        Err("modeltime years are empty")?;
    }

    if !years.windows(2).all(|pair| pair[0] < pair[1]) {
        Err("modeltime years must be unique and in increasing order")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timesteps_follow_year_gaps() {
        let modeltime = Modeltime::new(vec![1975, 1990, 2005, 2010]).unwrap();
        assert_eq!(modeltime.timestep(0).unwrap(), 15.0);
        assert_eq!(modeltime.timestep(2).unwrap(), 15.0);
        assert_eq!(modeltime.timestep(3).unwrap(), 5.0);
        assert_eq!(modeltime.year_to_period(2005), Some(2));
    }

    #[test]
    fn single_period_has_unit_timestep() {
        let modeltime = Modeltime::new(vec![2020]).unwrap();
        assert_eq!(modeltime.timestep(0).unwrap(), 1.0);
    }

    #[test]
    fn rejects_unordered_years() {
        assert!(Modeltime::new(vec![]).is_err());
        assert!(Modeltime::new(vec![1990, 1990]).is_err());
        assert!(Modeltime::new(vec![2000, 1990]).is_err());
    }

    #[test]
    fn out_of_range_period_is_an_error() {
        let modeltime = Modeltime::new(vec![1990, 2005]).unwrap();
        assert!(matches!(
            modeltime.timestep(2),
            Err(DemandError::PeriodOutOfRange { period: 2, .. })
        ));
    }
}
