//! Structured diagnostics raised while computing demand.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerSegment {
    Primary,
    NotLicensed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Debug,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// A projection ran before the scaler was calibrated.
    UncalibratedScaler {
        region: String,
        sector: String,
        period: usize,
        segment: ScalerSegment,
        fallback: f64,
    },
    /// Service demand was rescaled to match fully calibrated subsector outputs.
    /// `scale_factor` is `None` when a zero service was raised to a positive total.
    CalibrationScaled {
        region: String,
        sector: String,
        period: usize,
        scale_factor: Option<f64>,
    },
}

impl DiagnosticEvent {
    pub fn level(&self) -> DiagnosticLevel {
        match self {
            DiagnosticEvent::UncalibratedScaler { .. } => DiagnosticLevel::Warning,
            DiagnosticEvent::CalibrationScaled { .. } => DiagnosticLevel::Debug,
        }
    }

    pub fn region(&self) -> &str {
        match self {
            DiagnosticEvent::UncalibratedScaler { region, .. }
            | DiagnosticEvent::CalibrationScaled { region, .. } => region,
        }
    }
}

pub trait DiagnosticSink {
    fn emit(&mut self, event: DiagnosticEvent);
}

impl DiagnosticSink for Vec<DiagnosticEvent> {
    fn emit(&mut self, event: DiagnosticEvent) {
        self.push(event);
    }
}

/// Keeps every event for reporting and forwards it to `tracing`.
#[derive(Debug, Default, Clone)]
pub struct DiagnosticLog {
    events: Vec<DiagnosticEvent>,
}

impl DiagnosticLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[DiagnosticEvent] {
        &self.events
    }

    pub fn count_at(&self, level: DiagnosticLevel) -> usize {
        self.events.iter().filter(|e| e.level() == level).count()
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn emit(&mut self, event: DiagnosticEvent) {
        match &event {
            DiagnosticEvent::UncalibratedScaler {
                region,
                sector,
                period,
                segment,
                fallback,
            } => warn!(
                region = %region,
                sector = %sector,
                period,
                ?segment,
                "base service not set, scaler set to {fallback}"
            ),
            DiagnosticEvent::CalibrationScaled {
                region,
                sector,
                period,
                scale_factor,
            } => debug!(
                region = %region,
                sector = %sector,
                period,
                ?scale_factor,
                "calibrated demand rescaled to fixed inputs"
            ),
        }
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_keeps_events_in_order() {
        let mut log = DiagnosticLog::new();
        log.emit(DiagnosticEvent::CalibrationScaled {
            region: "USA".into(),
            sector: "transport".into(),
            period: 1,
            scale_factor: Some(1.02),
        });
        log.emit(DiagnosticEvent::UncalibratedScaler {
            region: "China".into(),
            sector: "building".into(),
            period: 2,
            segment: ScalerSegment::Primary,
            fallback: 1.0,
        });
        assert_eq!(log.events().len(), 2);
        assert_eq!(log.events()[1].region(), "China");
        assert_eq!(log.count_at(DiagnosticLevel::Warning), 1);
        assert_eq!(log.count_at(DiagnosticLevel::Debug), 1);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = DiagnosticEvent::UncalibratedScaler {
            region: "USA".into(),
            sector: "building".into(),
            period: 3,
            segment: ScalerSegment::NotLicensed,
            fallback: 1.0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "uncalibrated_scaler");
        assert_eq!(json["segment"], "not_licensed");
    }
}
