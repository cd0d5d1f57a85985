//! Per-sample fuel analytics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TelemetrySample;

/// One point on a vehicle's fuel history chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelPoint {
    pub captured_at: DateTime<Utc>,
    /// L/100km
    pub consumption: f64,
    pub efficiency: f64,
    /// consumption priced at the configured fuel price
    pub cost: f64,
}

impl FuelPoint {
    pub fn from_sample(sample: &TelemetrySample, fuel_price: f64) -> Self {
        let consumption = if sample.efficiency > 0.0 {
            100.0 / sample.efficiency
        } else {
            0.0
        };
        Self {
            captured_at: sample.captured_at,
            consumption,
            efficiency: sample.efficiency,
            cost: consumption * fuel_price,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::sample;

    #[test]
    fn test_consumption_and_cost() {
        let mut s = sample("V-001");
        s.efficiency = 8.0;
        let p = FuelPoint::from_sample(&s, 3.5);
        assert!((p.consumption - 12.5).abs() < 1e-9);
        assert!((p.cost - 43.75).abs() < 1e-9);
        assert_eq!(p.captured_at, s.captured_at);
    }

    #[test]
    fn test_zero_efficiency_has_no_consumption() {
        let mut s = sample("V-001");
        s.efficiency = 0.0;
        let p = FuelPoint::from_sample(&s, 3.5);
        assert_eq!(p.consumption, 0.0);
        assert_eq!(p.cost, 0.0);
    }
}
