//! Telemetry samples and the collaborators that produce them.

pub mod fuel;
pub mod simulated;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detect::ConfigError;

pub use self::simulated::{ScriptedSource, SimulatedSource};

#[derive(Debug, Error, PartialEq)]
pub enum SampleError {
    #[error("sample for {vehicle_id} has non-finite {field}")]
    NonFinite {
        vehicle_id: String,
        field: &'static str,
    },
    #[error("sample carries an empty vehicle id")]
    MissingVehicleId,
    #[error("source returned a sample for {got} when asked for {expected}")]
    VehicleMismatch { expected: String, got: String },
}

/// One reading from one vehicle, produced once per vehicle per tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub vehicle_id: String,
    pub captured_at: DateTime<Utc>,
    /// mph
    pub speed: f64,
    /// °C
    pub engine_temp: f64,
    /// percent
    pub fuel_level: f64,
    /// percent
    pub battery_level: f64,
    pub rpm: f64,
    /// distance per unit of fuel; higher is better
    pub efficiency: f64,
    pub lat: f64,
    pub lng: f64,
}

impl TelemetrySample {
    /// Read the value a rule refers to.
    ///
    /// Returns `None` for a non-finite reading so it can never breach a
    /// threshold.
    pub fn value(&self, metric: Metric) -> Option<f64> {
        let v = match metric {
            Metric::Speed => self.speed,
            Metric::EngineTemp => self.engine_temp,
            Metric::FuelLevel => self.fuel_level,
            Metric::Battery => self.battery_level,
            Metric::Rpm => self.rpm,
            Metric::Efficiency => self.efficiency,
        };
        v.is_finite().then_some(v)
    }

    /// Reject samples the pipeline cannot reason about.
    pub fn validate(&self) -> Result<(), SampleError> {
        if self.vehicle_id.trim().is_empty() {
            return Err(SampleError::MissingVehicleId);
        }
        let fields = [
            ("speed", self.speed),
            ("engineTemp", self.engine_temp),
            ("fuelLevel", self.fuel_level),
            ("batteryLevel", self.battery_level),
            ("rpm", self.rpm),
            ("efficiency", self.efficiency),
            ("lat", self.lat),
            ("lng", self.lng),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(SampleError::NonFinite {
                    vehicle_id: self.vehicle_id.clone(),
                    field,
                });
            }
        }
        Ok(())
    }
}

/// Sample fields a rule may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Speed,
    EngineTemp,
    FuelLevel,
    Battery,
    Rpm,
    Efficiency,
}

impl Metric {
    /// Render a reading the way operators see it in alert messages.
    pub fn describe(&self, value: f64) -> String {
        match self {
            Metric::Speed => format!("Speed: {:.1} mph", value),
            Metric::EngineTemp => format!("Temperature: {:.1}°C", value),
            Metric::FuelLevel => format!("Fuel at {:.1}%", value),
            Metric::Battery => format!("Battery at {:.1}%", value),
            Metric::Rpm => format!("RPM: {:.0}", value),
            Metric::Efficiency => format!("Efficiency: {:.1}", value),
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::Speed => write!(f, "speed"),
            Metric::EngineTemp => write!(f, "engineTemp"),
            Metric::FuelLevel => write!(f, "fuelLevel"),
            Metric::Battery => write!(f, "battery"),
            Metric::Rpm => write!(f, "rpm"),
            Metric::Efficiency => write!(f, "efficiency"),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "speed" => Ok(Metric::Speed),
            "engineTemp" | "engine_temp" => Ok(Metric::EngineTemp),
            "fuelLevel" | "fuel_level" => Ok(Metric::FuelLevel),
            "battery" | "batteryLevel" | "battery_level" => Ok(Metric::Battery),
            "rpm" => Ok(Metric::Rpm),
            "efficiency" => Ok(Metric::Efficiency),
            other => Err(ConfigError::UnknownMetric(other.to_string())),
        }
    }
}

/// Produces samples for a vehicle on demand.
///
/// `next` must return immediately: a vehicle with nothing to report yields
/// `None` rather than blocking the cycle.
pub trait TelemetrySource: Send {
    fn next(&mut self, vehicle_id: &str) -> Option<TelemetrySample>;
}

/// Supplies the vehicle ids the ingestor walks each tick.
pub trait VehicleRegistry: Send + Sync {
    fn active_vehicles(&self) -> Vec<String>;
}

/// Registry backed by a fixed list, usually from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistry {
    vehicles: Vec<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(vehicles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vehicles: vehicles.into_iter().map(Into::into).collect(),
        }
    }
}

impl VehicleRegistry for StaticRegistry {
    fn active_vehicles(&self) -> Vec<String> {
        self.vehicles.clone()
    }
}

#[cfg(test)]
pub(crate) fn sample(vehicle_id: &str) -> TelemetrySample {
    TelemetrySample {
        vehicle_id: vehicle_id.to_string(),
        captured_at: Utc::now(),
        speed: 60.0,
        engine_temp: 85.0,
        fuel_level: 60.0,
        battery_level: 85.0,
        rpm: 2000.0,
        efficiency: 8.0,
        lat: 33.749,
        lng: -84.388,
    }
}
