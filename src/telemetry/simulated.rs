//! Synthetic telemetry sources.
//!
//! [`SimulatedSource`] drives the `simulate` command and demo deployments
//! with a seeded generator, so two runs with the same seed produce the same
//! readings. [`ScriptedSource`] replays queued samples and is what tests use
//! to set up exact scenarios.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{TelemetrySample, TelemetrySource};

const DEPOT_LAT: f64 = 33.7490;
const DEPOT_LNG: f64 = -84.3880;

/// Drift state carried between ticks for one vehicle.
#[derive(Debug, Clone)]
struct VehicleSim {
    fuel_level: f64,
    lat: f64,
    lng: f64,
}

/// Seeded random telemetry generator.
pub struct SimulatedSource {
    rng: StdRng,
    vehicles: HashMap<String, VehicleSim>,
    disconnected: HashSet<String>,
}

impl SimulatedSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            vehicles: HashMap::new(),
            disconnected: HashSet::new(),
        }
    }

    /// Mark vehicles whose edge device is offline; they never yield a sample.
    pub fn with_disconnected<I, S>(mut self, vehicles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disconnected.extend(vehicles.into_iter().map(Into::into));
        self
    }

    pub fn set_connected(&mut self, vehicle_id: &str, connected: bool) {
        if connected {
            self.disconnected.remove(vehicle_id);
        } else {
            self.disconnected.insert(vehicle_id.to_string());
        }
    }
}

impl TelemetrySource for SimulatedSource {
    fn next(&mut self, vehicle_id: &str) -> Option<TelemetrySample> {
        if self.disconnected.contains(vehicle_id) {
            return None;
        }

        let rng = &mut self.rng;
        let state = self
            .vehicles
            .entry(vehicle_id.to_string())
            .or_insert_with(|| VehicleSim {
                fuel_level: rng.gen_range(40.0..90.0),
                lat: DEPOT_LAT + rng.gen_range(-0.05..0.05),
                lng: DEPOT_LNG + rng.gen_range(-0.05..0.05),
            });

        state.fuel_level -= rng.gen_range(0.1..0.6);
        if state.fuel_level < 5.0 {
            // refuelled
            state.fuel_level = 95.0;
        }
        state.lat += rng.gen_range(-0.002..0.002);
        state.lng += rng.gen_range(-0.002..0.002);

        // Link latency shows up as the age of the sample on arrival.
        let latency_ms = rng.gen_range(10..60);

        Some(TelemetrySample {
            vehicle_id: vehicle_id.to_string(),
            captured_at: Utc::now() - Duration::milliseconds(latency_ms),
            speed: rng.gen_range(20.0..100.0),
            engine_temp: rng.gen_range(70.0..100.0),
            fuel_level: state.fuel_level,
            battery_level: rng.gen_range(75.0..95.0),
            rpm: rng.gen_range(1000.0..3000.0),
            efficiency: rng.gen_range(7.0..10.0),
            lat: state.lat,
            lng: state.lng,
        })
    }
}

/// Replays pre-built samples, one per `next` call, per vehicle.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    queued: HashMap<String, VecDeque<TelemetrySample>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: TelemetrySample) {
        self.queued
            .entry(sample.vehicle_id.clone())
            .or_default()
            .push_back(sample);
    }

    pub fn with_sample(mut self, sample: TelemetrySample) -> Self {
        self.push(sample);
        self
    }

    pub fn remaining(&self, vehicle_id: &str) -> usize {
        self.queued.get(vehicle_id).map_or(0, VecDeque::len)
    }
}

impl TelemetrySource for ScriptedSource {
    fn next(&mut self, vehicle_id: &str) -> Option<TelemetrySample> {
        self.queued.get_mut(vehicle_id)?.pop_front()
    }
}
