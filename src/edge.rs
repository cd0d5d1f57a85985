//! Per-vehicle edge device connectivity.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last reported link state for one vehicle's edge device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeDeviceStatus {
    pub vehicle_id: String,
    pub connected: bool,
    pub latency_ms: u64,
    pub sample_count: u64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct EdgeStatusTracker {
    devices: HashMap<String, EdgeDeviceStatus>,
}

impl EdgeStatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored status for `vehicle_id`.
    ///
    /// A disconnected device always reports zero latency and keeps the
    /// sample count it had before it dropped off.
    pub fn update(&mut self, vehicle_id: &str, connected: bool, latency_ms: u64, sample_count: u64) {
        let previous = self.devices.get(vehicle_id);
        if previous.map(|p| p.connected) != Some(connected) {
            tracing::info!(vehicle = %vehicle_id, connected, "edge connectivity changed");
        }

        let (latency_ms, sample_count) = if connected {
            (latency_ms, sample_count)
        } else {
            (0, previous.map_or(sample_count, |p| p.sample_count))
        };

        self.devices.insert(
            vehicle_id.to_string(),
            EdgeDeviceStatus {
                vehicle_id: vehicle_id.to_string(),
                connected,
                latency_ms,
                sample_count,
                updated_at: Utc::now(),
            },
        );
    }

    pub fn is_connected(&self, vehicle_id: &str) -> bool {
        self.devices.get(vehicle_id).is_some_and(|d| d.connected)
    }

    pub fn get(&self, vehicle_id: &str) -> Option<&EdgeDeviceStatus> {
        self.devices.get(vehicle_id)
    }

    pub fn sample_count(&self, vehicle_id: &str) -> u64 {
        self.devices.get(vehicle_id).map_or(0, |d| d.sample_count)
    }

    /// All devices, ordered by vehicle id.
    pub fn all(&self) -> Vec<EdgeDeviceStatus> {
        let mut devices: Vec<_> = self.devices.values().cloned().collect();
        devices.sort_by(|a, b| a.vehicle_id.cmp(&b.vehicle_id));
        devices
    }

    pub fn connected_count(&self) -> usize {
        self.devices.values().filter(|d| d.connected).count()
    }
}
