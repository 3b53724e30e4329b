//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;

use energy_sim::sim::types::{BatteryState, Measurements, PlantConfig, PowerFlows};
use energy_sim::sim::{DispatchPolicy, PowerBalanceModel, Simulation};
use energy_sim::transport::{Message, Publisher, TransportError};

/// Reference installation (16.6 kWh battery, 800 W inverter ceiling).
pub fn default_plant() -> PlantConfig {
    PlantConfig::default()
}

/// Simulation of the reference installation with `initial_wh` stored.
pub fn simulation(policy: DispatchPolicy, initial_wh: f64) -> Simulation {
    Simulation::new(default_plant(), policy, initial_wh)
}

/// Power balance of the reference installation.
pub fn model(policy: DispatchPolicy) -> PowerBalanceModel {
    PowerBalanceModel::new(default_plant(), policy)
}

/// Flows with only the fields the integrator reads set.
pub fn flows(sim_solar_w: f64, battery_w: f64, grid_w: f64) -> PowerFlows {
    PowerFlows {
        measured_grid_power_w: grid_w,
        sim_solar_power_w: sim_solar_w,
        charge_controller_power_w: sim_solar_w * 0.9,
        required_battery_power_w: battery_w,
        sim_battery_power_w: battery_w,
        stat_battery_power_w: battery_w,
        inverter_output_w: 0.0,
        sim_grid_power_w: grid_w,
        battery_state: BatteryState::Charging,
    }
}

/// A deterministic day-like sweep of measurements: load swings, solar
/// rises and falls, and the grid occasionally spikes past the inverter limit.
pub fn measurement_sweep(steps: usize) -> Vec<Measurements> {
    (0..steps)
        .map(|i| {
            let x = i as f64 / steps as f64;
            let solar = (std::f64::consts::PI * x).sin().max(0.0) * 2500.0;
            let load = 400.0 + 900.0 * (6.0 * std::f64::consts::PI * x).sin().abs();
            let spike = if i % 37 == 0 { 2500.0 } else { 0.0 };
            Measurements::new(load + spike, solar)
        })
        .collect()
}

/// Publisher that keeps every message for later inspection.
#[derive(Clone, Default)]
pub struct RecordingPublisher {
    sent: Arc<Mutex<Vec<Message>>>,
    flushes: Arc<Mutex<u32>>,
}

impl RecordingPublisher {
    /// Handle to the recorded messages, usable after the publisher is moved.
    pub fn handle(&self) -> Arc<Mutex<Vec<Message>>> {
        Arc::clone(&self.sent)
    }

    pub fn flush_count(&self) -> u32 {
        *self.flushes.lock()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        *self.flushes.lock() += 1;
        Ok(())
    }
}

/// Number of recorded messages on `topic`.
pub fn count_topic(sent: &[Message], topic: &str) -> usize {
    sent.iter().filter(|m| m.topic == topic).count()
}

/// Last payload recorded on `topic`.
pub fn last_payload(sent: &[Message], topic: &str) -> Option<String> {
    sent.iter()
        .rev()
        .find(|m| m.topic == topic)
        .map(|m| m.payload.clone())
}
