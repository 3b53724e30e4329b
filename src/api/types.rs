//! API response types.
//!
//! Field names follow the published topic names so dashboards can use
//! either source interchangeably.

use serde::Serialize;

use crate::sim::DispatchPolicy;
use crate::sim::types::{BatteryState, PlantConfig, TickReport};

/// Plant parameters, dispatch policy, and the latest tick.
#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub plant: PlantConfig,
    pub policy: DispatchPolicy,
    /// Most recent tick.
    pub latest: StatusRecord,
}

/// One tick, flattened into the values the simulator publishes.
#[derive(Debug, Serialize)]
pub struct StatusRecord {
    /// Tick index since startup.
    pub tick: u64,
    /// Measured grid power (W).
    pub real_grid_pwr: f64,
    /// Simulated grid power (W).
    pub grid_pwr: f64,
    /// Raw battery power, positive = discharge (W).
    pub batt_pwr: f64,
    /// Loss-adjusted battery power (W).
    pub stat_batt_pwr: f64,
    /// Simulated solar power (W).
    pub stat_solar_pwr: f64,
    /// Realised inverter output (W).
    pub inverter_pwr: f64,
    pub battery_state: BatteryState,
    /// State of charge in percent.
    pub battery_soc: f64,
    pub battery_wh: f64,
    pub solar_wh: f64,
    pub battery_in_wh: f64,
    pub battery_out_wh: f64,
    pub in_grid_wh: f64,
    pub out_grid_wh: f64,
}

impl From<&TickReport> for StatusRecord {
    fn from(r: &TickReport) -> Self {
        Self {
            tick: r.tick,
            real_grid_pwr: r.flows.measured_grid_power_w,
            grid_pwr: r.flows.sim_grid_power_w,
            batt_pwr: r.flows.sim_battery_power_w,
            stat_batt_pwr: r.flows.stat_battery_power_w,
            stat_solar_pwr: r.flows.sim_solar_power_w,
            inverter_pwr: r.flows.inverter_output_w,
            battery_state: r.flows.battery_state,
            battery_soc: r.battery_soc * 100.0,
            battery_wh: r.energy.battery_energy_wh,
            solar_wh: r.energy.solar_energy_wh,
            battery_in_wh: r.energy.battery_in_wh,
            battery_out_wh: r.energy.battery_out_wh,
            in_grid_wh: r.energy.grid_in_wh,
            out_grid_wh: r.energy.grid_out_wh,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
}
