//! Forward-Euler integration of instantaneous power into energy totals.

use super::power_balance::DispatchPolicy;
use super::types::{EnergyState, PlantConfig, PowerFlows};

/// Adds `power_w` sustained for `dt_secs` to an energy total in Wh.
pub fn integrate(total_wh: f64, power_w: f64, dt_secs: f64) -> f64 {
    total_wh + power_w * dt_secs / 3600.0
}

/// Outcome of advancing the energy state by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Integration {
    /// New state, with battery energy clamped into `[0, capacity]`.
    pub energy: EnergyState,
    /// How far the unclamped battery energy fell outside its range (Wh, >= 0).
    pub overshoot_wh: f64,
}

/// Accumulates energy counters and battery energy from [`PowerFlows`].
#[derive(Debug, Clone)]
pub struct EnergyIntegrator {
    capacity_wh: f64,
    solar_factor: f64,
    battery_counter_factor: f64,
}

impl EnergyIntegrator {
    pub fn new(plant: &PlantConfig, policy: DispatchPolicy) -> Self {
        Self {
            capacity_wh: plant.battery_capacity_wh,
            // sim solar power is pre charge-controller: apply each factor once here
            solar_factor: plant.charge_controller_efficiency * plant.inverter_efficiency,
            battery_counter_factor: policy.battery_counter_factor(plant),
        }
    }

    /// Advances `energy` by `dt_secs` of the given flows.
    ///
    /// Pure: the caller commits the returned state. A negative `dt_secs` is
    /// treated as zero, and a zero step returns the input state unchanged.
    pub fn advance(&self, energy: &EnergyState, flows: &PowerFlows, dt_secs: f64) -> Integration {
        let dt = dt_secs.max(0.0);
        let mut next = *energy;

        next.solar_energy_wh = integrate(
            next.solar_energy_wh,
            flows.sim_solar_power_w * self.solar_factor,
            dt,
        );

        let battery_w = flows.sim_battery_power_w;
        let unclamped_wh = integrate(next.battery_energy_wh, -battery_w, dt);
        if battery_w < 0.0 {
            next.battery_in_wh = integrate(
                next.battery_in_wh,
                -battery_w * self.battery_counter_factor,
                dt,
            );
        } else {
            next.battery_out_wh = integrate(
                next.battery_out_wh,
                battery_w * self.battery_counter_factor,
                dt,
            );
        }

        let grid_w = flows.sim_grid_power_w;
        if grid_w < 0.0 {
            next.grid_out_wh = integrate(next.grid_out_wh, -grid_w, dt);
        } else {
            next.grid_in_wh = integrate(next.grid_in_wh, grid_w, dt);
        }

        next.battery_energy_wh = unclamped_wh.clamp(0.0, self.capacity_wh);
        Integration {
            energy: next,
            overshoot_wh: (unclamped_wh - next.battery_energy_wh).abs(),
        }
    }
}
