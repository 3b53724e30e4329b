//! Instantaneous power balance: efficiency chain, dispatch and battery state machine.

use serde::{Deserialize, Serialize};

use super::types::{BatteryState, Measurements, PlantConfig, PowerFlows};

/// How the grid floor and the inverter ceiling are reconciled with battery dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Follow the load down to the grid floor while the grid reading stays
    /// below `max_inverter + min_grid`; above that, ask for exactly the
    /// output ceiling. The battery is dispatched for the full request and
    /// only the realised output is clamped.
    #[default]
    InverterCeiling,
    /// Follow the load down to the grid floor, but never ask for more than
    /// the output ceiling. A request cut back this way discharges as
    /// [`BatteryState::MaxDischarging`].
    CeilingLimited,
}

impl DispatchPolicy {
    /// Desired inverter output for a grid reading, and whether the ceiling cut it back.
    fn desired_output_w(self, grid_power_w: f64, plant: &PlantConfig) -> (f64, bool) {
        let follow_w = (grid_power_w - plant.min_grid_power_w).max(0.0);
        match self {
            Self::InverterCeiling => {
                if grid_power_w < plant.max_inverter_power_w + plant.min_grid_power_w {
                    (follow_w, false)
                } else {
                    (plant.inverter_output_cap_w, false)
                }
            }
            Self::CeilingLimited => {
                let follow_w = follow_w.min(plant.max_inverter_power_w);
                if follow_w > plant.inverter_output_cap_w {
                    (plant.inverter_output_cap_w, true)
                } else {
                    (follow_w, false)
                }
            }
        }
    }

    /// Factor applied to battery power when accumulating battery in/out energy.
    ///
    /// `InverterCeiling` counts battery energy on the AC side of the inverter;
    /// `CeilingLimited` counts it at the battery terminals.
    pub fn battery_counter_factor(self, plant: &PlantConfig) -> f64 {
        match self {
            Self::InverterCeiling => plant.inverter_efficiency,
            Self::CeilingLimited => 1.0,
        }
    }
}

/// Battery state for a dispatch request.
///
/// Pure in `(required_battery_power_w, battery_energy_wh)`; `ceiling_limited`
/// only distinguishes the two discharging labels.
pub fn classify_battery(
    required_battery_power_w: f64,
    battery_energy_wh: f64,
    ceiling_limited: bool,
    plant: &PlantConfig,
) -> BatteryState {
    if required_battery_power_w > 0.0 {
        if battery_energy_wh > plant.battery_reserve_wh() {
            if ceiling_limited {
                BatteryState::MaxDischarging
            } else {
                BatteryState::Discharging
            }
        } else {
            BatteryState::Empty
        }
    } else if battery_energy_wh < plant.battery_capacity_wh {
        BatteryState::Charging
    } else {
        BatteryState::Full
    }
}

/// Computes simulated battery, inverter and grid powers from measured inputs.
///
/// Has no time dependency: the same inputs and battery energy always give
/// the same flows.
#[derive(Debug, Clone)]
pub struct PowerBalanceModel {
    plant: PlantConfig,
    policy: DispatchPolicy,
}

impl PowerBalanceModel {
    /// Creates a model for a validated plant configuration.
    ///
    /// # Panics
    ///
    /// Panics if an efficiency is outside `(0, 1]` or capacity is not positive.
    pub fn new(plant: PlantConfig, policy: DispatchPolicy) -> Self {
        assert!(plant.battery_capacity_wh > 0.0);
        for eff in [
            plant.inverter_efficiency,
            plant.charge_controller_efficiency,
            plant.battery_round_trip_efficiency,
        ] {
            assert!(eff > 0.0 && eff <= 1.0);
        }
        Self { plant, policy }
    }

    pub fn plant(&self) -> &PlantConfig {
        &self.plant
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Evaluates the power balance for one instant.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Latest measured grid and solar power
    /// * `battery_energy_wh` - Energy stored in the battery at tick start
    pub fn compute(&self, inputs: &Measurements, battery_energy_wh: f64) -> PowerFlows {
        let plant = &self.plant;
        let grid_w = inputs.grid_power_w;
        let inv_eff = plant.inverter_efficiency;
        let batt_eff = plant.effective_battery_efficiency();

        // Undo the inverter loss baked into the solar reading, then apply the charge controller.
        let sim_solar_w = inputs.solar_power_w.max(0.0) / inv_eff;
        let cc_solar_w = sim_solar_w * plant.charge_controller_efficiency;

        let (desired_out_w, ceiling_limited) = self.policy.desired_output_w(grid_w, plant);
        let required_in_w = desired_out_w / inv_eff;
        let required_battery_w = required_in_w - cc_solar_w;

        let battery_state =
            classify_battery(required_battery_w, battery_energy_wh, ceiling_limited, plant);
        let battery_w = match battery_state {
            BatteryState::Discharging | BatteryState::MaxDischarging => {
                required_battery_w / batt_eff
            }
            BatteryState::Charging => required_battery_w * batt_eff,
            BatteryState::Empty | BatteryState::Full => 0.0,
        };

        let (stat_battery_w, inverter_in_w) = if battery_w < 0.0 {
            (battery_w / batt_eff, cc_solar_w + battery_w / batt_eff)
        } else {
            (
                battery_w * plant.battery_round_trip_efficiency,
                cc_solar_w + battery_w * batt_eff,
            )
        };

        // Ceiling applies to the realised output, after dispatch.
        let inverter_out_w = (inverter_in_w * inv_eff).min(plant.inverter_output_cap_w);

        PowerFlows {
            measured_grid_power_w: grid_w,
            sim_solar_power_w: sim_solar_w,
            charge_controller_power_w: cc_solar_w,
            required_battery_power_w: required_battery_w,
            sim_battery_power_w: battery_w,
            stat_battery_power_w: stat_battery_w,
            inverter_output_w: inverter_out_w,
            sim_grid_power_w: grid_w - inverter_out_w,
            battery_state,
        }
    }
}
