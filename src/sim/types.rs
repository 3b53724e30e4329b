//! Core simulation types: plant parameters, measurements, power flows and energy totals.

use std::fmt;

use serde::Serialize;

/// Fixed electrical parameters of the simulated installation.
///
/// Built once from a validated [`crate::config::SiteConfig`] and never
/// mutated afterwards.
///
/// # Examples
///
/// ```
/// use energy_sim::sim::types::PlantConfig;
///
/// let plant = PlantConfig::default();
/// assert_eq!(plant.battery_capacity_wh, 16_600.0);
/// assert!((plant.effective_battery_efficiency() - 0.92).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantConfig {
    /// Usable battery capacity (Wh).
    pub battery_capacity_wh: f64,
    /// Fraction of capacity below which the battery refuses to discharge.
    pub battery_reserve_fraction: f64,
    /// Battery round-trip efficiency (0..=1).
    pub battery_round_trip_efficiency: f64,
    /// Grid draw the dispatch tries to keep (W).
    pub min_grid_power_w: f64,
    /// Grid reading above which the inverter is no longer asked to follow the load (W).
    pub max_inverter_power_w: f64,
    /// Hard ceiling on realised inverter output (W).
    pub inverter_output_cap_w: f64,
    /// Inverter efficiency (0..=1).
    pub inverter_efficiency: f64,
    /// Solar charge controller efficiency (0..=1).
    pub charge_controller_efficiency: f64,
}

impl Default for PlantConfig {
    fn default() -> Self {
        Self {
            battery_capacity_wh: 16_600.0,
            battery_reserve_fraction: 0.1,
            battery_round_trip_efficiency: 0.84,
            min_grid_power_w: 50.0,
            max_inverter_power_w: 2400.0,
            inverter_output_cap_w: 800.0,
            inverter_efficiency: 0.9,
            charge_controller_efficiency: 0.9,
        }
    }
}

impl PlantConfig {
    /// Round-trip loss split evenly between the charge and discharge legs.
    pub fn effective_battery_efficiency(&self) -> f64 {
        1.0 - (1.0 - self.battery_round_trip_efficiency) / 2.0
    }

    /// Energy at or below which discharging is refused (Wh).
    pub fn battery_reserve_wh(&self) -> f64 {
        self.battery_capacity_wh * self.battery_reserve_fraction
    }
}

/// Latest measured inputs, as handed over by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Measurements {
    /// Measured grid power (W; positive = import).
    pub grid_power_w: f64,
    /// Measured solar yield before conversion losses (W).
    pub solar_power_w: f64,
}

impl Measurements {
    pub fn new(grid_power_w: f64, solar_power_w: f64) -> Self {
        Self {
            grid_power_w,
            solar_power_w,
        }
    }
}

/// Discrete battery state, derived every tick and never stored independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatteryState {
    Charging,
    Discharging,
    Full,
    Empty,
    /// Discharging, with the requested output cut back to the inverter ceiling.
    MaxDischarging,
}

impl BatteryState {
    /// Label used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Charging => "CHARGING",
            Self::Discharging => "DISCHARGING",
            Self::Full => "FULL",
            Self::Empty => "EMPTY",
            Self::MaxDischarging => "MAX_DISCHARGING",
        }
    }
}

impl fmt::Display for BatteryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instantaneous powers produced by the power-balance model for one tick.
///
/// Battery sign convention: positive = discharging, negative = charging.
/// Grid sign convention: positive = import, negative = export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerFlows {
    /// Grid power as measured (W).
    pub measured_grid_power_w: f64,
    /// Solar power as inverter-input equivalent, before charge-controller losses (W).
    pub sim_solar_power_w: f64,
    /// Solar power after the charge controller (W).
    pub charge_controller_power_w: f64,
    /// Battery power the dispatch asked for, before the state machine (W).
    pub required_battery_power_w: f64,
    /// Battery power actually drawn or stored (W).
    pub sim_battery_power_w: f64,
    /// Battery power adjusted for conversion losses, for reporting (W).
    pub stat_battery_power_w: f64,
    /// Realised inverter output after the ceiling (W).
    pub inverter_output_w: f64,
    /// Grid power with the simulated installation in place (W).
    pub sim_grid_power_w: f64,
    pub battery_state: BatteryState,
}

/// Cumulative energy totals plus stored battery energy.
///
/// All counters are non-decreasing for the process lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyState {
    /// Energy currently stored in the battery (Wh).
    pub battery_energy_wh: f64,
    /// Solar energy delivered through the inverter (Wh).
    pub solar_energy_wh: f64,
    /// Energy put into the battery (Wh).
    pub battery_in_wh: f64,
    /// Energy taken out of the battery (Wh).
    pub battery_out_wh: f64,
    /// Energy imported from the grid (Wh).
    pub grid_in_wh: f64,
    /// Energy exported to the grid (Wh).
    pub grid_out_wh: f64,
}

impl EnergyState {
    /// Starts all counters at zero with the given stored energy.
    pub fn with_battery_energy(battery_energy_wh: f64) -> Self {
        Self {
            battery_energy_wh,
            ..Self::default()
        }
    }

    /// State of charge as a fraction of `capacity_wh`.
    pub fn soc(&self, capacity_wh: f64) -> f64 {
        self.battery_energy_wh / capacity_wh
    }
}

/// Everything one tick produced, committed at tick end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickReport {
    /// Tick index since startup.
    pub tick: u64,
    /// Elapsed time integrated by this tick (s).
    pub dt_secs: f64,
    /// Inputs the tick was computed from.
    pub measurements: Measurements,
    pub flows: PowerFlows,
    pub energy: EnergyState,
    /// State of charge after this tick (0.0 to 1.0).
    pub battery_soc: f64,
    /// Amount the battery energy had to be clamped back into range (Wh).
    pub overshoot_wh: f64,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick={:>6} dt={:.3}s | grid={:>8.2} W -> {:>8.2} W | solar={:>8.2} W \
             | batt={:>8.2} W {} (SoC={:.2}%) | inv={:>7.2} W",
            self.tick,
            self.dt_secs,
            self.measurements.grid_power_w,
            self.flows.sim_grid_power_w,
            self.flows.sim_solar_power_w,
            self.flows.sim_battery_power_w,
            self.flows.battery_state,
            self.battery_soc * 100.0,
            self.flows.inverter_output_w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_plant_matches_reference_installation() {
        let plant = PlantConfig::default();
        assert_eq!(plant.min_grid_power_w, 50.0);
        assert_eq!(plant.max_inverter_power_w, 2400.0);
        assert_eq!(plant.inverter_output_cap_w, 800.0);
        assert!((plant.battery_reserve_wh() - 1660.0).abs() < 1e-9);
    }

    #[test]
    fn effective_efficiency_splits_round_trip_loss() {
        let plant = PlantConfig {
            battery_round_trip_efficiency: 0.8,
            ..PlantConfig::default()
        };
        assert!((plant.effective_battery_efficiency() - 0.9).abs() < 1e-12);
    }

    #[test]
    fn battery_state_labels() {
        assert_eq!(BatteryState::Charging.to_string(), "CHARGING");
        assert_eq!(BatteryState::MaxDischarging.as_str(), "MAX_DISCHARGING");
        assert_eq!(format!("{}", BatteryState::Empty), "EMPTY");
    }

    #[test]
    fn soc_is_energy_over_capacity() {
        let energy = EnergyState::with_battery_energy(8300.0);
        assert!((energy.soc(16_600.0) - 0.5).abs() < 1e-12);
        assert_eq!(energy.solar_energy_wh, 0.0);
    }
}
