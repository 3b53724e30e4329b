//! TOML-based site configuration and preset definitions.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::sim::DispatchPolicy;
use crate::sim::types::PlantConfig;

/// Top-level site configuration parsed from TOML.
///
/// All fields have defaults matching the reference installation. Load from
/// TOML with [`SiteConfig::from_toml_file`] or use [`SiteConfig::baseline`]
/// for the built-in default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Battery storage parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Inverter and charge controller parameters.
    #[serde(default)]
    pub inverter: InverterConfig,
    /// Grid connection parameters.
    #[serde(default)]
    pub grid: GridConfig,
    /// Tick loop timing and dispatch policy.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Topic names for inbound and outbound messages.
    #[serde(default)]
    pub topics: TopicConfig,
    /// Parameters of the built-in synthetic measurement feed.
    #[serde(default)]
    pub synthetic: SyntheticConfig,
}

/// Battery storage parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Usable capacity (Wh).
    pub capacity_wh: f64,
    /// Round-trip efficiency (0.0–1.0].
    pub round_trip_efficiency: f64,
    /// Fraction of capacity kept in reserve (no discharge at or below it).
    pub reserve_fraction: f64,
    /// Stored energy until a persisted value is received (Wh).
    pub initial_energy_wh: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_wh: 16_600.0,
            round_trip_efficiency: 0.84,
            reserve_fraction: 0.1,
            initial_energy_wh: 0.0,
        }
    }
}

/// Inverter and charge controller parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InverterConfig {
    /// Grid reading above which the inverter stops following the load (W).
    pub max_power_w: f64,
    /// Ceiling on realised inverter output (W).
    pub output_cap_w: f64,
    /// Inverter efficiency (0.0–1.0].
    pub efficiency: f64,
    /// Solar charge controller efficiency (0.0–1.0].
    pub charge_controller_efficiency: f64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            max_power_w: 2400.0,
            output_cap_w: 800.0,
            efficiency: 0.9,
            charge_controller_efficiency: 0.9,
        }
    }
}

/// Grid connection parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Minimum grid draw the dispatch tries to keep (W).
    pub min_power_w: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { min_power_w: 50.0 }
    }
}

/// Tick loop timing and dispatch policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Target tick period (ms).
    pub tick_ms: u64,
    /// Period of the energy statistics frame (s).
    pub stats_interval_s: u64,
    /// Period of the loop heartbeat log line (s).
    pub heartbeat_interval_s: u64,
    /// Dispatch policy: `"inverter_ceiling"` or `"ceiling_limited"`.
    pub dispatch_policy: DispatchPolicy,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            stats_interval_s: 10,
            heartbeat_interval_s: 60,
            dispatch_policy: DispatchPolicy::InverterCeiling,
        }
    }
}

impl SimulationConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_s)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_s)
    }
}

/// Topic names for inbound and outbound messages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TopicConfig {
    /// Inbound measured grid power.
    pub grid_power: String,
    /// Inbound measured solar power.
    pub solar_power: String,
    /// Persisted battery energy: read once at startup, republished with the statistics.
    pub battery_energy: String,
    /// Prefix for every other outbound topic.
    pub publish_prefix: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            grid_power: "energy/Power".to_string(),
            solar_power: "sim-data/Solar-Pwr".to_string(),
            battery_energy: "sim-data/battery-wh".to_string(),
            publish_prefix: "sim-data".to_string(),
        }
    }
}

/// Parameters of the built-in synthetic measurement feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyntheticConfig {
    /// Period between generated readings (ms).
    pub period_ms: u64,
    /// Samples per simulated day.
    pub steps_per_day: usize,
    /// Master random seed.
    pub seed: u64,
    /// Peak solar yield (W).
    pub solar_peak_w: f64,
    /// Sunrise step (inclusive).
    pub sunrise_idx: usize,
    /// Sunset step (exclusive).
    pub sunset_idx: usize,
    /// Relative solar noise standard deviation.
    pub solar_noise_std: f64,
    /// Mean house load (W).
    pub base_load_w: f64,
    /// Daily load swing amplitude (W).
    pub load_amp_w: f64,
    /// Load noise standard deviation (W).
    pub load_noise_std_w: f64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            period_ms: 1000,
            steps_per_day: 1440,
            seed: 42,
            solar_peak_w: 1600.0,
            sunrise_idx: 360,
            sunset_idx: 1080,
            solar_noise_std: 0.05,
            base_load_w: 600.0,
            load_amp_w: 400.0,
            load_noise_std_w: 40.0,
        }
    }
}

impl SyntheticConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_wh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl SiteConfig {
    /// Returns the reference installation.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the reference installation with ceiling-limited dispatch.
    pub fn ceiling_limited() -> Self {
        Self {
            simulation: SimulationConfig {
                dispatch_policy: DispatchPolicy::CeilingLimited,
                ..SimulationConfig::default()
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["default", "ceiling_limited"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" => Ok(Self::baseline()),
            "ceiling_limited" => Ok(Self::ceiling_limited()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Plant parameters for the simulation engine.
    pub fn plant(&self) -> PlantConfig {
        PlantConfig {
            battery_capacity_wh: self.battery.capacity_wh,
            battery_reserve_fraction: self.battery.reserve_fraction,
            battery_round_trip_efficiency: self.battery.round_trip_efficiency,
            min_grid_power_w: self.grid.min_power_w,
            max_inverter_power_w: self.inverter.max_power_w,
            inverter_output_cap_w: self.inverter.output_cap_w,
            inverter_efficiency: self.inverter.efficiency,
            charge_controller_efficiency: self.inverter.charge_controller_efficiency,
        }
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let bat = &self.battery;
        if !(bat.capacity_wh > 0.0 && bat.capacity_wh.is_finite()) {
            errors.push(ConfigError::new("battery.capacity_wh", "must be > 0"));
        }
        check_efficiency(
            &mut errors,
            "battery.round_trip_efficiency",
            bat.round_trip_efficiency,
        );
        if !(0.0..1.0).contains(&bat.reserve_fraction) {
            errors.push(ConfigError::new(
                "battery.reserve_fraction",
                "must be in [0.0, 1.0)",
            ));
        }
        if !(bat.initial_energy_wh >= 0.0 && bat.initial_energy_wh <= bat.capacity_wh) {
            errors.push(ConfigError::new(
                "battery.initial_energy_wh",
                "must be in [0, battery.capacity_wh]",
            ));
        }

        let inv = &self.inverter;
        check_efficiency(&mut errors, "inverter.efficiency", inv.efficiency);
        check_efficiency(
            &mut errors,
            "inverter.charge_controller_efficiency",
            inv.charge_controller_efficiency,
        );
        if !(inv.max_power_w > 0.0) {
            errors.push(ConfigError::new("inverter.max_power_w", "must be > 0"));
        }
        if !(inv.output_cap_w > 0.0) {
            errors.push(ConfigError::new("inverter.output_cap_w", "must be > 0"));
        }

        if !(self.grid.min_power_w >= 0.0) {
            errors.push(ConfigError::new("grid.min_power_w", "must be >= 0"));
        }

        let sim = &self.simulation;
        if sim.tick_ms == 0 {
            errors.push(ConfigError::new("simulation.tick_ms", "must be > 0"));
        }
        if sim.stats_interval_s == 0 {
            errors.push(ConfigError::new("simulation.stats_interval_s", "must be > 0"));
        }
        if sim.heartbeat_interval_s == 0 {
            errors.push(ConfigError::new(
                "simulation.heartbeat_interval_s",
                "must be > 0",
            ));
        }

        let t = &self.topics;
        for (field, value) in [
            ("topics.grid_power", &t.grid_power),
            ("topics.solar_power", &t.solar_power),
            ("topics.battery_energy", &t.battery_energy),
            ("topics.publish_prefix", &t.publish_prefix),
        ] {
            if value.trim().is_empty() || value.contains(char::is_whitespace) {
                errors.push(ConfigError::new(
                    field,
                    "must be non-empty and contain no whitespace",
                ));
            }
        }

        let syn = &self.synthetic;
        if syn.period_ms == 0 {
            errors.push(ConfigError::new("synthetic.period_ms", "must be > 0"));
        }
        if syn.steps_per_day == 0 {
            errors.push(ConfigError::new("synthetic.steps_per_day", "must be > 0"));
        }
        if syn.sunrise_idx >= syn.sunset_idx {
            errors.push(ConfigError::new(
                "synthetic.sunrise_idx",
                "must be < synthetic.sunset_idx",
            ));
        }
        if syn.steps_per_day > 0 && syn.sunset_idx > syn.steps_per_day {
            errors.push(ConfigError::new(
                "synthetic.sunset_idx",
                "must be <= synthetic.steps_per_day",
            ));
        }

        errors
    }
}

fn check_efficiency(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
    }
}
