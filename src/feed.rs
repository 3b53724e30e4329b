//! Synthetic measurement feed: a seeded solar array and house load writing
//! into the measurement cell, for running without a broker.

use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::SyntheticConfig;
use crate::devices::{BaseLoad, Device, DeviceContext, SolarPv};
use crate::measurements::MeasurementCell;
use crate::sim::types::Measurements;

/// Generates grid and solar readings from the configured profiles.
///
/// The grid reading is the house load alone, i.e. what the meter would show
/// before the simulated installation is added.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    solar: SolarPv,
    load: BaseLoad,
    step: usize,
    config: SyntheticConfig,
}

impl SyntheticFeed {
    /// Builds the feed from a validated configuration.
    ///
    /// # Panics
    ///
    /// Panics if the sunrise/sunset indices are inconsistent (see [`SolarPv::new`]).
    pub fn new(config: &SyntheticConfig) -> Self {
        let solar = SolarPv::new(
            config.solar_peak_w,
            config.steps_per_day,
            config.sunrise_idx,
            config.sunset_idx,
            config.solar_noise_std,
            config.seed,
        );
        let load = BaseLoad::new(
            config.base_load_w,
            config.load_amp_w,
            1.2, /* phase_rad: evening peak */
            config.load_noise_std_w,
            config.steps_per_day,
            config.seed.wrapping_add(1),
        );
        Self {
            solar,
            load,
            step: 0,
            config: config.clone(),
        }
    }

    /// Starts the synthetic day at `step` instead of midnight.
    pub fn starting_at(mut self, step: usize) -> Self {
        self.step = step;
        self
    }

    /// Produces the next pair of readings.
    pub fn next_sample(&mut self) -> Measurements {
        let context = DeviceContext::new(self.step);
        let solar = self.solar.power_w(&context);
        let grid = self.load.power_w(&context);
        self.step = self.step.wrapping_add(1);
        Measurements::new(grid, solar)
    }

    /// Pushes one sample into `cell` every configured period. Never returns;
    /// stop it by dropping or aborting the task.
    pub async fn run(mut self, cell: Arc<MeasurementCell>) {
        let mut interval = time::interval(self.config.period());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            period_ms = self.config.period_ms,
            steps_per_day = self.config.steps_per_day,
            seed = self.config.seed,
            "synthetic feed started"
        );
        loop {
            interval.tick().await;
            let sample = self.next_sample();
            debug!(
                grid_w = sample.grid_power_w,
                solar_w = sample.solar_power_w,
                "synthetic sample"
            );
            cell.update(sample);
        }
    }
}
