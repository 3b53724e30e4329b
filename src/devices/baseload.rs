use rand::{SeedableRng, rngs::StdRng};

use crate::devices::types::{Device, DeviceContext, gaussian_noise};

/// A house load that stands in for the measured grid import.
///
/// `BaseLoad` creates a sinusoidal demand pattern with configurable baseline,
/// amplitude, phase, and random noise to simulate a typical daily profile.
///
/// # Examples
///
/// ```
/// use energy_sim::devices::baseload::BaseLoad;
///
/// let mut load = BaseLoad::new(
///     600.0, // base_w - average consumption
///     400.0, // amp_w - daily variation
///     0.0,   // phase_rad - no phase shift
///     0.0,   // noise_std_w - no random variation
///     24,    // steps_per_day - hourly resolution
///     42,    // seed - for reproducible randomness
/// );
///
/// let demand = load.demand_w(6);
/// assert!((demand - 1000.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct BaseLoad {
    /// Baseline consumption (W)
    pub base_w: f64,

    /// Amplitude of the sinusoidal variation (W)
    pub amp_w: f64,

    /// Phase offset of the sinusoidal pattern in radians
    pub phase_rad: f64,

    /// Standard deviation of the Gaussian noise (W)
    pub noise_std_w: f64,

    /// Number of time steps per simulated day
    pub steps_per_day: usize,

    rng: StdRng,
}

impl BaseLoad {
    /// Creates a new load generator.
    ///
    /// # Arguments
    ///
    /// * `base_w` - The baseline consumption (W)
    /// * `amp_w` - The amplitude of the sinusoidal daily variation (W)
    /// * `phase_rad` - The phase offset in radians
    /// * `noise_std_w` - The standard deviation of Gaussian noise (W)
    /// * `steps_per_day` - The number of time steps per simulated day
    /// * `seed` - Random seed for reproducible noise generation
    pub fn new(
        base_w: f64,
        amp_w: f64,
        phase_rad: f64,
        noise_std_w: f64,
        steps_per_day: usize,
        seed: u64,
    ) -> Self {
        Self {
            base_w,
            amp_w,
            phase_rad,
            noise_std_w,
            steps_per_day: steps_per_day.max(1),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Demand at a time step, never negative.
    pub fn demand_w(&mut self, timestep: usize) -> f64 {
        let day_pos = (timestep % self.steps_per_day) as f64 / self.steps_per_day as f64; // [0,1)
        let angle = 2.0 * std::f64::consts::PI * day_pos + self.phase_rad;
        let noise = gaussian_noise(&mut self.rng, self.noise_std_w);

        let w = self.base_w + self.amp_w * angle.sin() + noise;
        w.max(0.0) // no negative demand
    }
}

impl Device for BaseLoad {
    fn power_w(&mut self, context: &DeviceContext) -> f64 {
        self.demand_w(context.timestep)
    }

    fn device_type(&self) -> &'static str {
        "BaseLoad"
    }
}
