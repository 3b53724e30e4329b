use crate::devices::types::{Device, DeviceContext, daylight_frac, gaussian_noise};
use rand::{SeedableRng, rngs::StdRng};

/// A solar array that stands in for the measured solar yield.
///
/// `SolarPv` creates a half-cosine shaped generation profile between sunrise
/// and sunset with a configurable peak and multiplicative noise to mimic
/// passing clouds. Output is positive watts, never below zero.
#[derive(Debug, Clone)]
pub struct SolarPv {
    /// Output under ideal conditions at solar noon (W).
    pub peak_w: f64,

    /// Number of time steps per simulated day.
    steps_per_day: usize,

    /// Time step index when sunrise occurs (inclusive).
    pub sunrise_idx: usize,

    /// Time step index when sunset occurs (exclusive).
    pub sunset_idx: usize,

    /// Standard deviation of the Gaussian noise as a fraction of output.
    pub noise_std: f64,

    rng: StdRng,
}

impl SolarPv {
    /// Creates a new solar source.
    ///
    /// # Arguments
    ///
    /// * `peak_w` - Output under ideal conditions (W)
    /// * `steps_per_day` - Samples per simulated day
    /// * `sunrise_idx` - Time step index when sunrise occurs (inclusive)
    /// * `sunset_idx` - Time step index when sunset occurs (exclusive)
    /// * `noise_std` - Relative noise (e.g., 0.05 for +/-5% variation)
    /// * `seed` - Random seed for reproducible noise generation
    ///
    /// # Panics
    ///
    /// Panics if `sunrise_idx >= sunset_idx` or `sunset_idx > steps_per_day`.
    pub fn new(
        peak_w: f64,
        steps_per_day: usize,
        sunrise_idx: usize,
        sunset_idx: usize,
        noise_std: f64,
        seed: u64,
    ) -> Self {
        assert!(sunrise_idx < sunset_idx && sunset_idx <= steps_per_day);
        Self {
            peak_w: peak_w.max(0.0),
            steps_per_day,
            sunrise_idx,
            sunset_idx,
            noise_std: noise_std.max(0.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn daylight_frac(&self, t: usize) -> f64 {
        daylight_frac(t, self.steps_per_day, self.sunrise_idx, self.sunset_idx)
    }
}

impl Device for SolarPv {
    fn power_w(&mut self, context: &DeviceContext) -> f64 {
        let frac = self.daylight_frac(context.timestep);
        if frac <= 0.0 {
            return 0.0;
        }

        let noise_mult = 1.0 + gaussian_noise(&mut self.rng, self.noise_std);
        (self.peak_w * frac * noise_mult).max(0.0)
    }

    fn device_type(&self) -> &'static str {
        "SolarPV"
    }
}
