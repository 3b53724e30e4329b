//! Common types and helpers for synthetic measurement sources.

use rand::{Rng, rngs::StdRng};

/// Position of a sample within the synthetic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceContext {
    pub timestep: usize,
}

impl DeviceContext {
    pub fn new(timestep: usize) -> Self {
        Self { timestep }
    }
}

/// A source of one synthetic power reading per timestep.
pub trait Device {
    /// Returns the reading at the given timestep in watts.
    ///
    /// Readings use the sign convention of the meter they stand in for:
    /// solar yield is positive, grid import is positive.
    fn power_w(&mut self, context: &DeviceContext) -> f64;

    /// Returns a human-readable type name for the device.
    fn device_type(&self) -> &'static str;
}

/// Gaussian noise via the Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and the given
/// standard deviation, or 0 when `std_dev` is not positive.
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Half-cosine daylight shape: 0 outside `[sunrise_idx, sunset_idx)`, peaking
/// at 1 halfway between.
pub fn daylight_frac(t: usize, steps_per_day: usize, sunrise_idx: usize, sunset_idx: usize) -> f64 {
    let t = t % steps_per_day.max(1);
    if t < sunrise_idx || t >= sunset_idx {
        return 0.0;
    }
    let span = (sunset_idx - sunrise_idx) as f64;
    let pos = (t - sunrise_idx) as f64 / span;
    (std::f64::consts::PI * pos).sin().max(0.0)
}
