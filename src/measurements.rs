//! Hand-off cell between the ingest side and the tick loop.
//!
//! The transport writes the latest readings whenever they arrive; the tick
//! loop takes one consistent snapshot at tick start and never waits for
//! new data. Stale values are valid input.

use parking_lot::Mutex;
use thiserror::Error;

use crate::sim::types::Measurements;

/// A measurement payload that could not be turned into a finite number.
#[derive(Debug, Error, PartialEq)]
pub enum MeasurementError {
    #[error("payload is NaN")]
    NotANumber,
    #[error("payload {0:?} is not a number")]
    Invalid(String),
}

/// Parses a power or energy payload.
///
/// Accepts any decimal or integer text with surrounding whitespace.
///
/// # Errors
///
/// Returns [`MeasurementError::NotANumber`] for `NaN` (or any non-finite
/// value) and [`MeasurementError::Invalid`] for unparsable text.
pub fn parse_reading(payload: &str) -> Result<f64, MeasurementError> {
    let text = payload.trim();
    let value: f64 = text
        .parse()
        .map_err(|_| MeasurementError::Invalid(text.to_string()))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(MeasurementError::NotANumber)
    }
}

/// Inputs as seen by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub measurements: Measurements,
    /// Whether any reading arrived since the previous snapshot.
    pub fresh: bool,
}

#[derive(Debug, Default)]
struct Inner {
    measurements: Measurements,
    fresh: bool,
    seed: Option<f64>,
    seed_offered: bool,
}

/// Single-writer/single-reader snapshot cell for measured inputs.
#[derive(Debug, Default)]
pub struct MeasurementCell {
    inner: Mutex<Inner>,
}

impl MeasurementCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a grid reading and marks the data fresh. Non-finite values become 0.
    pub fn update_grid_power(&self, watts: f64) {
        let mut inner = self.inner.lock();
        inner.measurements.grid_power_w = finite_or_zero(watts);
        inner.fresh = true;
    }

    /// Stores a solar reading and marks the data fresh. Non-finite and
    /// negative values become 0.
    pub fn update_solar_power(&self, watts: f64) {
        let mut inner = self.inner.lock();
        inner.measurements.solar_power_w = finite_or_zero(watts).max(0.0);
        inner.fresh = true;
    }

    /// Stores both readings at once.
    pub fn update(&self, measurements: Measurements) {
        let mut inner = self.inner.lock();
        inner.measurements = Measurements::new(
            finite_or_zero(measurements.grid_power_w),
            finite_or_zero(measurements.solar_power_w).max(0.0),
        );
        inner.fresh = true;
    }

    /// Offers the persisted battery energy. Only the first offer is kept.
    ///
    /// # Returns
    ///
    /// `true` if this offer was accepted.
    pub fn offer_battery_seed(&self, battery_energy_wh: f64) -> bool {
        let mut inner = self.inner.lock();
        if inner.seed_offered || !battery_energy_wh.is_finite() {
            return false;
        }
        inner.seed = Some(battery_energy_wh);
        inner.seed_offered = true;
        true
    }

    /// Takes the accepted battery seed, if it has not been taken yet.
    pub fn take_battery_seed(&self) -> Option<f64> {
        self.inner.lock().seed.take()
    }

    /// Reads the latest inputs and clears the fresh flag.
    pub fn snapshot(&self) -> Snapshot {
        let mut inner = self.inner.lock();
        let snapshot = Snapshot {
            measurements: inner.measurements,
            fresh: inner.fresh,
        };
        inner.fresh = false;
        snapshot
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_integers_and_decimals() {
        assert_eq!(parse_reading("1234"), Ok(1234.0));
        assert_eq!(parse_reading(" -56.5\n"), Ok(-56.5));
    }

    #[test]
    fn nan_and_garbage_are_rejected() {
        assert_eq!(parse_reading("NaN"), Err(MeasurementError::NotANumber));
        assert_eq!(parse_reading("inf"), Err(MeasurementError::NotANumber));
        assert_eq!(
            parse_reading("twelve"),
            Err(MeasurementError::Invalid("twelve".to_string()))
        );
    }

    #[test]
    fn snapshot_clears_fresh_flag_but_keeps_values() {
        let cell = MeasurementCell::new();
        assert!(!cell.snapshot().fresh);

        cell.update_grid_power(1500.0);
        cell.update_solar_power(300.0);
        let first = cell.snapshot();
        assert!(first.fresh);
        assert_eq!(first.measurements, Measurements::new(1500.0, 300.0));

        let second = cell.snapshot();
        assert!(!second.fresh);
        assert_eq!(second.measurements, first.measurements);
    }

    #[test]
    fn non_finite_readings_become_zero() {
        let cell = MeasurementCell::new();
        cell.update_grid_power(f64::NAN);
        cell.update_solar_power(f64::INFINITY);
        let snap = cell.snapshot();
        assert!(snap.fresh);
        assert_eq!(snap.measurements, Measurements::default());
    }

    #[test]
    fn solar_never_goes_negative() {
        let cell = MeasurementCell::new();
        cell.update_solar_power(-40.0);
        assert_eq!(cell.snapshot().measurements.solar_power_w, 0.0);
        cell.update(Measurements::new(-300.0, -5.0));
        // grid may export, solar may not
        assert_eq!(cell.snapshot().measurements, Measurements::new(-300.0, 0.0));
    }

    #[test]
    fn battery_seed_is_first_writer_wins() {
        let cell = MeasurementCell::new();
        assert!(cell.offer_battery_seed(8300.0));
        assert!(!cell.offer_battery_seed(100.0));
        assert_eq!(cell.take_battery_seed(), Some(8300.0));
        assert_eq!(cell.take_battery_seed(), None);
        // still closed after being taken
        assert!(!cell.offer_battery_seed(42.0));
    }
}
