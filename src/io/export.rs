//! CSV export of per-tick simulation reports.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::sim::types::TickReport;

/// Column header for per-tick CSV telemetry.
const HEADER: &str = "tick,dt_s,measured_grid_w,measured_solar_w,sim_solar_w,\
                       sim_battery_w,stat_battery_w,inverter_w,sim_grid_w,\
                       battery_state,battery_wh,battery_soc,solar_wh,\
                       battery_in_wh,battery_out_wh,grid_in_wh,grid_out_wh,overshoot_wh";

/// Streams tick reports as CSV rows.
///
/// The header is written on construction. Rows are buffered by the
/// underlying writer until [`flush`](Self::flush) is called.
pub struct TelemetryWriter<W: Write> {
    wtr: csv::Writer<W>,
    rows: u64,
}

impl TelemetryWriter<Box<dyn Write + Send>> {
    /// Creates (or truncates) a buffered CSV file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if file creation or writing the header fails.
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = File::create(path)?;
        Self::new(Box::new(io::BufWriter::new(file)))
    }
}

impl<W: Write> TelemetryWriter<W> {
    /// Wraps any writer and emits the header row.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing the header fails.
    pub fn new(writer: W) -> io::Result<Self> {
        let mut wtr = csv::WriterBuilder::new().from_writer(writer);
        wtr.write_record(HEADER.split(',').map(str::trim))?;
        Ok(Self { wtr, rows: 0 })
    }

    /// Appends one row.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if writing fails.
    pub fn write_report(&mut self, r: &TickReport) -> io::Result<()> {
        let f = &r.flows;
        let e = &r.energy;
        self.wtr.write_record(&[
            r.tick.to_string(),
            format!("{:.3}", r.dt_secs),
            format!("{:.2}", r.measurements.grid_power_w),
            format!("{:.2}", r.measurements.solar_power_w),
            format!("{:.4}", f.sim_solar_power_w),
            format!("{:.4}", f.sim_battery_power_w),
            format!("{:.4}", f.stat_battery_power_w),
            format!("{:.4}", f.inverter_output_w),
            format!("{:.4}", f.sim_grid_power_w),
            f.battery_state.as_str().to_string(),
            format!("{:.4}", e.battery_energy_wh),
            format!("{:.6}", r.battery_soc),
            format!("{:.4}", e.solar_energy_wh),
            format!("{:.4}", e.battery_in_wh),
            format!("{:.4}", e.battery_out_wh),
            format!("{:.4}", e.grid_in_wh),
            format!("{:.4}", e.grid_out_wh),
            format!("{:.4}", r.overshoot_wh),
        ])?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Flushes buffered rows to the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if flushing fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.wtr.flush()
    }

    /// Flushes and returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns an `io::Error` if the final flush fails.
    pub fn into_inner(self) -> io::Result<W> {
        self.wtr.into_inner().map_err(|e| e.into_error())
    }
}

/// Writes a complete set of reports as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(reports: &[TickReport], writer: impl Write) -> io::Result<()> {
    let mut telemetry = TelemetryWriter::new(writer)?;
    for r in reports {
        telemetry.write_report(r)?;
    }
    telemetry.flush()
}
