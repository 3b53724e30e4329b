//! Pub/sub boundary: inbound topic routing and outbound message frames.
//!
//! The broker itself is out of scope. Inbound traffic arrives as
//! `topic payload` lines (the format printed by `mosquitto_sub -v`) and
//! outbound frames go through a [`Publisher`], which a broker client can
//! implement. [`LinePublisher`] writes frames back out in the same line format.

use std::io::{self, Write};
use std::sync::Arc;

use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

use crate::config::TopicConfig;
use crate::measurements::{MeasurementCell, parse_reading};
use crate::sim::types::TickReport;

/// Failure while handing frames to the transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// One outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    /// Ask the broker to keep this as the topic's last value.
    pub retain: bool,
}

impl Message {
    /// A retained message; every frame this simulator emits is retained.
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }
}

/// Sink for outbound messages.
pub trait Publisher {
    /// Hands one message to the transport.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if the message could not be sent.
    fn publish(&mut self, message: &Message) -> Result<(), TransportError>;

    /// Pushes out anything buffered.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if buffered messages could not be written.
    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Writes each message as a `topic payload` line.
pub struct LinePublisher<W: Write> {
    writer: W,
}

impl<W: Write> LinePublisher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl LinePublisher<io::BufWriter<io::Stdout>> {
    /// Line publisher on buffered stdout.
    pub fn stdout() -> Self {
        Self::new(io::BufWriter::new(io::stdout()))
    }
}

impl<W: Write> Publisher for LinePublisher<W> {
    fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
        writeln!(self.writer, "{} {}", message.topic, message.payload)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// What an inbound message did to the measurement cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Delivery {
    GridPower(f64),
    SolarPower(f64),
    /// Persisted battery energy; `accepted` is false once a seed was already taken.
    BatterySeed { battery_energy_wh: f64, accepted: bool },
    /// Payload on the seed topic that is not a number.
    SeedRejected,
    /// Topic this simulator does not listen to.
    Ignored,
}

/// Routes inbound messages into a [`MeasurementCell`].
#[derive(Debug, Clone)]
pub struct Ingest {
    topics: TopicConfig,
    cell: Arc<MeasurementCell>,
}

impl Ingest {
    pub fn new(topics: TopicConfig, cell: Arc<MeasurementCell>) -> Self {
        Self { topics, cell }
    }

    /// Applies one message.
    ///
    /// Unreadable power payloads are stored as 0 and still count as fresh data.
    pub fn deliver(&self, topic: &str, payload: &str) -> Delivery {
        if topic == self.topics.grid_power {
            let watts = self.reading_or_zero(topic, payload);
            self.cell.update_grid_power(watts);
            Delivery::GridPower(watts)
        } else if topic == self.topics.solar_power {
            let mut watts = self.reading_or_zero(topic, payload);
            if watts < 0.0 {
                warn!(topic, watts, "negative solar reading, using 0");
                watts = 0.0;
            }
            self.cell.update_solar_power(watts);
            Delivery::SolarPower(watts)
        } else if topic == self.topics.battery_energy {
            match parse_reading(payload) {
                Ok(battery_energy_wh) => {
                    let accepted = self.cell.offer_battery_seed(battery_energy_wh);
                    if accepted {
                        info!(battery_energy_wh, "battery state received");
                    } else {
                        debug!(battery_energy_wh, "battery state already received, ignoring");
                    }
                    Delivery::BatterySeed {
                        battery_energy_wh,
                        accepted,
                    }
                }
                Err(e) => {
                    warn!(topic, error = %e, "ignoring persisted battery energy");
                    Delivery::SeedRejected
                }
            }
        } else {
            Delivery::Ignored
        }
    }

    /// Splits a `topic payload` line and applies it. Blank lines are skipped.
    pub fn deliver_line(&self, line: &str) -> Option<Delivery> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (topic, payload) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        Some(self.deliver(topic, payload))
    }

    /// Feeds every line of `reader` through [`deliver_line`](Self::deliver_line)
    /// until end of input.
    ///
    /// # Returns
    ///
    /// The number of lines read.
    ///
    /// # Errors
    ///
    /// Returns a `TransportError` if reading fails.
    pub async fn run<R>(self, reader: R) -> Result<u64, TransportError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut count = 0u64;
        while let Some(line) = lines.next_line().await? {
            count += 1;
            if let Some(Delivery::Ignored) = self.deliver_line(&line) {
                debug!(line = %line, "no subscriber for topic");
            }
        }
        info!(lines = count, "input stream closed, keeping last known inputs");
        Ok(count)
    }

    fn reading_or_zero(&self, topic: &str, payload: &str) -> f64 {
        parse_reading(payload).unwrap_or_else(|e| {
            warn!(topic, error = %e, "unreadable power reading, using 0");
            0.0
        })
    }
}

/// Formats a value the way every numeric frame is sent: two decimals.
pub fn format_value(value: f64) -> String {
    format!("{value:.2}")
}

fn prefixed(topics: &TopicConfig, name: &str) -> String {
    format!("{}/{name}", topics.publish_prefix)
}

/// Per-tick power frame.
pub fn power_messages(topics: &TopicConfig, report: &TickReport) -> Vec<Message> {
    let flows = &report.flows;
    [
        ("real-grid-pwr", flows.measured_grid_power_w),
        ("grid-pwr", flows.sim_grid_power_w),
        ("batt-pwr", flows.sim_battery_power_w),
        ("stat-batt-pwr", flows.stat_battery_power_w),
        ("stat-solar-pwr", flows.sim_solar_power_w),
    ]
    .into_iter()
    .map(|(name, value)| Message::retained(prefixed(topics, name), format_value(value)))
    .collect()
}

/// Periodic energy statistics frame.
///
/// Battery energy goes to the topic it is seeded from, so the retained
/// value carries it across restarts.
pub fn stats_messages(topics: &TopicConfig, report: &TickReport) -> Vec<Message> {
    let energy = &report.energy;
    vec![
        Message::retained(prefixed(topics, "solar-wh"), format_value(energy.solar_energy_wh)),
        Message::retained(
            prefixed(topics, "battery-state"),
            report.flows.battery_state.as_str(),
        ),
        Message::retained(
            prefixed(topics, "battery-soc"),
            format_value(report.battery_soc * 100.0),
        ),
        Message::retained(
            topics.battery_energy.clone(),
            format_value(energy.battery_energy_wh),
        ),
        Message::retained(
            prefixed(topics, "battery-in-wh"),
            format_value(energy.battery_in_wh),
        ),
        Message::retained(
            prefixed(topics, "battery-out-wh"),
            format_value(energy.battery_out_wh),
        ),
        Message::retained(prefixed(topics, "in-grid-wh"), format_value(energy.grid_in_wh)),
        Message::retained(prefixed(topics, "out-grid-wh"), format_value(energy.grid_out_wh)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::types::{Measurements, PlantConfig};
    use crate::sim::{DispatchPolicy, Simulation};

    fn ingest() -> (Ingest, Arc<MeasurementCell>) {
        let cell = Arc::new(MeasurementCell::new());
        (Ingest::new(TopicConfig::default(), Arc::clone(&cell)), cell)
    }

    fn report() -> TickReport {
        let mut sim = Simulation::new(
            PlantConfig::default(),
            DispatchPolicy::InverterCeiling,
            8300.0,
        );
        sim.step(Measurements::new(2000.0, 0.0), 1.0)
    }

    #[test]
    fn grid_and_solar_topics_update_cell() {
        let (ingest, cell) = ingest();
        assert_eq!(ingest.deliver("energy/Power", "1523"), Delivery::GridPower(1523.0));
        assert_eq!(
            ingest.deliver("sim-data/Solar-Pwr", "310.5"),
            Delivery::SolarPower(310.5)
        );
        let snap = cell.snapshot();
        assert!(snap.fresh);
        assert_eq!(snap.measurements, Measurements::new(1523.0, 310.5));
    }

    #[test]
    fn nan_payload_becomes_zero_and_is_fresh() {
        let (ingest, cell) = ingest();
        ingest.deliver("energy/Power", "900");
        cell.snapshot();
        assert_eq!(ingest.deliver("energy/Power", "NaN"), Delivery::GridPower(0.0));
        let snap = cell.snapshot();
        assert!(snap.fresh);
        assert_eq!(snap.measurements.grid_power_w, 0.0);
    }

    #[test]
    fn negative_solar_is_stored_as_zero() {
        let (ingest, cell) = ingest();
        assert_eq!(ingest.deliver("sim-data/Solar-Pwr", "-40"), Delivery::SolarPower(0.0));
        let snap = cell.snapshot();
        assert!(snap.fresh);
        assert_eq!(snap.measurements.solar_power_w, 0.0);

        let mut sim = Simulation::new(
            PlantConfig::default(),
            DispatchPolicy::InverterCeiling,
            8300.0,
        );
        let before = sim.energy().solar_energy_wh;
        let r = sim.step(snap.measurements, 10.0);
        assert!(r.flows.sim_solar_power_w >= 0.0);
        assert!(sim.energy().solar_energy_wh >= before);
    }

    #[test]
    fn seed_topic_is_first_writer_wins() {
        let (ingest, cell) = ingest();
        assert_eq!(ingest.deliver("sim-data/battery-wh", "oops"), Delivery::SeedRejected);
        assert_eq!(
            ingest.deliver("sim-data/battery-wh", "8300.00"),
            Delivery::BatterySeed {
                battery_energy_wh: 8300.0,
                accepted: true
            }
        );
        assert_eq!(
            ingest.deliver("sim-data/battery-wh", "10"),
            Delivery::BatterySeed {
                battery_energy_wh: 10.0,
                accepted: false
            }
        );
        assert_eq!(cell.take_battery_seed(), Some(8300.0));
        // seed is not a measurement
        assert!(!cell.snapshot().fresh);
    }

    #[test]
    fn lines_are_split_on_first_whitespace() {
        let (ingest, _cell) = ingest();
        assert_eq!(ingest.deliver_line("   "), None);
        assert_eq!(
            ingest.deliver_line("energy/Power 42"),
            Some(Delivery::GridPower(42.0))
        );
        assert_eq!(
            ingest.deliver_line("energy/Power"),
            Some(Delivery::GridPower(0.0))
        );
        assert_eq!(ingest.deliver_line("other/topic 1"), Some(Delivery::Ignored));
    }

    #[tokio::test]
    async fn run_consumes_until_eof() {
        let (ingest, cell) = ingest();
        let input: &[u8] = b"energy/Power 1200\nsim-data/Solar-Pwr 400\n\nfoo bar\n";
        let count = ingest.run(input).await;
        assert_eq!(count.ok(), Some(4));
        assert_eq!(cell.snapshot().measurements, Measurements::new(1200.0, 400.0));
    }

    #[test]
    fn power_frame_uses_two_decimals() {
        let msgs = power_messages(&TopicConfig::default(), &report());
        let topics: Vec<&str> = msgs.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(
            topics,
            [
                "sim-data/real-grid-pwr",
                "sim-data/grid-pwr",
                "sim-data/batt-pwr",
                "sim-data/stat-batt-pwr",
                "sim-data/stat-solar-pwr",
            ]
        );
        assert_eq!(msgs[0].payload, "2000.00");
        assert_eq!(msgs[1].payload, "1200.00");
        assert!(msgs.iter().all(|m| m.retain));
    }

    #[test]
    fn stats_frame_persists_battery_energy_on_seed_topic() {
        let r = report();
        let msgs = stats_messages(&TopicConfig::default(), &r);
        assert_eq!(msgs.len(), 8);
        let find = |topic: &str| {
            msgs.iter()
                .find(|m| m.topic == topic)
                .map(|m| m.payload.clone())
        };
        assert_eq!(find("sim-data/battery-state").as_deref(), Some("DISCHARGING"));
        assert_eq!(
            find("sim-data/battery-wh"),
            Some(format!("{:.2}", r.energy.battery_energy_wh))
        );
        assert_eq!(
            find("sim-data/battery-soc"),
            Some(format!("{:.2}", r.battery_soc * 100.0))
        );
    }

    #[test]
    fn line_publisher_writes_topic_and_payload() {
        let mut publisher = LinePublisher::new(Vec::new());
        let sent = publisher.publish(&Message::retained("a/b", "1.50"));
        assert!(sent.is_ok());
        assert!(publisher.flush().is_ok());
        assert_eq!(publisher.into_inner(), b"a/b 1.50\n");
    }

    #[test]
    fn format_value_rounds_to_two_places() {
        assert_eq!(format_value(1.005_1), "1.01");
        assert_eq!(format_value(-0.5), "-0.50");
        assert_eq!(format_value(16600.0), "16600.00");
    }
}
