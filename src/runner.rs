//! Fixed-cadence tick loop tying the measurement cell, the simulation and
//! the publisher together.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{SimulationConfig, TopicConfig};
use crate::io::export::TelemetryWriter;
use crate::measurements::MeasurementCell;
use crate::sim::Simulation;
use crate::sim::clock::{Cadence, TickClock};
use crate::sim::types::{EnergyState, TickReport};
use crate::transport::{Message, Publisher, power_messages, stats_messages};

/// Latest tick report, shared with read-only observers such as the status API.
pub type SharedStatus = Arc<RwLock<Option<TickReport>>>;

/// Boxed CSV sink used for per-tick telemetry.
pub type TelemetrySink = TelemetryWriter<Box<dyn Write + Send>>;

/// Counters collected over one run of the loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub ticks: u64,
    /// Ticks that started more than two periods after the previous one, or
    /// whose own processing took longer than a period.
    pub overruns: u64,
    pub messages_published: u64,
    pub publish_failures: u64,
    pub telemetry_rows: u64,
    pub final_energy: EnergyState,
}

/// Drives the simulation once per tick.
///
/// Each tick takes one snapshot of the inputs, steps the simulation over the
/// elapsed wall-clock time, publishes the power frame if new data arrived,
/// and publishes the statistics frame when its interval has passed.
pub struct Runner<P: Publisher> {
    sim: Simulation,
    cell: Arc<MeasurementCell>,
    topics: TopicConfig,
    publisher: P,
    tick_period: Duration,
    clock: TickClock,
    stats: Cadence,
    heartbeat: Cadence,
    telemetry: Option<TelemetrySink>,
    status: Option<SharedStatus>,
    last_report: Option<TickReport>,
    /// Whether the current tick already counted as an overrun.
    overrun_counted: bool,
    summary: RunSummary,
}

impl<P: Publisher> Runner<P> {
    /// Creates a runner whose first tick is measured from `start`.
    pub fn new(
        sim: Simulation,
        cell: Arc<MeasurementCell>,
        topics: TopicConfig,
        timing: &SimulationConfig,
        publisher: P,
        start: Instant,
    ) -> Self {
        Self {
            sim,
            cell,
            topics,
            publisher,
            tick_period: timing.tick_period(),
            clock: TickClock::new(start),
            stats: Cadence::new(timing.stats_interval(), start),
            heartbeat: Cadence::new(timing.heartbeat_interval(), start),
            telemetry: None,
            status: None,
            last_report: None,
            overrun_counted: false,
            summary: RunSummary::default(),
        }
    }

    /// Writes one CSV row per tick to `telemetry`.
    pub fn with_telemetry(mut self, telemetry: TelemetrySink) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Mirrors every tick report into `status`.
    pub fn with_status(mut self, status: SharedStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn last_report(&self) -> Option<&TickReport> {
        self.last_report.as_ref()
    }

    /// Runs one tick at `now`.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let (_, elapsed) = self.clock.lap(now);
        self.overrun_counted = elapsed > self.tick_period * 2;
        if self.overrun_counted {
            self.summary.overruns += 1;
            warn!(
                elapsed_ms = elapsed.as_millis() as u64,
                period_ms = self.tick_period.as_millis() as u64,
                "tick started late"
            );
        }

        if let Some(seed) = self.cell.take_battery_seed() {
            self.sim.seed_battery_energy(seed);
        }

        let snapshot = self.cell.snapshot();
        let report = self.sim.step(snapshot.measurements, elapsed.as_secs_f64());
        debug!(%report, fresh = snapshot.fresh, "tick");

        let mut published = false;
        if snapshot.fresh {
            let frame = power_messages(&self.topics, &report);
            self.publish_all(&frame);
            published = true;
        }
        if self.stats.due(now) {
            let frame = stats_messages(&self.topics, &report);
            self.publish_all(&frame);
            published = true;
        }
        if published {
            self.flush_publisher();
        }

        if self.heartbeat.due(now) {
            info!(
                ticks = self.clock.ticks(),
                cycle_ms = elapsed.as_millis() as u64,
                soc_pct = report.battery_soc * 100.0,
                state = %report.flows.battery_state,
                "in loop"
            );
        }

        self.record(&report);
        self.last_report = Some(report);
        report
    }

    /// Drives ticks from a tokio interval until `shutdown` resolves, then
    /// publishes a final statistics frame and flushes every sink.
    ///
    /// A late tick is followed by the next one immediately; missed ticks are
    /// not replayed, the next tick integrates the longer interval instead.
    pub async fn run_until<F>(mut self, shutdown: F) -> RunSummary
    where
        F: Future<Output = ()>,
    {
        let mut interval = time::interval(self.tick_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            period_ms = self.tick_period.as_millis() as u64,
            policy = ?self.sim.policy(),
            battery_wh = self.sim.energy().battery_energy_wh,
            "tick loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => break,
                _ = interval.tick() => {
                    let started = Instant::now();
                    self.tick(started);
                    self.end_cycle(started.elapsed());
                }
            }
        }

        self.finish()
    }

    /// Records how long the last tick took to process. A tick that ran longer
    /// than the period is an overrun, counted once even if it also started late.
    pub fn end_cycle(&mut self, busy: Duration) {
        if busy <= self.tick_period {
            return;
        }
        warn!(cycle_ms = busy.as_millis() as u64, "cycle time exceeded");
        if !self.overrun_counted {
            self.summary.overruns += 1;
            self.overrun_counted = true;
        }
    }

    /// Publishes the final statistics frame, flushes the publisher and the
    /// telemetry sink, and returns the run counters.
    pub fn finish(mut self) -> RunSummary {
        if let Some(report) = self.last_report {
            let frame = stats_messages(&self.topics, &report);
            self.publish_all(&frame);
        }
        self.flush_publisher();
        if let Some(telemetry) = self.telemetry.as_mut() {
            if let Err(e) = telemetry.flush() {
                warn!(error = %e, "telemetry flush failed");
            }
        }

        self.summary.ticks = self.clock.ticks();
        self.summary.final_energy = *self.sim.energy();
        info!(
            ticks = self.summary.ticks,
            published = self.summary.messages_published,
            battery_wh = self.summary.final_energy.battery_energy_wh,
            "tick loop stopped"
        );
        self.summary
    }

    fn publish_all(&mut self, frame: &[Message]) {
        for message in frame {
            match self.publisher.publish(message) {
                Ok(()) => self.summary.messages_published += 1,
                Err(e) => {
                    self.summary.publish_failures += 1;
                    warn!(topic = %message.topic, error = %e, "publish failed");
                }
            }
        }
    }

    fn flush_publisher(&mut self) {
        if let Err(e) = self.publisher.flush() {
            warn!(error = %e, "publisher flush failed");
        }
    }

    fn record(&mut self, report: &TickReport) {
        if let Some(telemetry) = self.telemetry.as_mut() {
            match telemetry.write_report(report) {
                Ok(()) => self.summary.telemetry_rows += 1,
                Err(e) => {
                    warn!(error = %e, "telemetry write failed, disabling telemetry");
                    self.telemetry = None;
                }
            }
        }
        if let Some(status) = &self.status {
            *status.write() = Some(*report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::DispatchPolicy;
    use crate::sim::types::{Measurements, PlantConfig};
    use crate::transport::TransportError;

    #[derive(Default)]
    struct Recorder {
        sent: Vec<Message>,
        fail: bool,
    }

    impl Publisher for Recorder {
        fn publish(&mut self, message: &Message) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Io(std::io::ErrorKind::BrokenPipe.into()));
            }
            self.sent.push(message.clone());
            Ok(())
        }
    }

    fn runner(cell: &Arc<MeasurementCell>, start: Instant) -> Runner<Recorder> {
        let sim = Simulation::new(PlantConfig::default(), DispatchPolicy::InverterCeiling, 8300.0);
        Runner::new(
            sim,
            Arc::clone(cell),
            TopicConfig::default(),
            &SimulationConfig::default(),
            Recorder::default(),
            start,
        )
    }

    #[test]
    fn power_frame_only_on_fresh_data() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);

        cell.update(Measurements::new(2000.0, 0.0));
        r.tick(start + Duration::from_secs(1));
        assert_eq!(r.publisher().sent.len(), 5);

        // stale inputs still tick, but publish nothing
        let report = r.tick(start + Duration::from_secs(2));
        assert_eq!(r.publisher().sent.len(), 5);
        assert_eq!(report.measurements.grid_power_w, 2000.0);
        assert_eq!(r.simulation().ticks(), 2);
    }

    #[test]
    fn stats_frame_after_interval() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);

        for s in 1..=10 {
            r.tick(start + Duration::from_secs(s));
        }
        assert!(r.publisher().sent.is_empty());
        r.tick(start + Duration::from_secs(11));
        let topics: Vec<&str> = r.publisher().sent.iter().map(|m| m.topic.as_str()).collect();
        assert_eq!(topics.len(), 8);
        assert!(topics.contains(&"sim-data/battery-wh"));
    }

    #[test]
    fn seed_is_applied_before_the_tick() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);
        cell.offer_battery_seed(1600.0);
        cell.update(Measurements::new(2000.0, 0.0));
        let report = r.tick(start + Duration::from_secs(1));
        assert!(r.simulation().is_seeded());
        assert_eq!(report.flows.battery_state, crate::sim::types::BatteryState::Empty);
    }

    #[test]
    fn publish_failures_are_counted_not_fatal() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);
        r.publisher.fail = true;
        cell.update(Measurements::new(500.0, 0.0));
        r.tick(start + Duration::from_secs(1));
        r.tick(start + Duration::from_secs(2));
        let summary = r.finish();
        assert_eq!(summary.ticks, 2);
        // 5 power + 8 final stats
        assert_eq!(summary.publish_failures, 13);
        assert_eq!(summary.messages_published, 0);
    }

    #[test]
    fn late_tick_counts_as_overrun() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);
        r.tick(start + Duration::from_secs(1));
        let report = r.tick(start + Duration::from_secs(5));
        assert!((report.dt_secs - 4.0).abs() < 1e-9);
        assert_eq!(r.finish().overruns, 1);
    }

    #[test]
    fn late_and_slow_tick_counts_once() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let mut r = runner(&cell, start);
        r.tick(start + Duration::from_secs(5));
        r.end_cycle(Duration::from_secs(2));
        // on time but slow
        r.tick(start + Duration::from_secs(6));
        r.end_cycle(Duration::from_millis(1500));
        // on time and quick
        r.tick(start + Duration::from_secs(7));
        r.end_cycle(Duration::from_millis(10));
        assert_eq!(r.finish().overruns, 2);
    }

    #[test]
    fn status_mirrors_latest_report() {
        let cell = Arc::new(MeasurementCell::new());
        let start = Instant::now();
        let status: SharedStatus = Arc::default();
        let mut r = runner(&cell, start).with_status(Arc::clone(&status));
        assert!(status.read().is_none());
        let report = r.tick(start + Duration::from_secs(1));
        assert_eq!(*status.read(), Some(report));
    }
}
