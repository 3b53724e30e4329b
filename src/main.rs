//! Simulator entry point: CLI wiring, input selection, and the tick loop.

use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::BufReader;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use energy_sim::cli::{self, CliOptions, Command};
use energy_sim::config::SiteConfig;
use energy_sim::feed::SyntheticFeed;
use energy_sim::io::export::TelemetryWriter;
use energy_sim::measurements::MeasurementCell;
use energy_sim::runner::{Runner, SharedStatus};
use energy_sim::sim::Simulation;
use energy_sim::telemetry;
use energy_sim::transport::{Ingest, LinePublisher};

/// Time allowed for background tasks (the stdin reader in particular) to
/// wind down after the tick loop stops.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() {
    let opts = match cli::parse_args() {
        Ok(Command::Run(opts)) => opts,
        Ok(Command::Help) => {
            cli::print_usage();
            return;
        }
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(2);
        }
    };

    telemetry::init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        }
    };
    let outcome = rt.block_on(run(opts));
    rt.shutdown_timeout(SHUTDOWN_GRACE);

    if let Err(e) = outcome {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run(opts: CliOptions) -> Result<()> {
    let config = load_config(&opts)?;
    let plant = config.plant();
    let policy = config.simulation.dispatch_policy;

    let sim = Simulation::new(plant.clone(), policy, config.battery.initial_energy_wh);
    let cell = Arc::new(MeasurementCell::new());
    let status: SharedStatus = Arc::default();

    let input = spawn_input(&opts, &config, Arc::clone(&cell));

    let mut runner = Runner::new(
        sim,
        cell,
        config.topics.clone(),
        &config.simulation,
        LinePublisher::stdout(),
        Instant::now(),
    )
    .with_status(Arc::clone(&status));

    if let Some(path) = &opts.telemetry_out {
        let sink = TelemetryWriter::create(path)
            .with_context(|| format!("cannot create telemetry file \"{}\"", path.display()))?;
        runner = runner.with_telemetry(sink);
        info!(path = %path.display(), "writing per-tick telemetry");
    }

    #[cfg(feature = "api")]
    if opts.serve {
        use std::net::SocketAddr;

        let state = Arc::new(energy_sim::api::AppState {
            plant,
            policy,
            status: Arc::clone(&status),
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
        tokio::spawn(async move {
            if let Err(e) = energy_sim::api::serve(state, addr).await {
                error!(%addr, error = %e, "API server stopped");
            }
        });
    }
    #[cfg(not(feature = "api"))]
    if opts.serve {
        warn!("--serve needs the `api` feature, ignoring");
    }

    info!("app started");
    let summary = runner.run_until(telemetry::shutdown_signal()).await;
    input.abort();

    info!(
        ticks = summary.ticks,
        overruns = summary.overruns,
        published = summary.messages_published,
        publish_failures = summary.publish_failures,
        telemetry_rows = summary.telemetry_rows,
        battery_wh = summary.final_energy.battery_energy_wh,
        "shutdown complete"
    );
    Ok(())
}

/// Loads the configuration named on the command line and validates it.
///
/// `--config` takes priority, then `--preset`, then the `default` preset.
fn load_config(opts: &CliOptions) -> Result<SiteConfig> {
    let config = if let Some(path) = &opts.config {
        SiteConfig::from_toml_file(path)?
    } else {
        SiteConfig::from_preset(opts.preset.as_deref().unwrap_or("default"))?
    };

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!("{e}");
        }
        bail!("invalid configuration: {} error(s)", errors.len());
    }
    Ok(config)
}

/// Starts the measurement source: the synthetic feed, or `topic payload`
/// lines on stdin.
fn spawn_input(
    opts: &CliOptions,
    config: &SiteConfig,
    cell: Arc<MeasurementCell>,
) -> JoinHandle<()> {
    if opts.synthetic {
        return tokio::spawn(SyntheticFeed::new(&config.synthetic).run(cell));
    }

    let ingest = Ingest::new(config.topics.clone(), cell);
    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        if let Err(e) = ingest.run(stdin).await {
            warn!(error = %e, "input stream failed, keeping last known inputs");
        }
    })
}
