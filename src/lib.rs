//! Home energy power-flow simulator.
//!
//! Turns live grid and solar measurements into the power flows and energy
//! totals of a simulated battery, inverter and charge controller, once per
//! second.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Synthetic measurement sources.
pub mod devices;
pub mod feed;
pub mod io;
pub mod measurements;
pub mod runner;
/// Power balance, integration and tick bookkeeping.
pub mod sim;
pub mod telemetry;
pub mod transport;
