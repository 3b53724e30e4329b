/// Tick timing and periodic triggers.
pub mod clock;
pub mod engine;
/// Forward-Euler energy integration.
pub mod integrator;
pub mod power_balance;
pub mod types;

pub use engine::Simulation;
pub use power_balance::{DispatchPolicy, PowerBalanceModel};
