//! Simulation engine: runs the power balance and the integrator once per tick.

use tracing::{debug, info, warn};

use super::integrator::EnergyIntegrator;
use super::power_balance::{DispatchPolicy, PowerBalanceModel};
use super::types::{EnergyState, Measurements, PlantConfig, PowerFlows, TickReport};

/// Clamps smaller than this are rounding noise and are not reported.
pub const OVERSHOOT_EPSILON_WH: f64 = 1e-6;

/// Owns the mutable simulation state and the two pure components.
///
/// The tick loop holds the only `&mut` to this struct. Each [`step`](Self::step)
/// computes flows and the next energy state from a snapshot of the inputs
/// and commits both at the end.
#[derive(Debug, Clone)]
pub struct Simulation {
    model: PowerBalanceModel,
    integrator: EnergyIntegrator,
    energy: EnergyState,
    last_flows: Option<PowerFlows>,
    ticks: u64,
    seeded: bool,
    /// Ticks whose battery energy was clamped by more than [`OVERSHOOT_EPSILON_WH`].
    overshoots: u64,
}

impl Simulation {
    /// Creates a simulation for a validated plant.
    ///
    /// # Arguments
    ///
    /// * `plant` - Installation parameters
    /// * `policy` - Dispatch policy for the power balance
    /// * `initial_battery_energy_wh` - Stored energy until a persisted value is seeded
    ///
    /// # Panics
    ///
    /// Panics if the plant parameters are out of range (see [`PowerBalanceModel::new`]).
    pub fn new(plant: PlantConfig, policy: DispatchPolicy, initial_battery_energy_wh: f64) -> Self {
        let integrator = EnergyIntegrator::new(&plant, policy);
        let initial = initial_battery_energy_wh.clamp(0.0, plant.battery_capacity_wh);
        Self {
            model: PowerBalanceModel::new(plant, policy),
            integrator,
            energy: EnergyState::with_battery_energy(initial),
            last_flows: None,
            ticks: 0,
            seeded: false,
            overshoots: 0,
        }
    }

    /// Replaces the stored battery energy with a persisted value.
    ///
    /// Only the first seed is accepted; later ones are ignored.
    ///
    /// # Returns
    ///
    /// `true` if the seed was applied.
    pub fn seed_battery_energy(&mut self, battery_energy_wh: f64) -> bool {
        if self.seeded {
            debug!(battery_energy_wh, "simulation already warm, discarding battery seed");
            return false;
        }
        let capacity = self.plant().battery_capacity_wh;
        let clamped = battery_energy_wh.clamp(0.0, capacity);
        if clamped != battery_energy_wh {
            warn!(
                battery_energy_wh,
                capacity_wh = capacity,
                "persisted battery energy out of range, clamping"
            );
        }
        self.energy.battery_energy_wh = clamped;
        self.seeded = true;
        info!(battery_energy_wh = clamped, "battery state restored");
        true
    }

    /// Executes one tick over `dt_secs` of elapsed time.
    ///
    /// # Arguments
    ///
    /// * `inputs` - Measurement snapshot taken at tick start
    /// * `dt_secs` - Seconds since the previous tick
    ///
    /// # Returns
    ///
    /// A `TickReport` with the flows and the committed energy state.
    pub fn step(&mut self, inputs: Measurements, dt_secs: f64) -> TickReport {
        let flows = self.model.compute(&inputs, self.energy.battery_energy_wh);
        let integration = self.integrator.advance(&self.energy, &flows, dt_secs);

        if integration.overshoot_wh > OVERSHOOT_EPSILON_WH {
            self.overshoots += 1;
            warn!(
                overshoot_wh = integration.overshoot_wh,
                dt_secs,
                state = %flows.battery_state,
                "battery energy left its range, clamped"
            );
        } else if integration.overshoot_wh > 0.0 {
            debug!(overshoot_wh = integration.overshoot_wh, "battery energy rounding clamped");
        }

        // commit
        self.energy = integration.energy;
        self.last_flows = Some(flows);
        let tick = self.ticks;
        self.ticks += 1;

        TickReport {
            tick,
            dt_secs: dt_secs.max(0.0),
            measurements: inputs,
            flows,
            energy: self.energy,
            battery_soc: self.battery_soc(),
            overshoot_wh: integration.overshoot_wh,
        }
    }

    /// Current state of charge (0.0 to 1.0).
    pub fn battery_soc(&self) -> f64 {
        self.energy.soc(self.plant().battery_capacity_wh)
    }

    pub fn energy(&self) -> &EnergyState {
        &self.energy
    }

    /// Flows from the most recent tick, if any.
    pub fn last_flows(&self) -> Option<&PowerFlows> {
        self.last_flows.as_ref()
    }

    pub fn plant(&self) -> &PlantConfig {
        self.model.plant()
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.model.policy()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Number of ticks that clamped the battery energy beyond rounding noise.
    pub fn overshoots(&self) -> u64 {
        self.overshoots
    }
}
