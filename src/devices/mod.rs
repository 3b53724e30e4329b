//! Synthetic measurement sources for running without a live meter.

/// House load profile generator.
pub mod baseload;
/// Solar yield profile generator.
pub mod solar;
pub mod types;

pub use baseload::BaseLoad;
pub use solar::SolarPv;
pub use types::Device;
pub use types::DeviceContext;
