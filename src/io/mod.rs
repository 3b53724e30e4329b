/// CSV telemetry output.
pub mod export;
