//! Run configuration and orchestration.

/// Serializable run and simulation parameters.
pub mod config;
/// Cancellation and progress reporting.
pub mod control;
/// Frame sequence producer.
pub mod generator;
/// Run state machine.
pub mod run;
