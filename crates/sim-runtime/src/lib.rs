//! # Luna Simulator Runtime
//!
//! Wires the simulated bus and its database services together.
//!
//! ## Startup Sequence
//!
//! 1. Read [`SimConfig`] from the environment
//! 2. Start the bus dispatcher task
//! 3. Register one database service per configured name
//! 4. Load the snapshot into the first database service, if configured

pub mod config;
pub mod simulator;

pub use config::{SimConfig, DEFAULT_DB_SERVICES};
pub use simulator::{RuntimeError, Simulator};
