//! Warehouse robot fleet emulator: wires configuration, topology, locks and
//! telemetry together and runs one worker per robot.

pub mod runner;

pub use runner::{Fleet, RunnerError, connect, launch};
