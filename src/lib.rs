//! Driver adapter for a VISA-connected tunable laser source.
//!
//! The crate exposes [`TunableLaser`], a blocking driver that maps wavelength,
//! sweep, trigger, output and lock settings onto SCPI exchanges. Sessions are
//! opened through a [`ResourceManager`](adapters::ResourceManager): VISA for
//! `INSTR` resources (feature `instrument_visa`), a plain TCP socket for
//! `SOCKET` resources, or a simulated instrument for tests.

pub mod adapters;
pub mod config;
pub mod error;
pub mod instrument;

pub use config::LaserConfig;
pub use error::{AppResult, LaserError};
pub use instrument::{SweepMode, SweepRange, TriggerOutput, TunableLaser};
