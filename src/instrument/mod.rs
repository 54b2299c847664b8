//! Instrument drivers
//!
//! [`TunableLaser`] is the driver; [`scpi`] holds its command table and
//! response parsing, [`modes`] the enumerated settings.

pub mod modes;
pub mod scpi;
pub mod tunable_laser;

pub use modes::{ParseModeError, SweepMode, TriggerOutput};
pub use tunable_laser::{SweepRange, TunableLaser, DEFAULT_SWEEP_CYCLES};
