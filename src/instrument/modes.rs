//! Enumerated instrument settings.
//!
//! Each enumeration has a stable ordinal for local representation and is sent
//! to the instrument by its symbolic name. Parsing accepts the symbolic name in
//! any case as well as the SCPI short and long forms the firmware may echo back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Text that does not name any variant of an enumeration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{text}'")]
pub struct ParseModeError {
    /// Which enumeration was being parsed
    pub kind: &'static str,
    /// The offending text
    pub text: String,
}

/// When the trigger output connector emits a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TriggerOutput {
    /// Never
    #[serde(rename = "DISABLED")]
    Disabled = 0,
    /// When a sweep step finishes
    #[serde(rename = "STFINISHED")]
    StFinished = 1,
    /// When a sweep cycle finishes
    #[serde(rename = "SWFINISHED")]
    SwFinished = 2,
    /// When a sweep cycle starts
    #[serde(rename = "SWSTART")]
    SwStart = 3,
}

impl TriggerOutput {
    /// Every variant, in ordinal order
    pub const ALL: [TriggerOutput; 4] = [
        TriggerOutput::Disabled,
        TriggerOutput::StFinished,
        TriggerOutput::SwFinished,
        TriggerOutput::SwStart,
    ];

    /// Symbolic name sent to the instrument
    pub fn name(self) -> &'static str {
        match self {
            TriggerOutput::Disabled => "DISABLED",
            TriggerOutput::StFinished => "STFINISHED",
            TriggerOutput::SwFinished => "SWFINISHED",
            TriggerOutput::SwStart => "SWSTART",
        }
    }

    /// Local integer representation
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ordinal`](Self::ordinal)
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
}

impl fmt::Display for TriggerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TriggerOutput {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DISABLED" | "DIS" => Ok(TriggerOutput::Disabled),
            "STFINISHED" | "STF" => Ok(TriggerOutput::StFinished),
            "SWFINISHED" | "SWF" => Ok(TriggerOutput::SwFinished),
            "SWSTART" | "SWSTARTED" | "SWST" => Ok(TriggerOutput::SwStart),
            _ => Err(ParseModeError {
                kind: "trigger output",
                text: s.to_string(),
            }),
        }
    }
}

/// How the instrument advances through a wavelength sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SweepMode {
    /// Stepped sweep, dwelling at each step
    #[serde(rename = "STEP")]
    Step = 0,
    /// Steps advanced by the user
    #[serde(rename = "MAN")]
    Manual = 1,
    /// Continuous sweep at the configured speed
    #[serde(rename = "CONT")]
    Continuous = 2,
}

impl SweepMode {
    /// Every variant, in ordinal order
    pub const ALL: [SweepMode; 3] = [SweepMode::Step, SweepMode::Manual, SweepMode::Continuous];

    /// Symbolic name sent to the instrument
    pub fn name(self) -> &'static str {
        match self {
            SweepMode::Step => "STEP",
            SweepMode::Manual => "MAN",
            SweepMode::Continuous => "CONT",
        }
    }

    /// Local integer representation
    pub fn ordinal(self) -> u8 {
        self as u8
    }

    /// Inverse of [`ordinal`](Self::ordinal)
    pub fn from_ordinal(ordinal: u8) -> Option<Self> {
        Self::ALL.get(usize::from(ordinal)).copied()
    }
}

impl fmt::Display for SweepMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SweepMode {
    type Err = ParseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STEP" => Ok(SweepMode::Step),
            "MAN" | "MANUAL" => Ok(SweepMode::Manual),
            "CONT" | "CONTINUOUS" => Ok(SweepMode::Continuous),
            _ => Err(ParseModeError {
                kind: "sweep mode",
                text: s.to_string(),
            }),
        }
    }
}
