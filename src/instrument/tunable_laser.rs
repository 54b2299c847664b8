//! Keysight N7778C tunable laser driver
//!
//! Translates wavelengths, sweep parameters and trigger modes into SCPI
//! exchanges over a [`Transport`] session. Every getter is a live query; the
//! only local state is the identity captured at open and the last wavelength
//! read, both used for display.
//!
//! All operations block until the instrument round trip completes. Operations
//! attempted without an open session fail with [`LaserError::NotConnected`].
//!
//! # Example
//!
//! ```no_run
//! use tunable_laser::instrument::TunableLaser;
//!
//! let mut laser = TunableLaser::new();
//! let idn = laser.open("TCPIP0::100.65.25.37::inst0::INSTR")?;
//! println!("{}", idn);
//!
//! laser.set_wavelength(1550.0)?;
//! println!("Wavelength: {} nm", laser.wavelength()?);
//! laser.close()?;
//! # Ok::<(), tunable_laser::error::LaserError>(())
//! ```

use super::modes::{SweepMode, TriggerOutput};
use super::scpi::{self, NM_PER_M};
use crate::adapters::{DefaultResourceManager, ResourceManager, SessionSettings, Transport};
use crate::config::{ConnectionConfig, DEFAULT_RESOURCE};
use crate::error::{AppResult, LaserError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Sweep cycle count used when none is given
pub const DEFAULT_SWEEP_CYCLES: u32 = 1;

/// Sweep range as applied by the instrument, in nanometers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepRange {
    /// First wavelength of the sweep
    pub start_nm: f64,
    /// Last wavelength of the sweep
    pub stop_nm: f64,
    /// Step between sweep points
    pub step_nm: f64,
}

struct Session {
    resource: String,
    transport: Box<dyn Transport>,
}

/// Driver for one tunable laser
pub struct TunableLaser {
    manager: Box<dyn ResourceManager>,
    settings: SessionSettings,
    default_resource: String,
    session: Option<Session>,
    identity: Option<String>,
    wavelength_nm: Option<f64>,
}

impl Default for TunableLaser {
    fn default() -> Self {
        Self::new()
    }
}

impl TunableLaser {
    /// Driver using [`DefaultResourceManager`] and default session settings
    pub fn new() -> Self {
        Self {
            manager: Box::new(DefaultResourceManager::new()),
            settings: SessionSettings::default(),
            default_resource: DEFAULT_RESOURCE.to_string(),
            session: None,
            identity: None,
            wavelength_nm: None,
        }
    }

    /// Driver configured from a loaded [`ConnectionConfig`]
    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self {
            settings: config.session_settings(),
            default_resource: config.resource.clone(),
            ..Self::new()
        }
    }

    /// Replace the resource manager used to open sessions
    pub fn with_manager(mut self, manager: impl ResourceManager + 'static) -> Self {
        self.manager = Box::new(manager);
        self
    }

    /// Replace the session settings used by later opens
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Resource opened by [`open_default`](Self::open_default)
    pub fn default_resource(&self) -> &str {
        &self.default_resource
    }

    /// Resources visible to the resource manager
    pub fn list_resources(&self) -> AppResult<Vec<String>> {
        self.manager.list_resources()
    }

    /// Open a session to `resource` and identify the instrument.
    ///
    /// An existing session is closed first. If identification fails the new
    /// session is discarded and the driver stays disconnected.
    ///
    /// # Errors
    /// Connection-class errors when the resource is malformed, unreachable, or
    /// does not answer `*IDN?`.
    pub fn open(&mut self, resource: &str) -> AppResult<String> {
        if let Some(mut previous) = self.session.take() {
            warn!(
                "Replacing open session '{}' with '{}'",
                previous.resource, resource
            );
            if let Err(e) = previous.transport.close() {
                warn!("Failed to close session '{}': {}", previous.resource, e);
            }
        }
        self.identity = None;
        self.wavelength_nm = None;

        let mut transport = self.manager.open(resource, &self.settings)?;
        debug!("Session opened via {}", transport.info());

        let identity = match transport
            .write(scpi::IDENTIFY)
            .and_then(|_| transport.read())
        {
            Ok(identity) => identity.trim().to_string(),
            Err(e) => {
                if let Err(close_err) = transport.close() {
                    warn!("Failed to close session '{}': {}", resource, close_err);
                }
                return Err(e);
            }
        };

        info!("Connected to '{}': {}", resource, identity);
        self.session = Some(Session {
            resource: resource.to_string(),
            transport,
        });
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    /// Open the configured default resource
    pub fn open_default(&mut self) -> AppResult<String> {
        let resource = self.default_resource.clone();
        self.open(&resource)
    }

    /// Release the session.
    ///
    /// # Errors
    /// [`LaserError::NotConnected`] without an open session.
    pub fn close(&mut self) -> AppResult<()> {
        let mut session = self.session.take().ok_or(LaserError::NotConnected)?;
        self.identity = None;
        self.wavelength_nm = None;
        session.transport.close()?;
        info!("Disconnected from '{}'", session.resource);
        Ok(())
    }

    /// Whether a session is open
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Resource of the open session
    pub fn resource(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.resource.as_str())
    }

    /// Transport description of the open session
    pub fn transport_info(&self) -> Option<String> {
        self.session.as_ref().map(|s| s.transport.info())
    }

    /// Identity captured at open
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// Last wavelength read, in nanometers
    pub fn cached_wavelength(&self) -> Option<f64> {
        self.wavelength_nm
    }

    fn transport(&mut self) -> AppResult<&mut Box<dyn Transport>> {
        self.session
            .as_mut()
            .map(|s| &mut s.transport)
            .ok_or(LaserError::NotConnected)
    }

    // ---- Low-level primitives ----

    /// Send one raw command.
    pub fn write(&mut self, command: &str) -> AppResult<()> {
        self.transport()?.write(command)?;
        debug!("SCPI write: {}", command);
        Ok(())
    }

    /// Read one response line, terminator removed.
    pub fn read(&mut self) -> AppResult<String> {
        let response = self.transport()?.read()?;
        debug!("SCPI read: {}", response);
        Ok(response)
    }

    /// Read a response and parse its first numeric value.
    pub fn read_number(&mut self) -> AppResult<f64> {
        let response = self.read()?;
        scpi::parse_number(&response)
            .map_err(|reason| LaserError::protocol("(read)", response, reason))
    }

    /// Write a query and read its response.
    pub fn query(&mut self, command: &str) -> AppResult<String> {
        self.write(command)?;
        self.read()
    }

    /// Write a query and parse the first numeric value of its response.
    pub fn query_number(&mut self, command: &str) -> AppResult<f64> {
        self.query_parsed(command, scpi::parse_number)
    }

    fn query_parsed<T>(
        &mut self,
        command: &str,
        parse: impl FnOnce(&str) -> Result<T, String>,
    ) -> AppResult<T> {
        let response = self.query(command)?;
        match parse(&response) {
            Ok(value) => Ok(value),
            Err(reason) => Err(LaserError::protocol(command, response, reason)),
        }
    }

    fn query_nm(&mut self, command: &str) -> AppResult<f64> {
        Ok(self.query_number(command)? * NM_PER_M)
    }

    // ---- Wavelength ----

    /// Current wavelength in nanometers. The value is cached for display.
    pub fn wavelength(&mut self) -> AppResult<f64> {
        let nm = self.query_nm(&scpi::query(scpi::WAVELENGTH))?;
        self.wavelength_nm = Some(nm);
        Ok(nm)
    }

    /// Tune to `nm` nanometers. Read back with [`wavelength`](Self::wavelength).
    pub fn set_wavelength(&mut self, nm: f64) -> AppResult<()> {
        ensure_finite("wavelength", nm)?;
        self.write(&scpi::command_nm(scpi::WAVELENGTH, nm))
    }

    /// Tuning range `(min, max)` in nanometers
    pub fn wavelength_limits(&mut self) -> AppResult<(f64, f64)> {
        let min = self.query_nm(&scpi::query_with(scpi::WAVELENGTH, "MIN"))?;
        let max = self.query_nm(&scpi::query_with(scpi::WAVELENGTH, "MAX"))?;
        Ok((min, max))
    }

    // ---- Trigger ----

    /// When the trigger output connector fires
    pub fn output_trigger(&mut self) -> AppResult<TriggerOutput> {
        self.query_parsed(&scpi::query(scpi::TRIGGER_OUTPUT), |s| {
            s.parse::<TriggerOutput>().map_err(|e| e.to_string())
        })
    }

    /// Choose when the trigger output connector fires
    pub fn set_output_trigger(&mut self, trigger: TriggerOutput) -> AppResult<()> {
        self.write(&scpi::command(scpi::TRIGGER_OUTPUT, trigger.name()))
    }

    // ---- Sweep ----

    /// Number of cycles per sweep
    pub fn sweep_cycles(&mut self) -> AppResult<u32> {
        self.query_parsed(&scpi::query(scpi::SWEEP_CYCLES), scpi::parse_count)
    }

    /// Set the number of cycles per sweep. See [`DEFAULT_SWEEP_CYCLES`].
    pub fn set_sweep_cycles(&mut self, cycles: u32) -> AppResult<()> {
        self.write(&scpi::command(scpi::SWEEP_CYCLES, cycles))
    }

    /// How the instrument advances through a sweep
    pub fn sweep_mode(&mut self) -> AppResult<SweepMode> {
        self.query_parsed(&scpi::query(scpi::SWEEP_MODE), |s| {
            s.parse::<SweepMode>().map_err(|e| e.to_string())
        })
    }

    /// Set the sweep mode
    pub fn set_sweep_mode(&mut self, mode: SweepMode) -> AppResult<()> {
        self.write(&scpi::command(scpi::SWEEP_MODE, mode.name()))
    }

    /// Continuous sweep speed in nm/s
    pub fn sweep_speed(&mut self) -> AppResult<f64> {
        self.query_nm(&scpi::query(scpi::SWEEP_SPEED))
    }

    /// Set the continuous sweep speed in nm/s
    pub fn set_sweep_speed(&mut self, nm_per_s: f64) -> AppResult<()> {
        ensure_finite("sweep speed", nm_per_s)?;
        self.write(&scpi::command_nm_per_s(scpi::SWEEP_SPEED, nm_per_s))
    }

    /// Program the sweep range and return what the instrument applied.
    ///
    /// Step is written before start and stop. The three writes are not atomic:
    /// if one fails, the earlier ones stay in effect on the instrument.
    pub fn configure_sweep(
        &mut self,
        start_nm: f64,
        stop_nm: f64,
        step_nm: f64,
    ) -> AppResult<SweepRange> {
        ensure_finite("sweep start", start_nm)?;
        ensure_finite("sweep stop", stop_nm)?;
        ensure_finite("sweep step", step_nm)?;

        self.write(&scpi::command_nm(scpi::SWEEP_STEP, step_nm))?;
        self.write(&scpi::command_nm(scpi::SWEEP_START, start_nm))?;
        self.write(&scpi::command_nm(scpi::SWEEP_STOP, stop_nm))?;

        let range = SweepRange {
            start_nm: self.query_nm(&scpi::query(scpi::SWEEP_START))?,
            step_nm: self.query_nm(&scpi::query(scpi::SWEEP_STEP))?,
            stop_nm: self.query_nm(&scpi::query(scpi::SWEEP_STOP))?,
        };
        info!(
            "Sweep configured: {} nm to {} nm, step {} nm",
            range.start_nm, range.stop_nm, range.step_nm
        );
        Ok(range)
    }

    /// Start the programmed sweep. Nothing is read back.
    pub fn start_sweep(&mut self) -> AppResult<()> {
        self.write(&scpi::command(scpi::SWEEP, "STARt"))
    }

    // ---- Output and lock ----

    /// Whether the laser output is on
    pub fn laser_status(&mut self) -> AppResult<bool> {
        self.query_parsed(&scpi::query(scpi::POWER_STATE), scpi::parse_flag)
    }

    /// Switch the laser output on or off
    pub fn set_laser_status(&mut self, on: bool) -> AppResult<()> {
        self.write(&scpi::command(scpi::POWER_STATE, scpi::flag(on)))
    }

    /// Whether the instrument is locked
    pub fn locked(&mut self) -> AppResult<bool> {
        self.query_parsed(&scpi::query(scpi::LOCK), scpi::parse_flag)
    }

    /// Lock or unlock the instrument. The protocol passcode is sent with it.
    pub fn set_locked(&mut self, locked: bool) -> AppResult<()> {
        self.write(&scpi::lock_command(locked))
    }
}

fn ensure_finite(name: &str, value: f64) -> AppResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(LaserError::InvalidParameter(format!(
            "{} must be finite, got {}",
            name, value
        )))
    }
}

impl fmt::Display for TunableLaser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.identity, self.wavelength_nm) {
            (Some(identity), Some(nm)) => write!(f, "TunableLaser: {} at {} nm", identity, nm),
            (Some(identity), None) => write!(f, "TunableLaser: {} at unknown wavelength", identity),
            (None, _) => write!(f, "TunableLaser: not connected"),
        }
    }
}
