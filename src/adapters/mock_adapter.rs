//! Mock hardware adapter for testing
//!
//! Provides a simulated tunable laser without physical hardware:
//! - [`SimulatedLaser`]: in-memory instrument state answering the laser's SCPI
//!   command set, with a command log for test verification
//! - [`MockAdapter`]: a [`Transport`] session onto a shared simulated laser
//! - [`MockResourceManager`]: hands out mock sessions, optionally refusing to
//!   connect
//!
//! Failure injection and response overrides let tests drive the adapter
//! through transport errors and malformed replies.

use super::{ResourceAddress, ResourceManager, SessionSettings, Transport};
use crate::config::DEFAULT_RESOURCE;
use crate::error::{AppResult, LaserError};
use crate::instrument::modes::{SweepMode, TriggerOutput};
use crate::instrument::scpi::{self, NM_PER_M};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Simulated N7778C-class tunable laser
///
/// Settings are stored in SI units the way the instrument reports them.
/// Out-of-range wavelengths and speeds are clamped, so reading back a setting
/// shows what the instrument actually applied.
///
/// # Example
///
/// ```
/// use tunable_laser::adapters::SimulatedLaser;
///
/// let mut laser = SimulatedLaser::new();
/// laser.handle(":SOURce0:WAVelength 1550NM");
/// assert_eq!(laser.handle(":SOURce0:WAVelength?"), Some("+1.55E-6".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct SimulatedLaser {
    identity: String,
    min_wavelength_m: f64,
    max_wavelength_m: f64,
    wavelength_m: f64,
    trigger_output: TriggerOutput,
    sweep_mode: SweepMode,
    sweep_cycles: u32,
    sweep_speed_mps: f64,
    sweep_start_m: f64,
    sweep_stop_m: f64,
    sweep_step_m: f64,
    sweeps_started: u32,
    power_on: bool,
    locked: bool,
    overrides: HashMap<String, String>,
    write_failures: Vec<String>,
    commands: Vec<String>,
}

const MIN_SPEED_MPS: f64 = 0.5e-9;
const MAX_SPEED_MPS: f64 = 200e-9;
const MIN_STEP_M: f64 = 0.1e-12;
const MAX_CYCLES: u32 = 10_000;

impl Default for SimulatedLaser {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedLaser {
    /// Create a laser tunable from 1450 nm to 1650 nm, parked at 1550 nm
    pub fn new() -> Self {
        Self {
            identity: "Keysight Technologies,N7778C,SIM00001,V1.0 (simulated)".to_string(),
            min_wavelength_m: 1450e-9,
            max_wavelength_m: 1650e-9,
            wavelength_m: 1550e-9,
            trigger_output: TriggerOutput::Disabled,
            sweep_mode: SweepMode::Continuous,
            sweep_cycles: 1,
            sweep_speed_mps: 10e-9,
            sweep_start_m: 1500e-9,
            sweep_stop_m: 1600e-9,
            sweep_step_m: 1e-9,
            sweeps_started: 0,
            power_on: false,
            locked: false,
            overrides: HashMap::new(),
            write_failures: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// Set the tuning range, in nanometers. The bounds may come in either
    /// order; a non-finite bound leaves the range unchanged.
    pub fn with_tuning_range(mut self, min_nm: f64, max_nm: f64) -> Self {
        if !(min_nm.is_finite() && max_nm.is_finite()) {
            warn!(
                "Simulated laser: ignoring tuning range {} nm to {} nm",
                min_nm, max_nm
            );
            return self;
        }
        self.min_wavelength_m = min_nm.min(max_nm) / NM_PER_M;
        self.max_wavelength_m = min_nm.max(max_nm) / NM_PER_M;
        self.wavelength_m = self.clamp_wavelength(self.wavelength_m);
        self.sweep_start_m = self.clamp_wavelength(self.sweep_start_m);
        self.sweep_stop_m = self.clamp_wavelength(self.sweep_stop_m);
        self
    }

    /// Set the `*IDN?` response
    pub fn with_identity(mut self, identity: &str) -> Self {
        self.identity = identity.to_string();
        self
    }

    /// Answer `query` with `response` instead of the simulated state.
    pub fn set_response(&mut self, query: &str, response: &str) {
        self.overrides
            .insert(query.to_string(), response.to_string());
    }

    /// Make the next write starting with `prefix` fail at the transport level.
    pub fn inject_write_failure(&mut self, prefix: &str) {
        self.write_failures.push(prefix.to_string());
    }

    /// Consume a pending write failure matching `command`.
    fn take_write_failure(&mut self, command: &str) -> bool {
        match self
            .write_failures
            .iter()
            .position(|prefix| command.starts_with(prefix.as_str()))
        {
            Some(idx) => {
                self.write_failures.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Every command received, in order
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Forget the command log
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Current wavelength in nanometers
    pub fn wavelength_nm(&self) -> f64 {
        self.wavelength_m * NM_PER_M
    }

    /// Laser output state
    pub fn is_power_on(&self) -> bool {
        self.power_on
    }

    /// Lock state
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Number of `SWEep STARt` commands received
    pub fn sweeps_started(&self) -> u32 {
        self.sweeps_started
    }

    fn clamp_wavelength(&self, m: f64) -> f64 {
        m.clamp(self.min_wavelength_m, self.max_wavelength_m)
    }

    /// Process one command. Queries return their response; unknown or
    /// malformed commands are logged and ignored, as the instrument would only
    /// push an entry onto its error queue.
    pub fn handle(&mut self, command: &str) -> Option<String> {
        self.commands.push(command.to_string());

        let command = command.trim();
        if let Some(response) = self.overrides.get(command) {
            return Some(response.clone());
        }

        let (header, argument) = match command.split_once(' ') {
            Some((header, argument)) => (header, argument.trim()),
            None => (command, ""),
        };

        match header.strip_suffix('?') {
            Some(header) => {
                let response = self.answer(header, argument);
                if response.is_none() {
                    warn!("Simulated laser: undefined query '{}'", command);
                }
                response
            }
            None => {
                if !self.apply(header, argument) {
                    warn!("Simulated laser: rejected command '{}'", command);
                }
                None
            }
        }
    }

    fn answer(&self, header: &str, argument: &str) -> Option<String> {
        let is = |h: &str| header.eq_ignore_ascii_case(h);
        let meters = |m: f64| format!("{:+E}", m);

        if header == "*IDN" {
            Some(self.identity.clone())
        } else if is(scpi::WAVELENGTH) {
            match argument.to_ascii_uppercase().as_str() {
                "" => Some(meters(self.wavelength_m)),
                "MIN" => Some(meters(self.min_wavelength_m)),
                "MAX" => Some(meters(self.max_wavelength_m)),
                _ => None,
            }
        } else if is(scpi::TRIGGER_OUTPUT) {
            Some(self.trigger_output.name().to_string())
        } else if is(scpi::SWEEP_CYCLES) {
            Some(format!("{:+E}", f64::from(self.sweep_cycles)))
        } else if is(scpi::SWEEP_MODE) {
            Some(self.sweep_mode.name().to_string())
        } else if is(scpi::SWEEP_SPEED) {
            Some(meters(self.sweep_speed_mps))
        } else if is(scpi::SWEEP_START) {
            Some(meters(self.sweep_start_m))
        } else if is(scpi::SWEEP_STOP) {
            Some(meters(self.sweep_stop_m))
        } else if is(scpi::SWEEP_STEP) {
            Some(meters(self.sweep_step_m))
        } else if is(scpi::POWER_STATE) {
            Some(scpi::flag(self.power_on).to_string())
        } else if is(scpi::LOCK) {
            Some(scpi::flag(self.locked).to_string())
        } else {
            None
        }
    }

    /// Apply a setting; returns false if the command was not accepted.
    fn apply(&mut self, header: &str, argument: &str) -> bool {
        let is = |h: &str| header.eq_ignore_ascii_case(h);

        if is(scpi::WAVELENGTH) {
            match parse_with_unit(argument, "NM") {
                Some(m) => self.wavelength_m = self.clamp_wavelength(m),
                None => return false,
            }
        } else if is(scpi::TRIGGER_OUTPUT) {
            match argument.parse() {
                Ok(trigger) => self.trigger_output = trigger,
                Err(_) => return false,
            }
        } else if is(scpi::SWEEP_CYCLES) {
            match argument.parse::<u32>() {
                Ok(n) => self.sweep_cycles = n.min(MAX_CYCLES),
                Err(_) => return false,
            }
        } else if is(scpi::SWEEP_MODE) {
            match argument.parse() {
                Ok(mode) => self.sweep_mode = mode,
                Err(_) => return false,
            }
        } else if is(scpi::SWEEP_SPEED) {
            match parse_with_unit(argument, "NM/S") {
                Some(mps) => self.sweep_speed_mps = mps.clamp(MIN_SPEED_MPS, MAX_SPEED_MPS),
                None => return false,
            }
        } else if is(scpi::SWEEP_START) {
            match parse_with_unit(argument, "NM") {
                Some(m) => self.sweep_start_m = self.clamp_wavelength(m),
                None => return false,
            }
        } else if is(scpi::SWEEP_STOP) {
            match parse_with_unit(argument, "NM") {
                Some(m) => self.sweep_stop_m = self.clamp_wavelength(m),
                None => return false,
            }
        } else if is(scpi::SWEEP_STEP) {
            let span = self.max_wavelength_m - self.min_wavelength_m;
            match parse_with_unit(argument, "NM") {
                Some(m) => self.sweep_step_m = m.clamp(MIN_STEP_M, span.max(MIN_STEP_M)),
                None => return false,
            }
        } else if is(scpi::SWEEP) {
            if !argument.eq_ignore_ascii_case("STARt") || self.sweep_start_m > self.sweep_stop_m {
                return false;
            }
            self.sweeps_started += 1;
        } else if is(scpi::POWER_STATE) {
            match argument {
                "0" => self.power_on = false,
                "1" => self.power_on = true,
                _ => return false,
            }
        } else if is(scpi::LOCK) {
            let passcode = scpi::LOCK_PASSCODE.to_string();
            match argument.split_once(',') {
                Some(("0", code)) if code.trim() == passcode => self.locked = false,
                Some(("1", code)) if code.trim() == passcode => self.locked = true,
                _ => return false,
            }
        } else {
            return false;
        }
        true
    }
}

/// Parse `1550NM`-style arguments into SI units. A bare number is taken as SI.
fn parse_with_unit(argument: &str, unit: &str) -> Option<f64> {
    let upper = argument.trim().to_ascii_uppercase();
    let (number, divisor) = match upper.strip_suffix(unit) {
        Some(number) => (number, NM_PER_M),
        None => (upper.as_str(), 1.0),
    };
    let value: f64 = number.trim().parse().ok()?;
    value.is_finite().then_some(value / divisor)
}

fn lock_device(device: &Mutex<SimulatedLaser>) -> MutexGuard<'_, SimulatedLaser> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport session onto a shared [`SimulatedLaser`]
///
/// Responses to queries are buffered per session, like an instrument output
/// queue. Reading with nothing buffered fails the way a VISA read times out.
pub struct MockAdapter {
    resource: String,
    device: Arc<Mutex<SimulatedLaser>>,
    pending: VecDeque<String>,
    closed: bool,
}

impl MockAdapter {
    /// Open a session on `device`
    pub fn new(resource: &str, device: Arc<Mutex<SimulatedLaser>>) -> Self {
        Self {
            resource: resource.to_string(),
            device,
            pending: VecDeque::new(),
            closed: false,
        }
    }

    fn ensure_open(&self) -> AppResult<()> {
        if self.closed {
            Err(LaserError::connection(&self.resource, "session closed"))
        } else {
            Ok(())
        }
    }
}

impl Transport for MockAdapter {
    fn write(&mut self, command: &str) -> AppResult<()> {
        self.ensure_open()?;
        let mut device = lock_device(&self.device);
        if device.take_write_failure(command) {
            return Err(LaserError::connection(
                &self.resource,
                format!("injected failure writing '{}'", command),
            ));
        }
        if let Some(response) = device.handle(command) {
            self.pending.push_back(response);
        }
        debug!("Mock write: {}", command);
        Ok(())
    }

    fn read(&mut self) -> AppResult<String> {
        self.ensure_open()?;
        self.pending
            .pop_front()
            .ok_or_else(|| LaserError::connection(&self.resource, "timeout: no response pending"))
    }

    fn close(&mut self) -> AppResult<()> {
        self.ensure_open()?;
        self.closed = true;
        self.pending.clear();
        Ok(())
    }

    fn adapter_type(&self) -> &str {
        "mock"
    }

    fn info(&self) -> String {
        format!("MockAdapter({})", self.resource)
    }
}

/// Resource manager handing out [`MockAdapter`] sessions
///
/// Clones share the same simulated laser, so a test can keep a clone to
/// inspect the device after handing another to the driver.
#[derive(Clone)]
pub struct MockResourceManager {
    device: Arc<Mutex<SimulatedLaser>>,
    offline: bool,
    opened: Arc<Mutex<Vec<String>>>,
}

impl Default for MockResourceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResourceManager {
    /// Manager backed by a default [`SimulatedLaser`]
    pub fn new() -> Self {
        Self::with_device(SimulatedLaser::new())
    }

    /// Manager backed by the given laser
    pub fn with_device(device: SimulatedLaser) -> Self {
        Self {
            device: Arc::new(Mutex::new(device)),
            offline: false,
            opened: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Manager whose instrument is unreachable
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    /// Run `f` against the simulated laser
    pub fn with_laser<R>(&self, f: impl FnOnce(&mut SimulatedLaser) -> R) -> R {
        f(&mut lock_device(&self.device))
    }

    /// Commands the simulated laser has received
    pub fn commands(&self) -> Vec<String> {
        self.with_laser(|laser| laser.commands().to_vec())
    }

    /// Resources opened so far
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ResourceManager for MockResourceManager {
    fn open(&self, resource: &str, _settings: &SessionSettings) -> AppResult<Box<dyn Transport>> {
        ResourceAddress::parse(resource)?;
        if self.offline {
            return Err(LaserError::connection(resource, "no route to host"));
        }
        self.opened
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource.to_string());
        Ok(Box::new(MockAdapter::new(resource, Arc::clone(&self.device))))
    }

    fn list_resources(&self) -> AppResult<Vec<String>> {
        if self.offline {
            Ok(Vec::new())
        } else {
            Ok(vec![DEFAULT_RESOURCE.to_string()])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> (MockResourceManager, Box<dyn Transport>) {
        let manager = MockResourceManager::new();
        let transport = manager
            .open(DEFAULT_RESOURCE, &SessionSettings::default())
            .ok()
            .unwrap();
        (manager, transport)
    }

    #[test]
    fn test_identify() {
        let (_manager, mut transport) = session();
        transport.write("*IDN?").unwrap();
        assert!(transport.read().unwrap().contains("N7778C"));
    }

    #[test]
    fn test_wavelength_set_and_query() {
        let mut laser = SimulatedLaser::new();
        assert_eq!(laser.handle(":SOURce0:WAVelength 1560.5NM"), None);
        assert!((laser.wavelength_nm() - 1560.5).abs() < 1e-9);
        let response = laser.handle(":SOURce0:WAVelength?").unwrap();
        let m: f64 = response.parse().unwrap();
        assert!((m - 1560.5e-9).abs() < 1e-18);
    }

    #[test]
    fn test_wavelength_is_clamped() {
        let mut laser = SimulatedLaser::new().with_tuning_range(1500.0, 1600.0);
        laser.handle(":SOURce0:WAVelength 1700NM");
        assert!((laser.wavelength_nm() - 1600.0).abs() < 1e-9);
        assert_eq!(
            laser.handle(":SOURce0:WAVelength? MIN"),
            Some(format!("{:+E}", 1500e-9))
        );
    }

    #[test]
    fn test_inverted_tuning_range_is_reordered() {
        let mut laser = SimulatedLaser::new().with_tuning_range(1600.0, 1500.0);
        assert_eq!(
            laser.handle(":SOURce0:WAVelength? MIN"),
            Some(format!("{:+E}", 1500e-9))
        );
        assert_eq!(
            laser.handle(":SOURce0:WAVelength? MAX"),
            Some(format!("{:+E}", 1600e-9))
        );
        laser.handle(":SOURce0:WAVelength 1400NM");
        assert!((laser.wavelength_nm() - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_wavelength_range_accepts_step() {
        let mut laser = SimulatedLaser::new().with_tuning_range(1550.0, 1550.0);
        assert!((laser.wavelength_nm() - 1550.0).abs() < 1e-9);
        assert_eq!(laser.handle(":SOURce0:WAVelength:SWEep:STEP 1NM"), None);
        let step: f64 = laser
            .handle(":SOURce0:WAVelength:SWEep:STEP?")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(step, MIN_STEP_M);
    }

    #[test]
    fn test_non_finite_tuning_range_is_ignored() {
        let laser = SimulatedLaser::new().with_tuning_range(f64::NAN, 1600.0);
        assert!((laser.wavelength_nm() - 1550.0).abs() < 1e-9);
    }

    #[test]
    fn test_lock_requires_passcode() {
        let mut laser = SimulatedLaser::new();
        laser.handle(":LOCK 1,9999");
        assert!(!laser.is_locked());
        laser.handle(":LOCK 1,1234");
        assert!(laser.is_locked());
        assert_eq!(laser.handle(":LOCK?"), Some("1".to_string()));
    }

    #[test]
    fn test_sweep_start_counts() {
        let mut laser = SimulatedLaser::new();
        laser.handle(":SOURce0:WAVelength:SWEep STARt");
        assert_eq!(laser.sweeps_started(), 1);
    }

    #[test]
    fn test_response_override() {
        let mut laser = SimulatedLaser::new();
        laser.set_response(":TRIG0:OUTP?", "stf");
        assert_eq!(laser.handle(":TRIG0:OUTP?"), Some("stf".to_string()));
    }

    #[test]
    fn test_unknown_query_has_no_response() {
        let (_manager, mut transport) = session();
        transport.write(":BOGus?").unwrap();
        assert!(transport.read().unwrap_err().is_connection_error());
    }

    #[test]
    fn test_injected_write_failure_is_consumed() {
        let (manager, mut transport) = session();
        manager.with_laser(|laser| laser.inject_write_failure(":LOCK"));
        assert!(transport.write(":LOCK 1,1234").is_err());
        assert!(transport.write(":LOCK 1,1234").is_ok());
        manager.with_laser(|laser| assert!(laser.is_locked()));
    }

    #[test]
    fn test_closed_session_rejects_io() {
        let (_manager, mut transport) = session();
        transport.close().unwrap();
        assert!(transport.write("*IDN?").is_err());
        assert!(transport.close().is_err());
    }

    #[test]
    fn test_offline_manager() {
        let manager = MockResourceManager::offline();
        let err = manager
            .open(DEFAULT_RESOURCE, &SessionSettings::default())
            .err()
            .unwrap();
        assert!(err.is_connection_error());
        assert!(manager.list_resources().unwrap().is_empty());
    }

    #[test]
    fn test_call_logging() {
        let (manager, mut transport) = session();
        transport.write("*IDN?").unwrap();
        transport.write(":SOURce0:POWer:STATe 1").unwrap();
        assert_eq!(
            manager.commands(),
            vec!["*IDN?".to_string(), ":SOURce0:POWer:STATe 1".to_string()]
        );
        assert_eq!(manager.opened(), vec![DEFAULT_RESOURCE.to_string()]);
    }
}
