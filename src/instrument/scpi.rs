//! SCPI command set of the tunable laser and response parsing.
//!
//! Headers are written with the mixed-case long form used in the instrument
//! manual. The instrument accepts them case-insensitively, but the exact text
//! is kept stable so command logs match the manual.
//!
//! The instrument works in SI units: wavelengths in meters, sweep speed in m/s.
//! Setters attach an explicit `NM` / `NM/S` suffix instead of converting.

use std::fmt::Display;

/// Conversion factor between the instrument's meters and the API's nanometers.
pub const NM_PER_M: f64 = 1e9;

/// Passcode expected by `:LOCK`. Part of the instrument protocol, not a secret.
pub const LOCK_PASSCODE: u16 = 1234;

/// Identification query
pub const IDENTIFY: &str = "*IDN?";
/// Output wavelength
pub const WAVELENGTH: &str = ":SOURce0:WAVelength";
/// Trigger output connector behaviour
pub const TRIGGER_OUTPUT: &str = ":TRIG0:OUTP";
/// Sweep control (`STARt` argument starts a sweep)
pub const SWEEP: &str = ":SOURce0:WAVelength:SWEep";
/// Number of sweep cycles
pub const SWEEP_CYCLES: &str = ":SOURce0:WAVelength:SWEep:CYCLes";
/// Sweep mode
pub const SWEEP_MODE: &str = ":SOURce0:WAVelength:SWEep:MODE";
/// Continuous sweep speed
pub const SWEEP_SPEED: &str = ":SOURce0:WAVelength:SWEep:SPEed";
/// Sweep step size
pub const SWEEP_STEP: &str = ":SOURce0:WAVelength:SWEep:STEP";
/// Sweep start wavelength
pub const SWEEP_START: &str = ":SOURce0:WAVelength:SWEep:STARt";
/// Sweep stop wavelength
pub const SWEEP_STOP: &str = ":SOURce0:WAVelength:SWEep:STOP";
/// Laser output on/off
pub const POWER_STATE: &str = ":SOURce0:POWer:STATe";
/// Front panel / remote lock
pub const LOCK: &str = ":LOCK";

/// Query form of a header: `header?`
pub fn query(header: &str) -> String {
    format!("{}?", header)
}

/// Query form with a parameter, e.g. `:SOURce0:WAVelength? MIN`
pub fn query_with(header: &str, parameter: &str) -> String {
    format!("{}? {}", header, parameter)
}

/// Set form: `header value`
pub fn command(header: &str, value: impl Display) -> String {
    format!("{} {}", header, value)
}

/// Set form for a length in nanometers: `header {nm}NM`
pub fn command_nm(header: &str, nm: f64) -> String {
    format!("{} {}NM", header, nm)
}

/// Sweep speed setter: `header {nm_per_s}NM/S`
pub fn command_nm_per_s(header: &str, nm_per_s: f64) -> String {
    format!("{} {}NM/S", header, nm_per_s)
}

/// Lock setter including the protocol passcode
pub fn lock_command(locked: bool) -> String {
    format!("{} {},{}", LOCK, flag(locked), LOCK_PASSCODE)
}

/// Boolean as sent on the wire
pub fn flag(value: bool) -> u8 {
    u8::from(value)
}

/// Parse the first value of an ASCII numeric response.
///
/// Values may be separated by commas or whitespace; only the first one is
/// used. Scientific notation with an explicit sign (`+1.55000000E-006`) is
/// accepted.
pub fn parse_number(response: &str) -> Result<f64, String> {
    let first = response
        .split(|c: char| c == ',' || c.is_whitespace())
        .find(|s| !s.is_empty())
        .ok_or_else(|| "empty response".to_string())?;
    let value: f64 = first
        .parse()
        .map_err(|_| format!("'{}' is not a number", first))?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(format!("'{}' is not a finite number", first))
    }
}

/// Parse a numeric flag. Any non-zero integer part reads as `true`.
pub fn parse_flag(response: &str) -> Result<bool, String> {
    Ok(parse_number(response)?.trunc() != 0.0)
}

/// Parse a non-negative count, truncating any fractional part.
pub fn parse_count(response: &str) -> Result<u32, String> {
    let value = parse_number(response)?.trunc();
    if value < 0.0 || value > f64::from(u32::MAX) {
        return Err(format!("{} is not a valid count", value));
    }
    Ok(value as u32)
}
