//! VISA Hardware Adapter for GPIB/USB/Ethernet instruments
//!
//! Provides a [`Transport`] backed by the system VISA library through `visa-rs`,
//! supporting every resource type the installed VISA implementation knows
//! (VXI-11 `TCPIP::...::INSTR`, USBTMC, GPIB, ...).
//!
//! Each adapter owns the VISA resource manager session it was opened from.
//! Closing a VISA resource manager closes every session it created, so sharing
//! one across adapters would tie their lifetimes together.
//!
//! Without the `instrument_visa` feature every entry point returns
//! [`LaserError::FeatureNotEnabled`].

use super::{SessionSettings, Transport};
use crate::error::{AppResult, LaserError};
#[cfg(feature = "instrument_visa")]
use tracing::debug;

#[cfg(feature = "instrument_visa")]
use std::ffi::CString;
#[cfg(feature = "instrument_visa")]
use std::io::{BufRead, BufReader, Write};
#[cfg(feature = "instrument_visa")]
use visa_rs::prelude::*;

/// VISA adapter for instrument communication
///
/// Supports resource strings like:
/// - "TCPIP0::100.65.25.37::inst0::INSTR" (Ethernet/LXI)
/// - "USB0::0x1234::0x5678::SERIAL::INSTR" (USB)
/// - "GPIB0::1::INSTR" (GPIB interface)
pub struct VisaAdapter {
    /// VISA resource string (e.g., "GPIB0::1::INSTR")
    pub(crate) resource_string: String,

    pub(crate) settings: SessionSettings,

    #[cfg(feature = "instrument_visa")]
    instrument: Option<Instrument>,

    // Declared after the instrument so it is dropped last
    #[cfg(feature = "instrument_visa")]
    _rm: DefaultRM,
}

/// VISA timeouts are 32-bit milliseconds
#[cfg_attr(not(feature = "instrument_visa"), allow(dead_code))]
fn timeout_millis(settings: &SessionSettings) -> AppResult<u32> {
    let millis = settings.timeout.as_millis();
    u32::try_from(millis).map_err(|_| {
        LaserError::InvalidParameter(format!("VISA timeout {}ms out of range", millis))
    })
}

#[cfg(feature = "instrument_visa")]
fn visa_string(resource: &str) -> AppResult<VisaString> {
    CString::new(resource)
        .map(VisaString::from)
        .map_err(|_| LaserError::InvalidResource {
            resource: resource.to_string(),
            reason: "contains an interior NUL byte".to_string(),
        })
}

#[cfg(feature = "instrument_visa")]
impl VisaAdapter {
    /// Open a VISA session with the configured timeout.
    pub fn open(resource: &str, settings: &SessionSettings) -> AppResult<Self> {
        let rm = DefaultRM::new()
            .map_err(|e| LaserError::connection(resource, format!("VISA resource manager: {}", e)))?;
        let name = visa_string(resource)?;
        let instrument = rm
            .open(&name, AccessMode::NO_LOCK, settings.timeout)
            .map_err(|e| LaserError::connection(resource, format!("open failed: {}", e)))?;

        let timeout_ms = timeout_millis(settings)?;
        let timeout_attr = attribute::AttrTmoValue::new_checked(timeout_ms).ok_or_else(|| {
            LaserError::InvalidParameter(format!("VISA timeout {}ms out of range", timeout_ms))
        })?;
        instrument
            .set_attr(timeout_attr)
            .map_err(|e| LaserError::connection(resource, format!("set timeout failed: {}", e)))?;

        debug!(
            "VISA resource '{}' opened with {}ms timeout",
            resource, timeout_ms
        );
        Ok(Self {
            resource_string: resource.to_string(),
            settings: settings.clone(),
            instrument: Some(instrument),
            _rm: rm,
        })
    }

    fn instrument(&self) -> AppResult<&Instrument> {
        self.instrument.as_ref().ok_or(LaserError::NotConnected)
    }
}

#[cfg(feature = "instrument_visa")]
impl Transport for VisaAdapter {
    fn write(&mut self, command: &str) -> AppResult<()> {
        let line = format!("{}{}", command, self.settings.write_terminator);
        let mut instrument = self.instrument()?;
        instrument
            .write_all(line.as_bytes())
            .map_err(|e| {
                LaserError::connection(
                    &self.resource_string,
                    format!("write '{}' failed: {}", command, e),
                )
            })?;
        debug!("VISA write sent: {}", command);
        Ok(())
    }

    fn read(&mut self) -> AppResult<String> {
        let instrument = self.instrument()?;
        let mut line = String::new();
        BufReader::new(instrument)
            .read_line(&mut line)
            .map_err(|e| {
                LaserError::connection(&self.resource_string, format!("read failed: {}", e))
            })?;
        let response = line
            .trim_end_matches(self.settings.read_terminator.as_str())
            .to_string();
        debug!("VISA read: {}", response);
        Ok(response)
    }

    fn close(&mut self) -> AppResult<()> {
        if self.instrument.take().is_some() {
            debug!("VISA resource '{}' closed", self.resource_string);
        }
        Ok(())
    }

    fn adapter_type(&self) -> &str {
        "visa"
    }

    fn info(&self) -> String {
        format!(
            "VisaAdapter({} @ {}ms timeout)",
            self.resource_string,
            self.settings.timeout.as_millis()
        )
    }
}

/// Enumerate `?*INSTR` resources known to the VISA library.
#[cfg(feature = "instrument_visa")]
pub fn list_resources() -> AppResult<Vec<String>> {
    let rm = DefaultRM::new()
        .map_err(|e| LaserError::connection("VISA", format!("resource manager: {}", e)))?;
    let expr = visa_string("?*INSTR")?;
    let mut list = rm
        .find_res_list(&expr)
        .map_err(|e| LaserError::connection("VISA", format!("resource search failed: {}", e)))?;

    let mut resources = Vec::new();
    while let Some(res) = list
        .find_next()
        .map_err(|e| LaserError::connection("VISA", format!("resource search failed: {}", e)))?
    {
        resources.push(res.to_string());
    }
    debug!("VISA found {} resources", resources.len());
    Ok(resources)
}

#[cfg(not(feature = "instrument_visa"))]
impl VisaAdapter {
    /// Mock implementation (returns error)
    pub fn open(_resource: &str, _settings: &SessionSettings) -> AppResult<Self> {
        Err(LaserError::FeatureNotEnabled("instrument_visa".to_string()))
    }
}

#[cfg(not(feature = "instrument_visa"))]
impl Transport for VisaAdapter {
    fn write(&mut self, _command: &str) -> AppResult<()> {
        Err(LaserError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    fn read(&mut self) -> AppResult<String> {
        Err(LaserError::FeatureNotEnabled("instrument_visa".to_string()))
    }

    fn close(&mut self) -> AppResult<()> {
        Ok(())
    }

    fn adapter_type(&self) -> &str {
        "visa"
    }

    fn info(&self) -> String {
        format!(
            "VisaAdapter({} @ {}ms timeout, VISA support not compiled)",
            self.resource_string,
            self.settings.timeout.as_millis()
        )
    }
}

/// Mock implementation (returns error)
#[cfg(not(feature = "instrument_visa"))]
pub fn list_resources() -> AppResult<Vec<String>> {
    Err(LaserError::FeatureNotEnabled("instrument_visa".to_string()))
}
