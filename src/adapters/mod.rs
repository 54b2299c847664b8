//! Hardware adapter implementations
//!
//! This module defines the two seams between the laser driver and the outside
//! world, plus the implementations behind them:
//!
//! - [`Transport`]: one open instrument session exchanging terminated ASCII lines.
//! - [`ResourceManager`]: opens sessions by VISA resource string and enumerates
//!   resources on request.
//!
//! Resource managers are ordinary values owned by whoever constructs them. Nothing
//! here is initialized at load time, and resource enumeration only happens when
//! [`ResourceManager::list_resources`] is called.

pub mod mock_adapter;
pub mod resource;
pub mod tcp_socket;
pub mod visa_adapter;

pub use mock_adapter::{MockAdapter, MockResourceManager, SimulatedLaser};
pub use resource::ResourceAddress;
pub use tcp_socket::TcpSocketAdapter;
pub use visa_adapter::VisaAdapter;

use crate::error::AppResult;
use std::time::Duration;

/// Per-session transport settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Timeout applied to connect, read and write
    pub timeout: Duration,
    /// Terminator stripped from responses
    pub read_terminator: String,
    /// Terminator appended to commands
    pub write_terminator: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            read_terminator: "\n".to_string(),
            write_terminator: "\n".to_string(),
        }
    }
}

/// An open, message-based instrument session.
///
/// Implementations are blocking: `write` returns once the command has been
/// handed to the transport, `read` returns once a full response line has
/// arrived or the session timeout expires.
pub trait Transport {
    /// Send one command. The write terminator is appended by the transport.
    fn write(&mut self, command: &str) -> AppResult<()>;

    /// Read one response with the read terminator removed.
    fn read(&mut self) -> AppResult<String>;

    /// Release the session.
    fn close(&mut self) -> AppResult<()>;

    /// Short transport kind, e.g. "visa", "tcp", "mock".
    fn adapter_type(&self) -> &str;

    /// Human readable description including the resource.
    fn info(&self) -> String;
}

/// Opens transport sessions for resource strings.
pub trait ResourceManager {
    /// Open a session to `resource`.
    ///
    /// # Errors
    /// Connection-class errors when the resource is malformed or unreachable.
    fn open(&self, resource: &str, settings: &SessionSettings) -> AppResult<Box<dyn Transport>>;

    /// Enumerate the resources this manager can see.
    fn list_resources(&self) -> AppResult<Vec<String>>;
}

/// Resource manager dispatching on the resource string.
///
/// `TCPIP::host::port::SOCKET` resources are served by a plain TCP socket. Every
/// other resource goes through the VISA library, which needs the
/// `instrument_visa` feature. Each VISA session owns its own VISA resource
/// manager, so nothing is shared between sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResourceManager;

impl DefaultResourceManager {
    /// Create a resource manager.
    pub fn new() -> Self {
        Self
    }
}

impl ResourceManager for DefaultResourceManager {
    fn open(&self, resource: &str, settings: &SessionSettings) -> AppResult<Box<dyn Transport>> {
        match ResourceAddress::parse(resource)? {
            ResourceAddress::TcpipSocket { host, port, .. } => Ok(Box::new(
                TcpSocketAdapter::connect(resource, &host, port, settings)?,
            )),
            _ => Ok(Box::new(VisaAdapter::open(resource, settings)?)),
        }
    }

    fn list_resources(&self) -> AppResult<Vec<String>> {
        visa_adapter::list_resources()
    }
}
