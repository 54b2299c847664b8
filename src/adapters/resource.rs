//! Parsing of VISA resource strings.
//!
//! Only the TCP/IP forms are interpreted, because they decide which transport
//! serves the session. Other interface types (GPIB, USB, ASRL, ...) are kept
//! verbatim and handed to the VISA library.

use crate::error::{AppResult, LaserError};
use std::fmt;

/// A parsed VISA resource string
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceAddress {
    /// `TCPIP[board]::host[::lan_device]::INSTR` (VXI-11 / HiSLIP)
    TcpipInstr {
        /// Board index, `0` when omitted
        board: u16,
        /// Host name or IP address
        host: String,
        /// LAN device name, `inst0` when omitted
        lan_device: String,
    },
    /// `TCPIP[board]::host::port::SOCKET` (raw SCPI socket)
    TcpipSocket {
        /// Board index, `0` when omitted
        board: u16,
        /// Host name or IP address
        host: String,
        /// TCP port
        port: u16,
    },
    /// Any other interface type, passed through untouched
    Other {
        /// Interface prefix in upper case, e.g. `GPIB0`, `USB0`
        interface: String,
        /// The original resource string
        raw: String,
    },
}

fn invalid(resource: &str, reason: impl Into<String>) -> LaserError {
    LaserError::InvalidResource {
        resource: resource.to_string(),
        reason: reason.into(),
    }
}

/// Board index following the interface keyword, e.g. the `0` of `TCPIP0`.
fn parse_board(resource: &str, suffix: &str) -> AppResult<u16> {
    if suffix.is_empty() {
        return Ok(0);
    }
    suffix
        .parse()
        .map_err(|_| invalid(resource, format!("invalid board index '{}'", suffix)))
}

impl ResourceAddress {
    /// Parse a resource string such as `TCPIP0::100.65.25.37::inst0::INSTR`.
    ///
    /// Keywords are case-insensitive; host and device names keep their case.
    pub fn parse(resource: &str) -> AppResult<Self> {
        let trimmed = resource.trim();
        let splits: Vec<&str> = trimmed.split("::").collect();
        if splits.len() < 2 || splits.iter().any(|s| s.is_empty()) {
            return Err(invalid(resource, "expected '::'-separated fields"));
        }

        let interface = splits[0].to_uppercase();
        if !interface.starts_with("TCPIP") {
            return Ok(ResourceAddress::Other {
                interface,
                raw: trimmed.to_string(),
            });
        }
        let board = parse_board(resource, &interface["TCPIP".len()..])?;

        let class = splits[splits.len() - 1].to_uppercase();
        match (class.as_str(), splits.len()) {
            ("INSTR", 3) => Ok(ResourceAddress::TcpipInstr {
                board,
                host: splits[1].to_string(),
                lan_device: "inst0".to_string(),
            }),
            ("INSTR", 4) => Ok(ResourceAddress::TcpipInstr {
                board,
                host: splits[1].to_string(),
                lan_device: splits[2].to_string(),
            }),
            ("SOCKET", 4) => {
                let port = splits[2]
                    .parse()
                    .map_err(|_| invalid(resource, format!("invalid port '{}'", splits[2])))?;
                Ok(ResourceAddress::TcpipSocket {
                    board,
                    host: splits[1].to_string(),
                    port,
                })
            }
            ("INSTR", _) | ("SOCKET", _) => {
                Err(invalid(resource, "wrong number of fields for TCPIP resource"))
            }
            _ => Err(invalid(
                resource,
                format!("unsupported TCPIP resource class '{}'", class),
            )),
        }
    }

    /// Host for TCP/IP resources.
    pub fn host(&self) -> Option<&str> {
        match self {
            ResourceAddress::TcpipInstr { host, .. } | ResourceAddress::TcpipSocket { host, .. } => {
                Some(host.as_str())
            }
            ResourceAddress::Other { .. } => None,
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceAddress::TcpipInstr {
                board,
                host,
                lan_device,
            } => write!(f, "TCPIP{}::{}::{}::INSTR", board, host, lan_device),
            ResourceAddress::TcpipSocket { board, host, port } => {
                write!(f, "TCPIP{}::{}::{}::SOCKET", board, host, port)
            }
            ResourceAddress::Other { raw, .. } => f.write_str(raw),
        }
    }
}

impl std::str::FromStr for ResourceAddress {
    type Err = LaserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceAddress::parse(s)
    }
}
