//! Raw TCP socket transport for `TCPIP::host::port::SOCKET` resources
//!
//! Most LAN instruments accept SCPI on a plain socket (port 5025 by convention),
//! which works without any VISA installation.

use super::{SessionSettings, Transport};
use crate::error::{AppResult, LaserError};
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use tracing::debug;

/// Blocking TCP socket session
pub struct TcpSocketAdapter {
    resource: String,
    settings: SessionSettings,
    writer: TcpStream,
    reader: BufReader<TcpStream>,
    // Bytes of a response whose terminator has not arrived yet
    partial: Vec<u8>,
}

impl TcpSocketAdapter {
    /// Connect to `host:port`, applying the session timeout to connect, read and write.
    ///
    /// Every resolved address is tried in turn; the last failure is reported.
    pub fn connect(
        resource: &str,
        host: &str,
        port: u16,
        settings: &SessionSettings,
    ) -> AppResult<Self> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| LaserError::connection(resource, e))?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, settings.timeout) {
                Ok(stream) => return Self::from_stream(resource, stream, settings),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => LaserError::connection(resource, e),
            None => LaserError::connection(resource, format!("'{}' did not resolve", host)),
        })
    }

    /// Wrap an already connected stream.
    pub fn from_stream(
        resource: &str,
        stream: TcpStream,
        settings: &SessionSettings,
    ) -> AppResult<Self> {
        let io_err = |e| LaserError::connection(resource, e);
        stream
            .set_read_timeout(Some(settings.timeout))
            .map_err(io_err)?;
        stream
            .set_write_timeout(Some(settings.timeout))
            .map_err(io_err)?;
        stream.set_nodelay(true).map_err(io_err)?;
        let reader = BufReader::new(stream.try_clone().map_err(io_err)?);

        debug!(
            "TCP socket '{}' opened with {}ms timeout",
            resource,
            settings.timeout.as_millis()
        );
        Ok(Self {
            resource: resource.to_string(),
            settings: settings.clone(),
            writer: stream,
            reader,
            partial: Vec::new(),
        })
    }
}

impl Transport for TcpSocketAdapter {
    fn write(&mut self, command: &str) -> AppResult<()> {
        let line = format!("{}{}", command, self.settings.write_terminator);
        self.writer
            .write_all(line.as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| {
                LaserError::connection(&self.resource, format!("write '{}' failed: {}", command, e))
            })
    }

    fn read(&mut self) -> AppResult<String> {
        // The last terminator byte delimits a response; the rest is stripped below
        let delimiter = self
            .settings
            .read_terminator
            .bytes()
            .last()
            .unwrap_or(b'\n');

        // On timeout the bytes read so far stay in `partial` for the next call
        let n = self
            .reader
            .read_until(delimiter, &mut self.partial)
            .map_err(|e| LaserError::connection(&self.resource, format!("read failed: {}", e)))?;
        if n == 0 || self.partial.last() != Some(&delimiter) {
            return Err(LaserError::connection(
                &self.resource,
                "connection closed by instrument",
            ));
        }

        let buf = std::mem::take(&mut self.partial);
        let text = String::from_utf8_lossy(&buf);
        Ok(text
            .trim_end_matches(self.settings.read_terminator.as_str())
            .to_string())
    }

    fn close(&mut self) -> AppResult<()> {
        match self.writer.shutdown(Shutdown::Both) {
            // Peer already gone counts as closed
            Err(e) if e.kind() != std::io::ErrorKind::NotConnected => {
                Err(LaserError::connection(&self.resource, e))
            }
            _ => {
                debug!("TCP socket '{}' closed", self.resource);
                Ok(())
            }
        }
    }

    fn adapter_type(&self) -> &str {
        "tcp"
    }

    fn info(&self) -> String {
        format!(
            "TcpSocketAdapter({} @ {}ms timeout)",
            self.resource,
            self.settings.timeout.as_millis()
        )
    }
}
