use core::time::Duration;
use std::fmt;
use std::io::{self, BufReader, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};

use log::*;

/// A byte stream to the API server.
pub trait Connection: Read + Write {
    /// Bounds every following read. `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    fn shutdown(&mut self) -> io::Result<()>;
}

/// Opens connections; one call per cycle.
pub trait Connector {
    type Conn: Connection;

    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> io::Result<Self::Conn>;
}

impl Connection for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        TcpStream::shutdown(self, Shutdown::Both)
    }
}

/// Plain TCP through the platform socket stack (lwIP on ESP-IDF).
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Conn = TcpStream;

    fn connect(&mut self, host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
        let mut last_err = None;
        // Name resolution is blocking and not covered by `timeout`.
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
        }))
    }
}

/// Error returned when the session cannot be opened.
#[derive(Debug)]
pub struct SessionError {
    pub host: String,
    pub port: u16,
    pub source: io::Error,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection to {}:{} failed: {}", self.host, self.port, self.source)
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Owns at most one open connection.
///
/// Reads go through a [`BufReader`] so the header scan and the JSON parser
/// share one buffer; writes bypass it.
pub struct Session<C: Connector> {
    connector: C,
    connect_timeout: Duration,
    stream: Option<BufReader<C::Conn>>,
}

impl<C: Connector> Session<C> {
    pub fn new(connector: C, connect_timeout: Duration) -> Self {
        Self {
            connector,
            connect_timeout,
            stream: None,
        }
    }

    /// Opens a fresh connection, dropping any previous one.
    pub fn open(&mut self, host: &str, port: u16) -> Result<&mut BufReader<C::Conn>, SessionError> {
        self.close();
        info!("Connect to {}:{}", host, port);
        match self.connector.connect(host, port, self.connect_timeout) {
            Ok(conn) => {
                info!("Connected");
                Ok(self.stream.insert(BufReader::new(conn)))
            }
            Err(source) => {
                warn!("Connection failed: {}", source);
                Err(SessionError {
                    host: host.to_string(),
                    port,
                    source,
                })
            }
        }
    }

    /// Shuts the connection down. Does nothing when already closed.
    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            info!("Disconnect");
            if let Err(e) = stream.get_mut().shutdown() {
                debug!("Shutdown reported: {}", e);
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }
}

impl<C: Connector> Drop for Session<C> {
    fn drop(&mut self) {
        self.close();
    }
}
