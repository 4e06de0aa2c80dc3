//! Instrument sessions and address discovery.
//!
//! A [`Session`] is an open, exclusive text link to one instrument. Drivers
//! only ever need two operations from it:
//!
//! - `write(command)`: send one command line, no response expected
//! - `query(command)`: send one command line and read one response line
//!
//! [`Discovery`] enumerates the addresses a session could be opened on.
//!
//! # Addresses
//!
//! Addresses use VISA-style resource strings so the same config value works
//! across transports:
//!
//! | Address                              | Transport                        |
//! |--------------------------------------|----------------------------------|
//! | `ASRL/dev/ttyUSB0::INSTR`            | Serial port `/dev/ttyUSB0`       |
//! | `ASRL3::INSTR`                       | Serial port `COM3`               |
//! | `/dev/ttyUSB0`                       | Serial port (bare path)          |
//! | `TCPIP::192.168.1.50::5025::SOCKET`  | Raw SCPI socket                  |
//!
//! # Example
//!
//! ```rust,ignore
//! use smu_core::session::{open_first, SessionSettings};
//! use smu_core::serial::SerialDiscovery;
//!
//! let session = open_first(&SerialDiscovery, &SessionSettings::default()).await?;
//! let idn = session.query("*IDN?").await?;
//! ```

use crate::error::{SmuError, SmuResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

// =============================================================================
// Session / Discovery traits
// =============================================================================

/// An open command link to one instrument.
///
/// Methods take `&self` so a session can be shared as `Arc<dyn Session>`;
/// implementations serialise each transaction internally.
#[async_trait]
pub trait Session: Send + Sync {
    /// Address this session was opened on (for logs and error messages).
    fn address(&self) -> &str;

    /// Send one command. Fails with [`SmuError::Communication`] on link failure.
    async fn write(&self, command: &str) -> SmuResult<()>;

    /// Send one command and return the trimmed response line.
    ///
    /// Fails with [`SmuError::Communication`] or [`SmuError::Timeout`].
    async fn query(&self, command: &str) -> SmuResult<String>;
}

/// Enumerates instrument addresses. The list may be empty.
pub trait Discovery: Send + Sync {
    /// Currently available addresses, in discovery order.
    fn list_addresses(&self) -> SmuResult<Vec<String>>;
}

/// Discovery over a fixed list of addresses (from config or tests).
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    addresses: Vec<String>,
}

impl StaticDiscovery {
    /// Create a discovery that always reports `addresses`.
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }
}

impl Discovery for StaticDiscovery {
    fn list_addresses(&self) -> SmuResult<Vec<String>> {
        Ok(self.addresses.clone())
    }
}

// =============================================================================
// Address
// =============================================================================

/// Parsed instrument address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Address {
    /// Serial port by OS path or name
    Serial {
        /// Port path, e.g. "/dev/ttyUSB0" or "COM3"
        path: String,
    },
    /// Raw socket (SCPI over TCP)
    Tcp {
        /// Hostname or IP address
        host: String,
        /// TCP port, typically 5025
        port: u16,
    },
}

impl FromStr for Address {
    type Err = SmuError;

    fn from_str(s: &str) -> SmuResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(SmuError::Configuration(
                "empty instrument address".to_string(),
            ));
        }

        if !trimmed.contains("::") {
            return Ok(Address::Serial {
                path: trimmed.to_string(),
            });
        }

        let parts: Vec<&str> = trimmed.split("::").collect();
        let interface = parts[0].to_ascii_uppercase();

        if interface.starts_with("ASRL") {
            if parts.len() != 2 || !parts[1].eq_ignore_ascii_case("INSTR") {
                return Err(SmuError::Configuration(format!(
                    "malformed serial address '{}', expected ASRL<port>::INSTR",
                    trimmed
                )));
            }
            let resource = &parts[0][4..];
            if resource.is_empty() {
                return Err(SmuError::Configuration(format!(
                    "serial address '{}' names no port",
                    trimmed
                )));
            }
            let path = if resource.chars().all(|c| c.is_ascii_digit()) {
                format!("COM{}", resource)
            } else {
                resource.to_string()
            };
            return Ok(Address::Serial { path });
        }

        if interface.starts_with("TCPIP") {
            if parts.len() != 4 || !parts[3].eq_ignore_ascii_case("SOCKET") {
                return Err(SmuError::Configuration(format!(
                    "malformed socket address '{}', expected TCPIP::<host>::<port>::SOCKET",
                    trimmed
                )));
            }
            if parts[1].is_empty() {
                return Err(SmuError::Configuration(format!(
                    "socket address '{}' names no host",
                    trimmed
                )));
            }
            let port = parts[2].parse::<u16>().map_err(|e| {
                SmuError::Configuration(format!("invalid port in '{}': {}", trimmed, e))
            })?;
            return Ok(Address::Tcp {
                host: parts[1].to_string(),
                port,
            });
        }

        Err(SmuError::Configuration(format!(
            "unsupported instrument address '{}'",
            trimmed
        )))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Serial { path } => {
                // COM<n> is written back in its numeric VISA form
                let port = path
                    .strip_prefix("COM")
                    .filter(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(path.as_str());
                write!(f, "ASRL{}::INSTR", port)
            }
            Address::Tcp { host, port } => write!(f, "TCPIP::{}::{}::SOCKET", host, port),
        }
    }
}

// =============================================================================
// Session settings
// =============================================================================

/// Link parameters shared by all stream transports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Serial baud rate (ignored for sockets)
    pub baud_rate: u32,
    /// Appended to every command
    pub terminator: String,
    /// Response window for queries and connection attempts
    pub timeout_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            terminator: "\n".to_string(),
            timeout_ms: 2000,
        }
    }
}

impl SessionSettings {
    /// Response window as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// =============================================================================
// StreamSession
// =============================================================================

/// Trait alias for the byte streams a [`StreamSession`] can drive.
///
/// Covers `tokio_serial::SerialStream`, `tokio::net::TcpStream` and
/// `tokio::io::DuplexStream` (tests).
pub trait SessionIO: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> SessionIO for T {}

/// Type-erased boxed stream.
pub type DynStream = Box<dyn SessionIO>;

/// Upper bound on the pre-query drain of unsolicited bytes.
const DRAIN_WINDOW: Duration = Duration::from_millis(50);

/// Silence on the stream for this long counts as one quiet poll.
const DRAIN_POLL: Duration = Duration::from_millis(5);

/// Consecutive quiet polls that end the drain.
const DRAIN_QUIET_POLLS: u32 = 3;

/// Line-oriented session over any async byte stream.
///
/// A query that times out (or is cancelled) leaves its response owed by the
/// instrument. The next query first reads and discards owed lines, waiting up
/// to one timeout window for them, so a late answer is never returned for a
/// later command.
pub struct StreamSession {
    address: String,
    link: Mutex<Link>,
    terminator: String,
    timeout: Duration,
}

struct Link {
    reader: BufReader<DynStream>,
    /// Queries sent whose response line has not been read
    unanswered: usize,
}

impl StreamSession {
    /// Wrap an already-open stream.
    pub fn new(address: impl Into<String>, stream: DynStream, settings: &SessionSettings) -> Self {
        Self {
            address: address.into(),
            link: Mutex::new(Link {
                reader: BufReader::new(stream),
                unanswered: 0,
            }),
            terminator: settings.terminator.clone(),
            timeout: settings.timeout(),
        }
    }

    /// Open the transport named by `address`.
    pub async fn open(address: &Address, settings: &SessionSettings) -> SmuResult<Self> {
        match address {
            Address::Tcp { host, port } => {
                let target = format!("{}:{}", host, port);
                let stream = timeout(settings.timeout(), TcpStream::connect(target.as_str()))
                    .await
                    .map_err(|_| SmuError::Timeout {
                        command: format!("connect {}", target),
                        timeout: settings.timeout(),
                    })?
                    .map_err(|e| {
                        SmuError::Communication(format!("failed to connect to {}: {}", target, e))
                    })?;
                stream.set_nodelay(true)?;

                info!(address = %address, "opened socket session");
                Ok(Self::new(address.to_string(), Box::new(stream), settings))
            }
            Address::Serial { path } => {
                #[cfg(feature = "serial")]
                {
                    let port = crate::serial::open_serial_async(path, settings.baud_rate).await?;
                    info!(address = %address, baud_rate = settings.baud_rate, "opened serial session");
                    Ok(Self::new(address.to_string(), Box::new(port), settings))
                }

                #[cfg(not(feature = "serial"))]
                {
                    let _ = path;
                    Err(SmuError::Configuration(
                        "serial support not enabled. Rebuild with --features serial".to_string(),
                    ))
                }
            }
        }
    }

    /// Read and drop the responses still owed to earlier queries.
    ///
    /// Gives up after one timeout window without a line; the instrument is
    /// then assumed to have dropped them.
    async fn skip_unanswered(&self, link: &mut Link) -> SmuResult<()> {
        while link.unanswered > 0 {
            let mut late = String::new();
            match timeout(self.timeout, link.reader.read_line(&mut late)).await {
                Ok(Ok(0)) => {
                    return Err(SmuError::Communication(format!(
                        "{} closed the connection",
                        self.address
                    )))
                }
                Ok(Ok(_)) => {
                    link.unanswered -= 1;
                    debug!(address = %self.address, response = %late.trim(), "discarding late response");
                }
                Ok(Err(e)) => {
                    return Err(SmuError::Communication(format!(
                        "read from {} failed: {}",
                        self.address, e
                    )))
                }
                Err(_) => {
                    warn!(
                        address = %self.address,
                        unanswered = link.unanswered,
                        "owed responses never arrived"
                    );
                    link.unanswered = 0;
                }
            }
        }
        Ok(())
    }

    /// Drop bytes left over in the read buffer from an earlier transaction.
    fn discard_buffered(reader: &mut BufReader<DynStream>) {
        let stale = reader.buffer().len();
        if stale > 0 {
            debug!(bytes = stale, "discarding stale buffered response data");
            reader.consume(stale);
        }
    }

    /// Drain bytes already in flight on the underlying stream.
    ///
    /// Ends after [`DRAIN_QUIET_POLLS`] quiet polls or [`DRAIN_WINDOW`].
    /// Read errors end the drain too; the query that follows reports them.
    async fn drain_pending(reader: &mut BufReader<DynStream>) {
        let mut scratch = [0u8; 256];
        let deadline = Instant::now() + DRAIN_WINDOW;
        let mut quiet = 0u32;

        while quiet < DRAIN_QUIET_POLLS && Instant::now() < deadline {
            match timeout(DRAIN_POLL, reader.get_mut().read(&mut scratch)).await {
                Ok(Ok(n)) if n > 0 => {
                    quiet = 0;
                    debug!(bytes = n, "discarding unsolicited stream data");
                }
                _ => quiet += 1,
            }
        }
    }

    async fn send_line(&self, reader: &mut BufReader<DynStream>, command: &str) -> SmuResult<()> {
        let line = format!("{}{}", command, self.terminator);
        let inner = reader.get_mut();
        inner.write_all(line.as_bytes()).await.map_err(|e| {
            SmuError::Communication(format!(
                "write '{}' to {} failed: {}",
                command, self.address, e
            ))
        })?;
        inner.flush().await.map_err(|e| {
            SmuError::Communication(format!("flush to {} failed: {}", self.address, e))
        })?;
        Ok(())
    }
}

#[async_trait]
impl Session for StreamSession {
    fn address(&self) -> &str {
        &self.address
    }

    async fn write(&self, command: &str) -> SmuResult<()> {
        let mut link = self.link.lock().await;
        self.send_line(&mut link.reader, command).await?;
        debug!(address = %self.address, command, "write");
        Ok(())
    }

    async fn query(&self, command: &str) -> SmuResult<String> {
        let mut guard = self.link.lock().await;
        let link = &mut *guard;

        self.skip_unanswered(link).await?;
        Self::discard_buffered(&mut link.reader);
        Self::drain_pending(&mut link.reader).await;

        self.send_line(&mut link.reader, command).await?;
        link.unanswered += 1;

        let mut response = String::new();
        match timeout(self.timeout, link.reader.read_line(&mut response)).await {
            Ok(Ok(0)) => Err(SmuError::Communication(format!(
                "{} closed the connection",
                self.address
            ))),
            Ok(Ok(_)) => {
                link.unanswered -= 1;
                let trimmed = response.trim().to_string();
                debug!(address = %self.address, command, response = %trimmed, "query");
                Ok(trimmed)
            }
            Ok(Err(e)) => Err(SmuError::Communication(format!(
                "read from {} failed: {}",
                self.address, e
            ))),
            Err(_) => Err(SmuError::Timeout {
                command: command.to_string(),
                timeout: self.timeout,
            }),
        }
    }
}

// =============================================================================
// Connection acquisition
// =============================================================================

/// Parse `address` and open a session on it.
pub async fn open_session(address: &str, settings: &SessionSettings) -> SmuResult<Arc<dyn Session>> {
    let parsed: Address = address.parse()?;
    let session = StreamSession::open(&parsed, settings).await?;
    Ok(Arc::new(session))
}

/// Open a session on the first address `discovery` reports.
///
/// Fails with [`SmuError::Configuration`] when no address is available.
pub async fn open_first(
    discovery: &dyn Discovery,
    settings: &SessionSettings,
) -> SmuResult<Arc<dyn Session>> {
    let addresses = discovery.list_addresses()?;
    let first = addresses.first().ok_or_else(|| {
        SmuError::Configuration("no instrument address found".to_string())
    })?;

    info!(address = %first, available = addresses.len(), "opening first instrument address");
    open_session(first, settings).await
}
