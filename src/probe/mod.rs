//! Manual probe clients.
//!
//! Each probe opens one TCP connection, sends a message, reads what comes
//! back and optionally loops with a fixed sleep:
//!
//! - `echo`: length-prefixed frames against a framed echo server
//! - `http`: one raw HTTP/1.1 request against an HTTP server
//! - `proxy`: raw text through a reverse proxy
//!
//! Any failure ends the run. There is no reconnect.

pub mod echo;
pub mod http;
pub mod proxy;

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{Config, Probe};
use crate::error::ProbeError;

/// Totals for one probe run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub rounds: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    /// Echo rounds whose reply differed from the request
    pub mismatches: u64,
}

impl RunStats {
    fn record(&mut self, sent: usize, received: usize) {
        self.rounds += 1;
        self.bytes_sent += sent as u64;
        self.bytes_received += received as u64;
    }
}

/// Connect to the configured target and run the selected probe.
pub fn run(config: &Config) -> Result<RunStats, ProbeError> {
    let mut stream = connect(&config.host, config.port, config.timeout)?;
    info!(host = %config.host, port = config.port, probe = config.probe.name(), "Connected");

    let mut pacer = Pacer::new(config.iterations, config.interval).with_linger(config.linger);
    let client_id = client_id();

    let stats = match &config.probe {
        Probe::Echo(settings) => echo::run(&mut stream, settings, &client_id, &mut pacer)?,
        Probe::Http(settings) => {
            http::run(&mut stream, settings, config.buffer_size, &mut pacer)?
        }
        Probe::Proxy(settings) => {
            proxy::run(&mut stream, settings, &client_id, config.buffer_size, &mut pacer)?
        }
    };

    info!(
        rounds = stats.rounds,
        bytes_sent = stats.bytes_sent,
        bytes_received = stats.bytes_received,
        mismatches = stats.mismatches,
        "Probe finished"
    );
    Ok(stats)
}

/// Open a blocking TCP connection with Nagle disabled.
///
/// Every resolved address is tried in order; the last failure is returned.
/// `timeout` bounds the connect and is also applied to reads and writes.
pub fn connect(
    host: &str,
    port: u16,
    timeout: Option<Duration>,
) -> Result<TcpStream, ProbeError> {
    let target = format!("{host}:{port}");
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|_| ProbeError::Resolve(target.clone()))?
        .collect();

    let mut last_err = None;
    for addr in addrs {
        match connect_addr(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!(%addr, error = %e, "Connect attempt failed");
                last_err = Some(e);
            }
        }
    }

    match last_err {
        Some(source) => Err(ProbeError::Connect {
            addr: target,
            source,
        }),
        None => Err(ProbeError::Resolve(target)),
    }
}

fn connect_addr(addr: SocketAddr, timeout: Option<Duration>) -> io::Result<TcpStream> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_nodelay(true)?;
    match timeout {
        Some(t) => socket.connect_timeout(&addr.into(), t)?,
        None => socket.connect(&addr.into())?,
    }
    socket.set_read_timeout(timeout)?;
    socket.set_write_timeout(timeout)?;

    Ok(socket.into())
}

/// Per-process tag mixed into default messages so concurrent probes can be
/// told apart in server logs.
pub fn client_id() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_millis()
    )
}

/// Round counter with a fixed sleep between rounds.
///
/// With linger enabled the interval is also slept once after the last
/// round, holding the caller's connection open for the peer to observe.
#[derive(Debug)]
pub struct Pacer {
    iterations: u64,
    interval: Duration,
    completed: u64,
    linger: bool,
    lingered: bool,
}

impl Pacer {
    /// `iterations == 0` never runs out.
    pub fn new(iterations: u64, interval: Duration) -> Self {
        Self {
            iterations,
            interval,
            completed: 0,
            linger: false,
            lingered: false,
        }
    }

    pub fn with_linger(mut self, linger: bool) -> Self {
        self.linger = linger;
        self
    }

    /// Returns the index of the next round, sleeping first unless it is the
    /// first one, or `None` once the configured rounds are done.
    pub fn next_round(&mut self) -> Option<u64> {
        if self.iterations != 0 && self.completed >= self.iterations {
            if self.linger && !self.lingered {
                self.lingered = true;
                thread::sleep(self.interval);
            }
            return None;
        }
        if self.completed > 0 && !self.interval.is_zero() {
            thread::sleep(self.interval);
        }
        let round = self.completed;
        self.completed += 1;
        Some(round)
    }
}

/// Single `read` of up to `buffer_size` bytes for the unframed probes.
///
/// A zero-byte read means the peer closed the connection.
pub(crate) fn read_chunk<R: Read + ?Sized>(
    stream: &mut R,
    buffer_size: usize,
) -> Result<Vec<u8>, ProbeError> {
    let mut buffer = vec![0u8; buffer_size];
    loop {
        match stream.read(&mut buffer) {
            Ok(0) => return Err(ProbeError::PeerClosed),
            Ok(n) => {
                buffer.truncate(n);
                return Ok(buffer);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ProbeError::Read(e)),
        }
    }
}

/// Write a whole unframed message and flush.
pub(crate) fn send_raw<W: Write + ?Sized>(
    stream: &mut W,
    data: &[u8],
) -> Result<(), ProbeError> {
    stream.write_all(data).map_err(ProbeError::Write)?;
    stream.flush().map_err(ProbeError::Write)
}
