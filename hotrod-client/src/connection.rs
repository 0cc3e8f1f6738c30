//! # Socket Transport
//!
//! Purpose: Own one non-blocking TCP connection to a Hot Rod endpoint, with
//! timed reads and per-connection exclusion for the duration of an exchange.
//!
//! ## Design Principles
//! 1. **The Mutex Is The Lease**: The stream sits behind a mutex; holding
//!    the guard for a full request/response exchange is what serializes the
//!    connection.
//! 2. **Poll With Backoff**: Would-block reads and writes retry on an
//!    exponential 50 ms → 400 ms schedule until the per-request deadline.
//! 3. **Endpoint Identity**: Equality and hashing use `(host, port)` only,
//!    so pool reconciliation recognizes a member regardless of socket state.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use hotrod_common::codec::ByteSource;
use hotrod_common::{ConnectionError, HotRodResult};

/// First delay between would-block polls.
const POLL_INITIAL: Duration = Duration::from_millis(50);

/// Largest delay between would-block polls.
const POLL_CAP: Duration = Duration::from_millis(400);

/// One TCP connection to a Hot Rod endpoint.
///
/// The connection starts disconnected; `connect` opens a fresh socket and
/// puts it in non-blocking mode. A disconnected connection can be reopened,
/// always on a fresh socket.
pub struct SocketConnection {
    host: String,
    port: u16,
    timeout: Duration,
    stream: Mutex<Option<TcpStream>>,
    open: AtomicBool,
}

impl SocketConnection {
    /// Creates a connection handle; no socket is opened yet.
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        SocketConnection {
            host: host.into(),
            port,
            timeout,
            stream: Mutex::new(None),
            open: AtomicBool::new(false),
        }
    }

    /// Endpoint host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Endpoint port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Per-request timeout applied to sends and receives.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Whether the socket is currently open.
    pub fn connected(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Opens the socket.
    ///
    /// Fails with `AlreadyConnected` when open and `Refused` when the TCP
    /// connect does not succeed.
    pub fn connect(&self) -> HotRodResult<()> {
        let mut stream = self.stream.lock();
        if stream.is_some() {
            return Err(ConnectionError::AlreadyConnected.into());
        }
        *stream = Some(open_stream(&self.host, self.port)?);
        self.open.store(true, Ordering::Release);
        debug!(endpoint = %self, "connected");
        Ok(())
    }

    /// Closes the socket.
    ///
    /// Strict: fails with `NotConnected` when there is nothing to close.
    /// Blocks until any exchange holding the lease completes.
    pub fn disconnect(&self) -> HotRodResult<()> {
        let mut stream = self.stream.lock();
        match stream.take() {
            Some(socket) => {
                self.open.store(false, Ordering::Release);
                let _ = socket.shutdown(Shutdown::Both);
                debug!(endpoint = %self, "disconnected");
                Ok(())
            }
            None => Err(ConnectionError::NotConnected.into()),
        }
    }

    /// Acquires exclusive use of the connection for one exchange.
    pub fn lease(&self) -> ConnectionLease<'_> {
        ConnectionLease {
            conn: self,
            guard: self.stream.lock(),
        }
    }
}

fn open_stream(host: &str, port: u16) -> HotRodResult<TcpStream> {
    let stream = TcpStream::connect((host, port)).map_err(|_| ConnectionError::Refused)?;
    stream
        .set_nonblocking(true)
        .map_err(|_| ConnectionError::Broken)?;
    Ok(stream)
}

impl PartialEq for SocketConnection {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for SocketConnection {}

impl Hash for SocketConnection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl fmt::Display for SocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for SocketConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketConnection")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("connected", &self.connected())
            .finish()
    }
}

/// Exclusive use of one connection from first sent byte to last received.
///
/// Dropping the lease releases the per-connection lock on every exit path.
pub struct ConnectionLease<'a> {
    conn: &'a SocketConnection,
    guard: MutexGuard<'a, Option<TcpStream>>,
}

impl ConnectionLease<'_> {
    /// Opens the socket in place when the leased connection is closed.
    ///
    /// Members added by a topology update connect lazily through this.
    pub fn ensure_connected(&mut self) -> HotRodResult<()> {
        if self.guard.is_none() {
            *self.guard = Some(open_stream(self.conn.host(), self.conn.port())?);
            self.conn.open.store(true, Ordering::Release);
            debug!(endpoint = %self.conn, "connected lazily under lease");
        }
        Ok(())
    }

    /// Writes the whole buffer to the socket.
    ///
    /// A zero-byte write or a socket error is `Broken`; exceeding the
    /// per-request timeout on would-block is `Timeout`.
    pub fn send(&mut self, buf: &[u8]) -> HotRodResult<()> {
        let timeout = self.conn.timeout;
        let stream = self.guard.as_mut().ok_or(ConnectionError::NotConnected)?;
        let deadline = Instant::now() + timeout;
        let mut delay = POLL_INITIAL;
        let mut written = 0;
        while written < buf.len() {
            match stream.write(&buf[written..]) {
                Ok(0) => return Err(ConnectionError::Broken.into()),
                Ok(n) => written += n,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ConnectionError::Timeout.into());
                    }
                    thread::sleep(delay);
                    delay = (delay * 2).min(POLL_CAP);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(_) => return Err(ConnectionError::Broken.into()),
            }
        }
        Ok(())
    }
}

impl ByteSource for ConnectionLease<'_> {
    /// Reads one byte, polling with backoff while the socket would block.
    ///
    /// An empty read is the peer hanging up; the deadline covers the whole
    /// wait for this byte.
    fn next_byte(&mut self) -> HotRodResult<u8> {
        let timeout = self.conn.timeout;
        let stream = self.guard.as_mut().ok_or(ConnectionError::NotConnected)?;
        let mut byte = [0u8; 1];
        let deadline = Instant::now() + timeout;
        let mut delay = POLL_INITIAL;
        loop {
            match stream.read(&mut byte) {
                Ok(0) => return Err(ConnectionError::HungUp.into()),
                Ok(_) => return Ok(byte[0]),
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ConnectionError::Timeout.into());
                    }
                    thread::sleep(delay);
                    delay = (delay * 2).min(POLL_CAP);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(_) => return Err(ConnectionError::Broken.into()),
            }
        }
    }
}
