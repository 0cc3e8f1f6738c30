//! # Error Taxonomy
//!
//! Purpose: Define the typed failure kinds shared by the wire core and the
//! client layers.
//!
//! ## Design Principles
//! 1. **Closed Taxonomy**: Every failure a caller can observe is a variant
//!    here; no dynamic error erasure.
//! 2. **Matchable Connection Faults**: `ConnectionError` is its own enum so
//!    call sites can distinguish a timeout from a hangup.
//! 3. **Diagnosable Error Responses**: Translated error responses keep the
//!    decoded response alongside the server message.

use thiserror::Error;

use crate::protocol::Response;

/// Result type used across both workspace crates.
pub type HotRodResult<T> = Result<T, HotRodError>;

/// Connection-level failures raised by the socket transport and the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Operation requires an open socket and there is none.
    #[error("not connected")]
    NotConnected,
    /// `connect` was called on an already open socket.
    #[error("already connected")]
    AlreadyConnected,
    /// The TCP connect attempt failed.
    #[error("connection refused")]
    Refused,
    /// A write returned zero or the socket reported an error.
    #[error("socket connection broken")]
    Broken,
    /// The peer closed the connection mid-exchange.
    #[error("remote end hung up unexpectedly")]
    HungUp,
    /// The per-request deadline elapsed while waiting on the socket.
    #[error("connection timeout")]
    Timeout,
}

/// Errors surfaced by the Hot Rod client library.
#[derive(Debug, Error)]
pub enum HotRodError {
    /// A message could not be encoded (missing required field, over-long
    /// LEB128 value).
    #[error("encode error: {0}")]
    Encode(String),
    /// A byte stream could not be decoded into a message.
    #[error("decode error: {0}")]
    Decode(String),
    /// The underlying socket failed.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),
    /// A key or value did not fit the serializer's contract.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The server answered with an error response attributable to itself.
    #[error("server error: {message}")]
    Server {
        /// Message carried by the error response.
        message: String,
        /// Decoded response, kept for diagnostics.
        response: Box<Response>,
    },
    /// The server rejected the request as malformed or unsupported.
    #[error("client error: {message}")]
    Client {
        /// Message carried by the error response.
        message: String,
        /// Decoded response, kept for diagnostics.
        response: Box<Response>,
    },
    /// An error response whose status has no more specific interpretation.
    #[error("response error: {message}")]
    Response {
        /// Message describing the unexpected status.
        message: String,
        /// Decoded response, kept for diagnostics.
        response: Box<Response>,
    },
    /// The exchange violated the protocol (e.g. a correlation id mismatch).
    #[error("protocol error: {0}")]
    Protocol(String),
    /// An argument did not match its expected format.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A background operation was cancelled before producing a result.
    #[error("operation cancelled")]
    Cancelled,
}

impl HotRodError {
    /// Builds the encode failure for a required field left unset.
    pub fn missing_field(message: &'static str, field: &'static str) -> Self {
        HotRodError::Encode(format!("field '{field}' of '{message}' must not be absent"))
    }
}
