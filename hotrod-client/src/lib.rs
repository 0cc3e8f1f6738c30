//! # Hot Rod Client
//!
//! Blocking client for a remote Hot Rod (version 25) key/value store, with
//! connection pooling, topology-change handling, and background-dispatched
//! counterparts for every operation.

pub mod client;
pub mod connection;
pub mod engine;
pub mod executor;
pub mod pool;
pub mod serial;
pub mod timespec;

pub use client::{ClientConfig, Conditional, HotRodClient, WriteOptions};
pub use connection::SocketConnection;
pub use engine::ProtocolEngine;
pub use executor::{AsyncHandle, Executor};
pub use pool::ConnectionPool;
pub use serial::{JsonSerializer, Serializer, Utf8Serializer};
pub use timespec::TimeSpec;
