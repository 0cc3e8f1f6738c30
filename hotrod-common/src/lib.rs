//! # Hot Rod Wire Core
//!
//! Wire-facing half of the Hot Rod client workspace: the error taxonomy,
//! the primitive codec, the declarative message schema, and the registry of
//! request/response variants for protocol version 25.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod schema;

pub use error::{ConnectionError, HotRodError, HotRodResult};
