//! # Key/Value Serializers
//!
//! Purpose: Define the byte boundary between user values and the wire, plus
//! the two stock implementations.
//!
//! The wire only ever carries opaque byte strings; everything about a
//! value's shape lives in the serializer chosen by the caller.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

use hotrod_common::{HotRodError, HotRodResult};

/// Converts values to and from the opaque byte strings on the wire.
pub trait Serializer {
    /// Value type this serializer handles.
    type Value;

    /// Serializes a value for the wire.
    fn to_bytes(&self, value: &Self::Value) -> HotRodResult<Vec<u8>>;

    /// Deserializes a value received from the wire.
    fn from_bytes(&self, data: &[u8]) -> HotRodResult<Self::Value>;
}

/// Default serializer: JSON over UTF-8 bytes.
pub struct JsonSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonSerializer<T> {
    /// Creates the serializer.
    pub fn new() -> Self {
        JsonSerializer {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for JsonSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonSerializer<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for JsonSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("JsonSerializer")
    }
}

impl<T: Serialize + DeserializeOwned> Serializer for JsonSerializer<T> {
    type Value = T;

    fn to_bytes(&self, value: &T) -> HotRodResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| HotRodError::Serialization(err.to_string()))
    }

    fn from_bytes(&self, data: &[u8]) -> HotRodResult<T> {
        serde_json::from_slice(data).map_err(|err| HotRodError::Serialization(err.to_string()))
    }
}

/// Plain UTF-8 serializer for string keys and values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Utf8Serializer;

impl Serializer for Utf8Serializer {
    type Value = String;

    fn to_bytes(&self, value: &String) -> HotRodResult<Vec<u8>> {
        Ok(value.as_bytes().to_vec())
    }

    fn from_bytes(&self, data: &[u8]) -> HotRodResult<String> {
        String::from_utf8(data.to_vec())
            .map_err(|err| HotRodError::Serialization(err.to_string()))
    }
}
