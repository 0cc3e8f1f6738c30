//! # Declarative Message Schema
//!
//! Purpose: Describe every message as a fixed, ordered table of typed field
//! descriptors and walk that table generically for encode and decode.
//!
//! ## Design Principles
//! 1. **One Table, Both Directions**: Field order is fixed at definition and
//!    shared by encoder and decoder.
//! 2. **Typed Hooks, No Heap**: Conditions, accessors, size hooks, and
//!    nested codecs are plain `fn` pointers stored in static tables.
//! 3. **Partial-Message Hooks**: Conditions and list sizes evaluate against
//!    the partially-built message, so a field decoded earlier can gate or
//!    size a later one.
//!
//! ## Descriptor Layout Example
//!
//! ```text
//! Field { name: "tc", condition: Some(|m| m.tcm != 0), kind: Composite { .. } }
//! Field { name: "hosts", condition: None, kind: List { size: |m| m.n, .. } }
//! ```

use crate::codec::{Decoder, Encoder};
use crate::error::{HotRodError, HotRodResult};

/// Wire shape of one field plus its typed accessors.
pub enum FieldKind<M> {
    /// Single unsigned byte.
    Byte {
        /// Reads the field value.
        get: fn(&M) -> u8,
        /// Writes a decoded value back.
        set: fn(&mut M, u8),
    },
    /// Big-endian unsigned short.
    Ushort {
        /// Reads the field value.
        get: fn(&M) -> u16,
        /// Writes a decoded value back.
        set: fn(&mut M, u16),
    },
    /// Two 4-bit values packed into one byte, high nibble first.
    SplitByte {
        /// Reads the nibble pair.
        get: fn(&M) -> (u8, u8),
        /// Writes a decoded nibble pair back.
        set: fn(&mut M, (u8, u8)),
    },
    /// Unsigned LEB128, at most 5 bytes.
    Uvarint {
        /// Reads the field value.
        get: fn(&M) -> u64,
        /// Writes a decoded value back.
        set: fn(&mut M, u64),
    },
    /// Unsigned LEB128, at most 9 bytes.
    Uvarlong {
        /// Reads the field value.
        get: fn(&M) -> u64,
        /// Writes a decoded value back.
        set: fn(&mut M, u64),
    },
    /// Length-prefixed UTF-8 string; absent encodes as `0x00` when optional.
    Str {
        /// Reads the current value, `None` when absent.
        get: fn(&M) -> Option<&str>,
        /// Writes a decoded string back.
        set: fn(&mut M, String),
        /// Whether the encoder tolerates an absent value.
        optional: bool,
    },
    /// Length-prefixed byte string.
    Bytes {
        /// Reads the current value, `None` when absent.
        get: fn(&M) -> Option<&[u8]>,
        /// Writes a decoded byte string back.
        set: fn(&mut M, Vec<u8>),
    },
    /// Nested message encoded inline.
    Composite {
        /// Encodes the nested message.
        encode: fn(&M, &mut Encoder) -> HotRodResult<()>,
        /// Decodes the nested message into the parent.
        decode: fn(&mut M, &mut Decoder<'_>) -> HotRodResult<()>,
    },
    /// Back-to-back elements whose count comes from a sibling field.
    List {
        /// Evaluates the element count against the partially-decoded parent.
        size: fn(&M) -> u64,
        /// Encodes every element in order.
        encode: fn(&M, &mut Encoder) -> HotRodResult<()>,
        /// Decodes one element and appends it to the parent.
        decode_element: fn(&mut M, &mut Decoder<'_>) -> HotRodResult<()>,
    },
}

/// One field of a message schema.
pub struct Field<M> {
    /// Field name, used in encode failures.
    pub name: &'static str,
    /// Present on the wire only when this evaluates true.
    pub condition: Option<fn(&M) -> bool>,
    /// Wire shape and accessors.
    pub kind: FieldKind<M>,
}

/// A message described by an ordered field table.
pub trait Schema: Sized + 'static {
    /// The message's fields in wire order.
    fn fields() -> &'static [Field<Self>];

    /// Short message name for diagnostics.
    fn message_name() -> &'static str;
}

/// Encodes every eligible field of `msg` in schema order.
pub fn encode_fields<M: Schema>(msg: &M, enc: &mut Encoder) -> HotRodResult<()> {
    for field in M::fields() {
        if let Some(condition) = field.condition {
            if !condition(msg) {
                continue;
            }
        }
        match field.kind {
            FieldKind::Byte { get, .. } => enc.byte(get(msg)),
            FieldKind::Ushort { get, .. } => enc.ushort(get(msg)),
            FieldKind::SplitByte { get, .. } => {
                let (hi, lo) = get(msg);
                enc.splitbyte(hi, lo);
            }
            FieldKind::Uvarint { get, .. } => enc.uvarint(get(msg))?,
            FieldKind::Uvarlong { get, .. } => enc.uvarlong(get(msg))?,
            FieldKind::Str { get, optional, .. } => match get(msg) {
                Some(s) => enc.string(Some(s))?,
                None if optional => enc.string(None)?,
                None => return Err(HotRodError::missing_field(M::message_name(), field.name)),
            },
            FieldKind::Bytes { get, .. } => match get(msg) {
                Some(b) => enc.bytes(b)?,
                None => return Err(HotRodError::missing_field(M::message_name(), field.name)),
            },
            FieldKind::Composite { encode, .. } => encode(msg, enc)?,
            FieldKind::List { encode, .. } => encode(msg, enc)?,
        }
    }
    Ok(())
}

/// Decodes fields of `msg` in schema order, skipping the first `skip`
/// descriptors (used when a header was already decoded separately).
///
/// Fields whose condition evaluates false keep whatever value the message
/// was constructed with.
pub fn decode_fields<M: Schema>(
    msg: &mut M,
    dec: &mut Decoder<'_>,
    skip: usize,
) -> HotRodResult<()> {
    for field in &M::fields()[skip..] {
        if let Some(condition) = field.condition {
            if !condition(msg) {
                continue;
            }
        }
        match field.kind {
            FieldKind::Byte { set, .. } => set(msg, dec.byte()?),
            FieldKind::Ushort { set, .. } => set(msg, dec.ushort()?),
            FieldKind::SplitByte { set, .. } => set(msg, dec.splitbyte()?),
            FieldKind::Uvarint { set, .. } => set(msg, dec.uvarint()?),
            FieldKind::Uvarlong { set, .. } => set(msg, dec.uvarlong()?),
            FieldKind::Str { set, .. } => set(msg, dec.string()?),
            FieldKind::Bytes { set, .. } => set(msg, dec.bytes()?),
            FieldKind::Composite { decode, .. } => decode(msg, dec)?,
            FieldKind::List {
                size,
                decode_element,
                ..
            } => {
                let n = size(msg);
                for _ in 0..n {
                    decode_element(msg, dec)?;
                }
            }
        }
    }
    Ok(())
}

/// Encodes a whole message into a fresh buffer.
pub fn encode_message<M: Schema>(msg: &M) -> HotRodResult<bytes::Bytes> {
    let mut enc = Encoder::new();
    encode_fields(msg, &mut enc)?;
    Ok(enc.finish())
}
