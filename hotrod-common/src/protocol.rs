//! # Hot Rod Message Registry
//!
//! Purpose: Define every request and response variant of the Hot Rod
//! protocol (version 25) as schema-described structs, plus the constants
//! they are built from.
//!
//! ## Design Principles
//! 1. **Definition Order Is Wire Order**: Each message's field table lists
//!    fields exactly as they appear on the wire.
//! 2. **Stamped Op Codes**: Constructors and `Default` impls stamp the
//!    variant's op code into the header so a freshly built message is
//!    already well-formed.
//! 3. **Dense Op Dispatch**: `decode_response` resolves the header's op
//!    byte through a single `match`; unknown codes are decode failures.
//!
//! ## Wire Layout Example
//!
//! ```text
//! PingRequest{id=1}:
//! +-------+------+---------+------+-------+-------+------+------+
//! | magic | id   | version | op   | cname | flags | ci   | t_id |
//! +-------+------+---------+------+-------+-------+------+------+
//! | A0    | 01   | 19      | 17   | 00    | 00    | 01   | 00   |
//! +-------+------+---------+------+-------+-------+------+------+
//! ```

use bytes::Bytes;

use crate::codec::Decoder;
use crate::error::{HotRodError, HotRodResult};
use crate::schema::{decode_fields, encode_fields, encode_message, Field, FieldKind, Schema};

/// First byte of every request.
pub const REQUEST_MAGIC: u8 = 0xA0;

/// First byte of every response.
pub const RESPONSE_MAGIC: u8 = 0xA1;

/// Protocol version spoken by this library.
pub const PROTOCOL_VERSION: u8 = 25;

/// Status codes carried in response headers.
pub mod status {
    pub const OK: u8 = 0x00;
    pub const ACTION_FAILED: u8 = 0x01;
    pub const KEY_DOES_NOT_EXIST: u8 = 0x02;
    pub const OK_WITH_VALUE: u8 = 0x03;
    pub const FAIL_WITH_VALUE: u8 = 0x04;
    pub const OK_COMP_ENABLED: u8 = 0x06;
    pub const OK_PREV_VAL_COMP_ENABLED: u8 = 0x07;
    pub const NOT_EXEC_PREV_VAL_COMP_ENABLED: u8 = 0x08;
    pub const INVALID_MSGID_OR_MAGIC: u8 = 0x81;
    pub const UNKNOWN_CMD: u8 = 0x82;
    pub const UNKNOWN_VERSION: u8 = 0x83;
    pub const PARSING_ERR: u8 = 0x84;
    pub const SERVER_ERR: u8 = 0x85;
    pub const CMD_TIMEOUT: u8 = 0x86;
}

/// Single-byte time unit codes used by expirable writes.
pub mod time_unit {
    pub const SECONDS: u8 = 0x00;
    pub const MILLISECONDS: u8 = 0x01;
    pub const NANOSECONDS: u8 = 0x02;
    pub const MICROSECONDS: u8 = 0x03;
    pub const MINUTES: u8 = 0x04;
    pub const HOURS: u8 = 0x05;
    pub const DAYS: u8 = 0x06;
    pub const DEFAULT: u8 = 0x07;
    pub const INFINITE: u8 = 0x08;
}

/// Client intelligence levels declared in request headers.
pub mod intelligence {
    pub const BASIC: u8 = 0x01;
    pub const TOPOLOGY: u8 = 0x02;
    pub const HASH: u8 = 0x03;
}

/// Request header flag bits.
pub mod flags {
    pub const FORCE_RETURN_VALUE: u64 = 0x0001;
    pub const DEFAULT_LIFESPAN: u64 = 0x0002;
    pub const DEFAULT_MAXIDLE: u64 = 0x0004;
    pub const SKIP_CACHE_LOAD: u64 = 0x0008;
    pub const SKIP_INDEXING: u64 = 0x0010;
}

/// Header prepended to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestHeader {
    /// Always `REQUEST_MAGIC`.
    pub magic: u8,
    /// Correlation id assigned by the protocol engine.
    pub id: u64,
    /// Protocol version, `PROTOCOL_VERSION` unless overridden.
    pub version: u8,
    /// Op code of the enclosing request variant.
    pub op: u8,
    /// Named cache, absent for the default cache.
    pub cname: Option<String>,
    /// Flag bits, see [`flags`].
    pub flags: u64,
    /// Declared client intelligence.
    pub ci: u8,
    /// Topology id the client last observed.
    pub t_id: u64,
}

impl Default for RequestHeader {
    fn default() -> Self {
        RequestHeader {
            magic: REQUEST_MAGIC,
            id: 0,
            version: PROTOCOL_VERSION,
            op: 0,
            cname: None,
            flags: 0,
            ci: intelligence::BASIC,
            t_id: 0,
        }
    }
}

impl RequestHeader {
    /// Builds a default header with the given op code stamped.
    pub fn with_op(op: u8) -> Self {
        RequestHeader {
            op,
            ..RequestHeader::default()
        }
    }
}

fn request_header_cname(m: &RequestHeader) -> Option<&str> {
    m.cname.as_deref()
}

impl Schema for RequestHeader {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<RequestHeader>] = &[
            Field {
                name: "magic",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.magic,
                    set: |m, v| m.magic = v,
                },
            },
            Field {
                name: "id",
                condition: None,
                kind: FieldKind::Uvarlong {
                    get: |m| m.id,
                    set: |m, v| m.id = v,
                },
            },
            Field {
                name: "version",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.version,
                    set: |m, v| m.version = v,
                },
            },
            Field {
                name: "op",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.op,
                    set: |m, v| m.op = v,
                },
            },
            Field {
                name: "cname",
                condition: None,
                kind: FieldKind::Str {
                    get: request_header_cname,
                    set: |m, v| m.cname = if v.is_empty() { None } else { Some(v) },
                    optional: true,
                },
            },
            Field {
                name: "flags",
                condition: None,
                kind: FieldKind::Uvarint {
                    get: |m| m.flags,
                    set: |m, v| m.flags = v,
                },
            },
            Field {
                name: "ci",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.ci,
                    set: |m, v| m.ci = v,
                },
            },
            Field {
                name: "t_id",
                condition: None,
                kind: FieldKind::Uvarint {
                    get: |m| m.t_id,
                    set: |m, v| m.t_id = v,
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "RequestHeader"
    }
}

/// One cluster member advertised by a topology change.
#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    /// Member address.
    pub ip: String,
    /// Member Hot Rod port.
    pub port: u16,
}

impl Default for Host {
    fn default() -> Self {
        Host {
            ip: "127.0.0.1".to_string(),
            port: 11222,
        }
    }
}

fn host_ip(m: &Host) -> Option<&str> {
    Some(&m.ip)
}

impl Schema for Host {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<Host>] = &[
            Field {
                name: "ip",
                condition: None,
                kind: FieldKind::Str {
                    get: host_ip,
                    set: |m, v| m.ip = v,
                    optional: false,
                },
            },
            Field {
                name: "port",
                condition: None,
                kind: FieldKind::Ushort {
                    get: |m| m.port,
                    set: |m, v| m.port = v,
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "Host"
    }
}

/// Cluster membership piggy-backed on a response header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopologyChangeHeader {
    /// Topology version id.
    pub id: u64,
    /// Number of members that follow.
    pub n: u64,
    /// Cluster members, `n` entries.
    pub hosts: Vec<Host>,
}

impl Schema for TopologyChangeHeader {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<TopologyChangeHeader>] = &[
            Field {
                name: "id",
                condition: None,
                kind: FieldKind::Uvarint {
                    get: |m| m.id,
                    set: |m, v| m.id = v,
                },
            },
            Field {
                name: "n",
                condition: None,
                kind: FieldKind::Uvarint {
                    get: |m| m.n,
                    set: |m, v| m.n = v,
                },
            },
            Field {
                name: "hosts",
                condition: None,
                kind: FieldKind::List {
                    size: |m| m.n,
                    encode: |m, enc| {
                        for host in &m.hosts {
                            encode_fields(host, enc)?;
                        }
                        Ok(())
                    },
                    decode_element: |m, dec| {
                        let mut host = Host::default();
                        decode_fields(&mut host, dec, 0)?;
                        m.hosts.push(host);
                        Ok(())
                    },
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "TopologyChangeHeader"
    }
}

/// Header prepended to every response.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseHeader {
    /// Always `RESPONSE_MAGIC`.
    pub magic: u8,
    /// Correlation id echoing the request.
    pub id: u64,
    /// Op code of the enclosing response variant.
    pub op: u8,
    /// Outcome status, see [`status`].
    pub status: u8,
    /// Topology-changed marker; the `tc` header follows iff non-zero.
    pub tcm: u8,
    /// Topology change, present iff `tcm != 0`.
    pub tc: Option<TopologyChangeHeader>,
}

impl Default for ResponseHeader {
    fn default() -> Self {
        ResponseHeader {
            magic: RESPONSE_MAGIC,
            id: 0,
            op: 0,
            status: status::OK,
            tcm: 0,
            tc: None,
        }
    }
}

impl Schema for ResponseHeader {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<ResponseHeader>] = &[
            Field {
                name: "magic",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.magic,
                    set: |m, v| m.magic = v,
                },
            },
            Field {
                name: "id",
                condition: None,
                kind: FieldKind::Uvarlong {
                    get: |m| m.id,
                    set: |m, v| m.id = v,
                },
            },
            Field {
                name: "op",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.op,
                    set: |m, v| m.op = v,
                },
            },
            Field {
                name: "status",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.status,
                    set: |m, v| m.status = v,
                },
            },
            Field {
                name: "tcm",
                condition: None,
                kind: FieldKind::Byte {
                    get: |m| m.tcm,
                    set: |m, v| m.tcm = v,
                },
            },
            Field {
                name: "tc",
                condition: Some(|m| m.tcm != 0),
                kind: FieldKind::Composite {
                    encode: |m, enc| match &m.tc {
                        Some(tc) => encode_fields(tc, enc),
                        None => Err(HotRodError::missing_field("ResponseHeader", "tc")),
                    },
                    decode: |m, dec| {
                        let mut tc = TopologyChangeHeader::default();
                        decode_fields(&mut tc, dec, 0)?;
                        m.tc = Some(tc);
                        Ok(())
                    },
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "ResponseHeader"
    }
}

/// A request variant: a schema with a fixed op code and a request header as
/// its first field.
pub trait Request: Schema {
    /// Op code stamped into the header.
    const OP_CODE: u8;

    /// Read access to the header.
    fn header(&self) -> &RequestHeader;

    /// Mutable access for the protocol engine to stamp id, cache name,
    /// intelligence, flags, and topology id.
    fn header_mut(&mut self) -> &mut RequestHeader;
}

/// Encodes a request into its wire representation.
pub fn encode_request<R: Request>(request: &R) -> HotRodResult<Bytes> {
    encode_message(request)
}

/// Requests carrying expiry fields (the put family).
pub trait Expirable {
    /// Sets the lifespan unit and, when given, its amount.
    fn set_lifespan(&mut self, amount: Option<u64>, unit: u8);

    /// Sets the max-idle unit and, when given, its amount.
    fn set_max_idle(&mut self, amount: Option<u64>, unit: u8);
}

macro_rules! request_header_field {
    ($name:ident) => {
        Field {
            name: "header",
            condition: None,
            kind: FieldKind::Composite {
                encode: |m: &$name, enc| encode_fields(&m.header, enc),
                decode: |m: &mut $name, dec| decode_fields(&mut m.header, dec, 0),
            },
        }
    };
}

macro_rules! key_request {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            /// Request header with the variant op code stamped.
            pub header: RequestHeader,
            /// Serialized key.
            pub key: Option<Vec<u8>>,
        }

        impl $name {
            /// Builds the request for a serialized key.
            pub fn new(key: Vec<u8>) -> Self {
                $name {
                    header: RequestHeader::with_op($op),
                    key: Some(key),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    header: RequestHeader::with_op($op),
                    key: None,
                }
            }
        }

        impl Schema for $name {
            fn fields() -> &'static [Field<Self>] {
                fn get_key(m: &$name) -> Option<&[u8]> {
                    m.key.as_deref()
                }
                static FIELDS: &[Field<$name>] = &[
                    request_header_field!($name),
                    Field {
                        name: "key",
                        condition: None,
                        kind: FieldKind::Bytes {
                            get: get_key,
                            set: |m, v| m.key = Some(v),
                        },
                    },
                ];
                FIELDS
            }

            fn message_name() -> &'static str {
                stringify!($name)
            }
        }

        impl Request for $name {
            const OP_CODE: u8 = $op;

            fn header(&self) -> &RequestHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut RequestHeader {
                &mut self.header
            }
        }
    };
}

macro_rules! put_like_request {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            /// Request header with the variant op code stamped.
            pub header: RequestHeader,
            /// Serialized key.
            pub key: Option<Vec<u8>>,
            /// Lifespan and max-idle units, `(hi, lo)` nibbles.
            pub tunits: (u8, u8),
            /// Lifespan amount; on the wire only for explicit units.
            pub lifespan: u64,
            /// Max-idle amount; on the wire only for explicit units.
            pub max_idle: u64,
            /// Serialized value.
            pub value: Option<Vec<u8>>,
        }

        impl $name {
            /// Builds the request for a serialized key/value pair.
            pub fn new(key: Vec<u8>, value: Vec<u8>) -> Self {
                $name {
                    key: Some(key),
                    value: Some(value),
                    ..Self::default()
                }
            }
        }

        impl Expirable for $name {
            fn set_lifespan(&mut self, amount: Option<u64>, unit: u8) {
                self.tunits.0 = unit;
                if let Some(amount) = amount {
                    self.lifespan = amount;
                }
            }

            fn set_max_idle(&mut self, amount: Option<u64>, unit: u8) {
                self.tunits.1 = unit;
                if let Some(amount) = amount {
                    self.max_idle = amount;
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    header: RequestHeader::with_op($op),
                    key: None,
                    tunits: (time_unit::DEFAULT, time_unit::DEFAULT),
                    lifespan: 10,
                    max_idle: 10,
                    value: None,
                }
            }
        }

        impl Schema for $name {
            fn fields() -> &'static [Field<Self>] {
                fn get_key(m: &$name) -> Option<&[u8]> {
                    m.key.as_deref()
                }
                fn get_value(m: &$name) -> Option<&[u8]> {
                    m.value.as_deref()
                }
                static FIELDS: &[Field<$name>] = &[
                    request_header_field!($name),
                    Field {
                        name: "key",
                        condition: None,
                        kind: FieldKind::Bytes {
                            get: get_key,
                            set: |m, v| m.key = Some(v),
                        },
                    },
                    Field {
                        name: "tunits",
                        condition: None,
                        kind: FieldKind::SplitByte {
                            get: |m| m.tunits,
                            set: |m, v| m.tunits = v,
                        },
                    },
                    Field {
                        name: "lifespan",
                        condition: Some(|m| {
                            !matches!(m.tunits.0, time_unit::DEFAULT | time_unit::INFINITE)
                        }),
                        kind: FieldKind::Uvarint {
                            get: |m| m.lifespan,
                            set: |m, v| m.lifespan = v,
                        },
                    },
                    Field {
                        name: "max_idle",
                        condition: Some(|m| {
                            !matches!(m.tunits.1, time_unit::DEFAULT | time_unit::INFINITE)
                        }),
                        kind: FieldKind::Uvarint {
                            get: |m| m.max_idle,
                            set: |m, v| m.max_idle = v,
                        },
                    },
                    Field {
                        name: "value",
                        condition: None,
                        kind: FieldKind::Bytes {
                            get: get_value,
                            set: |m, v| m.value = Some(v),
                        },
                    },
                ];
                FIELDS
            }

            fn message_name() -> &'static str {
                stringify!($name)
            }
        }

        impl Request for $name {
            const OP_CODE: u8 = $op;

            fn header(&self) -> &RequestHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut RequestHeader {
                &mut self.header
            }
        }
    };
}

put_like_request!(
    /// Stores a value under a key.
    PutRequest,
    0x01
);
put_like_request!(
    /// Stores a value only when the key is absent.
    PutIfAbsentRequest,
    0x05
);
put_like_request!(
    /// Replaces the value only when the key is present.
    ReplaceRequest,
    0x07
);

key_request!(
    /// Fetches the value stored under a key.
    GetRequest,
    0x03
);
key_request!(
    /// Removes a key and its value.
    RemoveRequest,
    0x0B
);
key_request!(
    /// Asks whether a key is present.
    ContainsKeyRequest,
    0x0F
);

/// Liveness probe carrying only a header.
#[derive(Debug, Clone, PartialEq)]
pub struct PingRequest {
    /// Request header with the ping op code stamped.
    pub header: RequestHeader,
}

impl Default for PingRequest {
    fn default() -> Self {
        PingRequest {
            header: RequestHeader::with_op(Self::OP_CODE),
        }
    }
}

impl PingRequest {
    /// Builds a ping request.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Schema for PingRequest {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<PingRequest>] = &[request_header_field!(PingRequest)];
        FIELDS
    }

    fn message_name() -> &'static str {
        "PingRequest"
    }
}

impl Request for PingRequest {
    const OP_CODE: u8 = 0x17;

    fn header(&self) -> &RequestHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RequestHeader {
        &mut self.header
    }
}

macro_rules! response_header_field {
    ($name:ident) => {
        Field {
            name: "header",
            condition: None,
            kind: FieldKind::Composite {
                encode: |m: &$name, enc| encode_fields(&m.header, enc),
                decode: |m: &mut $name, dec| decode_fields(&mut m.header, dec, 0),
            },
        }
    };
}

macro_rules! header_only_response {
    ($(#[$doc:meta])* $name:ident, $op:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            /// Response header.
            pub header: ResponseHeader,
        }

        impl $name {
            /// Op code identifying this variant.
            pub const OP_CODE: u8 = $op;
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    header: ResponseHeader {
                        op: $op,
                        ..ResponseHeader::default()
                    },
                }
            }
        }

        impl Schema for $name {
            fn fields() -> &'static [Field<Self>] {
                static FIELDS: &[Field<$name>] = &[response_header_field!($name)];
                FIELDS
            }

            fn message_name() -> &'static str {
                stringify!($name)
            }
        }
    };
}

macro_rules! prev_value_response {
    ($(#[$doc:meta])* $name:ident, $op:expr, $prev_status:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            /// Response header.
            pub header: ResponseHeader,
            /// Previously stored value, present only for the forcing status.
            pub prev_value: Option<Vec<u8>>,
        }

        impl $name {
            /// Op code identifying this variant.
            pub const OP_CODE: u8 = $op;
        }

        impl Default for $name {
            fn default() -> Self {
                $name {
                    header: ResponseHeader {
                        op: $op,
                        ..ResponseHeader::default()
                    },
                    prev_value: None,
                }
            }
        }

        impl Schema for $name {
            fn fields() -> &'static [Field<Self>] {
                fn get_prev(m: &$name) -> Option<&[u8]> {
                    m.prev_value.as_deref()
                }
                static FIELDS: &[Field<$name>] = &[
                    response_header_field!($name),
                    Field {
                        name: "prev_value",
                        condition: Some(|m| m.header.status == $prev_status),
                        kind: FieldKind::Bytes {
                            get: get_prev,
                            set: |m, v| m.prev_value = Some(v),
                        },
                    },
                ];
                FIELDS
            }

            fn message_name() -> &'static str {
                stringify!($name)
            }
        }
    };
}

prev_value_response!(
    /// Reply to `PutRequest`.
    PutResponse,
    0x02,
    status::OK_WITH_VALUE
);
prev_value_response!(
    /// Reply to `PutIfAbsentRequest`; carries the blocking value on failure.
    PutIfAbsentResponse,
    0x06,
    status::FAIL_WITH_VALUE
);
prev_value_response!(
    /// Reply to `ReplaceRequest`.
    ReplaceResponse,
    0x08,
    status::OK_WITH_VALUE
);
prev_value_response!(
    /// Reply to `RemoveRequest`.
    RemoveResponse,
    0x0C,
    status::OK_WITH_VALUE
);

header_only_response!(
    /// Reply to `ContainsKeyRequest`; presence is carried by the status.
    ContainsKeyResponse,
    0x10
);
header_only_response!(
    /// Reply to `PingRequest`.
    PingResponse,
    0x18
);

/// Reply to `GetRequest`.
#[derive(Debug, Clone, PartialEq)]
pub struct GetResponse {
    /// Response header.
    pub header: ResponseHeader,
    /// Stored value, present only on `OK`.
    pub value: Option<Vec<u8>>,
}

impl GetResponse {
    /// Op code identifying this variant.
    pub const OP_CODE: u8 = 0x04;
}

impl Default for GetResponse {
    fn default() -> Self {
        GetResponse {
            header: ResponseHeader {
                op: Self::OP_CODE,
                ..ResponseHeader::default()
            },
            value: None,
        }
    }
}

impl Schema for GetResponse {
    fn fields() -> &'static [Field<Self>] {
        fn get_value(m: &GetResponse) -> Option<&[u8]> {
            m.value.as_deref()
        }
        static FIELDS: &[Field<GetResponse>] = &[
            response_header_field!(GetResponse),
            Field {
                name: "value",
                condition: Some(|m| m.header.status == status::OK),
                kind: FieldKind::Bytes {
                    get: get_value,
                    set: |m, v| m.value = Some(v),
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "GetResponse"
    }
}

/// Error reply usable for any request, including unreadable ones.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    /// Response header; `id` may be zero when the request was unreadable.
    pub header: ResponseHeader,
    /// Human-readable server message.
    pub error_message: String,
}

impl ErrorResponse {
    /// Op code identifying this variant.
    pub const OP_CODE: u8 = 0x50;
}

impl Default for ErrorResponse {
    fn default() -> Self {
        ErrorResponse {
            header: ResponseHeader {
                op: Self::OP_CODE,
                ..ResponseHeader::default()
            },
            error_message: String::new(),
        }
    }
}

fn error_message(m: &ErrorResponse) -> Option<&str> {
    Some(&m.error_message)
}

impl Schema for ErrorResponse {
    fn fields() -> &'static [Field<Self>] {
        static FIELDS: &[Field<ErrorResponse>] = &[
            response_header_field!(ErrorResponse),
            Field {
                name: "error_message",
                condition: None,
                kind: FieldKind::Str {
                    get: error_message,
                    set: |m, v| m.error_message = v,
                    optional: false,
                },
            },
        ];
        FIELDS
    }

    fn message_name() -> &'static str {
        "ErrorResponse"
    }
}

/// Every response variant the decoder can produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Put(PutResponse),
    Get(GetResponse),
    PutIfAbsent(PutIfAbsentResponse),
    Replace(ReplaceResponse),
    Remove(RemoveResponse),
    ContainsKey(ContainsKeyResponse),
    Ping(PingResponse),
    Error(ErrorResponse),
}

impl Response {
    /// The response header, regardless of variant.
    pub fn header(&self) -> &ResponseHeader {
        match self {
            Response::Put(r) => &r.header,
            Response::Get(r) => &r.header,
            Response::PutIfAbsent(r) => &r.header,
            Response::Replace(r) => &r.header,
            Response::Remove(r) => &r.header,
            Response::ContainsKey(r) => &r.header,
            Response::Ping(r) => &r.header,
            Response::Error(r) => &r.header,
        }
    }

    /// Variant name for diagnostics.
    pub fn variant_name(&self) -> &'static str {
        match self {
            Response::Put(_) => "PutResponse",
            Response::Get(_) => "GetResponse",
            Response::PutIfAbsent(_) => "PutIfAbsentResponse",
            Response::Replace(_) => "ReplaceResponse",
            Response::Remove(_) => "RemoveResponse",
            Response::ContainsKey(_) => "ContainsKeyResponse",
            Response::Ping(_) => "PingResponse",
            Response::Error(_) => "ErrorResponse",
        }
    }
}

/// Decodes one response: header first, then the op-specific remainder.
///
/// The header's op byte selects the variant; its fields resume decoding
/// after the header descriptor (`skip = 1`).
pub fn decode_response(dec: &mut Decoder<'_>) -> HotRodResult<Response> {
    let mut header = ResponseHeader::default();
    decode_fields(&mut header, dec, 0)?;

    let response = match header.op {
        PutResponse::OP_CODE => {
            let mut r = PutResponse {
                header,
                prev_value: None,
            };
            decode_fields(&mut r, dec, 1)?;
            Response::Put(r)
        }
        GetResponse::OP_CODE => {
            let mut r = GetResponse {
                header,
                value: None,
            };
            decode_fields(&mut r, dec, 1)?;
            Response::Get(r)
        }
        PutIfAbsentResponse::OP_CODE => {
            let mut r = PutIfAbsentResponse {
                header,
                prev_value: None,
            };
            decode_fields(&mut r, dec, 1)?;
            Response::PutIfAbsent(r)
        }
        ReplaceResponse::OP_CODE => {
            let mut r = ReplaceResponse {
                header,
                prev_value: None,
            };
            decode_fields(&mut r, dec, 1)?;
            Response::Replace(r)
        }
        RemoveResponse::OP_CODE => {
            let mut r = RemoveResponse {
                header,
                prev_value: None,
            };
            decode_fields(&mut r, dec, 1)?;
            Response::Remove(r)
        }
        ContainsKeyResponse::OP_CODE => {
            let mut r = ContainsKeyResponse { header };
            decode_fields(&mut r, dec, 1)?;
            Response::ContainsKey(r)
        }
        PingResponse::OP_CODE => {
            let mut r = PingResponse { header };
            decode_fields(&mut r, dec, 1)?;
            Response::Ping(r)
        }
        ErrorResponse::OP_CODE => {
            let mut r = ErrorResponse {
                header,
                error_message: String::new(),
            };
            decode_fields(&mut r, dec, 1)?;
            Response::Error(r)
        }
        op => {
            return Err(HotRodError::Decode(format!(
                "unsupported response op code 0x{op:02x}"
            )))
        }
    };
    Ok(response)
}
