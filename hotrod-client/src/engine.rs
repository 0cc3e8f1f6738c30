//! # Protocol Engine
//!
//! Purpose: Run one request/response exchange end to end: assign the
//! correlation id, stamp header state, encode, lease a connection, decode
//! the reply, translate error responses, and apply piggy-backed topology
//! changes.
//!
//! ## Design Principles
//! 1. **Serialized Exchanges**: The connection lease spans send through
//!    decode, so replies arrive in request order on that connection and no
//!    response cache is needed.
//! 2. **Short Locks**: The id counter and topology id are guarded by their
//!    own mutexes, never held across socket I/O.
//! 3. **Errors Carry Evidence**: Translated error responses keep the server
//!    message and the decoded response.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use hotrod_common::codec::Decoder;
use hotrod_common::protocol::{
    decode_response, encode_request, status, ErrorResponse, Request, Response, ResponseHeader,
};
use hotrod_common::{HotRodError, HotRodResult};

use crate::connection::SocketConnection;
use crate::pool::ConnectionPool;

/// Correlation ids wrap back to 1 after this bound.
const ID_WRAP: u64 = 1 << 63;

/// Blocking request/response engine over a connection pool.
pub struct ProtocolEngine {
    pool: ConnectionPool,
    timeout: Duration,
    cache_name: Option<String>,
    intelligence: u8,
    next_id: Mutex<u64>,
    topology: Mutex<u64>,
    reconcile: Mutex<()>,
}

impl ProtocolEngine {
    /// Builds an engine over a pool.
    ///
    /// `cache_name` and `intelligence` are stamped into every request
    /// header; `timeout` bounds each send and receive and is inherited by
    /// connections built on topology changes.
    pub fn new(
        pool: ConnectionPool,
        timeout: Duration,
        cache_name: Option<String>,
        intelligence: u8,
    ) -> Self {
        ProtocolEngine {
            pool,
            timeout,
            cache_name,
            intelligence,
            next_id: Mutex::new(0),
            topology: Mutex::new(0),
            reconcile: Mutex::new(()),
        }
    }

    /// The pool this engine exchanges over.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Topology id the engine last observed.
    pub fn topology_id(&self) -> u64 {
        *self.topology.lock()
    }

    /// Sends a request and blocks until its response is decoded.
    ///
    /// Error responses are translated to typed errors; a topology change
    /// marker triggers pool reconciliation before the response is returned.
    pub fn send<R: Request>(&self, request: &mut R) -> HotRodResult<Response> {
        let id = self.next_id();
        {
            let header = request.header_mut();
            header.id = id;
            header.cname = self.cache_name.clone();
            header.ci = self.intelligence;
            header.t_id = self.topology_id();
        }
        let encoded = encode_request(request)?;
        debug!(id, op = request.header().op, bytes = encoded.len(), "sending request");

        let conn = self.pool.lease()?;
        let response = {
            let mut lease = conn.lease();
            lease.ensure_connected()?;
            lease.send(&encoded)?;
            let mut decoder = Decoder::new(&mut lease);
            decode_response(&mut decoder)?
        };
        debug!(
            id = response.header().id,
            variant = response.variant_name(),
            "received response"
        );

        let response = match response {
            Response::Error(err) => return Err(self.translate_error(id, err)),
            other => other,
        };
        if response.header().id != id {
            return Err(HotRodError::Protocol(format!(
                "response id {} does not match request id {id}",
                response.header().id
            )));
        }
        if response.header().tcm != 0 {
            self.apply_topology(response.header());
        }
        Ok(response)
    }

    fn translate_error(&self, request_id: u64, err: ErrorResponse) -> HotRodError {
        let message = err.error_message.clone();
        let response_status = err.header.status;
        let response_id = err.header.id;
        error!(
            status = response_status,
            request_id, %message,
            "server returned error response"
        );
        let response = Box::new(Response::Error(err));
        if response_id != request_id {
            // An uncorrelated reply: the server could not read the request
            // well enough to echo its id.
            return HotRodError::Server { message, response };
        }
        match response_status {
            status::SERVER_ERR | status::CMD_TIMEOUT => HotRodError::Server { message, response },
            status::UNKNOWN_CMD
            | status::UNKNOWN_VERSION
            | status::PARSING_ERR
            | status::INVALID_MSGID_OR_MAGIC => HotRodError::Client { message, response },
            _ => HotRodError::Response { message, response },
        }
    }

    fn apply_topology(&self, header: &ResponseHeader) {
        let Some(tc) = header.tc.as_ref() else {
            return;
        };
        // The reconcile lock serializes updates; the topology id sits behind
        // its own short lock so sends reading it never wait on pool I/O.
        let _updating = self.reconcile.lock();
        {
            let mut current = self.topology.lock();
            if tc.id == *current {
                return;
            }
            info!(
                old_id = *current,
                new_id = tc.id,
                hosts = tc.hosts.len(),
                "topology changed, reconciling pool"
            );
            *current = tc.id;
        }
        let connections = tc
            .hosts
            .iter()
            .map(|host| SocketConnection::new(host.ip.clone(), host.port, self.timeout))
            .collect();
        self.pool.update(connections);
    }

    fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock();
        if *id >= ID_WRAP {
            *id = 0;
        }
        *id += 1;
        *id
    }
}
