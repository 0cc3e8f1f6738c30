//! # Connection Pool
//!
//! Purpose: Hand out pooled connections round-robin and reconcile the pool
//! against cluster topology changes without disturbing in-flight exchanges.
//!
//! ## Design Principles
//! 1. **Lock For Bookkeeping Only**: The pool mutex covers cursor math and
//!    set mutation, never I/O.
//! 2. **Drain Before Close**: A removed member is disconnected only after
//!    the pool lock is dropped; `disconnect` itself waits on the
//!    per-connection lock, so a leased exchange finishes first.
//! 3. **Stable Membership Identity**: Members are keyed by endpoint, and a
//!    retained member keeps its `Arc` across reconciliation.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use hotrod_common::{ConnectionError, HotRodError, HotRodResult};

use crate::connection::SocketConnection;

struct PoolState {
    connections: Vec<Arc<SocketConnection>>,
    cursor: usize,
}

/// Round-robin pool over the cluster's current members.
pub struct ConnectionPool {
    state: Mutex<PoolState>,
}

impl ConnectionPool {
    /// Builds a pool over an initial member set.
    pub fn new(connections: Vec<SocketConnection>) -> Self {
        ConnectionPool {
            state: Mutex::new(PoolState {
                connections: connections.into_iter().map(Arc::new).collect(),
                cursor: 0,
            }),
        }
    }

    /// Opens every member that is not yet open.
    pub fn connect(&self) -> HotRodResult<()> {
        for conn in self.snapshot() {
            match conn.connect() {
                Ok(()) => {}
                // Another caller won the race for this member.
                Err(HotRodError::Connection(ConnectionError::AlreadyConnected)) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Closes every open member. A no-op for members already closed.
    pub fn disconnect(&self) {
        for conn in self.snapshot() {
            if conn.connected() {
                let _ = conn.disconnect();
            }
        }
    }

    /// Whether every member is currently open.
    pub fn connected(&self) -> bool {
        let conns = self.snapshot();
        !conns.is_empty() && conns.iter().all(|c| c.connected())
    }

    /// Returns the next member round-robin.
    ///
    /// The caller serializes its exchange by taking the connection's lease.
    pub fn lease(&self) -> HotRodResult<Arc<SocketConnection>> {
        let mut state = self.state.lock();
        if state.connections.is_empty() {
            return Err(ConnectionError::NotConnected.into());
        }
        let idx = state.cursor % state.connections.len();
        state.cursor = state.cursor.wrapping_add(1);
        Ok(Arc::clone(&state.connections[idx]))
    }

    /// Reconciles the pool against a new member set.
    ///
    /// Unknown endpoints are added (closed; they open lazily on first
    /// lease), members absent from `incoming` are removed, and removed
    /// members that were open are disconnected after their current
    /// exchange, if any, completes.
    pub fn update(&self, incoming: Vec<SocketConnection>) {
        let mut removed = Vec::new();
        let mut added = 0usize;
        {
            let mut state = self.state.lock();
            let keep: HashSet<(String, u16)> = incoming
                .iter()
                .map(|c| (c.host().to_string(), c.port()))
                .collect();
            for conn in incoming {
                if !state.connections.iter().any(|c| **c == conn) {
                    debug!(endpoint = %conn, "adding pool member");
                    state.connections.push(Arc::new(conn));
                    added += 1;
                }
            }
            state.connections.retain(|conn| {
                if keep.contains(&(conn.host().to_string(), conn.port())) {
                    true
                } else {
                    removed.push(Arc::clone(conn));
                    false
                }
            });
        }
        if added > 0 || !removed.is_empty() {
            info!(added, removed = removed.len(), "pool reconciled");
        }
        for conn in removed {
            if conn.connected() {
                let _ = conn.disconnect();
            }
        }
    }

    /// Current member endpoints, in pool order.
    pub fn endpoints(&self) -> Vec<(String, u16)> {
        self.snapshot()
            .iter()
            .map(|c| (c.host().to_string(), c.port()))
            .collect()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Whether the pool has no members.
    pub fn is_empty(&self) -> bool {
        self.state.lock().connections.is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<SocketConnection>> {
        self.state.lock().connections.clone()
    }
}
