//! Process-wide session registry for observability.
//!
//! Grounded on `lockframe-server::registry::ConnectionRegistry`: a
//! `RwLock`-guarded map that the supervisor writes to on accept/cleanup and
//! the status endpoint reads from as a point-in-time snapshot. Per-session
//! counters live behind an `Arc<SessionRecord>` the owning connection task
//! also holds, so routine counter updates never take the registry's write
//! lock — only registration and removal do.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;

/// Per-session state visible to the registry and the status endpoint.
#[derive(Debug)]
pub struct SessionRecord {
    /// Remote socket address the connection was accepted from.
    pub remote_addr: SocketAddr,
    /// Wall-clock time the connection was accepted.
    pub connected_at: SystemTime,
    imei: RwLock<Option<String>>,
    packets_received: AtomicU64,
}

impl SessionRecord {
    fn new(remote_addr: SocketAddr, connected_at: SystemTime) -> Self {
        Self { remote_addr, connected_at, imei: RwLock::new(None), packets_received: AtomicU64::new(0) }
    }

    /// Records the device's IMEI once the login frame has been accepted.
    pub fn set_imei(&self, imei: &str) {
        let mut guard = self.imei.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(imei.to_string());
    }

    /// Updates the running count of accepted frames (login + AVL).
    pub fn set_packets_received(&self, count: u64) {
        self.packets_received.store(count, Ordering::Relaxed);
    }

    /// The device's IMEI, once known.
    pub fn imei(&self) -> Option<String> {
        self.imei.read().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// Number of frames accepted so far.
    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }
}

/// Read-only projection of a session, suitable for the status endpoint.
///
/// A copy, not a live handle: taking one never blocks the connection task
/// that owns the underlying `SessionRecord`.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Registry-assigned session id.
    pub session_id: u64,
    /// The device's IMEI, once known.
    pub imei: Option<String>,
    /// Wall-clock time the connection was accepted.
    pub connected_at: SystemTime,
    /// Number of frames accepted so far.
    pub packets_received: u64,
}

/// Process-wide table of live sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u64, Arc<SessionRecord>>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly-accepted connection, returning its session id and
    /// the record the connection task should keep updating.
    pub fn register(&self, remote_addr: SocketAddr, connected_at: SystemTime) -> (u64, Arc<SessionRecord>) {
        let session_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = Arc::new(SessionRecord::new(remote_addr, connected_at));
        let mut sessions = self.sessions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.insert(session_id, Arc::clone(&record));
        (session_id, record)
    }

    /// Removes a session, e.g. on close, fault, or idle timeout.
    pub fn remove(&self, session_id: u64) {
        let mut sessions = self.sessions.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions.remove(&session_id);
    }

    /// Number of currently live sessions.
    pub fn active_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner).len()
    }

    /// A point-in-time snapshot of every live session, for the status
    /// endpoint.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        sessions
            .iter()
            .map(|(&session_id, record)| SessionSnapshot {
                session_id,
                imei: record.imei(),
                connected_at: record.connected_at,
                packets_received: record.packets_received(),
            })
            .collect()
    }
}
