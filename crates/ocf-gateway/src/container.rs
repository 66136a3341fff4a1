//! Process-wide table of live sessions.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ocf_gateway_coap::ClientCommander;
use tracing::warn;

use crate::config::KeepaliveConfig;
use crate::session::Session;

/// Sessions keyed by remote-address string. One entry per live connection,
/// inserted by the connect callback and removed by the disconnect callback.
#[derive(Default)]
pub struct ClientContainer {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
}

impl ClientContainer {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for `commander` and register it.
    pub fn add(&self, commander: ClientCommander, keepalive: KeepaliveConfig) -> Arc<Session> {
        let key = commander.remote_addr().to_string();
        let session = Session::new(commander, keepalive);
        let previous = self
            .sessions
            .lock()
            .expect("sessions mutex poisoned")
            .insert(key.clone(), session.clone());
        if let Some(previous) = previous {
            // Stale entry for a reused address; close it out of the table.
            warn!(peer = %key, "replacing stale session");
            previous.close();
        }
        session
    }

    /// Session for `addr`, when one is live.
    pub fn find(&self, addr: &str) -> Option<Arc<Session>> {
        self.sessions
            .lock()
            .expect("sessions mutex poisoned")
            .get(addr)
            .cloned()
    }

    /// Deregister the session of `commander` and close it. The close runs
    /// outside the lock; it cancels observations.
    pub fn remove(&self, commander: &ClientCommander) {
        let session = self
            .sessions
            .lock()
            .expect("sessions mutex poisoned")
            .remove(&commander.remote_addr().to_string());
        if let Some(session) = session {
            session.close();
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().expect("sessions mutex poisoned").len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
