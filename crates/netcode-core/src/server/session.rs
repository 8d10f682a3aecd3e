//! Per-client bookkeeping on the server: who has joined, what entity
//! they own, and what input sequence they've last had acknowledged.
//!
//! Grounded on the teacher's `net::connection::{ClientConnection,
//! ConnectionManager}`, trimmed of the UDP handshake/salt fields that
//! only matter to a connection-less transport.

use std::collections::HashMap;

use crate::components::NetworkId;
use crate::transport::ClientId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected at the transport level but hasn't sent `join` yet.
    Connecting,
    Joined,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub client_id: ClientId,
    pub state: SessionState,
    pub player_name: String,
    pub network_entity_id: Option<NetworkId>,
    /// Server time, in ms, at which `join` completed. Zero while still
    /// `Connecting`.
    pub joined_at: u64,
    /// Server time, in ms, of the last accepted (non-duplicate,
    /// in-order) input.
    pub last_input_time: u64,
    pub last_input_sequence: u64,
    /// Round-trip time a host has measured for this client. The core
    /// never computes this itself: `pong` only gives the client enough
    /// information to measure its own RTT, so this stays `None` until a
    /// host calls [`SessionManager::set_latency`].
    pub latency_ms: Option<f64>,
}

#[derive(Default)]
pub struct SessionManager {
    sessions: HashMap<ClientId, Session>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(&mut self, client_id: ClientId) {
        self.sessions.insert(
            client_id,
            Session {
                client_id,
                state: SessionState::Connecting,
                player_name: String::new(),
                network_entity_id: None,
                joined_at: 0,
                last_input_time: 0,
                last_input_sequence: 0,
                latency_ms: None,
            },
        );
    }

    pub fn mark_joined(&mut self, client_id: ClientId, player_name: String, network_entity_id: NetworkId, now_ms: u64) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.state = SessionState::Joined;
            session.player_name = player_name;
            session.network_entity_id = Some(network_entity_id);
            session.joined_at = now_ms;
        }
    }

    /// Record that an input sequence was just accepted (applied, not
    /// dropped as out-of-order or duplicate) for this client.
    pub fn record_input(&mut self, client_id: ClientId, sequence: u64, now_ms: u64) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.last_input_sequence = sequence;
            session.last_input_time = now_ms;
        }
    }

    /// Host-supplied round-trip time for a client; the core itself never
    /// measures this (see [`Session::latency_ms`]).
    pub fn set_latency(&mut self, client_id: ClientId, latency_ms: f64) {
        if let Some(session) = self.sessions.get_mut(&client_id) {
            session.latency_ms = Some(latency_ms);
        }
    }

    pub fn remove(&mut self, client_id: ClientId) -> Option<Session> {
        self.sessions.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    pub fn joined_sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values().filter(|s| s.state == SessionState::Joined)
    }

    pub fn joined_client_ids(&self) -> Vec<ClientId> {
        self.joined_sessions().map(|s| s.client_id).collect()
    }

    /// Cloned records for every joined client, exposing the full
    /// [`Session`] (name, join time, last input, latency) rather than
    /// just the bare id.
    pub fn joined_sessions_snapshot(&self) -> Vec<Session> {
        self.joined_sessions().cloned().collect()
    }

    pub fn joined_count(&self) -> usize {
        self.joined_sessions().count()
    }

    pub fn total_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_session_starts_connecting_and_becomes_joined() {
        let mut sessions = SessionManager::new();
        let id = ClientId(1);
        sessions.on_connect(id);
        assert_eq!(sessions.get(id).unwrap().state, SessionState::Connecting);

        sessions.mark_joined(id, "Ada".to_string(), NetworkId("e0".to_string()), 1_000);
        assert_eq!(sessions.get(id).unwrap().state, SessionState::Joined);
        assert_eq!(sessions.get(id).unwrap().joined_at, 1_000);
        assert_eq!(sessions.joined_count(), 1);
    }

    #[test]
    fn recording_input_updates_last_seen_sequence_and_time() {
        let mut sessions = SessionManager::new();
        let id = ClientId(1);
        sessions.on_connect(id);
        sessions.mark_joined(id, "Ada".to_string(), NetworkId("e0".to_string()), 0);

        sessions.record_input(id, 7, 1_500);
        let session = sessions.get(id).unwrap();
        assert_eq!(session.last_input_sequence, 7);
        assert_eq!(session.last_input_time, 1_500);
    }

    #[test]
    fn removing_an_unknown_session_is_a_no_op() {
        let mut sessions = SessionManager::new();
        assert!(sessions.remove(ClientId(42)).is_none());
    }
}
