//! Transport abstraction.
//!
//! Grounded on the teacher's `net::endpoint::NetworkEndpoint`, but lifted
//! to a trait: the host supplies the concrete delivery mechanism (UDP,
//! WebSocket, loopback channel, ...) and only has to guarantee
//! ordered-or-dropped delivery and byte-for-byte fidelity of whatever
//! bytes it's handed. Nothing here is async; connection completion is
//! reported through one-shot callbacks fired from inside `poll`, mirroring
//! how the teacher's core crate has no `tokio` dependency of its own even
//! though its binaries do.

mod memory;

pub use memory::{InMemoryNetwork, InMemoryServerTransport, InMemoryTransport};

use crate::error::NetcodeError;

/// A single opaque identifier for a connected peer, assigned by the
/// server-side transport when a connection is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Events a transport reports back to its owner on the next `poll`.
#[derive(Debug)]
pub enum TransportEvent {
    Connected,
    Disconnected { reason: String },
    Message { data: String },
}

#[derive(Debug)]
pub enum ServerTransportEvent {
    ClientConnected { client_id: ClientId },
    ClientDisconnected { client_id: ClientId, reason: String },
    Message { client_id: ClientId, data: String },
}

/// The client side of the transport contract: one connection to one
/// remote endpoint.
pub trait Transport {
    /// Begin connecting. Non-blocking; completion is reported by `poll`
    /// returning `TransportEvent::Connected` or `Disconnected`.
    fn connect(&mut self) -> Result<(), NetcodeError>;

    /// Send one already-encoded frame. Delivery is ordered-or-dropped:
    /// the transport may drop a frame outright but must never deliver
    /// frames out of the order they were sent, and must never corrupt
    /// or split one.
    fn send(&mut self, data: &str) -> Result<(), NetcodeError>;

    fn close(&mut self);

    /// Drain and return all events observed since the last call.
    fn poll(&mut self) -> Vec<TransportEvent>;

    fn is_connected(&self) -> bool;
}

/// The server side: accepts many clients, addresses them by `ClientId`.
pub trait ServerTransport {
    fn listen(&mut self) -> Result<(), NetcodeError>;

    fn send_to(&mut self, client_id: ClientId, data: &str) -> Result<(), NetcodeError>;

    fn broadcast(&mut self, data: &str) -> Result<(), NetcodeError> {
        let ids: Vec<ClientId> = self.connected_clients();
        for id in ids {
            self.send_to(id, data)?;
        }
        Ok(())
    }

    /// Broadcast to every connected client except `exclude` — used for
    /// messages like `player_joined` where the subject of the message
    /// already has its own direct reply (`join_accepted`).
    fn broadcast_except(&mut self, exclude: ClientId, data: &str) -> Result<(), NetcodeError> {
        let ids: Vec<ClientId> = self.connected_clients().into_iter().filter(|id| *id != exclude).collect();
        for id in ids {
            self.send_to(id, data)?;
        }
        Ok(())
    }

    fn disconnect(&mut self, client_id: ClientId, reason: &str);

    fn close(&mut self);

    fn poll(&mut self) -> Vec<ServerTransportEvent>;

    fn connected_clients(&self) -> Vec<ClientId>;

    fn is_listening(&self) -> bool;
}
