//! The single entry point a host embeds: `Network` is either a server or
//! a client session, never both, and every role-specific accessor
//! returns [`NetcodeError::RoleMismatch`] rather than panicking when
//! called against the wrong role.
//!
//! Grounded on the split between the teacher's `crates/server` and
//! `crates/client` binaries, both built against the same `dual` core
//! crate — here collapsed into one type since this crate is the shared
//! core itself, not a binary per role.

use crate::client::{ClientConfig, ClientSession};
use crate::components::NetworkId;
use crate::ecs::{EntityHandle, HostEcs};
use crate::error::{NetcodeError, Role};
use crate::protocol::Vec2;
use crate::server::{ServerConfig, ServerSession};
use crate::transport::{ServerTransport, Transport};

pub enum Network<TC: Transport, TS: ServerTransport, E: HostEcs> {
    Client(ClientSession<TC, E>),
    Server(ServerSession<TS, E>),
}

impl<TC: Transport, TS: ServerTransport, E: HostEcs> Network<TC, TS, E> {
    pub fn client(transport: TC, config: ClientConfig, player_name: impl Into<String>, ecs: E) -> Self {
        Network::Client(ClientSession::new(transport, config, player_name, ecs))
    }

    pub fn server(transport: TS, config: ServerConfig, ecs: E) -> Self {
        Network::Server(ServerSession::new(transport, config, ecs))
    }

    pub fn is_client(&self) -> bool {
        matches!(self, Network::Client(_))
    }

    pub fn is_server(&self) -> bool {
        matches!(self, Network::Server(_))
    }

    pub fn role(&self) -> Role {
        match self {
            Network::Client(_) => Role::Client,
            Network::Server(_) => Role::Server,
        }
    }

    pub fn as_client(&self) -> Result<&ClientSession<TC, E>, NetcodeError> {
        match self {
            Network::Client(session) => Ok(session),
            Network::Server(_) => Err(NetcodeError::RoleMismatch { expected: Role::Client, actual: Role::Server }),
        }
    }

    pub fn as_client_mut(&mut self) -> Result<&mut ClientSession<TC, E>, NetcodeError> {
        match self {
            Network::Client(session) => Ok(session),
            Network::Server(_) => Err(NetcodeError::RoleMismatch { expected: Role::Client, actual: Role::Server }),
        }
    }

    pub fn as_server(&self) -> Result<&ServerSession<TS, E>, NetcodeError> {
        match self {
            Network::Server(session) => Ok(session),
            Network::Client(_) => Err(NetcodeError::RoleMismatch { expected: Role::Server, actual: Role::Client }),
        }
    }

    pub fn as_server_mut(&mut self) -> Result<&mut ServerSession<TS, E>, NetcodeError> {
        match self {
            Network::Server(session) => Ok(session),
            Network::Client(_) => Err(NetcodeError::RoleMismatch { expected: Role::Server, actual: Role::Client }),
        }
    }

    /// Spawn a server-authoritative entity with no owning client. Only
    /// meaningful for the server role.
    pub fn create_network_entity(&mut self, entity_type: impl Into<String>, position: Vec2, now_ms: u64) -> Result<NetworkId, NetcodeError> {
        self.as_server_mut()?.create_network_entity(entity_type, position, now_ms)
    }

    /// Remove an entity created through [`Self::create_network_entity`].
    /// Only meaningful for the server role.
    pub fn destroy_network_entity(&mut self, id: &NetworkId, now_ms: u64) -> Result<(), NetcodeError> {
        self.as_server_mut()?.destroy_network_entity(id, now_ms)
    }

    /// The host ECS handle for a network entity this side currently
    /// knows about, whichever role this is.
    pub fn get_network_entity(&self, id: &NetworkId) -> Option<EntityHandle> {
        match self {
            Network::Client(session) => session.get_network_entity(id),
            Network::Server(session) => session.get_network_entity(id),
        }
    }

    /// The host ECS handle backing the local player's own entity. Only
    /// meaningful for the client role.
    pub fn get_local_player(&self) -> Result<Option<EntityHandle>, NetcodeError> {
        Ok(self.as_client()?.get_local_player())
    }

    /// Whether the network is currently usable: connected for a client,
    /// listening for a server.
    pub fn is_connected(&self) -> bool {
        match self {
            Network::Client(session) => session.is_connected(),
            Network::Server(session) => session.connected_client_count() > 0,
        }
    }

    /// Begin connecting (client) or start listening (server), whichever
    /// this role means by "become reachable".
    pub fn listen_or_connect(&mut self, now_ms: u64) -> Result<(), NetcodeError> {
        match self {
            Network::Client(session) => session.connect(now_ms),
            Network::Server(session) => session.listen(),
        }
    }

    /// Tear the network down: disconnect (client) or stop listening and
    /// drop every connection (server).
    pub fn close(&mut self) {
        match self {
            Network::Client(session) => session.disconnect(),
            Network::Server(session) => session.close(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::InMemoryEcs;
    use crate::transport::{InMemoryNetwork, InMemoryServerTransport, InMemoryTransport};

    #[test]
    fn role_exclusivity_is_exactly_one_of_server_or_client() {
        let net = InMemoryNetwork::new();
        let client: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::client(net.client_transport(), ClientConfig::default(), "Ada", InMemoryEcs::new());
        assert!(client.is_client());
        assert!(!client.is_server());
        assert!(client.as_server().is_err());
    }

    #[test]
    fn calling_a_server_method_on_a_client_is_a_role_mismatch_error() {
        let net = InMemoryNetwork::new();
        let mut client: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::client(net.client_transport(), ClientConfig::default(), "Ada", InMemoryEcs::new());
        let err = client.as_server_mut().unwrap_err();
        assert!(matches!(err, NetcodeError::RoleMismatch { expected: Role::Server, actual: Role::Client }));
    }

    #[test]
    fn listen_or_connect_and_close_work_uniformly_across_roles() {
        let net = InMemoryNetwork::new();
        let mut server: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::server(net.server_transport(), crate::server::ServerConfig::default(), InMemoryEcs::new());
        server.listen_or_connect(0).unwrap();
        assert!(server.as_server().unwrap().connected_client_count() == 0);

        let mut client: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::client(net.client_transport(), ClientConfig::default(), "Ada", InMemoryEcs::new());
        client.listen_or_connect(0).unwrap();
        client.close();
        assert!(!client.as_client().unwrap().is_connected());
    }

    #[test]
    fn a_server_can_create_entities_through_the_facade_and_a_client_cannot() {
        let net = InMemoryNetwork::new();
        let mut server: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::server(net.server_transport(), crate::server::ServerConfig::default(), InMemoryEcs::new());
        let id = server.create_network_entity("pickup", Vec2::new(0.0, 0.0), 0).unwrap();
        assert!(server.get_network_entity(&id).is_some());

        let client: Network<InMemoryTransport, InMemoryServerTransport, InMemoryEcs> =
            Network::client(net.client_transport(), ClientConfig::default(), "Ada", InMemoryEcs::new());
        assert!(client.get_local_player().is_ok());
    }
}
