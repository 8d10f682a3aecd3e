//! Server-side session: the authoritative fixed-step simulation plus
//! join/input/ping handling for every connected client.
//!
//! Grounded on the teacher's `server::server::GameServer`.

pub mod broadcast;
pub mod session;
pub mod simulation;

use std::collections::{HashMap, VecDeque};

use crate::clock::FixedTimestep;
use crate::components::{NetworkId, NetworkInput};
use crate::ecs::{EntityHandle, HostEcs};
use crate::error::NetcodeError;
use crate::integrator::MovementConfig;
use crate::protocol::{Message, Vec2};
use crate::transport::{ClientId, ServerTransport, ServerTransportEvent};
use broadcast::{build_snapshot, SnapshotScheduler};
use session::{Session, SessionManager, SessionState};
use simulation::{default_spawn_points, SpawnPointSource, World};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick_rate: u32,
    pub snapshot_rate_hz: u32,
    pub max_clients: usize,
    pub movement: MovementConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { tick_rate: 20, snapshot_rate_hz: 10, max_clients: 64, movement: MovementConfig::default() }
    }
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    ClientJoined { client_id: String, player_name: String, network_entity_id: String },
    ClientLeft { client_id: String, reason: String },
}

pub struct ServerSession<T: ServerTransport, E: HostEcs> {
    transport: T,
    config: ServerConfig,
    sessions: SessionManager,
    world: World,
    simulation_timestep: FixedTimestep,
    snapshot_scheduler: SnapshotScheduler,
    spawn_points: SpawnPointSource,
    events: VecDeque<ServerEvent>,
    ecs: E,
    entity_handles: HashMap<NetworkId, EntityHandle>,
}

impl<T: ServerTransport, E: HostEcs> ServerSession<T, E> {
    pub fn new(transport: T, config: ServerConfig, ecs: E) -> Self {
        let simulation_timestep = FixedTimestep::new(config.tick_rate);
        let snapshot_scheduler = SnapshotScheduler::new(config.snapshot_rate_hz);
        let spawn_points = default_spawn_points(config.movement);
        Self {
            transport,
            config,
            sessions: SessionManager::new(),
            world: World::new(),
            simulation_timestep,
            snapshot_scheduler,
            spawn_points,
            events: VecDeque::new(),
            ecs,
            entity_handles: HashMap::new(),
        }
    }

    pub fn with_spawn_points(mut self, spawn_points: SpawnPointSource) -> Self {
        self.spawn_points = spawn_points;
        self
    }

    pub fn listen(&mut self) -> Result<(), NetcodeError> {
        self.transport.listen()
    }

    pub fn close(&mut self) {
        self.transport.close()
    }

    pub fn poll_events(&mut self) -> Vec<ServerEvent> {
        self.events.drain(..).collect()
    }

    pub fn connected_client_count(&self) -> usize {
        self.sessions.total_count()
    }

    pub fn joined_client_count(&self) -> usize {
        self.sessions.joined_count()
    }

    pub fn current_tick(&self) -> u64 {
        self.world.tick()
    }

    /// Full connection records (name, join time, last input, latency) for
    /// every client that has completed `join`, in no particular order.
    pub fn get_connected_clients(&self) -> Vec<Session> {
        self.sessions.joined_sessions_snapshot()
    }

    /// Disconnect a client and tell its peers why. Alias of [`Self::kick`]
    /// under the name a host configuring networking through
    /// [`crate::NetworkConfig`] would expect.
    pub fn kick_client(&mut self, client_id: ClientId, reason: &str, now_ms: u64) {
        self.kick(client_id, reason, now_ms)
    }

    /// Host-supplied round-trip time for a client, surfaced through
    /// [`Self::get_connected_clients`] afterwards. The core itself never
    /// measures latency (`pong` only gives the client enough information
    /// to measure its own RTT).
    pub fn set_client_latency(&mut self, client_id: ClientId, latency_ms: f64) {
        self.sessions.set_latency(client_id, latency_ms);
    }

    /// Spawn a server-authoritative entity with no owning client — a
    /// pickup, a projectile, a hazard — backed by a fresh entity in the
    /// host's ECS and broadcast to every connected client.
    pub fn create_network_entity(&mut self, entity_type: impl Into<String>, position: Vec2, now_ms: u64) -> Result<NetworkId, NetcodeError> {
        let entity_type = entity_type.into();
        let id = self.world.spawn(entity_type.clone(), None, position);
        let handle = self.ecs.create_entity();
        self.entity_handles.insert(id.clone(), handle);

        let mut serialized = crate::protocol::SerializedNetworkEntity::new(id.0.clone(), entity_type);
        serialized.position = Some(position);
        serialized.velocity = Some(Vec2::ZERO);
        let spawn = Message::EntitySpawn { serialized_entity: serialized, timestamp: now_ms }.encode()?;
        self.transport.broadcast(&spawn)?;
        Ok(id)
    }

    /// Remove a network entity created through [`Self::create_network_entity`]
    /// (or a player's own entity, though clients are better removed
    /// through [`Self::kick`]) and tell every client it's gone.
    pub fn destroy_network_entity(&mut self, id: &NetworkId, now_ms: u64) -> Result<(), NetcodeError> {
        self.world.despawn(id);
        if let Some(handle) = self.entity_handles.remove(id) {
            self.ecs.destroy_entity(handle);
        }
        let destroy = Message::EntityDestroy { network_entity_id: id.0.clone(), timestamp: now_ms }.encode()?;
        self.transport.broadcast(&destroy)
    }

    /// The host ECS handle for a network entity, if one has been created
    /// (by a join or by [`Self::create_network_entity`]) and not yet
    /// destroyed.
    pub fn get_network_entity(&self, id: &NetworkId) -> Option<EntityHandle> {
        self.entity_handles.get(id).copied()
    }

    /// Drive one host frame: drain transport events, run as many fixed
    /// simulation ticks as `delta_secs` has accumulated for, and
    /// broadcast a world snapshot whenever the (independent) snapshot
    /// cadence has elapsed.
    pub fn update(&mut self, now_ms: u64, delta_secs: f64) -> Result<(), NetcodeError> {
        self.drain_transport(now_ms)?;

        self.simulation_timestep.accumulate(delta_secs);
        while self.simulation_timestep.consume_tick() {
            self.world.advance_tick();
        }

        self.snapshot_scheduler.accumulate(delta_secs);
        while self.snapshot_scheduler.should_broadcast() {
            let snapshot = build_snapshot(&self.world, now_ms).encode()?;
            self.transport.broadcast(&snapshot)?;
        }

        Ok(())
    }

    pub fn kick(&mut self, client_id: ClientId, reason: &str, now_ms: u64) {
        self.disconnect_client(client_id, reason, now_ms);
        self.transport.disconnect(client_id, reason);
    }

    fn drain_transport(&mut self, now_ms: u64) -> Result<(), NetcodeError> {
        let events = self.transport.poll();
        for event in events {
            match event {
                ServerTransportEvent::ClientConnected { client_id } => {
                    self.sessions.on_connect(client_id);
                }
                ServerTransportEvent::ClientDisconnected { client_id, reason } => {
                    self.disconnect_client(client_id, &reason, now_ms);
                }
                ServerTransportEvent::Message { client_id, data } => match Message::decode(&data) {
                    Ok(message) => self.handle_message(client_id, message, now_ms)?,
                    Err(err) => log::warn!("dropping malformed message from {client_id}: {err}"),
                },
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, client_id: ClientId, message: Message, now_ms: u64) -> Result<(), NetcodeError> {
        match message {
            Message::Join { player_name, .. } => self.handle_join(client_id, player_name, now_ms)?,
            Message::Input { sequence, inputs, .. } => self.handle_input(client_id, sequence, inputs, now_ms)?,
            Message::Ping { client_time, .. } => {
                let pong = Message::Pong { client_time, server_time: now_ms, timestamp: now_ms }.encode()?;
                self.transport.send_to(client_id, &pong)?;
            }
            // Server-bound handling only; messages the server itself
            // emits arriving here are a known-but-inapplicable kind.
            _ => log::debug!("server received a server-bound message kind: {}", message.kind()),
        }
        Ok(())
    }

    fn handle_join(&mut self, client_id: ClientId, player_name: String, now_ms: u64) -> Result<(), NetcodeError> {
        if self.sessions.total_count() > self.config.max_clients {
            let rejected = Message::JoinRejected { reason: "server full".to_string(), timestamp: now_ms }.encode()?;
            return self.transport.send_to(client_id, &rejected);
        }

        let spawn_position = (self.spawn_points)();
        let entity_id = self.world.spawn("player", Some(client_id), spawn_position);
        self.sessions.mark_joined(client_id, player_name.clone(), entity_id.clone(), now_ms);
        self.entity_handles.insert(entity_id.clone(), self.ecs.create_entity());

        let accepted = Message::JoinAccepted {
            client_id: client_id.to_string(),
            network_entity_id: entity_id.0.clone(),
            server_config: crate::protocol::ServerConfigSummary {
                tick_rate: self.config.tick_rate,
                snapshot_rate: self.config.snapshot_rate_hz,
            },
            server_time: now_ms,
            timestamp: now_ms,
        }
        .encode()?;
        self.transport.send_to(client_id, &accepted)?;

        let announcement = Message::PlayerJoined {
            client_id: client_id.to_string(),
            player_name: player_name.clone(),
            network_entity_id: entity_id.0.clone(),
            timestamp: now_ms,
        }
        .encode()?;
        self.transport.broadcast_except(client_id, &announcement)?;

        let mut serialized = crate::protocol::SerializedNetworkEntity::new(entity_id.0.clone(), "player");
        serialized.owner_id = client_id.to_string();
        serialized.position = Some(spawn_position);
        serialized.velocity = Some(Vec2::ZERO);
        let spawn = Message::EntitySpawn { serialized_entity: serialized, timestamp: now_ms }.encode()?;
        self.transport.broadcast_except(client_id, &spawn)?;

        self.events.push_back(ServerEvent::ClientJoined { client_id: client_id.to_string(), player_name, network_entity_id: entity_id.0 });
        Ok(())
    }

    fn handle_input(&mut self, client_id: ClientId, sequence: u64, inputs: crate::protocol::InputSample, now_ms: u64) -> Result<(), NetcodeError> {
        let Some(session) = self.sessions.get(client_id) else { return Ok(()) };
        if session.state != SessionState::Joined {
            return Ok(());
        }
        let Some(entity_id) = session.network_entity_id.clone() else { return Ok(()) };

        let input = NetworkInput { move_x: inputs.move_x, move_y: inputs.move_y, aim_x: inputs.aim_x, aim_y: inputs.aim_y, actions: inputs.actions };
        let dt = 1.0 / self.config.tick_rate as f64;
        if !self.world.apply_input(&entity_id, sequence, &input, self.config.movement, dt) {
            log::debug!("ignoring out-of-order or duplicate input sequence {sequence} from {client_id}");
            return Ok(());
        }
        self.sessions.record_input(client_id, sequence, now_ms);

        let Some(record) = self.world.get(&entity_id) else { return Ok(()) };
        let ack = Message::InputAck {
            sequence,
            position: record.position,
            velocity: Some(record.velocity),
            server_tick: self.world.tick(),
            server_time: now_ms,
            timestamp: now_ms,
        }
        .encode()?;
        self.transport.send_to(client_id, &ack)
    }

    fn disconnect_client(&mut self, client_id: ClientId, reason: &str, now_ms: u64) {
        let Some(session) = self.sessions.remove(client_id) else { return };
        if let Some(entity_id) = session.network_entity_id.clone() {
            self.world.despawn(&entity_id);
            if let Some(handle) = self.entity_handles.remove(&entity_id) {
                self.ecs.destroy_entity(handle);
            }
        }
        if session.state == SessionState::Joined {
            let left = Message::PlayerLeft { client_id: client_id.to_string(), timestamp: now_ms };
            if let Ok(encoded) = left.encode() {
                let _ = self.transport.broadcast(&encoded);
            }
            if let Some(entity_id) = session.network_entity_id {
                let destroy = Message::EntityDestroy { network_entity_id: entity_id.0, timestamp: now_ms };
                if let Ok(encoded) = destroy.encode() {
                    let _ = self.transport.broadcast(&encoded);
                }
            }
        }
        self.events.push_back(ServerEvent::ClientLeft { client_id: client_id.to_string(), reason: reason.to_string() });
    }
}

/// Wire a default 2D position/velocity movement step identical to the
/// one client-side prediction uses, so the server's authoritative result
/// matches what a well-behaved client already predicted.
pub fn default_movement_config() -> MovementConfig {
    MovementConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::InMemoryEcs;
    use crate::protocol::InputSample;
    use crate::transport::InMemoryNetwork;

    #[test]
    fn join_spawns_an_entity_and_accepts_the_client() {
        let net = InMemoryNetwork::new();
        let mut server = ServerSession::new(net.server_transport(), ServerConfig::default(), InMemoryEcs::new());
        server.listen().unwrap();
        let mut client = net.client_transport();
        client.connect().unwrap();

        server.update(0, 0.0).unwrap();
        use crate::transport::Transport;
        client.send(&Message::Join { player_name: "Ada".into(), client_version: None, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();

        let events = server.poll_events();
        assert!(matches!(&events[0], ServerEvent::ClientJoined { player_name, .. } if player_name == "Ada"));
        assert_eq!(server.joined_client_count(), 1);

        let connected = server.get_connected_clients();
        assert_eq!(connected.len(), 1);
        assert_eq!(connected[0].player_name, "Ada");
        assert!(server.get_network_entity(connected[0].network_entity_id.as_ref().unwrap()).is_some());
    }

    #[test]
    fn a_server_over_capacity_rejects_new_joins() {
        let net = InMemoryNetwork::new();
        let config = ServerConfig { max_clients: 0, ..ServerConfig::default() };
        let mut server = ServerSession::new(net.server_transport(), config, InMemoryEcs::new());
        server.listen().unwrap();
        use crate::transport::Transport;
        let mut client = net.client_transport();
        client.connect().unwrap();
        server.update(0, 0.0).unwrap();
        client.send(&Message::Join { player_name: "Ada".into(), client_version: None, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();

        let reply = client.poll();
        assert!(reply.iter().any(|e| matches!(e, crate::transport::TransportEvent::Message { data } if data.contains("join_rejected"))));
    }

    #[test]
    fn input_is_acknowledged_with_the_entitys_new_position() {
        let net = InMemoryNetwork::new();
        let mut server = ServerSession::new(net.server_transport(), ServerConfig::default(), InMemoryEcs::new());
        server.listen().unwrap();
        use crate::transport::Transport;
        let mut client = net.client_transport();
        client.connect().unwrap();
        server.update(0, 0.0).unwrap();
        client.send(&Message::Join { player_name: "Ada".into(), client_version: None, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();
        client.poll();

        let input = InputSample { move_x: 1.0, move_y: 0.0, actions: Default::default(), aim_x: 0.0, aim_y: 0.0 };
        client.send(&Message::Input { sequence: 0, inputs: input, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();

        let events = client.poll();
        assert!(events.iter().any(|e| matches!(e, crate::transport::TransportEvent::Message { data } if data.contains("input_ack"))));

        let connected = server.get_connected_clients();
        assert_eq!(connected[0].last_input_sequence, 0);
    }

    #[test]
    fn disconnecting_a_client_stamps_a_real_timestamp_on_its_leave_messages() {
        let net = InMemoryNetwork::new();
        let mut server = ServerSession::new(net.server_transport(), ServerConfig::default(), InMemoryEcs::new());
        server.listen().unwrap();
        use crate::transport::Transport;
        let mut observer = net.client_transport();
        observer.connect().unwrap();
        server.update(0, 0.0).unwrap();
        observer.send(&Message::Join { player_name: "Observer".into(), client_version: None, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();
        observer.poll();

        let mut leaving = net.client_transport();
        leaving.connect().unwrap();
        server.update(0, 0.0).unwrap();
        leaving.send(&Message::Join { player_name: "Leaving".into(), client_version: None, timestamp: 0 }.encode().unwrap()).unwrap();
        server.update(0, 0.0).unwrap();
        observer.poll();

        leaving.close();
        server.update(12_345, 0.0).unwrap();

        let events = observer.poll();
        let left_timestamp = events.iter().find_map(|e| match e {
            crate::transport::TransportEvent::Message { data } if data.contains("player_left") => {
                Message::decode(data).ok().and_then(|m| match m {
                    Message::PlayerLeft { timestamp, .. } => Some(timestamp),
                    _ => None,
                })
            }
            _ => None,
        });
        assert_eq!(left_timestamp, Some(12_345));
    }

    #[test]
    fn a_server_can_spawn_and_destroy_a_network_entity_with_no_owner() {
        let net = InMemoryNetwork::new();
        let mut server = ServerSession::new(net.server_transport(), ServerConfig::default(), InMemoryEcs::new());
        server.listen().unwrap();

        let id = server.create_network_entity("pickup", Vec2::new(1.0, 2.0), 0).unwrap();
        assert!(server.get_network_entity(&id).is_some());

        server.destroy_network_entity(&id, 0).unwrap();
        assert!(server.get_network_entity(&id).is_none());
    }
}
