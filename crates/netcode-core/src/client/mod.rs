//! Client-side session: glues the transport, the wire protocol, and the
//! prediction/interpolation/time-sync pipelines into the single object
//! a host drives once per frame.
//!
//! Grounded on the teacher's `client::net::client::NetworkClient`.

pub mod interpolation;
pub mod prediction;
pub mod reconcile;
pub mod time_sync;

use std::collections::{HashMap, VecDeque};

use crate::clock::FixedTimestep;
use crate::components::NetworkId;
use crate::ecs::{EntityHandle, HostEcs};
use crate::error::NetcodeError;
use crate::integrator::MovementConfig;
use crate::protocol::{InputSample, Message, SerializedNetworkEntity, Vec2};
use crate::transport::{Transport, TransportEvent};
use interpolation::{InterpolationConfig, InterpolationEngine, RenderedEntityState};
use prediction::ClientPrediction;
use time_sync::TimeSync;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Fixed-step rate driving both the prediction step and the input
    /// send step (spec's `client_tick_rate`; both run on the same tick).
    pub client_tick_rate: u32,
    pub ping_interval_ms: u64,
    pub movement: MovementConfig,
    pub interpolation: InterpolationConfig,
    /// Max unacknowledged inputs retained before the oldest is dropped.
    pub reconciliation_window: usize,
    /// Informational threshold the host may act on; the core itself
    /// never auto-disconnects on latency.
    pub max_latency_ms: u64,
    pub enable_prediction: bool,
    pub enable_reconciliation: bool,
    pub enable_interpolation: bool,
    pub debug: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_tick_rate: 60,
            ping_interval_ms: 1_000,
            movement: MovementConfig::default(),
            interpolation: InterpolationConfig::default(),
            reconciliation_window: 60,
            max_latency_ms: 5_000,
            enable_prediction: true,
            enable_reconciliation: true,
            enable_interpolation: true,
            debug: false,
        }
    }
}

/// Things the host finds out about by calling [`ClientSession::poll_events`]
/// after each `update`.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Joined { client_id: String, network_entity_id: String },
    JoinRejected { reason: String },
    EntitySpawned { entity: SerializedNetworkEntity },
    EntityDestroyed { network_entity_id: String },
    PlayerJoined { client_id: String, player_name: String, network_entity_id: String },
    PlayerLeft { client_id: String },
    Disconnected { reason: String },
}

pub struct ClientSession<T: Transport, E: HostEcs> {
    transport: T,
    state: ClientState,
    config: ClientConfig,
    player_name: String,
    prediction: ClientPrediction,
    interpolation: InterpolationEngine,
    time_sync: TimeSync,
    input_timestep: FixedTimestep,
    client_id: Option<String>,
    local_network_id: Option<NetworkId>,
    last_ping_sent_ms: u64,
    events: VecDeque<ClientEvent>,
    ecs: E,
    local_entity_handle: Option<EntityHandle>,
    entity_handles: HashMap<NetworkId, EntityHandle>,
}

impl<T: Transport, E: HostEcs> ClientSession<T, E> {
    pub fn new(transport: T, config: ClientConfig, player_name: impl Into<String>, ecs: E) -> Self {
        let input_timestep = FixedTimestep::new(config.client_tick_rate);
        let interpolation = InterpolationEngine::new(config.interpolation);
        let prediction = ClientPrediction::new(config.movement, config.reconciliation_window);
        Self {
            transport,
            state: ClientState::Disconnected,
            config,
            player_name: player_name.into(),
            prediction,
            interpolation,
            time_sync: TimeSync::new(),
            input_timestep,
            client_id: None,
            local_network_id: None,
            last_ping_sent_ms: 0,
            events: VecDeque::new(),
            ecs,
            local_entity_handle: None,
            entity_handles: HashMap::new(),
        }
    }

    pub fn connect(&mut self, now_ms: u64) -> Result<(), NetcodeError> {
        if self.state != ClientState::Disconnected {
            return Err(NetcodeError::AlreadyConnected);
        }
        self.transport.connect()?;
        self.state = ClientState::Connecting;
        self.last_ping_sent_ms = now_ms;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.state == ClientState::Connected
    }

    pub fn disconnect(&mut self) {
        self.transport.close();
        self.state = ClientState::Disconnected;
    }

    pub fn local_network_id(&self) -> Option<&NetworkId> {
        self.local_network_id.as_ref()
    }

    /// The host ECS handle backing the local player's own entity, once
    /// `join` has been accepted.
    pub fn get_local_player(&self) -> Option<EntityHandle> {
        self.local_entity_handle
    }

    /// The host ECS handle for a remote entity this client currently
    /// knows about (from `entity_spawn` or a world snapshot), if any.
    pub fn get_network_entity(&self, id: &NetworkId) -> Option<EntityHandle> {
        self.entity_handles.get(id).copied()
    }

    pub fn predicted_position(&self) -> Vec2 {
        self.prediction.predicted_position()
    }

    /// Smoothed round-trip time in milliseconds, once at least one `pong`
    /// has been received.
    pub fn latency_ms(&self) -> Option<f64> {
        self.time_sync.smoothed_rtt_ms()
    }

    /// Best current estimate of the server's clock, derived from the
    /// smoothed client/server time offset.
    pub fn server_time(&self, now_ms: u64) -> u64 {
        self.time_sync.estimate_server_time(now_ms)
    }

    pub fn remote_states(&self, now_ms: u64) -> HashMap<NetworkId, RenderedEntityState> {
        if self.config.enable_interpolation {
            self.interpolation.render_state(now_ms)
        } else {
            self.interpolation.latest_snapshot_state()
        }
    }

    pub fn poll_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    /// Drive one host frame: drain transport events, advance prediction
    /// on the fixed input-send step, and send input/ping as scheduled.
    pub fn update(&mut self, now_ms: u64, delta_secs: f64, input: crate::components::NetworkInput) -> Result<(), NetcodeError> {
        self.drain_transport(now_ms)?;

        if self.state != ClientState::Connected {
            return Ok(());
        }

        self.input_timestep.accumulate(delta_secs);
        let dt = self.input_timestep.dt();
        let is_idle_input = input == crate::components::NetworkInput::default();
        while self.input_timestep.consume_tick() {
            // Skipping a frame with no move/aim/action component set is a
            // bandwidth optimization; the server-side reconciler never
            // depends on input sequences being contiguous.
            if is_idle_input {
                continue;
            }
            let sequenced = if self.config.enable_prediction {
                self.prediction.apply_input(input.clone(), dt)
            } else {
                self.prediction.record_input(input.clone())
            };
            let message = Message::Input {
                sequence: sequenced.sequence,
                inputs: InputSample {
                    move_x: sequenced.input.move_x,
                    move_y: sequenced.input.move_y,
                    actions: sequenced.input.actions.clone(),
                    aim_x: sequenced.input.aim_x,
                    aim_y: sequenced.input.aim_y,
                },
                timestamp: now_ms,
            };
            self.send(&message)?;
        }

        if now_ms.saturating_sub(self.last_ping_sent_ms) >= self.config.ping_interval_ms {
            self.last_ping_sent_ms = now_ms;
            self.send(&Message::Ping { client_time: now_ms, timestamp: now_ms })?;
        }

        Ok(())
    }

    pub fn send_join(&mut self, now_ms: u64) -> Result<(), NetcodeError> {
        self.send(&Message::Join { player_name: self.player_name.clone(), client_version: None, timestamp: now_ms })
    }

    fn send(&mut self, message: &Message) -> Result<(), NetcodeError> {
        let encoded = message.encode()?;
        self.transport.send(&encoded)
    }

    fn drain_transport(&mut self, now_ms: u64) -> Result<(), NetcodeError> {
        let events = self.transport.poll();
        for event in events {
            match event {
                TransportEvent::Connected => {
                    self.state = ClientState::Connecting;
                    self.send_join(now_ms)?;
                }
                TransportEvent::Disconnected { reason } => {
                    self.state = ClientState::Disconnected;
                    self.events.push_back(ClientEvent::Disconnected { reason });
                }
                TransportEvent::Message { data } => match Message::decode(&data) {
                    Ok(message) => self.handle_message(message, now_ms),
                    Err(err) => log::warn!("dropping malformed message from server: {err}"),
                },
            }
        }
        Ok(())
    }

    fn handle_message(&mut self, message: Message, now_ms: u64) {
        match message {
            Message::JoinAccepted { client_id, network_entity_id, server_time, .. } => {
                self.state = ClientState::Connected;
                self.client_id = Some(client_id.clone());
                self.local_network_id = Some(NetworkId(network_entity_id.clone()));
                self.local_entity_handle = Some(self.ecs.create_entity());
                self.prediction.reset(Vec2::ZERO);
                self.time_sync.record_pong(now_ms, server_time, now_ms);
                self.events.push_back(ClientEvent::Joined { client_id, network_entity_id });
            }
            Message::JoinRejected { reason, .. } => {
                self.state = ClientState::Disconnected;
                self.events.push_back(ClientEvent::JoinRejected { reason });
            }
            Message::WorldSnapshot { tick, entities, removed_entity_ids, .. } => {
                self.apply_snapshot(tick, now_ms, entities, removed_entity_ids);
            }
            Message::InputAck { sequence, position, velocity, server_tick, .. } => {
                let dt = 1.0 / self.config.client_tick_rate as f64;
                let velocity = velocity.map(crate::components::NetworkVelocity).unwrap_or_default();
                self.prediction.reconcile(position, velocity, sequence, server_tick, dt, self.config.enable_reconciliation);
            }
            Message::EntitySpawn { serialized_entity, .. } => {
                let id = NetworkId(serialized_entity.network_entity_id.clone());
                if Some(&id) != self.local_network_id.as_ref() {
                    self.entity_handles.insert(id, self.ecs.create_entity());
                }
                self.events.push_back(ClientEvent::EntitySpawned { entity: serialized_entity });
            }
            Message::EntityDestroy { network_entity_id, .. } => {
                let id = NetworkId(network_entity_id.clone());
                if let Some(handle) = self.entity_handles.remove(&id) {
                    self.ecs.destroy_entity(handle);
                }
                self.events.push_back(ClientEvent::EntityDestroyed { network_entity_id });
            }
            Message::PlayerJoined { client_id, player_name, network_entity_id, .. } => {
                self.events.push_back(ClientEvent::PlayerJoined { client_id, player_name, network_entity_id });
            }
            Message::PlayerLeft { client_id, .. } => {
                self.events.push_back(ClientEvent::PlayerLeft { client_id });
            }
            Message::Pong { client_time, server_time, .. } => {
                self.time_sync.record_pong(client_time, server_time, now_ms);
                if let Some(rtt) = self.time_sync.smoothed_rtt_ms() {
                    if rtt > self.config.max_latency_ms as f64 {
                        log::warn!("smoothed round-trip time {rtt:.0}ms exceeds max_latency_ms ({}ms)", self.config.max_latency_ms);
                    }
                }
            }
            // Client->server messages arriving here are a logic error on
            // whoever is on the other end, not a protocol violation: the
            // type is well-formed, it's simply not ours to act on.
            Message::Join { .. } | Message::Input { .. } | Message::Ping { .. } => {
                log::debug!("client received a client-bound message kind: {}", message.kind());
            }
        }
    }

    /// The local player is never overwritten by a snapshot: its entity id
    /// is filtered out before the interpolation buffer sees the entity
    /// list, so the only things driving its position are prediction and
    /// reconciliation.
    ///
    /// `removed_entity_ids` is a non-authoritative self-healing hint: the
    /// server's own view of what it despawned since the last tick, folded
    /// into the snapshot in case an explicit `entity_destroy` was dropped
    /// in transit. Anything still tracked locally and named here is
    /// despawned even though no `entity_destroy` arrived for it.
    fn apply_snapshot(&mut self, tick: u64, now_ms: u64, entities: Vec<SerializedNetworkEntity>, removed: Option<Vec<String>>) {
        let remote_entities: Vec<SerializedNetworkEntity> = entities
            .into_iter()
            .filter(|e| Some(&e.network_entity_id) != self.local_network_id.as_ref().map(|id| &id.0))
            .collect();

        if let Some(removed_ids) = removed {
            for raw_id in removed_ids {
                let id = NetworkId(raw_id.clone());
                if Some(&id) == self.local_network_id.as_ref() {
                    continue;
                }
                if let Some(handle) = self.entity_handles.remove(&id) {
                    self.ecs.destroy_entity(handle);
                    self.events.push_back(ClientEvent::EntityDestroyed { network_entity_id: raw_id });
                }
            }
        }

        self.interpolation.push_snapshot(tick, now_ms, remote_entities);
    }
}
