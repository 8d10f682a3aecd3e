//! Authoritative-server multiplayer netcode: server simulation,
//! client-side prediction with reconciliation, and entity interpolation
//! for remote actors, sitting on top of a transport the host supplies.
//!
//! A host embeds exactly one [`facade::Network`] per session, built as
//! either a client or a server from the same [`NetworkConfig`]. See
//! `DESIGN.md` at the repository root for how each piece here traces
//! back to its source.

pub mod client;
pub mod clock;
pub mod components;
pub mod ecs;
pub mod error;
pub mod facade;
pub mod integrator;
pub mod protocol;
pub mod server;
pub mod transport;

use client::ClientConfig;
use integrator::MovementConfig;
use server::ServerConfig;

/// The single place a host configures networking, independent of which
/// role it ends up running as. [`Self::client_config`] and
/// [`Self::server_config`] project it down to the role-specific configs
/// each session type actually takes. Field defaults match the reference
/// values called out alongside each knob.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Server fixed-step simulation rate.
    pub tick_rate: u32,
    /// World-snapshot broadcasts per second.
    pub snapshot_rate_hz: u32,
    /// Client prediction/send fixed-step rate.
    pub client_tick_rate: u32,
    pub max_clients: usize,
    pub interpolation_delay_ms: f64,
    pub ping_interval_ms: u64,
    /// Max unacknowledged inputs a client retains before dropping the
    /// oldest.
    pub reconciliation_window: usize,
    /// Informational only; the core never auto-disconnects on latency.
    pub max_latency_ms: u64,
    pub enable_prediction: bool,
    pub enable_interpolation: bool,
    pub enable_reconciliation: bool,
    pub debug: bool,
    pub movement: MovementConfig,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            snapshot_rate_hz: 10,
            client_tick_rate: 60,
            max_clients: 64,
            interpolation_delay_ms: 100.0,
            ping_interval_ms: 1_000,
            reconciliation_window: 60,
            max_latency_ms: 5_000,
            enable_prediction: true,
            enable_interpolation: true,
            enable_reconciliation: true,
            debug: false,
            movement: MovementConfig::default(),
        }
    }
}

impl NetworkConfig {
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            client_tick_rate: self.client_tick_rate,
            ping_interval_ms: self.ping_interval_ms,
            movement: self.movement,
            interpolation: client::interpolation::InterpolationConfig {
                target_delay_ms: self.interpolation_delay_ms,
                ..Default::default()
            },
            reconciliation_window: self.reconciliation_window,
            max_latency_ms: self.max_latency_ms,
            enable_prediction: self.enable_prediction,
            enable_reconciliation: self.enable_reconciliation,
            enable_interpolation: self.enable_interpolation,
            debug: self.debug,
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            tick_rate: self.tick_rate,
            snapshot_rate_hz: self.snapshot_rate_hz,
            max_clients: self.max_clients,
            movement: self.movement,
        }
    }
}

pub mod prelude {
    pub use crate::client::{ClientConfig, ClientEvent, ClientSession};
    pub use crate::components::{
        ClientInputState, InputBuffer, InterpolationBuffer, LocalPlayer, NetworkId, NetworkInput, NetworkPosition,
        NetworkVelocity, RemotePlayer, SequencedInput, ServerState,
    };
    pub use crate::ecs::{EntityHandle, HostEcs, InMemoryEcs, SystemSchedule, SystemSpec};
    pub use crate::error::{NetcodeError, Result, Role};
    pub use crate::facade::Network;
    pub use crate::protocol::{Message, SerializedNetworkEntity, Vec2};
    pub use crate::server::session::Session;
    pub use crate::server::{ServerConfig, ServerEvent, ServerSession};
    pub use crate::transport::{ClientId, ServerTransport, ServerTransportEvent, Transport, TransportEvent};
    pub use crate::NetworkConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_config_projects_shared_fields_into_both_roles() {
        let config = NetworkConfig { tick_rate: 30, client_tick_rate: 45, ..Default::default() };
        assert_eq!(config.server_config().tick_rate, 30);
        assert_eq!(config.client_config().client_tick_rate, 45);
    }
}
