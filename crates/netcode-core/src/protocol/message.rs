//! Wire protocol: a tagged union discriminated by a `type` string,
//! JSON-encoded as UTF-8 text frames (spec §4.2, §6.3).
//!
//! Grounded on the teacher's `net::protocol::{PacketType, Packet}`, but
//! the wire format itself moves from `rkyv` binary framing to
//! `serde_json`'s internally-tagged enum representation, since the spec
//! calls for an interoperable JSON schema rather than a zero-copy binary
//! one.

use serde::{Deserialize, Serialize};

use super::entity::{SerializedNetworkEntity, Vec2};
use crate::error::NetcodeError;

/// One sequenced input sample, as carried inside an `input` message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputSample {
    pub move_x: f64,
    pub move_y: f64,
    #[serde(default)]
    pub actions: std::collections::BTreeMap<String, bool>,
    pub aim_x: f64,
    pub aim_y: f64,
}

/// Minimal server-side config echoed to a newly joined client in
/// `join_accepted`, so it can size its own buffers to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfigSummary {
    pub tick_rate: u32,
    pub snapshot_rate: u32,
}

/// Every message carries the sender's monotonic send time in
/// whole milliseconds (spec §4.2), in addition to its own fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    // --- Client -> Server ---
    Join {
        player_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_version: Option<String>,
        timestamp: u64,
    },
    Input {
        sequence: u64,
        inputs: InputSample,
        timestamp: u64,
    },
    Ping {
        client_time: u64,
        timestamp: u64,
    },

    // --- Server -> Client ---
    JoinAccepted {
        client_id: String,
        network_entity_id: String,
        server_config: ServerConfigSummary,
        server_time: u64,
        timestamp: u64,
    },
    JoinRejected {
        reason: String,
        timestamp: u64,
    },
    WorldSnapshot {
        tick: u64,
        timestamp: u64,
        entities: Vec<SerializedNetworkEntity>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        removed_entity_ids: Option<Vec<String>>,
    },
    InputAck {
        sequence: u64,
        position: Vec2,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        velocity: Option<Vec2>,
        server_tick: u64,
        server_time: u64,
        timestamp: u64,
    },
    EntitySpawn {
        serialized_entity: SerializedNetworkEntity,
        timestamp: u64,
    },
    EntityDestroy {
        network_entity_id: String,
        timestamp: u64,
    },
    PlayerJoined {
        client_id: String,
        player_name: String,
        network_entity_id: String,
        timestamp: u64,
    },
    PlayerLeft {
        client_id: String,
        timestamp: u64,
    },
    Pong {
        client_time: u64,
        server_time: u64,
        timestamp: u64,
    },
}

impl Message {
    /// Encode to the UTF-8 JSON text frame a conforming transport sends.
    pub fn encode(&self) -> Result<String, NetcodeError> {
        serde_json::to_string(self).map_err(|e| NetcodeError::Decode(e.to_string()))
    }

    /// Decode a frame. Unknown `type` tags and malformed known types both
    /// surface as `Err`; callers are expected to log and drop per the
    /// protocol-error policy (spec §7), not propagate the error further.
    pub fn decode(data: &str) -> Result<Message, NetcodeError> {
        serde_json::from_str(data).map_err(|e| NetcodeError::Decode(e.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::Join { .. } => "join",
            Message::Input { .. } => "input",
            Message::Ping { .. } => "ping",
            Message::JoinAccepted { .. } => "join_accepted",
            Message::JoinRejected { .. } => "join_rejected",
            Message::WorldSnapshot { .. } => "world_snapshot",
            Message::InputAck { .. } => "input_ack",
            Message::EntitySpawn { .. } => "entity_spawn",
            Message::EntityDestroy { .. } => "entity_destroy",
            Message::PlayerJoined { .. } => "player_joined",
            Message::PlayerLeft { .. } => "player_left",
            Message::Pong { .. } => "pong",
        }
    }
}
