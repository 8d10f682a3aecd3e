//! Authoritative world simulation: the fixed-step entity state the
//! server advances and periodically snapshots for broadcast.
//!
//! Grounded on the teacher's `snapshot::world::World` and
//! `server::server::GameServer::{apply_command, simulate}`, narrowed to
//! flat 2D position/velocity since this crate has no physics engine in
//! scope.

use std::collections::HashMap;

use crate::components::{NetworkId, NetworkInput};
use crate::integrator::{integrate, MovementConfig};
use crate::protocol::{SerializedNetworkEntity, Vec2};
use crate::transport::ClientId;

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub owner: Option<ClientId>,
    pub entity_type: String,
    pub position: Vec2,
    pub velocity: Vec2,
    pub last_processed_sequence: u64,
}

/// Where a freshly joined player's entity is placed. Boxed and
/// swappable so tests can supply a deterministic sequence of points
/// instead of depending on real randomness.
pub type SpawnPointSource = Box<dyn FnMut() -> Vec2 + Send>;

/// Hash-seeded xorshift generator used when the host doesn't supply its
/// own `SpawnPointSource`. Grounded on the teacher's `net::stats::rand_u64`,
/// which seeds a `RandomState` hasher from the system clock rather than
/// pulling in a dedicated RNG crate. Samples uniformly over the same
/// world rectangle the movement integrator clamps positions to, so a
/// freshly spawned entity never starts out of bounds.
pub fn default_spawn_points(config: MovementConfig) -> SpawnPointSource {
    let mut state = seed_from_clock();
    Box::new(move || {
        state = xorshift64(state);
        let x = config.world_min.x + unit_interval(state) * (config.world_max.x - config.world_min.x);
        state = xorshift64(state);
        let y = config.world_min.y + unit_interval(state) * (config.world_max.y - config.world_min.y);
        Vec2::new(x, y)
    })
}

fn seed_from_clock() -> u64 {
    use std::hash::{BuildHasher, Hasher};
    use std::time::{SystemTime, UNIX_EPOCH};
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_nanos() as u64).unwrap_or(0);
    let mut hasher = std::collections::hash_map::RandomState::new().build_hasher();
    hasher.write_u64(nanos);
    hasher.finish() | 1
}

fn xorshift64(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

fn unit_interval(x: u64) -> f64 {
    (x >> 11) as f64 / (1u64 << 53) as f64
}

#[derive(Default)]
pub struct World {
    entities: HashMap<NetworkId, EntityRecord>,
    removed_since_last_tick: Vec<NetworkId>,
    next_id: u64,
    tick: u64,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance_tick(&mut self) {
        self.tick += 1;
        self.removed_since_last_tick.clear();
    }

    pub fn spawn(&mut self, entity_type: impl Into<String>, owner: Option<ClientId>, position: Vec2) -> NetworkId {
        let id = NetworkId(format!("e{}", self.next_id));
        self.next_id += 1;
        self.entities.insert(
            id.clone(),
            EntityRecord { owner, entity_type: entity_type.into(), position, velocity: Vec2::ZERO, last_processed_sequence: 0 },
        );
        id
    }

    pub fn despawn(&mut self, id: &NetworkId) {
        if self.entities.remove(id).is_some() {
            self.removed_since_last_tick.push(id.clone());
        }
    }

    pub fn get(&self, id: &NetworkId) -> Option<&EntityRecord> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &NetworkId) -> Option<&mut EntityRecord> {
        self.entities.get_mut(id)
    }

    pub fn entity_by_owner(&self, owner: ClientId) -> Option<NetworkId> {
        self.entities
            .iter()
            .find(|(_, record)| record.owner == Some(owner))
            .map(|(id, _)| id.clone())
    }

    /// Apply one already-sequenced input to its owning entity. Returns
    /// whether the input was actually applied: out-of-order or duplicate
    /// sequences no newer than `last_processed_sequence` are ignored
    /// silently, since a client retransmitting before its first ack
    /// arrives must not be allowed to double-apply a movement step, and
    /// a caller must not ack what it didn't apply.
    pub fn apply_input(&mut self, id: &NetworkId, sequence: u64, input: &NetworkInput, config: MovementConfig, dt: f64) -> bool {
        let Some(record) = self.entities.get_mut(id) else { return false };
        if sequence <= record.last_processed_sequence && record.last_processed_sequence != 0 {
            return false;
        }
        let (position, velocity) = integrate(record.position, input, config, dt);
        record.position = position;
        record.velocity = velocity.0;
        record.last_processed_sequence = sequence;
        true
    }

    pub fn snapshot_entities(&self) -> Vec<SerializedNetworkEntity> {
        self.entities
            .iter()
            .map(|(id, record)| {
                let mut entity = SerializedNetworkEntity::new(id.0.clone(), record.entity_type.clone());
                entity.position = Some(record.position);
                entity.velocity = Some(record.velocity);
                entity
            })
            .collect()
    }

    /// Entities removed since the last `advance_tick`. The server folds
    /// these into `world_snapshot.removed_entity_ids` as a self-healing
    /// hint for clients that may have missed the corresponding
    /// `entity_destroy` message; `entity_destroy` remains the
    /// authoritative removal signal.
    pub fn removed_since_last_tick(&self) -> Vec<String> {
        self.removed_since_last_tick.iter().map(|id| id.0.clone()).collect()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_input_ignores_an_already_processed_sequence() {
        let mut world = World::new();
        let id = world.spawn("player", None, Vec2::ZERO);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        world.apply_input(&id, 5, &input, MovementConfig::default(), 1.0);
        let position_after_first = world.get(&id).unwrap().position;

        world.apply_input(&id, 5, &input, MovementConfig::default(), 1.0);
        assert_eq!(world.get(&id).unwrap().position, position_after_first);
    }

    #[test]
    fn despawn_is_recorded_until_the_next_tick_advance() {
        let mut world = World::new();
        let id = world.spawn("player", None, Vec2::ZERO);
        world.despawn(&id);
        assert_eq!(world.removed_since_last_tick(), vec![id.0.clone()]);
        world.advance_tick();
        assert!(world.removed_since_last_tick().is_empty());
    }

    #[test]
    fn default_spawn_points_stay_within_the_configured_world_rectangle() {
        let config = MovementConfig::default();
        let mut spawn = default_spawn_points(config);
        for _ in 0..20 {
            let point = spawn();
            assert!(point.x >= config.world_min.x && point.x <= config.world_max.x);
            assert!(point.y >= config.world_min.y && point.y <= config.world_max.y);
        }
    }
}
