//! Turns the world's current state into a `world_snapshot` message and
//! paces how often it goes out, independent of the simulation's own
//! fixed step.
//!
//! Grounded on the teacher's `server::server::GameServer::broadcast_snapshots`,
//! which runs on its own `tick % snapshot_send_rate` cadence rather than
//! every simulation tick.

use super::simulation::World;
use crate::clock::FixedTimestep;
use crate::protocol::Message;

pub struct SnapshotScheduler {
    timestep: FixedTimestep,
}

impl SnapshotScheduler {
    pub fn new(snapshot_rate_hz: u32) -> Self {
        Self { timestep: FixedTimestep::new(snapshot_rate_hz) }
    }

    pub fn accumulate(&mut self, delta_secs: f64) {
        self.timestep.accumulate(delta_secs);
    }

    pub fn should_broadcast(&mut self) -> bool {
        self.timestep.consume_tick()
    }
}

pub fn build_snapshot(world: &World, now_ms: u64) -> Message {
    Message::WorldSnapshot {
        tick: world.tick(),
        timestamp: now_ms,
        entities: world.snapshot_entities(),
        removed_entity_ids: {
            let removed = world.removed_since_last_tick();
            if removed.is_empty() { None } else { Some(removed) }
        },
    }
}
