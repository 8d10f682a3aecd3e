//! Entity interpolation: smooth remote entities between received
//! snapshots instead of snapping to each one as it arrives.
//!
//! Grounded on the teacher's `client::net::interpolation::InterpolationEngine`:
//! buffer snapshots, render a fixed delay behind the newest one so there
//! is almost always a bracketing pair to lerp between, extrapolate a
//! short distance past the newest snapshot when the buffer runs dry, and
//! fall back to the oldest pair when rendering earlier than anything
//! buffered.

use std::collections::HashMap;

use crate::components::{BufferedSnapshot, InterpolationBuffer, NetworkId};
use crate::protocol::{SerializedNetworkEntity, Vec2};

#[derive(Debug, Clone, Copy)]
pub struct InterpolationConfig {
    /// How far behind the newest snapshot's arrival time to render, in
    /// milliseconds. Large enough to almost always have two snapshots to
    /// interpolate between; small enough that remote entities don't lag
    /// visibly behind the server.
    pub target_delay_ms: f64,
    pub min_buffered_snapshots: usize,
    pub max_buffered_snapshots: usize,
    /// How far past the newest snapshot's arrival time we'll extrapolate
    /// before simply holding position, expressed as a multiple of the
    /// gap between the two most recent snapshots.
    pub extrapolation_limit_factor: f64,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            target_delay_ms: 100.0,
            min_buffered_snapshots: 2,
            max_buffered_snapshots: 32,
            extrapolation_limit_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RenderedEntityState {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f64,
}

pub struct InterpolationEngine {
    config: InterpolationConfig,
    buffer: InterpolationBuffer,
    ready: bool,
}

impl InterpolationEngine {
    pub fn new(config: InterpolationConfig) -> Self {
        let max = config.max_buffered_snapshots;
        Self { config, buffer: InterpolationBuffer::new(max), ready: false }
    }

    pub fn push_snapshot(&mut self, tick: u64, arrival_time_ms: u64, entities: Vec<SerializedNetworkEntity>) {
        self.buffer.push(BufferedSnapshot { tick, arrival_time_ms, entities });
        if self.buffer.len() >= self.config.min_buffered_snapshots {
            self.ready = true;
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn buffered_snapshot_count(&self) -> usize {
        self.buffer.len()
    }

    /// The most recently received snapshot's entities, with no lerp or
    /// extrapolation applied. Used when `enable_interpolation` is off —
    /// remote entities then simply snap to each arriving snapshot.
    pub fn latest_snapshot_state(&self) -> HashMap<NetworkId, RenderedEntityState> {
        match self.buffer.latest() {
            Some(latest) => snapshot_to_states(latest),
            None => HashMap::new(),
        }
    }

    /// Compute the render-time state of every entity present in the
    /// buffered snapshots, given the current local wall-clock time.
    pub fn render_state(&self, now_ms: u64) -> HashMap<NetworkId, RenderedEntityState> {
        let render_time_ms = now_ms.saturating_sub(self.config.target_delay_ms as u64);

        let Some(latest) = self.buffer.latest() else {
            return HashMap::new();
        };

        if self.buffer.len() < 2 {
            return snapshot_to_states(latest);
        }

        if let Some((from, to)) = self.buffer.bracket(render_time_ms) {
            let t = normalized(from.arrival_time_ms, to.arrival_time_ms, render_time_ms);
            return lerp_states(from, to, t);
        }

        let earliest = self.buffer.iter().next().expect("len >= 2 implies at least one snapshot");
        if render_time_ms <= earliest.arrival_time_ms {
            // Nothing in the buffer is old enough yet; hold at the
            // oldest known state rather than guessing backwards.
            return snapshot_to_states(earliest);
        }

        // render_time_ms is past the newest snapshot: extrapolate each
        // entity forward from its own stored velocity, clamped so a
        // stalled connection doesn't run entities away.
        let mut iter = self.buffer.iter().rev();
        let to = iter.next().expect("len >= 2");
        let from = iter.next().expect("len >= 2");
        let gap = (to.arrival_time_ms - from.arrival_time_ms).max(1) as f64;
        let limit = gap * self.config.extrapolation_limit_factor;
        let elapsed_ms = (render_time_ms - to.arrival_time_ms) as f64;
        extrapolate_from_latest(to, elapsed_ms.min(limit))
    }
}

fn normalized(from_ms: u64, to_ms: u64, at_ms: u64) -> f64 {
    let span = (to_ms - from_ms).max(1) as f64;
    ((at_ms - from_ms) as f64 / span).clamp(0.0, 1.0)
}

fn snapshot_to_states(snapshot: &BufferedSnapshot) -> HashMap<NetworkId, RenderedEntityState> {
    snapshot
        .entities
        .iter()
        .map(|entity| {
            (
                NetworkId(entity.network_entity_id.clone()),
                RenderedEntityState {
                    position: entity.position.unwrap_or(Vec2::ZERO),
                    velocity: entity.velocity.unwrap_or(Vec2::ZERO),
                    rotation: entity.rotation.unwrap_or(0.0),
                },
            )
        })
        .collect()
}

/// Extrapolate each entity in the latest snapshot forward using its own
/// stored velocity; an entity with no stored velocity is held in place
/// rather than projected along a trend it may no longer be following.
fn extrapolate_from_latest(latest: &BufferedSnapshot, elapsed_ms: f64) -> HashMap<NetworkId, RenderedEntityState> {
    let elapsed_secs = elapsed_ms / 1000.0;
    latest
        .entities
        .iter()
        .map(|entity| {
            let id = NetworkId(entity.network_entity_id.clone());
            let position = entity.position.unwrap_or(Vec2::ZERO);
            let rotation = entity.rotation.unwrap_or(0.0);
            let state = match entity.velocity {
                Some(velocity) => RenderedEntityState { position: position + velocity * elapsed_secs, velocity, rotation },
                None => RenderedEntityState { position, velocity: Vec2::ZERO, rotation },
            };
            (id, state)
        })
        .collect()
}

fn lerp_states(from: &BufferedSnapshot, to: &BufferedSnapshot, t: f64) -> HashMap<NetworkId, RenderedEntityState> {
    let from_by_id: HashMap<&str, &SerializedNetworkEntity> =
        from.entities.iter().map(|e| (e.network_entity_id.as_str(), e)).collect();

    to.entities
        .iter()
        .map(|to_entity| {
            let id = NetworkId(to_entity.network_entity_id.clone());
            let to_pos = to_entity.position.unwrap_or(Vec2::ZERO);
            let to_vel = to_entity.velocity.unwrap_or(Vec2::ZERO);
            let to_rot = to_entity.rotation.unwrap_or(0.0);

            let state = match from_by_id.get(to_entity.network_entity_id.as_str()) {
                Some(from_entity) => {
                    let from_pos = from_entity.position.unwrap_or(Vec2::ZERO);
                    let from_vel = from_entity.velocity.unwrap_or(Vec2::ZERO);
                    let from_rot = from_entity.rotation.unwrap_or(0.0);
                    RenderedEntityState {
                        position: from_pos.lerp(to_pos, t),
                        velocity: from_vel.lerp(to_vel, t),
                        rotation: from_rot + (to_rot - from_rot) * t,
                    }
                }
                // Entity only exists in the newer snapshot: nothing to
                // interpolate from, so render it at its arrival state.
                None => RenderedEntityState { position: to_pos, velocity: to_vel, rotation: to_rot },
            };
            (id, state)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, x: f64) -> SerializedNetworkEntity {
        let mut e = SerializedNetworkEntity::new(id, "player");
        e.position = Some(Vec2::new(x, 0.0));
        e
    }

    #[test]
    fn becomes_ready_once_min_snapshots_buffered() {
        let mut engine = InterpolationEngine::new(InterpolationConfig::default());
        assert!(!engine.is_ready());
        engine.push_snapshot(1, 0, vec![entity("e1", 0.0)]);
        assert!(!engine.is_ready());
        engine.push_snapshot(2, 50, vec![entity("e1", 10.0)]);
        assert!(engine.is_ready());
    }

    #[test]
    fn midpoint_render_time_lerps_between_brackets() {
        let mut engine = InterpolationEngine::new(InterpolationConfig { target_delay_ms: 0.0, ..Default::default() });
        engine.push_snapshot(1, 0, vec![entity("e1", 0.0)]);
        engine.push_snapshot(2, 100, vec![entity("e1", 10.0)]);

        let states = engine.render_state(50);
        let state = states.get(&NetworkId("e1".into())).unwrap();
        assert!((state.position.x - 5.0).abs() < 1e-9);
    }

    #[test]
    fn extrapolates_from_the_latest_entitys_own_stored_velocity_bounded_by_the_gap() {
        let mut engine = InterpolationEngine::new(InterpolationConfig { target_delay_ms: 0.0, extrapolation_limit_factor: 1.5, ..Default::default() });
        engine.push_snapshot(1, 0, vec![entity("e1", 0.0)]);
        let mut moving = entity("e1", 10.0);
        moving.velocity = Some(Vec2::new(100.0, 0.0));
        engine.push_snapshot(2, 100, vec![moving]);

        // 50ms past the latest snapshot, within the gap(100) * factor(1.5) = 150ms cap.
        let near = engine.render_state(150);
        let near_x = near.get(&NetworkId("e1".into())).unwrap().position.x;
        assert!((near_x - (10.0 + 100.0 * 0.05)).abs() < 1e-9);

        // Far past the cap: elapsed time clamps at 150ms regardless of how stale the buffer gets.
        let far = engine.render_state(10_000);
        let far_x = far.get(&NetworkId("e1".into())).unwrap().position.x;
        assert!((far_x - (10.0 + 100.0 * 0.15)).abs() < 1e-9);
    }

    #[test]
    fn holds_position_past_the_latest_snapshot_when_no_velocity_is_stored() {
        let mut engine = InterpolationEngine::new(InterpolationConfig { target_delay_ms: 0.0, ..Default::default() });
        engine.push_snapshot(1, 0, vec![entity("e1", 0.0)]);
        engine.push_snapshot(2, 100, vec![entity("e1", 10.0)]);

        let far_future = engine.render_state(10_000);
        assert_eq!(far_future.get(&NetworkId("e1".into())).unwrap().position.x, 10.0);
    }
}
