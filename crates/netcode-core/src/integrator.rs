//! The single pure movement step shared by client-side prediction and
//! reconciliation replay.
//!
//! Grounded on the teacher's `client::net::prediction::apply_movement_dt`:
//! that function is called both when applying a fresh local input and
//! when replaying the unacknowledged tail from a corrected server
//! position, and the teacher is careful to keep it a free function with
//! no hidden state so the two call sites can never drift apart. Design
//! Note 9 (spec) makes the same requirement explicit, so this module
//! exists purely to hold that one function.
//!
//! `actions` on `NetworkInput` are intentionally left uninterpreted here
//! — the protocol treats action names as opaque domain tokens (spec
//! Design Notes), so movement is driven only by `move_x`/`move_y`.

use crate::components::{NetworkInput, NetworkVelocity};
use crate::protocol::Vec2;

/// Movement tuning shared by every integration call. Defaults match the
/// reference values called out in the spec: `move_speed = 200` units/s,
/// world rectangle `0..800` by `0..600`.
#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    pub move_speed: f64,
    pub world_min: Vec2,
    pub world_max: Vec2,
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self { move_speed: 200.0, world_min: Vec2::new(0.0, 0.0), world_max: Vec2::new(800.0, 600.0) }
    }
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Advance one entity's position by one step of `dt` seconds given one
/// input sample: `velocity = move * move_speed`, `position += velocity
/// * dt`, then clamp to the configured world rectangle. Used verbatim
/// both to predict ahead of the server and, during reconciliation, to
/// replay the unacknowledged input tail on top of a corrected server
/// position — the two call sites must never diverge, so neither is
/// allowed to reimplement this.
pub fn integrate(position: Vec2, input: &NetworkInput, config: MovementConfig, dt: f64) -> (Vec2, NetworkVelocity) {
    let move_x = input.move_x.clamp(-1.0, 1.0);
    let move_y = input.move_y.clamp(-1.0, 1.0);

    let velocity = Vec2::new(move_x * config.move_speed, move_y * config.move_speed);
    let mut position = position + velocity * dt;
    position.x = clamp(position.x, config.world_min.x, config.world_max.x);
    position.y = clamp(position.y, config.world_min.y, config.world_max.y);
    (position, NetworkVelocity(velocity))
}
