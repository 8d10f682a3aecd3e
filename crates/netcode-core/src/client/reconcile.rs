//! Server reconciliation: fold an `input_ack` into the predicted state.
//!
//! Grounded on the teacher's `ClientPrediction::reconcile`: snap to the
//! server-confirmed position, drop every input the ack covers, then
//! replay whatever input is still unacknowledged using the exact same
//! [`crate::integrator::integrate`] call prediction itself uses, so the
//! replayed result matches what prediction would have produced had the
//! server agreed with it the whole way.

use super::prediction::ClientPrediction;
use crate::components::NetworkVelocity;
use crate::integrator::integrate;
use crate::protocol::Vec2;

impl ClientPrediction {
    /// `acked_sequence`/`server_position`/`server_velocity`/`server_tick`
    /// come straight from an `input_ack` message. `dt` is the fixed
    /// simulation step used to replay each buffered input — it should
    /// match whatever step `apply_input` was originally called with.
    ///
    /// `ServerState` is updated unconditionally (an ack for an unknown or
    /// already-seen sequence still tells us what the server last saw).
    /// The snap-and-replay onto the predicted state only happens when
    /// `reconciliation_enabled`, and only once per sequence: a stale or
    /// duplicate ack (no newer than the last one reconciled) is a no-op
    /// past the `ServerState` update, so a reordered ack can never snap
    /// prediction backwards or replay the same tail twice.
    pub fn reconcile(
        &mut self,
        server_position: Vec2,
        server_velocity: NetworkVelocity,
        acked_sequence: u64,
        server_tick: u64,
        dt: f64,
        reconciliation_enabled: bool,
    ) {
        if acked_sequence >= self.server_state.last_processed_sequence || self.server_state.last_processed_sequence == 0 {
            self.server_state.position = crate::components::NetworkPosition(server_position);
            self.server_state.velocity = server_velocity;
            self.server_state.last_processed_sequence = acked_sequence;
            self.server_state.server_tick = server_tick;
        }

        self.input_buffer.acknowledge(acked_sequence);

        if let Some(last) = self.last_acked_sequence {
            if acked_sequence <= last {
                return;
            }
        }
        self.last_acked_sequence = Some(acked_sequence);

        if !reconciliation_enabled {
            return;
        }

        self.state.position = server_position;
        self.state.velocity = server_velocity;
        let pending: Vec<_> = self.input_buffer.pending().cloned().collect();
        for sequenced in &pending {
            let (position, velocity) = integrate(self.state.position, &sequenced.input, self.config, dt);
            self.state.position = position;
            self.state.velocity = velocity;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::NetworkInput;
    use crate::integrator::MovementConfig;

    #[test]
    fn reconcile_replays_unacknowledged_tail() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        prediction.apply_input(input.clone(), 1.0);
        prediction.apply_input(input.clone(), 1.0);
        let third = prediction.apply_input(input, 1.0);

        // Server agrees with the first two inputs but hasn't processed
        // the third yet; replaying it should reproduce the same drift.
        let server_position_after_two = Vec2::new(2.0 * prediction.config.move_speed, 0.0);
        prediction.reconcile(server_position_after_two, NetworkVelocity::default(), third.sequence - 1, 2, 1.0, true);

        assert_eq!(prediction.pending_input_count(), 1);
        assert_eq!(prediction.predicted_position().x, 3.0 * prediction.config.move_speed);
    }

    #[test]
    fn stale_ack_does_not_rewind_state() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        prediction.apply_input(input.clone(), 1.0);
        prediction.apply_input(input, 1.0);

        prediction.reconcile(Vec2::new(100.0, 0.0), NetworkVelocity::default(), 1, 1, 1.0, true);
        let position_after_first_ack = prediction.predicted_position();

        // An older/duplicate ack must not re-run reconciliation.
        prediction.reconcile(Vec2::new(-999.0, 0.0), NetworkVelocity::default(), 0, 1, 1.0, true);
        assert_eq!(prediction.predicted_position(), position_after_first_ack);
    }

    #[test]
    fn disabled_reconciliation_still_updates_server_state_but_not_prediction() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        prediction.apply_input(input, 1.0);
        let predicted_before = prediction.predicted_position();

        prediction.reconcile(Vec2::new(999.0, 0.0), NetworkVelocity::default(), 0, 5, 1.0, false);

        assert_eq!(prediction.predicted_position(), predicted_before, "disabled reconciliation must not touch the predicted position");
        assert_eq!(prediction.server_state().last_processed_sequence, 0);
        assert_eq!(prediction.server_state().server_tick, 5);
    }
}
