//! Client-side prediction: apply local input immediately instead of
//! waiting for a server round trip.
//!
//! Grounded on the teacher's `client::net::prediction::ClientPrediction`.

use crate::components::{InputBuffer, NetworkInput, NetworkVelocity, SequencedInput, ServerState};
use crate::integrator::{integrate, MovementConfig};
use crate::protocol::Vec2;

#[derive(Debug, Clone, Default)]
pub struct PredictedState {
    pub position: Vec2,
    pub velocity: NetworkVelocity,
}

/// Predicts the local player's own entity ahead of the server. Every
/// other networked entity is driven by [`crate::client::interpolation`]
/// instead — prediction only ever applies to the one entity the local
/// host controls.
#[derive(Debug)]
pub struct ClientPrediction {
    pub(crate) input_buffer: InputBuffer,
    pub(crate) state: PredictedState,
    pub(crate) config: MovementConfig,
    pub(crate) last_acked_sequence: Option<u64>,
    reconciliation_window: usize,
    /// The last authoritative state echoed back by the server, tracked
    /// independently of `state` so an `input_ack` that arrives while
    /// reconciliation is disabled (or that references an already-seen
    /// sequence) still has somewhere to go, per the "still update
    /// ServerState; no replay needed" rule for stale/unknown acks.
    pub(crate) server_state: ServerState,
}

impl ClientPrediction {
    pub fn new(config: MovementConfig, reconciliation_window: usize) -> Self {
        Self {
            input_buffer: InputBuffer::with_capacity(reconciliation_window),
            state: PredictedState::default(),
            config,
            last_acked_sequence: None,
            reconciliation_window,
            server_state: ServerState::default(),
        }
    }

    pub fn with_start_position(config: MovementConfig, reconciliation_window: usize, position: Vec2) -> Self {
        let mut prediction = Self::new(config, reconciliation_window);
        prediction.state.position = position;
        prediction
    }

    /// Apply one local input immediately and record it for later replay.
    /// Returns the sequence number it was assigned, which the caller
    /// sends to the server alongside the input.
    pub fn apply_input(&mut self, input: NetworkInput, dt: f64) -> SequencedInput {
        let sequenced = self.input_buffer.push(input.clone());
        let (position, velocity) = integrate(self.state.position, &input, self.config, dt);
        self.state.position = position;
        self.state.velocity = velocity;
        sequenced
    }

    /// Record a local input for later replay without moving the
    /// predicted position — used when `enable_prediction` is off but
    /// input must still be sampled, sequenced, and sent.
    pub fn record_input(&mut self, input: NetworkInput) -> SequencedInput {
        self.input_buffer.push(input)
    }

    pub fn predicted_position(&self) -> Vec2 {
        self.state.position
    }

    pub fn predicted_velocity(&self) -> NetworkVelocity {
        self.state.velocity
    }

    pub fn server_state(&self) -> &ServerState {
        &self.server_state
    }

    pub fn pending_input_count(&self) -> usize {
        self.input_buffer.len()
    }

    pub fn reset(&mut self, position: Vec2) {
        self.input_buffer = InputBuffer::with_capacity(self.reconciliation_window);
        self.state = PredictedState { position, velocity: NetworkVelocity::default() };
        self.last_acked_sequence = None;
        self.server_state = ServerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_input_moves_immediately_without_waiting_for_server() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        prediction.apply_input(input, 1.0);
        assert!(prediction.predicted_position().x > 0.0);
    }

    #[test]
    fn sequence_numbers_increase_per_call() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let a = prediction.apply_input(NetworkInput::default(), 1.0 / 60.0);
        let b = prediction.apply_input(NetworkInput::default(), 1.0 / 60.0);
        assert_eq!(b.sequence, a.sequence + 1);
        assert_eq!(prediction.pending_input_count(), 2);
    }

    #[test]
    fn record_input_without_prediction_leaves_position_unmoved() {
        let mut prediction = ClientPrediction::new(MovementConfig::default(), 60);
        let input = NetworkInput { move_x: 1.0, move_y: 0.0, ..Default::default() };
        prediction.record_input(input);
        assert_eq!(prediction.predicted_position(), Vec2::ZERO);
        assert_eq!(prediction.pending_input_count(), 1);
    }
}
