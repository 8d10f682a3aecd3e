//! The small set of plain-data components the host ECS is expected to
//! attach to networked entities. None of these types know how to talk to
//! a transport; they are the vocabulary the client/server pipelines and
//! the host's own systems share.

use std::collections::{BTreeMap, VecDeque};

use crate::protocol::{SerializedNetworkEntity, Vec2};

/// Stable cross-session identifier for a networked entity, distinct from
/// whatever handle the host ECS assigns it locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetworkId(pub String);

impl std::fmt::Display for NetworkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NetworkId {
    fn from(value: &str) -> Self {
        NetworkId(value.to_string())
    }
}

impl From<String> for NetworkId {
    fn from(value: String) -> Self {
        NetworkId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkPosition(pub Vec2);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct NetworkVelocity(pub Vec2);

/// One frame of input, host-facing. Converts 1:1 to/from the wire
/// `InputSample`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkInput {
    pub move_x: f64,
    pub move_y: f64,
    pub aim_x: f64,
    pub aim_y: f64,
    pub actions: BTreeMap<String, bool>,
}

impl NetworkInput {
    pub fn action(&self, name: &str) -> bool {
        self.actions.get(name).copied().unwrap_or(false)
    }
}

/// An input sample tagged with the sequence number it was sent under.
/// Sequence numbers are assigned by `InputBuffer::push` and increase by
/// exactly one per call; there is no wraparound handling because a JSON
/// `u64` sequence never needs one in a single session's lifetime.
#[derive(Debug, Clone)]
pub struct SequencedInput {
    pub sequence: u64,
    pub input: NetworkInput,
}

/// The client's unacknowledged-input tail: everything sent but not yet
/// covered by a server `input_ack`. Grounded on the teacher's
/// `simulation::command::CommandBuffer`, generalized from a fixed-size
/// ring to an unbounded queue pruned by acknowledgement rather than by
/// capacity, since reconciliation (not memory pressure) is what retires
/// entries here.
#[derive(Debug, Default)]
pub struct InputBuffer {
    pending: VecDeque<SequencedInput>,
    next_sequence: u64,
    /// Upper bound on retained unacknowledged inputs (the
    /// `reconciliation_window` config knob). `None` means unbounded.
    max_len: Option<usize>,
}

impl InputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An `InputBuffer` that drops its oldest unacknowledged entry once
    /// more than `max_len` are pending, rather than growing without
    /// bound while the server is unreachable.
    pub fn with_capacity(max_len: usize) -> Self {
        Self { pending: VecDeque::new(), next_sequence: 0, max_len: Some(max_len) }
    }

    /// Record a sample about to be sent and return it tagged with its
    /// assigned sequence number.
    pub fn push(&mut self, input: NetworkInput) -> SequencedInput {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        let sequenced = SequencedInput { sequence, input };
        self.pending.push_back(sequenced.clone());
        if let Some(max) = self.max_len {
            while self.pending.len() > max {
                self.pending.pop_front();
            }
        }
        sequenced
    }

    /// Drop every pending sample the server has now accounted for.
    /// Acks that reference a sequence number we never sent (stale or
    /// out-of-order delivery) are ignored rather than treated as an
    /// error, per the duplicate/stale-ack handling in spec §8.
    pub fn acknowledge(&mut self, acked_sequence: u64) {
        self.pending.retain(|s| s.sequence > acked_sequence);
    }

    pub fn pending(&self) -> impl Iterator<Item = &SequencedInput> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The server's authoritative view of one entity, as last computed by
/// the fixed-step simulation. This is what gets echoed back to the
/// owning client inside `input_ack` and broadcast to everyone inside
/// `world_snapshot`.
#[derive(Debug, Clone, Default)]
pub struct ServerState {
    pub position: NetworkPosition,
    pub velocity: NetworkVelocity,
    pub last_processed_sequence: u64,
    pub server_tick: u64,
}

/// One historical snapshot as buffered for interpolation: the tick it
/// was generated for, the local arrival time, and the full (already
/// expanded from any delta) entity list.
#[derive(Debug, Clone)]
pub struct BufferedSnapshot {
    pub tick: u64,
    pub arrival_time_ms: u64,
    pub entities: Vec<SerializedNetworkEntity>,
}

/// Ring buffer of recent world snapshots a remote-entity interpolator
/// reads from. Grounded on the teacher's `snapshot::buffer::SnapshotBuffer`
/// and `client::net::interpolation::InterpolationEngine`'s internal
/// snapshot list, merged into one component since this crate has no
/// separate "rendering" consumer to justify keeping them apart.
#[derive(Debug, Default)]
pub struct InterpolationBuffer {
    snapshots: VecDeque<BufferedSnapshot>,
    max_len: usize,
}

impl InterpolationBuffer {
    pub fn new(max_len: usize) -> Self {
        Self { snapshots: VecDeque::with_capacity(max_len), max_len }
    }

    pub fn push(&mut self, snapshot: BufferedSnapshot) {
        let insert_at = self
            .snapshots
            .iter()
            .position(|s| s.tick > snapshot.tick)
            .unwrap_or(self.snapshots.len());
        if self.snapshots.get(insert_at.saturating_sub(1)).map(|s| s.tick) != Some(snapshot.tick) {
            self.snapshots.insert(insert_at, snapshot);
        }
        while self.snapshots.len() > self.max_len {
            self.snapshots.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn latest(&self) -> Option<&BufferedSnapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &BufferedSnapshot> {
        self.snapshots.iter()
    }

    /// The pair of snapshots bracketing `render_time_ms`, if one exists.
    pub fn bracket(&self, render_time_ms: u64) -> Option<(&BufferedSnapshot, &BufferedSnapshot)> {
        self.snapshots
            .iter()
            .zip(self.snapshots.iter().skip(1))
            .find(|(from, to)| from.arrival_time_ms <= render_time_ms && render_time_ms <= to.arrival_time_ms)
    }
}

/// Raw per-frame input the host collects before it is converted into a
/// `NetworkInput` and handed to the client pipeline. Kept separate from
/// `NetworkInput` so hosts can accumulate device state (key-down,
/// mouse-delta) across a frame before the network layer samples it once.
#[derive(Debug, Clone, Default)]
pub struct ClientInputState {
    pub current: NetworkInput,
}

/// Marks the entity the local host is predicting and reconciling.
/// Exactly one entity per client session should carry this.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPlayer;

/// Marks an entity driven purely by interpolation between received
/// snapshots; never touched by the prediction or reconciliation
/// pipelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemotePlayer;
