use serde::Serialize;
use utoipa::ToSchema;

/// Serialized form of a participant: `{id, x, y}`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ParticipantView {
    /// Connection id.
    pub id: String,
    /// Last reported horizontal coordinate.
    pub x: f64,
    /// Last reported vertical coordinate.
    pub y: f64,
}

/// Aggregate session counters published with every `serverstate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    /// Connected participants.
    pub player_count: usize,
    /// Current level.
    pub num_level: u32,
    /// Participants that signalled warmup this level.
    pub ready_count: usize,
    /// Participants that finished this level.
    pub finished_count: usize,
}

/// Immutable point-in-time view of all broadcastable world state.
///
/// Players are kept sorted by id so that two snapshots of the same world
/// compare equal regardless of registry iteration order.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Snapshot {
    /// Participants sorted by id.
    pub players: Vec<ParticipantView>,
    /// Session counters.
    pub game: GameView,
}

impl Snapshot {
    /// Build a snapshot, normalising player order.
    pub fn new(mut players: Vec<ParticipantView>, game: GameView) -> Self {
        players.sort_by(|a, b| a.id.cmp(&b.id));
        Self { players, game }
    }
}
