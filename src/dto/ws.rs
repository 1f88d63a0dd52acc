use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::dto::snapshot::{ParticipantView, Snapshot};

/// Two-dimensional position carried by movement messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// Generic application event exchanged under the `game event` name.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameEventPayload {
    /// Event name, e.g. `enterState`, `mouseMove`, `loadNextLevel`.
    pub event_name: String,
    /// Free-form argument list.
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub args: Vec<Value>,
    /// Originating participant, stamped by the server on the way out.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
}

impl GameEventPayload {
    /// Build a payload from its parts.
    pub fn new(event_name: impl Into<String>, args: Vec<Value>, player_id: Option<String>) -> Self {
        Self {
            event_name: event_name.into(),
            args,
            player_id,
        }
    }

    /// First argument as a string, if any.
    pub fn first_arg_str(&self) -> Option<&str> {
        self.args.first().and_then(Value::as_str)
    }
}

/// Messages accepted from participant WebSocket clients.
///
/// Frames look like `{"event": "move", "data": {"x": 1, "y": 2}}`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundMessage {
    /// New position of the sender.
    #[serde(rename = "move")]
    Move(Position),
    /// Application event, interpreted or relayed.
    #[serde(rename = "game event")]
    GameEvent(GameEventPayload),
}

impl InboundMessage {
    /// Parse a raw text frame.
    pub fn from_json_str(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Sent once to a newly joined connection.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    /// Id assigned to the receiving connection.
    pub id: String,
    /// Every registered participant, the receiver included.
    pub players: Vec<ParticipantView>,
    /// Level the group is currently on.
    pub num_level: u32,
}

/// Announces a newcomer to everybody else.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PlayerJoined {
    /// Id of the newcomer.
    pub id: String,
}

/// Messages pushed to participant WebSocket clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum OutboundMessage {
    /// Welcome sent to the new connection only.
    #[serde(rename = "connected")]
    Connected(Welcome),
    /// Someone else joined.
    #[serde(rename = "player connected")]
    PlayerConnected(PlayerJoined),
    /// Someone left; carries their last known view.
    #[serde(rename = "player disconnected")]
    PlayerDisconnected(ParticipantView),
    /// Changed world snapshot.
    #[serde(rename = "serverstate")]
    ServerState(Snapshot),
    /// Relayed or server-originated application event.
    #[serde(rename = "game event")]
    GameEvent(GameEventPayload),
}

impl OutboundMessage {
    /// Wire name of the message, used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connected(_) => "connected",
            Self::PlayerConnected(_) => "player connected",
            Self::PlayerDisconnected(_) => "player disconnected",
            Self::ServerState(_) => "serverstate",
            Self::GameEvent(_) => "game event",
        }
    }
}
