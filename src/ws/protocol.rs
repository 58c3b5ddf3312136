//! WebSocket protocol message definitions
//! Every frame is `{"event": <name>, "data": <payload>}`

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::game::GameSnapshot;
use crate::relay::Direction;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Position and score report for one player
    PlayerMove(PlayerMove),

    /// A player fired
    PlayerShoot(PlayerShoot),

    /// Joystick values pushed by a remote relay
    JoystickInput(JoystickInput),
}

impl ClientMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::PlayerMove(_) => "player_move",
            Self::PlayerShoot(_) => "player_shoot",
            Self::JoystickInput(_) => "joystick_input",
        }
    }

    /// Event name of a frame that failed to parse, when it is a game update
    /// the sender expects an answer to.
    pub fn update_event(text: &str) -> Option<&'static str> {
        let frame: Value = serde_json::from_str(text).ok()?;
        match frame.get("event")?.as_str()? {
            "player_move" => Some("player_move"),
            "player_shoot" => Some("player_shoot"),
            _ => None,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First frame on a new connection
    Welcome { connection_id: Uuid, server_time: u64 },

    /// Full game state, sent after every accepted change
    GameStateUpdate(GameSnapshot),

    /// Sample from a joystick attached to this server
    JoystickInput(JoystickInput),

    /// Joystick values received from a remote relay
    JoystickData(JoystickInput),

    /// Sent only to the connection whose update was refused
    UpdateRejected { event: &'static str, reason: String },
}

/// Inbound `player_move` payload. Everything is optional on the wire;
/// the aggregator decides what is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerMove {
    pub player_id: Option<String>,
    /// Opaque client coordinates, stored as sent
    pub position: Option<Value>,
    pub score: Option<i64>,
    #[serde(rename = "co2Reduced")]
    pub co2_reduced: Option<f64>,
    #[serde(rename = "energyGenerated")]
    pub energy_generated: Option<f64>,
}

/// Inbound `player_shoot` payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerShoot {
    pub player_id: Option<String>,
    pub shot: Option<Value>,
    #[serde(rename = "currentCategory")]
    pub current_category: Option<Value>,
}

/// Both joystick axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoystickInput {
    #[serde(default)]
    pub left_joystick: Direction,
    #[serde(default)]
    pub right_joystick: Direction,
}
