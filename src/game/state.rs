//! Authoritative per-player state table

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use super::collision::{ClientSideCollisions, CollisionHook, ShotContext};
use super::snapshot::{GameSnapshot, PlayerState};
use crate::ws::protocol::{PlayerMove, PlayerShoot};

/// Why an inbound update was not applied
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectedUpdate {
    #[error("missing player_id")]
    MissingPlayerId,

    #[error("missing position")]
    MissingPosition,

    #[error("missing shot")]
    MissingShot,

    #[error("{0} must be a finite, non-negative number")]
    InvalidField(&'static str),
}

/// Empty-ish values (`null`, `false`, `0`, `""`, `[]`, `{}`) count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn required_id(player_id: Option<String>) -> Result<String, RejectedUpdate> {
    player_id
        .filter(|id| !id.is_empty())
        .ok_or(RejectedUpdate::MissingPlayerId)
}

fn metric(value: Option<f64>, field: &'static str) -> Result<f64, RejectedUpdate> {
    match value {
        None => Ok(0.0),
        Some(v) if v.is_finite() && v >= 0.0 => Ok(v),
        Some(_) => Err(RejectedUpdate::InvalidField(field)),
    }
}

/// Player table plus the externally owned world entities.
///
/// Not synchronized; the aggregator task is its only owner.
pub struct GameState {
    players: BTreeMap<String, PlayerState>,
    threats: Vec<Value>,
    powerups: Vec<Value>,
    collisions: Box<dyn CollisionHook>,
}

impl GameState {
    pub fn new() -> Self {
        Self::with_collision_hook(Box::new(ClientSideCollisions))
    }

    pub fn with_collision_hook(collisions: Box<dyn CollisionHook>) -> Self {
        Self {
            players: BTreeMap::new(),
            threats: Vec::new(),
            powerups: Vec::new(),
            collisions,
        }
    }

    /// Replace a player's whole row. Omitted metrics become zero; nothing is
    /// merged from the previous row.
    pub fn apply_move(&mut self, update: PlayerMove) -> Result<(), RejectedUpdate> {
        let player_id = required_id(update.player_id)?;
        let position = update
            .position
            .filter(is_present)
            .ok_or(RejectedUpdate::MissingPosition)?;

        let score = match update.score {
            None => 0,
            Some(s) => u64::try_from(s).map_err(|_| RejectedUpdate::InvalidField("score"))?,
        };
        let co2_reduced = metric(update.co2_reduced, "co2Reduced")?;
        let energy_generated = metric(update.energy_generated, "energyGenerated")?;

        debug!(player_id = %player_id, score, "Player row replaced");
        self.players.insert(
            player_id,
            PlayerState {
                position,
                score,
                co2_reduced,
                energy_generated,
            },
        );
        Ok(())
    }

    /// Validate a shot and pass it to the collision hook.
    pub fn apply_shot(&mut self, shot: PlayerShoot) -> Result<(), RejectedUpdate> {
        let player_id = required_id(shot.player_id)?;
        let payload = shot
            .shot
            .filter(is_present)
            .ok_or(RejectedUpdate::MissingShot)?;

        self.collisions.resolve(
            ShotContext {
                player_id: &player_id,
                shot: &payload,
                category: shot.current_category.as_ref(),
            },
            &mut self.players,
        );
        Ok(())
    }

    pub fn replace_entities(&mut self, threats: Vec<Value>, powerups: Vec<Value>) {
        self.threats = threats;
        self.powerups = powerups;
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            players: self.players.clone(),
            threats: self.threats.clone(),
            powerups: self.powerups.clone(),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&PlayerState> {
        self.players.get(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new()
    }
}
