//! Point-in-time game state and its wire form

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};
use serde_json::Value;

/// Latest report for one player
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Client coordinates, passed through untouched
    pub position: Value,
    pub score: u64,
    pub co2_reduced: f64,
    pub energy_generated: f64,
}

/// Owned copy of the aggregator's table. Nothing here aliases live state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameSnapshot {
    pub players: BTreeMap<String, PlayerState>,
    pub threats: Vec<Value>,
    pub powerups: Vec<Value>,
}

impl GameSnapshot {
    pub fn scores(&self) -> BTreeMap<&str, u64> {
        self.project(|p| p.score)
    }

    pub fn co2_reduced(&self) -> BTreeMap<&str, f64> {
        self.project(|p| p.co2_reduced)
    }

    pub fn energy_generated(&self) -> BTreeMap<&str, f64> {
        self.project(|p| p.energy_generated)
    }

    fn project<T>(&self, field: impl Fn(&PlayerState) -> T) -> BTreeMap<&str, T> {
        self.players
            .iter()
            .map(|(id, player)| (id.as_str(), field(player)))
            .collect()
    }
}

/// `game_state_update` payload. The per-metric maps are derived from
/// `players` here so they can never disagree with it.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireSnapshot<'a> {
    players: &'a BTreeMap<String, PlayerState>,
    threats: &'a [Value],
    powerups: &'a [Value],
    scores: BTreeMap<&'a str, u64>,
    co2_reduced: BTreeMap<&'a str, f64>,
    energy_generated: BTreeMap<&'a str, f64>,
}

impl Serialize for GameSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireSnapshot {
            players: &self.players,
            threats: &self.threats,
            powerups: &self.powerups,
            scores: self.scores(),
            co2_reduced: self.co2_reduced(),
            energy_generated: self.energy_generated(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_form_carries_derived_maps() {
        let mut snapshot = GameSnapshot::default();
        snapshot.players.insert(
            "p1".into(),
            PlayerState {
                position: json!({"x": 1, "y": 2}),
                score: 10,
                co2_reduced: 2.5,
                energy_generated: 0.0,
            },
        );
        snapshot.threats.push(json!({"kind": "smog"}));

        let wire = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(
            wire,
            json!({
                "players": {"p1": {"position": {"x": 1, "y": 2}, "score": 10, "co2Reduced": 2.5, "energyGenerated": 0.0}},
                "threats": [{"kind": "smog"}],
                "powerups": [],
                "scores": {"p1": 10},
                "co2Reduced": {"p1": 2.5},
                "energyGenerated": {"p1": 0.0}
            })
        );
    }
}
