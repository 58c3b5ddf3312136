//! Shot resolution hook
//!
//! Clients currently detect their own hits, so the server-side hook is a
//! no-op. The seam exists so an authoritative resolver can be dropped in.

use std::collections::BTreeMap;

use serde_json::Value;

use super::PlayerState;

/// A validated shot
#[derive(Debug, Clone, Copy)]
pub struct ShotContext<'a> {
    pub player_id: &'a str,
    pub shot: &'a Value,
    pub category: Option<&'a Value>,
}

pub trait CollisionHook: Send {
    /// Resolve a shot, adjusting any player rows it affects.
    fn resolve(&mut self, shot: ShotContext<'_>, players: &mut BTreeMap<String, PlayerState>);
}

/// Leaves hit detection to the clients
#[derive(Debug, Default, Clone, Copy)]
pub struct ClientSideCollisions;

impl CollisionHook for ClientSideCollisions {
    fn resolve(&mut self, _shot: ShotContext<'_>, _players: &mut BTreeMap<String, PlayerState>) {}
}
