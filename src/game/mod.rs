//! Authoritative game state

pub mod aggregator;
pub mod collision;
pub mod snapshot;
pub mod state;

pub use aggregator::{Aggregator, AggregatorError, AggregatorHandle, StateObserver};
pub use collision::{ClientSideCollisions, CollisionHook, ShotContext};
pub use snapshot::{GameSnapshot, PlayerState};
pub use state::{GameState, RejectedUpdate};
