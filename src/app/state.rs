//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Aggregator, AggregatorHandle, GameState};
use crate::ws::fanout::Fanout;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub aggregator: AggregatorHandle,
    pub fanout: Arc<Fanout>,
}

impl AppState {
    /// Build the state and the aggregator task that backs it. The caller
    /// spawns the returned aggregator.
    pub fn new(config: Config) -> (Self, Aggregator) {
        let config = Arc::new(config);

        // Fan-out is the aggregator's observer
        let fanout = Arc::new(Fanout::new(config.subscriber_buffer));
        let (aggregator, handle) = Aggregator::new(GameState::new(), fanout.clone());

        let state = Self {
            config,
            aggregator: handle,
            fanout,
        };

        (state, aggregator)
    }
}
