//! Subscriber registry and broadcast delivery
//!
//! Each WebSocket connection owns a bounded queue. A frame is encoded once
//! and handed to every queue with `try_send`, so one slow or dead connection
//! never holds up the rest.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::game::{GameSnapshot, StateObserver};
use crate::ws::protocol::ServerMsg;

/// An encoded JSON frame shared by all recipients
pub type Frame = Arc<str>;

/// Outcome of one broadcast
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub delivered: usize,
    /// Subscriber queue was full; frame skipped for that subscriber
    pub skipped: usize,
    /// Subscriber had gone away and was removed
    pub removed: usize,
}

pub struct Fanout {
    subscribers: DashMap<Uuid, mpsc::Sender<Frame>>,
    buffer: usize,
}

impl Fanout {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
        }
    }

    /// Register a new subscriber and return its id and frame queue.
    pub fn subscribe(&self) -> (Uuid, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);
        debug!(connection_id = %id, subscribers = self.subscribers.len(), "Subscriber added");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            debug!(connection_id = %id, subscribers = self.subscribers.len(), "Subscriber removed");
        }
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver a message to every subscriber.
    pub fn broadcast(&self, msg: &ServerMsg) -> Delivery {
        let Some(frame) = encode(msg) else {
            return Delivery::default();
        };

        let mut delivery = Delivery::default();
        let mut gone = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(frame.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(connection_id = %entry.key(), "Subscriber queue full, skipping frame");
                    delivery.skipped += 1;
                }
                Err(TrySendError::Closed(_)) => gone.push(*entry.key()),
            }
        }

        // Removing while iterating would deadlock the shard
        for id in gone {
            self.unsubscribe(id);
            delivery.removed += 1;
        }

        delivery
    }

    /// Deliver a message to one subscriber only. Returns false if it was not
    /// queued.
    pub fn send_to(&self, id: Uuid, msg: &ServerMsg) -> bool {
        let Some(frame) = encode(msg) else {
            return false;
        };

        let Some(tx) = self.subscribers.get(&id).map(|entry| entry.value().clone()) else {
            return false;
        };

        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection_id = %id, "Subscriber queue full, dropping direct frame");
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.unsubscribe(id);
                false
            }
        }
    }
}

impl StateObserver for Fanout {
    fn on_state_changed(&self, snapshot: GameSnapshot) {
        let delivery = self.broadcast(&ServerMsg::GameStateUpdate(snapshot));
        debug!(
            delivered = delivery.delivered,
            skipped = delivery.skipped,
            removed = delivery.removed,
            "Game state broadcast"
        );
    }
}

fn encode(msg: &ServerMsg) -> Option<Frame> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(json.into()),
        Err(e) => {
            error!(error = %e, "Failed to encode server message");
            None
        }
    }
}
