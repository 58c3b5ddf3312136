//! Aggregator task: the only owner of the game state
//!
//! All mutations and snapshot reads arrive as commands on one channel and
//! run one at a time, so last-write-wins follows arrival order without
//! locking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::snapshot::GameSnapshot;
use super::state::{GameState, RejectedUpdate};
use crate::ws::protocol::{PlayerMove, PlayerShoot};

/// Notified after every accepted change
pub trait StateObserver: Send + Sync {
    fn on_state_changed(&self, snapshot: GameSnapshot);
}

#[derive(Debug, thiserror::Error)]
pub enum AggregatorError {
    #[error(transparent)]
    Rejected(#[from] RejectedUpdate),

    #[error("game state aggregator has stopped")]
    Stopped,
}

enum Command {
    Move {
        update: PlayerMove,
        reply: oneshot::Sender<Result<(), RejectedUpdate>>,
    },
    Shoot {
        shot: PlayerShoot,
        reply: oneshot::Sender<Result<(), RejectedUpdate>>,
    },
    ReplaceEntities {
        threats: Vec<Value>,
        powerups: Vec<Value>,
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<GameSnapshot>,
    },
}

/// Cloneable handle injected into transport handlers
#[derive(Clone)]
pub struct AggregatorHandle {
    commands: mpsc::Sender<Command>,
    player_count: Arc<AtomicUsize>,
}

impl AggregatorHandle {
    pub async fn apply_move(&self, update: PlayerMove) -> Result<(), AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Move { update, reply }, rx)
            .await?
            .map_err(AggregatorError::from)
    }

    pub async fn apply_shot(&self, shot: PlayerShoot) -> Result<(), AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Shoot { shot, reply }, rx)
            .await?
            .map_err(AggregatorError::from)
    }

    /// Swap in a new threats/powerups list from whoever owns the world.
    pub async fn replace_entities(
        &self,
        threats: Vec<Value>,
        powerups: Vec<Value>,
    ) -> Result<(), AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            Command::ReplaceEntities {
                threats,
                powerups,
                reply,
            },
            rx,
        )
        .await
    }

    pub async fn snapshot(&self) -> Result<GameSnapshot, AggregatorError> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Snapshot { reply }, rx).await
    }

    /// Players seen this session, without a round trip
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }

    async fn request<T>(
        &self,
        command: Command,
        rx: oneshot::Receiver<T>,
    ) -> Result<T, AggregatorError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AggregatorError::Stopped)?;
        rx.await.map_err(|_| AggregatorError::Stopped)
    }
}

pub struct Aggregator {
    state: GameState,
    commands: mpsc::Receiver<Command>,
    observer: Arc<dyn StateObserver>,
    player_count: Arc<AtomicUsize>,
}

impl Aggregator {
    pub fn new(state: GameState, observer: Arc<dyn StateObserver>) -> (Self, AggregatorHandle) {
        let (commands_tx, commands) = mpsc::channel(256);
        let player_count = Arc::new(AtomicUsize::new(state.player_count()));

        let handle = AggregatorHandle {
            commands: commands_tx,
            player_count: player_count.clone(),
        };

        let aggregator = Self {
            state,
            commands,
            observer,
            player_count,
        };

        (aggregator, handle)
    }

    /// Process commands until every handle is dropped
    pub async fn run(mut self) {
        info!("Game state aggregator started");

        while let Some(command) = self.commands.recv().await {
            self.handle(command);
        }

        info!("Game state aggregator stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Move { update, reply } => {
                let result = self.state.apply_move(update);
                self.after_update(&result);
                let _ = reply.send(result);
            }
            Command::Shoot { shot, reply } => {
                let result = self.state.apply_shot(shot);
                self.after_update(&result);
                let _ = reply.send(result);
            }
            Command::ReplaceEntities {
                threats,
                powerups,
                reply,
            } => {
                self.state.replace_entities(threats, powerups);
                self.notify();
                let _ = reply.send(());
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot());
            }
        }
    }

    fn after_update(&self, result: &Result<(), RejectedUpdate>) {
        match result {
            Ok(()) => self.notify(),
            Err(reason) => debug!(reason = %reason, "Update rejected, state unchanged"),
        }
    }

    /// Runs before the caller's reply, so a broadcast never trails the ack.
    fn notify(&self) {
        self.player_count
            .store(self.state.player_count(), Ordering::Relaxed);
        self.observer.on_state_changed(self.state.snapshot());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use tokio_test::assert_ok;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<GameSnapshot>>,
    }

    impl StateObserver for Recorder {
        fn on_state_changed(&self, snapshot: GameSnapshot) {
            self.seen.lock().unwrap().push(snapshot);
        }
    }

    fn spawn() -> (AggregatorHandle, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let (aggregator, handle) = Aggregator::new(GameState::new(), recorder.clone());
        tokio::spawn(aggregator.run());
        (handle, recorder)
    }

    fn mv(id: Option<&str>, position: Value, score: Option<i64>) -> PlayerMove {
        PlayerMove {
            player_id: id.map(str::to_string),
            position: Some(position),
            score,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn accepted_moves_are_observed_in_order() {
        let (handle, recorder) = spawn();

        assert_ok!(handle.apply_move(mv(Some("p1"), json!({"x": 1, "y": 2}), Some(10))).await);
        assert_ok!(handle.apply_move(mv(Some("p1"), json!({"x": 3, "y": 2}), None)).await);

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].players["p1"].score, 10);
        assert_eq!(seen[1].players["p1"].position, json!({"x": 3, "y": 2}));
        assert_eq!(seen[1].players["p1"].score, 0);
        assert_eq!(handle.player_count(), 1);
    }

    #[tokio::test]
    async fn rejected_move_is_reported_and_not_broadcast() {
        let (handle, recorder) = spawn();

        let result = handle.apply_move(mv(None, json!({"x": 0, "y": 0}), None)).await;
        assert!(matches!(
            result,
            Err(AggregatorError::Rejected(RejectedUpdate::MissingPlayerId))
        ));

        assert!(recorder.seen.lock().unwrap().is_empty());
        assert!(handle.snapshot().await.unwrap().players.is_empty());
    }

    #[tokio::test]
    async fn shots_and_entity_swaps_trigger_broadcasts() {
        let (handle, recorder) = spawn();

        assert_ok!(
            handle
                .apply_shot(PlayerShoot {
                    player_id: Some("p1".into()),
                    shot: Some(json!({"dir": 1})),
                    current_category: None,
                })
                .await
        );
        assert_ok!(
            handle
                .replace_entities(vec![json!({"id": 1})], vec![json!({"id": 2})])
                .await
        );

        let seen = recorder.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].threats, vec![json!({"id": 1})]);
        assert_eq!(seen[1].powerups, vec![json!({"id": 2})]);
    }

    #[tokio::test]
    async fn repeated_snapshots_match_without_mutation() {
        let (handle, _recorder) = spawn();
        assert_ok!(handle.apply_move(mv(Some("p1"), json!({"x": 1}), Some(2))).await);

        let mut first = handle.snapshot().await.unwrap();
        let second = handle.snapshot().await.unwrap();
        assert_eq!(first, second);

        first.players.remove("p1");
        assert_eq!(handle.snapshot().await.unwrap(), second);
    }

    #[tokio::test]
    async fn handle_reports_stopped_aggregator() {
        let recorder = Arc::new(Recorder::default());
        let (aggregator, handle) = Aggregator::new(GameState::new(), recorder);
        drop(aggregator);

        assert!(matches!(handle.snapshot().await, Err(AggregatorError::Stopped)));
    }
}
