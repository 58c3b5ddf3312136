//! Joystick relay: sampling loops, publish gate and the relay task that
//! forwards joystick events to every connected subscriber.

pub mod publisher;
pub mod sampler;
pub mod sources;

pub use publisher::{Publish, PublishError, PublishPolicy, Publisher};
pub use sampler::Sampler;
pub use sources::{spawn_sampler, start_samplers};

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::ws::fanout::Fanout;
use crate::ws::protocol::{JoystickInput, ServerMsg};

/// A hardware reading reduced to one of three directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Direction {
    Negative,
    #[default]
    Neutral,
    Positive,
}

impl Direction {
    /// Reduce any integer reading to its sign.
    pub fn from_reading(value: i64) -> Self {
        match value.signum() {
            -1 => Self::Negative,
            1 => Self::Positive,
            _ => Self::Neutral,
        }
    }

    pub fn as_i8(self) -> i8 {
        match self {
            Self::Negative => -1,
            Self::Neutral => 0,
            Self::Positive => 1,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        direction.as_i8()
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Negative),
            0 => Ok(Self::Neutral),
            1 => Ok(Self::Positive),
            other => Err(format!("joystick value {other} outside -1..=1")),
        }
    }
}

/// Which joystick a sampler is wired to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Left,
    Right,
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Left => f.write_str("left"),
            Self::Right => f.write_str("right"),
        }
    }
}

/// One normalized sample tagged with the joystick it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoystickEvent {
    pub source: SourceId,
    pub value: Direction,
}

impl JoystickEvent {
    pub fn new(source: SourceId, value: Direction) -> Self {
        Self { source, value }
    }
}

impl JoystickInput {
    /// Take the event's value for its joystick; the other axis keeps its last value.
    pub fn record(&mut self, event: JoystickEvent) {
        match event.source {
            SourceId::Left => self.left_joystick = event.value,
            SourceId::Right => self.right_joystick = event.value,
        }
    }
}

/// Forward published events to all subscribers, in arrival order.
///
/// This is the single consumer of every publisher's channel. Each frame
/// carries both axes: the joystick that just reported and the last value
/// seen from the other one (neutral until it reports).
pub async fn run_relay(mut events: mpsc::Receiver<JoystickEvent>, fanout: Arc<Fanout>) {
    info!("Joystick relay started");

    let mut axes = JoystickInput::default();
    while let Some(event) = events.recv().await {
        axes.record(event);
        let delivery = fanout.broadcast(&ServerMsg::JoystickInput(axes));
        debug!(
            source = %event.source,
            value = event.value.as_i8(),
            delivered = delivery.delivered,
            "Relayed joystick event"
        );
    }

    info!("Joystick relay stopped, all publishers gone");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_reduce_to_sign() {
        assert_eq!(Direction::from_reading(-7), Direction::Negative);
        assert_eq!(Direction::from_reading(0), Direction::Neutral);
        assert_eq!(Direction::from_reading(1), Direction::Positive);
        assert_eq!(Direction::from_reading(250), Direction::Positive);
    }

    #[test]
    fn direction_rejects_out_of_range_on_the_wire() {
        let ok: Direction = serde_json::from_str("-1").unwrap();
        assert_eq!(ok, Direction::Negative);
        assert!(serde_json::from_str::<Direction>("2").is_err());
        assert_eq!(serde_json::to_string(&Direction::Positive).unwrap(), "1");
    }

    #[test]
    fn right_source_fills_right_axis_only() {
        let mut input = JoystickInput::default();
        input.record(JoystickEvent::new(SourceId::Right, Direction::Positive));
        assert_eq!(input.left_joystick, Direction::Neutral);
        assert_eq!(input.right_joystick, Direction::Positive);
    }

    async fn relay_frames(sent: &[JoystickEvent]) -> Vec<serde_json::Value> {
        let fanout = Arc::new(Fanout::new(16));
        let (_id, mut rx) = fanout.subscribe();
        let (tx, events) = mpsc::channel(16);

        let relay = tokio::spawn(run_relay(events, fanout.clone()));
        for event in sent {
            tx.send(*event).await.unwrap();
        }
        drop(tx);
        relay.await.unwrap();

        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(serde_json::from_str(&frame).unwrap());
        }
        frames
    }

    #[tokio::test]
    async fn relay_forwards_events_to_subscribers() {
        let frames = relay_frames(&[JoystickEvent::new(SourceId::Left, Direction::Negative)]).await;

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["event"], "joystick_input");
        assert_eq!(frames[0]["data"]["leftJoystick"], -1);
        assert_eq!(frames[0]["data"]["rightJoystick"], 0);
    }

    #[tokio::test]
    async fn both_held_joysticks_appear_in_the_same_frame() {
        let frames = relay_frames(&[
            JoystickEvent::new(SourceId::Left, Direction::Negative),
            JoystickEvent::new(SourceId::Right, Direction::Positive),
            JoystickEvent::new(SourceId::Left, Direction::Negative),
            JoystickEvent::new(SourceId::Right, Direction::Positive),
            JoystickEvent::new(SourceId::Left, Direction::Neutral),
        ])
        .await;

        let axes: Vec<(i64, i64)> = frames
            .iter()
            .map(|f| {
                (
                    f["data"]["leftJoystick"].as_i64().unwrap(),
                    f["data"]["rightJoystick"].as_i64().unwrap(),
                )
            })
            .collect();
        assert_eq!(axes, vec![(-1, 0), (-1, 1), (-1, 1), (-1, 1), (0, 1)]);
    }
}
