//! Fixed-cadence polling of one joystick source

use governor::clock::Clock;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::publisher::{Publish, PublishError, PublishPolicy, Publisher};
use super::{Direction, JoystickEvent, SourceId};
use crate::hardware::{InputSource, SampleError};

/// Owns one input source and turns its readings into directions.
pub struct Sampler<S> {
    source_id: SourceId,
    source: S,
}

impl<S: InputSource> Sampler<S> {
    pub fn new(source_id: SourceId, source: S) -> Self {
        Self { source_id, source }
    }

    pub fn source_id(&self) -> SourceId {
        self.source_id
    }

    /// Read once. Any failure is logged and reported as neutral.
    pub fn poll(&mut self) -> Direction {
        match self.source.read().and_then(|raw| raw.normalize()) {
            Ok(direction) => direction,
            Err(SampleError::NoData) => {
                debug!(source = %self.source_id, "No joystick data this tick");
                Direction::Neutral
            }
            Err(e) => {
                warn!(
                    source = %self.source_id,
                    address = %self.source.address(),
                    error = %e,
                    "Joystick read failed, reporting neutral"
                );
                Direction::Neutral
            }
        }
    }

    /// Poll and publish a single sample.
    pub fn tick<C: Clock>(&mut self, publisher: &Publisher<C>) -> Result<Publish, PublishError> {
        let event = JoystickEvent::new(self.source_id, self.poll());
        publisher.publish(event)
    }

    /// Sample forever at the policy's cadence.
    ///
    /// Publish failures pause the loop for the backoff and never end it.
    /// Dropping the future (task abort) releases the source.
    pub async fn run<C: Clock>(mut self, publisher: Publisher<C>, policy: PublishPolicy) {
        info!(
            source = %self.source_id,
            address = %self.source.address(),
            interval_ms = policy.poll_interval.as_millis() as u64,
            "Sampler started"
        );

        let mut ticker = interval(policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if let Err(e) = self.tick(&publisher) {
                error!(
                    source = %self.source_id,
                    error = %e,
                    backoff_ms = policy.backoff.as_millis() as u64,
                    "Publish failed, backing off"
                );
                sleep(policy.backoff).await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::hardware::{InputSource, RawSample, SampleError};

    /// Replays a fixed list of readings, then reports no data.
    pub struct ScriptedSource {
        readings: VecDeque<Result<RawSample, SampleError>>,
        pub reads: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        pub fn new(readings: Vec<Result<RawSample, SampleError>>) -> Self {
            Self {
                readings: readings.into(),
                reads: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn lines(values: &[&str]) -> Self {
            Self::new(values.iter().map(|v| Ok(RawSample::Line(v.to_string()))).collect())
        }
    }

    impl InputSource for ScriptedSource {
        fn address(&self) -> &str {
            "scripted"
        }

        fn read(&mut self) -> Result<RawSample, SampleError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.readings.pop_front().unwrap_or(Ok(RawSample::Empty))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use governor::clock::FakeRelativeClock;
    use tokio::sync::mpsc;

    use super::testing::ScriptedSource;
    use super::*;
    use crate::hardware::RawSample;
    use crate::relay::publisher::DEFAULT_POLL_INTERVAL;
    use crate::ws::protocol::{JoystickInput, ServerMsg};

    #[test]
    fn bad_readings_poll_as_neutral() {
        let source = ScriptedSource::new(vec![
            Err(SampleError::Io("device unplugged".into())),
            Ok(RawSample::Line("garbage".into())),
            Ok(RawSample::Line("".into())),
            Ok(RawSample::Empty),
            Err(SampleError::NoData),
        ]);
        let mut sampler = Sampler::new(SourceId::Left, source);

        for _ in 0..5 {
            assert_eq!(sampler.poll(), Direction::Neutral);
        }
        // Exhausted source keeps reporting neutral
        assert_eq!(sampler.poll(), Direction::Neutral);
    }

    #[test]
    fn sampled_sequence_becomes_left_joystick_frames() {
        let clock = FakeRelativeClock::default();
        let (tx, mut rx) = mpsc::channel(16);
        let publisher = Publisher::with_clock(tx, DEFAULT_POLL_INTERVAL, &clock);
        let mut sampler = Sampler::new(SourceId::Left, ScriptedSource::lines(&["0", "1", "1", "-1", "0"]));

        for _ in 0..5 {
            assert_eq!(sampler.tick(&publisher), Ok(Publish::Sent));
            clock.advance(DEFAULT_POLL_INTERVAL);
        }

        let mut axes = JoystickInput::default();
        let mut frames = Vec::new();
        while let Ok(event) = rx.try_recv() {
            axes.record(event);
            let msg = ServerMsg::JoystickInput(axes);
            frames.push(serde_json::to_value(&msg).unwrap());
        }

        assert_eq!(frames.len(), 5);
        let lefts: Vec<i64> = frames
            .iter()
            .map(|f| f["data"]["leftJoystick"].as_i64().unwrap())
            .collect();
        assert_eq!(lefts, vec![0, 1, 1, -1, 0]);
        for frame in &frames {
            assert_eq!(frame["event"], "joystick_input");
            assert_eq!(frame["data"]["rightJoystick"], 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn publish_failure_backs_off_instead_of_spinning() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let source = ScriptedSource::lines(&[]);
        let reads = source.reads.clone();
        let sampler = Sampler::new(SourceId::Right, source);
        let policy = PublishPolicy::default();

        let outcome = tokio::time::timeout(
            Duration::from_millis(2500),
            sampler.run(Publisher::new(tx, policy.poll_interval), policy),
        )
        .await;

        assert!(outcome.is_err(), "sampler loop must not exit on publish failure");
        let reads = reads.load(Ordering::SeqCst);
        assert!((2..=3).contains(&reads), "polled {reads} times in 2.5s");
    }
}
