//! Hardware input sources
//!
//! Everything above this module sees a joystick as an [`InputSource`]
//! returning a [`RawSample`] per read. Concrete adapters (UART and GPIO via
//! `rppal`) only exist on Linux.

pub mod line;

#[cfg(target_os = "linux")]
pub mod gpio;
#[cfg(target_os = "linux")]
pub mod serial;

use tracing::{info, warn};

use crate::relay::Direction;

/// An unprocessed reading from a joystick source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawSample {
    /// A text line expected to carry a signed integer
    Line(String),
    /// A digital switch; `direction` applies while it is pressed
    Switch { pressed: bool, direction: Direction },
    /// Nothing available this tick
    Empty,
}

impl RawSample {
    /// Reduce the reading to a direction.
    pub fn normalize(&self) -> Result<Direction, SampleError> {
        match self {
            Self::Line(text) => {
                let trimmed = text.trim();
                trimmed
                    .parse::<i64>()
                    .map(Direction::from_reading)
                    .map_err(|_| SampleError::Malformed(trimmed.to_string()))
            }
            Self::Switch { pressed: true, direction } => Ok(*direction),
            Self::Switch { pressed: false, .. } => Ok(Direction::Neutral),
            Self::Empty => Err(SampleError::NoData),
        }
    }
}

/// A physical joystick that can be read without blocking.
///
/// Implementations own their device handle and release it on drop.
pub trait InputSource: Send {
    /// Device address, for logs
    fn address(&self) -> &str;

    fn read(&mut self) -> Result<RawSample, SampleError>;
}

/// Failure of a single read
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SampleError {
    #[error("no data available")]
    NoData,

    #[error("malformed sample: {0:?}")]
    Malformed(String),

    #[error("device read failed: {0}")]
    Io(String),
}

/// Failure to acquire a device at startup
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    #[error("failed to open {address}: {reason}")]
    Open { address: String, reason: String },

    #[error("no hardware found, tried: {}", tried.join(", "))]
    Unavailable { tried: Vec<String> },
}

/// Try each candidate address in order and keep the first that opens.
///
/// This is a one-shot probe; callers decide what to do when nothing opens.
pub fn open_first<S, F>(candidates: &[String], mut open: F) -> Result<S, HardwareError>
where
    F: FnMut(&str) -> Result<S, HardwareError>,
{
    for address in candidates {
        match open(address) {
            Ok(source) => {
                info!(address = %address, "Opened joystick device");
                return Ok(source);
            }
            Err(e) => {
                warn!(address = %address, error = %e, "Joystick device not usable, trying next");
            }
        }
    }

    Err(HardwareError::Unavailable {
        tried: candidates.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_parse_as_signed_integers() {
        assert_eq!(RawSample::Line(" 1\r".into()).normalize(), Ok(Direction::Positive));
        assert_eq!(RawSample::Line("-1".into()).normalize(), Ok(Direction::Negative));
        assert_eq!(RawSample::Line("0".into()).normalize(), Ok(Direction::Neutral));
        assert_eq!(RawSample::Line("-42".into()).normalize(), Ok(Direction::Negative));
    }

    #[test]
    fn garbage_lines_are_malformed() {
        assert_eq!(
            RawSample::Line("abc".into()).normalize(),
            Err(SampleError::Malformed("abc".into()))
        );
        assert!(RawSample::Line("".into()).normalize().is_err());
        assert!(RawSample::Line("0.5".into()).normalize().is_err());
    }

    #[test]
    fn switch_maps_to_its_direction_only_when_pressed() {
        let pressed = RawSample::Switch {
            pressed: true,
            direction: Direction::Negative,
        };
        let released = RawSample::Switch {
            pressed: false,
            direction: Direction::Negative,
        };
        assert_eq!(pressed.normalize(), Ok(Direction::Negative));
        assert_eq!(released.normalize(), Ok(Direction::Neutral));
    }

    #[test]
    fn probe_stops_at_first_working_address() {
        let candidates = vec!["/dev/a".to_string(), "/dev/b".to_string(), "/dev/c".to_string()];
        let mut attempts = Vec::new();

        let opened = open_first(&candidates, |address| {
            attempts.push(address.to_string());
            if address == "/dev/b" {
                Ok(address.to_string())
            } else {
                Err(HardwareError::Open {
                    address: address.to_string(),
                    reason: "missing".into(),
                })
            }
        })
        .unwrap();

        assert_eq!(opened, "/dev/b");
        assert_eq!(attempts, vec!["/dev/a", "/dev/b"]);
    }

    #[test]
    fn probe_reports_every_candidate_when_none_open() {
        let candidates = vec!["/dev/a".to_string(), "/dev/b".to_string()];
        let result: Result<(), _> = open_first(&candidates, |address| {
            Err(HardwareError::Open {
                address: address.to_string(),
                reason: "missing".into(),
            })
        });

        match result {
            Err(HardwareError::Unavailable { tried }) => assert_eq!(tried, candidates),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
