//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::relay::PublishPolicy;
use crate::util::rate_limit::INPUT_RATE_LIMIT;

/// Serial ports probed in order when no list is configured
pub const DEFAULT_SERIAL_PORTS: [&str; 4] =
    ["/dev/ttyUSB0", "/dev/ttyUSB1", "/dev/ttyACM0", "/dev/ttyACM1"];

/// Y-axis pins of the left and right sticks
pub const DEFAULT_GPIO_IDLE_PINS: [u8; 2] = [2, 6];

/// Kind of joystick hardware to sample
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputKind {
    /// One joystick on a microcontroller, read over UART (left axis)
    Serial,
    /// Two switches on GPIO pins (left and right)
    Gpio,
}

impl FromStr for InputKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serial" => Ok(Self::Serial),
            "gpio" => Ok(Self::Gpio),
            _ => Err(ConfigError::Invalid("INPUT_SOURCES")),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS, `*` for any
    pub client_origin: String,

    /// Hardware to sample; empty runs the server without local joysticks
    pub input_sources: Vec<InputKind>,
    /// Sampling cadence and publish backoff
    pub publish: PublishPolicy,

    pub serial_ports: Vec<String>,
    pub serial_baud: u32,
    /// BCM pin of the left switch
    pub gpio_left_pin: u8,
    /// BCM pin of the right switch
    pub gpio_right_pin: u8,
    /// Wired but unsampled pins (Y axes), pulled up at startup
    pub gpio_idle_pins: Vec<u8>,

    /// Frames a subscriber may have queued before it starts missing some
    pub subscriber_buffer: usize,
    /// Inbound frames per second per connection
    pub input_rate_limit: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // PORT wins over SERVER_ADDR, as on most hosting platforms
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:5000".to_string()),
        };

        let input_sources = lookup("INPUT_SOURCES")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(str::parse::<InputKind>)
            .collect::<Result<Vec<InputKind>, _>>()?;

        let serial_ports = match lookup("SERIAL_PORTS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => DEFAULT_SERIAL_PORTS.iter().map(|s| s.to_string()).collect(),
        };

        let gpio_idle_pins = match lookup("GPIO_IDLE_PINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|pin| pin.parse::<u8>().map_err(|_| ConfigError::Invalid("GPIO_IDLE_PINS")))
                .collect::<Result<Vec<u8>, _>>()?,
            None => DEFAULT_GPIO_IDLE_PINS.to_vec(),
        };

        let poll_interval_ms: u64 = parse_or(&lookup, "POLL_INTERVAL_MS", 50)?;
        if poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("POLL_INTERVAL_MS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").unwrap_or_else(|| "*".to_string()),

            input_sources,
            publish: PublishPolicy {
                poll_interval: Duration::from_millis(poll_interval_ms),
                backoff: Duration::from_millis(parse_or(&lookup, "PUBLISH_BACKOFF_MS", 1000)?),
            },

            serial_ports,
            serial_baud: parse_or(&lookup, "SERIAL_BAUD", 9600)?,
            gpio_left_pin: parse_or(&lookup, "GPIO_LEFT_PIN", 1)?,
            gpio_right_pin: parse_or(&lookup, "GPIO_RIGHT_PIN", 7)?,
            gpio_idle_pins,

            subscriber_buffer: parse_or(&lookup, "SUBSCRIBER_BUFFER", 64)?,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", INPUT_RATE_LIMIT)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}
