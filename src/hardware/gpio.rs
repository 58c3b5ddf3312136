//! Joystick switches wired straight to GPIO pins
//!
//! Pins are pulled up, so a pressed switch reads low.

use rppal::gpio::{Gpio, InputPin};
use tracing::{debug, info};

use super::{HardwareError, InputSource, RawSample, SampleError};
use crate::relay::Direction;

pub struct GpioSource {
    address: String,
    pin: InputPin,
    direction: Direction,
}

impl GpioSource {
    /// Claim a BCM pin as a pulled-up input.
    pub fn open(bcm_pin: u8, direction: Direction) -> Result<Self, HardwareError> {
        Ok(Self {
            address: format!("gpio{bcm_pin}"),
            pin: claim_pullup(bcm_pin)?,
            direction,
        })
    }

    /// Pull up a pin that is wired but never sampled (the sticks' Y axes)
    /// so it does not float, and log its level once.
    pub fn configure_idle(bcm_pin: u8) -> Result<(), HardwareError> {
        let mut pin = claim_pullup(bcm_pin)?;
        pin.set_reset_on_drop(false);
        Ok(())
    }

    /// Parse a `gpioN` or bare `N` address into a BCM pin number.
    pub fn parse_address(address: &str) -> Result<u8, HardwareError> {
        address
            .trim_start_matches("gpio")
            .parse()
            .map_err(|_| HardwareError::Open {
                address: address.to_string(),
                reason: "not a BCM pin number".into(),
            })
    }
}

fn claim_pullup(bcm_pin: u8) -> Result<InputPin, HardwareError> {
    let address = format!("gpio{bcm_pin}");
    let pin = Gpio::new()
        .and_then(|gpio| gpio.get(bcm_pin))
        .map_err(|e| HardwareError::Open {
            address: address.clone(),
            reason: e.to_string(),
        })?
        .into_input_pullup();

    info!(address = %address, level = ?pin.read(), "GPIO pin configured as pull-up input");
    Ok(pin)
}

impl InputSource for GpioSource {
    fn address(&self) -> &str {
        &self.address
    }

    fn read(&mut self) -> Result<RawSample, SampleError> {
        Ok(RawSample::Switch {
            pressed: self.pin.is_low(),
            direction: self.direction,
        })
    }
}

impl Drop for GpioSource {
    fn drop(&mut self) {
        // InputPin restores the pin's previous mode when dropped
        debug!(address = %self.address, "Releasing GPIO pin");
    }
}
