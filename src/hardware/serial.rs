//! Microcontroller joystick over a serial line
//!
//! The board prints one integer per line (`-1`, `0` or `1`). Each poll
//! reports the newest complete line and discards older ones.

use std::time::Duration;

use rppal::uart::{Parity, Uart};
use tracing::{debug, info};

use super::line::LineBuffer;
use super::{HardwareError, InputSource, RawSample, SampleError};

/// Time the board needs to come out of reset after the port opens
const RESET_DELAY: Duration = Duration::from_secs(2);

pub struct SerialSource {
    address: String,
    uart: Uart,
    lines: LineBuffer,
    scratch: [u8; 64],
}

impl SerialSource {
    /// Open the port at 8N1 in non-blocking read mode.
    ///
    /// Blocks for the board reset delay; call from a blocking context.
    pub fn open(address: &str, baud_rate: u32) -> Result<Self, HardwareError> {
        let open_err = |e: rppal::uart::Error| HardwareError::Open {
            address: address.to_string(),
            reason: e.to_string(),
        };

        let mut uart = Uart::with_path(address, baud_rate, Parity::None, 8, 1).map_err(open_err)?;
        uart.set_read_mode(0, Duration::ZERO).map_err(open_err)?;

        info!(address, baud_rate, "Serial port opened, waiting for board reset");
        std::thread::sleep(RESET_DELAY);

        Ok(Self {
            address: address.to_string(),
            uart,
            lines: LineBuffer::new(),
            scratch: [0; 64],
        })
    }

    fn fill(&mut self) -> Result<(), SampleError> {
        let waiting = self
            .uart
            .input_len()
            .map_err(|e| SampleError::Io(e.to_string()))?;

        if waiting == 0 {
            return Ok(());
        }

        let read = self
            .uart
            .read(&mut self.scratch)
            .map_err(|e| SampleError::Io(e.to_string()))?;
        self.lines.extend(&self.scratch[..read]);
        Ok(())
    }
}

impl InputSource for SerialSource {
    fn address(&self) -> &str {
        &self.address
    }

    fn read(&mut self) -> Result<RawSample, SampleError> {
        self.fill()?;
        Ok(self
            .lines
            .latest_line()
            .map(RawSample::Line)
            .unwrap_or(RawSample::Empty))
    }
}

impl Drop for SerialSource {
    fn drop(&mut self) {
        debug!(address = %self.address, "Closing serial connection");
    }
}
