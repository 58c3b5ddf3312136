//! Opening configured joystick hardware and starting one sampler per source

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::{JoystickEvent, PublishPolicy, Publisher, Sampler, SourceId};
use crate::config::Config;
use crate::hardware::InputSource;

/// Start a sampler task for a source that is already open.
pub fn spawn_sampler<S>(
    source_id: SourceId,
    source: S,
    events: &mpsc::Sender<JoystickEvent>,
    policy: PublishPolicy,
) -> JoinHandle<()>
where
    S: InputSource + 'static,
{
    let publisher = Publisher::new(events.clone(), policy.poll_interval);
    tokio::spawn(Sampler::new(source_id, source).run(publisher, policy))
}

/// Open every configured input and start its sampler.
///
/// A source that cannot be opened is logged and skipped; the others and the
/// server keep running. Aborting a returned task releases its device.
#[cfg(target_os = "linux")]
pub async fn start_samplers(
    config: &Config,
    events: &mpsc::Sender<JoystickEvent>,
) -> Vec<JoinHandle<()>> {
    use tracing::error;

    use crate::config::InputKind;
    use crate::hardware::{gpio::GpioSource, open_first, serial::SerialSource};
    use crate::relay::Direction;

    let mut tasks = Vec::new();

    for kind in &config.input_sources {
        match kind {
            InputKind::Serial => {
                let ports = config.serial_ports.clone();
                let baud = config.serial_baud;

                // Opening waits out the board reset
                let opened = tokio::task::spawn_blocking(move || {
                    open_first(&ports, |address| SerialSource::open(address, baud))
                })
                .await;

                match opened {
                    Ok(Ok(source)) => {
                        tasks.push(spawn_sampler(SourceId::Left, source, events, config.publish));
                    }
                    Ok(Err(e)) => error!(error = %e, "Serial joystick unavailable, sampler not started"),
                    Err(e) => error!(error = %e, "Serial probe task failed"),
                }
            }
            InputKind::Gpio => {
                for &pin in &config.gpio_idle_pins {
                    if let Err(e) = GpioSource::configure_idle(pin) {
                        warn!(pin, error = %e, "Idle GPIO pin not configured");
                    }
                }

                let pins = [
                    (SourceId::Left, config.gpio_left_pin, Direction::Negative),
                    (SourceId::Right, config.gpio_right_pin, Direction::Positive),
                ];

                for (source_id, pin, direction) in pins {
                    let candidates = [format!("gpio{pin}")];
                    let opened = open_first(&candidates, |address| {
                        GpioSource::open(GpioSource::parse_address(address)?, direction)
                    });

                    match opened {
                        Ok(source) => {
                            tasks.push(spawn_sampler(source_id, source, events, config.publish));
                        }
                        Err(e) => error!(
                            source = %source_id,
                            error = %e,
                            "GPIO joystick unavailable, sampler not started"
                        ),
                    }
                }
            }
        }
    }

    if tasks.is_empty() && !config.input_sources.is_empty() {
        warn!("No joystick hardware could be opened; serving without local input");
    }

    tasks
}

#[cfg(not(target_os = "linux"))]
pub async fn start_samplers(
    config: &Config,
    _events: &mpsc::Sender<JoystickEvent>,
) -> Vec<JoinHandle<()>> {
    if !config.input_sources.is_empty() {
        warn!("Joystick hardware is only supported on Linux; serving without local input");
    }
    Vec::new()
}
