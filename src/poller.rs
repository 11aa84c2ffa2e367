use crate::bus::BusChannel;
use crate::device::{CommandTimeout, Reply};
use crate::registry::DeviceRegistry;
use log::{debug, warn};
use std::thread;

pub const DEFAULT_POLL_COMMAND: &str = "R";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The command puts devices to sleep, so no replies were read.
    Asleep,
    /// One reply per registered device, in registry order.
    Replies(Vec<Reply>),
}

/// Sends `command` to every device, waits once, then reads every device.
///
/// The wait is taken from the first device in the registry. Bus faults on a
/// single device become a `NoResponse` slot for that device.
pub fn poll_all<B: BusChannel + ?Sized>(
    bus: &mut B,
    registry: &DeviceRegistry,
    command: &str,
) -> PollOutcome {
    let first = match registry.first() {
        Some(device) => device,
        None => return PollOutcome::Replies(Vec::new()),
    };

    debug!(
        "Polling {} device(s) with \"{}\" ({})",
        registry.len(),
        command,
        CommandTimeout::classify(command)
    );

    let mut written = Vec::with_capacity(registry.len());
    for device in registry {
        match device.write(bus, command) {
            Ok(_) => written.push(true),
            Err(e) => {
                warn!("Failed to send \"{}\" to {}: {}", command, device.identity(), e);
                written.push(false);
            }
        }
    }

    let wait = match first.timeout_for(command) {
        Some(wait) => wait,
        None => {
            debug!("\"{}\" puts devices to sleep, skipping reads", command);
            return PollOutcome::Asleep;
        }
    };

    if registry.iter().any(|device| device.timeout_for(command) != Some(wait)) {
        warn!(
            "Devices disagree on how long to wait for \"{}\", using {} ms from {}",
            command,
            wait.as_millis(),
            first.identity()
        );
    }

    thread::sleep(wait);

    let replies = registry
        .iter()
        .zip(written)
        .map(|(device, was_written)| {
            if !was_written {
                return Reply::NoResponse;
            }

            match device.read(bus) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Failed to read from {}: {}", device.identity(), e);
                    Reply::NoResponse
                }
            }
        })
        .collect();

    PollOutcome::Replies(replies)
}
