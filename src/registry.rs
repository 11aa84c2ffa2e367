use crate::bus::{BusChannel, BusError, MAX_ADDRESS};
use crate::device::{DeviceSession, QueryOutcome, Reply, SessionTiming};
use log::{debug, info, warn};
use std::fmt::Display;

pub const INFO_COMMAND: &str = "I";
pub const NAME_COMMAND: &str = "name,?";

#[derive(Debug, PartialEq)]
pub enum IdentificationError {
    Bus(u8, BusError),
    Asleep(u8, String),
    Rejected(u8, String),
    Malformed(u8, String),
}

impl Display for IdentificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&match self {
            IdentificationError::Bus(address, err) => format!("address {}: {}", address, err),
            IdentificationError::Asleep(address, command) => {
                format!("address {}: \"{}\" does not produce a reply", address, command)
            }
            IdentificationError::Rejected(address, reply) => {
                format!("address {}: query was rejected ({})", address, reply)
            }
            IdentificationError::Malformed(address, payload) => {
                format!("address {}: unexpected identification reply {:?}", address, payload)
            }
        })
    }
}

impl std::error::Error for IdentificationError {}

/// Devices found on the bus, in ascending address order.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: Vec<DeviceSession>,
}

impl DeviceRegistry {
    pub fn new(devices: Vec<DeviceSession>) -> Self {
        Self { devices }
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn first(&self) -> Option<&DeviceSession> {
        self.devices.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeviceSession> {
        self.devices.iter()
    }

    pub fn summary(&self, highlight: Option<usize>) -> Vec<String> {
        self.devices
            .iter()
            .enumerate()
            .map(|(index, device)| {
                if highlight == Some(index) {
                    format!("--> {}", device.identity())
                } else {
                    format!(" - {}", device.identity())
                }
            })
            .collect()
    }
}

impl<'a> IntoIterator for &'a DeviceRegistry {
    type Item = &'a DeviceSession;
    type IntoIter = std::slice::Iter<'a, DeviceSession>;

    fn into_iter(self) -> Self::IntoIter {
        self.devices.iter()
    }
}

/// Probes every 7-bit address with a one byte read and returns the ones
/// that answered. The address selected before the sweep is selected again
/// afterwards.
pub fn discover_addresses<B: BusChannel + ?Sized>(bus: &mut B) -> Result<Vec<u8>, BusError> {
    let previous = bus.selected();
    let mut live = Vec::new();

    for address in 0..=MAX_ADDRESS {
        let probe = bus.select(address).and_then(|_| bus.read_raw(1));
        match probe {
            Ok(_) => live.push(address),
            Err(e) => debug!("No device at address {}: {}", address, e),
        }
    }

    // restore the address we were using
    match previous {
        Some(address) => bus.select(address)?,
        None => debug!("No address was selected before the scan, nothing to restore"),
    }

    info!(
        "Found {} live address(es) on I2C bus {}: {:?}",
        live.len(),
        bus.bus_id(),
        live
    );
    Ok(live)
}

fn reply_field(
    address: u8,
    command: &str,
    outcome: QueryOutcome,
) -> Result<String, IdentificationError> {
    let payload = match outcome {
        QueryOutcome::Reply(Reply::Success(payload)) => payload,
        QueryOutcome::Reply(reply) => {
            return Err(IdentificationError::Rejected(address, format!("{:?}", reply)))
        }
        QueryOutcome::Asleep => {
            return Err(IdentificationError::Asleep(address, command.to_string()))
        }
    };

    match payload.split(',').nth(1) {
        Some(field) => Ok(field.trim().to_string()),
        None => Err(IdentificationError::Malformed(address, payload)),
    }
}

/// Asks the device at `address` for its module type and name.
pub fn identify<B: BusChannel + ?Sized>(
    bus: &mut B,
    address: u8,
    timing: SessionTiming,
) -> Result<DeviceSession, IdentificationError> {
    let probe = DeviceSession::new(address, "", "", timing)
        .map_err(|e| IdentificationError::Bus(address, e))?;

    let info = probe
        .query(bus, INFO_COMMAND)
        .map_err(|e| IdentificationError::Bus(address, e))?;
    let module_type = reply_field(address, INFO_COMMAND, info)?;

    let name = probe
        .query(bus, NAME_COMMAND)
        .map_err(|e| IdentificationError::Bus(address, e))?;
    let name = reply_field(address, NAME_COMMAND, name)?;

    DeviceSession::new(address, &module_type, &name, timing)
        .map_err(|e| IdentificationError::Bus(address, e))
}

/// Identifies each live address, skipping the ones that don't answer like
/// an EZO circuit.
pub fn build_registry<B: BusChannel + ?Sized>(
    bus: &mut B,
    addresses: &[u8],
    timing: SessionTiming,
) -> DeviceRegistry {
    let mut devices = Vec::new();

    for &address in addresses {
        match identify(bus, address, timing) {
            Ok(device) => {
                debug!("Identified {}", device.identity());
                devices.push(device);
            }
            Err(e) => warn!(
                "Device at I2C address {} is not an EZO device and will not be queried: {}",
                address, e
            ),
        }
    }

    DeviceRegistry::new(devices)
}

pub fn scan<B: BusChannel + ?Sized>(
    bus: &mut B,
    timing: SessionTiming,
) -> Result<DeviceRegistry, BusError> {
    let addresses = discover_addresses(bus)?;
    Ok(build_registry(bus, &addresses, timing))
}
