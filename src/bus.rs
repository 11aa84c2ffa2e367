use std::fmt::Display;

/// Highest 7-bit slave address that can be selected on the bus.
pub const MAX_ADDRESS: u8 = 127;

#[derive(Debug, PartialEq)]
pub enum BusError {
    BusNotFound(u8),
    InvalidAddress(u8),
    NoAddressSelected,
    OsError(String),
    HardwareError(String),
}

impl Display for BusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&match self {
            BusError::BusNotFound(bus_id) => format!("I2C bus {} does not exist", bus_id),
            BusError::InvalidAddress(address) => format!("invalid slave address: {}", address),
            BusError::NoAddressSelected => format!("no slave address has been selected"),
            BusError::OsError(msg) => format!("OS error: {}", msg),
            BusError::HardwareError(msg) => format!("hardware error: {}", msg),
        })
    }
}

impl std::error::Error for BusError {}

/// A shared bus segment where one slave address is selected at a time.
///
/// Every write and read goes to the currently selected address, so callers
/// must `select` the device they want right before talking to it.
pub trait BusChannel {
    fn bus_id(&self) -> u8;
    fn selected(&self) -> Option<u8>;
    fn select(&mut self, address: u8) -> Result<(), BusError>;
    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), BusError>;
    /// Reads up to `max_bytes` from the selected address. Short and empty
    /// reads are returned as-is.
    fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>, BusError>;
}

// Bus implementations
pub mod i2c_sysfs; // SysfsI2cChannel
