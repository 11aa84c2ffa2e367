use super::{BusChannel, BusError, MAX_ADDRESS};
use i2c_linux::I2c;
use log::debug;
use std::{
    fs::File,
    io::{Read, Write},
    path::Path,
};

const I2C_CLASS_PATH: &str = "/sys/class/i2c-dev";
const I2C_DEVICE_PATH: &str = "/dev";

pub const DEFAULT_BUS: u8 = 1;

fn sysfs_map_err(err: std::io::Error, default_err_msg: &str) -> BusError {
    BusError::HardwareError(format!("{}: {}", default_err_msg, err))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handle {
    Reader,
    Writer,
}

/// Points the reader and then the writer at `address`.
///
/// If either handle fails, the two may now disagree on the slave address, so
/// `selected` is cleared and the next transfer has to select again.
pub(crate) fn select_handles<F>(
    selected: &mut Option<u8>,
    address: u8,
    mut set_address: F,
) -> Result<(), BusError>
where
    F: FnMut(Handle) -> std::io::Result<()>,
{
    if address > MAX_ADDRESS {
        return Err(BusError::InvalidAddress(address));
    }

    for handle in [Handle::Reader, Handle::Writer] {
        if let Err(err) = set_address(handle) {
            *selected = None;
            return Err(sysfs_map_err(
                err,
                &format!("failed to select address {} on {:?} handle", address, handle),
            ));
        }
    }

    *selected = Some(address);
    Ok(())
}

/// I2C bus opened through the i2c-dev character device.
///
/// Holds one handle for writing and one for reading, both always pointed at
/// the same slave address.
pub struct SysfsI2cChannel {
    bus_id: u8,
    reader: I2c<File>,
    writer: I2c<File>,
    selected: Option<u8>,
}

impl SysfsI2cChannel {
    pub fn open(bus_id: u8) -> Result<Self, BusError> {
        let path = Path::new(I2C_CLASS_PATH);
        if !path.exists() || !path.is_dir() {
            return Err(BusError::OsError(
                "I2C is not supported on this system".to_string(),
            ));
        }

        let device_path = Path::new(I2C_DEVICE_PATH).join(format!("i2c-{}", bus_id));
        if !device_path.exists() {
            return Err(BusError::BusNotFound(bus_id));
        }

        let reader = I2c::from_path(&device_path).map_err(|err| {
            sysfs_map_err(err, &format!("failed to open read handle for I2C bus {}", bus_id))
        })?;
        let writer = I2c::from_path(&device_path).map_err(|err| {
            sysfs_map_err(err, &format!("failed to open write handle for I2C bus {}", bus_id))
        })?;

        debug!("Opened {} for reading and writing", device_path.display());
        Ok(SysfsI2cChannel {
            bus_id,
            reader,
            writer,
            selected: None,
        })
    }

    fn assert_selected(&self) -> Result<u8, BusError> {
        self.selected.ok_or(BusError::NoAddressSelected)
    }
}

impl BusChannel for SysfsI2cChannel {
    fn bus_id(&self) -> u8 {
        self.bus_id
    }

    fn selected(&self) -> Option<u8> {
        self.selected
    }

    fn select(&mut self, address: u8) -> Result<(), BusError> {
        let reader = &mut self.reader;
        let writer = &mut self.writer;
        select_handles(&mut self.selected, address, |handle| match handle {
            Handle::Reader => reader.smbus_set_slave_address(address as u16, false),
            Handle::Writer => writer.smbus_set_slave_address(address as u16, false),
        })
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), BusError> {
        let address = self.assert_selected()?;
        self.writer
            .write_all(bytes)
            .map_err(|err| sysfs_map_err(err, &format!("write to address {} failed", address)))
    }

    fn read_raw(&mut self, max_bytes: usize) -> Result<Vec<u8>, BusError> {
        let address = self.assert_selected()?;
        let mut buf = vec![0u8; max_bytes];
        let received = self
            .reader
            .read(&mut buf)
            .map_err(|err| sysfs_map_err(err, &format!("read from address {} failed", address)))?;

        buf.truncate(received);
        Ok(buf)
    }
}
