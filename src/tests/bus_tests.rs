use crate::bus::i2c_sysfs::{select_handles, Handle};
use crate::bus::BusError;
use std::io;

#[test]
fn select_sets_both_handles() {
    let mut selected = Some(98);
    let mut touched = Vec::new();

    let result = select_handles(&mut selected, 100, |handle| {
        touched.push(handle);
        Ok(())
    });

    assert_eq!(result, Ok(()));
    assert_eq!(selected, Some(100));
    assert_eq!(touched, vec![Handle::Reader, Handle::Writer]);
}

#[test]
fn failed_writer_select_clears_selection() {
    let mut selected = Some(98);

    let result = select_handles(&mut selected, 100, |handle| match handle {
        Handle::Reader => Ok(()),
        Handle::Writer => Err(io::Error::new(io::ErrorKind::Other, "nack")),
    });

    assert!(matches!(result, Err(BusError::HardwareError(_))));
    assert_eq!(selected, None);
}

#[test]
fn failed_reader_select_skips_writer() {
    let mut selected = Some(98);
    let mut touched = Vec::new();

    let result = select_handles(&mut selected, 100, |handle| {
        touched.push(handle);
        Err(io::Error::new(io::ErrorKind::Other, "nack"))
    });

    assert!(result.is_err());
    assert_eq!(selected, None);
    assert_eq!(touched, vec![Handle::Reader]);
}

#[test]
fn select_rejects_ten_bit_addresses() {
    let mut selected = Some(98);

    let result = select_handles(&mut selected, 128, |_| Ok(()));

    assert_eq!(result, Err(BusError::InvalidAddress(128)));
    assert_eq!(selected, Some(98));
}
