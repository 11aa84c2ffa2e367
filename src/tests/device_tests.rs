use super::sim_bus::{glitched_reply, instant_timing, ok_reply, SimDevice, SimulatedBus};
use crate::bus::{BusChannel, BusError};
use crate::device::{
    CommandTimeout, DeviceSession, GlitchCorrection, QueryOutcome, Reply, SessionTiming,
    StatusCode, LONG_TIMEOUT, SHORT_TIMEOUT,
};

#[test]
fn classify_long_commands() {
    for command in ["R", "r", "CAL", "calibrate", "Cal,mid,7.00"] {
        assert_eq!(CommandTimeout::classify(command), CommandTimeout::Long, "{}", command);
    }
}

#[test]
fn classify_sleep_commands() {
    assert_eq!(CommandTimeout::classify("SLEEP"), CommandTimeout::NoWait);
    assert_eq!(CommandTimeout::classify("sleep"), CommandTimeout::NoWait);
    assert_eq!(CommandTimeout::classify("Sleep"), CommandTimeout::NoWait);
}

#[test]
fn classify_everything_else_short() {
    for command in ["I", "name,?", "Status", "L,1", "Find", ""] {
        assert_eq!(CommandTimeout::classify(command), CommandTimeout::Short, "{}", command);
    }
}

#[test]
fn timeout_for_uses_session_durations() {
    let device = DeviceSession::new(99, "pH", "", SessionTiming::default()).unwrap();

    assert_eq!(device.timeout_for("R"), Some(LONG_TIMEOUT));
    assert_eq!(device.timeout_for("cal,clear"), Some(LONG_TIMEOUT));
    assert_eq!(device.timeout_for("i"), Some(SHORT_TIMEOUT));
    assert_eq!(device.timeout_for("sleep"), None);
}

#[test]
fn decode_success_clears_high_bit() {
    let reply = Reply::decode(&[1, 0x41, 0xC2, 0x00], GlitchCorrection::ClearHighBit);
    assert_eq!(reply, Reply::Success("AB".to_string()));
}

#[test]
fn decode_error_uses_status_byte() {
    let reply = Reply::decode(&[2, 0x31], GlitchCorrection::ClearHighBit);
    assert_eq!(reply, Reply::Error("2".to_string()));
    assert_eq!(reply.status(), Some(StatusCode::SyntaxError));
    assert_eq!(reply.payload(), None);
}

#[test]
fn decode_empty_is_no_response() {
    assert_eq!(Reply::decode(&[], GlitchCorrection::ClearHighBit), Reply::NoResponse);
    assert_eq!(Reply::decode(&[], GlitchCorrection::Disabled), Reply::NoResponse);
}

#[test]
fn decode_status_byte_is_not_corrected() {
    // 0x81 would become 1 if the status byte were corrected
    let reply = Reply::decode(&[0x81, 0x41], GlitchCorrection::ClearHighBit);
    assert_eq!(reply, Reply::Error("129".to_string()));
    assert_eq!(reply.status(), None);
}

#[test]
fn decode_strips_embedded_terminators() {
    let reply = Reply::decode(
        &[1, b'7', 0, b'.', 0x80, b'0', 0, 0, 0],
        GlitchCorrection::ClearHighBit,
    );
    assert_eq!(reply, Reply::Success("7.0".to_string()));
}

#[test]
fn decode_without_correction_keeps_high_bit() {
    let reply = Reply::decode(&[1, 0x41, 0xC2], GlitchCorrection::Disabled);
    assert_eq!(reply, Reply::Success("A\u{C2}".to_string()));
}

#[test]
fn status_codes_from_pending_and_no_data() {
    assert_eq!(Reply::Error("254".to_string()).status(), Some(StatusCode::Pending));
    assert_eq!(Reply::Error("255".to_string()).status(), Some(StatusCode::NoData));
    assert_eq!(Reply::Success(String::new()).status(), Some(StatusCode::Success));
    assert_eq!(Reply::NoResponse.status(), None);
}

#[test]
fn identity_with_and_without_name() {
    let named = DeviceSession::new(100, "EC", "ProbeA", SessionTiming::default()).unwrap();
    let unnamed = DeviceSession::new(99, "pH", "", SessionTiming::default()).unwrap();

    assert_eq!(named.identity(), "EC 100 ProbeA");
    assert_eq!(unnamed.identity(), "pH 99");
    assert_eq!(unnamed.to_string(), "pH 99");
}

#[test]
fn describe_replies() {
    let device = DeviceSession::new(100, "EC", "ProbeA", SessionTiming::default()).unwrap();

    assert_eq!(
        device.describe(&Reply::Success("12.5".to_string())),
        "Success EC 100 ProbeA: 12.5"
    );
    assert_eq!(device.describe(&Reply::Error("2".to_string())), "Error EC 100 ProbeA: 2");
    assert_eq!(device.describe(&Reply::NoResponse), "No response EC 100 ProbeA");
}

#[test]
fn new_rejects_out_of_range_address() {
    assert_eq!(
        DeviceSession::new(128, "pH", "", SessionTiming::default()),
        Err(BusError::InvalidAddress(128))
    );
    assert!(DeviceSession::new(127, "pH", "", SessionTiming::default()).is_ok());
}

#[test]
fn write_appends_terminator_and_selects_address() {
    let mut bus = SimulatedBus::new()
        .with_device(97, SimDevice::new())
        .with_device(99, SimDevice::new());
    let device = DeviceSession::new(99, "pH", "", instant_timing()).unwrap();

    bus.select(97).unwrap();
    device.write(&mut bus, "R").unwrap();

    assert_eq!(bus.selected(), Some(99));
    assert_eq!(bus.writes, vec![(99, vec![b'R', 0])]);
}

#[test]
fn read_reselects_own_address() {
    let mut bus = SimulatedBus::new()
        .with_device(97, SimDevice::new())
        .with_device(99, SimDevice::new().reply("R", glitched_reply("7.02")));
    let device = DeviceSession::new(99, "pH", "", instant_timing()).unwrap();

    device.write(&mut bus, "R").unwrap();
    bus.select(97).unwrap();

    assert_eq!(device.read(&mut bus), Ok(Reply::Success("7.02".to_string())));
    assert_eq!(bus.reads, vec![99]);
}

#[test]
fn read_bytes_limits_reply_length() {
    let mut bus =
        SimulatedBus::new().with_device(99, SimDevice::new().reply("R", ok_reply("7.025")));
    let device = DeviceSession::new(99, "pH", "", instant_timing()).unwrap();

    device.write(&mut bus, "R").unwrap();
    assert_eq!(device.read_bytes(&mut bus, 3), Ok(Reply::Success("7.".to_string())));
}

#[test]
fn read_from_absent_device_is_bus_error() {
    let mut bus = SimulatedBus::new();
    let device = DeviceSession::new(42, "pH", "", instant_timing()).unwrap();

    assert!(matches!(device.read(&mut bus), Err(BusError::HardwareError(_))));
}

#[test]
fn query_reads_reply() {
    let mut bus = SimulatedBus::new().with_device(100, SimDevice::ezo("EC", "ProbeA"));
    let device = DeviceSession::new(100, "EC", "", instant_timing()).unwrap();

    assert_eq!(
        device.query(&mut bus, "I"),
        Ok(QueryOutcome::Reply(Reply::Success("?I,EC,2.16".to_string())))
    );
}

#[test]
fn query_sleep_does_not_read() {
    let mut bus = SimulatedBus::new().with_device(100, SimDevice::new());
    let device = DeviceSession::new(100, "EC", "", instant_timing()).unwrap();

    assert_eq!(device.query(&mut bus, "Sleep"), Ok(QueryOutcome::Asleep));
    assert_eq!(bus.writes.len(), 1);
    assert!(bus.reads.is_empty());
}

#[test]
fn query_surfaces_device_error() {
    let mut bus = SimulatedBus::new().with_device(100, SimDevice::new().reply("X", vec![2, 0, 0]));
    let device = DeviceSession::new(100, "EC", "", instant_timing()).unwrap();

    assert_eq!(
        device.query(&mut bus, "X"),
        Ok(QueryOutcome::Reply(Reply::Error("2".to_string())))
    );
}

#[test]
fn query_silent_device_is_no_response() {
    let mut bus = SimulatedBus::new().with_device(100, SimDevice::silent());
    let device = DeviceSession::new(100, "EC", "", instant_timing()).unwrap();

    assert_eq!(device.query(&mut bus, "R"), Ok(QueryOutcome::Reply(Reply::NoResponse)));
}
