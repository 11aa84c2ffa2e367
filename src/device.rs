use crate::bus::{BusChannel, BusError, MAX_ADDRESS};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, thread, time::Duration};
use strum::{Display as StrumDisplay, FromRepr};

// the timeout needed to query readings and calibrations
pub const LONG_TIMEOUT: Duration = Duration::from_millis(900);
// timeout for regular commands
pub const SHORT_TIMEOUT: Duration = Duration::from_millis(300);
pub const DEFAULT_READ_SIZE: usize = 31;
pub const DEFAULT_ADDRESS: u8 = 98;

pub const LONG_TIMEOUT_COMMANDS: [&str; 2] = ["R", "CAL"];
pub const SLEEP_COMMANDS: [&str; 1] = ["SLEEP"];

const TERMINATOR: u8 = 0x00;
const HIGH_BIT: u8 = 0x80;

/// How long a command needs before its reply can be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, StrumDisplay)]
pub enum CommandTimeout {
    #[strum(serialize = "no wait")]
    NoWait,
    #[strum(serialize = "short wait")]
    Short,
    #[strum(serialize = "long wait")]
    Long,
}

impl CommandTimeout {
    /// Case-insensitive prefix match against the known command families.
    pub fn classify(command: &str) -> Self {
        let command = command.to_ascii_uppercase();
        if LONG_TIMEOUT_COMMANDS.iter().any(|c| command.starts_with(c)) {
            CommandTimeout::Long
        } else if SLEEP_COMMANDS.iter().any(|c| command.starts_with(c)) {
            CommandTimeout::NoWait
        } else {
            CommandTimeout::Short
        }
    }
}

/// Repair applied to every reply byte after the status byte.
///
/// The Raspberry Pi I2C controller sets bit 7 on everything it clocks in
/// after the first byte. Boards without the glitch should use `Disabled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, StrumDisplay)]
pub enum GlitchCorrection {
    #[default]
    ClearHighBit,
    Disabled,
}

impl GlitchCorrection {
    pub fn correct(self, byte: u8) -> u8 {
        match self {
            GlitchCorrection::ClearHighBit => byte & !HIGH_BIT,
            GlitchCorrection::Disabled => byte,
        }
    }
}

/// Status values an EZO circuit puts in the first byte of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, StrumDisplay)]
#[repr(u8)]
pub enum StatusCode {
    #[strum(serialize = "success")]
    Success = 1,
    #[strum(serialize = "syntax error")]
    SyntaxError = 2,
    #[strum(serialize = "still processing")]
    Pending = 254,
    #[strum(serialize = "no data to send")]
    NoData = 255,
}

/// A decoded device reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Status byte was 1; holds the corrected payload.
    Success(String),
    /// Status byte was anything else; holds the status value as text.
    Error(String),
    /// Nothing came back.
    NoResponse,
}

impl Reply {
    pub fn decode(raw: &[u8], correction: GlitchCorrection) -> Self {
        let (status, rest) = match raw.split_first() {
            Some(split) => split,
            None => return Reply::NoResponse,
        };

        if *status != StatusCode::Success as u8 {
            return Reply::Error(status.to_string());
        }

        let payload = rest
            .iter()
            .map(|&b| correction.correct(b))
            .filter(|&b| b != TERMINATOR)
            .map(char::from)
            .collect();

        Reply::Success(payload)
    }

    pub fn payload(&self) -> Option<&str> {
        match self {
            Reply::Success(payload) => Some(payload.as_str()),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Reply::Success(_) => Some(StatusCode::Success),
            Reply::Error(code) => code.parse::<u8>().ok().and_then(StatusCode::from_repr),
            Reply::NoResponse => None,
        }
    }
}

/// Result of a full write/wait/read exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// The command puts the device to sleep, so nothing was read back.
    Asleep,
    Reply(Reply),
}

/// Per-session timing and decoding settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub long_timeout: Duration,
    pub short_timeout: Duration,
    pub read_size: usize,
    pub correction: GlitchCorrection,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            long_timeout: LONG_TIMEOUT,
            short_timeout: SHORT_TIMEOUT,
            read_size: DEFAULT_READ_SIZE,
            correction: GlitchCorrection::default(),
        }
    }
}

/// One addressed sensor module on a shared bus.
///
/// The session never holds on to the bus. Each operation takes it by
/// exclusive reference and re-selects this device's address first.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSession {
    address: u8,
    module_type: String,
    name: String,
    timing: SessionTiming,
}

impl DeviceSession {
    pub fn new(
        address: u8,
        module_type: &str,
        name: &str,
        timing: SessionTiming,
    ) -> Result<Self, BusError> {
        if address > MAX_ADDRESS {
            return Err(BusError::InvalidAddress(address));
        }

        Ok(DeviceSession {
            address,
            module_type: module_type.to_string(),
            name: name.to_string(),
            timing,
        })
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn module_type(&self) -> &str {
        &self.module_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `"<module> <address>"`, with `" <name>"` appended when one is known.
    pub fn identity(&self) -> String {
        if self.name.is_empty() {
            format!("{} {}", self.module_type, self.address)
        } else {
            format!("{} {} {}", self.module_type, self.address, self.name)
        }
    }

    pub fn describe(&self, reply: &Reply) -> String {
        match reply {
            Reply::Success(payload) => format!("Success {}: {}", self.identity(), payload),
            Reply::Error(code) => format!("Error {}: {}", self.identity(), code),
            Reply::NoResponse => format!("No response {}", self.identity()),
        }
    }

    pub fn timeout_for(&self, command: &str) -> Option<Duration> {
        match CommandTimeout::classify(command) {
            CommandTimeout::NoWait => None,
            CommandTimeout::Short => Some(self.timing.short_timeout),
            CommandTimeout::Long => Some(self.timing.long_timeout),
        }
    }

    pub fn write<B: BusChannel + ?Sized>(
        &self,
        bus: &mut B,
        command: &str,
    ) -> Result<(), BusError> {
        let mut bytes = command.as_bytes().to_vec();
        bytes.push(TERMINATOR);

        bus.select(self.address)?;
        bus.write_raw(&bytes)
    }

    pub fn read<B: BusChannel + ?Sized>(&self, bus: &mut B) -> Result<Reply, BusError> {
        self.read_bytes(bus, self.timing.read_size)
    }

    pub fn read_bytes<B: BusChannel + ?Sized>(
        &self,
        bus: &mut B,
        max_bytes: usize,
    ) -> Result<Reply, BusError> {
        bus.select(self.address)?;
        let raw = bus.read_raw(max_bytes)?;
        let reply = Reply::decode(&raw, self.timing.correction);

        if let Reply::Error(code) = &reply {
            match reply.status() {
                Some(status) => warn!("{} reported {} ({})", self.identity(), code, status),
                None => warn!("{} reported unknown status {}", self.identity(), code),
            }
        }

        Ok(reply)
    }

    pub fn query<B: BusChannel + ?Sized>(
        &self,
        bus: &mut B,
        command: &str,
    ) -> Result<QueryOutcome, BusError> {
        self.write(bus, command)?;

        let wait = match self.timeout_for(command) {
            Some(wait) => wait,
            None => {
                debug!("{} was sent \"{}\", not waiting for a reply", self.identity(), command);
                return Ok(QueryOutcome::Asleep);
            }
        };

        thread::sleep(wait);
        Ok(QueryOutcome::Reply(self.read(bus)?))
    }
}

impl Display for DeviceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.identity())
    }
}
