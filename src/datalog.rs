use crate::device::{DeviceSession, Reply};
use crate::poller::PollOutcome;
use crate::registry::DeviceRegistry;
use chrono::{DateTime, Local};
use csv::{Writer, WriterBuilder};
use log::debug;
use std::fmt::Display;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const INSUFFICIENT_READINGS: &str = "insufficient_readings";

#[derive(Debug, PartialEq)]
pub enum DatalogError {
    IoError(String),
    CsvError(String),
}

impl Display for DatalogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&match self {
            DatalogError::IoError(msg) => format!("datalog I/O error: {}", msg),
            DatalogError::CsvError(msg) => format!("datalog CSV error: {}", msg),
        })
    }
}

impl std::error::Error for DatalogError {}

impl From<csv::Error> for DatalogError {
    fn from(err: csv::Error) -> Self {
        DatalogError::CsvError(err.to_string())
    }
}

impl From<std::io::Error> for DatalogError {
    fn from(err: std::io::Error) -> Self {
        DatalogError::IoError(err.to_string())
    }
}

/// Turns a reading reply into a number, or a short description of why it
/// couldn't be.
pub fn parse_reading(device: &DeviceSession, reply: &Reply) -> Result<f64, String> {
    let payload = match reply {
        Reply::Success(payload) => payload.trim(),
        Reply::Error(_) => return Err(device.describe(reply)),
        Reply::NoResponse => return Err(format!("no_response:{}", device.identity())),
    };

    // units or extra fields may follow the value
    let token = match payload.split_whitespace().next() {
        Some(token) => token,
        None => return Err(format!("empty:{}", device.identity())),
    };

    token
        .parse::<f64>()
        .map_err(|_| format!("value_error:rhs={:?}", payload))
}

/// Parsed result of one polling cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub values: Vec<f64>,
    pub errors: Vec<String>,
}

impl CycleReport {
    pub fn evaluate(registry: &DeviceRegistry, outcome: &PollOutcome) -> Self {
        let replies = match outcome {
            PollOutcome::Replies(replies) if replies.len() >= registry.len() => replies,
            _ => {
                return CycleReport {
                    values: Vec::new(),
                    errors: vec![INSUFFICIENT_READINGS.to_string()],
                }
            }
        };

        let mut values = Vec::with_capacity(registry.len());
        let mut errors = Vec::new();
        for (device, reply) in registry.iter().zip(replies) {
            match parse_reading(device, reply) {
                Ok(value) => values.push(value),
                Err(e) => errors.push(e),
            }
        }

        if !errors.is_empty() {
            values.clear();
        }

        CycleReport { values, errors }
    }

    pub fn has_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn status_line(
        &self,
        registry: &DeviceRegistry,
        elapsed: Duration,
        loop_time: Duration,
    ) -> String {
        let mut line = format!(
            "t={:.1}s | loop={:.3}s",
            elapsed.as_secs_f64(),
            loop_time.as_secs_f64()
        );

        if self.has_error() {
            line.push_str(&format!(" | skipped: {}", self.errors.join("; ")));
            return line;
        }

        for (device, value) in registry.iter().zip(&self.values) {
            line.push_str(&format!(" | {}={}", device.identity(), value));
        }

        line
    }
}

/// Writes one CSV row per polling cycle.
pub struct DataLogger<W: Write> {
    writer: Writer<W>,
}

impl DataLogger<File> {
    pub fn create(
        path: &Path,
        delimiter: u8,
        registry: &DeviceRegistry,
    ) -> Result<Self, DatalogError> {
        let file = File::create(path).map_err(|e| {
            DatalogError::IoError(format!("failed to create {}: {}", path.display(), e))
        })?;

        debug!("Created datalog file {}", path.display());
        Self::from_writer(file, delimiter, registry)
    }
}

impl<W: Write> DataLogger<W> {
    pub fn from_writer(
        writer: W,
        delimiter: u8,
        registry: &DeviceRegistry,
    ) -> Result<Self, DatalogError> {
        let mut writer = WriterBuilder::new().delimiter(delimiter).from_writer(writer);

        let mut header = vec![
            "Time (Y-M-D-H-M-S)".to_string(),
            "Time from Start (Seconds)".to_string(),
            "Loop Time (Seconds)".to_string(),
        ];
        header.extend(registry.iter().map(|device| format!("{} Reading", device.identity())));
        header.push("ErrorFlag".to_string());
        header.push("ErrorDetail".to_string());

        writer.write_record(&header)?;
        writer.flush()?;
        Ok(Self { writer })
    }

    pub fn log_cycle(
        &mut self,
        now: DateTime<Local>,
        elapsed: Duration,
        loop_time: Duration,
        registry: &DeviceRegistry,
        outcome: &PollOutcome,
    ) -> Result<CycleReport, DatalogError> {
        let report = CycleReport::evaluate(registry, outcome);

        let mut row = vec![
            now.format(TIMESTAMP_FORMAT).to_string(),
            format!("{:.3}", elapsed.as_secs_f64()),
            format!("{:.3}", loop_time.as_secs_f64()),
        ];

        if report.has_error() {
            row.extend(registry.iter().map(|_| String::new()));
            row.push("1".to_string());
            row.push(report.errors.join("; "));
        } else {
            row.extend(report.values.iter().map(|value| value.to_string()));
            row.push("0".to_string());
            row.push(String::new());
        }

        self.writer.write_record(&row)?;
        self.writer.flush()?;
        Ok(report)
    }

    pub fn into_inner(self) -> Result<W, DatalogError> {
        self.writer
            .into_inner()
            .map_err(|e| DatalogError::IoError(e.error().to_string()))
    }
}
