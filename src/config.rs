use crate::bus::{i2c_sysfs::DEFAULT_BUS, MAX_ADDRESS};
use crate::device::{
    CommandTimeout, GlitchCorrection, SessionTiming, DEFAULT_ADDRESS, DEFAULT_READ_SIZE,
    LONG_TIMEOUT, SHORT_TIMEOUT,
};
use crate::poller::DEFAULT_POLL_COMMAND;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;

// csv quotes fields with this, so it can't also separate them
const CSV_QUOTE: char = '"';

#[derive(Debug, PartialEq)]
pub enum ConfigError {
    SerializeError(String),
    InvalidEntry(String),
    IoError(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&match self {
            ConfigError::SerializeError(msg) => format!("serialize/parse error: {}", msg),
            ConfigError::InvalidEntry(msg) => format!("invalid config entry: {}", msg),
            ConfigError::IoError(msg) => format!("config file error: {}", msg),
        })
    }
}

impl std::error::Error for ConfigError {}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ConfigSectionBus {
    pub bus_id: u8,
    pub default_address: u8,
}

impl Default for ConfigSectionBus {
    fn default() -> Self {
        Self {
            bus_id: DEFAULT_BUS,
            default_address: DEFAULT_ADDRESS,
        }
    }
}

impl ConfigSectionBus {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_address > MAX_ADDRESS {
            return Err(ConfigError::InvalidEntry(format!(
                "default address {} is outside of the 7-bit address range (0-{})",
                self.default_address, MAX_ADDRESS
            )));
        }

        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ConfigSectionTiming {
    pub long_timeout_ms: u64,
    pub short_timeout_ms: u64,
    pub read_size: usize,
    pub glitch_correction: GlitchCorrection,
}

impl Default for ConfigSectionTiming {
    fn default() -> Self {
        Self {
            long_timeout_ms: LONG_TIMEOUT.as_millis() as u64,
            short_timeout_ms: SHORT_TIMEOUT.as_millis() as u64,
            read_size: DEFAULT_READ_SIZE,
            glitch_correction: GlitchCorrection::default(),
        }
    }
}

impl ConfigSectionTiming {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.read_size == 0 {
            return Err(ConfigError::InvalidEntry(
                "read size must be at least 1 byte (the status byte)".to_string(),
            ));
        }

        if self.long_timeout_ms < self.short_timeout_ms {
            return Err(ConfigError::InvalidEntry(format!(
                "long timeout ({} ms) is shorter than the short timeout ({} ms)",
                self.long_timeout_ms, self.short_timeout_ms
            )));
        }

        Ok(())
    }

    pub fn session_timing(&self) -> SessionTiming {
        SessionTiming {
            long_timeout: Duration::from_millis(self.long_timeout_ms),
            short_timeout: Duration::from_millis(self.short_timeout_ms),
            read_size: self.read_size,
            correction: self.glitch_correction,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct ConfigSectionLogging {
    pub default_file_name: String,
    pub delimiter: char,
    pub poll_command: String,
    pub min_cycle_ms: u64,
}

impl Default for ConfigSectionLogging {
    fn default() -> Self {
        Self {
            default_file_name: "datalog".to_string(),
            delimiter: ';',
            poll_command: DEFAULT_POLL_COMMAND.to_string(),
            min_cycle_ms: 0,
        }
    }
}

impl ConfigSectionLogging {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_file_name.trim().is_empty() {
            return Err(ConfigError::InvalidEntry(
                "default datalog file name cannot be empty".to_string(),
            ));
        }

        if !self.delimiter.is_ascii()
            || self.delimiter.is_ascii_alphanumeric()
            || self.delimiter == CSV_QUOTE
        {
            return Err(ConfigError::InvalidEntry(format!(
                "invalid CSV delimiter {:?}, use ASCII punctuation (except '\"') or whitespace",
                self.delimiter
            )));
        }

        if self.poll_command.trim().is_empty() {
            return Err(ConfigError::InvalidEntry(
                "poll command cannot be empty".to_string(),
            ));
        }

        if CommandTimeout::classify(&self.poll_command) == CommandTimeout::NoWait {
            return Err(ConfigError::InvalidEntry(format!(
                "poll command \"{}\" puts the devices to sleep and never returns a reading",
                self.poll_command
            )));
        }

        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        // validated as ASCII
        self.delimiter as u8
    }
}

#[derive(Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Configuration {
    pub bus_section: ConfigSectionBus,
    pub timing_section: ConfigSectionTiming,
    pub logging_section: ConfigSectionLogging,
}

impl Configuration {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bus_section.validate()?;
        self.timing_section.validate()?;
        self.logging_section.validate()?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Configuration, ConfigError> {
        let config: Configuration = match serde_json::from_reader(reader) {
            Ok(c) => c,
            Err(e) => {
                return Err(ConfigError::SerializeError(format!(
                    "failed to deserialize config file: {}",
                    e
                )));
            }
        };

        config.validate()?;
        Ok(config)
    }

    #[cfg(test)]
    pub fn from_str(json_str: &str) -> Result<Configuration, ConfigError> {
        Self::from_reader(json_str.as_bytes())
    }

    pub fn to_writer<W: Write>(&self, writer: W, pretty: bool) -> Result<(), ConfigError> {
        let result = if pretty {
            serde_json::to_writer_pretty(writer, self)
        } else {
            serde_json::to_writer(writer, self)
        };

        result
            .map_err(|e| ConfigError::SerializeError(format!("failed to serialize config: {}", e)))
    }

    #[cfg(test)]
    pub fn to_str(&self, pretty: bool) -> Result<String, ConfigError> {
        let result = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };

        result
            .map_err(|e| ConfigError::SerializeError(format!("failed to serialize config: {}", e)))
    }

    /// Loads the config at `path`, writing out the defaults first if the
    /// file doesn't exist yet.
    pub fn load_or_create(path: &Path) -> Result<Configuration, ConfigError> {
        if !path.exists() {
            warn!(
                "Config file {} does not exist, writing default configuration",
                path.display()
            );

            let config = Configuration::default();
            let file = File::create(path).map_err(|e| {
                ConfigError::IoError(format!("failed to create {}: {}", path.display(), e))
            })?;
            config.to_writer(file, true)?;
            return Ok(config);
        }

        let file = File::open(path).map_err(|e| {
            ConfigError::IoError(format!("failed to open {}: {}", path.display(), e))
        })?;

        let config = Self::from_reader(file)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
