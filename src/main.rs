mod bus;
mod config;
mod datalog;
mod device;
mod poller;
mod registry;


use bus::{i2c_sysfs::SysfsI2cChannel, BusChannel};
use chrono::Local;
use config::{ConfigSectionLogging, Configuration};
use datalog::DataLogger;
use inquire::{InquireError, Text};
use log::{error, info, warn, LevelFilter};
use registry::DeviceRegistry;
use simple_logger::SimpleLogger;
use std::{
    env,
    error::Error,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const CONFIG_PATH: &str = "ezo_config.json";

fn prompt_file_name(logging: &ConfigSectionLogging) -> Result<PathBuf, Box<dyn Error>> {
    let answer = match Text::new("Enter name for datalog file:")
        .with_default(&logging.default_file_name)
        .prompt()
    {
        Ok(answer) => answer,
        Err(InquireError::NotTTY) => {
            warn!("No terminal attached, using default datalog file name");
            logging.default_file_name.clone()
        }
        Err(e) => return Err(e.into()),
    };

    let mut name = answer.trim().to_string();
    if name.is_empty() {
        name = logging.default_file_name.clone();
    }

    if !name.ends_with(".csv") {
        name.push_str(".csv");
    }

    Ok(PathBuf::from(name))
}

fn run_logging_loop<B: BusChannel>(
    bus: &mut B,
    registry: &DeviceRegistry,
    logger: &mut DataLogger<std::fs::File>,
    logging: &ConfigSectionLogging,
    running: &AtomicBool,
) -> Result<(), Box<dyn Error>> {
    let min_cycle = Duration::from_millis(logging.min_cycle_ms);
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        let cycle_start = Instant::now();
        let now = Local::now();

        let outcome = poller::poll_all(bus, registry, &logging.poll_command);

        let loop_time = cycle_start.elapsed();
        let elapsed = started.elapsed();
        let report = logger.log_cycle(now, elapsed, loop_time, registry, &outcome)?;
        if report.has_error() {
            warn!("{}", report.status_line(registry, elapsed, loop_time));
        } else {
            info!("{}", report.status_line(registry, elapsed, loop_time));
        }

        if let Some(remaining) = min_cycle.checked_sub(cycle_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    info!("Data logging stopped by user");
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let config_path = env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = Configuration::load_or_create(Path::new(&config_path))?;
    let timing = config.timing_section.session_timing();
    info!(
        "Waits: long {} ms, short {} ms, glitch correction: {}",
        timing.long_timeout.as_millis(),
        timing.short_timeout.as_millis(),
        timing.correction
    );

    let file_name = prompt_file_name(&config.logging_section)?;

    info!("Opening I2C bus {}", config.bus_section.bus_id);
    let mut bus = match SysfsI2cChannel::open(config.bus_section.bus_id) {
        Ok(bus) => bus,
        Err(e) => {
            error!("Could not open I2C bus {}: {}", config.bus_section.bus_id, e);
            return Err(e.into());
        }
    };
    bus.select(config.bus_section.default_address)?;

    info!("Scanning for devices, this may take a few seconds");
    let registry = registry::scan(&mut bus, timing)?;
    if registry.is_empty() {
        warn!("No I2C devices found, exiting");
        return Ok(());
    }

    for line in registry.summary(None) {
        info!("{}", line);
    }

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = running.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })?;

    let mut logger = DataLogger::create(
        &file_name,
        config.logging_section.delimiter_byte(),
        &registry,
    )?;
    info!("Logging to {}", file_name.display());

    run_logging_loop(
        &mut bus,
        &registry,
        &mut logger,
        &config.logging_section,
        &running,
    )?;

    logger.into_inner()?;
    info!("Closed {}", file_name.display());
    Ok(())
}
