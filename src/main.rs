//! Sunrise command-line utility
//!
//! Copyright 2019 Ryan Kurte

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;

extern crate linux_embedded_hal;
use linux_embedded_hal::sysfs_gpio::Direction;
use linux_embedded_hal::{Delay, I2cdev, Pin};

extern crate structopt;
use structopt::StructOpt;

extern crate humantime;
use humantime::{Duration as HumanDuration};

#[macro_use] extern crate log;
extern crate simplelog;
use simplelog::{TermLogger, LevelFilter};

extern crate sensor_sunrise;
use sensor_sunrise::{SensorState, Sunrise, POWER_SETTLE_MS};

#[derive(StructOpt)]
#[structopt(name = "sunrise-util")]
/// A Command Line Interface (CLI) for interacting with a local Sunrise CO2 sensor over I2C
pub struct Options {

    /// Specify the i2c interface to use to connect to the sunrise device
    #[structopt(short="d", long = "i2c", default_value = "/dev/i2c-1", env = "SUNRISE_I2C")]
    i2c: String,

    /// Specify the sysfs GPIO driving the sensor enable line
    #[structopt(short = "e", long = "en-pin", default_value = "34", env = "SUNRISE_EN_PIN")]
    en_pin: u64,

    /// Specify period for taking measurements
    #[structopt(short = "p", long = "sample-period", default_value="1m")]
    pub period: HumanDuration,

    /// Disable Automatic Background Calibration (ABC)
    #[structopt(long = "disable-abc")]
    pub disable_abc: bool,

    /// Number of allowed consecutive errors prior to exiting
    #[structopt(long = "allowed-errors", default_value="3")]
    pub allowed_errors: usize,

    /// Enable verbose logging
    #[structopt(long = "log-level", default_value = "info")]
    level: LevelFilter,
}

fn main() {
    // Load options
    let opts = Options::from_args();

    // Setup logging
    TermLogger::init(opts.level, simplelog::Config::default()).unwrap();

    debug!("Connecting to I2C device");
    let i2c = match I2cdev::new(&opts.i2c) {
        Ok(v) => v,
        Err(e) => {
            error!("Error opening I2C device '{}': {:?}", &opts.i2c, e);
            std::process::exit(-1);
        }
    };

    debug!("Claiming enable pin GPIO{}", opts.en_pin);
    let en = Pin::new(opts.en_pin);
    if let Err(e) = en.export() {
        error!("Error exporting GPIO{}: {:?}", opts.en_pin, e);
        std::process::exit(-2);
    }
    if let Err(e) = en.set_direction(Direction::Out) {
        error!("Error configuring GPIO{} as output: {:?}", opts.en_pin, e);
        std::process::exit(-2);
    }

    let mut delay = Delay {};
    let mut state = SensorState::new();
    let mut sensor = Sunrise::new(i2c, en);

    debug!("Bringing up Sunrise sensor");
    if let Err(e) = sensor.init(&mut state, &mut delay) {
        error!("Error initialising sensor: {:?}", e);
        std::process::exit(-3);
    }

    // init arms ABC, rewrite the meter control if it should be off
    if opts.disable_abc {
        info!("Disabling Automatic Background Calibration (ABC)");

        if let Err(e) = sensor.power_on() {
            error!("Error powering sensor: {:?}", e);
            std::process::exit(-4);
        }
        delay.delay_ms(POWER_SETTLE_MS);

        if let Err(e) = sensor.configure(false, &mut delay) {
            error!("Error disabling ABC: {:?}", e);
            std::process::exit(-4);
        }

        if let Err(e) = sensor.read_config(&mut state) {
            error!("Error saving sensor state: {:?}", e);
            std::process::exit(-4);
        }
    }

    info!("Sensor initialised, sampling every {}", opts.period);

    let started = std::time::Instant::now();
    let mut abc_hours = 0;
    let mut errors = 0;

    loop {
        debug!("Starting measurement cycle");

        match sensor.read_co2(&mut state, &mut delay) {
            Ok(m) if m.reliable => {
                info!("CO2: {} ppm (error status: {:#04x})", m.co2_ppm, m.error_status);
                errors = 0;
            },
            Ok(m) => {
                warn!("Discarding unreliable reading: {} ppm", m.co2_ppm);
                errors += 1;
            },
            Err(e) => {
                warn!("Error reading CO2: {:?}", e);
                errors += 1;
            },
        }

        if errors > opts.allowed_errors {
            error!("Exceeded maximum allowed I2C errors");
            std::process::exit(-5);
        }

        // Powered down the sensor cannot count its own ABC exposure time,
        // the host ticks it once per hour of uptime
        while abc_hours < started.elapsed().as_secs() / 3600 {
            state.increment_abc_time();
            abc_hours += 1;
            debug!("Advanced ABC exposure time to {} h", state.abc_time());
        }

        // Wait for enough time for another sensor reading
        std::thread::sleep(*opts.period);
    }
}
