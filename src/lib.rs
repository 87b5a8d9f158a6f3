
//#![no_std]

//! Senseair Sunrise CO2 sensor driver
//!
//! The Sunrise is an NDIR CO2 sensor intended to spend most of its life
//! powered down. Each reading powers the sensor through an enable pin,
//! replays the sensor's own last-reported internal state, runs one
//! measurement cycle and captures the state again before cutting power.
//! See [Sunrise] for the driver object and [SensorState] for the state
//! block contract.

use core::fmt::Debug;
use core::marker::PhantomData;

#[macro_use]
extern crate log;

extern crate embedded_hal;
use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use embedded_hal::digital::v2::OutputPin;

pub mod base;
pub use crate::base::*;

pub mod device;
pub use crate::device::*;

/// Sunrise sensor object
/// This is generic over a register bus, a power-enable pin and the bus error type
pub struct Sunrise<B, En, Err> {
    conn: B,
    en: En,
    _err: PhantomData<Err>,
}

/// Sunrise error object
#[derive(Debug, PartialEq)]
pub enum Error<ConnErr, PinErr> {
    /// Bus transaction failed outright, the device did not respond
    Conn(ConnErr),
    /// The power-enable pin could not be driven
    Pin(PinErr),
    /// The bus moved a different number of bytes than requested
    Length { expected: usize, actual: usize },
}

/// Result of one single-shot measurement cycle
#[derive(PartialEq, Clone, Debug)]
pub struct Measurement {
    /// CO2 concentration in parts-per-million (PPM)
    /// Signed, the filtered output can undershoot zero around calibration events
    pub co2_ppm: i16,
    /// Error-status byte reported alongside the value, not interpreted here
    pub error_status: u8,
    /// False when any transfer in the cycle moved the wrong number of bytes,
    /// in which case the decoded value must not be trusted
    pub reliable: bool,
}

/// Sensor configuration as read back from the device, for diagnostics
#[derive(PartialEq, Clone, Debug)]
pub struct Config {
    /// Measurement mode, 0 continuous or 1 single
    pub measurement_mode: u8,
    /// Measurement period in seconds
    pub measurement_period_s: i16,
    /// Samples taken per measurement
    pub sample_count: i16,
    /// ABC calibration period in hours
    pub abc_period_h: i16,
    /// Meter control flags
    pub meter_control: u8,
}

impl<Conn, En, Err> Sunrise<I2cBus<Conn>, En, Err>
where
    Conn: i2c::Write<Error = Err> + i2c::WriteRead<Error = Err>,
    Err: Debug,
{
    /// Create a new Sunrise driver from an I2C connector and an enable pin
    /// The sensor is left untouched, call [Sunrise::init] before the first measurement
    pub fn new(conn: Conn, en: En) -> Self {
        Self {
            conn: I2cBus::new(conn),
            en,
            _err: PhantomData,
        }
    }
}

impl<B, En, Err, PinErr> Sunrise<B, En, Err>
where
    B: Bus<Err>,
    En: OutputPin<Error = PinErr>,
    Err: Debug,
    PinErr: Debug,
{
    /// Create a driver over a custom [Bus] implementation,
    /// for alternate transports or deterministic test doubles
    pub fn with_bus(conn: B, en: En) -> Self {
        Self {
            conn,
            en,
            _err: PhantomData,
        }
    }

    /// Assert the sensor enable signal
    pub fn power_on(&mut self) -> Result<(), Error<Err, PinErr>> {
        self.en.set_high().map_err(Error::Pin)
    }

    /// Deassert the sensor enable signal
    pub fn power_off(&mut self) -> Result<(), Error<Err, PinErr>> {
        self.en.set_low().map_err(Error::Pin)
    }

    /// One-time sensor bring-up
    ///
    /// Powers the sensor, arms automatic background calibration and selects
    /// single-shot measurement mode, reads the configuration back and captures
    /// the state block, then powers back down. Call once before the first
    /// [Sunrise::read_co2]; the sensor stays powered down between cycles.
    pub fn init(
        &mut self,
        state: &mut SensorState,
        delay: &mut impl DelayMs<u16>,
    ) -> Result<(), Error<Err, PinErr>> {
        debug!("Initialising sensor");

        self.power_on()?;
        delay.delay_ms(POWER_SETTLE_MS);

        self.configure(true, delay)?;
        self.read_config(state)?;

        self.power_off()
    }

    /// Write the calibration mode and select single-shot measurement mode,
    /// then power cycle the sensor so the new configuration latches
    ///
    /// Expects the sensor powered and settled; leaves it powered for a
    /// follow-up [Sunrise::read_config]. On failure the sensor is powered
    /// down before the error is returned.
    pub fn configure(
        &mut self,
        abc: bool,
        delay: &mut impl DelayMs<u16>,
    ) -> Result<(), Error<Err, PinErr>> {
        match self.configure_inner(abc, delay) {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!("Configuration failed: {:?}", e);
                let _ = self.power_off();
                Err(e)
            }
        }
    }

    fn configure_inner(
        &mut self,
        abc: bool,
        delay: &mut impl DelayMs<u16>,
    ) -> Result<(), Error<Err, PinErr>> {
        let meter_control = match abc {
            true => METER_CONTROL_ABC_ENABLED,
            false => METER_CONTROL_ABC_DISABLED,
        };

        debug!("Setting meter control: {:#04x} (abc: {})", meter_control, abc);
        let n = self
            .conn
            .write_register(Register::MeterControl, &[meter_control])
            .map_err(Error::Conn)?;
        Self::expect_len(1, n)?;
        delay.delay_ms(CONFIG_SETTLE_MS);

        debug!("Setting measurement mode: single");
        let n = self
            .conn
            .write_register(Register::MeasurementMode, &[MEASUREMENT_MODE_SINGLE])
            .map_err(Error::Conn)?;
        Self::expect_len(1, n)?;
        delay.delay_ms(CONFIG_SETTLE_MS);

        // Restart the sensor so the new configuration takes effect
        debug!("Restarting sensor to apply configuration");
        self.power_off()?;
        delay.delay_ms(RESTART_SETTLE_MS);
        self.power_on()?;
        delay.delay_ms(RESTART_SETTLE_MS);

        Ok(())
    }

    /// Read back the measurement configuration and capture the sensor state block
    ///
    /// Expects the sensor powered; always powers it down before returning.
    /// A short transfer does not stop the remaining reads, so the state block
    /// stays as fresh as possible, but the first one is returned as
    /// [Error::Length]. The state block is only overwritten by a complete
    /// 24-byte read.
    pub fn read_config(&mut self, state: &mut SensorState) -> Result<Config, Error<Err, PinErr>> {
        match self.read_config_inner(state) {
            Ok(config) => {
                self.power_off()?;
                Ok(config)
            }
            Err(e) => {
                warn!("Configuration readback failed: {:?}", e);
                let _ = self.power_off();
                Err(e)
            }
        }
    }

    fn read_config_inner(
        &mut self,
        state: &mut SensorState,
    ) -> Result<Config, Error<Err, PinErr>> {
        let mut mismatch = Ok(());

        let mut mode = [0u8; CONFIG_LEN];
        let n = self
            .conn
            .read_register(Register::MeasurementMode, &mut mode)
            .map_err(Error::Conn)?;
        mismatch = mismatch.and(Self::expect_len(CONFIG_LEN, n));

        let mut meter = [0u8; 1];
        let n = self
            .conn
            .read_register(Register::MeterControl, &mut meter)
            .map_err(Error::Conn)?;
        mismatch = mismatch.and(Self::expect_len(1, n));

        let mut block = [0u8; STATE_LEN];
        let n = self
            .conn
            .read_register(Register::AbcTime, &mut block)
            .map_err(Error::Conn)?;
        if n == STATE_LEN {
            state.0 = block;
            debug!("Saved sensor state");
        } else {
            mismatch = mismatch.and(Self::expect_len(STATE_LEN, n));
        }

        mismatch?;

        let config = Config {
            measurement_mode: mode[0],
            measurement_period_s: decode_i16(mode[1], mode[2]),
            sample_count: decode_i16(mode[3], mode[4]),
            abc_period_h: decode_i16(mode[5], mode[6]),
            meter_control: meter[0],
        };

        debug!(
            "Read configuration: mode: {} period: {}s samples: {} abc period: {}h meter control: {:#04x}",
            config.measurement_mode,
            config.measurement_period_s,
            config.sample_count,
            config.abc_period_h,
            config.meter_control,
        );

        Ok(config)
    }

    /// Run one single-shot measurement cycle and return the decoded reading
    ///
    /// Powers the sensor, echoes the captured state block back with the
    /// start-measurement opcode, waits out the measurement cycle, then decodes
    /// the result payload and re-captures the state block for the next cycle
    /// before powering down.
    ///
    /// Short transfers are logged and surfaced through [Measurement::reliable]
    /// rather than aborting the cycle; a transaction the device does not
    /// acknowledge aborts with [Error::Conn] once the state refresh has been
    /// attempted and the sensor is powered down.
    pub fn read_co2(
        &mut self,
        state: &mut SensorState,
        delay: &mut impl DelayMs<u16>,
    ) -> Result<Measurement, Error<Err, PinErr>> {
        // Echo the sensor's own last-reported state so its filters and ABC
        // counters carry across the power cycle
        let mut cmd = [0u8; CMD_LEN];
        cmd[0] = START_SINGLE_MEASUREMENT;
        cmd[1..].copy_from_slice(state.as_bytes());

        self.power_on()?;
        delay.delay_ms(MEASURE_SETTLE_MS);

        match self.read_co2_inner(state, delay, &cmd) {
            Ok(m) => {
                self.power_off()?;
                Ok(m)
            }
            Err(e) => {
                warn!("Measurement cycle failed: {:?}", e);
                let _ = self.power_off();
                Err(e)
            }
        }
    }

    fn read_co2_inner(
        &mut self,
        state: &mut SensorState,
        delay: &mut impl DelayMs<u16>,
        cmd: &[u8; CMD_LEN],
    ) -> Result<Measurement, Error<Err, PinErr>> {
        let mut reliable = true;

        let n = self
            .conn
            .write_register(Register::StartMeasurement, cmd)
            .map_err(Error::Conn)?;
        reliable &= Self::transfer_ok(CMD_LEN, n);

        // The result registers are only valid after a full measurement cycle
        delay.delay_ms(MEASUREMENT_WAIT_MS);

        let mut payload = [0u8; RESULT_LEN];
        let payload_res = self
            .conn
            .read_register(Register::ErrorStatus, &mut payload)
            .map_err(Error::Conn);

        // The measurement ran regardless of how the payload read went, so the
        // sensor-side counters have moved on. Capture them before reporting
        // anything or the next command would echo stale state.
        let mut block = [0u8; STATE_LEN];
        let state_res = self
            .conn
            .read_register(Register::AbcTime, &mut block)
            .map_err(Error::Conn);

        match &state_res {
            Ok(n) if *n == STATE_LEN => state.0 = block,
            Ok(n) => reliable &= Self::transfer_ok(STATE_LEN, *n),
            Err(_) => warn!("State refresh failed, calibration block is stale"),
        }

        // First hard failure wins
        let n = payload_res?;
        reliable &= Self::transfer_ok(RESULT_LEN, n);
        state_res?;

        // Payload is the status byte, four reserved bytes, then the value
        let co2_ppm = decode_i16(payload[5], payload[6]);
        if !reliable {
            warn!("Measurement cycle saw transfer errors, value {} ppm untrusted", co2_ppm);
        }

        Ok(Measurement {
            co2_ppm,
            error_status: payload[0],
            reliable,
        })
    }

    /// Log a transfer that moved the wrong number of bytes, returning whether it matched
    fn transfer_ok(expected: usize, actual: usize) -> bool {
        if actual != expected {
            warn!("Transfer length mismatch: expected {} bytes, moved {}", expected, actual);
        }
        actual == expected
    }

    fn expect_len(expected: usize, actual: usize) -> Result<(), Error<Err, PinErr>> {
        match Self::transfer_ok(expected, actual) {
            true => Ok(()),
            false => Err(Error::Length { expected, actual }),
        }
    }
}
