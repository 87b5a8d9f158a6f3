//! Sunrise device definitions
//!
//! Copyright 2019 Ryan Kurte

/// Sunrise default I2C address
/// (note this is shifted left 1 bit on the wire)
pub const DEFAULT_ADDRESS: u8 = 0x68;

/// Length of the sensor state block mirrored from registers 0xC4..=0xDB
pub const STATE_LEN: usize = 24;

/// Length of the single-measurement command, opcode plus state block
pub const CMD_LEN: usize = 1 + STATE_LEN;

/// Length of the measurement result payload read from the error-status base
pub const RESULT_LEN: usize = 7;

/// Length of the measurement-mode register block read during configuration readback
pub const CONFIG_LEN: usize = 7;

/// Opcode starting a single measurement when written to [Register::StartMeasurement]
pub const START_SINGLE_MEASUREMENT: u8 = 0x01;

/// Measurement-mode selector for single-shot operation
/// The vendor firmware declares this constant 16 bits wide but its bus API
/// truncates integer writes, so only the low byte ever reached the wire and
/// readback treats the register as one byte. Verify against hardware before
/// ever widening this.
pub const MEASUREMENT_MODE_SINGLE: u8 = 0x01;

/// Meter-control value arming Automatic Background Calibration (all flags clear)
pub const METER_CONTROL_ABC_ENABLED: u8 = 0x00;

/// Meter-control flag disabling Automatic Background Calibration
pub const METER_CONTROL_ABC_DISABLED: u8 = 0x02;

/// Settle delay after asserting the enable signal, milliseconds
pub const POWER_SETTLE_MS: u16 = 35;

/// Settle delay after each configuration register write, milliseconds
pub const CONFIG_SETTLE_MS: u16 = 50;

/// Settle delay either side of the power cycle that latches new configuration, milliseconds
pub const RESTART_SETTLE_MS: u16 = 50;

/// Settle delay between power-on and the measurement command, milliseconds
pub const MEASURE_SETTLE_MS: u16 = 50;

/// Wait for the sensor to complete one internal measurement cycle, milliseconds
/// This dominates the latency of every reading and comes from the sensor
/// datasheet, do not shorten it.
pub const MEASUREMENT_WAIT_MS: u16 = 2000;

/// Sunrise register addresses
#[derive(PartialEq, Clone, Copy, Debug)]
pub enum Register {
    /// Error status base, the 7-byte result payload is read from here
    ErrorStatus = 0x01,

    /// Measurement mode, followed by measurement period, sample count and
    /// ABC period register pairs
    MeasurementMode = 0x95,

    /// Meter control flags (ABC arm/disarm)
    MeterControl = 0xA5,

    /// Single-measurement trigger, takes the start opcode plus the state block
    StartMeasurement = 0xC3,

    /// ABC time counter MSB, first register of the 24-byte state block
    AbcTime = 0xC4,
}

/// Decode a big-endian register pair, sign-extending from the high byte
/// Negative values use the sensor's two's-complement encoding, so
/// `[0xFF, 0x38]` decodes to -200
pub fn decode_i16(hi: u8, lo: u8) -> i16 {
    i16::from_be_bytes([hi, lo])
}

/// Sensor-internal calibration and timing state
///
/// Mirrors the 24-byte register block starting at [Register::AbcTime]. The
/// sensor keeps no power between single measurements, so this block must be
/// captured after every cycle and echoed back verbatim with the next
/// measurement command or the sensor-side calibration resets. The only field
/// the host may touch is the leading ABC time counter, via
/// [SensorState::increment_abc_time].
#[derive(PartialEq, Clone, Debug)]
pub struct SensorState(pub(crate) [u8; STATE_LEN]);

impl SensorState {
    /// Create an empty state block
    /// Must be populated by an `init` or `read_config` before the first measurement
    pub const fn new() -> Self {
        Self([0u8; STATE_LEN])
    }

    /// Raw view of the block
    pub fn as_bytes(&self) -> &[u8; STATE_LEN] {
        &self.0
    }

    /// ABC exposure time in hours, the leading register pair of the block
    pub fn abc_time(&self) -> i16 {
        decode_i16(self.0[0], self.0[1])
    }

    /// Advance the ABC exposure counter by one hour, leaving the rest of the
    /// block untouched. Wraps at the 16-bit boundary. In single-measurement
    /// mode the host owns this clock and is expected to tick it hourly.
    pub fn increment_abc_time(&mut self) {
        let [hi, lo] = self.abc_time().wrapping_add(1).to_be_bytes();
        self.0[0] = hi;
        self.0[1] = lo;
    }
}

impl Default for SensorState {
    fn default() -> Self {
        Self::new()
    }
}

impl From<[u8; STATE_LEN]> for SensorState {
    fn from(block: [u8; STATE_LEN]) -> Self {
        Self(block)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decode_sign_extension() {
        assert_eq!(decode_i16(0xFF, 0x38), -200);
        assert_eq!(decode_i16(0x01, 0x90), 400);
        assert_eq!(decode_i16(0x00, 0x00), 0);
    }

    #[test]
    fn abc_increment_leaves_tail_untouched() {
        let mut block = [0u8; STATE_LEN];
        for (i, b) in block.iter_mut().enumerate() {
            *b = i as u8 + 100;
        }
        block[0] = 0x00;
        block[1] = 0x2A;

        let mut state = SensorState::from(block);
        state.increment_abc_time();

        assert_eq!(state.abc_time(), 0x2B);
        assert_eq!(state.as_bytes()[2..], block[2..]);
    }

    #[test]
    fn abc_increment_wraps_at_16_bits() {
        let mut block = [0u8; STATE_LEN];
        block[0] = 0x7F;
        block[1] = 0xFF;

        let mut state = SensorState::from(block);
        state.increment_abc_time();
        assert_eq!(state.as_bytes()[..2], [0x80, 0x00]);
        assert_eq!(state.abc_time(), i16::MIN);

        let mut state = SensorState::from([0xFF; STATE_LEN]);
        state.increment_abc_time();
        assert_eq!(state.abc_time(), 0);
        assert_eq!(state.as_bytes()[..2], [0x00, 0x00]);
        assert_eq!(state.as_bytes()[2..], [0xFF; STATE_LEN - 2]);
    }
}
