//! Base communication implementation for interacting with the Sunrise device
//!
//! Copyright 2019 Ryan Kurte

use core::fmt::Debug;

use embedded_hal::blocking::i2c;

use crate::device::*;

/// Base API for reading and writing device registers
///
/// This should not be required by consumers, but is exposed to support
/// alternate transports and test doubles. Implementations report the number
/// of bytes the bus actually moved so the driver can detect short transfers;
/// a transaction the device does not acknowledge is an `Err`.
pub trait Bus<Err> {
    /// Write payload bytes to a register in a single transaction,
    /// returning the transferred byte count
    fn write_register(&mut self, reg: Register, payload: &[u8]) -> Result<usize, Err>;

    /// Read `buf.len()` bytes from a register using a repeated-start read,
    /// returning the received byte count
    fn read_register(&mut self, reg: Register, buf: &mut [u8]) -> Result<usize, Err>;
}

/// Register bus over an I2C connector
pub struct I2cBus<Conn> {
    conn: Conn,
}

impl<Conn> I2cBus<Conn> {
    pub fn new(conn: Conn) -> Self {
        Self { conn }
    }
}

/// Bus implementation for I2C devices
impl<Conn, Err> Bus<Err> for I2cBus<Conn>
where
    Conn: i2c::Write<Error = Err> + i2c::WriteRead<Error = Err>,
    Err: Debug,
{
    fn write_register(&mut self, reg: Register, payload: &[u8]) -> Result<usize, Err> {
        // Register address and payload must share one transaction.
        // Sized for the largest command the protocol carries.
        let mut buff = [0u8; 1 + CMD_LEN];
        buff[0] = reg as u8;
        buff[1..=payload.len()].copy_from_slice(payload);

        trace!("Writing register: {:?} payload: {:x?}", reg, payload);

        self.conn.write(DEFAULT_ADDRESS, &buff[..=payload.len()])?;

        // Blocking HAL writes are all-or-nothing, an unacknowledged
        // transaction surfaces as Err above
        Ok(payload.len())
    }

    fn read_register(&mut self, reg: Register, buf: &mut [u8]) -> Result<usize, Err> {
        self.conn.write_read(DEFAULT_ADDRESS, &[reg as u8], buf)?;

        trace!("Read register: {:?} data: {:x?}", reg, buf);

        Ok(buf.len())
    }
}
