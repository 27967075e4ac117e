//! Bit-banged I2C master over two GPIO lines.
//!
//! The engine shifts every byte out and in by toggling the data and clock
//! lines directly.  It expects open-collector style wiring: a released (high)
//! line can be pulled low by the peer, which is how acknowledge bits and read
//! data come back over the data line.
//!
//! Clock stretching and multi-master arbitration are not supported; addresses
//! are 7-bit.  Every operation is self-contained and expects both lines
//! released at entry, i.e. an idle bus.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::i2c::{self, NoAcknowledgeSource, Operation, SevenBitAddress};

/// Bus transaction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// A line could not be driven or sampled.
    Bus(E),
    /// A byte was not acknowledged by the peer.
    ///
    /// The transaction was aborted and the bus released.  Bytes already
    /// shifted out are not undone, so the peer may have observed a partial
    /// write.
    NoAck(NoAcknowledgeSource),
}

impl<E: core::fmt::Debug> i2c::Error for Error<E> {
    fn kind(&self) -> i2c::ErrorKind {
        match self {
            Error::Bus(_) => i2c::ErrorKind::Bus,
            Error::NoAck(source) => i2c::ErrorKind::NoAcknowledge(*source),
        }
    }
}

impl<E: core::fmt::Debug> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Bus(error) => write!(f, "bus line error: {:?}", error),
            Error::NoAck(source) => write!(f, "byte not acknowledged ({:?})", source),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<E: core::fmt::Debug> std::error::Error for Error<E> {}

/// Zero-cost stand-in for deployments that need no inter-edge settle time.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Bit-banged I2C master engine.
///
/// `SDA` must be readable and writable, `SCL` only writable.  The engine
/// holds no state between operations; it may be dropped and recreated on the
/// same lines at any point where the bus is idle.
pub struct I2cMaster<SDA, SCL, D = NoDelay> {
    sda: SDA,
    scl: SCL,
    delay: D,
    settle_ns: u32,
}

impl<SDA, SCL, E> I2cMaster<SDA, SCL, NoDelay>
where
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    SCL: OutputPin<Error = E>,
{
    /// Create a master that relies on the lines' own write latency for
    /// settling.
    ///
    /// Port register writes are slow enough on real parallel ports that no
    /// extra inter-edge delay is needed; use
    /// [`with_settle_time()`][I2cMaster::with_settle_time] where that does
    /// not hold.
    pub fn new(sda: SDA, scl: SCL) -> Self {
        Self {
            sda,
            scl,
            delay: NoDelay,
            settle_ns: 0,
        }
    }
}

impl<SDA, SCL, D, E> I2cMaster<SDA, SCL, D>
where
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    SCL: OutputPin<Error = E>,
    D: DelayNs,
{
    /// Create a master that waits `settle_ns` after every line transition.
    pub fn with_settle_time(sda: SDA, scl: SCL, delay: D, settle_ns: u32) -> Self {
        Self {
            sda,
            scl,
            delay,
            settle_ns,
        }
    }

    /// Release the underlying lines.
    pub fn free(self) -> (SDA, SCL) {
        (self.sda, self.scl)
    }

    fn settle(&mut self) {
        if self.settle_ns != 0 {
            self.delay.delay_ns(self.settle_ns);
        }
    }

    fn sda_high(&mut self) -> Result<(), Error<E>> {
        self.sda.set_high().map_err(Error::Bus)?;
        self.settle();
        Ok(())
    }

    fn sda_low(&mut self) -> Result<(), Error<E>> {
        self.sda.set_low().map_err(Error::Bus)?;
        self.settle();
        Ok(())
    }

    fn scl_high(&mut self) -> Result<(), Error<E>> {
        self.scl.set_high().map_err(Error::Bus)?;
        self.settle();
        Ok(())
    }

    fn scl_low(&mut self) -> Result<(), Error<E>> {
        self.scl.set_low().map_err(Error::Bus)?;
        self.settle();
        Ok(())
    }

    fn read_sda(&mut self) -> Result<bool, Error<E>> {
        self.sda.is_high().map_err(Error::Bus)
    }

    /// Claim an idle bus with a start condition.
    ///
    /// **This is low-level framing control.**  For whole transactions, use
    /// [`write_frame()`][I2cMaster::write_frame] /
    /// [`read_frame()`][I2cMaster::read_frame] or the
    /// [`embedded_hal::i2c::I2c`] methods.
    pub fn start_condition(&mut self) -> Result<(), Error<E>> {
        self.sda_low()?;
        self.scl_low()
    }

    /// Begin a new frame without releasing the bus in between.
    ///
    /// **This is low-level framing control**, see
    /// [`start_condition()`][I2cMaster::start_condition].
    pub fn repeated_start(&mut self) -> Result<(), Error<E>> {
        self.scl_high()?;
        self.start_condition()
    }

    /// Release the bus back to idle with a stop condition.
    ///
    /// **This is low-level framing control**, see
    /// [`start_condition()`][I2cMaster::start_condition].
    pub fn stop_condition(&mut self) -> Result<(), Error<E>> {
        self.sda_low()?;
        self.scl_high()?;
        self.sda_high()
    }

    /// Shift one byte out MSB-first and sample the peer's acknowledge.
    pub fn write_byte(&mut self, value: u8) -> Result<bool, Error<E>> {
        self.sda_high()?;
        for bit in (0..8).rev() {
            if value & (1 << bit) != 0 {
                self.sda_high()?;
            } else {
                self.sda_low()?;
            }
            self.scl_high()?;
            self.scl_low()?;
        }
        // acknowledge window: release the data line and let the peer pull it
        // low while the clock is high
        self.sda_high()?;
        self.scl_high()?;
        let ack = !self.read_sda()?;
        self.scl_low()?;
        self.sda_high()?;
        Ok(ack)
    }

    /// Shift one byte in MSB-first, then drive the acknowledge.
    ///
    /// `send_ack` decides whether the byte is acknowledged (data line pulled
    /// low during the ack pulse) or answered with a nack (line left
    /// released), which tells the peer this was the last byte wanted.
    pub fn read_byte(&mut self, send_ack: bool) -> Result<u8, Error<E>> {
        let mut value = 0;
        self.sda_high()?;
        for _ in 0..8 {
            self.scl_high()?;
            value = (value << 1) | self.read_sda()? as u8;
            self.scl_low()?;
        }
        if send_ack {
            self.sda_low()?;
        } else {
            self.sda_high()?;
        }
        self.scl_high()?;
        self.scl_low()?;
        self.sda_high()?;
        Ok(value)
    }

    fn write_address(&mut self, address: u8, read: bool) -> Result<bool, Error<E>> {
        self.write_byte((address << 1) | read as u8)
    }

    fn finish_frame(&mut self, hold_bus: bool) -> Result<(), Error<E>> {
        if hold_bus {
            self.repeated_start()
        } else {
            self.stop_condition()
        }
    }

    /// Write `data` to the peer at `address` as one framed transaction.
    ///
    /// An unacknowledged address or data byte aborts the frame: the bus is
    /// released with a stop condition and [`Error::NoAck`] names the
    /// offending byte; no further bytes are sent.  On success, `hold_bus`
    /// decides whether the frame ends in a repeated start (bus stays claimed
    /// for a follow-up frame) or a stop condition.
    ///
    /// An empty `data` transmits the address frame alone, which is a cheap
    /// probe for whether a peer answers at `address`.
    pub fn write_frame(&mut self, address: u8, data: &[u8], hold_bus: bool) -> Result<(), Error<E>> {
        self.start_condition()?;
        if !self.write_address(address, false)? {
            self.stop_condition()?;
            return Err(Error::NoAck(NoAcknowledgeSource::Address));
        }
        for &byte in data {
            if !self.write_byte(byte)? {
                self.stop_condition()?;
                return Err(Error::NoAck(NoAcknowledgeSource::Data));
            }
        }
        self.finish_frame(hold_bus)
    }

    /// Fill `buffer` from the peer at `address` as one framed transaction.
    ///
    /// Every byte except the last is acknowledged; the last is answered with
    /// a nack so the peer stops driving the data line.  An unacknowledged
    /// address aborts with a stop condition and [`Error::NoAck`].
    pub fn read_frame(
        &mut self,
        address: u8,
        buffer: &mut [u8],
        hold_bus: bool,
    ) -> Result<(), Error<E>> {
        self.start_condition()?;
        if !self.write_address(address, true)? {
            self.stop_condition()?;
            return Err(Error::NoAck(NoAcknowledgeSource::Address));
        }
        let last = buffer.len().saturating_sub(1);
        for (i, slot) in buffer.iter_mut().enumerate() {
            *slot = self.read_byte(i != last)?;
        }
        self.finish_frame(hold_bus)
    }
}

impl<SDA, SCL, D, E> i2c::ErrorType for I2cMaster<SDA, SCL, D>
where
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    SCL: OutputPin<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    type Error = Error<E>;
}

impl<SDA, SCL, D, E> i2c::I2c for I2cMaster<SDA, SCL, D>
where
    SDA: OutputPin<Error = E> + InputPin<Error = E>,
    SCL: OutputPin<Error = E>,
    D: DelayNs,
    E: core::fmt::Debug,
{
    /// Each operation is sent as its own addressed frame; all but the last
    /// are chained with repeated starts.
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let last = operations.len().saturating_sub(1);
        for (i, operation) in operations.iter_mut().enumerate() {
            let hold_bus = i != last;
            match operation {
                Operation::Read(buffer) => self.read_frame(address, buffer, hold_bus)?,
                Operation::Write(bytes) => self.write_frame(address, bytes, hold_bus)?,
            }
        }
        Ok(())
    }
}
