//! Bit-banged I2C master and software PWM over the GPIO lines of a
//! parallel-port register.
//!
//! The platform only has to provide raw register access through the
//! [`PortAccess`] trait; everything above that — bit-level pin handling with
//! polarity support, the I2C protocol engine, the PWM cycle worker — is
//! synthesized from discrete pin writes.  The pins implement the
//! `embedded-hal` digital traits and the bus engine implements
//! [`embedded_hal::i2c::I2c`], so existing device drivers can run on top.
//!
//! ## Example
//!
//! ```no_run
//! use parport_bitbang::{Gpio8, I2cMaster, PortAccess};
//!
//! // Platform register access, e.g. an ioperm/outb wrapper.
//! struct Port;
//!
//! impl PortAccess for Port {
//!     type Error = std::io::Error;
//!
//!     fn read(&mut self, register: u16) -> Result<u8, Self::Error> {
//!         todo!()
//!     }
//!
//!     fn write(&mut self, register: u16, value: u8) -> Result<(), Self::Error> {
//!         todo!()
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut gpio = Gpio8::new(Port, 0x378);
//! let pins = gpio.split();
//!
//! let mut i2c = I2cMaster::new(pins.p0, pins.p1);
//! i2c.write_frame(0x3c, &[0x00, 0xaf], false)?;
//! # Ok(())
//! # }
//! ```
//!
//! With the `std` feature (default), lines from
//! [`Gpio8::new_shared`]/`split_shared()` can drive a
//! [`PwmChannel`][pwm::PwmChannel] cycle worker on a background thread while
//! sibling lines of the same register stay usable from other threads.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod common;
pub mod gpio;
pub mod i2c;
mod mutex;
mod pin;
mod port;
#[cfg(any(test, feature = "std"))]
pub mod pwm;

pub use common::mode;
pub use common::PortDriver;
pub use common::PortDriverPolarity;
pub use gpio::Gpio8;
pub use i2c::{I2cMaster, NoDelay};
pub use mutex::PortMutex;
pub use pin::{Pin, PinError};
pub use port::PortAccess;
#[cfg(any(test, feature = "std"))]
pub use pwm::{PwmChannel, PwmCycle, WaitStrategy};
