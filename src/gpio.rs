//! One 8-bit parallel-port register exposed as GPIO lines.

use core::cell::RefCell;

use crate::PortAccess;

/// An 8-bit register of a parallel port, split into eight GPIO lines.
///
/// The driver latches the output byte, so setting or clearing a single bit is
/// one plain register write and never a read-modify-write against hardware
/// state that other lines may be changing concurrently.  All pins of one
/// `Gpio8` go through the same [`PortMutex`][crate::PortMutex].
///
/// The register is assumed to start out with all lines released (high), which
/// is the idle state the bit-banged bus protocols on top expect.
pub struct Gpio8<M>(M);

impl<P> Gpio8<RefCell<Driver<P>>>
where
    P: PortAccess,
{
    /// Create a new register device for use within a single execution context.
    pub fn new(port: P, register: u16) -> Self {
        Self::with_mutex(port, register)
    }
}

#[cfg(any(test, feature = "std"))]
impl<P> Gpio8<std::sync::Arc<std::sync::Mutex<Driver<P>>>>
where
    P: PortAccess,
{
    /// Create a new register device guarded by a reference-counted mutex.
    ///
    /// Pins from [`split_shared()`][Gpio8::split_shared] own a handle to the
    /// driver and can be moved across threads, e.g. into a PWM cycle worker,
    /// while sibling lines of the same register stay usable elsewhere.
    pub fn new_shared(port: P, register: u16) -> Self {
        Self::with_mutex(port, register)
    }
}

impl<P, M> Gpio8<M>
where
    P: PortAccess,
    M: crate::PortMutex<Port = Driver<P>>,
{
    /// Create the device with a specific mutex type guarding register access.
    pub fn with_mutex(port: P, register: u16) -> Self {
        Self(crate::PortMutex::create(Driver::new(port, register)))
    }

    pub fn split(&mut self) -> Parts<'_, P, M> {
        Parts {
            p0: crate::Pin::new(0, &self.0),
            p1: crate::Pin::new(1, &self.0),
            p2: crate::Pin::new(2, &self.0),
            p3: crate::Pin::new(3, &self.0),
            p4: crate::Pin::new(4, &self.0),
            p5: crate::Pin::new(5, &self.0),
            p6: crate::Pin::new(6, &self.0),
            p7: crate::Pin::new(7, &self.0),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl<P, M> Gpio8<std::sync::Arc<M>>
where
    P: PortAccess,
    M: crate::PortMutex<Port = Driver<P>>,
{
    pub fn split_shared(&self) -> SharedParts<P, M> {
        SharedParts {
            p0: crate::Pin::new(0, self.0.clone()),
            p1: crate::Pin::new(1, self.0.clone()),
            p2: crate::Pin::new(2, self.0.clone()),
            p3: crate::Pin::new(3, self.0.clone()),
            p4: crate::Pin::new(4, self.0.clone()),
            p5: crate::Pin::new(5, self.0.clone()),
            p6: crate::Pin::new(6, self.0.clone()),
            p7: crate::Pin::new(7, self.0.clone()),
        }
    }
}

pub struct Parts<'a, P, M = RefCell<Driver<P>>>
where
    P: PortAccess,
    M: crate::PortMutex<Port = Driver<P>>,
{
    pub p0: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p1: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p2: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p3: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p4: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p5: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p6: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
    pub p7: crate::Pin<crate::mode::QuasiBidirectional, &'a M>,
}

#[cfg(any(test, feature = "std"))]
pub struct SharedParts<P, M = std::sync::Mutex<Driver<P>>>
where
    P: PortAccess,
    M: crate::PortMutex<Port = Driver<P>>,
{
    pub p0: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p1: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p2: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p3: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p4: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p5: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p6: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
    pub p7: crate::Pin<crate::mode::QuasiBidirectional, std::sync::Arc<M>>,
}

pub struct Driver<P> {
    port: P,
    register: u16,
    out: u8,
    polarity: u8,
}

impl<P> Driver<P> {
    pub fn new(port: P, register: u16) -> Self {
        Self {
            port,
            register,
            out: 0xff,
            polarity: 0x00,
        }
    }
}

impl<P: PortAccess> crate::PortDriver for Driver<P> {
    type Error = P::Error;

    fn set(&mut self, mask_high: u8, mask_low: u8) -> Result<(), Self::Error> {
        let phys_high = (mask_high & !self.polarity) | (mask_low & self.polarity);
        let phys_low = (mask_low & !self.polarity) | (mask_high & self.polarity);
        self.out = (self.out | phys_high) & !phys_low;
        self.port.write(self.register, self.out)
    }

    fn is_set(&mut self, mask_high: u8, mask_low: u8) -> Result<u8, Self::Error> {
        let latched = self.out ^ self.polarity;
        Ok((latched & mask_high) | (!latched & mask_low))
    }

    fn get(&mut self, mask_high: u8, mask_low: u8) -> Result<u8, Self::Error> {
        let level = self.port.read(self.register)? ^ self.polarity;
        Ok((level & mask_high) | (!level & mask_low))
    }
}

impl<P: PortAccess> crate::PortDriverPolarity for Driver<P> {
    fn set_polarity(&mut self, mask: u8, inverted: bool) -> Result<(), Self::Error> {
        if inverted {
            self.polarity |= mask;
        } else {
            self.polarity &= !mask;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    const REGISTER: u16 = 0x378;

    #[derive(Default)]
    struct PortState {
        written: Vec<u8>,
        input: u8,
    }

    #[derive(Clone, Default)]
    struct MockPort(Arc<Mutex<PortState>>);

    impl crate::PortAccess for MockPort {
        type Error = Infallible;

        fn read(&mut self, register: u16) -> Result<u8, Self::Error> {
            assert_eq!(register, REGISTER);
            Ok(self.0.lock().unwrap().input)
        }

        fn write(&mut self, register: u16, value: u8) -> Result<(), Self::Error> {
            assert_eq!(register, REGISTER);
            self.0.lock().unwrap().written.push(value);
            Ok(())
        }
    }

    #[test]
    fn bit_level_writes() {
        let port = MockPort::default();
        let mut gpio = super::Gpio8::new(port.clone(), REGISTER);
        let mut pins = gpio.split();

        pins.p0.set_low().unwrap();
        pins.p1.set_low().unwrap();
        pins.p0.set_high().unwrap();
        pins.p2.toggle().unwrap();
        pins.p2.toggle().unwrap();

        assert!(pins.p0.is_set_high().unwrap());
        assert!(pins.p1.is_set_low().unwrap());

        let state = port.0.lock().unwrap();
        assert_eq!(state.written, vec![0xfe, 0xfc, 0xfd, 0xf9, 0xfd]);
    }

    #[test]
    fn input_reads() {
        let port = MockPort::default();
        let mut gpio = super::Gpio8::new(port.clone(), REGISTER);
        let mut pins = gpio.split();

        port.0.lock().unwrap().input = 0b0100_0000;
        assert!(pins.p6.is_high().unwrap());
        assert!(pins.p0.is_low().unwrap());

        port.0.lock().unwrap().input = 0x00;
        assert!(pins.p6.is_low().unwrap());
    }

    #[test]
    fn inverted_line() {
        let port = MockPort::default();
        let mut gpio = super::Gpio8::new(port.clone(), REGISTER);
        let mut pins = gpio.split();

        pins.p3.set_polarity(true).unwrap();
        pins.p3.set_high().unwrap();
        assert_eq!(port.0.lock().unwrap().written, vec![0xf7]);
        assert!(pins.p3.is_set_high().unwrap());

        port.0.lock().unwrap().input = 0x00;
        assert!(pins.p3.is_high().unwrap());

        pins.p3.set_low().unwrap();
        assert_eq!(port.0.lock().unwrap().written, vec![0xf7, 0xff]);
    }

    #[test]
    fn input_only_conversion() {
        let port = MockPort::default();
        let mut gpio = super::Gpio8::new(port.clone(), REGISTER);
        let pins = gpio.split();

        port.0.lock().unwrap().input = 0x01;
        let mut busy = pins.p0.into_input();
        assert!(busy.is_high().unwrap());
    }

    #[test]
    fn shared_parts_keep_sibling_bits_intact() {
        let port = MockPort::default();
        let gpio = super::Gpio8::new_shared(port.clone(), REGISTER);
        let pins = gpio.split_shared();

        let mut p0 = pins.p0;
        let mut p1 = pins.p1;
        let a = std::thread::spawn(move || {
            for _ in 0..50 {
                p0.set_low().unwrap();
                p0.set_high().unwrap();
            }
            p0.set_low().unwrap();
        });
        let b = std::thread::spawn(move || {
            for _ in 0..50 {
                p1.set_low().unwrap();
                p1.set_high().unwrap();
            }
            p1.set_low().unwrap();
        });
        a.join().unwrap();
        b.join().unwrap();

        let state = port.0.lock().unwrap();
        // bits 2..7 must never have been touched by either thread
        assert!(state.written.iter().all(|byte| byte & 0xfc == 0xfc));
        assert_eq!(state.written.last().unwrap() & 0x03, 0x00);
    }
}
