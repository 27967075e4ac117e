use core::marker::PhantomData;
use core::ops::Deref;
use embedded_hal::digital as hal_digital;

/// Representation of a single parallel-port line.
///
/// `Pin` is not constructed directly, this type is created by instanciating a
/// register device (see [`Gpio8`][crate::Gpio8]) and then getting access to
/// all its lines using the `.split()` method.
///
/// The `HANDLE` parameter is how the pin reaches the shared, mutex-guarded
/// port driver: a plain borrow for pins from `.split()`, an `Arc` for pins
/// from `.split_shared()` which need to move into another thread.
pub struct Pin<MODE, HANDLE> {
    pin_mask: u8,
    port_driver: HANDLE,
    _m: PhantomData<MODE>,
}

impl<MODE, HANDLE, MUTEX, PD> Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
{
    pub(crate) fn new(pin_number: u8, port_driver: HANDLE) -> Self {
        assert!(pin_number < 8);
        Self {
            pin_mask: 1 << pin_number,
            port_driver,
            _m: PhantomData,
        }
    }
}

impl<MODE, HANDLE, MUTEX, PD> Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver + crate::PortDriverPolarity,
{
    /// Treat this line as active-low from now on.
    ///
    /// All logical reads and writes through this pin are then inverted before
    /// they touch the register, which matches the hardware-inverted lines of
    /// a legacy parallel port (e.g. `BUSY` and most control-register bits).
    pub fn set_polarity(&mut self, inverted: bool) -> Result<(), PD::Error> {
        self.port_driver
            .lock(|drv| drv.set_polarity(self.pin_mask, inverted))
    }
}

impl<HANDLE, MUTEX, PD> Pin<crate::mode::QuasiBidirectional, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
{
    /// Drop the output capability of this pin.
    ///
    /// Useful for lines of an input-only register (e.g. the status register),
    /// and to make a pin unusable as a PWM or clock line at the type level.
    pub fn into_input(self) -> Pin<crate::mode::Input, HANDLE> {
        Pin {
            pin_mask: self.pin_mask,
            port_driver: self.port_driver,
            _m: PhantomData,
        }
    }
}

impl<MODE: crate::mode::HasInput, HANDLE, MUTEX, PD> Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
{
    /// Read the logical level of the line.
    pub fn is_high(&mut self) -> Result<bool, PD::Error> {
        self.port_driver
            .lock(|drv| drv.get(self.pin_mask, 0).map(|v| v != 0))
    }

    /// Read the logical level of the line, inverted.
    pub fn is_low(&mut self) -> Result<bool, PD::Error> {
        self.port_driver
            .lock(|drv| drv.get(0, self.pin_mask).map(|v| v != 0))
    }
}

impl<MODE: crate::mode::HasOutput, HANDLE, MUTEX, PD> Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
{
    pub fn set_high(&mut self) -> Result<(), PD::Error> {
        self.port_driver.lock(|drv| drv.set(self.pin_mask, 0))
    }

    pub fn set_low(&mut self) -> Result<(), PD::Error> {
        self.port_driver.lock(|drv| drv.set(0, self.pin_mask))
    }

    pub fn is_set_high(&mut self) -> Result<bool, PD::Error> {
        self.port_driver
            .lock(|drv| drv.is_set(self.pin_mask, 0).map(|v| v != 0))
    }

    pub fn is_set_low(&mut self) -> Result<bool, PD::Error> {
        self.port_driver
            .lock(|drv| drv.is_set(0, self.pin_mask).map(|v| v != 0))
    }

    pub fn toggle(&mut self) -> Result<(), PD::Error> {
        self.port_driver.lock(|drv| drv.toggle(self.pin_mask))
    }
}

/// Error wrapper which gives driver errors an
/// [`embedded_hal::digital::Error`] identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinError<PDE> {
    driver_error: PDE,
}

impl<PDE> PinError<PDE> {
    /// The underlying port-driver error.
    pub fn driver_error(&self) -> &PDE {
        &self.driver_error
    }

    pub fn into_inner(self) -> PDE {
        self.driver_error
    }
}

impl<PDE: core::fmt::Debug> hal_digital::Error for PinError<PDE> {
    fn kind(&self) -> hal_digital::ErrorKind {
        hal_digital::ErrorKind::Other
    }
}

impl<PDE> From<PDE> for PinError<PDE> {
    fn from(driver_error: PDE) -> Self {
        Self { driver_error }
    }
}

impl<MODE, HANDLE, MUTEX, PD> hal_digital::ErrorType for Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
    PD::Error: core::fmt::Debug,
{
    type Error = PinError<PD::Error>;
}

impl<MODE: crate::mode::HasInput, HANDLE, MUTEX, PD> hal_digital::InputPin for Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
    PD::Error: core::fmt::Debug,
{
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Pin::is_high(self).map_err(PinError::from)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Pin::is_low(self).map_err(PinError::from)
    }
}

impl<MODE: crate::mode::HasOutput, HANDLE, MUTEX, PD> hal_digital::OutputPin for Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
    PD::Error: core::fmt::Debug,
{
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Pin::set_low(self).map_err(PinError::from)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Pin::set_high(self).map_err(PinError::from)
    }
}

impl<MODE: crate::mode::HasOutput, HANDLE, MUTEX, PD> hal_digital::StatefulOutputPin
    for Pin<MODE, HANDLE>
where
    HANDLE: Deref<Target = MUTEX>,
    MUTEX: crate::PortMutex<Port = PD>,
    PD: crate::PortDriver,
    PD::Error: core::fmt::Debug,
{
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Pin::is_set_high(self).map_err(PinError::from)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Pin::is_set_low(self).map_err(PinError::from)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        Pin::toggle(self).map_err(PinError::from)
    }
}
