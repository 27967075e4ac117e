/// Raw byte access to the registers of a parallel port.
///
/// This is the only contract the crate consumes from the platform.  Implement
/// it for whatever provides register access on your target: an `ioperm`/`outb`
/// wrapper, a `/dev/port` handle, an inpout-style binding, or a test double.
///
/// `register` is the absolute port address (e.g. `0x378` for the data register
/// of the first legacy parallel port, `0x379` for its status register).
pub trait PortAccess {
    type Error;

    /// Read the byte currently visible at `register`.
    fn read(&mut self, register: u16) -> Result<u8, Self::Error>;

    /// Write `value` to `register`.
    fn write(&mut self, register: u16, value: u8) -> Result<(), Self::Error>;
}

impl<P: PortAccess> PortAccess for &mut P {
    type Error = P::Error;

    fn read(&mut self, register: u16) -> Result<u8, Self::Error> {
        P::read(self, register)
    }

    fn write(&mut self, register: u16, value: u8) -> Result<(), Self::Error> {
        P::write(self, register, value)
    }
}
