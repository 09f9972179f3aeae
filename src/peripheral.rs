//! Capability set of a TWI master peripheral.
//!
//! The state machine in [`crate::i2c`] never touches registers directly. Each
//! handler performs exactly one of these accesses, and on real hardware that
//! access is also what clears the status flag which raised the interrupt. An
//! implementation for another controller must keep that coupling.

/// Error latches read from the master status register.
#[derive(Default, Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Flags {
    /// The slave did not acknowledge the last address or data byte.
    pub nack: bool,
    /// Another master won arbitration.
    pub arbitration_lost: bool,
    /// Illegal start/stop sequence seen on the bus.
    pub bus_error: bool,
}

impl Flags {
    pub const NONE: Flags = Flags {
        nack: false,
        arbitration_lost: false,
        bus_error: false,
    };

    pub const fn any(&self) -> bool {
        self.nack || self.arbitration_lost || self.bus_error
    }
}

/// TWI master peripheral.
pub trait Instance {
    /// Writes the address + R/W byte. Issues a start condition, or a repeated
    /// start if the bus is already owned.
    ///
    /// Clears the arbitration-lost and bus-error latches along with the
    /// read/write completion flags.
    fn write_address(&mut self, byte: u8);

    /// Writes one data byte and releases the clock.
    ///
    /// Clears the read/write completion flags. Arbitration-lost and bus-error
    /// stay latched.
    fn write_data(&mut self, byte: u8);

    /// Reads the last received data byte.
    ///
    /// Clears the read/write completion flags.
    fn read_data(&mut self) -> u8;

    /// Acknowledges the byte just read and clocks in the next one.
    fn receive_next(&mut self);

    /// Sends NACK (after a read) followed by a stop condition.
    fn stop(&mut self);

    /// Current error latches.
    fn flags(&self) -> Flags;

    /// A read/write completion is waiting for software, or the clock is held.
    fn event_pending(&self) -> bool;

    /// Flushes the internal state of the master.
    fn flush(&mut self);

    /// Forces the bus state machine to idle.
    fn force_bus_idle(&mut self);
}

impl<T: Instance + ?Sized> Instance for &mut T {
    #[inline]
    fn write_address(&mut self, byte: u8) {
        T::write_address(self, byte)
    }

    #[inline]
    fn write_data(&mut self, byte: u8) {
        T::write_data(self, byte)
    }

    #[inline]
    fn read_data(&mut self) -> u8 {
        T::read_data(self)
    }

    #[inline]
    fn receive_next(&mut self) {
        T::receive_next(self)
    }

    #[inline]
    fn stop(&mut self) {
        T::stop(self)
    }

    #[inline]
    fn flags(&self) -> Flags {
        T::flags(self)
    }

    #[inline]
    fn event_pending(&self) -> bool {
        T::event_pending(self)
    }

    #[inline]
    fn flush(&mut self) {
        T::flush(self)
    }

    #[inline]
    fn force_bus_idle(&mut self) {
        T::force_bus_idle(self)
    }
}
