use super::{Buffer, Completion, Direction, Error, Master};
use crate::peripheral::Instance;

/// Blocking I2C master.
///
/// Runs the same state machine as [`Master`], stepping it by polling the
/// peripheral instead of from the interrupt. Keep the TWI interrupt disabled
/// while using this.
pub struct Blocking<T: Instance> {
    twi: T,
    completion: Completion,
}

impl<T: Instance> Blocking<T> {
    pub fn new(twi: T) -> Self {
        Self {
            twi,
            completion: Completion::new(),
        }
    }

    /// Blocking write.
    pub fn write(&mut self, address: u8, write: &[u8]) -> Result<(), Error> {
        self.transfer(address, Direction::Write, Buffer::Tx(write))
    }

    /// Blocking read.
    pub fn read(&mut self, address: u8, read: &mut [u8]) -> Result<(), Error> {
        self.transfer(address, Direction::Read, Buffer::Rx(read))
    }

    /// Addresses the slave without moving any data. `Ok` if it acknowledged.
    pub fn probe(&mut self, address: u8) -> Result<(), Error> {
        self.transfer(address, Direction::Write, Buffer::Empty)
    }

    /// Flushes the peripheral and forces the bus idle.
    pub fn reset(&mut self) {
        Master::new(&mut self.twi, &self.completion).reset();
    }

    /// Release the peripheral.
    pub fn free(self) -> T {
        self.twi
    }

    fn transfer(&mut self, address: u8, direction: Direction, buffer: Buffer<'_>) -> Result<(), Error> {
        let mut master = Master::new(&mut self.twi, &self.completion);
        master.set_buffer(buffer)?;
        master.start_transaction(address, direction);

        nb::block!(master.poll())
    }
}

#[cfg(test)]
mod tests {
    use super::super::mock::{Mock, Op};
    use super::*;
    use crate::peripheral::Flags;

    #[test]
    fn write_then_read() {
        let (mock, bus) = Mock::new();
        bus.receive(&[0x5A, 0xA5]);
        let mut i2c = Blocking::new(mock);

        i2c.write(0x68, &[0x75]).unwrap();
        let mut buf = [0u8; 2];
        i2c.read(0x68, &mut buf).unwrap();

        assert_eq!(buf, [0x5A, 0xA5]);
        assert_eq!(
            bus.ops(),
            [
                Op::Address(0xD0),
                Op::Write(0x75),
                Op::Stop,
                Op::Address(0xD1),
                Op::Read(0x5A),
                Op::ReceiveNext,
                Op::Read(0xA5),
                Op::Stop
            ]
        );
    }

    #[test]
    fn probe_reports_missing_device() {
        let (mock, bus) = Mock::new();
        bus.respond(Flags {
            nack: true,
            ..Flags::NONE
        });
        let mut i2c = Blocking::new(mock);

        assert_eq!(i2c.probe(0x29), Err(Error::Nack));
        assert_eq!(i2c.probe(0x29), Ok(()));
        assert_eq!(bus.ops(), [Op::Address(0x52), Op::Stop, Op::Address(0x52), Op::Stop]);
    }

    #[test]
    fn arbitration_loss_mid_write() {
        let (mock, bus) = Mock::new();
        bus.respond(Flags::NONE);
        bus.respond(Flags {
            arbitration_lost: true,
            ..Flags::NONE
        });
        let mut i2c = Blocking::new(mock);

        assert_eq!(i2c.write(0x50, &[1, 2, 3]), Err(Error::Arbitration));
        assert_eq!(bus.written(), [1]);

        i2c.reset();
        assert_eq!(bus.ops()[bus.ops().len() - 2..], [Op::Flush, Op::BusIdle]);
    }
}
