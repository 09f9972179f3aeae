//! Inter-Integrated-Circuit (I2C) master state machine
//!
//! One [`Master`] drives one TWI master peripheral through a single transaction
//! at a time. [`Master::start_transaction`] issues the address phase; every
//! peripheral interrupt then calls [`Master::on_interrupt`], which advances the
//! state machine by exactly one step until it is back in [`State::Idle`].
//!
//! After the last byte of a read the peripheral holds the clock and raises no
//! further interrupt, so the closing stop is stepped by [`Master::poll`] (or
//! [`SharedMaster::poll`]).
//!
//! ```ignore
//! static DONE: Completion = Completion::new();
//! static TWIM: SharedMaster<'static, Twi> = SharedMaster::new();
//!
//! #[avr_device::interrupt(atmega4809)]
//! fn TWI0_TWIM() {
//!     TWIM.on_interrupt();
//! }
//!
//! let dp = avr_device::atmega4809::Peripherals::take().unwrap();
//! let twi = Twi::new(dp.TWI0, Hertz::hz(3_333_333), twi::Config::default());
//! TWIM.install(Master::new(twi, &DONE)).ok();
//!
//! TWIM.with(|m| {
//!     m.set_buffer(&PAYLOAD[..]).unwrap();
//!     m.start_transaction(0x50, Direction::Write);
//! });
//! DONE.wait().await?;
//!
//! TWIM.with(|m| {
//!     m.set_buffer(unsafe { &mut RX[..] }).unwrap();
//!     m.start_transaction(0x50, Direction::Read);
//! });
//! nb::block!(TWIM.poll())?;
//! ```

mod blocking;
mod completion;
mod shared;

#[cfg(test)]
mod mock;

pub use blocking::Blocking;
pub use completion::Completion;
pub use shared::SharedMaster;

use crate::peripheral::Instance;

/// I2C error.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// ACK not received (either to the address or to a data byte)
    Nack,
    /// Arbitration lost
    Arbitration,
    /// Bus error
    Bus,
    /// Transaction was cut short by [`Master::reset`].
    Aborted,
    /// A transaction is still in flight.
    Busy,
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match *self {
            Self::Bus => embedded_hal::i2c::ErrorKind::Bus,
            Self::Arbitration => embedded_hal::i2c::ErrorKind::ArbitrationLoss,
            Self::Nack => embedded_hal::i2c::ErrorKind::NoAcknowledge(embedded_hal::i2c::NoAcknowledgeSource::Unknown),
            Self::Aborted => embedded_hal::i2c::ErrorKind::Other,
            Self::Busy => embedded_hal::i2c::ErrorKind::Other,
        }
    }
}

/// How the last transaction ended.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Outcome {
    /// Every byte was transferred and the bus was released.
    Complete,
    Nack,
    ArbitrationLost,
    BusError,
    /// Reset while in flight.
    Aborted,
}

impl Outcome {
    /// Outcome of a transaction whose final handler ran in `state`.
    fn after(state: State) -> Option<Self> {
        match state {
            State::Stop => Some(Self::Complete),
            State::NackReceived => Some(Self::Nack),
            State::ArbitrationLost => Some(Self::ArbitrationLost),
            State::BusError => Some(Self::BusError),
            State::Reset => Some(Self::Aborted),
            State::Idle | State::Start | State::TransmitByte | State::ReceiveByte => None,
        }
    }

    pub fn result(self) -> Result<(), Error> {
        match self {
            Self::Complete => Ok(()),
            Self::Nack => Err(Error::Nack),
            Self::ArbitrationLost => Err(Error::Arbitration),
            Self::BusError => Err(Error::Bus),
            Self::Aborted => Err(Error::Aborted),
        }
    }
}

/// Data direction, used as the R/W bit of the address byte.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Write = 0,
    Read = 1,
}

/// State machine states.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    Idle,
    Start,
    Stop,
    Reset,
    TransmitByte,
    ReceiveByte,
    NackReceived,
    ArbitrationLost,
    BusError,
}

/// A state change, reported to the observer installed with [`Master::set_observer`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Transition {
    pub from: State,
    pub to: State,
}

/// Caller-owned bytes of a transaction.
///
/// A read-only buffer can only be written out; reading into it transfers no data.
#[derive(Debug, Default)]
pub enum Buffer<'d> {
    #[default]
    Empty,
    Tx(&'d [u8]),
    Rx(&'d mut [u8]),
}

impl<'d> Buffer<'d> {
    pub fn len(&self) -> usize {
        match self {
            Self::Empty => 0,
            Self::Tx(bytes) => bytes.len(),
            Self::Rx(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes a transfer in `direction` can move.
    fn capacity(&self, direction: Direction) -> usize {
        match (self, direction) {
            (Self::Rx(bytes), _) => bytes.len(),
            (Self::Tx(bytes), Direction::Write) => bytes.len(),
            (Self::Tx(_), Direction::Read) | (Self::Empty, _) => 0,
        }
    }

    fn get(&self, index: usize) -> Option<u8> {
        match self {
            Self::Empty => None,
            Self::Tx(bytes) => bytes.get(index).copied(),
            Self::Rx(bytes) => bytes.get(index).copied(),
        }
    }

    fn set(&mut self, index: usize, byte: u8) {
        if let Self::Rx(bytes) = self {
            if let Some(slot) = bytes.get_mut(index) {
                *slot = byte;
            }
        }
    }
}

impl<'d> From<&'d [u8]> for Buffer<'d> {
    fn from(bytes: &'d [u8]) -> Self {
        Self::Tx(bytes)
    }
}

impl<'d> From<&'d mut [u8]> for Buffer<'d> {
    fn from(bytes: &'d mut [u8]) -> Self {
        Self::Rx(bytes)
    }
}

impl<'d, const N: usize> From<&'d [u8; N]> for Buffer<'d> {
    fn from(bytes: &'d [u8; N]) -> Self {
        Self::Tx(bytes)
    }
}

impl<'d, const N: usize> From<&'d mut [u8; N]> for Buffer<'d> {
    fn from(bytes: &'d mut [u8; N]) -> Self {
        Self::Rx(bytes)
    }
}

/// I2C master driver.
pub struct Master<'d, T: Instance> {
    twi: T,
    completion: &'d Completion,
    /// `address << 1 | R/W`
    address: u8,
    buffer: Buffer<'d>,
    cursor: usize,
    state: State,
    observer: Option<fn(Transition)>,
}

impl<'d, T: Instance> Master<'d, T> {
    /// Create a new idle master. The peripheral must already be initialized.
    pub fn new(twi: T, completion: &'d Completion) -> Self {
        Self {
            twi,
            completion,
            address: 0,
            buffer: Buffer::Empty,
            cursor: 0,
            state: State::Idle,
            observer: None,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Bytes transferred so far in the current (or last) transaction.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// The address + R/W byte of the current (or last) transaction.
    pub fn address_byte(&self) -> u8 {
        self.address
    }

    pub fn completion(&self) -> &'d Completion {
        self.completion
    }

    /// Reports every state change to `observer`. Runs in interrupt context.
    pub fn set_observer(&mut self, observer: fn(Transition)) {
        self.observer = Some(observer);
    }

    /// Assigns the buffer for the next transaction and rewinds the cursor.
    pub fn set_buffer(&mut self, buffer: impl Into<Buffer<'d>>) -> Result<(), Error> {
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        self.buffer = buffer.into();
        self.cursor = 0;
        Ok(())
    }

    /// Hands the buffer back to the caller once the transaction is over.
    pub fn take_buffer(&mut self) -> Result<Buffer<'d>, Error> {
        if !self.is_idle() {
            return Err(Error::Busy);
        }
        Ok(core::mem::take(&mut self.buffer))
    }

    /// Release the peripheral.
    pub fn free(self) -> T {
        self.twi
    }

    /// Begins a transaction with the 7-bit `address` if the master is idle.
    ///
    /// Does nothing while another transaction is in flight. Writing the address
    /// is what produces the first interrupt, so the start step runs here
    /// rather than from the interrupt handler.
    pub fn start_transaction(&mut self, address: u8, direction: Direction) {
        if !self.is_idle() || !self.completion.claim() {
            trace!("i2c: busy, start ignored");
            return;
        }

        if address > 0x7F {
            warn!("i2c: address {=u8:#x} wider than 7 bits", address);
        }

        self.address = (address << 1) | direction as u8;
        self.enter(State::Start);
        self.step();
    }

    /// Interrupt entry point. Call once per master read/write interrupt.
    ///
    /// Error flags take over from whatever the nominal next state was. They are
    /// checked in order NACK, arbitration lost, bus error, and the last one set
    /// wins. Nothing is cleared here: the register access done by the handler
    /// clears the flags that raised the interrupt.
    ///
    /// Once a read has stored its last byte the master waits in [`State::Stop`]
    /// with the clock held and no interrupt pending; [`Self::poll`] finishes it.
    pub fn on_interrupt(&mut self) {
        let flags = self.twi.flags();

        let mut state = self.state;
        if flags.nack {
            state = State::NackReceived;
        }
        if flags.arbitration_lost {
            state = State::ArbitrationLost;
        }
        if flags.bus_error {
            state = State::BusError;
        }
        if state != self.state {
            self.enter(state);
        }

        self.step();
    }

    /// Flushes the peripheral and forces the bus idle, abandoning any transaction.
    pub fn reset(&mut self) {
        self.enter(State::Reset);
        self.step();
    }

    /// Steps the state machine whenever the peripheral has an event waiting.
    ///
    /// Drives a whole transaction when the interrupt is disabled, and issues the
    /// closing stop of a read when it is enabled. Returns `WouldBlock` until the
    /// transaction is over.
    pub fn poll(&mut self) -> nb::Result<(), Error> {
        if self.completion.is_busy() && self.twi.event_pending() {
            self.on_interrupt();
        }
        self.completion.poll()
    }

    fn direction(&self) -> Direction {
        if self.address & 1 != 0 {
            Direction::Read
        } else {
            Direction::Write
        }
    }

    fn len(&self) -> usize {
        self.buffer.capacity(self.direction())
    }

    fn enter(&mut self, to: State) {
        let from = self.state;
        self.state = to;
        trace!("i2c: {} -> {}", from, to);
        if let Some(observer) = self.observer {
            observer(Transition { from, to });
        }
    }

    /// Runs the handler of the current state once and stores its successor.
    fn step(&mut self) {
        let current = self.state;
        let next = match current {
            State::Idle => State::Idle,
            State::Start => self.start(),
            State::Stop => self.stop(),
            State::Reset => self.reset_bus(),
            State::TransmitByte => self.transmit_byte(),
            State::ReceiveByte => self.receive_byte(),
            State::NackReceived => self.nack_received(),
            State::ArbitrationLost => self.arbitration_lost(),
            State::BusError => self.bus_error(),
        };
        self.enter(next);

        if next == State::Idle {
            if let Some(outcome) = Outcome::after(current) {
                if self.completion.release(outcome) && outcome != Outcome::Complete {
                    warn!("i2c: {=u8:#x} ended with {}", self.address, outcome);
                }
            }
        }
    }

    // Handlers. Each one's register access also clears the flags that raised the interrupt.

    fn start(&mut self) -> State {
        self.cursor = 0;
        // Unknown bus state sets BUSERR and ends the operation; a busy bus is
        // waited on by the hardware. Also clears ARBLOST/BUSERR.
        self.twi.write_address(self.address);

        if self.len() == 0 {
            State::Stop
        } else {
            match self.direction() {
                Direction::Read => State::ReceiveByte,
                Direction::Write => State::TransmitByte,
            }
        }
    }

    fn stop(&mut self) -> State {
        self.twi.stop();
        State::Idle
    }

    fn reset_bus(&mut self) -> State {
        self.twi.flush();
        self.twi.force_bus_idle();
        State::Idle
    }

    fn transmit_byte(&mut self) -> State {
        if let Some(byte) = self.buffer.get(self.cursor) {
            self.twi.write_data(byte);
            self.cursor += 1;
        }

        if self.cursor >= self.len() {
            State::Stop
        } else {
            State::TransmitByte
        }
    }

    fn receive_byte(&mut self) -> State {
        let byte = self.twi.read_data();
        if self.cursor < self.len() {
            self.buffer.set(self.cursor, byte);
            self.cursor += 1;
        }

        if self.cursor >= self.len() {
            State::Stop
        } else {
            self.twi.receive_next();
            State::ReceiveByte
        }
    }

    // No distinction between address and data NACK.
    fn nack_received(&mut self) -> State {
        self.stop()
    }

    // Arbitration can be lost on high data, on NACK, or on (repeated) start.
    // Retrying means a new start_transaction from the caller.
    fn arbitration_lost(&mut self) -> State {
        self.stop()
    }

    // S/Sr/P violation.
    fn bus_error(&mut self) -> State {
        self.stop()
    }
}
