//! Two-Wire Interface (TWI) master of the megaAVR 0-series.
//!
//! - Smart mode and quick command are not used
//! - Bus timeout is left disabled

use avr_device::atmega4809::twi0::RegisterBlock;
use avr_device::atmega4809::TWI0;

use crate::peripheral::{Flags, Instance};
use crate::time::Hertz;

/// SDA setup time, as its CTRLA.SDASETUP bits
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdaSetup {
    Cycles4 = 0x00,
    Cycles8 = 0x10,
}

/// SDA hold time, as its CTRLA.SDAHOLD bits
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdaHold {
    Off = 0x00,
    Ns50 = 0x04,
    Ns300 = 0x08,
    Ns500 = 0x0C,
}

/// TWI config
#[non_exhaustive]
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Config {
    /// SCL frequency.
    pub frequency: Hertz,
    pub sda_setup: SdaSetup,
    pub sda_hold: SdaHold,
    /// Fast mode plus (1 MHz).
    pub fast_mode_plus: bool,
    /// Keep the peripheral running while the CPU is halted by the debugger.
    pub run_in_debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            frequency: Hertz::khz(100),
            sda_setup: SdaSetup::Cycles4,
            sda_hold: SdaHold::Off,
            fast_mode_plus: false,
            run_in_debug: true,
        }
    }
}

impl Config {
    /// MBAUD for peripheral clock `clk`, ignoring rise time.
    ///
    /// f_SCL = f_CLK_PER / (10 + 2 * BAUD)
    pub fn baud(&self, clk: Hertz) -> u8 {
        let div = clk.0 / (2 * self.frequency.0.max(1));
        div.saturating_sub(5).min(u8::MAX as u32) as u8
    }
}

/// TWI master driver.
pub struct Twi {
    regs: &'static RegisterBlock,
}

// Owns TWI0, so nothing else reaches these registers.
unsafe impl Send for Twi {}

impl Twi {
    /// Initialize the master on `TWI0`.
    pub fn new(_twi: TWI0, clk: Hertz, config: Config) -> Self {
        Self::from_registers(unsafe { &*TWI0::ptr() }, clk, config)
    }

    fn from_registers(regs: &'static RegisterBlock, clk: Hertz, config: Config) -> Self {
        let mut this = Self { regs };
        this.init(clk, config);
        this
    }

    fn init(&mut self, clk: Hertz, config: Config) {
        let regs = self.regs;

        // MBAUD may only be written while disabled
        regs.mctrla.reset();

        regs.ctrla.write(|w| {
            unsafe { w.bits(config.sda_setup as u8 | config.sda_hold as u8) };
            w.fmpen().bit(config.fast_mode_plus)
        });
        regs.dbgctrl.write(|w| w.dbgrun().bit(config.run_in_debug));
        regs.mbaud.write(|w| unsafe { w.bits(config.baud(clk)) });

        // TIMEOUT stays at its reset value, disabled.
        regs.mctrla
            .write(|w| w.rien().set_bit().wien().set_bit().enable().set_bit());
        regs.mctrlb.write(|w| w.flush().set_bit().ackact().ack());

        // Assumes the lines are actually idle.
        regs.mstatus.write(|w| w.busstate().idle());

        debug!("twi: enabled, MBAUD = {=u8}", regs.mbaud.read().bits());
    }
}

impl Drop for Twi {
    fn drop(&mut self) {
        self.regs.mctrla.reset();
    }
}

impl Instance for Twi {
    fn write_address(&mut self, byte: u8) {
        self.regs.maddr.write(|w| unsafe { w.bits(byte) });
    }

    fn write_data(&mut self, byte: u8) {
        // Only valid while CLKHOLD is set. Forces a transmit and ignores ACKACT.
        self.regs.mdata.write(|w| unsafe { w.bits(byte) });
    }

    fn read_data(&mut self) -> u8 {
        self.regs.mdata.read().bits()
    }

    fn receive_next(&mut self) {
        self.regs.mctrlb.modify(|_, w| w.ackact().ack().mcmd().recvtrans());
    }

    fn stop(&mut self) {
        // Acknowledge action is executed first, so a read ends with NACK.
        self.regs.mctrlb.modify(|_, w| w.ackact().nack().mcmd().stop());
    }

    fn flags(&self) -> Flags {
        let status = self.regs.mstatus.read();
        Flags {
            nack: status.rxack().bit_is_set(),
            arbitration_lost: status.arblost().bit_is_set(),
            bus_error: status.buserr().bit_is_set(),
        }
    }

    // CLKHOLD stays set after the final byte of a read, when no further RIF comes.
    fn event_pending(&self) -> bool {
        let status = self.regs.mstatus.read();
        status.rif().bit_is_set() || status.wif().bit_is_set() || status.clkhold().bit_is_set()
    }

    fn flush(&mut self) {
        self.regs.mctrlb.modify(|_, w| w.flush().set_bit());
    }

    fn force_bus_idle(&mut self) {
        self.regs.mstatus.write(|w| w.busstate().idle());
    }
}
