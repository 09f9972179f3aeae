#![cfg_attr(not(test), no_std)]

//! Interrupt-driven I2C master for the megaAVR TWI peripheral.
//!
//! [`i2c::Master`] is the state machine, [`twi::Twi`] binds it to the
//! hardware registers, and [`peripheral::Instance`] is the seam between them.

// This must go FIRST so that all the other modules see its macros.
mod fmt;

pub mod i2c;
pub mod peripheral;
pub mod time;
pub mod twi;

/// Commonly used items.
pub mod prelude {
    pub use crate::i2c::{Blocking, Completion, Direction, Master, SharedMaster};
    pub use crate::peripheral::Instance as _;
    pub use crate::time::Hertz;
}
