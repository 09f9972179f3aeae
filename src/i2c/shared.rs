use core::cell::RefCell;

use critical_section::Mutex;

use super::{Error, Master};
use crate::peripheral::Instance;

/// A [`Master`] reachable from both `main` and the TWI interrupt vector.
///
/// A master is only handed over while idle. Taking it out mid-transaction would
/// leave its [`super::Completion`] claimed, and every later master sharing that
/// completion would ignore `start_transaction`.
pub struct SharedMaster<'d, T: Instance> {
    inner: Mutex<RefCell<Option<Master<'d, T>>>>,
}

impl<'d, T: Instance> SharedMaster<'d, T> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Installs `master`, returning the one it replaces.
    ///
    /// Hands `master` back if the installed one is mid-transaction.
    pub fn install(&self, master: Master<'d, T>) -> Result<Option<Master<'d, T>>, Master<'d, T>> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            if slot.as_ref().is_some_and(|installed| !installed.is_idle()) {
                return Err(master);
            }
            Ok(slot.replace(master))
        })
    }

    /// Removes the master. `Err(Busy)` while a transaction is in flight.
    pub fn take(&self) -> Result<Option<Master<'d, T>>, Error> {
        critical_section::with(|cs| {
            let mut slot = self.inner.borrow_ref_mut(cs);
            if slot.as_ref().is_some_and(|installed| !installed.is_idle()) {
                return Err(Error::Busy);
            }
            Ok(slot.take())
        })
    }

    /// Runs `f` on the master inside a critical section. `None` if nothing is installed.
    pub fn with<R>(&self, f: impl FnOnce(&mut Master<'d, T>) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Call from the TWI master interrupt vector.
    ///
    /// The last byte of a read raises no further interrupt: the closing stop is
    /// issued by [`Self::poll`].
    pub fn on_interrupt(&self) {
        if self.with(|master| master.on_interrupt()).is_none() {
            trace!("i2c: interrupt with no master installed");
        }
    }

    /// Steps the master if the peripheral has an event waiting, see [`Master::poll`].
    ///
    /// Needed once a read has received its last byte. `Ok` if nothing is installed.
    pub fn poll(&self) -> nb::Result<(), Error> {
        self.with(|master| master.poll()).unwrap_or(Ok(()))
    }
}

impl<'d, T: Instance> Default for SharedMaster<'d, T> {
    fn default() -> Self {
        Self::new()
    }
}
