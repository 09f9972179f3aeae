use core::cell::Cell;
#[cfg(feature = "embassy")]
use core::future::poll_fn;
#[cfg(feature = "embassy")]
use core::task::Poll;

use critical_section::Mutex;
#[cfg(feature = "embassy")]
use embassy_sync::waitqueue::AtomicWaker;

use super::{Error, Outcome};

#[derive(Copy, Clone)]
struct Inner {
    busy: bool,
    outcome: Option<Outcome>,
}

/// Busy flag and result of the transaction in flight, shared between the
/// interrupt handler and foreground code.
///
/// Lives in a `static` next to the [`super::SharedMaster`] so that callers can
/// wait on it without taking the master.
pub struct Completion {
    inner: Mutex<Cell<Inner>>,
    #[cfg(feature = "embassy")]
    waker: AtomicWaker,
}

impl Completion {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(Cell::new(Inner {
                busy: false,
                outcome: None,
            })),
            #[cfg(feature = "embassy")]
            waker: AtomicWaker::new(),
        }
    }

    pub fn is_busy(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow(cs).get().busy)
    }

    /// Outcome of the last finished transaction, `None` while one is in flight.
    pub fn outcome(&self) -> Option<Outcome> {
        critical_section::with(|cs| self.inner.borrow(cs).get().outcome)
    }

    /// `WouldBlock` until the transaction in flight is over.
    pub fn poll(&self) -> nb::Result<(), Error> {
        let inner = critical_section::with(|cs| self.inner.borrow(cs).get());
        if inner.busy {
            return Err(nb::Error::WouldBlock);
        }
        match inner.outcome {
            Some(outcome) => outcome.result().map_err(nb::Error::Other),
            None => Ok(()),
        }
    }

    /// Wait for the transaction in flight to end.
    ///
    /// Only the interrupt wakes this. A read ends with no further interrupt, so
    /// wait on it with [`super::SharedMaster::poll`] instead.
    #[cfg(feature = "embassy")]
    pub async fn wait(&self) -> Result<(), Error> {
        poll_fn(|cx| {
            self.waker.register(cx.waker());

            match self.poll() {
                Err(nb::Error::WouldBlock) => Poll::Pending,
                Err(nb::Error::Other(e)) => Poll::Ready(Err(e)),
                Ok(()) => Poll::Ready(Ok(())),
            }
        })
        .await
    }

    /// Idle -> busy. Returns `false` if already busy.
    pub(crate) fn claim(&self) -> bool {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            if cell.get().busy {
                return false;
            }
            cell.set(Inner {
                busy: true,
                outcome: None,
            });
            true
        })
    }

    /// Busy -> idle with `outcome`. Returns `false` if nothing was in flight.
    pub(crate) fn release(&self, outcome: Outcome) -> bool {
        let released = critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            if !cell.get().busy {
                return false;
            }
            cell.set(Inner {
                busy: false,
                outcome: Some(outcome),
            });
            true
        });

        #[cfg(feature = "embassy")]
        if released {
            self.waker.wake();
        }

        released
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_exclusive() {
        let completion = Completion::new();
        assert_eq!(completion.poll(), Ok(()));

        assert!(completion.claim());
        assert!(!completion.claim());
        assert_eq!(completion.outcome(), None);
        assert_eq!(completion.poll(), Err(nb::Error::WouldBlock));

        assert!(completion.release(Outcome::ArbitrationLost));
        assert!(!completion.release(Outcome::Complete));
        assert_eq!(completion.outcome(), Some(Outcome::ArbitrationLost));
        assert_eq!(completion.poll(), Err(nb::Error::Other(Error::Arbitration)));
    }

    #[test]
    fn claim_clears_previous_outcome() {
        let completion = Completion::new();
        completion.claim();
        completion.release(Outcome::BusError);

        assert!(completion.claim());
        assert_eq!(completion.outcome(), None);
        completion.release(Outcome::Complete);
        assert_eq!(completion.poll(), Ok(()));
    }

    #[cfg(feature = "embassy")]
    #[test]
    fn wait_returns_outcome() {
        let completion = Completion::new();
        completion.claim();
        completion.release(Outcome::Nack);

        assert_eq!(embassy_futures::block_on(completion.wait()), Err(Error::Nack));
    }
}
