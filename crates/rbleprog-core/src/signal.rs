//! Single-slot completion signal
//!
//! The transport's completion callback (interrupt context on a board, a
//! reader thread on a host) is the only producer; the codec waiting for a
//! response is the only consumer. The signal holds one bit of state, so a
//! second completion raised before the first is taken is coalesced.

use core::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

/// Default number of polls before a wait gives up
pub const DEFAULT_WAIT_BUDGET: u32 = 0xFFFF;

/// Binary semaphore between a transport callback and a waiter
#[derive(Debug, Default)]
pub struct EventSignal {
    pending: AtomicBool,
}

impl EventSignal {
    /// Create a signal with no event pending
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Mark an event as pending (producer side)
    pub fn raise(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether an event is pending, without consuming it
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    /// Consume a pending event (consumer side)
    ///
    /// Returns true if an event was pending.
    pub fn take(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Poll for an event, giving up after `budget` polls
    ///
    /// The signal is always left cleared on return, including on timeout.
    pub fn wait(&self, budget: u32) -> Result<()> {
        let mut remaining = budget;
        loop {
            if self.take() {
                return Ok(());
            }
            if remaining == 0 {
                self.take();
                return Err(Error::WaitTimeout);
            }
            remaining -= 1;
            core::hint::spin_loop();
        }
    }
}
