//! Cancellation signal shared between signal handlers and the control loop.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Cloneable one-shot shutdown flag that can wake a sleeping loop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown and wake every waiter.
    pub fn trigger(&self) {
        let (_, condvar) = &*self.inner;
        *self.flag() = true;
        condvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag()
    }

    /// Sleep for up to `timeout`, returning early once triggered.
    ///
    /// Returns `true` if shutdown was requested. A `timeout` too large to
    /// fit an `Instant` waits until triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (_, condvar) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut triggered = self.flag();

        while !*triggered {
            triggered = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    match condvar.wait_timeout(triggered, deadline - now) {
                        Ok((guard, _)) => guard,
                        Err(poisoned) => poisoned.into_inner().0,
                    }
                }
                None => condvar.wait(triggered).unwrap_or_else(|poisoned| poisoned.into_inner()),
            };
        }

        *triggered
    }

    // A poisoned flag is still a valid bool.
    fn flag(&self) -> MutexGuard<'_, bool> {
        let (lock, _) = &*self.inner;
        lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
