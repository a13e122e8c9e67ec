//! One-shot "environment is shutting down" notification

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

type Listener = Box<dyn FnOnce() + Send>;

/// Fires at most once; every subscriber runs exactly once
///
/// Subscribing after the signal fired runs the listener immediately.
///
/// # Examples
///
/// ```
/// use poolkit::TeardownSignal;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let signal = TeardownSignal::new();
///
/// let counter = Arc::clone(&calls);
/// signal.subscribe(move || { counter.fetch_add(1, Ordering::SeqCst); });
///
/// assert!(signal.fire());
/// assert!(!signal.fire());
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// ```
#[derive(Default)]
pub struct TeardownSignal {
    fired: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

impl TeardownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut listeners = self.listeners.lock();
        if self.fired.load(Ordering::Acquire) {
            drop(listeners);
            listener();
            return;
        }
        listeners.push(Box::new(listener));
    }

    /// Fire the signal. Returns `false` if it had already fired.
    pub fn fire(&self) -> bool {
        let listeners = {
            let mut guard = self.listeners.lock();
            if self.fired.swap(true, Ordering::AcqRel) {
                return false;
            }
            std::mem::take(&mut *guard)
        };

        info!(listeners = listeners.len(), "Teardown signal fired");
        for listener in listeners {
            listener();
        }
        true
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_late_subscriber_runs_immediately() {
        let signal = TeardownSignal::new();
        assert!(signal.fire());
        assert!(signal.is_fired());

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        signal.subscribe(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_listeners_run_once() {
        let signal = TeardownSignal::new();
        let calls = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let counter = Arc::clone(&calls);
            signal.subscribe(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        signal.fire();
        signal.fire();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
