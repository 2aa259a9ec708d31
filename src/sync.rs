//! Thread-synchronization primitives for the ingestion pipeline.
//!
//! `Gate` is a single-use broadcast signal: it starts unfired, fires at most
//! once, and once fired stays fired for the rest of its life. Firing wakes
//! every thread currently blocked in `wait()` and makes all future waits
//! return immediately, so there is no lost-wakeup window between checking
//! and blocking. The pipeline uses three of these per run: "first frame
//! ready", "stream done", and the process-wide start barrier that releases
//! all workers together.
//!
//! `CancelToken` is the cooperative stop signal into the ingestion thread.
//! Requesting a stop is a normal exit path, not an error: the thread
//! finishes its current tick, skips further deliveries, and the completion
//! gate still fires.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Single-use broadcast-once signal.
pub struct Gate {
    fired: Mutex<bool>,
    cond: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            fired: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Transition unfired -> fired and wake every waiter. Firing an
    /// already-fired gate is a no-op.
    pub fn fire(&self) {
        let mut fired = self.fired.lock();
        if !*fired {
            *fired = true;
            self.cond.notify_all();
        }
    }

    /// Block until the gate has fired. Returns immediately if it already has.
    pub fn wait(&self) {
        let mut fired = self.fired.lock();
        while !*fired {
            self.cond.wait(&mut fired);
        }
    }

    /// Block until the gate fires or the timeout elapses. Returns whether
    /// the gate had fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut fired = self.fired.lock();
        while !*fired {
            if self.cond.wait_until(&mut fired, deadline).timed_out() {
                return *fired;
            }
        }
        true
    }

    /// Non-blocking check.
    pub fn is_fired(&self) -> bool {
        *self.fired.lock()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate").field("fired", &self.is_fired()).finish()
    }
}

/// Cooperative stop flag shared between the owning thread and the ingestion
/// thread. Cloning yields another handle to the same flag.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    stopped: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_after_fire_returns_immediately() {
        let gate = Gate::new();
        gate.fire();
        gate.wait();
        assert!(gate.is_fired());
    }

    #[test]
    fn fire_is_idempotent() {
        let gate = Gate::new();
        gate.fire();
        gate.fire();
        assert!(gate.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn fire_releases_all_waiters() {
        let gate = Arc::new(Gate::new());
        let mut waiters = Vec::new();
        for _ in 0..4 {
            let gate = gate.clone();
            waiters.push(thread::spawn(move || gate.wait()));
        }
        // Give the waiters a moment to block before firing.
        thread::sleep(Duration::from_millis(20));
        gate.fire();
        for waiter in waiters {
            waiter.join().unwrap();
        }
    }

    #[test]
    fn wait_timeout_reports_unfired_gate() {
        let gate = Gate::new();
        assert!(!gate.wait_timeout(Duration::from_millis(10)));
        gate.fire();
        assert!(gate.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn cancel_token_is_shared() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_stopped());
        token.request_stop();
        assert!(other.is_stopped());
    }
}
