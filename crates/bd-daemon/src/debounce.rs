//! Quiet-period collapse of many triggers into one deferred action (§4.7).
//!
//! A burst of `Trigger()` calls inside the quiet period resets the timer
//! each time; the action runs exactly once, after the last trigger plus the
//! quiet period elapses. `Cancel()` prevents any pending run from firing.

use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::Duration;

enum Msg {
    Trigger,
    Cancel,
    Shutdown,
}

/// A debounced action, backed by a single background thread.
///
/// Dropping the `Debouncer` stops the background thread without running
/// any pending action (equivalent to a final `Cancel`).
pub struct Debouncer {
    tx: Sender<Msg>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Debouncer {
    /// Creates a debouncer with the given quiet period. `action` runs on
    /// the background thread, so it must be `Send + 'static`; it should
    /// not block for long, since it delays subsequent triggers from being
    /// observed promptly (though not from being queued).
    pub fn new<F>(quiet_period: Duration, mut action: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Msg>();

        let handle = thread::Builder::new()
            .name("bd-debouncer".into())
            .spawn(move || {
                loop {
                    // Idle until the first trigger (or shutdown) arrives.
                    match rx.recv() {
                        Ok(Msg::Trigger) => {}
                        Ok(Msg::Cancel) => continue,
                        Ok(Msg::Shutdown) | Err(_) => return,
                    }

                    // A trigger is pending: keep resetting the deadline
                    // until the quiet period passes with no new message.
                    loop {
                        match rx.recv_timeout(quiet_period) {
                            Ok(Msg::Trigger) => continue,
                            Ok(Msg::Cancel) => break,
                            Ok(Msg::Shutdown) => return,
                            Err(mpsc::RecvTimeoutError::Timeout) => {
                                action();
                                break;
                            }
                            Err(mpsc::RecvTimeoutError::Disconnected) => return,
                        }
                    }
                }
            })
            .expect("failed to spawn debouncer thread");

        Self { tx, handle: Some(handle) }
    }

    /// Registers a trigger, resetting the quiet-period timer.
    pub fn trigger(&self) {
        let _ = self.tx.send(Msg::Trigger);
    }

    /// Cancels any pending run. A trigger registered after this call
    /// starts a fresh quiet period.
    pub fn cancel(&self) {
        let _ = self.tx.send(Msg::Cancel);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let _ = self.tx.send(Msg::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn collapses_a_burst_into_one_run() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let debouncer = Debouncer::new(Duration::from_millis(50), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        for _ in 0..50 {
            debouncer.trigger();
            thread::sleep(Duration::from_millis(1));
        }

        thread::sleep(Duration::from_millis(150));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancel_prevents_pending_run() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let debouncer = Debouncer::new(Duration::from_millis(30), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.trigger();
        debouncer.cancel();
        thread::sleep(Duration::from_millis(80));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn runs_again_after_a_prior_completed_cycle() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let debouncer = Debouncer::new(Duration::from_millis(20), move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        debouncer.trigger();
        thread::sleep(Duration::from_millis(60));
        debouncer.trigger();
        thread::sleep(Duration::from_millis(60));

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
