//! Cancellation signal shared between the cancel-switch watcher and the
//! foreground sequencer.
//!
//! Exactly one background context raises the flag and the foreground only
//! reads it while dispensing; the session lifecycle clears it. No
//! read-modify-write happens on either side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

/// Process-wide cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Foreground only: start of a manual session / dispense.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Edge handler: raise the flag when the cancel input reads active.
#[inline]
pub fn on_cancel_edge(cancel_active: bool, flag: &CancelFlag) {
    if cancel_active {
        flag.raise();
    }
}

/// Background thread standing in for the pin-change interrupt.
///
/// Polls `check` every `poll` and feeds the result to `on_cancel_edge`.
/// The thread is stopped and joined when the watcher is dropped.
pub struct CancelWatcher {
    shutdown: Arc<AtomicBool>,
    join_handle: Option<JoinHandle<()>>,
}

impl CancelWatcher {
    pub fn spawn<F>(check: F, poll: Duration, flag: CancelFlag) -> Self
    where
        F: Fn() -> bool + Send + 'static,
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::spawn(move || {
            let mut was_active = false;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("cancel watcher received shutdown signal");
                    break;
                }
                let active = check();
                if active && !was_active {
                    tracing::debug!("cancel switch edge");
                }
                on_cancel_edge(active, &flag);
                was_active = active;
                std::thread::sleep(poll);
            }
            tracing::trace!("cancel watcher exiting cleanly");
        });

        Self {
            shutdown,
            join_handle: Some(join_handle),
        }
    }
}

impl Drop for CancelWatcher {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "cancel watcher panicked during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn edge_handler_only_raises() {
        let flag = CancelFlag::new();
        on_cancel_edge(false, &flag);
        assert!(!flag.is_raised());
        on_cancel_edge(true, &flag);
        assert!(flag.is_raised());
        on_cancel_edge(false, &flag);
        assert!(flag.is_raised(), "inactive line must not clear the flag");
        flag.clear();
        assert!(!flag.is_raised());
    }

    #[test]
    fn watcher_raises_flag_from_background_thread() {
        let flag = CancelFlag::new();
        let line = Arc::new(AtomicBool::new(false));
        let probe = line.clone();
        let watcher = CancelWatcher::spawn(
            move || probe.load(Ordering::Relaxed),
            Duration::from_millis(1),
            flag.clone(),
        );
        line.store(true, Ordering::Relaxed);
        let deadline = Instant::now() + Duration::from_secs(2);
        while !flag.is_raised() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(flag.is_raised());
        drop(watcher);
    }

    #[test]
    fn drop_joins_the_thread() {
        let flag = CancelFlag::new();
        let watcher = CancelWatcher::spawn(|| false, Duration::from_millis(1), flag.clone());
        drop(watcher);
        assert!(!flag.is_raised());
    }
}
