//! Start/stop bookkeeping shared by the pinger and the poller
//!
//! A loop occupies the slot while it runs. The slot is guarded by a mutex so
//! that a user-initiated stop and a loop stopping itself after a failure can
//! never both believe they own the shutdown.

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How long `shutdown()` waits for a loop before aborting it
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

struct LoopSlot {
    id: u64,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Handed to a running loop: its identity plus the cancellation signal
pub struct LoopTicket {
    id: u64,
    shutdown_rx: watch::Receiver<bool>,
}

impl LoopTicket {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Resolves once shutdown was requested or the controller went away
    pub async fn cancelled(&mut self) {
        loop {
            if *self.shutdown_rx.borrow_and_update() {
                return;
            }
            if self.shutdown_rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep that ends early on shutdown; returns false if interrupted
    pub async fn sleep(&mut self, delay_ms: u64) -> bool {
        tokio::select! {
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_millis(delay_ms)) => true,
        }
    }
}

/// Owner of at most one running loop task
pub struct LoopControl {
    name: &'static str,
    slot: Mutex<Option<LoopSlot>>,
    next_id: AtomicU64,
}

impl LoopControl {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            slot: Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Spawn the loop unless one is already running; true if spawned
    pub fn start<F, Fut>(&self, body: F) -> bool
    where
        F: FnOnce(LoopTicket) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(body(LoopTicket { id, shutdown_rx }));
        *slot = Some(LoopSlot {
            id,
            shutdown_tx,
            handle,
        });
        debug!(loop_name = self.name, id, "Loop started");
        true
    }

    /// Signal the loop to stop without waiting; true if one was running
    pub fn stop(&self) -> bool {
        let taken = self.slot.lock().take();
        match taken {
            Some(slot) => {
                let _ = slot.shutdown_tx.send(true);
                debug!(loop_name = self.name, id = slot.id, "Loop stop requested");
                true
            }
            None => false,
        }
    }

    /// Stop the loop and wait for it to finish, aborting it after the grace period
    pub async fn shutdown(&self) -> bool {
        let taken = self.slot.lock().take();
        let Some(mut slot) = taken else {
            return false;
        };

        let _ = slot.shutdown_tx.send(true);
        match tokio::time::timeout(SHUTDOWN_GRACE, &mut slot.handle).await {
            Ok(Ok(())) => {
                debug!(loop_name = self.name, "Loop shut down gracefully");
            }
            Ok(Err(e)) if !e.is_cancelled() => {
                warn!(loop_name = self.name, "Loop task ended with error: {}", e);
            }
            Ok(Err(_)) => {}
            Err(_) => {
                warn!(
                    loop_name = self.name,
                    "Loop did not stop within {:?}, aborting", SHUTDOWN_GRACE
                );
                slot.handle.abort();
            }
        }
        true
    }

    /// Called by a loop about to stop itself; true only if it still owned the slot
    pub fn release(&self, id: u64) -> bool {
        let mut slot = self.slot.lock();
        if slot.as_ref().map(|s| s.id) == Some(id) {
            slot.take();
            true
        } else {
            false
        }
    }

    pub fn is_running(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl Drop for LoopControl {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.get_mut().take() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        // Arrange
        let control = LoopControl::new("test");

        // Act
        let first = control.start(|mut ticket| async move { ticket.cancelled().await });
        let second = control.start(|mut ticket| async move { ticket.cancelled().await });

        // Assert
        assert!(first);
        assert!(!second);
        assert!(control.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let control = LoopControl::new("test");
        control.start(|mut ticket| async move { ticket.cancelled().await });

        assert!(control.stop());
        assert!(!control.stop());
        assert!(!control.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_sleep() {
        // Arrange
        let finished = Arc::new(AtomicUsize::new(0));
        let control = LoopControl::new("test");
        let counter = finished.clone();
        control.start(move |mut ticket| async move {
            let completed = ticket.sleep(60_000).await;
            assert!(!completed);
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::task::yield_now().await;

        // Act
        let was_running = control.shutdown().await;

        // Assert
        assert!(was_running);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(!control.shutdown().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_aborts_stuck_loop() {
        let control = LoopControl::new("stuck");
        control.start(|_ticket| async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        tokio::task::yield_now().await;

        assert!(control.shutdown().await);
        assert!(!control.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_only_for_owner() {
        let control = LoopControl::new("test");
        control.start(|mut ticket| async move { ticket.cancelled().await });

        assert!(!control.release(999));
        assert!(control.is_running());
        assert!(control.release(1));
        assert!(!control.is_running());
    }
}
