//! Shutdown coordination for the relay.
//!
//! A `ShutdownState` is shared between the signal handler, the application
//! and the accept loop. Initiating shutdown stops the accept loop; completing
//! it tells the application that cleanup may begin.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ShutdownState {
    shutdown_initiated: Arc<AtomicBool>,
    shutdown_complete: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self {
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
            shutdown_complete: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Returns true once shutdown has been initiated.
    pub fn is_shutdown_initiated(&self) -> bool {
        self.shutdown_initiated.load(Ordering::Acquire)
    }

    /// Returns true once the relay has finished its cleanup.
    pub fn is_shutdown_complete(&self) -> bool {
        self.shutdown_complete.load(Ordering::Acquire)
    }

    /// Initiates shutdown and wakes every task waiting on it.
    pub fn initiate_shutdown(&self) {
        self.shutdown_initiated.store(true, Ordering::Release);
        self.notify.notify_waiters();
        info!("🛑 Shutdown initiated - no new connections will be accepted");
    }

    pub fn complete_shutdown(&self) {
        self.shutdown_complete.store(true, Ordering::Release);
        info!("✅ Relay cleanup finished");
    }

    /// Resolves once shutdown has been initiated.
    pub async fn wait_for_shutdown(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_shutdown_initiated() {
                return;
            }
            notified.await;
        }
    }
}

impl Default for ShutdownState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_resolves_after_initiate() {
        let state = ShutdownState::new();
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait_for_shutdown().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!state.is_shutdown_initiated());
        state.initiate_shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter did not wake")
            .unwrap();
        assert!(!state.is_shutdown_complete());
        state.complete_shutdown();
        assert!(state.is_shutdown_complete());
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_initiated() {
        let state = ShutdownState::new();
        state.initiate_shutdown();
        tokio::time::timeout(Duration::from_millis(100), state.wait_for_shutdown())
            .await
            .expect("already-initiated shutdown should not block");
    }
}
