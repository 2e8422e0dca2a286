//! Shutdown signalling for consumer tasks.
//!
//! The signal is latched: a [`ShutdownSignal`] obtained after
//! [`ShutdownController::shutdown`] resolves immediately instead of waiting
//! for a broadcast it already missed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::signal;
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

/// Receiving half handed to a consumer task.
pub struct ShutdownSignal {
    rx: broadcast::Receiver<()>,
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Resolve once shutdown has been requested.
    pub async fn recv(&mut self) {
        if self.triggered.load(Ordering::Acquire) {
            return;
        }
        // A closed or lagged channel also means the controller is done.
        let _ = self.rx.recv().await;
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn signal(&self) -> ShutdownSignal {
        ShutdownSignal {
            rx: self.tx.subscribe(),
            triggered: Arc::clone(&self.triggered),
        }
    }

    /// Request shutdown. Repeated calls are harmless.
    pub fn shutdown(&self) {
        if !self.triggered.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::Acquire)
    }

    /// Block until SIGINT or SIGTERM arrives, then request shutdown.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            res = signal::ctrl_c() => match res {
                Ok(()) => tracing::info!(signal = "SIGINT", "shutdown requested"),
                Err(e) => tracing::warn!(error = %e, "SIGINT handler failed, shutting down"),
            },
            _ = terminate => tracing::info!(signal = "SIGTERM", "shutdown requested"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn waiting_signals_are_woken() {
        let controller = ShutdownController::new();
        let mut a = controller.signal();
        let mut b = controller.clone().signal();
        let waiter = tokio::spawn(async move {
            a.recv().await;
            b.recv().await;
        });
        controller.shutdown();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn late_signal_resolves_immediately() {
        let controller = ShutdownController::new();
        controller.shutdown();
        controller.shutdown();
        let mut late = controller.signal();
        assert!(late.is_triggered());
        late.recv().await;
    }

    #[test]
    fn untriggered_by_default() {
        let controller = ShutdownController::new();
        assert!(!controller.is_triggered());
        assert!(!controller.signal().is_triggered());
    }
}
