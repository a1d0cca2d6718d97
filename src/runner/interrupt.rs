//! Run-wide Ctrl-C listener.
//!
//! Once `tokio::signal::ctrl_c()` has been polled the default SIGINT action
//! no longer terminates the process, so a single listener is installed for
//! the whole run and every Ctrl-C is published through a `watch` channel.
//! The runner checks it during attempts (the attempt fails) and between
//! tasks (the run stops).

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

/// After an interrupted attempt, a second Ctrl-C within this window stops the run.
pub const STOP_WINDOW: Duration = Duration::from_secs(5);

/// Receiving side of the run's interrupt signal.
pub struct Interrupts {
    rx: Option<watch::Receiver<u64>>,
    listener: Option<JoinHandle<()>>,
    stop_window: Duration,
}

impl Interrupts {
    /// Installs the process Ctrl-C listener.
    pub fn listen() -> Self {
        let (tx, rx) = watch::channel(0u64);
        let listener = tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    break;
                }
                tx.send_modify(|count| *count += 1);
            }
        });
        Self {
            rx: Some(rx),
            listener: Some(listener),
            stop_window: STOP_WINDOW,
        }
    }

    /// No signal handling; attempts run to completion.
    pub fn disabled() -> Self {
        Self {
            rx: None,
            listener: None,
            stop_window: STOP_WINDOW,
        }
    }

    /// Interrupts driven by the returned sender instead of the OS signal.
    pub fn manual(stop_window: Duration) -> (watch::Sender<u64>, Self) {
        let (tx, rx) = watch::channel(0u64);
        let interrupts = Self {
            rx: Some(rx),
            listener: None,
            stop_window,
        };
        (tx, interrupts)
    }

    pub fn is_enabled(&self) -> bool {
        self.rx.is_some()
    }

    /// Consumes an interrupt that arrived since the last check.
    pub fn take_pending(&mut self) -> bool {
        let Some(rx) = self.rx.as_mut() else {
            return false;
        };
        match rx.has_changed() {
            Ok(true) => {
                rx.borrow_and_update();
                true
            }
            _ => false,
        }
    }

    /// Resolves at the next interrupt. Never resolves when disabled or when
    /// the listener has gone away.
    pub async fn next(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            if rx.changed().await.is_ok() {
                return;
            }
            self.rx = None;
        }
        std::future::pending::<()>().await
    }

    /// Waits up to the stop window for a second interrupt.
    pub async fn confirm_stop(&mut self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        warn!(
            "Attempt interrupted; press Ctrl-C again within {}s to stop the run",
            self.stop_window.as_secs_f64()
        );
        tokio::time::timeout(self.stop_window, self.next())
            .await
            .is_ok()
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_never_pending() {
        let mut interrupts = Interrupts::disabled();
        assert!(!interrupts.take_pending());
        assert!(!interrupts.confirm_stop().await);
        let next = tokio::time::timeout(Duration::from_millis(20), interrupts.next()).await;
        assert!(next.is_err());
    }

    #[tokio::test]
    async fn test_pending_is_consumed_once() {
        let (tx, mut interrupts) = Interrupts::manual(Duration::from_millis(20));
        assert!(!interrupts.take_pending());

        tx.send_modify(|n| *n += 1);
        assert!(interrupts.take_pending());
        assert!(!interrupts.take_pending());
    }

    #[tokio::test]
    async fn test_confirm_stop_window() {
        let (tx, mut interrupts) = Interrupts::manual(Duration::from_millis(50));
        assert!(!interrupts.confirm_stop().await);

        tx.send_modify(|n| *n += 1);
        assert!(interrupts.confirm_stop().await);
    }

    #[tokio::test]
    async fn test_closed_sender_is_quiet() {
        let (tx, mut interrupts) = Interrupts::manual(Duration::from_millis(20));
        drop(tx);
        assert!(!interrupts.take_pending());
        let next = tokio::time::timeout(Duration::from_millis(20), interrupts.next()).await;
        assert!(next.is_err());
    }
}
