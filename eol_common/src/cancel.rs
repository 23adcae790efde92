//! Cooperative cancellation token.
//!
//! A thin, sticky wrapper over `tokio::sync::watch`. The orchestrator calls
//! [`CancelToken::check`] at every suspension point and selects on
//! [`CancelToken::cancelled`] around long waits.

use crate::error::{EolError, EolResult};
use std::sync::Arc;
use tokio::sync::watch;

/// Cloneable cancellation token. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct CancelToken {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    /// Create a fresh, un-cancelled token.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        // send_replace never fails: we hold a receiver ourselves.
        self.sender.send_replace(true);
    }

    /// Whether cancellation has been requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Err(`EolError::Cancelled`) once cancellation has been requested.
    #[inline]
    pub fn check(&self) -> EolResult<()> {
        if self.is_cancelled() {
            Err(EolError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve when cancellation is requested (immediately if it already
    /// was).
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        // wait_for only errs when the sender is dropped; we hold an Arc to it.
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}
