//! Sticky emergency-stop signal.
//!
//! A stronger cousin of the cancellation token: once triggered it stays
//! latched until [`EmergencyStop::reset`], and the orchestrator refuses to
//! start cycles or issue robot motion while it is active.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::warn;

/// Cloneable, latched emergency-stop flag.
#[derive(Debug, Clone)]
pub struct EmergencyStop {
    sender: Arc<watch::Sender<bool>>,
    receiver: watch::Receiver<bool>,
}

impl Default for EmergencyStop {
    fn default() -> Self {
        Self::new()
    }
}

impl EmergencyStop {
    /// Create an inactive signal.
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
            receiver,
        }
    }

    /// Latch the emergency stop. Idempotent.
    pub fn trigger(&self) {
        if !self.is_active() {
            warn!("EMERGENCY STOP triggered");
        }
        self.sender.send_replace(true);
    }

    /// Whether the emergency stop is latched.
    #[inline]
    pub fn is_active(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Clear the latch so cycles may start again.
    pub fn reset(&self) {
        self.sender.send_replace(false);
    }

    /// Resolve when the emergency stop fires (immediately if latched).
    pub async fn fired(&self) {
        let mut receiver = self.receiver.clone();
        let _ = receiver.wait_for(|active| *active).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_latches_until_reset() {
        let stop = EmergencyStop::new();
        assert!(!stop.is_active());

        stop.trigger();
        stop.trigger(); // idempotent
        assert!(stop.is_active());

        stop.reset();
        assert!(!stop.is_active());
    }

    #[test]
    fn clones_share_the_latch() {
        let stop = EmergencyStop::new();
        let handle = stop.clone();
        handle.trigger();
        assert!(stop.is_active());
    }

    #[tokio::test]
    async fn fired_resolves_when_triggered() {
        let stop = EmergencyStop::new();
        let waiter = stop.clone();
        let task = tokio::spawn(async move { waiter.fired().await });

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        stop.trigger();
        task.await.expect("fired resolves");
    }
}
