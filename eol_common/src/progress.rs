//! Progress events emitted by the orchestrator.
//!
//! Events are opaque records for a UI or log; they are ordered only with
//! respect to each other (the orchestrator emits them from its own task).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Cycle phase a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Device creation and connection.
    Initialize,
    /// Power-on, boot wait, standby sequence.
    Setup,
    /// The temperature × position sweep.
    Measure,
    /// Return to safe state.
    Teardown,
}

/// One progress record: `{phase, step, timestamp, optional detail}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Phase the step belongs to.
    pub phase: Phase,
    /// Step name (e.g. "verify_temperature").
    pub step: String,
    /// When the orchestrator emitted the event.
    pub timestamp: DateTime<Utc>,
    /// Optional free-form detail (e.g. the setpoint).
    #[serde(default)]
    pub detail: Option<String>,
}

/// Cloneable handle the orchestrator emits progress through.
///
/// A disconnected or absent receiver is fine; emission is fire-and-forget.
#[derive(Debug, Clone, Default)]
pub struct ProgressSink {
    sender: Option<mpsc::UnboundedSender<ProgressEvent>>,
}

impl ProgressSink {
    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A sink feeding the given channel.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { sender: Some(tx) }, rx)
    }

    /// Emit a step event.
    pub fn emit(&self, phase: Phase, step: &str, detail: Option<String>) {
        if let Some(sender) = &self.sender {
            // Receiver gone: nothing to do, events are advisory.
            let _ = sender.send(ProgressEvent {
                phase,
                step: step.to_string(),
                timestamp: Utc::now(),
                detail,
            });
        }
    }
}
