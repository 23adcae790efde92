//! Cycle and robot state enums.

/// Lifecycle state of one test cycle.
///
/// ```text
/// Created → Initialized → SetupComplete → Measuring → TeardownComplete → Done
///                                       ↘ Failed (from any state on error)
///                                       ↘ Cancelled (cancel / emergency-stop)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    /// Cycle object exists; nothing has run.
    Created,
    /// Devices connected and brought to the starting state.
    Initialized,
    /// Power on, MCU booted, standby sequence finished.
    SetupComplete,
    /// Sweeping the temperature × position matrix.
    Measuring,
    /// Teardown finished (power off, robot parked).
    TeardownComplete,
    /// Cycle completed; result evaluated.
    Done,
    /// A failure terminated the cycle.
    Failed,
    /// External cancellation or emergency stop terminated the cycle.
    Cancelled,
}

impl CycleState {
    /// Whether this is a terminal state.
    #[inline]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed | Self::Cancelled)
    }
}

/// Orchestrator-tracked robot position state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RobotState {
    /// Position unknown (before initialization).
    Unknown,
    /// At the home position.
    Home,
    /// Parked at the configured initial position.
    InitialPosition,
    /// At the maximum stroke (operating) position.
    MaxStroke,
    /// At a measurement stroke position.
    MeasurementPosition,
    /// A move is in flight.
    Moving,
}
