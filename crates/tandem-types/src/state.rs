//! Capture session state machine.

use crate::error::CaptureError;
use crate::result::RecordingResult;

/// The state of a capture session.
///
/// ```text
/// Idle → Configuring → Ready → Capturing ⇄ Paused
///                                  │          │
///                                  └─ Stopping ┴→ Completed / Failed
/// ```
///
/// `Completed` and `Failed` are terminal: a session that reached either
/// refuses further operations and a fresh session must be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureState {
    /// Freshly constructed, no configuration applied.
    Idle,

    /// A configuration is being validated.
    Configuring,

    /// Configured and ready to start.
    Ready,

    /// Actively recording.
    Capturing { duration_secs: f64 },

    /// Recording suspended; providers stay open, the clock does not advance.
    Paused { duration_secs: f64 },

    /// Tearing down providers and finalizing the file.
    Stopping,

    /// Finished successfully.
    Completed(Box<RecordingResult>),

    /// Finished with a terminal error.
    Failed(CaptureError),
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }

    /// Whether the session can never leave this state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed(_) | Self::Failed(_))
    }

    /// Captured duration, for the states that track one.
    pub fn duration_secs(&self) -> Option<f64> {
        match self {
            Self::Capturing { duration_secs } | Self::Paused { duration_secs } => {
                Some(*duration_secs)
            }
            Self::Completed(result) => Some(result.duration_secs),
            _ => None,
        }
    }

    /// Short name for logs and state-transition traces.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Configuring => "Configuring",
            Self::Ready => "Ready",
            Self::Capturing { .. } => "Capturing",
            Self::Paused { .. } => "Paused",
            Self::Stopping => "Stopping",
            Self::Completed(_) => "Completed",
            Self::Failed(_) => "Failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(CaptureState::Failed(CaptureError::Timeout).is_terminal());
        assert!(!CaptureState::Idle.is_terminal());
        assert!(!CaptureState::Stopping.is_terminal());
    }

    #[test]
    fn duration_tracked_while_active() {
        assert_eq!(
            CaptureState::Capturing { duration_secs: 2.5 }.duration_secs(),
            Some(2.5)
        );
        assert_eq!(
            CaptureState::Paused { duration_secs: 4.0 }.duration_secs(),
            Some(4.0)
        );
        assert_eq!(CaptureState::Ready.duration_secs(), None);
    }
}
