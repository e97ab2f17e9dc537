//! TaskOutcome - resolution of one worker-pool task

use crate::DeliveryError;

/// How a submitted task resolved
///
/// Exactly one outcome is produced per submitted task.
#[derive(Debug)]
pub enum TaskOutcome<T> {
    /// `process` returned normally
    Completed(T),
    /// The task exceeded the pool's task timeout
    TimedOut,
    /// The task was cancelled before it could run
    Cancelled,
    /// `process` failed or panicked
    Errored(DeliveryError),
}

impl<T> TaskOutcome<T> {
    /// Outcome discriminant without the payload
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Self::Completed(_) => OutcomeKind::Completed,
            Self::TimedOut => OutcomeKind::TimedOut,
            Self::Cancelled => OutcomeKind::Cancelled,
            Self::Errored(_) => OutcomeKind::Errored,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

/// Payload-free outcome discriminant (for logging/metrics)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    Completed,
    TimedOut,
    Cancelled,
    Errored,
}

impl OutcomeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}
