//! Job status state machine.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

/// A status change the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        JobStatus::Pending,
        JobStatus::Processing,
        JobStatus::Paused,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine has an edge from `self` to `to`.
    pub fn can_transition_to(&self, to: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, to),
            (Pending, Processing)
                | (Processing, Paused)
                | (Paused, Processing)
                | (Pending | Processing | Paused, Cancelled)
                | (Processing, Completed | Failed)
        )
    }

    /// Validate the edge `self -> to`, returning `to` on success.
    pub fn transition(&self, to: JobStatus) -> Result<JobStatus, TransitionError> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(TransitionError::InvalidTransition { from: *self, to })
        }
    }
}

impl core::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("unknown job status: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_edges() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Paused));
        assert!(Paused.can_transition_to(Processing));
        assert!(Paused.can_transition_to(Cancelled));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Paused));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Paused.can_transition_to(Completed));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn terminal_states_reject_everything() {
        for from in JobStatus::ALL.into_iter().filter(JobStatus::is_terminal) {
            for to in JobStatus::ALL {
                assert_eq!(
                    from.transition(to),
                    Err(TransitionError::InvalidTransition { from, to })
                );
            }
        }
    }

    #[test]
    fn parses_wire_names() {
        assert!("done".parse::<JobStatus>().is_err());
        assert_eq!("paused".parse::<JobStatus>(), Ok(JobStatus::Paused));
        assert_eq!(JobStatus::Cancelled.to_string(), "cancelled");
    }
}
