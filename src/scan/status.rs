//! Scan lifecycle states
//!
//! The executor only ever drives Pending → InProgress → terminal; the
//! remaining states model the lifecycle for external schedulers and are
//! validated here so an illegal transition is always detectable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    #[strum(to_string = "pending")]
    Pending,
    #[strum(to_string = "queued")]
    Queued,
    #[strum(to_string = "in_progress")]
    InProgress,
    #[strum(to_string = "retrying")]
    Retrying,
    #[strum(to_string = "paused")]
    Paused,
    #[strum(to_string = "completed")]
    Completed,
    #[strum(to_string = "failed")]
    Failed,
    #[strum(to_string = "cancelled")]
    Cancelled,
}

impl ScanStatus {
    /// No transitions lead out of a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScanStatus::Completed | ScanStatus::Failed | ScanStatus::Cancelled
        )
    }

    /// States in which a scan sits idle waiting for external action
    pub fn is_waiting(&self) -> bool {
        matches!(self, ScanStatus::Queued | ScanStatus::Paused)
    }

    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        match self {
            Pending => matches!(next, Queued | InProgress | Cancelled),
            Queued => matches!(next, InProgress | Cancelled),
            InProgress => matches!(next, Retrying | Paused | Completed | Failed | Cancelled),
            Retrying => matches!(next, InProgress | Failed | Cancelled),
            Paused => matches!(next, InProgress | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ScanStatus; 8] = [
        ScanStatus::Pending,
        ScanStatus::Queued,
        ScanStatus::InProgress,
        ScanStatus::Retrying,
        ScanStatus::Paused,
        ScanStatus::Completed,
        ScanStatus::Failed,
        ScanStatus::Cancelled,
    ];

    #[test]
    fn test_terminal_states_admit_no_transitions() {
        for terminal in [ScanStatus::Completed, ScanStatus::Failed, ScanStatus::Cancelled] {
            assert!(terminal.is_terminal());
            for next in ALL {
                assert!(
                    !terminal.can_transition_to(next),
                    "{} -> {} should be rejected",
                    terminal,
                    next
                );
            }
        }
    }

    #[test]
    fn test_executor_path_is_legal() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::InProgress));
        assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Completed));
        assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Failed));
        assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Cancelled));
    }

    #[test]
    fn test_scheduler_states() {
        assert!(ScanStatus::Pending.can_transition_to(ScanStatus::Queued));
        assert!(ScanStatus::Queued.can_transition_to(ScanStatus::InProgress));
        assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Retrying));
        assert!(ScanStatus::Retrying.can_transition_to(ScanStatus::InProgress));
        assert!(ScanStatus::InProgress.can_transition_to(ScanStatus::Paused));
        assert!(ScanStatus::Paused.can_transition_to(ScanStatus::InProgress));

        assert!(!ScanStatus::Queued.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Pending.can_transition_to(ScanStatus::Completed));
        assert!(!ScanStatus::Retrying.can_transition_to(ScanStatus::Paused));
        assert!(!ScanStatus::Paused.can_transition_to(ScanStatus::Failed));
    }

    #[test]
    fn test_waiting_states() {
        assert!(ScanStatus::Queued.is_waiting());
        assert!(ScanStatus::Paused.is_waiting());
        for status in ALL {
            if status != ScanStatus::Queued && status != ScanStatus::Paused {
                assert!(!status.is_waiting());
            }
        }
    }
}
