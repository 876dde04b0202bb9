use chrono::NaiveDateTime;
use derive_more::{Display, Error};

use crate::api::{sponsorship::SponsorshipOp, walk::WalkAction};
use crate::models::{relation::RelationState, walk::WalkStatus};

/// Operation that was attempted when a transition got rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Operation {
    #[display("{_0}")]
    Sponsorship(SponsorshipOp),
    #[display("{_0}")]
    Walk(WalkAction),
}

/// State the record was in when a transition got rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TransitionState {
    #[display("{_0}")]
    Relation(RelationState),
    #[display("{_0}")]
    Walk(WalkStatus),
}

/// Every failure the sponsorship lifecycle and the walk scheduler surface.
///
/// Pure functions return it directly, repo and orchestration functions wrap it
/// in `anyhow::Error`; use [`domain_error`] to recover it from there.
#[derive(Debug, Clone, PartialEq, Display, Error)]
pub enum DomainError {
    #[display("cannot {operation} while in state {current}")]
    InvalidTransition {
        operation: Operation,
        current: TransitionState,
    },
    #[display(
        "walk overlaps booking {conflicting_id} starting at {conflicting_start} ({conflicting_minutes} min)"
    )]
    SchedulingConflict {
        conflicting_id: String,
        conflicting_start: NaiveDateTime,
        conflicting_minutes: u32,
    },
    #[display("malformed history entry '{entry}': {reason}")]
    HistoryParseError { entry: String, reason: String },
    #[display("malformed pet relation entry '{entry}': {reason}")]
    RelationParseError { entry: String, reason: String },
    #[display("malformed walk schedule '{value}', expected DD/MM/YYYY HH:MM")]
    ScheduleParseError { value: String },
    #[display("invalid booking: {reason}")]
    InvalidBooking { reason: String },
    #[display("invalid pet id '{value}': {reason}")]
    InvalidPetId { value: String, reason: String },
    #[display("{record} changed since it was read")]
    ConcurrentModification { record: String },
    #[display("{record} not found")]
    NotFound { record: String },
}

impl DomainError {
    pub fn concurrent(record: impl Into<String>) -> Self {
        Self::ConcurrentModification {
            record: record.into(),
        }
    }

    pub fn not_found(record: impl Into<String>) -> Self {
        Self::NotFound {
            record: record.into(),
        }
    }
}

/// Looks for a [`DomainError`] inside an error returned by the repo or api layer.
pub fn domain_error(err: &anyhow::Error) -> Option<&DomainError> {
    err.downcast_ref::<DomainError>()
}

pub fn is_concurrent_modification(err: &anyhow::Error) -> bool {
    matches!(
        domain_error(err),
        Some(DomainError::ConcurrentModification { .. })
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::relation::RelationStatus;

    #[test]
    fn test_invalid_transition_message_names_operation_and_state() {
        let err = DomainError::InvalidTransition {
            operation: Operation::Sponsorship(SponsorshipOp::AcceptSponsorship),
            current: TransitionState::Relation(RelationState::None),
        };

        assert_eq!(
            err.to_string(),
            "cannot accept sponsorship while in state none"
        );

        let err = DomainError::InvalidTransition {
            operation: Operation::Walk(WalkAction::Cancel),
            current: TransitionState::Walk(WalkStatus::Completed),
        };
        assert_eq!(err.to_string(), "cannot cancel walk while in state completed");

        let err = DomainError::InvalidTransition {
            operation: Operation::Sponsorship(SponsorshipOp::DenyAdoption),
            current: TransitionState::Relation(RelationState::Related(RelationStatus::Sponsor)),
        };
        assert!(err.to_string().contains("sponsor"));
    }

    #[test]
    fn test_domain_error_survives_anyhow_wrapping() {
        let err: anyhow::Error = DomainError::concurrent("walk abc").into();

        assert!(is_concurrent_modification(&err));
        assert_eq!(
            domain_error(&err),
            Some(&DomainError::ConcurrentModification {
                record: "walk abc".into()
            })
        );

        let err: anyhow::Error = DomainError::not_found("pet p1").into();
        assert!(!is_concurrent_modification(&err));
        assert!(!is_concurrent_modification(&anyhow::anyhow!("db down")));
    }
}
