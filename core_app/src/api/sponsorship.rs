//! # Sponsorship API Module
//!
//! Lifecycle of a user's relation to a pet: sponsorship requests, unsponsoring,
//! adoption requests and their finalization. The state machine itself is pure
//! ([`next_state`], [`apply`]); [`run_transition`] wires it to the repository
//! with compare-and-swap writes.

use crate::{
    errors::{DomainError, Operation, TransitionState},
    metric,
    models::{
        pet::{HistoryEvent, Pet, PetHistory, PetId, PetStatus, PetWrite},
        relation::{RelationState, RelationStatus, UserPetRelations},
        user_app::User,
    },
    repo, services,
};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use derive_more::Display;
use log::{info, warn};
use serde::Serialize;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SponsorshipOp {
    #[display("request sponsorship")]
    RequestSponsorship,
    #[display("accept sponsorship")]
    AcceptSponsorship,
    #[display("deny sponsorship")]
    DenySponsorship,
    #[display("request unsponsor")]
    RequestUnsponsor,
    #[display("accept unsponsor")]
    AcceptUnsponsor,
    #[display("request adoption")]
    RequestAdoption,
    #[display("accept adoption")]
    AcceptAdoption,
    #[display("deny adoption")]
    DenyAdoption,
    #[display("finalize adoption")]
    FinalizeAdoption,
}

impl SponsorshipOp {
    pub const ALL: [SponsorshipOp; 9] = [
        Self::RequestSponsorship,
        Self::AcceptSponsorship,
        Self::DenySponsorship,
        Self::RequestUnsponsor,
        Self::AcceptUnsponsor,
        Self::RequestAdoption,
        Self::AcceptAdoption,
        Self::DenyAdoption,
        Self::FinalizeAdoption,
    ];
}

/// Side effect of a transition on the pet record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PetEffect {
    Keep,
    AppendHistory(HistoryEvent),
    MarkFinalizing,
    DeletePet,
}

/// The closed sponsorship/adoption state machine.
///
/// Returns the next relation state and what has to happen to the pet, or
/// `InvalidTransition` when `op` is not allowed from `current`.
pub fn next_state(
    op: SponsorshipOp,
    current: RelationState,
) -> Result<(RelationState, PetEffect), DomainError> {
    use RelationStatus as S;
    use RelationState::{None as NoRelation, Related};

    let next = match (op, current) {
        (SponsorshipOp::RequestSponsorship, NoRelation | Related(S::Denied)) => {
            (Related(S::Requested), PetEffect::Keep)
        }
        (SponsorshipOp::AcceptSponsorship, Related(S::Requested)) => (
            Related(S::Sponsor),
            PetEffect::AppendHistory(HistoryEvent::Sponsored),
        ),
        (SponsorshipOp::DenySponsorship, Related(S::Requested)) => {
            (Related(S::Denied), PetEffect::Keep)
        }
        (SponsorshipOp::RequestUnsponsor, Related(S::Sponsor)) => {
            (Related(S::UnsponsorRequested), PetEffect::Keep)
        }
        (SponsorshipOp::AcceptUnsponsor, Related(S::UnsponsorRequested)) => (
            NoRelation,
            PetEffect::AppendHistory(HistoryEvent::Unsponsored),
        ),
        (
            SponsorshipOp::RequestAdoption,
            NoRelation | Related(S::Denied | S::AdoptionDeniedNew),
        ) => (Related(S::AdoptionRequestedNew), PetEffect::Keep),
        (SponsorshipOp::RequestAdoption, Related(S::Sponsor | S::AdoptionDeniedSponsor)) => {
            (Related(S::AdoptionRequestedSponsor), PetEffect::Keep)
        }
        (
            SponsorshipOp::AcceptAdoption,
            Related(S::AdoptionRequestedNew | S::AdoptionRequestedSponsor),
        ) => (Related(S::Adopted), PetEffect::MarkFinalizing),
        (SponsorshipOp::DenyAdoption, Related(S::AdoptionRequestedNew)) => {
            (Related(S::AdoptionDeniedNew), PetEffect::Keep)
        }
        (SponsorshipOp::DenyAdoption, Related(S::AdoptionRequestedSponsor)) => {
            (Related(S::AdoptionDeniedSponsor), PetEffect::Keep)
        }
        (SponsorshipOp::FinalizeAdoption, Related(S::Adopted)) => {
            (NoRelation, PetEffect::DeletePet)
        }
        _ => {
            return Err(DomainError::InvalidTransition {
                operation: Operation::Sponsorship(op),
                current: TransitionState::Relation(current),
            });
        }
    };

    Ok(next)
}

/// Records resulting from one lifecycle transition, ready to be persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct SponsorshipChange {
    pub from: RelationState,
    pub to: RelationState,
    pub relations: UserPetRelations,
    pub pet: PetWrite,
}

/// Applies `op` to the decoded relation list of a user and to the pet.
pub fn apply(
    op: SponsorshipOp,
    relations: &UserPetRelations,
    pet: &Pet,
    today: NaiveDate,
) -> Result<SponsorshipChange, DomainError> {
    let from = relations.state_of(&pet.id);
    let (to, effect) = next_state(op, from)?;

    let mut new_relations = relations.clone();
    match to {
        RelationState::Related(status) => new_relations.upsert(&pet.id, status),
        RelationState::None => {
            new_relations.remove(&pet.id);
        }
    }

    let pet_write = match effect {
        PetEffect::Keep => PetWrite::Unchanged,
        PetEffect::AppendHistory(event) => {
            let mut pet = pet.clone();
            pet.historic.append(today, event);
            PetWrite::Update(pet)
        }
        PetEffect::MarkFinalizing => PetWrite::Update(Pet {
            status: PetStatus::Finalizing,
            ..pet.clone()
        }),
        PetEffect::DeletePet => PetWrite::Delete,
    };

    Ok(SponsorshipChange {
        from,
        to,
        relations: new_relations,
        pet: pet_write,
    })
}

/// Whole calendar days since the most recent sponsorship start, `None` when
/// the pet was never sponsored.
pub fn sponsorship_duration_days(history: &PetHistory, today: NaiveDate) -> Option<i64> {
    history
        .last_sponsored_on()
        .map(|started_on| (today - started_on).num_days().abs())
}

/// Sponsors and sponsors waiting on an adoption decision.
pub fn is_active_sponsor(status: RelationStatus) -> bool {
    matches!(
        status,
        RelationStatus::Sponsor | RelationStatus::AdoptionRequestedSponsor
    )
}

/// A relation waiting for a staff decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaffRequest {
    pub user_id: String,
    pub pet_id: PetId,
    pub status: RelationStatus,
}

/// Staff work queue: pending sponsorship, unsponsor and adoption requests plus
/// accepted adoptions waiting to be finalized, in user then relation order.
pub fn pending_staff_requests(users: &[User]) -> Vec<StaffRequest> {
    users
        .iter()
        .flat_map(|user| {
            user.pets
                .iter()
                .filter(|relation| {
                    matches!(
                        relation.status,
                        RelationStatus::Requested
                            | RelationStatus::UnsponsorRequested
                            | RelationStatus::AdoptionRequestedNew
                            | RelationStatus::AdoptionRequestedSponsor
                            | RelationStatus::Adopted
                    )
                })
                .map(|relation| StaffRequest {
                    user_id: user.id.clone(),
                    pet_id: relation.pet_id.clone(),
                    status: relation.status,
                })
        })
        .collect()
}

/// Loads both records, applies `op` and commits the result as one
/// compare-and-swap unit. Returns the pet as it was read alongside the change.
async fn try_transition(
    op: SponsorshipOp,
    user_id: &str,
    pet_id: &PetId,
    today: NaiveDate,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<(SponsorshipChange, Pet)> {
    let user = repo
        .get_user_app(user_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
    let pet = repo
        .get_pet(pet_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("pet {pet_id}")))?;

    let change = apply(op, &user.pets, &pet, today)?;

    repo.commit_sponsorship_change(&user, &pet, &change.relations, &change.pet)
        .await?;

    Ok((change, pet))
}

/// Runs one lifecycle operation for `(user_id, pet_id)` against the store.
///
/// A lost compare-and-swap is retried once after re-reading both records.
/// When an adoption is finalized the pet picture is deleted from storage
/// after the records are gone.
///
/// # Errors
/// - `NotFound` if the user or the pet does not exist
/// - `InvalidTransition` if `op` is not allowed from the current state
/// - `HistoryParseError`/`RelationParseError` if stored data is malformed
/// - `ConcurrentModification` if the retry also lost the race
pub async fn run_transition(
    op: SponsorshipOp,
    user_id: &str,
    pet_id: &PetId,
    repo: &repo::ImplAppRepo,
    storage_service: &services::ImplStorageService,
) -> anyhow::Result<SponsorshipChange> {
    let _span = logfire::span!("sponsorship_transition").entered();
    let today = Local::now().date_naive();

    let (change, read_pet) =
        super::retry_on_conflict(|| try_transition(op, user_id, pet_id, today, repo)).await?;

    info!(
        "{op} for user {user_id} and pet {pet_id}: {} -> {}",
        change.from, change.to
    );
    metric::incr_sponsorship_action_statds(&op.to_string());

    if change.pet == PetWrite::Delete {
        if let Some(image) = &read_pet.image {
            storage_service
                .delete_pic(image)
                .await
                .map_err(|e| {
                    warn!("pet {pet_id} was removed but its picture {image} was not: {e}");
                    e
                })
                .with_context(|| format!("pet {pet_id} removed but picture {image} remains"))?;
        }
    }

    Ok(change)
}

/// What the request screens show about one user/pet pairing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SponsorshipSummary {
    pub status: Option<RelationStatus>,
    /// Whether new sponsorship or adoption requests make sense for the pet.
    pub pet_available: bool,
    pub is_active_sponsor: bool,
    pub duration_days: Option<i64>,
}

pub async fn get_sponsorship_summary(
    user_id: &str,
    pet_id: &PetId,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<SponsorshipSummary> {
    let user = repo
        .get_user_app(user_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("user {user_id}")))?;
    let pet = repo
        .get_pet(pet_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("pet {pet_id}")))?;

    let status = user.pets.get(pet_id);
    let active = status.is_some_and(is_active_sponsor);

    Ok(SponsorshipSummary {
        status,
        pet_available: pet.status.is_available(),
        is_active_sponsor: active,
        duration_days: active
            .then(|| sponsorship_duration_days(&pet.historic, Local::now().date_naive()))
            .flatten(),
    })
}

pub async fn get_pending_staff_requests(
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<Vec<StaffRequest>> {
    let users = repo.get_all_user_apps().await?;
    Ok(pending_staff_requests(&users))
}
