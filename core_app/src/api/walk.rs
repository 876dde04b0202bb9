//! # Walk API Module
//!
//! Scheduling of pet walks: conflict-checked booking proposals, the walk
//! status lifecycle and the listings used by users and staff.

use crate::{
    errors::{DomainError, Operation, TransitionState},
    metric,
    models::walk::{BookingRequest, WalkBooking, WalkStatus},
    repo,
};
use chrono::{NaiveDate, TimeDelta};
use derive_more::Display;
use log::info;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkAction {
    #[display("propose walk")]
    Propose,
    #[display("confirm walk")]
    Confirm,
    #[display("deny walk")]
    Deny,
    #[display("cancel walk")]
    Cancel,
    #[display("complete walk")]
    Complete,
    #[display("remove walk")]
    Remove,
}

/// Which bookings compete for the same time slot.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictScope {
    /// Only walks of the same pet collide.
    #[default]
    #[display("per_pet")]
    PerPet,
    /// Every walk of the shelter collides.
    #[display("global")]
    Global,
}

impl FromStr for ConflictScope {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "per_pet" => Ok(Self::PerPet),
            "global" => Ok(Self::Global),
            other => anyhow::bail!("unknown walk conflict scope '{other}'"),
        }
    }
}

/// Checks `request` against the bookings of its day and builds the new
/// `Requested` booking.
///
/// Only requested and confirmed walks hold a slot. Intervals are half-open, so
/// a walk may start exactly when another one ends.
///
/// # Arguments
/// * `request` - Date, start time and duration asked for by the user
/// * `existing` - Bookings already stored; other dates are ignored
/// * `scope` - Whether only walks of the same pet collide
///
/// # Returns
/// The booking to persist, or `SchedulingConflict` naming the first colliding
/// booking.
pub fn propose_booking(
    request: &BookingRequest,
    existing: &[WalkBooking],
    scope: ConflictScope,
) -> Result<WalkBooking, DomainError> {
    if request.duration_minutes == 0 {
        return Err(DomainError::InvalidBooking {
            reason: "walk duration must be at least one minute".into(),
        });
    }

    let starts_at = request.starts_at();
    let ends_at = starts_at + TimeDelta::minutes(i64::from(request.duration_minutes));

    let conflict = existing
        .iter()
        .filter(|booking| booking.date() == request.date && booking.status.is_active())
        .filter(|booking| scope == ConflictScope::Global || booking.pet_id == request.pet_id)
        .find(|booking| starts_at < booking.ends_at() && booking.scheduled_at < ends_at);

    if let Some(booking) = conflict {
        return Err(DomainError::SchedulingConflict {
            conflicting_id: booking.id.clone(),
            conflicting_start: booking.scheduled_at,
            conflicting_minutes: booking.duration_minutes,
        });
    }

    Ok(WalkBooking {
        id: Uuid::new_v4().to_string(),
        user_id: request.user_id.clone(),
        pet_id: request.pet_id.clone(),
        scheduled_at: starts_at,
        duration_minutes: request.duration_minutes,
        status: WalkStatus::Requested,
    })
}

fn invalid_walk_transition(action: WalkAction, current: WalkStatus) -> DomainError {
    DomainError::InvalidTransition {
        operation: Operation::Walk(action),
        current: TransitionState::Walk(current),
    }
}

/// Status a walk moves to when `action` is applied to it.
pub fn next_walk_status(
    action: WalkAction,
    current: WalkStatus,
) -> Result<WalkStatus, DomainError> {
    match (action, current) {
        (WalkAction::Confirm, WalkStatus::Requested) => Ok(WalkStatus::Confirmed),
        (WalkAction::Deny, WalkStatus::Requested) => Ok(WalkStatus::Denied),
        (WalkAction::Cancel, WalkStatus::Requested | WalkStatus::Confirmed) => {
            Ok(WalkStatus::Cancelled)
        }
        (WalkAction::Complete, WalkStatus::Confirmed) => Ok(WalkStatus::Completed),
        _ => Err(invalid_walk_transition(action, current)),
    }
}

fn transition(booking: &WalkBooking, action: WalkAction) -> Result<WalkBooking, DomainError> {
    Ok(WalkBooking {
        status: next_walk_status(action, booking.status)?,
        ..booking.clone()
    })
}

pub fn confirm(booking: &WalkBooking) -> Result<WalkBooking, DomainError> {
    transition(booking, WalkAction::Confirm)
}

pub fn deny(booking: &WalkBooking) -> Result<WalkBooking, DomainError> {
    transition(booking, WalkAction::Deny)
}

pub fn cancel(booking: &WalkBooking) -> Result<WalkBooking, DomainError> {
    transition(booking, WalkAction::Cancel)
}

pub fn complete(booking: &WalkBooking) -> Result<WalkBooking, DomainError> {
    transition(booking, WalkAction::Complete)
}

/// Staff may only remove denied or cancelled walks. Completed walks stay as
/// the record of what happened.
pub fn ensure_removable(booking: &WalkBooking) -> Result<(), DomainError> {
    if !matches!(booking.status, WalkStatus::Denied | WalkStatus::Cancelled) {
        return Err(invalid_walk_transition(WalkAction::Remove, booking.status));
    }
    Ok(())
}

/// Bookings on `today` in chronological order.
pub fn todays_bookings(bookings: &[WalkBooking], today: NaiveDate) -> Vec<WalkBooking> {
    let mut todays = bookings
        .iter()
        .filter(|booking| booking.date() == today)
        .cloned()
        .collect::<Vec<_>>();
    todays.sort_by_key(|booking| booking.scheduled_at);
    todays
}

/// Requested and cancelled walks for staff review: cancelled ones first, then
/// chronological.
pub fn pending_requests(bookings: &[WalkBooking]) -> Vec<WalkBooking> {
    let mut pending = bookings
        .iter()
        .filter(|booking| matches!(booking.status, WalkStatus::Requested | WalkStatus::Cancelled))
        .cloned()
        .collect::<Vec<_>>();
    pending.sort_by(|a, b| {
        b.status
            .cmp(&a.status)
            .then(a.scheduled_at.cmp(&b.scheduled_at))
    });
    pending
}

/// Every booking of `user_id`, most recent first.
pub fn user_bookings(bookings: &[WalkBooking], user_id: &str) -> Vec<WalkBooking> {
    let mut owned = bookings
        .iter()
        .filter(|booking| booking.user_id == user_id)
        .cloned()
        .collect::<Vec<_>>();
    owned.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
    owned
}

async fn try_schedule(
    request: &BookingRequest,
    scope: ConflictScope,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<WalkBooking> {
    let day = repo.get_walks_on(request.date).await?;
    let booking = propose_booking(request, &day, scope)?;
    repo.insert_walk(&booking, &day).await?;
    Ok(booking)
}

/// Books a walk, re-checking conflicts once if another booking landed on the
/// same day in the meantime.
pub async fn schedule_walk(
    request: &BookingRequest,
    scope: ConflictScope,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<WalkBooking> {
    let _span = logfire::span!("schedule_walk").entered();

    let booking = super::retry_on_conflict(|| try_schedule(request, scope, repo)).await?;

    info!(
        "walk {} booked for pet {} at {}",
        booking.id, booking.pet_id, booking.scheduled_at
    );
    metric::incr_walk_action_statds(&WalkAction::Propose.to_string());
    Ok(booking)
}

async fn load_walk(walk_id: &str, repo: &repo::ImplAppRepo) -> anyhow::Result<WalkBooking> {
    Ok(repo
        .get_walk(walk_id)
        .await?
        .ok_or_else(|| DomainError::not_found(format!("walk {walk_id}")))?)
}

async fn try_change_status(
    walk_id: &str,
    action: WalkAction,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<WalkBooking> {
    let booking = load_walk(walk_id, repo).await?;
    let updated = transition(&booking, action)?;
    repo.update_walk_status(walk_id, booking.status, updated.status)
        .await?;
    Ok(updated)
}

/// Applies a status action (confirm, deny, cancel or complete) to a stored walk.
pub async fn change_walk_status(
    walk_id: &str,
    action: WalkAction,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<WalkBooking> {
    let _span = logfire::span!("change_walk_status").entered();

    let updated = super::retry_on_conflict(|| try_change_status(walk_id, action, repo)).await?;

    info!("{action} {walk_id}: now {}", updated.status);
    metric::incr_walk_action_statds(&action.to_string());
    Ok(updated)
}

async fn try_remove(walk_id: &str, repo: &repo::ImplAppRepo) -> anyhow::Result<()> {
    let booking = load_walk(walk_id, repo).await?;
    ensure_removable(&booking)?;
    repo.delete_walk(walk_id, booking.status).await
}

pub async fn remove_walk(walk_id: &str, repo: &repo::ImplAppRepo) -> anyhow::Result<()> {
    let _span = logfire::span!("remove_walk").entered();

    super::retry_on_conflict(|| try_remove(walk_id, repo)).await?;

    info!("walk {walk_id} removed");
    metric::incr_walk_action_statds(&WalkAction::Remove.to_string());
    Ok(())
}

pub async fn get_todays_walks(
    today: NaiveDate,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<Vec<WalkBooking>> {
    Ok(todays_bookings(&repo.get_walks_on(today).await?, today))
}

pub async fn get_pending_walk_requests(
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<Vec<WalkBooking>> {
    Ok(pending_requests(&repo.get_all_walks().await?))
}

pub async fn get_user_walks(
    user_id: &str,
    repo: &repo::ImplAppRepo,
) -> anyhow::Result<Vec<WalkBooking>> {
    Ok(user_bookings(&repo.get_all_walks().await?, user_id))
}
