pub mod sqlite;
pub mod sqlite_queries;

use crate::models;
use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;

/// Persistence contract of the core.
///
/// Every write is a compare-and-swap against the record as it was read. A
/// write that lost a race fails with
/// [`DomainError::ConcurrentModification`](crate::errors::DomainError) and
/// leaves the store untouched.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AppRepo {
    async fn get_user_app(&self, user_id: &str) -> anyhow::Result<Option<models::user_app::User>>;

    async fn get_all_user_apps(&self) -> anyhow::Result<Vec<models::user_app::User>>;

    async fn save_user_app(&self, user: &models::user_app::User) -> anyhow::Result<()>;

    async fn get_pet(
        &self,
        pet_id: &models::pet::PetId,
    ) -> anyhow::Result<Option<models::pet::Pet>>;

    async fn save_pet(&self, pet: &models::pet::Pet) -> anyhow::Result<()>;

    /// Writes the new relation list of `read_user` and applies `pet_write` to
    /// `read_pet` atomically. Both records must still match what was read.
    async fn commit_sponsorship_change(
        &self,
        read_user: &models::user_app::User,
        read_pet: &models::pet::Pet,
        relations: &models::relation::UserPetRelations,
        pet_write: &models::pet::PetWrite,
    ) -> anyhow::Result<()>;

    async fn get_walk(&self, walk_id: &str) -> anyhow::Result<Option<models::walk::WalkBooking>>;

    async fn get_walks_on(&self, date: NaiveDate)
    -> anyhow::Result<Vec<models::walk::WalkBooking>>;

    async fn get_all_walks(&self) -> anyhow::Result<Vec<models::walk::WalkBooking>>;

    /// Inserts `booking` only if the bookings stored on its date still equal
    /// `checked_day` (same ids, same statuses).
    async fn insert_walk(
        &self,
        booking: &models::walk::WalkBooking,
        checked_day: &[models::walk::WalkBooking],
    ) -> anyhow::Result<()>;

    async fn update_walk_status(
        &self,
        walk_id: &str,
        expected: models::walk::WalkStatus,
        new: models::walk::WalkStatus,
    ) -> anyhow::Result<()>;

    async fn delete_walk(
        &self,
        walk_id: &str,
        expected: models::walk::WalkStatus,
    ) -> anyhow::Result<()>;
}

pub type ImplAppRepo = Box<dyn AppRepo>;
