use crate::{errors::DomainError, models};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::{AppRepo, sqlite_queries};

#[derive(Clone)]
pub struct SqlxSqliteRepo {
    pub db_pool: SqlitePool,
}

#[derive(FromRow)]
struct UserAppRow {
    id: String,
    email: String,
    pets: Option<String>,
}

impl TryFrom<UserAppRow> for models::user_app::User {
    type Error = DomainError;

    fn try_from(row: UserAppRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            email: row.email,
            pets: row.pets.unwrap_or_default().parse()?,
        })
    }
}

#[derive(FromRow)]
struct PetRow {
    id: String,
    name: String,
    image: Option<String>,
    status: i64,
    historic: Option<String>,
}

impl TryFrom<PetRow> for models::pet::Pet {
    type Error = DomainError;

    fn try_from(row: PetRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: models::pet::PetId::parse(&row.id)?,
            name: row.name,
            image: row.image,
            status: models::pet::PetStatus::from_code(row.status),
            historic: row.historic.unwrap_or_default().parse()?,
        })
    }
}

#[derive(FromRow)]
struct WalkRow {
    id: String,
    user_id: String,
    pet_id: String,
    scheduled_at: String,
    duration_minutes: i64,
    status: i64,
}

impl TryFrom<WalkRow> for models::walk::WalkBooking {
    type Error = DomainError;

    fn try_from(row: WalkRow) -> Result<Self, Self::Error> {
        let duration_minutes = u32::try_from(row.duration_minutes)
            .ok()
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| DomainError::InvalidBooking {
                reason: format!("walk {} has duration {}", row.id, row.duration_minutes),
            })?;
        let status = models::walk::WalkStatus::from_code(row.status).ok_or_else(|| {
            DomainError::InvalidBooking {
                reason: format!("walk {} has unknown status {}", row.id, row.status),
            }
        })?;

        Ok(Self {
            pet_id: models::pet::PetId::parse(&row.pet_id)?,
            scheduled_at: models::walk::parse_scheduled_at(&row.scheduled_at)?,
            id: row.id,
            user_id: row.user_id,
            duration_minutes,
            status,
        })
    }
}

fn decode_walks(rows: Vec<WalkRow>) -> anyhow::Result<Vec<models::walk::WalkBooking>> {
    Ok(rows
        .into_iter()
        .map(models::walk::WalkBooking::try_from)
        .collect::<Result<Vec<_>, _>>()?)
}

fn day_fingerprint(walks: &[models::walk::WalkBooking]) -> Vec<(String, i64)> {
    let mut fingerprint = walks
        .iter()
        .map(|walk| (walk.id.clone(), walk.status.code()))
        .collect::<Vec<_>>();
    fingerprint.sort();
    fingerprint
}

/// Raw `pets` column of the user, provided it still decodes to what was read.
///
/// Stored lists written by older clients may use non-canonical spellings
/// (`"p1,00"`), so the comparison is made on decoded values and the write is
/// then conditioned on the raw text.
async fn stored_user_pets(
    conn: &mut SqliteConnection,
    read_user: &models::user_app::User,
) -> anyhow::Result<String> {
    let row = sqlx::query_as::<_, UserAppRow>(sqlite_queries::QUERY_GET_USER_APP_BY_ID)
        .bind(&read_user.id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DomainError::concurrent(format!("user {}", read_user.id)))?;
    let raw_pets = row.pets.clone().unwrap_or_default();

    if models::user_app::User::try_from(row)?.pets != read_user.pets {
        return Err(DomainError::concurrent(format!("user {}", read_user.id)).into());
    }
    Ok(raw_pets)
}

/// Raw `historic` and `status` columns of the pet, provided they still decode
/// to what was read.
async fn stored_pet_columns(
    conn: &mut SqliteConnection,
    read_pet: &models::pet::Pet,
) -> anyhow::Result<(String, i64)> {
    let row = sqlx::query_as::<_, PetRow>(sqlite_queries::QUERY_GET_PET_BY_ID)
        .bind(read_pet.id.as_str())
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DomainError::concurrent(format!("pet {}", read_pet.id)))?;
    let columns = (row.historic.clone().unwrap_or_default(), row.status);

    let stored = models::pet::Pet::try_from(row)?;
    if stored.historic != read_pet.historic || stored.status != read_pet.status {
        return Err(DomainError::concurrent(format!("pet {}", read_pet.id)).into());
    }
    Ok(columns)
}

#[async_trait]
impl AppRepo for SqlxSqliteRepo {
    async fn get_user_app(&self, user_id: &str) -> anyhow::Result<Option<models::user_app::User>> {
        let row = sqlx::query_as::<_, UserAppRow>(sqlite_queries::QUERY_GET_USER_APP_BY_ID)
            .bind(user_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.map(models::user_app::User::try_from).transpose()?)
    }

    async fn get_all_user_apps(&self) -> anyhow::Result<Vec<models::user_app::User>> {
        Ok(
            sqlx::query_as::<_, UserAppRow>(sqlite_queries::QUERY_GET_ALL_USER_APPS)
                .fetch_all(&self.db_pool)
                .await?
                .into_iter()
                .map(models::user_app::User::try_from)
                .collect::<Result<Vec<_>, _>>()?,
        )
    }

    async fn save_user_app(&self, user: &models::user_app::User) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_USER_APP)
            .bind(&user.id)
            .bind(&user.email)
            .bind(user.pets.to_string())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn get_pet(
        &self,
        pet_id: &models::pet::PetId,
    ) -> anyhow::Result<Option<models::pet::Pet>> {
        let row = sqlx::query_as::<_, PetRow>(sqlite_queries::QUERY_GET_PET_BY_ID)
            .bind(pet_id.as_str())
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.map(models::pet::Pet::try_from).transpose()?)
    }

    async fn save_pet(&self, pet: &models::pet::Pet) -> anyhow::Result<()> {
        Ok(sqlx::query(sqlite_queries::QUERY_INSERT_PET)
            .bind(pet.id.as_str())
            .bind(&pet.name)
            .bind(&pet.image)
            .bind(pet.status.code())
            .bind(pet.historic.to_string())
            .execute(&self.db_pool)
            .await
            .map(|_| ())?)
    }

    async fn commit_sponsorship_change(
        &self,
        read_user: &models::user_app::User,
        read_pet: &models::pet::Pet,
        relations: &models::relation::UserPetRelations,
        pet_write: &models::pet::PetWrite,
    ) -> anyhow::Result<()> {
        let mut transaction = self
            .db_pool
            .begin_with(sqlite_queries::QUERY_BEGIN_IMMEDIATE)
            .await?;

        let stored_pets = stored_user_pets(&mut transaction, read_user).await?;
        let updated_users = sqlx::query(sqlite_queries::QUERY_CAS_USER_APP_PETS)
            .bind(&read_user.id)
            .bind(stored_pets)
            .bind(relations.to_string())
            .execute(&mut *transaction)
            .await?
            .rows_affected();

        if updated_users == 0 {
            return Err(DomainError::concurrent(format!("user {}", read_user.id)).into());
        }

        let touched_pets = match pet_write {
            models::pet::PetWrite::Unchanged => None,
            models::pet::PetWrite::Update(pet) => {
                let (historic, status) = stored_pet_columns(&mut transaction, read_pet).await?;
                let result = sqlx::query(sqlite_queries::QUERY_CAS_UPDATE_PET)
                    .bind(read_pet.id.as_str())
                    .bind(historic)
                    .bind(status)
                    .bind(pet.status.code())
                    .bind(pet.historic.to_string())
                    .execute(&mut *transaction)
                    .await?;
                Some(result.rows_affected())
            }
            models::pet::PetWrite::Delete => {
                let (historic, status) = stored_pet_columns(&mut transaction, read_pet).await?;
                let result = sqlx::query(sqlite_queries::QUERY_CAS_DELETE_PET)
                    .bind(read_pet.id.as_str())
                    .bind(historic)
                    .bind(status)
                    .execute(&mut *transaction)
                    .await?;
                Some(result.rows_affected())
            }
        };

        if touched_pets == Some(0) {
            return Err(DomainError::concurrent(format!("pet {}", read_pet.id)).into());
        }

        transaction.commit().await?;

        Ok(())
    }

    async fn get_walk(&self, walk_id: &str) -> anyhow::Result<Option<models::walk::WalkBooking>> {
        let row = sqlx::query_as::<_, WalkRow>(sqlite_queries::QUERY_GET_WALK_BY_ID)
            .bind(walk_id)
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(row.map(models::walk::WalkBooking::try_from).transpose()?)
    }

    async fn get_walks_on(
        &self,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<models::walk::WalkBooking>> {
        let rows = sqlx::query_as::<_, WalkRow>(sqlite_queries::QUERY_GET_WALKS_ON_DATE)
            .bind(date.format(crate::consts::HISTORY_DATE_FORMAT).to_string())
            .fetch_all(&self.db_pool)
            .await?;

        decode_walks(rows)
    }

    async fn get_all_walks(&self) -> anyhow::Result<Vec<models::walk::WalkBooking>> {
        let rows = sqlx::query_as::<_, WalkRow>(sqlite_queries::QUERY_GET_ALL_WALKS)
            .fetch_all(&self.db_pool)
            .await?;

        decode_walks(rows)
    }

    async fn insert_walk(
        &self,
        booking: &models::walk::WalkBooking,
        checked_day: &[models::walk::WalkBooking],
    ) -> anyhow::Result<()> {
        let mut transaction = self
            .db_pool
            .begin_with(sqlite_queries::QUERY_BEGIN_IMMEDIATE)
            .await?;

        let stored_day = sqlx::query_as::<_, WalkRow>(sqlite_queries::QUERY_GET_WALKS_ON_DATE)
            .bind(
                booking
                    .date()
                    .format(crate::consts::HISTORY_DATE_FORMAT)
                    .to_string(),
            )
            .fetch_all(&mut *transaction)
            .await?;
        let stored_day = decode_walks(stored_day)?;

        if day_fingerprint(&stored_day) != day_fingerprint(checked_day) {
            return Err(DomainError::concurrent(format!("walks on {}", booking.date())).into());
        }

        sqlx::query(sqlite_queries::QUERY_INSERT_WALK)
            .bind(&booking.id)
            .bind(&booking.user_id)
            .bind(booking.pet_id.as_str())
            .bind(models::walk::format_scheduled_at(&booking.scheduled_at))
            .bind(i64::from(booking.duration_minutes))
            .bind(booking.status.code())
            .execute(&mut *transaction)
            .await?;

        transaction.commit().await?;

        Ok(())
    }

    async fn update_walk_status(
        &self,
        walk_id: &str,
        expected: models::walk::WalkStatus,
        new: models::walk::WalkStatus,
    ) -> anyhow::Result<()> {
        let updated = sqlx::query(sqlite_queries::QUERY_CAS_WALK_STATUS)
            .bind(walk_id)
            .bind(expected.code())
            .bind(new.code())
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if updated == 0 {
            return Err(DomainError::concurrent(format!("walk {walk_id}")).into());
        }
        Ok(())
    }

    async fn delete_walk(
        &self,
        walk_id: &str,
        expected: models::walk::WalkStatus,
    ) -> anyhow::Result<()> {
        let deleted = sqlx::query(sqlite_queries::QUERY_CAS_DELETE_WALK)
            .bind(walk_id)
            .bind(expected.code())
            .execute(&self.db_pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(DomainError::concurrent(format!("walk {walk_id}")).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors;
    use crate::models::{
        pet::{HistoryEvent, Pet, PetHistory, PetId, PetStatus, PetWrite},
        relation::{RelationStatus, UserPetRelations},
        user_app::User,
        walk::{WalkBooking, WalkStatus},
    };
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn setup_repo() -> SqlxSqliteRepo {
        let db_pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::raw_sql(include_str!("../../../migrations/init.sql"))
            .execute(&db_pool)
            .await
            .unwrap();

        SqlxSqliteRepo { db_pool }
    }

    fn pet_id(id: &str) -> PetId {
        PetId::parse(id).unwrap()
    }

    fn test_pet(id: &str, historic: &str) -> Pet {
        Pet {
            id: pet_id(id),
            name: "Paçoca".into(),
            image: Some("pets/pacoca.jpg".into()),
            status: PetStatus::Available,
            historic: historic.parse().unwrap(),
        }
    }

    fn test_user(id: &str, pets: &str) -> User {
        User {
            id: id.into(),
            email: format!("{id}@example.com"),
            pets: pets.parse().unwrap(),
        }
    }

    fn walk(id: &str, at: &str, status: WalkStatus) -> WalkBooking {
        WalkBooking {
            id: id.into(),
            user_id: "u1".into(),
            pet_id: pet_id("p1"),
            scheduled_at: crate::models::walk::parse_scheduled_at(at).unwrap(),
            duration_minutes: 30,
            status,
        }
    }

    #[tokio::test]
    async fn test_user_and_pet_round_trip_through_sqlite() {
        let repo = setup_repo().await;
        let user = test_user("u1", "p1,1;p2,41");
        let pet = test_pet("p1", "01/02/2024,pad");

        repo.save_user_app(&user).await.unwrap();
        repo.save_pet(&pet).await.unwrap();

        assert_eq!(repo.get_user_app("u1").await.unwrap(), Some(user));
        assert_eq!(repo.get_pet(&pet_id("p1")).await.unwrap(), Some(pet));
        assert_eq!(repo.get_user_app("missing").await.unwrap(), None);
        assert_eq!(repo.get_all_user_apps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_history_surfaces_parse_error() {
        let repo = setup_repo().await;
        sqlx::query("INSERT INTO pet(id,name,status,historic) VALUES('p1','Rex',0,'01/02/2024');")
            .execute(&repo.db_pool)
            .await
            .unwrap();

        let err = repo.get_pet(&pet_id("p1")).await.unwrap_err();

        assert!(matches!(
            errors::domain_error(&err),
            Some(DomainError::HistoryParseError { .. })
        ));
    }

    #[tokio::test]
    async fn test_commit_sponsorship_change_writes_both_records() {
        let repo = setup_repo().await;
        let user = test_user("u1", "p1,0");
        let pet = test_pet("p1", "");
        repo.save_user_app(&user).await.unwrap();
        repo.save_pet(&pet).await.unwrap();

        let mut relations = user.pets.clone();
        relations.upsert(&pet.id, RelationStatus::Sponsor);
        let mut new_pet = pet.clone();
        new_pet.historic.append(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            HistoryEvent::Sponsored,
        );

        let pet_write = PetWrite::Update(new_pet.clone());
        repo.commit_sponsorship_change(&user, &pet, &relations, &pet_write)
            .await
            .unwrap();

        assert_eq!(repo.get_user_app("u1").await.unwrap().unwrap().pets, relations);
        assert_eq!(repo.get_pet(&pet.id).await.unwrap(), Some(new_pet));
    }

    #[tokio::test]
    async fn test_commit_with_stale_pet_rolls_back_user_write() {
        let repo = setup_repo().await;
        let user = test_user("u1", "p1,0");
        let pet = test_pet("p1", "");
        repo.save_user_app(&user).await.unwrap();
        repo.save_pet(&pet).await.unwrap();

        // another staff member already appended to the history
        let stale_pet = pet.clone();
        sqlx::query("UPDATE pet SET historic='01/01/2024,pad' WHERE id='p1';")
            .execute(&repo.db_pool)
            .await
            .unwrap();

        let relations: UserPetRelations = "p1,1".parse().unwrap();
        let pet_write = PetWrite::Update(stale_pet.clone());
        let err = repo
            .commit_sponsorship_change(&user, &stale_pet, &relations, &pet_write)
            .await
            .unwrap_err();

        assert!(errors::is_concurrent_modification(&err));
        assert_eq!(
            repo.get_user_app("u1").await.unwrap().unwrap().pets.to_string(),
            "p1,0"
        );
    }

    #[tokio::test]
    async fn test_commit_with_stale_user_is_rejected() {
        let repo = setup_repo().await;
        let user = test_user("u1", "p1,0");
        let pet = test_pet("p1", "");
        repo.save_user_app(&user).await.unwrap();
        repo.save_pet(&pet).await.unwrap();

        let stale_user = test_user("u1", "");
        let relations = UserPetRelations::default();
        let err = repo
            .commit_sponsorship_change(&stale_user, &pet, &relations, &PetWrite::Unchanged)
            .await
            .unwrap_err();

        assert!(errors::is_concurrent_modification(&err));
    }

    #[tokio::test]
    async fn test_commit_can_delete_pet_with_legacy_status_code() {
        let repo = setup_repo().await;
        let user = test_user("u1", "p1,6");
        repo.save_user_app(&user).await.unwrap();
        sqlx::query("INSERT INTO pet(id,name,status,historic) VALUES('p1','Rex',51,'');")
            .execute(&repo.db_pool)
            .await
            .unwrap();
        let pet = repo.get_pet(&pet_id("p1")).await.unwrap().unwrap();
        assert_eq!(pet.status, PetStatus::Unavailable);

        let relations = UserPetRelations::default();
        repo.commit_sponsorship_change(&user, &pet, &relations, &PetWrite::Delete)
            .await
            .unwrap();

        assert_eq!(repo.get_pet(&pet_id("p1")).await.unwrap(), None);
        assert!(repo.get_user_app("u1").await.unwrap().unwrap().pets.is_empty());
    }

    #[tokio::test]
    async fn test_commit_accepts_non_canonical_stored_text() {
        let repo = setup_repo().await;
        sqlx::query("INSERT INTO user_app(id,email,pets) VALUES('u1','u1@example.com','p1,00');")
            .execute(&repo.db_pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO pet(id,name,status,historic) VALUES('p1','Rex',0,'1/2/2024,pad');")
            .execute(&repo.db_pool)
            .await
            .unwrap();
        let user = repo.get_user_app("u1").await.unwrap().unwrap();
        let pet = repo.get_pet(&pet_id("p1")).await.unwrap().unwrap();

        let mut relations = user.pets.clone();
        relations.upsert(&pet.id, RelationStatus::Sponsor);
        let mut new_pet = pet.clone();
        new_pet.historic.append(
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            HistoryEvent::Sponsored,
        );
        let pet_write = PetWrite::Update(new_pet.clone());

        repo.commit_sponsorship_change(&user, &pet, &relations, &pet_write)
            .await
            .unwrap();

        assert_eq!(repo.get_user_app("u1").await.unwrap().unwrap().pets, relations);
        assert_eq!(repo.get_pet(&pet.id).await.unwrap(), Some(new_pet));
        let raw_historic: String = sqlx::query_scalar("SELECT historic FROM pet WHERE id='p1';")
            .fetch_one(&repo.db_pool)
            .await
            .unwrap();
        assert!(raw_historic.starts_with("01/02/2024,pad;"));
    }

    #[tokio::test]
    async fn test_walks_are_stored_in_legacy_layout() {
        let repo = setup_repo().await;
        let booking = walk("w1", "05/03/2024 09:00", WalkStatus::Requested);

        repo.insert_walk(&booking, &[]).await.unwrap();

        let raw: String = sqlx::query_scalar("SELECT scheduled_at FROM walk WHERE id='w1';")
            .fetch_one(&repo.db_pool)
            .await
            .unwrap();
        assert_eq!(raw, "05/03/2024 09:00");
        assert_eq!(repo.get_walk("w1").await.unwrap(), Some(booking.clone()));
        assert_eq!(
            repo.get_walks_on(booking.date()).await.unwrap(),
            vec![booking]
        );
        assert!(
            repo.get_walks_on(NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_insert_walk_rejects_changed_day() {
        let repo = setup_repo().await;
        let first = walk("w1", "05/03/2024 09:00", WalkStatus::Requested);
        repo.insert_walk(&first, &[]).await.unwrap();

        // checked against an empty day, but w1 was booked meanwhile
        let second = walk("w2", "05/03/2024 11:00", WalkStatus::Requested);
        let err = repo.insert_walk(&second, &[]).await.unwrap_err();
        assert!(errors::is_concurrent_modification(&err));

        repo.insert_walk(&second, &[first]).await.unwrap();
        assert_eq!(repo.get_all_walks().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_racing_walk_inserts_on_same_day_let_one_writer_win() {
        let path = std::env::temp_dir().join(format!("walks-{}.db", uuid::Uuid::new_v4()));
        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let db_pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .unwrap();
        sqlx::raw_sql(include_str!("../../../migrations/init.sql"))
            .execute(&db_pool)
            .await
            .unwrap();
        let repo = SqlxSqliteRepo { db_pool };

        let morning = walk("w1", "05/03/2024 09:00", WalkStatus::Requested);
        let evening = walk("w2", "05/03/2024 18:00", WalkStatus::Requested);
        let (first, second) = tokio::join!(
            repo.insert_walk(&morning, &[]),
            repo.insert_walk(&evening, &[])
        );
        let results = [first, second];

        assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
        assert!(
            results
                .iter()
                .any(|result| result.as_ref().is_err_and(errors::is_concurrent_modification))
        );
        assert_eq!(repo.get_all_walks().await.unwrap().len(), 1);

        repo.db_pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_walk_status_compare_and_swap() {
        let repo = setup_repo().await;
        repo.insert_walk(&walk("w1", "05/03/2024 09:00", WalkStatus::Requested), &[])
            .await
            .unwrap();

        repo.update_walk_status("w1", WalkStatus::Requested, WalkStatus::Confirmed)
            .await
            .unwrap();

        let err = repo
            .update_walk_status("w1", WalkStatus::Requested, WalkStatus::Denied)
            .await
            .unwrap_err();
        assert!(errors::is_concurrent_modification(&err));

        let err = repo.delete_walk("w1", WalkStatus::Cancelled).await.unwrap_err();
        assert!(errors::is_concurrent_modification(&err));

        repo.update_walk_status("w1", WalkStatus::Confirmed, WalkStatus::Cancelled)
            .await
            .unwrap();
        repo.delete_walk("w1", WalkStatus::Cancelled).await.unwrap();
        assert_eq!(repo.get_walk("w1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_history_is_stored_as_empty_string() {
        let repo = setup_repo().await;
        repo.save_pet(&test_pet("p1", "")).await.unwrap();

        let raw: String = sqlx::query_scalar("SELECT historic FROM pet WHERE id='p1';")
            .fetch_one(&repo.db_pool)
            .await
            .unwrap();
        assert_eq!(raw, "");
        assert_eq!(
            repo.get_pet(&pet_id("p1")).await.unwrap().unwrap().historic,
            PetHistory::default()
        );
    }
}
