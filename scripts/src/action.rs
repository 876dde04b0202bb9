use anyhow::Context;
use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use pet_sponsor::{
    api::{
        sponsorship::{self, SponsorshipOp},
        walk::{self, WalkAction},
    },
    config,
    models::{pet::PetId, user_app::User, walk::BookingRequest},
    repo::{self, sqlite::SqlxSqliteRepo},
    services::{self, storage::StorageHandler},
};
use serde::Serialize;

use crate::utils;

#[derive(Args, Debug, Clone)]
pub struct RunMigrationsArgs {
    #[arg(short, long)]
    file: String,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SponsorshipOpArg {
    RequestSponsorship,
    AcceptSponsorship,
    DenySponsorship,
    RequestUnsponsor,
    AcceptUnsponsor,
    RequestAdoption,
    AcceptAdoption,
    DenyAdoption,
    FinalizeAdoption,
}

impl From<SponsorshipOpArg> for SponsorshipOp {
    fn from(value: SponsorshipOpArg) -> Self {
        match value {
            SponsorshipOpArg::RequestSponsorship => Self::RequestSponsorship,
            SponsorshipOpArg::AcceptSponsorship => Self::AcceptSponsorship,
            SponsorshipOpArg::DenySponsorship => Self::DenySponsorship,
            SponsorshipOpArg::RequestUnsponsor => Self::RequestUnsponsor,
            SponsorshipOpArg::AcceptUnsponsor => Self::AcceptUnsponsor,
            SponsorshipOpArg::RequestAdoption => Self::RequestAdoption,
            SponsorshipOpArg::AcceptAdoption => Self::AcceptAdoption,
            SponsorshipOpArg::DenyAdoption => Self::DenyAdoption,
            SponsorshipOpArg::FinalizeAdoption => Self::FinalizeAdoption,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkActionArg {
    Confirm,
    Deny,
    Cancel,
    Complete,
}

impl From<WalkActionArg> for WalkAction {
    fn from(value: WalkActionArg) -> Self {
        match value {
            WalkActionArg::Confirm => Self::Confirm,
            WalkActionArg::Deny => Self::Deny,
            WalkActionArg::Cancel => Self::Cancel,
            WalkActionArg::Complete => Self::Complete,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AddUserArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    email: String,
}

#[derive(Args, Debug, Clone)]
pub struct AddPetArgs {
    #[arg(long)]
    id: String,
    #[arg(long)]
    name: String,
    /// Storage path of the pet picture
    #[arg(long)]
    image: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct SponsorshipArgs {
    #[arg(value_enum)]
    op: SponsorshipOpArg,
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    pet_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ScheduleWalkArgs {
    #[arg(long)]
    user_id: String,
    #[arg(long)]
    pet_id: String,
    /// Walk date as DD/MM/YYYY
    #[arg(long)]
    date: String,
    /// Start time as HH:MM
    #[arg(long)]
    time: String,
    #[arg(long, default_value_t = 30)]
    minutes: u32,
}

#[derive(Args, Debug, Clone)]
pub struct WalkStatusArgs {
    #[arg(value_enum)]
    action: WalkActionArg,
    #[arg(long)]
    walk_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct WalkIdArgs {
    #[arg(long)]
    walk_id: String,
}

#[derive(Args, Debug, Clone)]
pub struct UserIdArgs {
    #[arg(long)]
    user_id: String,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Action {
    RunMigrations(RunMigrationsArgs),
    AddUser(AddUserArgs),
    AddPet(AddPetArgs),
    /// Applies one sponsorship or adoption operation to a user/pet pair
    Sponsorship(SponsorshipArgs),
    /// Lists requests waiting for a staff decision
    PendingSponsorships,
    ScheduleWalk(ScheduleWalkArgs),
    WalkStatus(WalkStatusArgs),
    RemoveWalk(WalkIdArgs),
    TodaysWalks,
    PendingWalks,
    UserWalks(UserIdArgs),
}

/// Staff console for the pet sponsor database
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct AppArgs {
    #[command(subcommand)]
    pub action: Action,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

impl AppArgs {
    pub async fn run(&self) -> anyhow::Result<()> {
        let app_config = &*config::APP_CONFIG;
        let db_pool = pet_sponsor::utils::setup_sqlite_db_pool(app_config.is_prod()).await?;

        if let Action::RunMigrations(RunMigrationsArgs { file }) = &self.action {
            return utils::run_migrations(&db_pool, file).await;
        }

        let repo: repo::ImplAppRepo = Box::new(SqlxSqliteRepo { db_pool });

        match &self.action {
            Action::RunMigrations(_) => Ok(()),
            Action::AddUser(AddUserArgs { id, email }) => {
                repo.save_user_app(&User::create_default_from_email(id, email))
                    .await
            }
            Action::AddPet(AddPetArgs { id, name, image }) => {
                repo.save_pet(&pet_sponsor::models::pet::Pet {
                    id: PetId::parse(id)?,
                    name: name.clone(),
                    image: image.clone(),
                    status: Default::default(),
                    historic: Default::default(),
                })
                .await
            }
            Action::Sponsorship(SponsorshipArgs {
                op,
                user_id,
                pet_id,
            }) => {
                let storage_service: services::ImplStorageService =
                    Box::new(StorageHandler::from_config(app_config).await);
                let change = sponsorship::run_transition(
                    (*op).into(),
                    user_id,
                    &PetId::parse(pet_id)?,
                    &repo,
                    &storage_service,
                )
                .await?;
                println!("{} -> {}", change.from, change.to);
                Ok(())
            }
            Action::PendingSponsorships => {
                print_json(&sponsorship::get_pending_staff_requests(&repo).await?)
            }
            Action::ScheduleWalk(args) => {
                let request = BookingRequest {
                    user_id: args.user_id.clone(),
                    pet_id: PetId::parse(&args.pet_id)?,
                    date: NaiveDate::parse_from_str(
                        &args.date,
                        pet_sponsor::consts::HISTORY_DATE_FORMAT,
                    )
                    .with_context(|| format!("invalid walk date '{}'", args.date))?,
                    time: NaiveTime::parse_from_str(&args.time, "%H:%M")
                        .with_context(|| format!("invalid walk time '{}'", args.time))?,
                    duration_minutes: args.minutes,
                };
                let booking =
                    walk::schedule_walk(&request, app_config.conflict_scope()?, &repo).await?;
                print_json(&booking)
            }
            Action::WalkStatus(WalkStatusArgs { action, walk_id }) => {
                print_json(&walk::change_walk_status(walk_id, (*action).into(), &repo).await?)
            }
            Action::RemoveWalk(WalkIdArgs { walk_id }) => walk::remove_walk(walk_id, &repo).await,
            Action::TodaysWalks => {
                print_json(&walk::get_todays_walks(Local::now().date_naive(), &repo).await?)
            }
            Action::PendingWalks => print_json(&walk::get_pending_walk_requests(&repo).await?),
            Action::UserWalks(UserIdArgs { user_id }) => {
                print_json(&walk::get_user_walks(user_id, &repo).await?)
            }
        }
    }
}
