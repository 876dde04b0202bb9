use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use derive_more::Display;
use serde::{Deserialize, Serialize};

use super::pet::PetId;
use crate::{consts, errors::DomainError};

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkStatus {
    #[display("requested")]
    Requested,
    #[display("confirmed")]
    Confirmed,
    #[display("denied")]
    Denied,
    #[display("cancelled")]
    Cancelled,
    #[display("completed")]
    Completed,
}

impl WalkStatus {
    pub fn code(&self) -> i64 {
        match self {
            Self::Requested => 0,
            Self::Confirmed => 1,
            Self::Denied => 2,
            Self::Cancelled => 3,
            Self::Completed => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => Self::Requested,
            1 => Self::Confirmed,
            2 => Self::Denied,
            3 => Self::Cancelled,
            4 => Self::Completed,
            _ => return None,
        })
    }

    /// Requested and confirmed walks hold their time slot.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Requested | Self::Confirmed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkBooking {
    pub id: String,
    pub user_id: String,
    pub pet_id: PetId,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: WalkStatus,
}

impl WalkBooking {
    pub fn ends_at(&self) -> NaiveDateTime {
        self.scheduled_at + TimeDelta::minutes(i64::from(self.duration_minutes))
    }

    pub fn date(&self) -> NaiveDate {
        self.scheduled_at.date()
    }
}

/// A user's request for a walk slot, before conflict checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub user_id: String,
    pub pet_id: PetId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
}

impl BookingRequest {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }
}

/// Parses the legacy `DD/MM/YYYY HH:MM` encoding.
pub fn parse_scheduled_at(value: &str) -> Result<NaiveDateTime, DomainError> {
    NaiveDateTime::parse_from_str(value, consts::SCHEDULED_AT_FORMAT).map_err(|_| {
        DomainError::ScheduleParseError {
            value: value.to_string(),
        }
    })
}

pub fn format_scheduled_at(value: &NaiveDateTime) -> String {
    value.format(consts::SCHEDULED_AT_FORMAT).to_string()
}
