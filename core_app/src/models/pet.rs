use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::{consts, errors::DomainError};

/// Opaque pet identifier.
///
/// Never empty and never contains the list delimiters, so it can be embedded
/// in the persisted `"petId,status;..."` relation list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Display, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PetId(String);

impl PetId {
    pub fn parse(value: &str) -> Result<Self, DomainError> {
        let invalid = |reason: &str| DomainError::InvalidPetId {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        if value.is_empty() {
            return Err(invalid("cannot be empty"));
        }
        if value.contains([consts::LIST_SEPARATOR, consts::FIELD_SEPARATOR]) {
            return Err(invalid("contains a list delimiter"));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PetId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PetId> for String {
    fn from(value: PetId) -> Self {
        value.0
    }
}

/// General availability of a pet, independent of any user's relation to it.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetStatus {
    #[default]
    #[display("available")]
    Available,
    #[display("unavailable")]
    Unavailable,
    /// An adoption was accepted and waits to be finalized.
    #[display("finalizing")]
    Finalizing,
}

impl PetStatus {
    /// Legacy codes: 0 is available, 6 is the finalizing marker, anything else
    /// means the pet is otherwise engaged.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Available,
            6 => Self::Finalizing,
            _ => Self::Unavailable,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Available => 0,
            Self::Unavailable => 1,
            Self::Finalizing => 6,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryEvent {
    /// Sponsorship started.
    #[display("pad")]
    #[serde(rename = "pad")]
    Sponsored,
    /// Sponsorship ended.
    #[display("des")]
    #[serde(rename = "des")]
    Unsponsored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub date: NaiveDate,
    pub event: HistoryEvent,
}

fn history_err(entry: &str, reason: impl Into<String>) -> DomainError {
    DomainError::HistoryParseError {
        entry: entry.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for HistoryEntry {
    type Err = DomainError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let mut fields = entry.split(consts::FIELD_SEPARATOR);
        let (Some(date), Some(code), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(history_err(
                entry,
                "expected exactly two comma-separated fields",
            ));
        };

        let date = NaiveDate::parse_from_str(date, consts::HISTORY_DATE_FORMAT)
            .map_err(|e| history_err(entry, format!("invalid date: {e}")))?;

        let event = match code {
            consts::HISTORY_CODE_SPONSORED => HistoryEvent::Sponsored,
            consts::HISTORY_CODE_UNSPONSORED => HistoryEvent::Unsponsored,
            other => return Err(history_err(entry, format!("unknown event code '{other}'"))),
        };

        Ok(Self { date, event })
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.date.format(consts::HISTORY_DATE_FORMAT),
            consts::FIELD_SEPARATOR,
            self.event
        )
    }
}

/// Append-only sponsorship history of a pet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetHistory(Vec<HistoryEntry>);

impl PetHistory {
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn append(&mut self, date: NaiveDate, event: HistoryEvent) {
        self.0.push(HistoryEntry { date, event });
    }

    /// Date of the most recent sponsorship start.
    pub fn last_sponsored_on(&self) -> Option<NaiveDate> {
        self.0
            .iter()
            .rev()
            .find(|entry| entry.event == HistoryEvent::Sponsored)
            .map(|entry| entry.date)
    }
}

impl FromStr for PetHistory {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        raw.split(consts::LIST_SEPARATOR)
            .map(str::parse::<HistoryEntry>)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl fmt::Display for PetHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, entry) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", consts::LIST_SEPARATOR)?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: PetId,
    pub name: String,
    /// Storage path of the pet picture.
    pub image: Option<String>,
    pub status: PetStatus,
    pub historic: PetHistory,
}

/// What a lifecycle transition does to the stored pet record.
#[derive(Debug, Clone, PartialEq)]
pub enum PetWrite {
    Unchanged,
    Update(Pet),
    Delete,
}
