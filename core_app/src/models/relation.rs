use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::pet::PetId;
use crate::{consts, errors::DomainError};

/// Where a user/pet pairing sits in the sponsorship and adoption lifecycle.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationStatus {
    #[display("sponsorship requested")]
    Requested,
    #[display("sponsor")]
    Sponsor,
    #[display("sponsorship denied")]
    Denied,
    #[display("unsponsor requested")]
    UnsponsorRequested,
    #[display("adoption requested")]
    AdoptionRequestedNew,
    #[display("adoption requested by sponsor")]
    AdoptionRequestedSponsor,
    #[display("adoption denied")]
    AdoptionDeniedNew,
    #[display("adoption denied to sponsor")]
    AdoptionDeniedSponsor,
    #[display("adopted")]
    Adopted,
}

impl RelationStatus {
    pub fn code(&self) -> u16 {
        match self {
            Self::Requested => 0,
            Self::Sponsor => 1,
            Self::Denied => 2,
            Self::UnsponsorRequested => 3,
            Self::AdoptionRequestedNew => 4,
            Self::AdoptionRequestedSponsor => 41,
            Self::AdoptionDeniedNew => 5,
            Self::AdoptionDeniedSponsor => 51,
            Self::Adopted => 6,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        Some(match code {
            0 => Self::Requested,
            1 => Self::Sponsor,
            2 => Self::Denied,
            3 => Self::UnsponsorRequested,
            4 => Self::AdoptionRequestedNew,
            41 => Self::AdoptionRequestedSponsor,
            5 => Self::AdoptionDeniedNew,
            51 => Self::AdoptionDeniedSponsor,
            6 => Self::Adopted,
            _ => return None,
        })
    }
}

/// Relation state including the absence of any relation record.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum RelationState {
    #[display("none")]
    None,
    #[display("{_0}")]
    Related(RelationStatus),
}

impl From<Option<RelationStatus>> for RelationState {
    fn from(value: Option<RelationStatus>) -> Self {
        value.map_or(Self::None, Self::Related)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPetRelation {
    pub pet_id: PetId,
    pub status: RelationStatus,
}

fn relation_err(entry: &str, reason: impl Into<String>) -> DomainError {
    DomainError::RelationParseError {
        entry: entry.to_string(),
        reason: reason.into(),
    }
}

impl FromStr for UserPetRelation {
    type Err = DomainError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let mut fields = entry.split(consts::FIELD_SEPARATOR);
        let (Some(pet_id), Some(code), None) = (fields.next(), fields.next(), fields.next()) else {
            return Err(relation_err(
                entry,
                "expected exactly two comma-separated fields",
            ));
        };

        let pet_id = PetId::parse(pet_id).map_err(|e| relation_err(entry, e.to_string()))?;
        let status = code
            .parse::<u16>()
            .ok()
            .and_then(RelationStatus::from_code)
            .ok_or_else(|| relation_err(entry, format!("unknown status code '{code}'")))?;

        Ok(Self { pet_id, status })
    }
}

impl fmt::Display for UserPetRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.pet_id,
            consts::FIELD_SEPARATOR,
            self.status.code()
        )
    }
}

/// All relations of one user, at most one per pet, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<UserPetRelation>")]
pub struct UserPetRelations(Vec<UserPetRelation>);

impl UserPetRelations {
    pub fn iter(&self) -> impl Iterator<Item = &UserPetRelation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, pet_id: &PetId) -> Option<RelationStatus> {
        self.0
            .iter()
            .find(|relation| &relation.pet_id == pet_id)
            .map(|relation| relation.status)
    }

    pub fn state_of(&self, pet_id: &PetId) -> RelationState {
        self.get(pet_id).into()
    }

    /// Replaces the status in place, or appends a new relation.
    pub fn upsert(&mut self, pet_id: &PetId, status: RelationStatus) {
        match self.0.iter_mut().find(|relation| &relation.pet_id == pet_id) {
            Some(relation) => relation.status = status,
            None => self.0.push(UserPetRelation {
                pet_id: pet_id.clone(),
                status,
            }),
        }
    }

    pub fn remove(&mut self, pet_id: &PetId) -> Option<RelationStatus> {
        let idx = self.0.iter().position(|relation| &relation.pet_id == pet_id)?;
        Some(self.0.remove(idx).status)
    }
}

impl TryFrom<Vec<UserPetRelation>> for UserPetRelations {
    type Error = DomainError;

    fn try_from(relations: Vec<UserPetRelation>) -> Result<Self, Self::Error> {
        for (idx, relation) in relations.iter().enumerate() {
            if relations[..idx].iter().any(|r| r.pet_id == relation.pet_id) {
                return Err(relation_err(
                    &relation.to_string(),
                    format!("pet {} appears more than once", relation.pet_id),
                ));
            }
        }
        Ok(Self(relations))
    }
}

impl FromStr for UserPetRelations {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.is_empty() {
            return Ok(Self::default());
        }

        raw.split(consts::LIST_SEPARATOR)
            .map(str::parse::<UserPetRelation>)
            .collect::<Result<Vec<_>, _>>()?
            .try_into()
    }
}

impl fmt::Display for UserPetRelations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, relation) in self.0.iter().enumerate() {
            if idx > 0 {
                write!(f, "{}", consts::LIST_SEPARATOR)?;
            }
            write!(f, "{relation}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const ALL_STATUSES: [RelationStatus; 9] = [
        RelationStatus::Requested,
        RelationStatus::Sponsor,
        RelationStatus::Denied,
        RelationStatus::UnsponsorRequested,
        RelationStatus::AdoptionRequestedNew,
        RelationStatus::AdoptionRequestedSponsor,
        RelationStatus::AdoptionDeniedNew,
        RelationStatus::AdoptionDeniedSponsor,
        RelationStatus::Adopted,
    ];

    fn pet(id: &str) -> PetId {
        PetId::parse(id).unwrap()
    }

    #[test]
    fn test_decode_relations() {
        let relations: UserPetRelations = "-Nabc,1;-Nxyz,41".parse().unwrap();

        assert_eq!(relations.len(), 2);
        assert_eq!(relations.get(&pet("-Nabc")), Some(RelationStatus::Sponsor));
        assert_eq!(
            relations.get(&pet("-Nxyz")),
            Some(RelationStatus::AdoptionRequestedSponsor)
        );
        assert_eq!(relations.state_of(&pet("-Nzzz")), RelationState::None);
    }

    #[test]
    fn test_round_trip_up_to_fifty_relations() {
        for count in [0usize, 1, 2, 17, 50] {
            let relations: UserPetRelations = (0..count)
                .map(|i| UserPetRelation {
                    pet_id: pet(&Uuid::new_v4().to_string()),
                    status: ALL_STATUSES[i % ALL_STATUSES.len()],
                })
                .collect::<Vec<_>>()
                .try_into()
                .unwrap();

            let decoded: UserPetRelations = relations.to_string().parse().unwrap();
            assert_eq!(decoded, relations);
        }
    }

    #[test]
    fn test_decode_rejects_malformed_entries() {
        for raw in ["-Nabc", "-Nabc,1,2", "-Nabc,7", "-Nabc,x", ",1", "-Nabc,1;"] {
            assert!(
                matches!(
                    raw.parse::<UserPetRelations>(),
                    Err(DomainError::RelationParseError { .. })
                ),
                "{raw} should not decode"
            );
        }
    }

    #[test]
    fn test_decode_rejects_duplicate_pets() {
        assert!(matches!(
            "-Nabc,1;-Nabc,3".parse::<UserPetRelations>(),
            Err(DomainError::RelationParseError { .. })
        ));
    }

    #[test]
    fn test_deserialize_rejects_duplicate_pets() {
        let duplicated = r#"[
            {"pet_id": "-Nabc", "status": "sponsor"},
            {"pet_id": "-Nabc", "status": "unsponsor_requested"}
        ]"#;
        let err = serde_json::from_str::<UserPetRelations>(duplicated).unwrap_err();
        assert!(err.to_string().contains("appears more than once"));

        let relations: UserPetRelations =
            serde_json::from_str(r#"[{"pet_id": "-Nabc", "status": "sponsor"}]"#).unwrap();
        assert_eq!(relations.to_string(), "-Nabc,1");
    }

    #[test]
    fn test_user_with_duplicated_pet_does_not_deserialize() {
        let user = r#"{
            "id": "u1",
            "email": "u1@example.com",
            "pets": [
                {"pet_id": "-Nabc", "status": "requested"},
                {"pet_id": "-Nabc", "status": "adopted"}
            ]
        }"#;

        assert!(serde_json::from_str::<crate::models::user_app::User>(user).is_err());
    }

    #[test]
    fn test_upsert_and_remove_keep_one_relation_per_pet() {
        let mut relations = UserPetRelations::default();
        let id = pet("-Nabc");

        relations.upsert(&id, RelationStatus::Requested);
        relations.upsert(&id, RelationStatus::Sponsor);
        assert_eq!(relations.len(), 1);
        assert_eq!(relations.to_string(), "-Nabc,1");

        assert_eq!(relations.remove(&id), Some(RelationStatus::Sponsor));
        assert_eq!(relations.remove(&id), None);
        assert_eq!(relations.to_string(), "");
    }

    #[test]
    fn test_status_codes_are_stable() {
        for status in ALL_STATUSES {
            assert_eq!(RelationStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(RelationStatus::from_code(7), None);
    }
}
