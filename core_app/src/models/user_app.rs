use serde::{Deserialize, Serialize};

use super::relation::UserPetRelations;

#[derive(Serialize, Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Every pet this user ever interacted with, persisted as `"petId,status;..."`.
    pub pets: UserPetRelations,
}

impl User {
    pub fn create_default_from_email(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            pets: UserPetRelations::default(),
        }
    }
}
