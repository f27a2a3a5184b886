use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Id, Sex};

/// Taxonomic group, shared by every pet that references it.
/// `scientific_name` is the natural key (exact match).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: Id,
    pub scientific_name: String,
    pub created_at: DateTime<Utc>,
}

/// Trait label. `name` is the natural key, compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trait {
    pub id: Id,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    pub id: Id,
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub sex: Sex,
    pub group: Group,
    pub traits: Vec<Trait>,
}

/// Scalar columns of a pet row
#[derive(Debug, Clone, PartialEq)]
pub struct PetFields {
    pub name: String,
    pub age: i32,
    pub weight: f64,
    pub sex: Sex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGroup {
    pub scientific_name: String,
}

impl NewGroup {
    pub fn new(scientific_name: impl Into<String>) -> Self {
        Self {
            scientific_name: scientific_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrait {
    pub name: String,
}

impl NewTrait {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Key used for deduplication
    pub fn natural_key(&self) -> String {
        self.name.to_lowercase()
    }
}

/// Validated create payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewPet {
    pub fields: PetFields,
    pub group: NewGroup,
    pub traits: Vec<NewTrait>,
}

/// Validated partial update. `None` means the field was absent from the payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PetPatch {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub weight: Option<f64>,
    pub sex: Option<Sex>,
    pub group: Option<NewGroup>,
    pub traits: Option<Vec<NewTrait>>,
}

impl PetPatch {
    /// Merge the present scalar fields over `current`.
    pub fn apply(&self, current: &PetFields) -> PetFields {
        PetFields {
            name: self.name.clone().unwrap_or_else(|| current.name.clone()),
            age: self.age.unwrap_or(current.age),
            weight: self.weight.unwrap_or(current.weight),
            sex: self.sex.unwrap_or(current.sex),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == PetPatch::default()
    }
}
