use serde::{Deserialize, Serialize};

pub type Id = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "Male")]
    Male,
    #[serde(rename = "Female")]
    Female,
    #[default]
    #[serde(rename = "Not Informed")]
    NotInformed,
}

impl Sex {
    pub const CHOICES: [Sex; 3] = [Sex::Male, Sex::Female, Sex::NotInformed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::NotInformed => "Not Informed",
        }
    }

    /// Exact, case-sensitive match against the stored labels
    pub fn parse(value: &str) -> Option<Self> {
        Self::CHOICES.into_iter().find(|sex| sex.as_str() == value)
    }
}
