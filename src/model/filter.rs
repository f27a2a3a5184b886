use serde::Serialize;

use crate::model::Pet;

/// Listing request handed to the store. Results are always ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PetFilter {
    /// Case-insensitive substring matched against trait names
    pub trait_name: Option<String>,
    pub limit: usize,
    pub offset: usize,
}

impl PetFilter {
    pub fn new(trait_name: Option<String>) -> Self {
        Self {
            trait_name: trait_name.filter(|name| !name.is_empty()),
            limit: usize::MAX,
            offset: 0,
        }
    }

    pub fn window(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }

    /// Lowercased needle, if filtering by trait
    pub fn needle(&self) -> Option<String> {
        self.trait_name.as_ref().map(|name| name.to_lowercase())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PetPage {
    /// Number of matching pets before windowing
    pub total: usize,
    pub pets: Vec<Pet>,
}
