use crate::model::{Group, Id, NewGroup, NewPet, NewTrait, Pet, PetFilter, PetPage, PetPatch, Trait};
use anyhow::Result;

/// Groups are reference rows: created on demand, never updated or deleted here.
#[async_trait::async_trait]
pub trait GroupStore: Send + Sync {
    /// Return the group with this exact `scientific_name`, creating it if absent.
    /// Atomic: concurrent callers with the same name observe the same row.
    async fn get_or_create_group(&self, group: &NewGroup) -> Result<Group>;
    async fn list_groups(&self) -> Result<Vec<Group>>;
}

#[async_trait::async_trait]
pub trait TraitStore: Send + Sync {
    /// Return the trait whose name matches case-insensitively, creating it if absent.
    /// An existing row keeps its stored spelling.
    async fn get_or_create_trait(&self, new_trait: &NewTrait) -> Result<Trait>;
    async fn list_traits(&self) -> Result<Vec<Trait>>;
}

#[async_trait::async_trait]
pub trait PetStore: Send + Sync {
    /// Resolve the group and traits, insert the pet and its associations as one unit.
    async fn create_pet(&self, pet: NewPet) -> Result<Pet>;
    async fn get_pet(&self, id: Id) -> Result<Option<Pet>>;
    /// Pets ordered by id ascending, each at most once.
    async fn list_pets(&self, filter: &PetFilter) -> Result<PetPage>;
    /// Apply a partial update. A present trait list replaces the whole association set.
    /// Returns `None` when the pet does not exist.
    async fn update_pet(&self, id: Id, patch: PetPatch) -> Result<Option<Pet>>;
    /// Remove the pet and its trait associations. Returns false when nothing was deleted.
    async fn delete_pet(&self, id: Id) -> Result<bool>;
}

pub trait Store: GroupStore + TraitStore + PetStore + Send + Sync {}
