use anyhow::{anyhow, Result};
use chrono::Utc;
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::{
    Group, Id, NewGroup, NewPet, NewTrait, Pet, PetFields, PetFilter, PetPage, PetPatch, Trait,
};
use crate::store::traits::{GroupStore, PetStore, Store, TraitStore};

#[derive(Debug, Clone)]
struct PetRecord {
    fields: PetFields,
    group_id: Id,
    trait_ids: BTreeSet<Id>,
}

#[derive(Debug, Default)]
struct MemoryState {
    groups: BTreeMap<Id, Group>,
    traits: BTreeMap<Id, Trait>,
    pets: BTreeMap<Id, PetRecord>,
    next_group_id: Id,
    next_trait_id: Id,
    next_pet_id: Id,
}

impl MemoryState {
    fn upsert_group(&mut self, group: &NewGroup) -> Group {
        if let Some(existing) = self
            .groups
            .values()
            .find(|g| g.scientific_name == group.scientific_name)
        {
            return existing.clone();
        }

        self.next_group_id += 1;
        let created = Group {
            id: self.next_group_id,
            scientific_name: group.scientific_name.clone(),
            created_at: Utc::now(),
        };
        self.groups.insert(created.id, created.clone());
        created
    }

    fn upsert_trait(&mut self, new_trait: &NewTrait) -> Trait {
        let key = new_trait.natural_key();
        if let Some(existing) = self
            .traits
            .values()
            .find(|t| t.name.to_lowercase() == key)
        {
            return existing.clone();
        }

        self.next_trait_id += 1;
        let created = Trait {
            id: self.next_trait_id,
            name: new_trait.name.clone(),
            created_at: Utc::now(),
        };
        self.traits.insert(created.id, created.clone());
        created
    }

    fn resolve_traits(&mut self, traits: &[NewTrait]) -> BTreeSet<Id> {
        traits.iter().map(|t| self.upsert_trait(t).id).collect()
    }

    fn hydrate(&self, id: Id, record: &PetRecord) -> Result<Pet> {
        let group = self
            .groups
            .get(&record.group_id)
            .cloned()
            .ok_or_else(|| anyhow!("Pet {} references missing group {}", id, record.group_id))?;

        let traits = record
            .trait_ids
            .iter()
            .map(|trait_id| {
                self.traits
                    .get(trait_id)
                    .cloned()
                    .ok_or_else(|| anyhow!("Pet {} references missing trait {}", id, trait_id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Pet {
            id,
            name: record.fields.name.clone(),
            age: record.fields.age,
            weight: record.fields.weight,
            sex: record.fields.sex,
            group,
            traits,
        })
    }

    fn matches(&self, record: &PetRecord, needle: Option<&str>) -> bool {
        let Some(needle) = needle else {
            return true;
        };

        record.trait_ids.iter().any(|trait_id| {
            self.traits
                .get(trait_id)
                .is_some_and(|t| t.name.to_lowercase().contains(needle))
        })
    }
}

/// Process-local store. Every mutation runs under one write lock, so
/// get-or-create is atomic here as well.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl GroupStore for MemoryStore {
    async fn get_or_create_group(&self, group: &NewGroup) -> Result<Group> {
        Ok(self.state.write().upsert_group(group))
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        Ok(self.state.read().groups.values().cloned().collect())
    }
}

#[async_trait::async_trait]
impl TraitStore for MemoryStore {
    async fn get_or_create_trait(&self, new_trait: &NewTrait) -> Result<Trait> {
        Ok(self.state.write().upsert_trait(new_trait))
    }

    async fn list_traits(&self) -> Result<Vec<Trait>> {
        Ok(self.state.read().traits.values().cloned().collect())
    }
}

#[async_trait::async_trait]
impl PetStore for MemoryStore {
    async fn create_pet(&self, pet: NewPet) -> Result<Pet> {
        let mut state = self.state.write();

        let group_id = state.upsert_group(&pet.group).id;
        let trait_ids = state.resolve_traits(&pet.traits);

        state.next_pet_id += 1;
        let id = state.next_pet_id;
        let record = PetRecord {
            fields: pet.fields,
            group_id,
            trait_ids,
        };
        let created = state.hydrate(id, &record)?;
        state.pets.insert(id, record);

        Ok(created)
    }

    async fn get_pet(&self, id: Id) -> Result<Option<Pet>> {
        let state = self.state.read();
        state
            .pets
            .get(&id)
            .map(|record| state.hydrate(id, record))
            .transpose()
    }

    async fn list_pets(&self, filter: &PetFilter) -> Result<PetPage> {
        let state = self.state.read();
        let needle = filter.needle();

        let matching = state
            .pets
            .iter()
            .filter(|(_, record)| state.matches(record, needle.as_deref()))
            .collect_vec();

        let pets = matching
            .iter()
            .skip(filter.offset)
            .take(filter.limit)
            .map(|(id, record)| state.hydrate(**id, record))
            .collect::<Result<Vec<_>>>()?;

        Ok(PetPage {
            total: matching.len(),
            pets,
        })
    }

    async fn update_pet(&self, id: Id, patch: PetPatch) -> Result<Option<Pet>> {
        let mut state = self.state.write();

        let Some(mut record) = state.pets.get(&id).cloned() else {
            return Ok(None);
        };

        record.fields = patch.apply(&record.fields);
        if let Some(group) = &patch.group {
            record.group_id = state.upsert_group(group).id;
        }
        if let Some(traits) = &patch.traits {
            record.trait_ids = state.resolve_traits(traits);
        }

        let updated = state.hydrate(id, &record)?;
        state.pets.insert(id, record);

        Ok(Some(updated))
    }

    async fn delete_pet(&self, id: Id) -> Result<bool> {
        Ok(self.state.write().pets.remove(&id).is_some())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sex;

    fn new_pet(name: &str, group: &str, traits: &[&str]) -> NewPet {
        NewPet {
            fields: PetFields {
                name: name.to_string(),
                age: 2,
                weight: 4.5,
                sex: Sex::Female,
            },
            group: NewGroup::new(group),
            traits: traits.iter().map(|t| NewTrait::new(*t)).collect(),
        }
    }

    fn trait_names(pet: &Pet) -> Vec<&str> {
        pet.traits.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_group_is_created_once() {
        let store = MemoryStore::new();

        let first = store.create_pet(new_pet("Mia", "felis catus", &[])).await.unwrap();
        let second = store.create_pet(new_pet("Tom", "felis catus", &[])).await.unwrap();

        assert_eq!(first.group.id, second.group.id);
        assert_eq!(store.list_groups().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_group_match_is_exact() {
        let store = MemoryStore::new();

        let lower = store.get_or_create_group(&NewGroup::new("felis catus")).await.unwrap();
        let upper = store.get_or_create_group(&NewGroup::new("Felis catus")).await.unwrap();

        assert_ne!(lower.id, upper.id);
    }

    #[tokio::test]
    async fn test_trait_dedup_ignores_case() {
        let store = MemoryStore::new();

        let pet = store
            .create_pet(new_pet("Mia", "felis catus", &["Fast", "fast", "FAST"]))
            .await
            .unwrap();

        assert_eq!(trait_names(&pet), vec!["Fast"]);
        assert_eq!(store.list_traits().await.unwrap().len(), 1);

        let again = store.get_or_create_trait(&NewTrait::new("fAsT")).await.unwrap();
        assert_eq!(again.name, "Fast");
    }

    #[tokio::test]
    async fn test_list_filters_by_trait_substring() {
        let store = MemoryStore::new();
        store.create_pet(new_pet("A", "g", &["Fast"])).await.unwrap();
        store.create_pet(new_pet("B", "g", &["slow"])).await.unwrap();
        store.create_pet(new_pet("C", "g", &["breakfast", "fastidious"])).await.unwrap();

        let page = store.list_pets(&PetFilter::new(Some("FAS".into()))).await.unwrap();
        let names: Vec<&str> = page.pets.iter().map(|p| p.name.as_str()).collect();

        assert_eq!(page.total, 2);
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_list_window_and_order() {
        let store = MemoryStore::new();
        for name in ["A", "B", "C"] {
            store.create_pet(new_pet(name, "g", &[])).await.unwrap();
        }

        let page = store.list_pets(&PetFilter::new(None).window(1, 5)).await.unwrap();
        let ids: Vec<Id> = page.pets.iter().map(|p| p.id).collect();

        assert_eq!(page.total, 3);
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_update_replaces_traits_and_group() {
        let store = MemoryStore::new();
        let pet = store.create_pet(new_pet("A", "canis lupus", &["A", "B"])).await.unwrap();

        let patch = PetPatch {
            weight: Some(9.0),
            group: Some(NewGroup::new("canis familiaris")),
            traits: Some(vec![NewTrait::new("C")]),
            ..Default::default()
        };
        let updated = store.update_pet(pet.id, patch).await.unwrap().unwrap();

        assert_eq!(trait_names(&updated), vec!["C"]);
        assert_eq!(updated.group.scientific_name, "canis familiaris");
        assert_eq!(updated.weight, 9.0);
        assert_eq!(updated.name, "A");
        // reference rows survive
        assert_eq!(store.list_groups().await.unwrap().len(), 2);
        assert_eq!(store.list_traits().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_without_traits_keeps_them() {
        let store = MemoryStore::new();
        let pet = store.create_pet(new_pet("A", "g", &["A", "B"])).await.unwrap();

        let patch = PetPatch {
            name: Some("Z".to_string()),
            ..Default::default()
        };
        let updated = store.update_pet(pet.id, patch).await.unwrap().unwrap();

        assert_eq!(updated.name, "Z");
        assert_eq!(trait_names(&updated), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_missing_pet() {
        let store = MemoryStore::new();

        assert!(store.get_pet(42).await.unwrap().is_none());
        assert!(store.update_pet(42, PetPatch::default()).await.unwrap().is_none());
        assert!(!store.delete_pet(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_keeps_reference_rows() {
        let store = MemoryStore::new();
        let pet = store.create_pet(new_pet("A", "g", &["A"])).await.unwrap();

        assert!(store.delete_pet(pet.id).await.unwrap());
        assert!(store.get_pet(pet.id).await.unwrap().is_none());
        assert_eq!(store.list_groups().await.unwrap().len(), 1);
        assert_eq!(store.list_traits().await.unwrap().len(), 1);
    }
}
