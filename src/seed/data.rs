use crate::model::{NewGroup, NewPet, NewTrait, PetFields, Sex};
use crate::store::traits::Store;
use anyhow::Result;

/// Helper function to build a demonstration pet
fn demo_pet(
    name: &str,
    age: i32,
    weight: f64,
    sex: Sex,
    scientific_name: &str,
    traits: &[&str],
) -> NewPet {
    NewPet {
        fields: PetFields {
            name: name.to_string(),
            age,
            weight,
            sex,
        },
        group: NewGroup::new(scientific_name),
        traits: traits.iter().map(|name| NewTrait::new(*name)).collect(),
    }
}

pub fn demo_pets() -> Vec<NewPet> {
    vec![
        demo_pet("Rex", 3, 12.5, Sex::Male, "canis familiaris", &["loyal", "fast"]),
        demo_pet("Luna", 5, 4.2, Sex::Female, "felis catus", &["Curious", "calm"]),
        demo_pet("Pip", 1, 0.3, Sex::NotInformed, "mesocricetus auratus", &["Fast"]),
    ]
}

/// Load a few demonstration pets. Groups and traits go through
/// get-or-create, so repeated loads add pets but never reference rows.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    for pet in demo_pets() {
        let created = store.create_pet(pet).await?;
        log::info!("Seeded pet {} ({})", created.id, created.name);
    }

    Ok(())
}
