use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgConnection, PgPool, Row,
};
use std::collections::HashMap;

use crate::model::{
    Group, Id, NewGroup, NewPet, NewTrait, Pet, PetFields, PetFilter, PetPage, PetPatch, Sex, Trait,
};
use crate::store::traits::{GroupStore, PetStore, Store, TraitStore};

const PET_COLUMNS: &str = r#"
    p.id, p.name, p.age, p.weight, p.sex,
    g.id AS group_id, g.scientific_name, g.created_at AS group_created_at
"#;

// $1 is the lowercased trait needle, or NULL for no filter
const TRAIT_MATCH: &str = r#"
    ($1::text IS NULL OR EXISTS (
        SELECT 1
        FROM pet_traits pt
        JOIN traits t ON t.id = pt.trait_id
        WHERE pt.pet_id = p.id AND strpos(lower(t.name), $1) > 0
    ))
"#;

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

async fn upsert_group(conn: &mut PgConnection, group: &NewGroup) -> Result<Group> {
    // The no-op update makes RETURNING yield the existing row on conflict
    let row = sqlx::query(
        r#"
        INSERT INTO groups (scientific_name)
        VALUES ($1)
        ON CONFLICT (scientific_name) DO UPDATE SET
            scientific_name = EXCLUDED.scientific_name
        RETURNING id, scientific_name, created_at
        "#,
    )
    .bind(&group.scientific_name)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to upsert group")?;

    Ok(Group {
        id: row.get("id"),
        scientific_name: row.get("scientific_name"),
        created_at: row.get("created_at"),
    })
}

async fn upsert_trait(conn: &mut PgConnection, new_trait: &NewTrait) -> Result<Trait> {
    let row = sqlx::query(
        r#"
        INSERT INTO traits (name)
        VALUES ($1)
        ON CONFLICT ((lower(name))) DO UPDATE SET
            name = traits.name
        RETURNING id, name, created_at
        "#,
    )
    .bind(&new_trait.name)
    .fetch_one(&mut *conn)
    .await
    .context("Failed to upsert trait")?;

    Ok(trait_from_row(&row))
}

async fn attach_traits(conn: &mut PgConnection, pet_id: Id, traits: &[NewTrait]) -> Result<()> {
    for new_trait in traits {
        let resolved = upsert_trait(&mut *conn, new_trait).await?;

        sqlx::query(
            "INSERT INTO pet_traits (pet_id, trait_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(pet_id)
        .bind(resolved.id)
        .execute(&mut *conn)
        .await
        .context("Failed to attach trait to pet")?;
    }

    Ok(())
}

async fn fetch_traits(conn: &mut PgConnection, pet_ids: &[Id]) -> Result<HashMap<Id, Vec<Trait>>> {
    let rows = sqlx::query(
        r#"
        SELECT pt.pet_id, t.id, t.name, t.created_at
        FROM pet_traits pt
        JOIN traits t ON t.id = pt.trait_id
        WHERE pt.pet_id = ANY($1)
        ORDER BY pt.pet_id, t.id
        "#,
    )
    .bind(pet_ids)
    .fetch_all(&mut *conn)
    .await
    .context("Failed to fetch pet traits")?;

    let mut traits: HashMap<Id, Vec<Trait>> = HashMap::new();
    for row in rows {
        traits
            .entry(row.get("pet_id"))
            .or_default()
            .push(trait_from_row(&row));
    }

    Ok(traits)
}

async fn fetch_pet(conn: &mut PgConnection, id: Id) -> Result<Option<Pet>> {
    let sql = format!(
        "SELECT {PET_COLUMNS} FROM pets p JOIN groups g ON g.id = p.group_id WHERE p.id = $1"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to fetch pet")?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut traits = fetch_traits(&mut *conn, &[id]).await?;
    Ok(Some(pet_from_row(&row, traits.remove(&id).unwrap_or_default())))
}

fn trait_from_row(row: &PgRow) -> Trait {
    Trait {
        id: row.get("id"),
        name: row.get("name"),
        created_at: row.get("created_at"),
    }
}

fn fields_from_row(row: &PgRow) -> PetFields {
    let sex: String = row.get("sex");
    PetFields {
        name: row.get("name"),
        age: row.get("age"),
        weight: row.get("weight"),
        sex: Sex::parse(&sex).unwrap_or_default(), // Default fallback
    }
}

fn pet_from_row(row: &PgRow, traits: Vec<Trait>) -> Pet {
    let fields = fields_from_row(row);
    Pet {
        id: row.get("id"),
        name: fields.name,
        age: fields.age,
        weight: fields.weight,
        sex: fields.sex,
        group: Group {
            id: row.get("group_id"),
            scientific_name: row.get("scientific_name"),
            created_at: row.get("group_created_at"),
        },
        traits,
    }
}

#[async_trait::async_trait]
impl GroupStore for PostgresStore {
    async fn get_or_create_group(&self, group: &NewGroup) -> Result<Group> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        upsert_group(&mut conn, group).await
    }

    async fn list_groups(&self) -> Result<Vec<Group>> {
        let rows = sqlx::query("SELECT id, scientific_name, created_at FROM groups ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list groups")?;

        Ok(rows
            .into_iter()
            .map(|row| Group {
                id: row.get("id"),
                scientific_name: row.get("scientific_name"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[async_trait::async_trait]
impl TraitStore for PostgresStore {
    async fn get_or_create_trait(&self, new_trait: &NewTrait) -> Result<Trait> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        upsert_trait(&mut conn, new_trait).await
    }

    async fn list_traits(&self) -> Result<Vec<Trait>> {
        let rows = sqlx::query("SELECT id, name, created_at FROM traits ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list traits")?;

        Ok(rows.iter().map(trait_from_row).collect())
    }
}

#[async_trait::async_trait]
impl PetStore for PostgresStore {
    async fn create_pet(&self, pet: NewPet) -> Result<Pet> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let group = upsert_group(&mut tx, &pet.group).await?;
        let pet_id: Id = sqlx::query_scalar(
            r#"
            INSERT INTO pets (name, age, weight, sex, group_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(&pet.fields.name)
        .bind(pet.fields.age)
        .bind(pet.fields.weight)
        .bind(pet.fields.sex.as_str())
        .bind(group.id)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert pet")?;

        attach_traits(&mut tx, pet_id, &pet.traits).await?;

        let created = fetch_pet(&mut tx, pet_id)
            .await?
            .context("Inserted pet not visible inside its transaction")?;
        tx.commit().await.context("Failed to commit pet creation")?;

        Ok(created)
    }

    async fn get_pet(&self, id: Id) -> Result<Option<Pet>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        fetch_pet(&mut conn, id).await
    }

    async fn list_pets(&self, filter: &PetFilter) -> Result<PetPage> {
        let needle = filter.needle();
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;

        let count_sql = format!("SELECT COUNT(*) FROM pets p WHERE {TRAIT_MATCH}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&needle)
            .fetch_one(&mut *conn)
            .await
            .context("Failed to count pets")?;

        let page_sql = format!(
            "SELECT {PET_COLUMNS} FROM pets p JOIN groups g ON g.id = p.group_id \
             WHERE {TRAIT_MATCH} ORDER BY p.id LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&page_sql)
            .bind(&needle)
            .bind(i64::try_from(filter.limit).unwrap_or(i64::MAX))
            .bind(i64::try_from(filter.offset).unwrap_or(i64::MAX))
            .fetch_all(&mut *conn)
            .await
            .context("Failed to list pets")?;

        let pet_ids: Vec<Id> = rows.iter().map(|row| row.get("id")).collect();
        let mut traits = fetch_traits(&mut conn, &pet_ids).await?;

        let pets = rows
            .iter()
            .map(|row| {
                let id: Id = row.get("id");
                pet_from_row(row, traits.remove(&id).unwrap_or_default())
            })
            .collect();

        Ok(PetPage {
            total: usize::try_from(total).unwrap_or_default(),
            pets,
        })
    }

    async fn update_pet(&self, id: Id, patch: PetPatch) -> Result<Option<Pet>> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let row = sqlx::query("SELECT name, age, weight, sex, group_id FROM pets WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to lock pet")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let fields = patch.apply(&fields_from_row(&row));
        let group_id: Id = match &patch.group {
            Some(group) => upsert_group(&mut tx, group).await?.id,
            None => row.get("group_id"),
        };

        sqlx::query(
            r#"
            UPDATE pets
            SET name = $2, age = $3, weight = $4, sex = $5, group_id = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&fields.name)
        .bind(fields.age)
        .bind(fields.weight)
        .bind(fields.sex.as_str())
        .bind(group_id)
        .execute(&mut *tx)
        .await
        .context("Failed to update pet")?;

        if let Some(traits) = &patch.traits {
            sqlx::query("DELETE FROM pet_traits WHERE pet_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to clear pet traits")?;
            attach_traits(&mut tx, id, traits).await?;
        }

        let updated = fetch_pet(&mut tx, id).await?;
        tx.commit().await.context("Failed to commit pet update")?;

        Ok(updated)
    }

    async fn delete_pet(&self, id: Id) -> Result<bool> {
        let result = sqlx::query("DELETE FROM pets WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete pet")?;

        Ok(result.rows_affected() > 0)
    }
}

impl Store for PostgresStore {}
