use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Host, Path, Query, State,
    },
    http::{StatusCode, Uri},
    response::Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::pagination::{Paginated, Paginator};
use crate::model::{validate_new_pet, validate_pet_patch, Id, Pet, PetFilter};
use crate::store::traits::Store;

/// Shared handler state: the store plus the list pagination settings
pub struct AppState<S> {
    pub store: Arc<S>,
    pub paginator: Paginator,
}

impl<S> AppState<S> {
    pub fn new(store: Arc<S>, page_size: usize) -> Self {
        Self {
            store,
            paginator: Paginator::new(page_size),
        }
    }
}

// Derived Clone would require S: Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            paginator: self.paginator,
        }
    }
}

/// Simple health check endpoint
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ListPetsQuery {
    #[serde(rename = "trait")]
    pub trait_name: Option<String>,
    pub page: Option<String>,
}

/// Ids that are not integers can never match a row
fn parse_pet_id(raw: &str) -> Result<Id, ApiError> {
    raw.parse::<Id>().map_err(|_| ApiError::NotFound)
}

async fn find_pet<S: Store>(store: &S, id: Id) -> Result<Pet, ApiError> {
    store.get_pet(id).await?.ok_or(ApiError::NotFound)
}

/// POST /pets
pub async fn create_pet<S: Store>(
    State(state): State<AppState<S>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Pet>), ApiError> {
    let Json(payload) = body?;

    let new_pet = validate_new_pet(&payload).map_err(|errors| {
        log::debug!("Rejected pet payload: {:?}", errors);
        ApiError::Validation(errors)
    })?;

    let pet = state.store.create_pet(new_pet).await?;
    log::info!(
        "Created pet {} in group '{}' with {} trait(s)",
        pet.id,
        pet.group.scientific_name,
        pet.traits.len()
    );

    Ok((StatusCode::CREATED, Json(pet)))
}

/// GET /pets?trait=<text>&page=<n>
pub async fn list_pets<S: Store>(
    State(state): State<AppState<S>>,
    Host(host): Host,
    uri: Uri,
    query: Result<Query<ListPetsQuery>, QueryRejection>,
) -> Result<Json<Paginated<Pet>>, ApiError> {
    let Query(params) = query?;
    let page = state.paginator.request(params.page.as_deref())?;
    let offset = page.offset().ok_or(ApiError::InvalidPage)?;
    let filter = PetFilter::new(params.trait_name).window(offset, page.size);

    let result = state.store.list_pets(&filter).await?;
    let base_url = format!("http://{}{}", host, uri.path());

    let paginated = state
        .paginator
        .wrap(page, result.total, result.pets, &base_url, uri.query())?;

    Ok(Json(paginated))
}

/// GET /pets/{pet_id}
pub async fn get_pet<S: Store>(
    Path(pet_id): Path<String>,
    State(state): State<AppState<S>>,
) -> Result<Json<Pet>, ApiError> {
    let id = parse_pet_id(&pet_id)?;
    let pet = find_pet(state.store.as_ref(), id).await?;
    Ok(Json(pet))
}

/// DELETE /pets/{pet_id}
pub async fn delete_pet<S: Store>(
    Path(pet_id): Path<String>,
    State(state): State<AppState<S>>,
) -> Result<StatusCode, ApiError> {
    let id = parse_pet_id(&pet_id)?;

    if !state.store.delete_pet(id).await? {
        return Err(ApiError::NotFound);
    }

    log::info!("Deleted pet {}", id);
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /pets/{pet_id}
pub async fn update_pet<S: Store>(
    Path(pet_id): Path<String>,
    State(state): State<AppState<S>>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Pet>, ApiError> {
    let id = parse_pet_id(&pet_id)?;
    // Existence is checked before the payload is looked at
    let current = find_pet(state.store.as_ref(), id).await?;

    let Json(payload) = body?;
    let patch = validate_pet_patch(&payload).map_err(|errors| {
        log::debug!("Rejected pet {} update: {:?}", id, errors);
        ApiError::Validation(errors)
    })?;

    if patch.is_empty() {
        return Ok(Json(current));
    }

    let pet = state
        .store
        .update_pet(id, patch)
        .await?
        .ok_or(ApiError::NotFound)?;
    log::info!("Updated pet {}", pet.id);

    Ok(Json(pet))
}
