use axum::{
    routing::get,
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::Store;

pub fn create_router<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Pet collection
        .route(
            "/pets",
            get(handlers::list_pets::<S>).post(handlers::create_pet::<S>),
        )
        // Single pet
        .route(
            "/pets/:pet_id",
            get(handlers::get_pet::<S>)
                .patch(handlers::update_pet::<S>)
                .delete(handlers::delete_pet::<S>),
        )
}
