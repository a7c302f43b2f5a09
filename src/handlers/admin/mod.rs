mod materials;

pub use materials::*;

use axum::{
    Router, middleware,
    routing::{get, put},
};

use crate::db::AppState;
use crate::middleware::admin_auth;

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/materials", get(list_materials).post(create_material))
        .route(
            "/admin/materials/{id}",
            put(update_material).delete(delete_material),
        )
        .layer(middleware::from_fn_with_state(state, admin_auth))
}
