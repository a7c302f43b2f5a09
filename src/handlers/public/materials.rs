use axum::extract::State;
use chrono::Utc;

use crate::db::{AppState, queries};
use crate::error::{OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::Material;

/// Published materials for sale.
pub async fn list_shop_materials(State(state): State<AppState>) -> Result<Json<Vec<Material>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_paid_materials(&conn)?))
}

/// Published free resources.
pub async fn list_resource_materials(
    State(state): State<AppState>,
) -> Result<Json<Vec<Material>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_free_materials(&conn)?))
}

pub async fn get_material(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Material>> {
    let conn = state.db.get()?;
    let now = Utc::now().timestamp();
    let material = queries::get_material_by_id(&conn, id)?
        .filter(|m| m.is_published(now))
        .or_not_found(msg::MATERIAL_NOT_FOUND)?;
    Ok(Json(material))
}
