use axum::extract::State;
use serde_json::json;

use crate::db::{AppState, queries};
use crate::error::{AppError, OptionExt, Result, msg};
use crate::extractors::{Json, Path};
use crate::models::{CreateMaterial, Material, UpdateMaterial};

pub async fn list_materials(State(state): State<AppState>) -> Result<Json<Vec<Material>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_materials(&conn)?))
}

pub async fn create_material(
    State(state): State<AppState>,
    Json(input): Json<CreateMaterial>,
) -> Result<Json<Material>> {
    input.validate()?;

    let conn = state.db.get()?;
    let material = queries::create_material(&conn, &input)?;
    tracing::info!(material_id = material.id, title = %material.title, "Material created");
    Ok(Json(material))
}

pub async fn update_material(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateMaterial>,
) -> Result<Json<Material>> {
    input.validate()?;

    let conn = state.db.get()?;
    let material = queries::update_material(&conn, id, &input)?
        .or_not_found(msg::MATERIAL_NOT_FOUND)?;
    tracing::info!(material_id = id, "Material updated");
    Ok(Json(material))
}

pub async fn delete_material(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let conn = state.db.get()?;
    if !queries::delete_material(&conn, id)? {
        return Err(AppError::NotFound(msg::MATERIAL_NOT_FOUND.into()));
    }
    tracing::info!(material_id = id, "Material deleted");
    Ok(Json(json!({ "success": true })))
}
