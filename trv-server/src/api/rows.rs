//! Row CRUD endpoints
//!
//! `GET /rows` lists every row; `PUT /rows/:row_id` applies a partial
//! update. Updating an id that does not exist is not an error: the
//! response reports `updated_rows: 0`.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;
use trv_common::db::{self, Row, RowPatch};

use super::ApiError;
use crate::AppState;

/// Response body for a row update
#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub status: &'static str,
    pub updated_rows: u64,
}

/// GET /rows
pub async fn list_rows(State(state): State<AppState>) -> Result<Json<Vec<Row>>, ApiError> {
    let rows = db::list_rows(&state.db, &state.config.table).await?;
    Ok(Json(rows))
}

/// PUT /rows/:row_id
///
/// Body is a JSON object mapping column names to new string (or null)
/// values. Columns outside the mutable set are rejected with 400.
pub async fn update_row(
    State(state): State<AppState>,
    Path(row_id): Path<i64>,
    Json(body): Json<Map<String, Value>>,
) -> Result<Json<UpdateResponse>, ApiError> {
    let patch = RowPatch::from_json(&body)?;
    let updated_rows = db::update_row(&state.db, &state.config.table, row_id, &patch).await?;

    info!(
        "Row {} update: {} columns, {} rows affected",
        row_id,
        patch.len(),
        updated_rows
    );

    Ok(Json(UpdateResponse {
        status: "success",
        updated_rows,
    }))
}
