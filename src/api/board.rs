//! Board and column endpoints.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

use super::server::{AppState, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::types::{Column, ColumnUpdate, ColumnWithTasks};

/// Request body for column creation.
#[derive(Debug, Deserialize)]
pub struct NewColumn {
    #[serde(default)]
    pub title: String,
}

/// GET /api/board
///
/// A user with no columns gets the configured default columns first.
pub async fn get_board(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<ColumnWithTasks>>> {
    let seeded = state.db().seed_columns(&user_id, state.default_columns())?;
    if seeded > 0 {
        info!(user_id = %user_id, columns = seeded, "Seeded default columns");
    }
    Ok(Json(state.db().get_board(&user_id)?))
}

/// POST /api/columns
pub async fn create_column(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<NewColumn>,
) -> ApiResult<(StatusCode, Json<Column>)> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(ApiError::missing_field("title"));
    }

    let column = state.db().create_column(&user_id, title)?;
    Ok((StatusCode::CREATED, Json(column)))
}

/// PUT /api/columns/{column_id}
pub async fn update_column(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(column_id): Path<String>,
    Json(mut update): Json<ColumnUpdate>,
) -> ApiResult<Json<Column>> {
    if update.is_empty() {
        return Err(ApiError::no_fields_to_update());
    }
    if let Some(title) = update.title.as_mut() {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return Err(ApiError::invalid_value("title", "title must not be empty"));
        }
        *title = trimmed.to_string();
    }

    let column = state
        .db()
        .update_column(&user_id, &column_id, &update)?
        .ok_or_else(|| ApiError::column_not_found(&column_id))?;

    Ok(Json(column))
}

/// DELETE /api/columns/{column_id}
///
/// Tasks in the column are deleted with it.
pub async fn delete_column(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(column_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db().delete_column(&user_id, &column_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::column_not_found(&column_id))
    }
}
