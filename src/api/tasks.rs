//! Task endpoints. Creating or editing a task's text runs the user's
//! automation rules and stores any generated links with the task.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::server::{AppState, CurrentUser};
use crate::automation::{GeneratedLinks, merge_and_deduplicate_links};
use crate::error::{ApiError, ApiResult};
use crate::types::{NewTask, Task, TaskUpdate};

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<NewTask>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    if input.content.trim().is_empty() {
        return Err(ApiError::missing_field("content"));
    }
    if input.column_id.trim().is_empty() {
        return Err(ApiError::missing_field("column_id"));
    }

    // An unknown column must not leave execution records.
    if state.db().get_column(&user_id, &input.column_id)?.is_none() {
        return Err(ApiError::column_not_found(&input.column_id));
    }

    let submitted = input.links.clone().unwrap_or_default();
    let generated = state
        .generate_links(&user_id, &input.content, &submitted)
        .await;
    let links = merge_and_deduplicate_links(&[], &submitted, &generated.links);

    let created = state.db().create_task(&user_id, &input, links);
    if !matches!(created, Ok(Some(_))) {
        // The links were not saved; let the rules fire on the next attempt.
        state.automation().forget(&user_id, &input.content, &generated);
    }
    let task = created?.ok_or_else(|| ApiError::column_not_found(&input.column_id))?;

    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /api/tasks/{task_id}
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(task_id): Path<String>,
    Json(mut update): Json<TaskUpdate>,
) -> ApiResult<Json<Task>> {
    if update.is_empty() {
        return Err(ApiError::no_fields_to_update());
    }
    if update
        .content
        .as_deref()
        .is_some_and(|content| content.trim().is_empty())
    {
        return Err(ApiError::invalid_value("content", "content must not be empty"));
    }

    let existing = state
        .db()
        .get_task(&user_id, &task_id)?
        .ok_or_else(|| ApiError::task_not_found(&task_id))?;

    let mut generated = GeneratedLinks::default();
    if let Some(content) = update.content.as_deref() {
        let submitted = update.links.clone().unwrap_or_default();
        let known = merge_and_deduplicate_links(&existing.links, &submitted, &[]);
        generated = state.generate_links(&user_id, content, &known).await;

        // Submitted links alone replace the stored list; generated links are
        // folded into everything already known.
        if !generated.is_empty() {
            update.links = Some(merge_and_deduplicate_links(
                &existing.links,
                &submitted,
                &generated.links,
            ));
        }
    }

    let updated = state.db().update_task(&user_id, &task_id, &update);
    if !matches!(updated, Ok(Some(_)))
        && let Some(content) = update.content.as_deref()
    {
        state.automation().forget(&user_id, content, &generated);
    }
    let task = updated?.ok_or_else(|| ApiError::task_not_found(&task_id))?;

    Ok(Json(task))
}

/// DELETE /api/tasks/{task_id}
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(task_id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.db().delete_task(&user_id, &task_id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::task_not_found(&task_id))
    }
}
