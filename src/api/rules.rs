//! Automation rule endpoints.
//!
//! Every successful mutation clears the owner's execution cache so that
//! edited rules can fire again on text they already matched.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::server::{AppState, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::types::{AutomationRule, RuleInput};

fn validate_rule_input(input: &RuleInput) -> ApiResult<()> {
    if input.name.trim().is_empty() {
        return Err(ApiError::missing_field("name"));
    }
    if input.regex.is_empty() {
        return Err(ApiError::missing_field("regex"));
    }
    if input.link_template.trim().is_empty() {
        return Err(ApiError::missing_field("link_template"));
    }
    Ok(())
}

/// GET /api/automations
pub async fn list_rules(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<AutomationRule>>> {
    Ok(Json(state.db().list_rules(&user_id)?))
}

/// POST /api/automations
pub async fn create_rule(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(input): Json<RuleInput>,
) -> ApiResult<(StatusCode, Json<AutomationRule>)> {
    validate_rule_input(&input)?;

    let rule = state.db().create_rule(&user_id, &input)?;
    state.automation().clear_user_cache(&user_id);

    Ok((StatusCode::CREATED, Json(rule)))
}

/// PUT /api/automations/{rule_id}
pub async fn update_rule(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(rule_id): Path<String>,
    Json(input): Json<RuleInput>,
) -> ApiResult<Json<AutomationRule>> {
    validate_rule_input(&input)?;

    let rule = state
        .db()
        .update_rule(&user_id, &rule_id, &input)?
        .ok_or_else(|| ApiError::rule_not_found(&rule_id))?;
    state.automation().clear_user_cache(&user_id);

    Ok(Json(rule))
}

/// DELETE /api/automations/{rule_id}
pub async fn delete_rule(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(rule_id): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.db().delete_rule(&user_id, &rule_id)? {
        return Err(ApiError::rule_not_found(&rule_id));
    }
    state.automation().clear_user_cache(&user_id);

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/automations/cache/clear
///
/// Administrative reset of every user's execution records.
pub async fn clear_cache(State(state): State<AppState>, _user: CurrentUser) -> StatusCode {
    state.automation().clear_all_cache();
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, regex: &str, template: &str) -> RuleInput {
        RuleInput {
            name: name.to_string(),
            regex: regex.to_string(),
            link_template: template.to_string(),
        }
    }

    #[test]
    fn test_validate_rule_input() {
        assert!(validate_rule_input(&input("GitHub", r"#(\d+)", "https://gh/$1")).is_ok());

        let err = validate_rule_input(&input(" ", r"#(\d+)", "https://gh/$1")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("name"));

        let err = validate_rule_input(&input("GitHub", "", "https://gh/$1")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("regex"));

        let err = validate_rule_input(&input("GitHub", r"#(\d+)", "")).unwrap_err();
        assert_eq!(err.field.as_deref(), Some("link_template"));
    }

    #[test]
    fn test_invalid_pattern_is_accepted_at_save_time() {
        // Broken patterns are stored and skipped during evaluation.
        assert!(validate_rule_input(&input("Broken", "(unclosed", "x")).is_ok());
    }
}
