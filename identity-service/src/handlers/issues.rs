use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use std::collections::HashMap;

use crate::{
    dtos::{ErrorResponse, IssueQueryParamsResponse, IssueQueryString},
    middleware::AuthUser,
    services::{IssueQueryParams, ServiceError},
    AppState,
};

/// Parse issue search parameters the way the search endpoints do
#[utoipa::path(
    get,
    path = "/organizations/{org_id}/issues/query-params",
    params(
        ("org_id" = i64, Path, description = "Organization id"),
        IssueQueryString
    ),
    responses(
        (status = 200, description = "Parsed parameters", body = IssueQueryParamsResponse),
        (status = 400, description = "Invalid limit or cursor", body = ErrorResponse),
        (status = 404, description = "Caller is not a member of the organization", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn issue_query_params(
    State(state): State<AppState>,
    user: AuthUser,
    Path(org_id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<IssueQueryParamsResponse>, AppError> {
    state
        .identities
        .find_member_id(org_id, user.user_id)
        .await?
        .ok_or(ServiceError::MembershipNotFound)?;

    let parsed = IssueQueryParams::from_params(&params)?;
    Ok(Json(IssueQueryParamsResponse::new(org_id, parsed)))
}

/// Queue issue groups of a project for deletion
#[utoipa::path(
    delete,
    path = "/organizations/{org_id}/projects/{project_id}/issues",
    params(
        ("org_id" = i64, Path, description = "Organization id"),
        ("project_id" = i64, Path, description = "Project id"),
        ("id" = Vec<i64>, Query, description = "Group ids; repeat for several")
    ),
    responses(
        (status = 204, description = "Groups queued for deletion (or nothing to delete)"),
        (status = 400, description = "Missing or invalid ids", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Issues"
)]
pub async fn bulk_delete_issues(
    State(state): State<AppState>,
    user: AuthUser,
    Path((org_id, project_id)): Path<(i64, i64)>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<StatusCode, AppError> {
    let group_ids = params
        .iter()
        .filter(|(key, _)| key == "id")
        .map(|(_, value)| {
            value
                .parse::<i64>()
                .map_err(|_| AppError::BadRequest(anyhow::anyhow!("Invalid group id: {}", value)))
        })
        .collect::<Result<Vec<i64>, AppError>>()?;

    if let Some(queued) = state
        .group_service
        .delete_groups(org_id, project_id, &group_ids)
        .await?
    {
        tracing::info!(
            user_id = user.user_id,
            transaction_id = %queued.transaction_id,
            count = queued.group_ids.len(),
            "Issue deletion queued"
        );
    }

    Ok(StatusCode::NO_CONTENT)
}
