use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::ErrorResponse,
    middleware::AuthUser,
    models::{IdentityCategory, IdentityResponse},
    AppState,
};

/// Unknown categories and non-numeric ids cannot name an identity.
fn parse_identity_path(category: &str, identity_id: &str) -> Result<(IdentityCategory, i64), AppError> {
    let not_found = || AppError::NotFound(anyhow::anyhow!("Identity not found"));
    let category = category.parse::<IdentityCategory>().map_err(|_| not_found())?;
    let identity_id = identity_id.parse::<i64>().map_err(|_| not_found())?;
    Ok((category, identity_id))
}

/// List the caller's linked identities
#[utoipa::path(
    get,
    path = "/users/me/identities",
    responses(
        (status = 200, description = "Identities with their disconnect status", body = [IdentityResponse]),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Identities"
)]
pub async fn list_identities(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<IdentityResponse>>, AppError> {
    let identities = state.identity_config.get_identities(user.user_id).await?;
    Ok(Json(identities.iter().map(|r| r.to_response()).collect()))
}

/// Fetch one of the caller's identities
#[utoipa::path(
    get,
    path = "/users/me/identities/{category}/{identity_id}",
    params(
        ("category" = String, Path, description = "social-identity, global-identity or org-identity"),
        ("identity_id" = i64, Path, description = "Identity id")
    ),
    responses(
        (status = 200, description = "Identity", body = IdentityResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Identities"
)]
pub async fn get_identity(
    State(state): State<AppState>,
    user: AuthUser,
    Path((category, identity_id)): Path<(String, String)>,
) -> Result<Json<IdentityResponse>, AppError> {
    let (category, identity_id) = parse_identity_path(&category, &identity_id)?;
    let resolved = state
        .identity_config
        .get_identity(user.user_id, category, identity_id)
        .await?;
    Ok(Json(resolved.to_response()))
}

/// Disconnect one of the caller's identities
#[utoipa::path(
    delete,
    path = "/users/me/identities/{category}/{identity_id}",
    params(
        ("category" = String, Path, description = "social-identity, global-identity or org-identity"),
        ("identity_id" = i64, Path, description = "Identity id")
    ),
    responses(
        (status = 204, description = "Identity disconnected"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 405, description = "Identity is needed to log in", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Identities"
)]
pub async fn delete_identity(
    State(state): State<AppState>,
    user: AuthUser,
    Path((category, identity_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let (category, identity_id) = parse_identity_path(&category, &identity_id)?;
    state
        .identity_config
        .disconnect_identity(user.user_id, category, identity_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
