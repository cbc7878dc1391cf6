use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{ErrorResponse, IdpMigrationAccepted, IdpMigrationRequest, VerificationResponse},
    middleware::AuthUser,
    utils::ValidatedJson,
    AppState,
};

/// Email the caller a link confirming their account for an org's new identity provider
#[utoipa::path(
    post,
    path = "/users/me/idp-migration",
    request_body = IdpMigrationRequest,
    responses(
        (status = 202, description = "Verification email sent", body = IdpMigrationAccepted),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Not a member of the organization", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "IdP Migration"
)]
pub async fn start_idp_migration(
    State(state): State<AppState>,
    user: AuthUser,
    ValidatedJson(req): ValidatedJson<IdpMigrationRequest>,
) -> Result<(StatusCode, Json<IdpMigrationAccepted>), AppError> {
    state
        .idp_migration
        .send_one_time_account_confirm_link(
            user.user_id,
            req.organization_id,
            &req.email,
            &req.identity_id,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IdpMigrationAccepted {
            detail: "A verification email has been sent".to_string(),
        }),
    ))
}

/// Check a one-time verification key
#[utoipa::path(
    get,
    path = "/auth/idp-migration/verify/{key}",
    params(("key" = String, Path, description = "Verification key from the email link")),
    responses(
        (status = 200, description = "Whether the key is live", body = VerificationResponse)
    ),
    tag = "IdP Migration"
)]
pub async fn verify_idp_migration(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<VerificationResponse>, AppError> {
    let valid = state.idp_migration.verify_account(&key).await?;
    Ok(Json(VerificationResponse { valid }))
}
