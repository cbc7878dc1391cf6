use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::services::IssueQueryParams;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Identity not found")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Body of `POST /users/me/idp-migration`.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct IdpMigrationRequest {
    pub organization_id: i64,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    /// Identifier of the user at the organization's new identity provider.
    #[validate(length(min = 1, max = 255, message = "identity_id must not be empty"))]
    pub identity_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IdpMigrationAccepted {
    pub detail: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerificationResponse {
    pub valid: bool,
}

/// Issue list parameters as understood by the search endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueQueryParamsResponse {
    pub organization_id: i64,
    pub sort: String,
    pub limit: Option<i64>,
    /// Normalised `<value>:<offset>:<is_prev>` form.
    pub cursor: Option<String>,
    pub query: String,
    pub stats_period: Option<String>,
    pub stats_period_start: Option<String>,
    pub stats_period_end: Option<String>,
}

impl IssueQueryParamsResponse {
    pub fn new(organization_id: i64, params: IssueQueryParams) -> Self {
        Self {
            organization_id,
            sort: params.sort_by,
            limit: params.limit,
            cursor: params.cursor.map(|c| c.to_string()),
            query: params.query,
            stats_period: params.stats.period,
            stats_period_start: params.stats.start,
            stats_period_end: params.stats.end,
        }
    }
}

/// Raw query string accepted by the issue query-params endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[allow(non_snake_case)]
pub struct IssueQueryString {
    /// Sort order, defaults to `date`.
    pub sort: Option<String>,
    pub limit: Option<String>,
    pub cursor: Option<String>,
    /// Search query, defaults to `is:unresolved`.
    pub query: Option<String>,
    pub statsPeriod: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}
