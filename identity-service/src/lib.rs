pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{openapi::security::SecurityScheme, Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::IdentityConfig;
use crate::middleware::metrics_middleware;
use crate::services::{
    EmailProvider, GroupService, GroupStore, IdentityConfigService, IdentityStore,
    IdpMigrationService, JwtValidator, KeyValueStore,
};
use service_core::error::AppError;
use std::sync::Arc;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::identity::list_identities,
        handlers::identity::get_identity,
        handlers::identity::delete_identity,
        handlers::idp_migration::start_idp_migration,
        handlers::idp_migration::verify_idp_migration,
        handlers::issues::issue_query_params,
        handlers::issues::bulk_delete_issues,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::IdpMigrationRequest,
            dtos::IdpMigrationAccepted,
            dtos::VerificationResponse,
            dtos::IssueQueryParamsResponse,
            models::IdentityResponse,
            models::IdentityCategory,
            models::IdentityStatus,
            models::ProviderResponse,
            models::OrganizationSummary,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Identities", description = "Linked login identities of the current user"),
        (name = "IdP Migration", description = "Re-linking accounts after an identity provider change"),
        (name = "Issues", description = "Issue group helpers"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    utoipa::openapi::security::HttpBuilder::new()
                        .scheme(utoipa::openapi::security::HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: IdentityConfig,
    pub identities: Arc<dyn IdentityStore>,
    pub cache: Arc<dyn KeyValueStore>,
    pub jwt: JwtValidator,
    pub identity_config: IdentityConfigService,
    pub idp_migration: IdpMigrationService,
    pub group_service: GroupService,
    pub idp_migration_rate_limiter: IpRateLimiter,
    pub bulk_delete_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services and rate limiters over the given backends.
    pub fn new(
        config: IdentityConfig,
        identities: Arc<dyn IdentityStore>,
        groups: Arc<dyn GroupStore>,
        cache: Arc<dyn KeyValueStore>,
        email: Arc<dyn EmailProvider>,
        jwt: JwtValidator,
    ) -> Self {
        let limits = &config.rate_limit;
        let idp_migration_rate_limiter = create_ip_rate_limiter(
            limits.idp_migration_attempts,
            limits.idp_migration_window_seconds,
        );
        let bulk_delete_rate_limiter =
            create_ip_rate_limiter(limits.bulk_delete_attempts, limits.bulk_delete_window_seconds);
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        let identity_config = IdentityConfigService::new(identities.clone());
        let idp_migration = IdpMigrationService::new(
            identities.clone(),
            cache.clone(),
            email,
            config.public_base_url.clone(),
        );
        let group_service = GroupService::new(groups);

        Self {
            config,
            identities,
            cache,
            jwt,
            identity_config,
            idp_migration,
            group_service,
            idp_migration_rate_limiter,
            bulk_delete_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let auth = from_fn_with_state(state.clone(), middleware::auth_middleware);

    // Issuing verification keys sends email, so it gets its own limiter
    let idp_migration_route = Router::new()
        .route(
            "/users/me/idp-migration",
            post(handlers::idp_migration::start_idp_migration),
        )
        .layer(auth.clone())
        .layer(from_fn_with_state(
            state.idp_migration_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let bulk_delete_route = Router::new()
        .route(
            "/organizations/:org_id/projects/:project_id/issues",
            service_core::axum::routing::delete(handlers::issues::bulk_delete_issues),
        )
        .layer(auth.clone())
        .layer(from_fn_with_state(
            state.bulk_delete_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let user_routes = Router::new()
        .route(
            "/users/me/identities",
            get(handlers::identity::list_identities),
        )
        .route(
            "/users/me/identities/:category/:identity_id",
            get(handlers::identity::get_identity).delete(handlers::identity::delete_identity),
        )
        .route(
            "/organizations/:org_id/issues/query-params",
            get(handlers::issues::issue_query_params),
        )
        .layer(auth);

    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics));

    // Only add Swagger UI if enabled in config
    let swagger_enabled = match state.config.environment {
        crate::config::Environment::Dev => true,
        crate::config::Environment::Prod => match state.config.swagger.enabled {
            crate::config::SwaggerMode::Public | crate::config::SwaggerMode::Authenticated => true,
            crate::config::SwaggerMode::Disabled => false,
        },
    };

    if swagger_enabled {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        // If Swagger UI is disabled, still provide the OpenAPI JSON for programmatic access
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { service_core::axum::Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .route(
            "/auth/idp-migration/verify/:key",
            get(handlers::idp_migration::verify_idp_migration),
        )
        .merge(idp_migration_route)
        .merge(bulk_delete_route)
        .merge(user_routes)
        .with_state(state.clone())
        // Global IP rate limiting
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|o| {
                            o.parse::<service_core::axum::http::HeaderValue>()
                                .map_err(|e| {
                                    tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e)
                                })
                                .ok()
                        })
                        .collect::<Vec<service_core::axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    service_core::axum::http::Method::GET,
                    service_core::axum::http::Method::POST,
                    service_core::axum::http::Method::DELETE,
                    service_core::axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    service_core::axum::http::header::AUTHORIZATION,
                    service_core::axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Service is unhealthy")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<service_core::axum::Json<serde_json::Value>, AppError> {
    state.identities.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "PostgreSQL health check failed");
        AppError::ServiceUnavailable
    })?;

    state.cache.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Redis health check failed");
        AppError::ServiceUnavailable
    })?;

    Ok(service_core::axum::Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "postgresql": "up",
            "redis": "up"
        }
    })))
}
