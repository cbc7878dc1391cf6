use crate::models::IdentityStatus;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("User not found")]
    UserNotFound,

    /// Also returned when the identity exists but belongs to someone else.
    #[error("Identity not found")]
    IdentityNotFound,

    #[error("Identity cannot be disconnected ({})", .0.as_str())]
    DisconnectNotAllowed(IdentityStatus),

    #[error("Organization membership not found")]
    MembershipNotFound,

    #[error("Email error: {0}")]
    EmailError(String),

    #[error("{0}")]
    InvalidQuery(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(anyhow::Error::new(e)),
            ServiceError::Redis(e) => AppError::RedisError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::UserNotFound => AppError::NotFound(anyhow::anyhow!("User not found")),
            ServiceError::IdentityNotFound => {
                AppError::NotFound(anyhow::anyhow!("Identity not found"))
            }
            ServiceError::DisconnectNotAllowed(status) => AppError::MethodNotAllowed(
                anyhow::anyhow!("Identity cannot be disconnected ({})", status.as_str()),
            ),
            ServiceError::MembershipNotFound => {
                AppError::NotFound(anyhow::anyhow!("Organization membership not found"))
            }
            ServiceError::EmailError(e) => AppError::EmailError(e),
            ServiceError::InvalidQuery(e) => AppError::BadRequest(anyhow::anyhow!(e)),
        }
    }
}
