use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A filter parameter was unknown or carried a malformed value
    #[error("Invalid filter `{field}`: {reason}")]
    InvalidFilter { field: String, reason: String },

    /// The filters matched more games than the engine is willing to rank
    #[error("Filters match {total} games, more than the limit of {max}; narrow the filters and retry")]
    CandidateSetTooLarge { total: usize, max: usize },

    /// Recommendations rank the whole catalog (or the PAX subset), so only
    /// `pax_only` or a higher `MAX_CANDIDATES` can bring it under the limit
    #[error("Catalog holds {total} candidate games, more than the recommendation limit of {max}; set pax_only or raise MAX_CANDIDATES")]
    RecommendationPoolTooLarge { total: usize, max: usize },

    /// An embedding artifact or catalog snapshot could not be loaded
    #[error("Load error: {0}")]
    Load(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid_filter(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::InvalidFilter {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::InvalidFilter { .. } => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::CandidateSetTooLarge { .. }
            | AppError::RecommendationPoolTooLarge { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }
            AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Load(_)
            | AppError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
