use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use quad_policy::Error;
use quad_types::api::ErrorBody;
use tracing::{error, warn};

/// HTTP face of the domain error taxonomy.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(Error::Storage(err))
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::InvalidTransition { .. }
            | Error::EditConflict
            | Error::CapacityExceeded { .. } => StatusCode::CONFLICT,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the log
        let message = match &self.0 {
            Error::Storage(err) => {
                error!("Storage failure: {:#}", err);
                "internal error".to_string()
            }
            other => {
                warn!("Request rejected ({}): {}", other.code(), other);
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: self.0.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}
