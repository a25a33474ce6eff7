use axum::{
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
    Json,
};
use http::StatusCode;
use movies_dal::Error as DalError;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(#[from] garde::Report),

    #[error("Invalid request body: {0}")]
    InvalidBody(#[from] JsonRejection),

    #[error("Invalid movie id: {0}")]
    InvalidId(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Dal(#[from] DalError),
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidId(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidBody(rejection) => match rejection {
                JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                    StatusCode::BAD_REQUEST
                }
                other => other.status(),
            },
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Dal(DalError::UnknownGenre(_) | DalError::InvalidGenre(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Dal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(report) => {
                let errors = report
                    .iter()
                    .map(|(path, error)| FieldError {
                        field: path.to_string(),
                        message: error.message().to_string(),
                    })
                    .collect::<Vec<_>>();
                debug!("Validation failed: {errors:?}");
                json!({"error": "Validation failed", "errors": errors})
            }
            ApiError::InvalidBody(rejection) => {
                debug!("Invalid body: {rejection}");
                json!({"error": rejection.body_text()})
            }
            ApiError::Dal(e @ (DalError::UnknownGenre(_) | DalError::InvalidGenre(_))) => {
                json!({
                    "error": "Validation failed",
                    "errors": [FieldError { field: "genre".to_string(), message: e.to_string() }]
                })
            }
            ApiError::Dal(e @ DalError::OperationFailed { .. }) => {
                error!("{e}: {:?}", std::error::Error::source(&e));
                json!({"error": e.to_string()})
            }
            ApiError::Dal(e) => {
                error!("Unexpected error: {e}");
                json!({"error": "Internal server error"})
            }
            e => json!({"error": e.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}
