use axum::extract::{FromRequestParts, Path};
use http::request::Parts;
use uuid::Uuid;

use crate::error::ApiError;

pub mod genre;
pub mod movie;

/// Movie id taken from the `{id}` path segment, must be a valid UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieId(pub Uuid);

impl<S> FromRequestParts<S> for MovieId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::InvalidId(e.body_text()))?;
        Uuid::parse_str(&id)
            .map(MovieId)
            .map_err(|_| ApiError::InvalidId(id))
    }
}
