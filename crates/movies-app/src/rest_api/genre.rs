use crate::error::ApiResult;
use crate::state::AppState;
use axum::{response::IntoResponse, routing::get, Json};
use http::StatusCode;
use movies_dal::genre::GenreRepository;

crate::repository_from_request!(GenreRepository);

pub async fn list(repository: GenreRepository) -> ApiResult<impl IntoResponse> {
    let genres = repository.list().await?;
    Ok((StatusCode::OK, Json(genres)))
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new().route("/", get(list))
}
