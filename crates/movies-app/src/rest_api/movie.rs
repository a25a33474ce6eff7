use movies_dal::movie::{CreateMovie, MovieRepository, UpdateMovie};

use crate::state::AppState;
use axum::routing::get;

crate::repository_from_request!(MovieRepository);

#[derive(Debug, serde::Deserialize)]
pub struct ListQuery {
    pub genre: Option<String>,
}

pub mod crud_api {
    use super::*;
    use crate::error::{ApiError, ApiResult};
    use crate::rest_api::MovieId;
    use crate::validate::Garde;
    use axum::{extract::Query, response::IntoResponse, Json};
    use http::StatusCode;
    use serde_json::json;
    use tracing::debug;

    pub async fn list(
        repository: MovieRepository,
        Query(query): Query<ListQuery>,
    ) -> ApiResult<impl IntoResponse> {
        // empty genre means no filter
        let genre = query
            .genre
            .as_deref()
            .map(str::trim)
            .filter(|g| !g.is_empty());
        debug!("Listing movies, genre filter: {genre:?}");
        let movies = repository.list(genre).await?;
        Ok((StatusCode::OK, Json(movies)))
    }

    pub async fn get(
        MovieId(id): MovieId,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository
            .get(id)
            .await?
            .ok_or(ApiError::NotFound("Movie"))?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn create(
        repository: MovieRepository,
        Garde(Json(payload)): Garde<Json<CreateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository.create(payload).await?;
        Ok((StatusCode::CREATED, Json(record)))
    }

    pub async fn update(
        MovieId(id): MovieId,
        repository: MovieRepository,
        Garde(Json(payload)): Garde<Json<UpdateMovie>>,
    ) -> ApiResult<impl IntoResponse> {
        let record = repository
            .update(id, payload)
            .await?
            .ok_or(ApiError::NotFound("Movie"))?;
        Ok((StatusCode::OK, Json(record)))
    }

    pub async fn delete(
        MovieId(id): MovieId,
        repository: MovieRepository,
    ) -> ApiResult<impl IntoResponse> {
        let deleted = repository
            .delete(id)
            .await?
            .ok_or(ApiError::NotFound("Movie"))?;
        Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Movie deleted",
                "movies": deleted.movies,
                "genres": deleted.genres,
            })),
        ))
    }
}

pub fn router() -> axum::Router<AppState> {
    axum::Router::new()
        .route("/", get(crud_api::list).post(crud_api::create))
        .route(
            "/{id}",
            get(crud_api::get)
                .patch(crud_api::update)
                .delete(crud_api::delete),
        )
}
