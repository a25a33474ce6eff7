use futures::future::BoxFuture;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, Connection, Executor, Pool, QueryBuilder};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    ChosenConnection, ChosenDB, Error,
    error::{Operation, Result},
    genre::{self, Genre},
};

pub const DEFAULT_RATE: f64 = 5.0;

fn default_rate() -> f64 {
    DEFAULT_RATE
}

fn is_known_genre(name: &str, _ctx: &()) -> garde::Result {
    name.parse::<Genre>()
        .map(|_| ())
        .map_err(|e| garde::Error::new(e.to_string()))
}

fn parse_genres(names: &[String]) -> Result<Vec<Genre>> {
    let mut genres = names
        .iter()
        .map(|name| name.parse::<Genre>())
        .collect::<Result<Vec<_>>>()?;
    genres.sort();
    genres.dedup();
    Ok(genres)
}

/// Full movie payload, all fields but `rate` are required.
#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateMovie {
    #[garde(skip)]
    pub title: String,
    #[garde(range(min = 1900, max = 2024))]
    pub year: i32,
    #[garde(skip)]
    pub director: String,
    #[garde(range(min = 1))]
    pub duration: i32,
    #[garde(range(min = 0.0, max = 10.0))]
    #[serde(default = "default_rate")]
    pub rate: f64,
    #[garde(url)]
    pub poster: String,
    #[garde(length(min = 1), inner(custom(is_known_genre)))]
    pub genre: Vec<String>,
}

impl CreateMovie {
    /// Normalized, deduplicated genres
    pub fn genres(&self) -> Result<Vec<Genre>> {
        parse_genres(&self.genre)
    }
}

/// Partial movie payload, only supplied fields are changed.
#[derive(Debug, Serialize, Deserialize, Clone, Default, Validate)]
pub struct UpdateMovie {
    #[garde(skip)]
    pub title: Option<String>,
    #[garde(range(min = 1900, max = 2024))]
    pub year: Option<i32>,
    #[garde(skip)]
    pub director: Option<String>,
    #[garde(range(min = 1))]
    pub duration: Option<i32>,
    #[garde(range(min = 0.0, max = 10.0))]
    pub rate: Option<f64>,
    #[garde(url)]
    pub poster: Option<String>,
    #[garde(inner(length(min = 1), inner(custom(is_known_genre))))]
    pub genre: Option<Vec<String>>,
}

impl UpdateMovie {
    pub fn genres(&self) -> Result<Option<Vec<Genre>>> {
        self.genre.as_deref().map(parse_genres).transpose()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Movie {
    pub id: Uuid,
    pub title: String,
    pub year: i32,
    pub director: String,
    pub duration: i32,
    pub poster: String,
    pub rate: f64,
    pub genres: Vec<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MovieInt {
    id: Uuid,
    title: String,
    year: i32,
    director: String,
    duration: i32,
    poster: String,
    rate: f64,
    genres: Option<String>,
}

impl From<MovieInt> for Movie {
    fn from(value: MovieInt) -> Self {
        let mut genres: Vec<String> = value
            .genres
            .map(|s| {
                s.split(',')
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default();
        genres.sort();
        Self {
            id: value.id,
            title: value.title,
            year: value.year,
            director: value.director,
            duration: value.duration,
            poster: value.poster,
            rate: value.rate,
            genres,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    /// Deleted movie rows
    pub movies: u64,
    /// Deleted association rows
    pub genres: u64,
}

const SELECT_MOVIES: &str = r#"
SELECT m.id, m.title, m.year, m.director, m.duration, m.poster, m.rate,
group_concat(g.name, ',') AS genres
FROM movies m
LEFT JOIN movie_genres mg ON mg.movie_id = m.id
LEFT JOIN genres g ON g.id = mg.genre_id
"#;

pub type MovieRepository = MovieRepositoryImpl<Pool<ChosenDB>>;

pub struct MovieRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> MovieRepositoryImpl<E>
where
    for<'a> &'a E: Executor<'c, Database = ChosenDB> + Acquire<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Lists all movies or only movies of given genre.
    /// Unknown genre yields an empty list.
    pub async fn list(&self, genre: Option<&str>) -> Result<Vec<Movie>> {
        let mut conn = self.executor.acquire().await?;
        let records = match genre {
            None => {
                sqlx::query_as::<_, MovieInt>(&format!(
                    "{SELECT_MOVIES} GROUP BY m.id ORDER BY m.title, m.id"
                ))
                .fetch_all(&mut *conn)
                .await?
            }
            Some(name) => {
                let genre_id =
                    sqlx::query_scalar::<_, i64>("SELECT id FROM genres WHERE lower(name) = ?")
                        .bind(name.trim().to_lowercase())
                        .fetch_optional(&mut *conn)
                        .await?;
                let Some(genre_id) = genre_id else {
                    debug!("No genre named {name}");
                    return Ok(Vec::new());
                };
                sqlx::query_as::<_, MovieInt>(&format!(
                    "{SELECT_MOVIES} WHERE m.id IN (SELECT movie_id FROM movie_genres WHERE genre_id = ?) \
                     GROUP BY m.id ORDER BY m.title, m.id"
                ))
                .bind(genre_id)
                .fetch_all(&mut *conn)
                .await?
            }
        };
        Ok(records.into_iter().map(Movie::from).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Movie>> {
        let mut conn = self
            .executor
            .acquire()
            .await
            .map_err(|e| Error::failed(Operation::Fetch, e.into()))?;
        transactional(&mut *conn, Operation::Fetch, |tx| {
            Box::pin(fetch_movie(tx, id))
        })
        .await
    }

    pub async fn create(&self, payload: CreateMovie) -> Result<Movie> {
        let genres = payload.genres()?;
        let mut conn = self
            .executor
            .acquire()
            .await
            .map_err(|e| Error::failed(Operation::Create, e.into()))?;

        let id = transactional(&mut *conn, Operation::Create, |tx| {
            Box::pin(insert_movie(tx, payload, genres))
        })
        .await?
        .ok_or_else(|| Error::failed(Operation::Create, sqlx::Error::RowNotFound.into()))?;
        info!("Created movie {id}");

        fetch_movie(&mut *conn, id)
            .await
            .map_err(|e| Error::failed(Operation::Create, e))?
            .ok_or_else(|| Error::failed(Operation::Create, sqlx::Error::RowNotFound.into()))
    }

    /// Changes only supplied fields, genres are replaced as a whole when present.
    /// Returns `None` if there is no such movie.
    pub async fn update(&self, id: Uuid, payload: UpdateMovie) -> Result<Option<Movie>> {
        let genres = payload.genres()?;
        let mut conn = self
            .executor
            .acquire()
            .await
            .map_err(|e| Error::failed(Operation::Update, e.into()))?;

        let updated = transactional(&mut *conn, Operation::Update, |tx| {
            Box::pin(update_movie(tx, id, payload, genres))
        })
        .await?;
        if updated.is_none() {
            debug!("Movie {id} not found for update");
            return Ok(None);
        }
        info!("Updated movie {id}");

        fetch_movie(&mut *conn, id)
            .await
            .map_err(|e| Error::failed(Operation::Update, e))
    }

    /// Deletes movie together with its genre links.
    /// Returns `None` if there is no such movie.
    pub async fn delete(&self, id: Uuid) -> Result<Option<DeleteResult>> {
        let mut conn = self
            .executor
            .acquire()
            .await
            .map_err(|e| Error::failed(Operation::Delete, e.into()))?;

        let deleted = transactional(&mut *conn, Operation::Delete, |tx| {
            Box::pin(delete_movie(tx, id))
        })
        .await?;
        if let Some(ref res) = deleted {
            info!(
                "Deleted {} movie(s) and {} related genre link(s)",
                res.movies, res.genres
            );
        }
        Ok(deleted)
    }
}

/// Runs `body` in a transaction on given connection.
///
/// Commits when body returns `Ok(Some(_))`, rolls back on `Ok(None)` (target row not found)
/// or on any error. Errors other than domain errors are reported as failure of `operation`.
pub(crate) async fn transactional<T, F>(
    conn: &mut ChosenConnection,
    operation: Operation,
    body: F,
) -> Result<Option<T>>
where
    T: Send,
    F: for<'t> FnOnce(&'t mut ChosenConnection) -> BoxFuture<'t, Result<Option<T>>>,
{
    let mut transaction = Connection::begin(conn)
        .await
        .map_err(|e| Error::failed(operation, e.into()))?;

    match body(&mut *transaction).await {
        Ok(Some(value)) => {
            transaction
                .commit()
                .await
                .map_err(|e| Error::failed(operation, e.into()))?;
            Ok(Some(value))
        }
        Ok(None) => {
            transaction.rollback().await?;
            Ok(None)
        }
        Err(e) => {
            error!("Failed to {operation} movie, rolling back: {e}");
            transaction.rollback().await?;
            Err(Error::failed(operation, e))
        }
    }
}

async fn fetch_movie(conn: &mut ChosenConnection, id: Uuid) -> Result<Option<Movie>> {
    let record = sqlx::query_as::<_, MovieInt>(&format!("{SELECT_MOVIES} WHERE m.id = ? GROUP BY m.id"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(record.map(Movie::from))
}

async fn insert_movie(
    conn: &mut ChosenConnection,
    payload: CreateMovie,
    genres: Vec<Genre>,
) -> Result<Option<Uuid>> {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO movies (id, title, year, director, duration, poster, rate) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(&payload.title)
    .bind(payload.year)
    .bind(&payload.director)
    .bind(payload.duration)
    .bind(&payload.poster)
    .bind(payload.rate)
    .execute(&mut *conn)
    .await?;

    let genre_ids = genre::resolve_ids(&mut *conn, &genres).await?;
    let linked = link_genres(&mut *conn, id, &genre_ids).await?;
    debug!("Inserted movie {id} with {linked} genre(s)");
    Ok(Some(id))
}

async fn update_movie(
    conn: &mut ChosenConnection,
    id: Uuid,
    payload: UpdateMovie,
    genres: Option<Vec<Genre>>,
) -> Result<Option<()>> {
    let mut query = QueryBuilder::<ChosenDB>::new("UPDATE movies SET ");
    let mut columns: Vec<&'static str> = Vec::new();
    {
        let mut set = query.separated(", ");
        if let Some(title) = payload.title {
            set.push("title = ").push_bind_unseparated(title);
            columns.push("title");
        }
        if let Some(year) = payload.year {
            set.push("year = ").push_bind_unseparated(year);
            columns.push("year");
        }
        if let Some(duration) = payload.duration {
            set.push("duration = ").push_bind_unseparated(duration);
            columns.push("duration");
        }
        if let Some(director) = payload.director {
            set.push("director = ").push_bind_unseparated(director);
            columns.push("director");
        }
        if let Some(rate) = payload.rate {
            set.push("rate = ").push_bind_unseparated(rate);
            columns.push("rate");
        }
        if let Some(poster) = payload.poster {
            set.push("poster = ").push_bind_unseparated(poster);
            columns.push("poster");
        }
        // still tells whether the movie exists
        if columns.is_empty() {
            set.push("id = id");
        }
    }
    query.push(" WHERE id = ").push_bind(id);
    debug!("Updating columns {columns:?} of movie {id}");

    let result = query.build().execute(&mut *conn).await?;
    if result.rows_affected() == 0 {
        return Ok(None);
    }

    if let Some(genres) = genres {
        let genre_ids = genre::resolve_ids(&mut *conn, &genres).await?;
        let unlinked = unlink_genres(&mut *conn, id).await?;
        let linked = link_genres(&mut *conn, id, &genre_ids).await?;
        debug!("Replaced {unlinked} genre link(s) with {linked} for movie {id}");
    }

    Ok(Some(()))
}

async fn delete_movie(conn: &mut ChosenConnection, id: Uuid) -> Result<Option<DeleteResult>> {
    let genres = unlink_genres(&mut *conn, id).await?;
    let movies = sqlx::query("DELETE FROM movies WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    if movies == 0 {
        return Ok(None);
    }
    Ok(Some(DeleteResult { movies, genres }))
}

async fn unlink_genres(conn: &mut ChosenConnection, movie_id: Uuid) -> Result<u64> {
    let res = sqlx::query("DELETE FROM movie_genres WHERE movie_id = ?")
        .bind(movie_id)
        .execute(&mut *conn)
        .await?;
    Ok(res.rows_affected())
}

async fn link_genres(conn: &mut ChosenConnection, movie_id: Uuid, genre_ids: &[i64]) -> Result<u64> {
    if genre_ids.is_empty() {
        return Ok(0);
    }
    let mut query = QueryBuilder::<ChosenDB>::new("INSERT INTO movie_genres (movie_id, genre_id) ");
    query.push_values(genre_ids, |mut row, genre_id| {
        row.push_bind(movie_id).push_bind(*genre_id);
    });
    let res = query.build().execute(&mut *conn).await?;
    Ok(res.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_movie() -> serde_json::Value {
        json!({
            "title": "The Matrix",
            "year": 1999,
            "director": "Lana Wachowski",
            "duration": 136,
            "poster": "https://example.com/matrix.jpg",
            "genre": ["Action", "sci-fi"]
        })
    }

    fn failed_fields(report: &garde::Report) -> Vec<String> {
        report.iter().map(|(path, _)| path.to_string()).collect()
    }

    #[test]
    fn test_valid_movie() {
        let movie: CreateMovie = serde_json::from_value(valid_movie()).unwrap();
        movie.validate().unwrap();
        assert_eq!(movie.rate, DEFAULT_RATE);
        assert_eq!(movie.genres().unwrap(), vec![Genre::Action, Genre::SciFi]);
    }

    #[test]
    fn test_invalid_fields() {
        let mut payload = valid_movie();
        payload["year"] = json!(1850);
        payload["duration"] = json!(0);
        payload["rate"] = json!(11.5);
        payload["poster"] = json!("not a url");
        payload["genre"] = json!(["drama", "western"]);
        let movie: CreateMovie = serde_json::from_value(payload).unwrap();
        let report = movie.validate().unwrap_err();
        let fields = failed_fields(&report);
        for field in ["year", "duration", "rate", "poster", "genre[1]"] {
            assert!(
                fields.iter().any(|f| f == field),
                "{field} not in {fields:?}"
            );
        }
        assert!(!fields.iter().any(|f| f == "genre[0]"));
    }

    #[test]
    fn test_empty_genres() {
        let mut payload = valid_movie();
        payload["genre"] = json!([]);
        let movie: CreateMovie = serde_json::from_value(payload).unwrap();
        let report = movie.validate().unwrap_err();
        assert_eq!(failed_fields(&report), vec!["genre".to_string()]);
    }

    #[test]
    fn test_missing_required_field() {
        let mut payload = valid_movie();
        payload.as_object_mut().unwrap().remove("title");
        assert!(serde_json::from_value::<CreateMovie>(payload).is_err());
    }

    #[test]
    fn test_partial_movie() {
        let empty: UpdateMovie = serde_json::from_value(json!({})).unwrap();
        empty.validate().unwrap();
        assert!(empty.genres().unwrap().is_none());

        let patch: UpdateMovie =
            serde_json::from_value(json!({"year": 2030, "genre": ["DRAMA", "drama"]})).unwrap();
        let report = patch.validate().unwrap_err();
        assert_eq!(failed_fields(&report), vec!["year".to_string()]);
        assert_eq!(patch.genres().unwrap(), Some(vec![Genre::Drama]));

        let patch: UpdateMovie =
            serde_json::from_value(json!({"genre": ["drama", "noir"]})).unwrap();
        let report = patch.validate().unwrap_err();
        assert_eq!(failed_fields(&report), vec!["genre[1]".to_string()]);

        let patch: UpdateMovie = serde_json::from_value(json!({"genre": []})).unwrap();
        let report = patch.validate().unwrap_err();
        assert_eq!(failed_fields(&report), vec!["genre".to_string()]);
    }
}
