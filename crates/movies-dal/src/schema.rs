//! Idempotent schema bootstrap: creates the movie tables when missing and seeds
//! the genre enumeration. There is no versioning, existing tables are left as they are.

use tracing::debug;

use crate::{Pool, error::Result, genre::Genre};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS movies (
    id BLOB NOT NULL PRIMARY KEY CHECK (length(id) = 16),
    title TEXT NOT NULL,
    year INTEGER NOT NULL,
    director TEXT NOT NULL,
    duration INTEGER NOT NULL,
    poster TEXT NOT NULL,
    rate REAL NOT NULL DEFAULT 5
);

CREATE TABLE IF NOT EXISTS genres (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS movie_genres (
    movie_id BLOB NOT NULL REFERENCES movies(id),
    genre_id INTEGER NOT NULL REFERENCES genres(id),
    PRIMARY KEY (movie_id, genre_id)
);

CREATE INDEX IF NOT EXISTS movie_genres_genre_idx ON movie_genres(genre_id);
"#;

pub async fn ensure_schema(pool: &Pool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    let mut transaction = pool.begin().await?;
    for genre in Genre::ALL {
        sqlx::query("INSERT OR IGNORE INTO genres (name) VALUES (?)")
            .bind(genre.as_str())
            .execute(&mut *transaction)
            .await?;
    }
    transaction.commit().await?;
    debug!("Schema ready, {} genres seeded", Genre::ALL.len());
    Ok(())
}
