use std::{fmt::Display, str::FromStr};

use futures::TryStreamExt as _;
use serde::{Deserialize, Serialize};
use sqlx::Pool;

use crate::{ChosenConnection, Error, error::Result};

/// Fixed set of genres seeded into the `genres` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    Action,
    Adventure,
    Crime,
    Comedy,
    Drama,
    Fantasy,
    Horror,
    Thriller,
    #[serde(rename = "sci-fi")]
    SciFi,
    Romance,
    Animation,
    Biography,
}

impl Genre {
    pub const ALL: [Genre; 12] = [
        Genre::Action,
        Genre::Adventure,
        Genre::Crime,
        Genre::Comedy,
        Genre::Drama,
        Genre::Fantasy,
        Genre::Horror,
        Genre::Thriller,
        Genre::SciFi,
        Genre::Romance,
        Genre::Animation,
        Genre::Biography,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Genre::Action => "action",
            Genre::Adventure => "adventure",
            Genre::Crime => "crime",
            Genre::Comedy => "comedy",
            Genre::Drama => "drama",
            Genre::Fantasy => "fantasy",
            Genre::Horror => "horror",
            Genre::Thriller => "thriller",
            Genre::SciFi => "sci-fi",
            Genre::Romance => "romance",
            Genre::Animation => "animation",
            Genre::Biography => "biography",
        }
    }
}

impl FromStr for Genre {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_lowercase();
        Genre::ALL
            .into_iter()
            .find(|g| g.as_str() == name)
            .ok_or_else(|| Error::InvalidGenre(s.to_string()))
    }
}

impl Display for Genre {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
pub struct GenreRecord {
    pub id: i64,
    pub name: String,
}

pub type GenreRepository = GenreRepositoryImpl<Pool<crate::ChosenDB>>;

pub struct GenreRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> GenreRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = crate::ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn list(&self) -> Result<Vec<GenreRecord>> {
        let records = sqlx::query_as::<_, GenreRecord>("SELECT id, name FROM genres ORDER BY name")
            .fetch(&self.executor)
            .try_collect::<Vec<_>>()
            .await?;
        Ok(records)
    }

    /// Case insensitive lookup, `None` when there is no such genre.
    pub async fn find_id(&self, name: &str) -> Result<Option<i64>> {
        let id = sqlx::query_scalar::<_, i64>("SELECT id FROM genres WHERE lower(name) = ?")
            .bind(name.trim().to_lowercase())
            .fetch_optional(&self.executor)
            .await?;
        Ok(id)
    }
}

/// Resolves all genres to their ids in one query.
/// Fails with [`Error::UnknownGenre`] on the first genre missing from the table.
pub(crate) async fn resolve_ids(
    conn: &mut ChosenConnection,
    genres: &[Genre],
) -> Result<Vec<i64>> {
    if genres.is_empty() {
        return Ok(Vec::new());
    }
    let mut query = sqlx::QueryBuilder::<crate::ChosenDB>::new(
        "SELECT id, name FROM genres WHERE lower(name) IN (",
    );
    let mut names = query.separated(", ");
    for genre in genres {
        names.push_bind(genre.as_str());
    }
    names.push_unseparated(")");

    let found: Vec<GenreRecord> = query.build_query_as().fetch_all(&mut *conn).await?;

    genres
        .iter()
        .map(|genre| {
            found
                .iter()
                .find(|r| r.name.eq_ignore_ascii_case(genre.as_str()))
                .map(|r| r.id)
                .ok_or_else(|| Error::UnknownGenre(genre.to_string()))
        })
        .collect()
}
