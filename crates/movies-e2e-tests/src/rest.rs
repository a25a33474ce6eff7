use anyhow::Result;
use movies_dal::movie::Movie;
use reqwest::Url;
use serde_json::json;
use tracing::info;

pub fn movie_payload(title: &str, year: i32, genres: &[&str]) -> serde_json::Value {
    json!({
        "title": title,
        "year": year,
        "director": "Test Director",
        "duration": 120,
        "poster": format!("https://example.com/{}.jpg", title.to_lowercase().replace(' ', "-")),
        "genre": genres,
    })
}

pub async fn create_movie(
    client: &reqwest::Client,
    base_url: &Url,
    payload: &serde_json::Value,
) -> Result<Movie> {
    let api_url = base_url.join("movies")?;

    let response = client.post(api_url).json(payload).send().await?;
    info!("Create response: {:#?}", response);
    assert_eq!(response.status().as_u16(), 201);

    let new_movie: Movie = response.json().await?;
    Ok(new_movie)
}

pub async fn list_movies(
    client: &reqwest::Client,
    base_url: &Url,
    genre: Option<&str>,
) -> Result<Vec<Movie>> {
    let mut api_url = base_url.join("movies")?;
    if let Some(genre) = genre {
        api_url.query_pairs_mut().append_pair("genre", genre);
    }
    let response = client.get(api_url).send().await?;
    assert!(response.status().is_success());
    let movies: Vec<Movie> = response.json().await?;
    Ok(movies)
}
