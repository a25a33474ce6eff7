use movies_dal::movie::Movie;
use movies_e2e_tests::{
    launch_env,
    rest::{create_movie, list_movies, movie_payload},
};
use serde_json::json;
use tracing::info;
use tracing_test::traced_test;

#[tokio::test]
#[traced_test]
async fn test_health() {
    let (client, base_url, _guard) = launch_env("server_health").await.unwrap();
    let response = client.get(base_url.join("health").unwrap()).send().await.unwrap();
    assert!(response.status().is_success());
    assert!(response.headers().get("server").is_none());
    assert!(response.headers().get("x-powered-by").is_none());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
#[traced_test]
async fn test_movies_crud() {
    let (client, base_url, _guard) = launch_env("movies_crud").await.unwrap();

    let movies = list_movies(&client, &base_url, None).await.unwrap();
    assert!(movies.is_empty());

    let payload = movie_payload("Heat", 1995, &["crime", "Drama", "action"]);
    let heat = create_movie(&client, &base_url, &payload).await.unwrap();
    assert_eq!(heat.title, "Heat");
    assert_eq!(heat.rate, 5.0);
    assert_eq!(heat.genres, vec!["action", "crime", "drama"]);

    let movie_url = base_url.join(&format!("movies/{}", heat.id)).unwrap();
    let response = client.get(movie_url.clone()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let fetched: Movie = response.json().await.unwrap();
    assert_eq!(fetched, heat);

    let response = client
        .patch(movie_url.clone())
        .json(&json!({"rate": 8.3, "genre": ["thriller"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let updated: Movie = response.json().await.unwrap();
    info!("Updated movie: {updated:?}");
    assert_eq!(updated.rate, 8.3);
    assert_eq!(updated.title, "Heat");
    assert_eq!(updated.genres, vec!["thriller"]);

    let response = client.delete(movie_url.clone()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Movie deleted");
    assert_eq!(body["movies"], 1);
    assert_eq!(body["genres"], 1);

    let response = client.get(movie_url.clone()).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = client.delete(movie_url).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
#[traced_test]
async fn test_filter_by_genre() {
    let (client, base_url, _guard) = launch_env("movies_genre").await.unwrap();

    create_movie(&client, &base_url, &movie_payload("Alien", 1979, &["horror", "sci-fi"]))
        .await
        .unwrap();
    create_movie(&client, &base_url, &movie_payload("Arrival", 2016, &["sci-fi", "drama"]))
        .await
        .unwrap();
    create_movie(&client, &base_url, &movie_payload("Amelie", 2001, &["romance"]))
        .await
        .unwrap();

    let all = list_movies(&client, &base_url, None).await.unwrap();
    assert_eq!(all.len(), 3);

    let scifi = list_movies(&client, &base_url, Some("SCI-FI")).await.unwrap();
    let titles: Vec<_> = scifi.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, vec!["Alien", "Arrival"]);

    let none = list_movies(&client, &base_url, Some("western")).await.unwrap();
    assert!(none.is_empty());

    let unfiltered = list_movies(&client, &base_url, Some("")).await.unwrap();
    assert_eq!(unfiltered.len(), 3);
    let unfiltered = list_movies(&client, &base_url, Some("  ")).await.unwrap();
    assert_eq!(unfiltered.len(), 3);

    let response = client
        .get(base_url.join("genres").unwrap())
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let genres: Vec<serde_json::Value> = response.json().await.unwrap();
    assert_eq!(genres.len(), 12);
}

#[tokio::test]
#[traced_test]
async fn test_invalid_requests() {
    let (client, base_url, _guard) = launch_env("movies_invalid").await.unwrap();
    let movies_url = base_url.join("movies").unwrap();

    let response = client
        .post(movies_url.clone())
        .json(&movie_payload("Old", 1850, &["drama"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["errors"][0]["field"], "year");

    let response = client
        .post(movies_url.clone())
        .json(&movie_payload("Noir", 1950, &["noir"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .post(movies_url.clone())
        .json(&json!({"title": "Incomplete"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    let response = client
        .get(base_url.join("movies/not-a-uuid").unwrap())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not-a-uuid"));

    let missing = uuid::Uuid::new_v4();
    let response = client
        .patch(base_url.join(&format!("movies/{missing}")).unwrap())
        .json(&json!({"title": "Ghost"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let list = list_movies(&client, &base_url, None).await.unwrap();
    assert!(list.is_empty());
}

#[tokio::test]
#[traced_test]
async fn test_cors_preflight() {
    let (client, base_url, _guard) = launch_env("movies_cors").await.unwrap();
    let response = client
        .request(reqwest::Method::OPTIONS, base_url.join("movies").unwrap())
        .header("Origin", "http://localhost:8080")
        .header("Access-Control-Request-Method", "PATCH")
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .unwrap(),
        "http://localhost:8080"
    );
}
