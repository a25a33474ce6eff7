use crate::config::ServerConfig;
use crate::error::Result;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method, StatusCode},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::FutureExt;
use movies_app::state::{AppConfig, AppState};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

pub async fn run(args: ServerConfig) -> Result<()> {
    let state = build_state(&args).await?;
    run_with_state(args, state).await
}

pub async fn run_with_state(args: ServerConfig, state: AppState) -> Result<()> {
    let shutdown = tokio::signal::ctrl_c().map(|_| ());
    run_graceful_with_state(args, state, shutdown).await
}

pub async fn run_graceful_with_state<S>(
    args: ServerConfig,
    state: AppState,
    shutdown_signal: S,
) -> Result<()>
where
    S: std::future::Future<Output = ()> + Send + 'static,
{
    let mut app = main_router(state);

    if !args.no_cors {
        app = app.layer(cors_layer(&args)?);
    }

    let ip: std::net::IpAddr = args.listen_address.parse()?;
    let addr = std::net::SocketAddr::from((ip, args.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;
    info!("Server stopped");
    Ok(())
}

fn cors_layer(args: &ServerConfig) -> Result<CorsLayer> {
    if args.any_origin() {
        return Ok(CorsLayer::very_permissive());
    }
    let origins = args
        .cors_origins
        .iter()
        .map(|o| HeaderValue::from_str(o.trim()))
        .collect::<Result<Vec<_>, _>>()?;
    debug!("CORS allowed origins: {:?}", origins);
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

pub fn main_router(state: AppState) -> Router<()> {
    let body_limit = state.config().body_limit;
    Router::new()
        .nest("/movies", movies_app::rest_api::movie::router())
        .nest("/genres", movies_app::rest_api::genre::router())
        .with_state(state)
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(map_response(strip_server_headers))
        .layer(TraceLayer::new_for_http())
}

async fn strip_server_headers(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.remove("x-powered-by");
    headers.remove(header::SERVER);
    response
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let app_config: AppConfig = config.into();
    let pool = movies_dal::new_pool(&config.database_url, &config.pool_config()).await?;
    if config.init_schema {
        movies_dal::schema::ensure_schema(&pool).await?;
        info!("Database schema ready");
    }
    Ok(AppState::new(app_config, pool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parser as _;

    #[tokio::test]
    async fn test_strip_server_headers() {
        let mut response = (StatusCode::OK, "OK").into_response();
        response
            .headers_mut()
            .insert("x-powered-by", HeaderValue::from_static("Express"));
        response
            .headers_mut()
            .insert(header::SERVER, HeaderValue::from_static("axum"));
        let response = strip_server_headers(response).await;
        assert!(response.headers().get("x-powered-by").is_none());
        assert!(response.headers().get(header::SERVER).is_none());
    }

    #[test]
    fn test_invalid_cors_origin() {
        let args = ServerConfig::try_parse_from([
            "movies-server",
            "--cors-origins",
            "https://ok.example,bad\norigin",
        ])
        .unwrap();
        assert!(cors_layer(&args).is_err());
    }
}
