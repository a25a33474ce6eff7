use std::{path::Path, time::Duration};

use anyhow::{Result, anyhow};
use movies_server::config::{Parser, ServerConfig};
use rand::Rng as _;
use reqwest::Url;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tracing::{debug, error};

pub mod rest;

fn random_port() -> Result<u16> {
    let mut rng = rand::rng();

    let mut retries = 3;
    while retries > 0 {
        let port: u16 = rng.random_range(3030..4030);
        let addr: std::net::SocketAddr = format!("127.0.0.1:{}", port).parse()?;
        match std::net::TcpStream::connect_timeout(&addr, Duration::from_millis(100)) {
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => return Ok(port),
            Err(_) => retries -= 1,
            Ok(_) => retries -= 1,
        }
    }

    Err(anyhow!("Could not find a free port"))
}

/// Keeps temporary database and running server alive for the duration of a test
pub struct ConfigGuard {
    #[allow(dead_code)]
    data_dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

pub fn test_config(test_name: &str, base_dir: &Path) -> Result<(ServerConfig, ConfigGuard)> {
    let tmp_data_dir = TempDir::with_prefix_in(format!("{}_", test_name), base_dir)?;
    let database_url = format!(
        "sqlite://{}?mode=rwc",
        tmp_data_dir.path().join("movies.db").display()
    );
    let port = random_port()?.to_string();
    let args = &[
        "movies-e2e-tests",
        "--port",
        &port,
        "--listen-address",
        "127.0.0.1",
        "--database-url",
        &database_url,
        "--cors-origins",
        "http://localhost:8080",
    ];
    let config = ServerConfig::try_parse_from(args)?;
    Ok((
        config,
        ConfigGuard {
            data_dir: tmp_data_dir,
            shutdown: None,
        },
    ))
}

pub fn base_url(config: &ServerConfig) -> Result<Url> {
    let url = format!("http://{}:{}/", config.listen_address, config.port);
    Ok(Url::parse(&url)?)
}

/// Starts server with fresh database and waits until it is healthy.
pub async fn launch_env(test_name: &str) -> Result<(reqwest::Client, Url, ConfigGuard)> {
    let (args, mut guard) = test_config(test_name, &std::env::temp_dir())?;
    let base_url = base_url(&args)?;
    let (tx, rx) = oneshot::channel::<()>();
    guard.shutdown = Some(tx);
    tokio::spawn(async move {
        let shutdown = async move {
            let _ = rx.await;
        };
        let state = match movies_server::build_state(&args).await {
            Ok(state) => state,
            Err(e) => {
                error!("Failed to build server state: {e}");
                return;
            }
        };
        if let Err(e) = movies_server::run_graceful_with_state(args, state, shutdown).await {
            error!("Server error: {e}");
        }
    });

    let client = reqwest::Client::new();
    let health_url = base_url.join("health")?;
    for _ in 0..50 {
        match client.get(health_url.clone()).send().await {
            Ok(response) if response.status().is_success() => {
                debug!("Server ready at {base_url}");
                return Ok((client, base_url, guard));
            }
            _ => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    Err(anyhow!("Server did not start in time"))
}
