use std::time::Duration;

use crate::error::Result;
pub use clap::Parser;
use movies_app::state::AppConfig;
use movies_dal::PoolConfig;

pub const DEFAULT_CORS_ORIGINS: [&str; 4] = [
    "http://localhost:8080",
    "http://localhost:1234",
    "https://movies.com",
    "https://midu.dev",
];

fn default_cors_origins() -> Vec<String> {
    DEFAULT_CORS_ORIGINS.iter().map(|o| o.to_string()).collect()
}

#[derive(Debug, Clone, clap::Parser)]
pub struct ServerConfig {
    #[arg(
        short,
        long,
        default_value_t = 1234,
        env = "PORT",
        help = "Port to listen on"
    )]
    pub port: u16,

    #[arg(
        short,
        long,
        default_value = "127.0.0.1",
        env = "MOVIES_LISTEN_ADDRESS",
        help = "Address to listen on"
    )]
    pub listen_address: String,

    #[arg(
        long,
        env = "MOVIES_DATABASE_URL",
        default_value = "sqlite://movies.db?mode=rwc",
        help = "Database URL e.g. sqlite://file.db"
    )]
    pub database_url: String,

    #[arg(
        long,
        env = "MOVIES_DB_MAX_CONNECTIONS",
        default_value_t = movies_dal::DEFAULT_MAX_CONNECTIONS,
        help = "Maximum number of pooled database connections"
    )]
    pub db_max_connections: u32,

    #[arg(
        long,
        env = "MOVIES_DB_ACQUIRE_TIMEOUT",
        default_value = "30s",
        help = "How long to wait for a free database connection, in human friendly format (e.g. 1m, 30s, 500ms)",
        value_parser = humantime::parse_duration
    )]
    pub db_acquire_timeout: Duration,

    #[arg(
        long,
        env = "MOVIES_INIT_SCHEMA",
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Create tables if missing and seed genres on startup"
    )]
    pub init_schema: bool,

    #[arg(
        long,
        env = "MOVIES_CORS_ORIGINS",
        value_delimiter = ',',
        default_values_t = default_cors_origins(),
        help = "Comma separated list of allowed CORS origins, * allows any origin"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "MOVIES_NO_CORS", help = "Disable CORS")]
    pub no_cors: bool,

    #[arg(
        long,
        env = "MOVIES_BODY_LIMIT_KB",
        default_value_t = 1024,
        help = "Maximum size of request body in kB"
    )]
    pub body_limit_kb: usize,
}

impl ServerConfig {
    pub fn load() -> Result<Self> {
        ServerConfig::try_parse().map_err(|e| e.into())
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.db_max_connections,
            acquire_timeout: self.db_acquire_timeout,
        }
    }

    pub fn any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o.trim() == "*")
    }
}

impl From<&ServerConfig> for AppConfig {
    fn from(config: &ServerConfig) -> Self {
        AppConfig {
            body_limit: config.body_limit_kb * 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::try_parse_from(["movies-server"]).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1");
        assert_eq!(config.db_acquire_timeout, Duration::from_secs(30));
        assert!(config.init_schema);
        assert!(!config.no_cors);
        assert!(!config.any_origin());
        assert_eq!(config.cors_origins.len(), DEFAULT_CORS_ORIGINS.len());
        assert_eq!(AppConfig::from(&config).body_limit, 1024 * 1024);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::try_parse_from([
            "movies-server",
            "--port",
            "8000",
            "--init-schema",
            "false",
            "--cors-origins",
            "https://a.example,*",
            "--db-acquire-timeout",
            "2s 500ms",
        ])
        .unwrap();
        assert_eq!(config.port, 8000);
        assert!(!config.init_schema);
        assert_eq!(config.cors_origins, vec!["https://a.example", "*"]);
        assert!(config.any_origin());
        assert_eq!(config.db_acquire_timeout, Duration::from_millis(2500));
    }
}
