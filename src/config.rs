use anyhow::{bail, Context, Result};
use std::env;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub backend: StoreBackend,
    pub log_filter: String,
}

impl Config {
    /// Reads the process environment. Call `dotenvy::dotenv()` first if a
    /// `.env` file should be honoured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match get("PORT") {
            Some(raw) => raw.parse().with_context(|| format!("invalid PORT: {raw}"))?,
            None => 8081,
        };
        let db_max_connections = match get("DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("invalid DB_MAX_CONNECTIONS: {raw}"))?,
            None => 10,
        };
        let backend = match get("STORE_BACKEND").as_deref() {
            None | Some("postgres") => StoreBackend::Postgres,
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("unknown STORE_BACKEND: {other}"),
        };
        let database_url = get("DATABASE_URL");
        if backend == StoreBackend::Postgres && database_url.is_none() {
            bail!("DATABASE_URL not set");
        }

        Ok(Self {
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url,
            db_max_connections,
            backend,
            log_filter: get("RUST_LOG").unwrap_or_else(|| "studyhub=info,tower_http=info".into()),
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}
