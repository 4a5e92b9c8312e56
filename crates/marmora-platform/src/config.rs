use anyhow::{Context, Result};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub http_addr: String,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    fn from_lookup(
        default_http_addr: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let database_url = lookup("DATABASE_URL").context("DATABASE_URL is required")?;
        let database_max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            None => DEFAULT_MAX_CONNECTIONS,
        };
        let redis_url = lookup("REDIS_URL").context("REDIS_URL is required")?;
        let http_addr =
            lookup("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string());

        Ok(Self {
            database_url,
            database_max_connections,
            redis_url,
            http_addr,
        })
    }
}
