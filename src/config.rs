use std::env;
use std::fmt::Display;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::Duration;
use tracing::{info, warn};

use crate::session::DEFAULT_SESSION_TTL_MINUTES;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub session_ttl_minutes: i64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            host: try_load("POLLS_HOST", "0.0.0.0")?,
            port: try_load("POLLS_PORT", "8000")?,
            database_url: optional("POLLS_DATABASE_URL"),
            db_max_connections: try_load("POLLS_DB_MAX_CONNECTIONS", "5")?,
            session_ttl_minutes: try_load("POLLS_SESSION_TTL_MINUTES", &DEFAULT_SESSION_TTL_MINUTES.to_string())?,
        })
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::minutes(self.session_ttl_minutes)
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => {
            warn!("{key} not set");
            None
        }
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| anyhow!("invalid {key} value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        let port: u16 = try_load("POLLS_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);
    }

    #[test]
    fn invalid_default_is_reported() {
        let r: anyhow::Result<u16> = try_load("POLLS_TEST_UNSET_PORT", "eighty");
        let e = r.unwrap_err().to_string();
        assert!(e.contains("POLLS_TEST_UNSET_PORT"), "{}", e);
    }
}
