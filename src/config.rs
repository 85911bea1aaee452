use std::{str::FromStr, time::Duration};

use anyhow::Context;
use sqlx::postgres::PgConnectOptions;

use crate::db::RetryPolicy;

#[derive(Clone)]
pub struct JwtConfig {
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub connect_options: PgConnectOptions,
    pub max_connections: u32,
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup.
    ///
    /// `DATABASE_URL` wins when present; otherwise the connection is assembled
    /// from the `DB_*` parts.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let connect_options = match get("DATABASE_URL") {
            Some(url) => PgConnectOptions::from_str(&url).context("parse DATABASE_URL")?,
            None => PgConnectOptions::new()
                .host(&get("DB_HOST").context("DB_HOST is not set")?)
                .username(&get("DB_USER").context("DB_USER is not set")?)
                .password(&get("DB_PASSWORD").unwrap_or_default())
                .database(&get("DB_NAME").context("DB_NAME is not set")?)
                .port(parse_or(&get, "DB_PORT", 5432)),
        };

        let secret = get("JWT_SECRET").unwrap_or_default();
        if secret.trim().is_empty() {
            anyhow::bail!("JWT_SECRET must be set to a non-empty value");
        }

        let database = DatabaseConfig {
            connect_options,
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10),
            retry: RetryPolicy {
                max_attempts: parse_or(&get, "DB_CONNECT_ATTEMPTS", 10),
                base_delay: Duration::from_secs(parse_or(&get, "DB_CONNECT_BACKOFF_SECS", 2)),
            },
        };

        let server = ServerConfig {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080),
        };

        Ok(Self {
            database,
            jwt: JwtConfig { secret },
            server,
        })
    }
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
