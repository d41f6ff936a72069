use std::{env, fmt, str::FromStr};

use log::{info, warn};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::store_fault;

const DEFAULT_MAX_CONNECTIONS: &str = "5";
const DEFAULT_ORIGIN: &str = "http://localhost";
const DEFAULT_SESSION_HOURS: &str = "24";

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{key} is not set"),
            ConfigError::Invalid { key, reason } => write!(f, "Invalid {key} value: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone)]
pub struct CatalogConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub jwt_secret: String,
    /// Serving origin used in short links and report footers.
    pub origin: String,
    pub session_hours: i64,
}

impl CatalogConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: required(&lookup, "DATABASE_URL")?,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?,
            jwt_secret: required(&lookup, "JWT_SECRET")?,
            origin: try_load::<String, _>(&lookup, "SERVING_ORIGIN", DEFAULT_ORIGIN)?
                .trim_end_matches('/')
                .to_string(),
            session_hours: try_load(&lookup, "SESSION_HOURS", DEFAULT_SESSION_HOURS)?,
        })
    }
}

fn required<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).filter(|v| !v.is_empty()).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ConfigError::Missing(key)
    })
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }
        })
}

pub async fn connect(config: &CatalogConfig) -> Result<Pool<Postgres>, potion::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .map_err(store_fault)
}

/// Applies the embedded schema migrations.
pub async fn migrate(pool: &Pool<Postgres>) -> Result<(), potion::Error> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| store_fault(sqlx::Error::Migrate(Box::new(e))))?;

    info!("Catalog schema is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn optional_values_fall_back() {
        let config = CatalogConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "kitchen"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.origin, "http://localhost");
        assert_eq!(config.session_hours, 24);
    }

    #[test]
    fn origin_loses_trailing_slash() {
        let config = CatalogConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "kitchen"),
            ("SERVING_ORIGIN", "https://foodgram.example/"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
        ]))
        .unwrap();

        assert_eq!(config.origin, "https://foodgram.example");
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn missing_or_malformed_values_fail() {
        assert_eq!(
            CatalogConfig::from_lookup(lookup(&[("JWT_SECRET", "kitchen")])).unwrap_err(),
            ConfigError::Missing("DATABASE_URL")
        );

        let error = CatalogConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "kitchen"),
            ("SESSION_HOURS", "a day"),
        ]))
        .unwrap_err();
        assert!(matches!(error, ConfigError::Invalid { key: "SESSION_HOURS", .. }));
    }
}
