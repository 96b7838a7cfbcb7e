use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use quad_api::Settings;
use quad_policy::feed::FeedLimits;

/// Secrets that ship in sample env files and must never reach a running server.
const PLACEHOLDER_SECRETS: &[&str] = &["dev-secret-change-me", "change-me", "changeme", "secret"];

#[derive(Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub settings: Settings,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = get("QUAD_JWT_SECRET").context("QUAD_JWT_SECRET must be set")?;
        if jwt_secret.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("QUAD_JWT_SECRET is a placeholder; set a real secret");
        }

        let default_limit = parse(&get, "QUAD_FEED_DEFAULT_LIMIT", 20u32)?;
        let max_limit = parse(&get, "QUAD_FEED_MAX_LIMIT", 100u32)?;
        if default_limit == 0 || default_limit > max_limit {
            bail!("QUAD_FEED_DEFAULT_LIMIT must be between 1 and QUAD_FEED_MAX_LIMIT ({max_limit})");
        }

        Ok(Self {
            host: get("QUAD_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse(&get, "QUAD_PORT", 3000u16)?,
            db_path: PathBuf::from(get("QUAD_DB_PATH").unwrap_or_else(|| "quad.db".into())),
            jwt_secret,
            settings: Settings {
                enforce_capacity: parse(&get, "QUAD_ENFORCE_CAPACITY", false)?,
                feed_limits: FeedLimits {
                    default_limit,
                    max_limit,
                },
            },
        })
    }

    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}
