use jobscout_core::cache::CacheTtls;
use jobscout_core::error::AppError;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};

/// Connection and TTL settings of the Redis cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u32,
    pub entity_ttl_secs: u64,
    pub existence_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        let ttls = CacheTtls::default();
        Self {
            host: "localhost".into(),
            port: 6379,
            password: None,
            db: 0,
            entity_ttl_secs: ttls.entity_secs,
            existence_ttl_secs: ttls.existence_secs,
        }
    }
}

impl CacheConfig {
    /// Read configuration from environment variables.
    ///
    /// - `REDIS_HOST` (defaults to `localhost`)
    /// - `REDIS_PORT` (defaults to 6379)
    /// - `REDIS_PASSWORD` (optional)
    /// - `REDIS_DB` (defaults to 0)
    /// - `REDIS_CACHE_TTL` (entity TTL in seconds, defaults to 3600)
    /// - `REDIS_EXISTENCE_TTL` (existence-fact TTL in seconds, defaults to 300)
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let password = lookup("REDIS_PASSWORD").filter(|p| !p.is_empty());

        Ok(Self {
            host: lookup("REDIS_HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port: parse_or(&lookup, "REDIS_PORT", defaults.port)?,
            password,
            db: parse_or(&lookup, "REDIS_DB", defaults.db)?,
            entity_ttl_secs: positive_or(&lookup, "REDIS_CACHE_TTL", defaults.entity_ttl_secs)?,
            existence_ttl_secs: positive_or(
                &lookup,
                "REDIS_EXISTENCE_TTL",
                defaults.existence_ttl_secs,
            )?,
        })
    }

    /// Structured connection target. The password is passed through as-is,
    /// never embedded in a URL.
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: i64::from(self.db),
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }

    pub fn ttls(&self) -> CacheTtls {
        CacheTtls {
            existence_secs: self.existence_ttl_secs,
            entity_secs: self.entity_ttl_secs,
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::ConfigError(format!("Invalid {key} '{raw}'"))),
    }
}

fn positive_or(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<u64, AppError> {
    let value = parse_or(lookup, key, default)?;
    if value == 0 {
        return Err(AppError::ConfigError(format!("{key} must be at least 1 second")));
    }
    Ok(value)
}
