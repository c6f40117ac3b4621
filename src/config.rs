//! Application configuration via environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Session store technology, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackendKind {
    Memory,
    DynamoDb,
    Redis,
}

impl FromStr for SessionBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "dynamodb" => Ok(Self::DynamoDb),
            "redis" => Ok(Self::Redis),
            other => Err(ConfigError::Invalid("SESSION_BACKEND", other.into())),
        }
    }
}

impl fmt::Display for SessionBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::DynamoDb => "dynamodb",
            Self::Redis => "redis",
        })
    }
}

/// User-profile store technology.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileBackendKind {
    Memory,
    DynamoDb,
}

impl FromStr for ProfileBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memory" => Ok(Self::Memory),
            "dynamodb" => Ok(Self::DynamoDb),
            other => Err(ConfigError::Invalid("PROFILE_BACKEND", other.into())),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt_secret: String,
    pub session_secret: String,
    pub port: u16,
    pub api_prefix: String,
    pub frontend_url: String,
    pub production: bool,
    pub session_backend: SessionBackendKind,
    /// `None` means the store default (30 minutes).
    pub session_ttl: Option<Duration>,
    pub token_ttl: Duration,
    pub dynamodb_table: String,
    pub dynamodb_endpoint: String,
    pub profile_backend: ProfileBackendKind,
    pub profile_table: String,
    pub redis_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `JWT_SECRET`. Everything else has a development default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.into());

        Ok(Self {
            jwt_secret: lookup("JWT_SECRET")
                .filter(|v| !v.is_empty())
                .ok_or_else(|| ConfigError::MissingEnv("JWT_SECRET".into()))?,
            session_secret: get("SESSION_SECRET", "change-me-in-production"),
            port: parse_or(&lookup, "PORT", 3000)?,
            api_prefix: get("API_PREFIX", "/api"),
            frontend_url: get("FRONTEND_URL", "http://localhost:3000"),
            production: lookup("APP_ENV").is_some_and(|v| v == "production"),
            session_backend: get("SESSION_BACKEND", "memory").parse()?,
            session_ttl: lookup("SESSION_TTL_SECS")
                .map(|v| {
                    v.parse()
                        .map(Duration::from_secs)
                        .map_err(|_| ConfigError::Invalid("SESSION_TTL_SECS", v))
                })
                .transpose()?,
            token_ttl: Duration::from_secs(parse_or(&lookup, "TOKEN_TTL_SECS", 3600)?),
            dynamodb_table: get("DYNAMODB_TABLE", "sessions"),
            dynamodb_endpoint: get("DYNAMODB_ENDPOINT", ""),
            profile_backend: get("PROFILE_BACKEND", "memory").parse()?,
            profile_table: get("PROFILE_TABLE", "user_profiles"),
            redis_url: get("REDIS_URL", "redis://localhost:6379"),
        })
    }

    /// Configuration for testing: in-memory stores, no env access.
    pub fn test_default() -> Self {
        Self {
            jwt_secret: "test-jwt-secret".into(),
            session_secret: "test-secret-key".into(),
            port: 3000,
            api_prefix: "/api".into(),
            frontend_url: "http://localhost:3000".into(),
            production: false,
            session_backend: SessionBackendKind::Memory,
            session_ttl: None,
            token_ttl: Duration::from_secs(3600),
            dynamodb_table: "sessions".into(),
            dynamodb_endpoint: String::new(),
            profile_backend: ProfileBackendKind::Memory,
            profile_table: "user_profiles".into(),
            redis_url: "redis://localhost:6379".into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(v) => v.parse().map_err(|_| ConfigError::Invalid(key, v)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_creates_valid_config() {
        let cfg = Config::test_default();
        assert_eq!(cfg.session_backend, SessionBackendKind::Memory);
        assert_eq!(cfg.api_prefix, "/api");
        assert!(cfg.session_ttl.is_none());
        assert!(!cfg.production);
    }

    #[test]
    fn test_missing_jwt_secret() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_defaults_from_env() {
        let cfg = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s")])).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.session_backend, SessionBackendKind::Memory);
        assert_eq!(cfg.profile_backend, ProfileBackendKind::Memory);
        assert_eq!(cfg.token_ttl, Duration::from_secs(3600));
        assert_eq!(cfg.redis_url, "redis://localhost:6379");
        assert!(cfg.session_ttl.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s"),
            ("SESSION_BACKEND", "redis"),
            ("PROFILE_BACKEND", "dynamodb"),
            ("SESSION_TTL_SECS", "10800"),
            ("APP_ENV", "production"),
            ("PORT", "8080"),
        ]))
        .unwrap();
        assert_eq!(cfg.session_backend, SessionBackendKind::Redis);
        assert_eq!(cfg.profile_backend, ProfileBackendKind::DynamoDb);
        assert_eq!(cfg.session_ttl, Some(Duration::from_secs(10800)));
        assert!(cfg.production);
        assert_eq!(cfg.port, 8080);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET", "s"),
            ("SESSION_BACKEND", "memcached"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("SESSION_BACKEND", _)));
    }

    #[test]
    fn test_bad_number_rejected() {
        let err = Config::from_lookup(lookup_from(&[("JWT_SECRET", "s"), ("PORT", "eighty")]))
            .unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
