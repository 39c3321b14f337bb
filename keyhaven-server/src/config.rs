//! Server configuration, sourced from the deployment environment.

use keyhaven_core::MasterKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),

    #[error("KEYHAVEN_MASTER_KEY is not a base64-encoded 32-byte key: {0}")]
    InvalidMasterKey(String),

    #[error("invalid value for {var}: {message}")]
    InvalidVar { var: &'static str, message: String },
}

/// Credentials for one OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

/// Runtime configuration.
///
/// The server refuses to start without a database path, a master key and
/// a bearer signing secret. Everything else has defaults.
pub struct ServerConfig {
    pub listen_addr: String,
    pub database_path: PathBuf,
    pub master_key: MasterKey,
    pub jwt_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub hash_time_cost: u32,
    pub frontend_origin: String,
    pub google: Option<OAuthCredentials>,
    pub github: Option<OAuthCredentials>,
    pub production: bool,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
    /// Auth endpoints: requests per window per client address.
    pub auth_rate_limit: u32,
    /// Everything else: requests per window per client address.
    pub general_rate_limit: u32,
    pub rate_limit_window_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_path =
            PathBuf::from(require("DATABASE_URL").or_else(|_| require("KEYHAVEN_DATABASE"))?);

        let master_key_b64 = require("KEYHAVEN_MASTER_KEY")?;
        let master_key = MasterKey::from_base64(&master_key_b64)
            .map_err(|e| ConfigError::InvalidMasterKey(e.to_string()))?;

        let jwt_secret = require("KEYHAVEN_JWT_SECRET")?;

        let port: u16 = parse_or("KEYHAVEN_PORT", 8787)?;
        let access_ttl_mins: i64 = parse_or("KEYHAVEN_ACCESS_TTL_MINS", 15)?;
        let refresh_ttl_days: i64 = parse_or("KEYHAVEN_REFRESH_TTL_DAYS", 30)?;
        let hash_time_cost: u32 = parse_or("KEYHAVEN_HASH_COST", 3)?;

        let frontend_origin = std::env::var("KEYHAVEN_FRONTEND_ORIGIN")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let environment =
            std::env::var("KEYHAVEN_ENV").unwrap_or_else(|_| "development".to_string());

        Ok(Self {
            listen_addr: format!("0.0.0.0:{}", port),
            database_path,
            master_key,
            jwt_secret,
            access_ttl_secs: access_ttl_mins * 60,
            refresh_ttl_secs: refresh_ttl_days * 86_400,
            hash_time_cost,
            frontend_origin,
            google: oauth_credentials("GOOGLE"),
            github: oauth_credentials("GITHUB"),
            production: environment == "production",
            max_body_bytes: 10 * 1024,
            request_timeout_secs: 30,
            auth_rate_limit: 20,
            general_rate_limit: 100,
            rate_limit_window_secs: 15 * 60,
        })
    }

    /// URL the OAuth callback redirects to after sign-in.
    pub fn oauth_success_url(&self) -> String {
        format!("{}/auth/callback", self.frontend_origin.trim_end_matches('/'))
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self {
            listen_addr: "127.0.0.1:0".to_string(),
            database_path: PathBuf::from(":memory:"),
            master_key: MasterKey::from_bytes([7u8; 32]),
            jwt_secret: "test-signing-secret".to_string(),
            access_ttl_secs: 15 * 60,
            refresh_ttl_secs: 30 * 86_400,
            hash_time_cost: 1,
            frontend_origin: "http://localhost:5173".to_string(),
            google: None,
            github: None,
            production: false,
            max_body_bytes: 10 * 1024,
            request_timeout_secs: 30,
            auth_rate_limit: 1000,
            general_rate_limit: 1000,
            rate_limit_window_secs: 15 * 60,
        }
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::MissingVar(var)),
    }
}

fn parse_or<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError::InvalidVar {
            var,
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn oauth_credentials(provider: &str) -> Option<OAuthCredentials> {
    let client_id = std::env::var(format!("KEYHAVEN_{}_CLIENT_ID", provider)).ok()?;
    let client_secret = std::env::var(format!("KEYHAVEN_{}_CLIENT_SECRET", provider)).ok()?;
    let callback_url = std::env::var(format!("KEYHAVEN_{}_CALLBACK_URL", provider)).ok()?;
    Some(OAuthCredentials {
        client_id,
        client_secret,
        callback_url,
    })
}
