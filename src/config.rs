// SPDX-License-Identifier: MIT

//! Application configuration loaded from environment variables.
//!
//! All knobs are read once at startup; nothing re-reads the environment at
//! request time.

use std::env;
use std::str::FromStr;

/// How much to trust a locally cached session before the auth provider has
/// re-confirmed it.
///
/// This is a deliberate product-risk decision, not an implementation detail:
/// `Authoritative` blocks protected reads until a server-verified session
/// exists (safer, slower first response); `CacheFirst` serves from the local
/// token immediately and re-validates in the background (faster, briefly
/// trusts an unrevoked-but-stale token). The two must never be blended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustPolicy {
    Authoritative,
    CacheFirst,
}

impl FromStr for TrustPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authoritative" => Ok(TrustPolicy::Authoritative),
            "cache-first" => Ok(TrustPolicy::CacheFirst),
            _ => Err(ConfigError::Invalid("SESSION_TRUST_POLICY")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Frontend URL for CORS and confirmation redirects
    pub frontend_url: String,
    /// GCP project ID (Firestore)
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    /// Base URL of the auth provider REST API
    pub auth_base_url: String,
    /// Auth provider public API key
    pub auth_api_key: String,
    /// HS256 secret the provider signs access tokens with (raw bytes).
    /// Used for the local (cached) decode path only.
    pub auth_jwt_secret: Vec<u8>,
    /// Session trust policy (see [`TrustPolicy`])
    pub trust_policy: TrustPolicy,
    /// Hard timeout for the authoritative session check, in seconds
    pub session_validate_timeout_secs: u64,
    /// How long a server-verified session may be served from cache, in seconds
    pub session_cache_ttl_secs: u64,

    /// Base URL of the text-generation API (config generation)
    pub generation_base_url: String,
    /// API key for the generation provider
    pub generation_api_key: String,
    /// Model used for tracker config generation
    pub generation_model: String,

    /// Unguessable path segment for the provider event webhook
    pub webhook_path_uuid: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let trust_policy = env::var("SESSION_TRUST_POLICY")
            .unwrap_or_else(|_| "authoritative".to_string())
            .parse()?;

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            auth_base_url: env::var("AUTH_BASE_URL")
                .map_err(|_| ConfigError::Missing("AUTH_BASE_URL"))?,
            auth_api_key: env::var("AUTH_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("AUTH_API_KEY"))?,
            auth_jwt_secret: env::var("AUTH_JWT_SECRET")
                .map_err(|_| ConfigError::Missing("AUTH_JWT_SECRET"))?
                .into_bytes(),
            trust_policy,
            session_validate_timeout_secs: env::var("SESSION_VALIDATE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            session_cache_ttl_secs: env::var("SESSION_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),

            generation_base_url: env::var("GENERATION_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            generation_api_key: env::var("GENERATION_API_KEY")
                .map(|v| v.trim().to_string())
                .unwrap_or_default(),
            generation_model: env::var("GENERATION_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),

            webhook_path_uuid: env::var("WEBHOOK_PATH_UUID")
                .map_err(|_| ConfigError::Missing("WEBHOOK_PATH_UUID"))?,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            auth_base_url: "http://localhost:9999".to_string(),
            auth_api_key: "test_api_key".to_string(),
            auth_jwt_secret: b"test_jwt_secret_32_bytes_long!!!".to_vec(),
            trust_policy: TrustPolicy::Authoritative,
            session_validate_timeout_secs: 5,
            session_cache_ttl_secs: 300,
            generation_base_url: "http://localhost:9998".to_string(),
            generation_api_key: "test_generation_key".to_string(),
            generation_model: "test-model".to_string(),
            webhook_path_uuid: "11111111-2222-3333-4444-555555555555".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        env::set_var("AUTH_BASE_URL", "http://localhost:9999");
        env::set_var("AUTH_API_KEY", "key");
        env::set_var("AUTH_JWT_SECRET", "test_jwt_secret_32_bytes_long!!!");
        env::set_var("WEBHOOK_PATH_UUID", "abc");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.auth_base_url, "http://localhost:9999");
        assert_eq!(config.port, 8080);
        assert_eq!(config.trust_policy, TrustPolicy::Authoritative);
        assert_eq!(config.session_validate_timeout_secs, 5);
    }

    #[test]
    fn test_trust_policy_parsing() {
        assert_eq!(
            "cache-first".parse::<TrustPolicy>().unwrap(),
            TrustPolicy::CacheFirst
        );
        assert!("optimistic-ish".parse::<TrustPolicy>().is_err());
    }
}
