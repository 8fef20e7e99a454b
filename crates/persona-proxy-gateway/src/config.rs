//! Gateway configuration loaded from the environment (`.env` is loaded first by `main`).
//!
//! | Env | Default | Description |
//! |-----|---------|-------------|
//! | DEEPSEEK_API_KEY | required | Bearer token for the upstream API. Startup fails without it. |
//! | DEEPSEEK_API_URL | https://api.deepseek.com/v1/chat/completions | Chat-completions endpoint. |
//! | PERSONA_PROMPT | "You are a helpful AI assistant." | Default persona. |
//! | PERSONA_FULL_THRESHOLD | 100 | Personas longer than this (characters) are cached. |
//! | DEFAULT_MODEL | deepseek-chat | Model used when a request names none. |
//! | HOST / PORT | 0.0.0.0 / 3000 | Listen address. |
//! | NODE_ENV or APP_ENV | development | `production` serves the built frontend from STATIC_DIR. |
//! | STATIC_DIR | ../client/dist | Frontend build output. |
//! | UPSTREAM_TIMEOUT_SECS | unset | Optional upstream timeout; transport defaults otherwise. |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use persona_proxy_core::{PersonaPolicy, DEFAULT_FULL_THRESHOLD, DEFAULT_PERSONA};
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_STATIC_DIR: &str = "../client/dist";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DEEPSEEK_API_KEY is not set; add it to .env or the environment")]
    MissingApiKey,
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Decides whether the built frontend is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    Development,
    Production,
}

impl DeploymentMode {
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentMode::Development => "development",
            DeploymentMode::Production => "production",
        }
    }
}

impl fmt::Display for DeploymentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub api_key: String,
    pub api_url: String,
    pub default_persona: String,
    pub full_threshold: usize,
    pub default_model: String,
    pub host: String,
    pub port: u16,
    pub mode: DeploymentMode,
    pub static_dir: PathBuf,
    pub upstream_timeout: Option<Duration>,
}

// Never print the key.
impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("default_persona", &self.default_persona)
            .field("full_threshold", &self.full_threshold)
            .field("default_model", &self.default_model)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("mode", &self.mode)
            .field("static_dir", &self.static_dir)
            .field("upstream_timeout", &self.upstream_timeout)
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from any variable source; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = env_opt_string(&lookup, "DEEPSEEK_API_KEY").ok_or(ConfigError::MissingApiKey)?;

        let mode = env_opt_string(&lookup, "NODE_ENV")
            .or_else(|| env_opt_string(&lookup, "APP_ENV"))
            .map(|v| DeploymentMode::parse(&v))
            .unwrap_or(DeploymentMode::Development);

        let upstream_timeout = match env_opt_string(&lookup, "UPSTREAM_TIMEOUT_SECS") {
            Some(v) => Some(Duration::from_secs(parse_value("UPSTREAM_TIMEOUT_SECS", &v)?)),
            None => None,
        };

        Ok(Self {
            api_key,
            api_url: env_opt_string(&lookup, "DEEPSEEK_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            default_persona: env_opt_string(&lookup, "PERSONA_PROMPT")
                .unwrap_or_else(|| DEFAULT_PERSONA.to_string()),
            full_threshold: env_parse(&lookup, "PERSONA_FULL_THRESHOLD", DEFAULT_FULL_THRESHOLD)?,
            default_model: env_opt_string(&lookup, "DEFAULT_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            host: env_opt_string(&lookup, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: env_parse(&lookup, "PORT", DEFAULT_PORT)?,
            mode,
            static_dir: env_opt_string(&lookup, "STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR)),
            upstream_timeout,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn persona_policy(&self) -> PersonaPolicy {
        PersonaPolicy::new(self.full_threshold, self.default_persona.clone())
    }
}

fn env_opt_string<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match env_opt_string(lookup, name) {
        Some(v) => parse_value(name, &v),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn missing_api_key_is_fatal() {
        let err = GatewayConfig::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn blank_api_key_is_treated_as_missing() {
        let err = GatewayConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "   ")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingApiKey);
    }

    #[test]
    fn defaults_apply() {
        let config = GatewayConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "sk-1")])).unwrap();
        assert_eq!(config.api_key, "sk-1");
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.default_persona, DEFAULT_PERSONA);
        assert_eq!(config.full_threshold, 100);
        assert_eq!(config.default_model, DEFAULT_MODEL);
        assert_eq!(config.port, 3000);
        assert_eq!(config.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.mode, DeploymentMode::Development);
        assert_eq!(config.upstream_timeout, None);
    }

    #[test]
    fn overrides_apply() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("DEEPSEEK_API_KEY", "sk-1"),
            ("DEEPSEEK_API_URL", "http://localhost:9999/v1/chat/completions"),
            ("PERSONA_PROMPT", "You are a cat."),
            ("PERSONA_FULL_THRESHOLD", "40"),
            ("PORT", "8080"),
            ("NODE_ENV", "Production"),
            ("STATIC_DIR", "/srv/www"),
            ("UPSTREAM_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();
        assert_eq!(config.api_url, "http://localhost:9999/v1/chat/completions");
        assert_eq!(config.persona_policy().default_persona, "You are a cat.");
        assert_eq!(config.persona_policy().full_threshold, 40);
        assert_eq!(config.port, 8080);
        assert_eq!(config.mode, DeploymentMode::Production);
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.upstream_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn invalid_port_is_reported() {
        let err = GatewayConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "k"), ("PORT", "eighty")]))
            .unwrap_err();
        assert_eq!(
            err,
            ConfigError::Invalid {
                key: "PORT",
                value: "eighty".to_string()
            }
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let config = GatewayConfig::from_lookup(lookup(&[("DEEPSEEK_API_KEY", "sk-secret")])).unwrap();
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("<redacted>"));
    }
}
