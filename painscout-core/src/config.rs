//! Service configuration.
//!
//! Values come from an optional TOML file (path in `PAINSCOUT_CONFIG`) and are
//! then overridden by individual environment variables, so a deployment can
//! run from the environment alone.

use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};

use crate::error::ConfigError;

pub const CONFIG_PATH_VAR: &str = "PAINSCOUT_CONFIG";

const DEFAULT_SUBREDDITS: [&str; 6] = [
    "entrepreneur",
    "smallbusiness",
    "startups",
    "SaaS",
    "freelance",
    "productivity",
];

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub reddit: RedditConfig,
    pub billing: BillingConfig,
    pub llm: LlmConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Bearer key for the user-facing REST routes.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RedditConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Refresh token used by contact discovery; trends use client credentials.
    pub refresh_token: Option<String>,
    pub user_agent: String,
    pub subreddits: Vec<String>,
    pub trend_cache_minutes: u64,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct BillingConfig {
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub openai_api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmailConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub from: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            api_key: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://painscout.db?mode=rwc".to_string(),
            max_connections: 5,
        }
    }
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            user_agent: "painscout/0.1 (pain point discovery)".to_string(),
            subreddits: DEFAULT_SUBREDDITS.iter().map(|s| s.to_string()).collect(),
            trend_cache_minutes: 15,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: "gpt-4o-mini".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            from: "Painscout <billing@painscout.app>".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `.env` into the process environment when present, then defers to
    /// [`AppConfig::from_env`].
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        Self::from_env()
    }

    /// Loads the TOML file named by `PAINSCOUT_CONFIG` (if any), then applies
    /// environment overrides.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                debug!("{} not set, starting from defaults", CONFIG_PATH_VAR);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
            path: path.display().to_string(),
        })?;
        info!("Loading configuration from {}", path.display());
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    /// Applies overrides from `lookup`, normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = get("API_KEY") {
            self.server.api_key = Some(v);
        }
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = v;
        }
        if let Some(v) = get("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                v.parse().map_err(|_| ConfigError::InvalidValue {
                    field: "DATABASE_MAX_CONNECTIONS".to_string(),
                    value: v.clone(),
                })?;
        }
        if let Some(v) = get("REDDIT_CLIENT_ID") {
            self.reddit.client_id = Some(v);
        }
        if let Some(v) = get("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = Some(v);
        }
        if let Some(v) = get("REDDIT_REFRESH_TOKEN") {
            self.reddit.refresh_token = Some(v);
        }
        if let Some(v) = get("REDDIT_USER_AGENT") {
            self.reddit.user_agent = v;
        }
        if let Some(v) = get("TREND_SUBREDDITS") {
            self.reddit.subreddits = v
                .split(',')
                .map(|s| s.trim().trim_start_matches("r/").to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("RAZORPAY_WEBHOOK_SECRET") {
            self.billing.webhook_secret = Some(v);
        }
        if let Some(v) = get("OPENAI_API_KEY") {
            self.llm.openai_api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = get("EMAIL_API_URL") {
            self.email.api_url = Some(v);
        }
        if let Some(v) = get("EMAIL_API_KEY") {
            self.email.api_key = Some(v);
        }
        if let Some(v) = get("EMAIL_FROM") {
            self.email.from = v;
        }
        Ok(())
    }

    /// Checks the fields the service cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.client_id.is_none() {
            return Err(ConfigError::MissingField {
                field: "reddit.client_id".to_string(),
            });
        }
        if self.reddit.client_secret.is_none() {
            return Err(ConfigError::MissingField {
                field: "reddit.client_secret".to_string(),
            });
        }
        if self.billing.webhook_secret.is_none() {
            return Err(ConfigError::MissingField {
                field: "billing.webhook_secret".to_string(),
            });
        }
        if self.reddit.subreddits.is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "at least one subreddit must be configured".to_string(),
            });
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue {
                field: "database.max_connections".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn parses_partial_toml_over_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [reddit]
            client_id = "abc"
            subreddits = ["rust"]

            [billing]
            webhook_secret = "whsec"
            "#,
        )
        .unwrap();

        assert_eq!(config.reddit.client_id.as_deref(), Some("abc"));
        assert_eq!(config.reddit.subreddits, vec!["rust".to_string()]);
        assert_eq!(config.reddit.trend_cache_minutes, 15);
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> = [
            ("REDDIT_CLIENT_ID", "env-id"),
            ("TREND_SUBREDDITS", "r/startups, SaaS,,"),
            ("DATABASE_MAX_CONNECTIONS", "9"),
            ("OPENAI_MODEL", "  "),
        ]
        .into_iter()
        .collect();

        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.reddit.client_id.as_deref(), Some("env-id"));
        assert_eq!(config.reddit.subreddits, vec!["startups", "SaaS"]);
        assert_eq!(config.database.max_connections, 9);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn dotenv_file_feeds_env_overrides() {
        let path = std::env::temp_dir().join(format!("painscout-{}.env", std::process::id()));
        std::fs::write(&path, "REDDIT_USER_AGENT=dotenv-agent/1.0\n").unwrap();

        dotenvy::from_path(&path).unwrap();
        let config = AppConfig::from_env().unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.reddit.user_agent, "dotenv-agent/1.0");
    }

    #[test]
    fn rejects_non_numeric_connection_count() {
        let mut config = AppConfig::default();
        let result = config.apply_env(|key| {
            (key == "DATABASE_MAX_CONNECTIONS").then(|| "many".to_string())
        });
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let config = AppConfig::default();
        match config.validate() {
            Err(ConfigError::MissingField { field }) => assert_eq!(field, "reddit.client_id"),
            other => panic!("expected missing field, got {:?}", other),
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let result = AppConfig::from_toml_str("[reddit\nclient_id = 1");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
