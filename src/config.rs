//! Environment-driven settings
//!
//! Values are read after `.env` has been loaded by the binary.

use crate::error::AppError;
use crate::Result;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.duckduckgo.com";
pub const DEFAULT_FINANCE_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_DB_URL: &str = "sqlite://agents.db?mode=rwc";
pub const DEFAULT_PORT: u16 = 8501;

#[derive(Debug, Clone)]
pub struct Settings {
    /// Pre-authorizes every session when present.
    pub openai_api_key: Option<String>,
    pub model: String,
    pub openai_base_url: String,
    pub port: u16,
    pub database_url: String,
    /// Prior turns replayed to the model for agents with conversation memory.
    pub history_turns: usize,
    pub max_tool_rounds: usize,
    pub request_timeout: Duration,
    /// Sessions untouched for this long are dropped.
    pub session_idle_timeout: Duration,
    pub search_base_url: String,
    pub finance_base_url: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            port: DEFAULT_PORT,
            database_url: DEFAULT_DB_URL.to_string(),
            history_turns: 3,
            max_tool_rounds: 5,
            request_timeout: Duration::from_secs(120),
            session_idle_timeout: Duration::from_secs(60 * 60),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            finance_base_url: DEFAULT_FINANCE_BASE_URL.to_string(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let port = match env::var("PORT").or_else(|_| env::var("API_PORT")) {
            Ok(raw) => parse_value("PORT", &raw)?,
            Err(_) => defaults.port,
        };

        Ok(Self {
            openai_api_key: env::var("OPENAI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            model: env::var("OPENAI_MODEL").unwrap_or(defaults.model),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.openai_base_url),
            port,
            database_url: env::var("AGENT_DB_URL").unwrap_or(defaults.database_url),
            history_turns: env_or("HISTORY_TURNS", defaults.history_turns)?,
            max_tool_rounds: env_or("MAX_TOOL_ROUNDS", defaults.max_tool_rounds)?,
            request_timeout: Duration::from_secs(env_or(
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            session_idle_timeout: Duration::from_secs(env_or(
                "SESSION_IDLE_SECS",
                defaults.session_idle_timeout.as_secs(),
            )?),
            search_base_url: env::var("SEARCH_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.search_base_url),
            finance_base_url: env::var("FINANCE_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.finance_base_url),
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => parse_value(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| AppError::ConfigError(format!("{} has an invalid value: {:?}", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.port, 8501);
        assert!(settings.openai_api_key.is_none());
        assert_eq!(settings.session_idle_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn test_parse_value_rejects_garbage() {
        let parsed: Result<u16> = parse_value("PORT", "not-a-port");
        assert!(matches!(parsed, Err(AppError::ConfigError(_))));

        let parsed: Result<usize> = parse_value("HISTORY_TURNS", " 7 ");
        assert_eq!(parsed.unwrap(), 7);
    }
}
