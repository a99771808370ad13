//! Configuration management

use std::path::PathBuf;
use std::time::Duration;

use crate::ai_client::AiTimeouts;
use crate::memory::DEFAULT_CAPACITY;
use crate::rate_limit::{TierBudget, TierBudgets};

pub const DEFAULT_AI_API_URL: &str = "https://ai-api-premium-server.onrender.com";

/// Invalid environment value
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} has invalid value {value:?}: expected {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} must be set")]
    Missing(&'static str),
}

/// Bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (required only in bot mode)
    pub telegram_token: Option<String>,

    /// Base URL of the AI backend
    pub ai_api_url: String,

    /// Model name forwarded to the chat endpoint
    pub ai_model: String,

    /// Telegram user allowed to run admin commands
    pub admin_id: Option<i64>,

    /// Log level name (trace, debug, info, warn, error)
    pub log_level: String,

    /// Entries kept per user
    pub memory_capacity: usize,

    /// Entries rendered into the prompt context
    pub context_messages: usize,

    pub tier_budgets: TierBudgets,

    pub ai_timeouts: AiTimeouts,

    /// Optional TOML intent table replacing the built-in one
    pub intents_path: Option<PathBuf>,

    /// Port for the status HTTP server (disabled when unset)
    pub status_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let telegram_token = get("TELEGRAM_TOKEN").or_else(|| get("TELOXIDE_TOKEN"));

        let ai_api_url = get("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.to_string());
        let ai_model = get("AI_MODEL").unwrap_or_else(|| "claude-3".to_string());

        let admin_id = match get("ADMIN_ID") {
            Some(v) => match parse::<i64>("ADMIN_ID", &v, "an integer user id")? {
                0 => None,
                id => Some(id),
            },
            None => None,
        };

        let log_level = get("LOG_LEVEL")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| "info".to_string());

        let memory_capacity = match get("MEMORY_CAPACITY") {
            Some(v) => parse("MEMORY_CAPACITY", &v, "a non-negative integer")?,
            None => DEFAULT_CAPACITY,
        };
        let context_messages = match get("CONTEXT_MESSAGES") {
            Some(v) => parse("CONTEXT_MESSAGES", &v, "a non-negative integer")?,
            None => 6,
        };

        let defaults = TierBudgets::default();
        let tier_budgets = TierBudgets {
            standard: budget(get("RATE_STANDARD"), "RATE_STANDARD", defaults.standard)?,
            thinking: budget(get("RATE_THINKING"), "RATE_THINKING", defaults.thinking)?,
            generation: budget(get("RATE_GENERATION"), "RATE_GENERATION", defaults.generation)?,
        };

        let timeout_defaults = AiTimeouts::default();
        let ai_timeouts = AiTimeouts {
            health: secs(
                get("AI_HEALTH_TIMEOUT_SECS"),
                "AI_HEALTH_TIMEOUT_SECS",
                timeout_defaults.health,
            )?,
            standard: secs(get("AI_TIMEOUT_SECS"), "AI_TIMEOUT_SECS", timeout_defaults.standard)?,
            thinking: secs(
                get("AI_THINKING_TIMEOUT_SECS"),
                "AI_THINKING_TIMEOUT_SECS",
                timeout_defaults.thinking,
            )?,
            generation: secs(
                get("AI_GENERATION_TIMEOUT_SECS"),
                "AI_GENERATION_TIMEOUT_SECS",
                timeout_defaults.generation,
            )?,
        };

        let intents_path = get("INTENTS_PATH").map(PathBuf::from);

        let status_port = match get("STATUS_PORT") {
            Some(v) => Some(parse("STATUS_PORT", &v, "a port number")?),
            None => None,
        };

        Ok(Self {
            telegram_token,
            ai_api_url,
            ai_model,
            admin_id,
            log_level,
            memory_capacity,
            context_messages,
            tier_budgets,
            ai_timeouts,
            intents_path,
            status_port,
        })
    }

    /// Token or a `Missing` error
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.telegram_token
            .as_deref()
            .ok_or(ConfigError::Missing("TELEGRAM_TOKEN"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_token: None,
            ai_api_url: DEFAULT_AI_API_URL.to_string(),
            ai_model: "claude-3".to_string(),
            admin_id: None,
            log_level: "info".to_string(),
            memory_capacity: DEFAULT_CAPACITY,
            context_messages: 6,
            tier_budgets: TierBudgets::default(),
            ai_timeouts: AiTimeouts::default(),
            intents_path: None,
            status_port: None,
        }
    }
}

fn parse<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
        expected,
    })
}

fn budget(
    value: Option<String>,
    key: &'static str,
    default: TierBudget,
) -> Result<TierBudget, ConfigError> {
    match value {
        Some(v) => TierBudget::parse(&v).ok_or(ConfigError::Invalid {
            key,
            value: v,
            expected: "calls/seconds, e.g. 20/60",
        }),
        None => Ok(default),
    }
}

fn secs(
    value: Option<String>,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(v) => parse::<u64>(key, &v, "a number of seconds").map(Duration::from_secs),
        None => Ok(default),
    }
}
