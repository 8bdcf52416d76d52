//! Configuration management for miniagent.
//!
//! Configuration can be set via environment variables:
//! - `OPENAI_API_KEY` - Required. API key for the chat completion endpoint.
//! - `OPENAI_BASE_URL` - Optional. Defaults to `https://api.openai.com/v1`.
//! - `DEFAULT_MODEL` - Optional. Defaults to `gpt-3.5-turbo`.
//! - `TEMPERATURE` - Optional. Sampling temperature. Defaults to `0`.
//! - `MAX_STEPS` - Optional. Maximum agent loop steps. Defaults to `10`.
//! - `SMTP_USER` / `SMTP_PASSWORD` - Optional. Enable the email tool when both are set.
//! - `SMTP_HOST` - Optional. Defaults to `smtp.gmail.com`.
//! - `SMTP_PORT` - Optional. Defaults to `465`.
//! - `EMAIL_RECIPIENTS` - Optional. Comma-separated addresses copied on every email.

use std::str::FromStr;

use thiserror::Error;

use crate::agent::DEFAULT_LIMIT;
use crate::tools::EmailSettings;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chat completion API key
    pub api_key: String,

    /// Base URL of the OpenAI-compatible API
    pub base_url: String,

    /// Model identifier
    pub default_model: String,

    /// Sampling temperature for every model call
    pub temperature: f32,

    /// Maximum steps per run
    pub max_steps: usize,

    /// SMTP settings; `None` disables the email tool
    pub email: Option<EmailSettings>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `OPENAI_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup("OPENAI_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("OPENAI_API_KEY".to_string()))?;

        let base_url = lookup("OPENAI_BASE_URL")
            .unwrap_or_else(|| "https://api.openai.com/v1".to_string());

        let default_model = lookup("DEFAULT_MODEL")
            .unwrap_or_else(|| "gpt-3.5-turbo".to_string());

        let temperature: f32 = parse_var(&lookup, "TEMPERATURE")?.unwrap_or(0.0);
        let max_steps: usize = parse_var(&lookup, "MAX_STEPS")?.unwrap_or(DEFAULT_LIMIT);

        let email = match (lookup("SMTP_USER"), lookup("SMTP_PASSWORD")) {
            (Some(user), Some(password)) => Some(EmailSettings {
                user,
                password,
                smtp_host: lookup("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: parse_var::<u16, _>(&lookup, "SMTP_PORT")?.unwrap_or(465),
                recipients: lookup("EMAIL_RECIPIENTS")
                    .map(|v| parse_list(&v))
                    .unwrap_or_default(),
            }),
            _ => None,
        };

        Ok(Self {
            api_key,
            base_url,
            default_model,
            temperature,
            max_steps,
            email,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String) -> Self {
        Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            default_model,
            temperature: 0.0,
            max_steps: DEFAULT_LIMIT,
            email: None,
        }
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("{}", e)))
        })
        .transpose()
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
