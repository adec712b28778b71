//! Runtime configuration read from the environment.
//!
//! | Variable                      | Default                  |
//! |-------------------------------|--------------------------|
//! | `OLLAMA_BASE_URL`             | `http://localhost:11434` |
//! | `OLLAMA_MODEL`                | `llama3.2`               |
//! | `ADVENTURE_LLM_TIMEOUT_SECS`  | `60`                     |
//! | `ADVENTURE_MAX_RETRIES`       | `2`                      |
//! | `ADVENTURE_HISTORY_WINDOW`    | `6`                      |
//! | `ADVENTURE_MAX_PARAGRAPHS`    | `3`                      |
//! | `ADVENTURE_EMBELLISH`         | `true`                   |

use std::str::FromStr;
use std::time::Duration;

use crate::llm::{RetryConfig, DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {var}")]
    InvalidValue { var: &'static str, value: String },
}

/// Text-completion service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    /// Per-request timeout.
    pub timeout: Duration,
    pub interpreter_temperature: f32,
    pub narrator_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            timeout: Duration::from_secs(60),
            interpreter_temperature: 0.2,
            narrator_temperature: 0.8,
        }
    }
}

/// Turn loop settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Turns of history shown to the interpreter.
    pub history_window: usize,
    /// Rule excerpts shown to the interpreter.
    pub max_rule_excerpts: usize,
    /// Paragraphs kept from each narration.
    pub max_paragraphs: usize,
    /// Rewrite plain narration through a second service call.
    pub embellish: bool,
    /// Service failures in a row that end the session.
    pub max_consecutive_failures: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 6,
            max_rule_excerpts: 8,
            max_paragraphs: 3,
            embellish: true,
            max_consecutive_failures: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub session: SessionConfig,
}

impl Config {
    /// Read the configuration from process environment variables.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let llm = LlmConfig {
            base_url: lookup("OLLAMA_BASE_URL").unwrap_or(defaults.llm.base_url),
            model: lookup("OLLAMA_MODEL").unwrap_or(defaults.llm.model),
            timeout: Duration::from_secs(parse_var(
                &lookup,
                "ADVENTURE_LLM_TIMEOUT_SECS",
                defaults.llm.timeout.as_secs(),
            )?),
            ..defaults.llm
        };

        let retry = RetryConfig {
            max_retries: parse_var(&lookup, "ADVENTURE_MAX_RETRIES", defaults.retry.max_retries)?,
            ..defaults.retry
        };

        let session = SessionConfig {
            history_window: parse_var(
                &lookup,
                "ADVENTURE_HISTORY_WINDOW",
                defaults.session.history_window,
            )?,
            max_paragraphs: parse_var(
                &lookup,
                "ADVENTURE_MAX_PARAGRAPHS",
                defaults.session.max_paragraphs,
            )?
            .max(1),
            embellish: match lookup("ADVENTURE_EMBELLISH") {
                Some(value) => parse_bool("ADVENTURE_EMBELLISH", &value)?,
                None => defaults.session.embellish,
            },
            ..defaults.session
        };

        Ok(Self {
            llm,
            retry,
            session,
        })
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        None => Ok(default),
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.llm.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("OLLAMA_MODEL", "mistral"),
            ("ADVENTURE_LLM_TIMEOUT_SECS", "15"),
            ("ADVENTURE_MAX_RETRIES", "0"),
            ("ADVENTURE_HISTORY_WINDOW", "2"),
            ("ADVENTURE_EMBELLISH", "off"),
        ]))
        .unwrap();

        assert_eq!(config.llm.model, "mistral");
        assert_eq!(config.llm.timeout, Duration::from_secs(15));
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.session.history_window, 2);
        assert!(!config.session.embellish);
    }

    #[test]
    fn test_invalid_value_names_variable() {
        let err = Config::from_lookup(lookup(&[("ADVENTURE_MAX_PARAGRAPHS", "many")])).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                var: "ADVENTURE_MAX_PARAGRAPHS",
                value: "many".into()
            }
        );
    }
}
