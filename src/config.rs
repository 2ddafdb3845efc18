//! Process configuration, read from the environment once at startup

use crate::llm::{LlmConfig, DEFAULT_API_BASE, DEFAULT_MODEL};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Agent loop limits
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub max_steps: u32,
    pub llm_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub interaction_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub agent: AgentConfig,
    pub browser: BrowserConfig,
    pub screenshot_dir: PathBuf,
    pub screenshot_url_prefix: String,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source; empty values count as unset
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let llm = LlmConfig {
            api_key: get("OPENAI_API_KEY"),
            api_base: get("OPENAI_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            model: get("MODEL_NAME").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            streaming: parse_bool("LLM_STREAMING", get("LLM_STREAMING"), true)?,
        };

        let agent = AgentConfig {
            max_steps: parse_positive("AGENT_MAX_STEPS", get("AGENT_MAX_STEPS"), 25)?,
            llm_timeout: Duration::from_secs(parse_positive(
                "LLM_TIMEOUT_SECS",
                get("LLM_TIMEOUT_SECS"),
                120,
            )?),
        };

        let browser = BrowserConfig {
            headless: parse_bool("BROWSER_HEADLESS", get("BROWSER_HEADLESS"), true)?,
            interaction_timeout: Duration::from_secs(parse_positive(
                "BROWSER_TIMEOUT_SECS",
                get("BROWSER_TIMEOUT_SECS"),
                30,
            )?),
        };

        Ok(Self {
            llm,
            agent,
            browser,
            screenshot_dir: get("SCREENSHOT_DIR")
                .map_or_else(|| PathBuf::from("public"), PathBuf::from),
            screenshot_url_prefix: get("SCREENSHOT_URL_PREFIX")
                .unwrap_or_else(|| "/".to_string()),
            port: parse("AGENT_PORT", get("AGENT_PORT"), 3000)?,
        })
    }
}

fn parse<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value: raw,
        }),
    }
}

fn parse_positive<T>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let raw = value.clone();
    let parsed = parse(var, value, default)?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            var,
            value: raw.unwrap_or_default(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(parsed)
}

fn parse_bool(
    var: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}
