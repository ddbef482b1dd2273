//! Startup configuration: command-line flags layered over environment variables.
//!
//! Precedence is flag, then non-blank environment variable, then built-in
//! default. Blank values at either layer are treated as unset.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use chat_provider_mock::MOCK_PROVIDER_ID;
use chat_provider_openai::{DEFAULT_MODEL, OPENAI_PROVIDER_ID};

pub use chat_api::DEFAULT_BASE_URL;

use crate::instructions::DEFAULT_INSTRUCTIONS_PATH;

pub const BASE_URL_ENV_VAR: &str = "OPENAI_BASE_URL";
pub const MODEL_ENV_VAR: &str = "CODYBOT_MODEL";
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";
pub const AGENTS_ENV_VAR: &str = "CODYBOT_AGENTS";
pub const LOG_FILE_ENV_VAR: &str = "CODYBOT_LOG_FILE";
pub const LOG_FILTER_ENV_VAR: &str = "CODYBOT_LOG";
pub const TIMEOUT_ENV_VAR: &str = "CODYBOT_TIMEOUT_SECS";
pub const PROVIDER_ENV_VAR: &str = "CODYBOT_PROVIDER";

pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, PartialEq, Eq, Parser)]
#[command(
    name = "codybot",
    version,
    about = "Terminal chat client for OpenAI-compatible streaming endpoints"
)]
pub struct Cli {
    /// Base URL for an OpenAI-compatible API
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Model name
    #[arg(long)]
    pub model: Option<String>,

    /// API key for the endpoint
    #[arg(long, value_name = "KEY")]
    pub api_key: Option<String>,

    /// Path to the project instructions file
    #[arg(long = "agents", value_name = "PATH")]
    pub agents: Option<PathBuf>,

    /// Write tracing output to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Whole-request timeout in seconds (default: none)
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Mock,
}

impl ProviderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            OPENAI_PROVIDER_ID => Some(Self::OpenAi),
            MOCK_PROVIDER_ID => Some(Self::Mock),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => OPENAI_PROVIDER_ID,
            Self::Mock => MOCK_PROVIDER_ID,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} must be a whole number of seconds, got '{value}'")]
    InvalidTimeout { key: &'static str, value: String },

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("unsupported provider '{0}'. Available providers: openai, mock")]
    UnknownProvider(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub instructions_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub log_filter: String,
    pub timeout: Option<Duration>,
    pub provider: ProviderKind,
}

impl Config {
    /// Resolves configuration from parsed flags and an environment lookup.
    pub fn resolve<F>(cli: Cli, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| env(key).and_then(non_blank);

        let base_url = cli
            .base_url
            .and_then(non_blank)
            .or_else(|| env_value(BASE_URL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = cli
            .model
            .and_then(non_blank)
            .or_else(|| env_value(MODEL_ENV_VAR))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_key = cli
            .api_key
            .and_then(non_blank)
            .or_else(|| env_value(API_KEY_ENV_VAR))
            .unwrap_or_default();
        let instructions_path = cli
            .agents
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| env_value(AGENTS_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INSTRUCTIONS_PATH));
        let log_file = cli
            .log_file
            .filter(|path| !path.as_os_str().is_empty())
            .or_else(|| env_value(LOG_FILE_ENV_VAR).map(PathBuf::from));
        let log_filter =
            env_value(LOG_FILTER_ENV_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let timeout_secs = match cli.timeout_secs {
            Some(secs) => Some(secs),
            None => env_value(TIMEOUT_ENV_VAR)
                .map(|value| {
                    value
                        .parse::<u64>()
                        .map_err(|_| ConfigError::InvalidTimeout {
                            key: TIMEOUT_ENV_VAR,
                            value,
                        })
                })
                .transpose()?,
        };
        let timeout = match timeout_secs {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        let provider = match env_value(PROVIDER_ENV_VAR) {
            Some(value) => {
                ProviderKind::parse(&value).ok_or(ConfigError::UnknownProvider(value))?
            }
            None => ProviderKind::OpenAi,
        };

        Ok(Self {
            base_url,
            model,
            api_key,
            instructions_path,
            log_file,
            log_filter,
            timeout,
            provider,
        })
    }

    /// Resolves configuration from process arguments and environment.
    pub fn from_process() -> Result<Self, ConfigError> {
        Self::resolve(Cli::parse(), |key| std::env::var(key).ok())
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
