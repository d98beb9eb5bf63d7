//! Command-line and environment configuration.
//!
//! Every flag falls back to a `RELAY_*` environment variable, then to a
//! built-in default. [`RelayConfig`] is the validated result.

use crate::backend::{gemini, RetryPolicy};
use crate::client::{GenerationConfig, DEFAULT_MODEL};
use crate::credentials::DEFAULT_KEY_PREFIX;
use crate::error::Result;
use crate::handler::DEFAULT_TEMPLATE;
use crate::RelayError;
use clap::{Args, Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Command line interface for the relay binary.
#[derive(Parser, Debug)]
#[command(name = "llm-relay")]
#[command(version, about = "Prompt-template relay to a hosted LLM with credential rotation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Append an API key to the credential file
    AddKey {
        /// The key to add
        key: String,
    },
}

/// Shared settings, accepted before or after the subcommand.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Interface to bind
    #[arg(long, env = "RELAY_HOST", default_value = "0.0.0.0", global = true)]
    pub host: String,

    /// Port to bind
    #[arg(long, env = "RELAY_PORT", default_value_t = 8000, global = true)]
    pub port: u16,

    /// Directory holding prompt templates
    #[arg(long, env = "RELAY_TEMPLATE_DIR", default_value = "prompt_templates", global = true)]
    pub template_dir: PathBuf,

    /// Template file extension
    #[arg(long, env = "RELAY_TEMPLATE_EXT", default_value = "tpl", global = true)]
    pub template_ext: String,

    /// Template rendered for /generate
    #[arg(long, env = "RELAY_TEMPLATE", default_value = DEFAULT_TEMPLATE, global = true)]
    pub template_name: String,

    /// Env file holding the API keys
    #[arg(long, env = "RELAY_ENV_FILE", default_value = "api_keys.env", global = true)]
    pub env_file: PathBuf,

    /// Key name prefix inside the env file
    #[arg(long, env = "RELAY_KEY_PREFIX", default_value = DEFAULT_KEY_PREFIX, global = true)]
    pub key_prefix: String,

    /// Model identifier
    #[arg(long, env = "RELAY_MODEL", default_value = DEFAULT_MODEL, global = true)]
    pub model: String,

    /// Provider API base URL
    #[arg(long, env = "RELAY_BASE_URL", default_value = gemini::DEFAULT_BASE_URL, global = true)]
    pub base_url: String,

    /// Failure budget per counter
    #[arg(long, env = "RELAY_MAX_RETRIES", default_value_t = 3, global = true)]
    pub max_retries: u32,

    /// Delay between retries, in milliseconds
    #[arg(long, env = "RELAY_RETRY_DELAY_MS", default_value_t = 1000, global = true)]
    pub retry_delay_ms: u64,

    /// Upper bound on one model call, in seconds (0 disables)
    #[arg(long, env = "RELAY_CALL_TIMEOUT_SECS", default_value_t = 60, global = true)]
    pub call_timeout_secs: u64,

    /// Sampling temperature forwarded to the model
    #[arg(long, env = "RELAY_TEMPERATURE", global = true)]
    pub temperature: Option<f64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RELAY_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,
}

/// Resolved and validated configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub addr: SocketAddr,
    pub template_dir: PathBuf,
    pub template_ext: String,
    pub template_name: String,
    pub env_file: PathBuf,
    pub key_prefix: String,
    pub model: String,
    pub base_url: String,
    pub generation: GenerationConfig,
    pub retry: RetryPolicy,
    pub log_level: String,
}

impl RelayConfig {
    pub fn from_settings(s: &Settings) -> Result<Self> {
        let ip: IpAddr = s.host.parse().map_err(|e| {
            RelayError::InvalidConfig(format!("bad listen host {}: {}", s.host, e))
        })?;
        let addr = SocketAddr::new(ip, s.port);

        if s.max_retries == 0 {
            return Err(RelayError::InvalidConfig(
                "max retries must be at least 1".into(),
            ));
        }
        if s.template_name.trim().is_empty() {
            return Err(RelayError::InvalidConfig("template name is empty".into()));
        }
        if s.key_prefix.trim().is_empty() {
            return Err(RelayError::InvalidConfig("key prefix is empty".into()));
        }
        if let Some(t) = s.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(RelayError::InvalidConfig(format!(
                    "temperature {} outside 0.0..=2.0",
                    t
                )));
            }
        }

        let mut retry = RetryPolicy::fixed(s.max_retries, Duration::from_millis(s.retry_delay_ms));
        if s.call_timeout_secs > 0 {
            retry = retry.with_call_timeout(Duration::from_secs(s.call_timeout_secs));
        }

        let mut generation = GenerationConfig::default();
        if let Some(t) = s.temperature {
            generation = generation.with_temperature(t);
        }

        Ok(Self {
            addr,
            template_dir: s.template_dir.clone(),
            template_ext: s.template_ext.clone(),
            template_name: s.template_name.clone(),
            env_file: s.env_file.clone(),
            key_prefix: s.key_prefix.clone(),
            model: s.model.clone(),
            base_url: s.base_url.clone(),
            generation,
            retry,
            log_level: s.log_level.clone(),
        })
    }
}
