use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use secrecy::SecretString;
use supplydrop_types::audio::Voice;
use tracing::Level;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PROMPTS_PATH: &str = "prompts.json";
pub const DEFAULT_LOGS_DIR: &str = "logs";
pub const DEFAULT_REALTIME_URL: &str = "wss://api.openai.com/v1";
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub openai_api_key: SecretString,
    pub realtime_url: String,
    pub realtime_model: String,
    pub voice: Voice,
    pub prompts_path: PathBuf,
    pub logs_dir: PathBuf,
    pub public_host: Option<String>,
    pub barge_in: bool,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first if present.
    ///
    /// *   `OPENAI_API_KEY`: Your secret key for the OpenAI API. Required.
    /// *   `PORT`: Port to listen on. Defaults to 5000.
    /// *   `HOST`: Address to bind. Defaults to "0.0.0.0".
    /// *   `PROMPTS_PATH`: System prompt file. Defaults to "prompts.json".
    /// *   `LOGS_DIR`: Directory for per-call logs. Defaults to "logs".
    /// *   `OPENAI_REALTIME_URL`, `OPENAI_REALTIME_MODEL`: Realtime endpoint and model.
    /// *   `PUBLIC_HOST`: Host name Twilio should stream to, instead of the request's Host header.
    /// *   `VOICE`: Assistant voice. Defaults to "shimmer".
    /// *   `BARGE_IN`: Stop assistant playback when the caller talks over it. Defaults to true.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let openai_api_key = lookup("OPENAI_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let port = match lookup("PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), e.to_string()))?,
            None => DEFAULT_PORT,
        };
        let host = lookup("HOST")
            .unwrap_or_else(|| DEFAULT_HOST.to_string())
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidValue("HOST".to_string(), e.to_string()))?;

        let barge_in = match lookup("BARGE_IN") {
            Some(value) => parse_bool(&value)
                .ok_or_else(|| ConfigError::InvalidValue("BARGE_IN".to_string(), value))?,
            None => true,
        };

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let voice = lookup("VOICE")
            .map(|v| {
                let Ok(voice) = v.parse::<Voice>();
                voice
            })
            .unwrap_or(Voice::Shimmer);

        Ok(Self {
            bind_address: SocketAddr::new(host, port),
            openai_api_key: SecretString::from(openai_api_key),
            realtime_url: lookup("OPENAI_REALTIME_URL")
                .unwrap_or_else(|| DEFAULT_REALTIME_URL.to_string()),
            realtime_model: lookup("OPENAI_REALTIME_MODEL")
                .unwrap_or_else(|| DEFAULT_REALTIME_MODEL.to_string()),
            voice,
            prompts_path: lookup("PROMPTS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PROMPTS_PATH)),
            logs_dir: lookup("LOGS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOGS_DIR)),
            public_host: lookup("PUBLIC_HOST").filter(|h| !h.is_empty()),
            barge_in,
            log_level,
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
