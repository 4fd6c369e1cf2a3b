use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1/images/generations";
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(150);
pub const DEFAULT_MAX_PROMPT_CHARS: usize = 4000;
const DEFAULT_PORT: u16 = 3000;
const APP_DIR_NAME: &str = "image-gen-service";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing OPENAI_API_KEY")]
    MissingApiKey,
    #[error("invalid {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Read-only settings built once at startup and shared by every request.
#[derive(Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub provider_url: String,
    pub images_dir: PathBuf,
    pub database_path: PathBuf,
    pub bind_address: String,
    pub provider_timeout: Duration,
    pub max_prompt_chars: usize,
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            api_key: api_key.into(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            images_dir: data_dir.join("images"),
            database_path: data_dir.join("image_generations.db"),
            bind_address: format!("0.0.0.0:{DEFAULT_PORT}"),
            provider_timeout: PROVIDER_TIMEOUT,
            max_prompt_chars: DEFAULT_MAX_PROMPT_CHARS,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = non_empty_var("OPENAI_API_KEY").ok_or(ConfigError::MissingApiKey)?;
        let data_dir = non_empty_var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let mut config = Self::new(api_key, data_dir);

        if let Some(url) = non_empty_var("IMAGE_API_URL") {
            config.provider_url = url;
        }
        if let Some(dir) = non_empty_var("IMAGES_DIR") {
            config.images_dir = PathBuf::from(dir);
        }
        if let Some(path) = non_empty_var("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);
        config.bind_address = format!("0.0.0.0:{port}");
        if let Some(raw) = non_empty_var("MAX_PROMPT_CHARS") {
            config.max_prompt_chars = parse_prompt_limit(&raw)?;
        }
        Ok(config)
    }
}

// Keeps the key out of logs.
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("provider_url", &self.provider_url)
            .field("images_dir", &self.images_dir)
            .field("database_path", &self.database_path)
            .field("bind_address", &self.bind_address)
            .field("provider_timeout", &self.provider_timeout)
            .field("max_prompt_chars", &self.max_prompt_chars)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push(APP_DIR_NAME);
    base
}

fn parse_prompt_limit(raw: &str) -> Result<usize, ConfigError> {
    match raw.parse::<usize>() {
        Ok(limit) if limit > 0 => Ok(limit),
        _ => Err(ConfigError::InvalidValue {
            name: "MAX_PROMPT_CHARS",
            value: raw.to_string(),
        }),
    }
}
