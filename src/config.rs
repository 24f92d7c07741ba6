use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_RAW_PREFIX: &str = "raw/";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";
const DEFAULT_ANTHROPIC_URL: &str = "https://api.anthropic.com";
const DEFAULT_RESULT_STORE_DIR: &str = "data/results";
const DEFAULT_EVENT_SOURCE: &str = "extraction-service";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the extraction service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the object store holding uploaded documents.
    pub object_store_url: String,
    /// Key prefix marking an object as an unprocessed upload.
    pub raw_prefix: String,
    /// Backend used for classification and extraction prompts.
    pub generation_provider: GenerationProvider,
    /// Model identifier passed to the generation backend.
    pub generation_model: String,
    /// Optional override for the Ollama base URL.
    pub ollama_url: Option<String>,
    /// Optional override for the Anthropic API base URL.
    pub anthropic_url: Option<String>,
    /// API key required when the Anthropic provider is selected.
    pub anthropic_api_key: Option<String>,
    /// Per-request timeout applied to object store reads, in seconds.
    pub fetch_timeout_secs: u64,
    /// Per-request timeout applied to generation calls, in seconds.
    pub generation_timeout_secs: u64,
    /// Output token budget for classification calls.
    pub classification_max_tokens: u32,
    /// Output token budget for extraction calls.
    pub extraction_max_tokens: u32,
    /// Directory backing the file result store.
    pub result_store_dir: String,
    /// Optional event bus endpoint; events are only logged when unset.
    pub event_bus_url: Option<String>,
    /// Source attribute stamped on every published event.
    pub event_source: String,
    /// Maximum attempts per stage, including the first.
    pub retry_max_attempts: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Upper bound on a single backoff delay, in milliseconds.
    pub retry_max_delay_ms: u64,
    /// Wall-clock budget for one workflow instance, in seconds.
    pub workflow_timeout_secs: u64,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported text-generation backends.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Hosted Anthropic Messages API.
    Anthropic,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let generation_provider = load_env_optional("GENERATION_PROVIDER")
            .map(|value| {
                value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".into()))
            })
            .transpose()?
            .unwrap_or(GenerationProvider::Ollama);
        let anthropic_api_key = load_env_optional("ANTHROPIC_API_KEY");
        if generation_provider == GenerationProvider::Anthropic && anthropic_api_key.is_none() {
            return Err(ConfigError::MissingVariable("ANTHROPIC_API_KEY".into()));
        }

        let retry_max_attempts = parse_or("RETRY_MAX_ATTEMPTS", 3)?;
        if retry_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("RETRY_MAX_ATTEMPTS".into()));
        }

        Ok(Self {
            object_store_url: load_env("OBJECT_STORE_URL")?,
            raw_prefix: load_env_optional("RAW_PREFIX")
                .unwrap_or_else(|| DEFAULT_RAW_PREFIX.to_string()),
            generation_provider,
            generation_model: load_env("GENERATION_MODEL")?,
            ollama_url: load_env_optional("OLLAMA_URL"),
            anthropic_url: load_env_optional("ANTHROPIC_URL"),
            anthropic_api_key,
            fetch_timeout_secs: parse_or("FETCH_TIMEOUT_SECS", 30)?,
            generation_timeout_secs: parse_or("GENERATION_TIMEOUT_SECS", 120)?,
            classification_max_tokens: parse_or("CLASSIFICATION_MAX_TOKENS", 10)?,
            extraction_max_tokens: parse_or("EXTRACTION_MAX_TOKENS", 4096)?,
            result_store_dir: load_env_optional("RESULT_STORE_DIR")
                .unwrap_or_else(|| DEFAULT_RESULT_STORE_DIR.to_string()),
            event_bus_url: load_env_optional("EVENT_BUS_URL"),
            event_source: load_env_optional("EVENT_SOURCE")
                .unwrap_or_else(|| DEFAULT_EVENT_SOURCE.to_string()),
            retry_max_attempts,
            retry_base_delay_ms: parse_or("RETRY_BASE_DELAY_MS", 500)?,
            retry_max_delay_ms: parse_or("RETRY_MAX_DELAY_MS", 8_000)?,
            workflow_timeout_secs: parse_or("WORKFLOW_TIMEOUT_SECS", 600)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Ollama base URL, falling back to the local default.
    pub fn ollama_base_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_OLLAMA_URL)
    }

    /// Anthropic base URL, falling back to the public endpoint.
    pub fn anthropic_base_url(&self) -> &str {
        self.anthropic_url.as_deref().unwrap_or(DEFAULT_ANTHROPIC_URL)
    }

    /// Per-request object store timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Per-request generation timeout.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Whole-workflow deadline.
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_secs)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        object_store_url = %config.object_store_url,
        raw_prefix = %config.raw_prefix,
        provider = ?config.generation_provider,
        model = %config.generation_model,
        event_bus = ?config.event_bus_url,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_case_insensitively() {
        assert_eq!(
            "Ollama".parse::<GenerationProvider>(),
            Ok(GenerationProvider::Ollama)
        );
        assert_eq!(
            " anthropic ".parse::<GenerationProvider>(),
            Ok(GenerationProvider::Anthropic)
        );
        assert!("bedrock".parse::<GenerationProvider>().is_err());
    }

    #[test]
    fn parse_or_falls_back_to_default_when_unset() {
        let value: u32 = parse_or("WORDCOLLECT_TEST_UNSET_VARIABLE", 7).expect("default");
        assert_eq!(value, 7);
    }
}
