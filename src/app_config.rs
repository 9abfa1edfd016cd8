use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::database::models::ProviderId;

/// Application configuration module
/// This module handles loading, validating and saving the pipeline
/// configuration: HTTP server, database, queue, providers and logging.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Default language pair used when a request omits one
    #[serde(default)]
    pub languages: LanguageConfig,

    /// Translation providers
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderConfig>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// HTTP server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Value of the Access-Control-Allow-Origin header
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            allowed_origin: default_allowed_origin(),
        }
    }
}

/// Database configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database; the user data directory when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Queue configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct QueueConfig {
    /// Delay between worker polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum messages received per poll (capped at 10)
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Seconds a received message stays hidden before redelivery
    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_messages: default_max_messages(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
        }
    }
}

/// Default language pair
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LanguageConfig {
    /// Source language code
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            source_language: default_source_language(),
            target_language: default_target_language(),
        }
    }
}

/// Provider configuration entry
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier (aws, gcp, azure)
    #[serde(rename = "type")]
    pub provider_type: ProviderId,

    // @field: Whether push-to-queue fans out to this provider
    #[serde(default = "default_true")]
    pub enabled: bool,

    // @field: API key or credential header value
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Region (AWS region, Azure resource region)
    #[serde(default = "String::new")]
    pub region: String,

    // @field: Max request size (bytes for AWS, chars otherwise)
    #[serde(default)]
    pub max_request_size: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider: Provider id
    // @returns: Provider config with defaults
    pub fn new(provider: ProviderId) -> Self {
        let (endpoint, region) = match provider {
            ProviderId::Aws => (default_aws_endpoint(), "us-west-1".to_string()),
            ProviderId::Gcp => (default_gcp_endpoint(), String::new()),
            ProviderId::Azure => (default_azure_endpoint(), "westus".to_string()),
        };

        Self {
            provider_type: provider,
            enabled: true,
            api_key: String::new(),
            endpoint,
            region,
            max_request_size: provider.max_request_size(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Effective request size limit, falling back to the provider default
    pub fn effective_max_request_size(&self) -> usize {
        if self.max_request_size > 0 {
            self.max_request_size
        } else {
            self.provider_type.max_request_size()
        }
    }

    /// Name of the environment variable that overrides the API key
    pub fn api_key_env_var(&self) -> String {
        format!("MTDOCK_{}_API_KEY", self.provider_type.as_str().to_uppercase())
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Environment variable overriding the database path
pub const DATABASE_PATH_ENV: &str = "MTDOCK_DATABASE_PATH";

/// Upper bound on messages per receive, as imposed by managed queues
pub const MAX_RECEIVE_BATCH: usize = 10;

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_max_messages() -> usize {
    MAX_RECEIVE_BATCH
}

fn default_visibility_timeout_secs() -> u64 {
    60
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "es".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_aws_endpoint() -> String {
    "https://translate.us-west-1.amazonaws.com".to_string()
}

fn default_gcp_endpoint() -> String {
    "https://translation.googleapis.com/language/translate/v2".to_string()
}

fn default_azure_endpoint() -> String {
    "https://api.cognitive.microsofttranslator.com".to_string()
}

fn default_providers() -> Vec<ProviderConfig> {
    ProviderId::ALL.iter().map(|p| ProviderConfig::new(*p)).collect()
}

impl Config {
    /// Load the configuration at `path`, writing a default file if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        warn!("Config file not found at '{}', creating default config.", path.display());

        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write default config to file: {}", path.display()))?;

        Ok(config)
    }

    /// Apply `MTDOCK_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for provider in &mut self.providers {
            if let Some(key) = lookup(&provider.api_key_env_var()).filter(|k| !k.is_empty()) {
                provider.api_key = key;
            }
        }

        if let Some(path) = lookup(DATABASE_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database.path = Some(PathBuf::from(path));
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::normalize_language_code(&self.languages.source_language)
            .context("Invalid default source language")?;
        crate::language_utils::normalize_language_code(&self.languages.target_language)
            .context("Invalid default target language")?;

        if self.queue.max_messages == 0 || self.queue.max_messages > MAX_RECEIVE_BATCH {
            return Err(anyhow!(
                "queue.max_messages must be between 1 and {}",
                MAX_RECEIVE_BATCH
            ));
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if self.providers[..i].iter().any(|p| p.provider_type == provider.provider_type) {
                return Err(anyhow!("Provider '{}' is configured twice", provider.provider_type));
            }

            if provider.enabled && provider.endpoint.is_empty() {
                return Err(anyhow!("Provider '{}' has no endpoint", provider.provider_type));
            }

            if provider.effective_max_request_size() <= crate::providers::CHUNK_MARGIN {
                return Err(anyhow!(
                    "Provider '{}' max_request_size must exceed {}",
                    provider.provider_type,
                    crate::providers::CHUNK_MARGIN
                ));
            }
        }

        Ok(())
    }

    /// Configuration for a provider, if present
    pub fn provider(&self, provider: ProviderId) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.provider_type == provider)
    }

    /// Providers that receive fan-out messages
    pub fn enabled_providers(&self) -> Vec<ProviderId> {
        self.providers
            .iter()
            .filter(|p| p.enabled)
            .map(|p| p.provider_type)
            .collect()
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            languages: LanguageConfig::default(),
            providers: default_providers(),
            log_level: LogLevel::default(),
        }
    }
}
