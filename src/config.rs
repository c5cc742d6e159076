use std::env;
use std::sync::OnceLock;
use thiserror::Error;

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

/// Runtime configuration for the memory server.
#[derive(Debug)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores memory vectors.
    pub qdrant_url: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// API key for the embeddings endpoint. The only mandatory credential.
    pub openai_api_key: String,
    /// Base URL of the embeddings API.
    pub openai_base_url: String,
    /// Embedding model identifier sent with every embeddings request.
    pub openai_embedding_model: String,
    /// Name of the Qdrant collection holding user memories.
    pub collection_name: String,
    /// Interface the HTTP listener binds to.
    pub host: String,
    /// Port the HTTP listener binds to.
    pub port: u16,
    /// Allowed CORS origins; a `*` entry permits any origin.
    pub cors_origins: Vec<String>,
    /// Default log level applied when `RUST_LOG` is not set.
    pub log_level: String,
    /// Include error detail in generic failure responses.
    pub debug: bool,
}

impl Config {
    /// Load configuration from environment variables, applying documented
    /// defaults for every optional field.
    ///
    /// Fails only when `OPENAI_API_KEY` is absent or a value cannot be
    /// parsed; everything else falls back to a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env_or("QDRANT_URL", "http://localhost:6333"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            openai_api_key: load_env("OPENAI_API_KEY")?,
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_embedding_model: load_env_or("OPENAI_EMBEDDING_MODEL", "text-embedding-3-small"),
            collection_name: load_env_or("MEM0_COLLECTION", "user_memories"),
            host: load_env_or("MEM0_HOST", "0.0.0.0"),
            port: load_env_optional("MEM0_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("MEM0_PORT".into()))
                })
                .transpose()?
                .unwrap_or(8002),
            cors_origins: parse_origins(&load_env_or("CORS_ORIGINS", "*")),
            log_level: load_env_or("LOG_LEVEL", "info"),
            debug: load_env_optional("DEBUG")
                .map(|value| value.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
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
        qdrant_url = %config.qdrant_url,
        collection = %config.collection_name,
        host = %config.host,
        port = config.port,
        model = %config.openai_embedding_model,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
