//! Configuration manager for dennis.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::crypto::DEFAULT_RSA_BITS;

const DEFAULT_CONFIG_PATH: &str = "config/config.json";
/// Environment variable overriding the configuration path.
pub const CONFIG_ENV: &str = "DENNIS_BOT_CONFIG";
const DEFAULT_PORT: u16 = 8080;
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Port the webhook server listens on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Process-wide secret re-encrypting cached passwords.
    #[serde(default, skip_serializing)]
    pub secret_key: String,
    /// Size of generated user key pairs.
    #[serde(default = "default_rsa_bits")]
    pub rsa_bits: usize,
    #[serde(default)]
    version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to PostgreSQL configuration.
    #[serde(skip_serializing)]
    pub postgres: Option<Postgres>,
    /// Related to Redis configuration.
    #[serde(skip_serializing)]
    pub redis: Option<Redis>,
    /// Related to the Telegram bot.
    #[serde(skip_serializing)]
    pub telegram: Option<Telegram>,
    /// Related to the Wit.ai NLU provider.
    #[serde(skip_serializing)]
    pub wit: Option<Wit>,
    /// Related to the Alpha Vantage rate provider.
    #[serde(skip_serializing)]
    pub alphavantage: Option<AlphaVantage>,
    /// Related to Argon2 configuration.
    #[serde(skip_serializing)]
    pub argon2: Option<Argon2>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secret_key: String::default(),
            rsa_bits: DEFAULT_RSA_BITS,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            postgres: None,
            redis: None,
            telegram: None,
            wit: None,
            alphavantage: None,
            argon2: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_rsa_bits() -> usize {
    DEFAULT_RSA_BITS
}

/// PostgreSQL configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Postgres {
    pub host: String,
    #[serde(default = "Postgres::default_port")]
    pub port: u16,
    /// Username credential to connect.
    pub user: String,
    /// Password credential to connect.
    #[serde(default)]
    pub password: String,
    /// Database name.
    pub database: String,
    /// `disable`, `prefer`, `require`, `verify-ca` or `verify-full`.
    #[serde(default = "Postgres::default_ssl_mode")]
    pub ssl_mode: String,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl Postgres {
    fn default_port() -> u16 {
        5432
    }

    fn default_ssl_mode() -> String {
        "disable".into()
    }
}

/// Redis configuration.
#[derive(Debug, Default, PartialEq, Clone, Serialize, Deserialize)]
pub struct Redis {
    pub host: String,
    #[serde(default = "Redis::default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: String,
    /// Database index.
    #[serde(default)]
    pub db: i64,
}

impl Redis {
    fn default_port() -> u16 {
        6379
    }

    /// Build the `redis://` connection URL, password percent-encoded.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))?;

        if !self.password.is_empty() {
            url.set_password(Some(&self.password))
                .map_err(|()| url::ParseError::EmptyHost)?;
        }

        Ok(url)
    }
}

/// Telegram bot configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Telegram {
    /// Bot token, also used as the webhook path.
    pub token: String,
    /// Public domain receiving webhook calls.
    pub domain: String,
    #[serde(default = "Telegram::default_api_url")]
    pub api_url: String,
}

impl Telegram {
    fn default_api_url() -> String {
        "https://api.telegram.org".into()
    }
}

/// Wit.ai configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Wit {
    pub token: String,
    /// API version pinned with the `v` query parameter.
    #[serde(default = "Wit::default_version")]
    pub version: String,
    #[serde(default = "Wit::default_api_url")]
    pub api_url: String,
}

impl Wit {
    fn default_version() -> String {
        "20180312".into()
    }

    fn default_api_url() -> String {
        "https://api.wit.ai".into()
    }
}

/// Alpha Vantage configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct AlphaVantage {
    pub token: String,
    #[serde(default = "AlphaVantage::default_api_url")]
    pub api_url: String,
}

impl AlphaVantage {
    fn default_api_url() -> String {
        "https://www.alphavantage.co".into()
    }
}

/// Argon2 configuration.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Argon2 {
    /// Memory used while hashing.
    pub memory_cost: u32,
    /// Iterations of hash.
    pub iterations: u32,
    /// Parallelism degree.
    pub parallelism: u32,
    /// Output hash length.
    pub hash_length: usize,
}

impl Default for Argon2 {
    fn default() -> Self {
        Self {
            memory_cost: 1024 * 64, // 64 MiB.
            iterations: 10,
            parallelism: 2,
            hash_length: 32,
        }
    }
}

/// Failure while reading the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid telegram domain: {0}")]
    Url(#[from] url::ParseError),
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Telegram token, used to match the webhook path.
    pub fn telegram_token(&self) -> Option<&str> {
        self.telegram.as_ref().map(|t| t.token.as_str())
    }

    /// Normalizes a URL string by ensuring it starts with a valid scheme
    /// (`http` or `https`) and carries no trailing slash.
    fn normalize_url(&self, url: &str) -> Result<String, url::ParseError> {
        let url_with_scheme =
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("https://{url}")
            };

        let parsed_url = Url::parse(&url_with_scheme)?;
        Ok(parsed_url.to_string().trim_end_matches('/').to_owned())
    }

    /// Reads the configuration file from, in order, the explicit path,
    /// `DENNIS_BOT_CONFIG` or `config/config.json`.
    pub fn read(self) -> Result<Arc<Self>, url::ParseError> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else if let Ok(path) = std::env::var(CONFIG_ENV) {
            PathBuf::from(path)
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let mut config = match Self::parse(&file_path) {
            Ok(config) => config,
            Err(err) => {
                return Ok(Arc::new(self.error(&file_path, err)));
            },
        };

        // set app version.
        config.version = VERSION.to_owned();
        config.path = file_path;

        // normalize URLs.
        if let Some(telegram) = config.telegram.as_mut() {
            telegram.domain = self.normalize_url(&telegram.domain)?;
        }

        Ok(Arc::new(config))
    }

    fn parse(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => serde_yaml::from_reader(file)
                .map_err(ConfigError::from)?,
            _ => serde_json::from_reader(file).map_err(ConfigError::from)?,
        };

        Ok(config)
    }

    /// Return a default configuration as fallback.
    fn error(&self, path: &Path, err: Box<dyn std::error::Error>) -> Self {
        tracing::error!(
            error = %err,
            path = %path.display(),
            "configuration file not found or invalid"
        );
        Self {
            version: VERSION.to_owned(),
            ..Default::default()
        }
    }
}
