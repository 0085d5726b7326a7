//! Configuration loading for hermodd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.hermod/config.toml` (user)
//! 3. `/etc/hermod/config.toml` (system)
//!
//! The API key is loaded separately with a mandatory permission check:
//! 1. `~/.hermod/secrets.toml` (user, must be 0600)
//! 2. `/etc/hermod/secrets.toml` (system, must be 0600)
//! 3. `OPENAI_API_KEY` environment variable

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::cache::{CacheBackendKind, CacheSettings, MaintainerConfig};
use crate::client::{RetryConfig, TranslatorConfig};
use crate::error::{HermodError, Result};

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// Server network configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:8889).
    #[serde(default = "default_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
        }
    }
}

fn default_address() -> String {
    "0.0.0.0:8889".to_string()
}

/// Upstream endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiConfig {
    /// Endpoint base URL, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Model identifier.
    pub model: String,
    /// Instruction prefix substituted into the prompt template.
    #[serde(default = "default_prompt_prefix")]
    pub prompt_prefix: String,
    /// Optional prompt template file; the built-in template is used when
    /// absent.
    #[serde(default)]
    pub prompt_template_path: Option<PathBuf>,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Upstream attempts including the initial request (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_prompt_prefix() -> String {
    "Translate the following text".to_string()
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Storage engine (default: text). `mongodb` and `redis` are reserved
    /// and fall back to text.
    #[serde(default = "default_backend")]
    pub backend: CacheBackendKind,
    /// Cache file (text) or database file (sqlite).
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    /// Confirmations required before serving from cache (default: 5).
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Whether age-based cleanup runs (default: true).
    #[serde(default = "default_cleanup")]
    pub cleanup: bool,
    /// Cleanup age in days (default: 30).
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: u32,
    /// SQLite journal mode (default: WAL).
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
    /// SQLite synchronous mode (default: NORMAL).
    #[serde(default = "default_synchronous")]
    pub synchronous: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_cache_path(),
            threshold: default_threshold(),
            cleanup: default_cleanup(),
            cleanup_days: default_cleanup_days(),
            journal_mode: default_journal_mode(),
            synchronous: default_synchronous(),
        }
    }
}

fn default_backend() -> CacheBackendKind {
    CacheBackendKind::Text
}

fn default_cache_path() -> PathBuf {
    PathBuf::from("trans_dictionary.txt")
}

fn default_threshold() -> u32 {
    5
}

fn default_cleanup() -> bool {
    true
}

fn default_cleanup_days() -> u32 {
    30
}

fn default_journal_mode() -> String {
    "WAL".to_string()
}

fn default_synchronous() -> String {
    "NORMAL".to_string()
}

impl CacheConfig {
    /// Backend settings for [`TransCache::open`](crate::TransCache::open).
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            kind: self.backend,
            path: self.path.clone(),
            journal_mode: self.journal_mode.clone(),
            synchronous: self.synchronous.clone(),
        }
    }

    /// Maintainer cadence derived from this configuration.
    pub fn maintainer(&self) -> MaintainerConfig {
        MaintainerConfig {
            cleanup_enabled: self.cleanup,
            cleanup_days: self.cleanup_days,
            ..MaintainerConfig::default()
        }
    }
}

impl OpenAiConfig {
    /// Translator settings, loading the prompt template file when one is
    /// configured.
    pub fn translator(&self) -> Result<TranslatorConfig> {
        let prompt_template = match &self.prompt_template_path {
            Some(path) => Some(fs::read_to_string(path).map_err(|e| {
                HermodError::Configuration(format!(
                    "failed to read prompt template {path:?}: {e}"
                ))
            })?),
            None => None,
        };
        Ok(TranslatorConfig {
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            prompt_prefix: self.prompt_prefix.clone(),
            prompt_template,
            timeout: Duration::from_secs(self.timeout_secs),
            retry: RetryConfig {
                max_attempts: self.max_retries.max(1),
                ..RetryConfig::default()
            },
        })
    }
}

impl Config {
    /// Load configuration from the standard locations.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            HermodError::Configuration(format!("failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            HermodError::Configuration(format!("failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity checks beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        if !self.openai.base_url.starts_with("http://")
            && !self.openai.base_url.starts_with("https://")
        {
            return Err(HermodError::Configuration(
                "openai.base_url must start with http:// or https://".into(),
            ));
        }
        if self.openai.model.is_empty() {
            return Err(HermodError::Configuration("openai.model is required".into()));
        }
        if self.cache.threshold == 0 {
            return Err(HermodError::Configuration(
                "cache.threshold must be >= 1".into(),
            ));
        }
        if self.cache.cleanup_days == 0 {
            return Err(HermodError::Configuration(
                "cache.cleanup_days must be >= 1".into(),
            ));
        }
        Ok(())
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(HermodError::Configuration(format!(
                "config file not found: {path:?}"
            )));
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".hermod").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/hermod/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(HermodError::Configuration(
            "no config file found. Create ~/.hermod/config.toml or /etc/hermod/config.toml"
                .to_string(),
        ))
    }
}

/// Secrets configuration (API key).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub openai: Option<ApiKeySecret>,
}

/// A single API key secret.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiKeySecret {
    pub api_key: String,
}

impl Secrets {
    /// Load secrets from the standard locations with permission checks.
    ///
    /// Returns empty secrets when no file exists; the environment
    /// variable fallback still applies.
    pub fn load() -> Result<Self> {
        if let Some(home) = dirs::home_dir() {
            let user_secrets = home.join(".hermod").join("secrets.toml");
            if user_secrets.exists() {
                Self::check_permissions(&user_secrets)?;
                return Self::load_from_file(&user_secrets);
            }
        }

        let system_secrets = PathBuf::from("/etc/hermod/secrets.toml");
        if system_secrets.exists() {
            Self::check_permissions(&system_secrets)?;
            return Self::load_from_file(&system_secrets);
        }

        Ok(Secrets::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HermodError::Configuration(format!("failed to read secrets file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HermodError::Configuration(format!("failed to parse secrets file {path:?}: {e}"))
        })
    }

    /// Check that the secrets file has secure permissions (0600 or 0400).
    #[cfg(unix)]
    fn check_permissions(path: &Path) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let metadata = fs::metadata(path).map_err(|e| {
            HermodError::Configuration(format!("failed to stat secrets file {path:?}: {e}"))
        })?;

        let mode = metadata.permissions().mode();
        if mode & 0o077 != 0 {
            return Err(HermodError::Configuration(format!(
                "secrets file {path:?} has insecure permissions {:o}. Must be 0600 or 0400.",
                mode & 0o777
            )));
        }

        Ok(())
    }

    #[cfg(not(unix))]
    fn check_permissions(_path: &Path) -> Result<()> {
        Ok(())
    }

    /// The API key from the secrets file, falling back to `OPENAI_API_KEY`.
    pub fn api_key(&self) -> Option<String> {
        self.openai
            .as_ref()
            .map(|s| s.api_key.clone())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [openai]
            base_url = "https://api.openai.com/v1"
            model = "gpt-4o-mini"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.address, "0.0.0.0:8889");
        assert_eq!(config.cache.backend, CacheBackendKind::Text);
        assert_eq!(config.cache.threshold, 5);
        assert_eq!(config.cache.cleanup_days, 30);
        assert!(config.cache.cleanup);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9000"

            [openai]
            base_url = "http://localhost:11434/v1"
            model = "llama3.2"
            prompt_prefix = "Translate naturally"
            timeout_secs = 30
            max_retries = 5

            [cache]
            backend = "sqlite"
            path = "/var/lib/hermod/cache.db"
            threshold = 3
            cleanup = false
            cleanup_days = 60
            journal_mode = "DELETE"
            synchronous = "FULL"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9000");
        assert_eq!(config.cache.backend, CacheBackendKind::Sqlite);
        assert_eq!(config.cache.threshold, 3);
        assert!(!config.cache.cleanup);
        assert_eq!(config.openai.max_retries, 5);

        let settings = config.cache.settings();
        assert_eq!(settings.journal_mode, "DELETE");
        assert_eq!(settings.synchronous, "FULL");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let toml = r#"
            [openai]
            base_url = "ftp://example.com"
            model = "m"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let toml = r#"
            [openai]
            base_url = "https://api.openai.com/v1"
            model = "m"

            [cache]
            threshold = 0
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn reserved_backend_kind_parses() {
        let toml = r#"
            [openai]
            base_url = "https://api.openai.com/v1"
            model = "m"

            [cache]
            backend = "redis"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.cache.backend, CacheBackendKind::Redis);
    }

    #[test]
    fn config_not_found_returns_error() {
        let result = Config::load(Some(Path::new("/nonexistent/config.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn parse_secrets() {
        let toml = r#"
            [openai]
            api_key = "sk-test-key"
        "#;
        let secrets: Secrets = toml::from_str(toml).unwrap();
        assert_eq!(secrets.api_key(), Some("sk-test-key".to_string()));
    }
}
