//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! Secrets are never read from the TOML itself: each one comes from an env
//! var or a key file named in the TOML, and the env var wins.

use common::Secret;
use remote_store::{PaymentConfig, Settings};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub defaults: DefaultsConfig,
}

/// Listener settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Admin API listener, kept off the public address.
    pub admin_listen_addr: SocketAddr,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Largest decoded source image accepted by `/generate`.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process store, lost on restart.
    #[default]
    Memory,
    /// PostgREST endpoint.
    Rest,
}

/// Remote catalog and settings store
#[derive(Debug, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub url: Option<String>,
    /// File holding the store API key (alternative to SUPABASE_ANON_KEY)
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    #[serde(skip)]
    pub api_key: Option<Secret<String>>,
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            url: None,
            key_file: None,
            api_key: None,
            timeout_secs: default_remote_timeout(),
        }
    }
}

/// Image-generation API
#[derive(Debug, Deserialize)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
    /// File holding the fallback credential (alternative to GEMINI_API_KEY)
    #[serde(default)]
    pub fallback_key_file: Option<PathBuf>,
    #[serde(skip)]
    pub fallback_key: Option<Secret<String>>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_generator_url(),
            model: default_model(),
            timeout_secs: default_generator_timeout(),
            fallback_key_file: None,
            fallback_key: None,
        }
    }
}

/// Local key-value file for the catalog snapshot and seeded marker
#[derive(Debug, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            state_path: default_state_path(),
        }
    }
}

/// Built-in settings used when the stored record lacks a group
#[derive(Debug, Default, Deserialize)]
pub struct DefaultsConfig {
    #[serde(default)]
    pub payment: PaymentDefaults,
}

#[derive(Debug, Deserialize)]
pub struct PaymentDefaults {
    #[serde(default = "default_gateway")]
    pub gateway: String,
    #[serde(default)]
    pub key_id: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_photo_price")]
    pub photo_price: f64,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// From RAZORPAY_KEY_SECRET only
    #[serde(skip)]
    pub key_secret: Option<Secret<String>>,
}

impl Default for PaymentDefaults {
    fn default() -> Self {
        Self {
            gateway: default_gateway(),
            key_id: String::new(),
            currency: default_currency(),
            photo_price: default_photo_price(),
            enabled: true,
            key_secret: None,
        }
    }
}

impl DefaultsConfig {
    /// Settings object the config store falls back to.
    pub fn to_settings(&self) -> Settings {
        let payment = &self.payment;
        Settings {
            payment: PaymentConfig {
                gateway: payment.gateway.clone(),
                key_id: payment.key_id.clone(),
                key_secret: payment.key_secret.clone().unwrap_or_default(),
                currency: payment.currency.clone(),
                enabled: payment.enabled,
                photo_price: payment.photo_price,
            },
            ..Settings::default()
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_max_upload_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_remote_timeout() -> u64 {
    10
}

fn default_generator_url() -> String {
    provider::gemini::DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    provider::gemini::DEFAULT_MODEL.to_string()
}

fn default_generator_timeout() -> u64 {
    120
}

fn default_state_path() -> PathBuf {
    PathBuf::from("styleswap-state.json")
}

fn default_gateway() -> String {
    "Razorpay".to_string()
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_photo_price() -> f64 {
    8.0
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Secret resolution, per secret: env var first, then the key file.
    /// - remote store key: SUPABASE_ANON_KEY, `remote.key_file`
    /// - fallback credential: GEMINI_API_KEY, `generator.fallback_key_file`
    /// - payment secret: RAZORPAY_KEY_SECRET
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        config.remote.api_key =
            resolve_secret("SUPABASE_ANON_KEY", config.remote.key_file.as_deref())?;
        config.generator.fallback_key = resolve_secret(
            "GEMINI_API_KEY",
            config.generator.fallback_key_file.as_deref(),
        )?;
        config.defaults.payment.key_secret = resolve_secret("RAZORPAY_KEY_SECRET", None)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        require_http_url("generator.base_url", &self.generator.base_url)?;

        if self.generator.timeout_secs == 0 || self.remote.timeout_secs == 0 {
            return Err(common::Error::Config(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(common::Error::Config(
                "max_upload_bytes must be greater than 0".into(),
            ));
        }

        if self.remote.backend == Backend::Rest {
            let url = self.remote.url.as_deref().ok_or_else(|| {
                common::Error::Config("remote.url is required for the rest backend".into())
            })?;
            require_http_url("remote.url", url)?;
            if self.remote.api_key.is_none() {
                return Err(common::Error::Config(
                    "rest backend needs SUPABASE_ANON_KEY or remote.key_file".into(),
                ));
            }
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("styleswap.toml")
    }
}

fn require_http_url(field: &str, url: &str) -> common::Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {url}"
        )))
    }
}

/// Env var wins over the key file. Blank values count as unset.
fn resolve_secret(env_var: &str, key_file: Option<&Path>) -> common::Result<Option<Secret<String>>> {
    if let Ok(value) = std::env::var(env_var) {
        let value = value.trim().to_owned();
        if !value.is_empty() {
            return Ok(Some(Secret::new(value)));
        }
    }
    let Some(key_file) = key_file else {
        return Ok(None);
    };
    let value = std::fs::read_to_string(key_file).map_err(|e| {
        common::Error::Config(format!("failed to read {}: {e}", key_file.display()))
    })?;
    let value = value.trim().to_owned();
    Ok((!value.is_empty()).then(|| Secret::new(value)))
}
