//! Configuration for the masked email bot
//!
//! Values are layered, later sources winning:
//! - Built-in defaults
//! - Configuration file (`config.toml`, or the path in `MEB_CONFIG_FILE`)
//! - Environment variables with the `MEB` prefix, e.g. `MEB__HTTP__PORT`
//! - The flat variables of earlier deployments (`TELEGRAM_TOKEN`,
//!   `FASTMAIL_OAUTH2_CLIENT_ID`, ...)

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File};
use meb_identity_oauth2::OAuth2ProviderConfig;
use meb_jmap::JmapConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Main configuration struct for the bot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub http: HttpConfig,
    pub oauth2: OAuth2Config,
    pub jmap: JmapSection,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    pub token: String,

    /// Log Bot API request and response payloads
    pub debug: bool,

    #[serde(default = "default_telegram_api_base_url")]
    pub api_base_url: String,

    /// Long-poll timeout for `getUpdates`
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_seconds: u64,
}

/// Listener for the OAuth2 redirect endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// IP address or hostname to listen on
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuth2Config {
    pub client_id: String,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default = "default_authorization_endpoint")]
    pub authorization_endpoint: String,

    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,

    /// Public URL of our `/redirect` endpoint, as registered with the provider
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    #[serde(default = "default_state_ttl")]
    pub state_ttl_seconds: u64,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JmapSection {
    #[serde(default = "default_session_url")]
    pub session_url: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_http_timeout")]
    pub http_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `file` or `memory`
    #[serde(default = "default_store_backend")]
    pub backend: String,

    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// How often expired authorization states are purged
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, json, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_telegram_api_base_url() -> String {
    meb_telegram::DEFAULT_API_BASE_URL.to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_authorization_endpoint() -> String {
    OAuth2ProviderConfig::default().authorization_endpoint
}

fn default_token_endpoint() -> String {
    OAuth2ProviderConfig::default().token_endpoint
}

fn default_scopes() -> Vec<String> {
    OAuth2ProviderConfig::default().scopes
}

fn default_state_ttl() -> u64 {
    600 // 10 minutes
}

/// Upper bound for `state_ttl_seconds`.
const MAX_STATE_TTL_SECONDS: u64 = 7 * 24 * 60 * 60;

fn default_http_timeout() -> u64 {
    30
}

fn default_session_url() -> String {
    JmapConfig::default().session_url
}

fn default_api_url() -> String {
    JmapConfig::default().api_url
}

fn default_store_backend() -> String {
    "file".to_string()
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./masked_email_bot.json")
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            debug: false,
            api_base_url: default_telegram_api_base_url(),
            poll_timeout_seconds: default_poll_timeout(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for OAuth2Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            authorization_endpoint: default_authorization_endpoint(),
            token_endpoint: default_token_endpoint(),
            redirect_uri: String::new(),
            scopes: default_scopes(),
            state_ttl_seconds: default_state_ttl(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

impl Default for JmapSection {
    fn default() -> Self {
        Self {
            session_url: default_session_url(),
            api_url: default_api_url(),
            http_timeout_seconds: default_http_timeout(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            path: default_store_path(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from environment and optional config file
    pub fn load() -> Result<Self> {
        let config_path =
            std::env::var("MEB_CONFIG_FILE").unwrap_or_else(|_| "config.toml".to_string());
        Self::load_from(config_path)
    }

    /// Load configuration using `path` as the optional config file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_with(path.as_ref(), |name| std::env::var(name).ok())
    }

    /// Load from `path`, reading the flat overrides through `var`
    fn load_with(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if path.exists() {
            info!("Loading configuration from {}", path.display());
            builder = builder.add_source(File::from(path));
        } else {
            debug!("No config file found at {}, using defaults", path.display());
        }

        builder = builder.add_source(
            Environment::with_prefix("MEB")
                .prefix_separator("__")
                .separator("__") // e.g. MEB__HTTP__PORT
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut settings: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        settings.apply_overrides(var)?;
        settings.validate()?;

        Ok(settings)
    }

    /// Apply the flat environment variables of earlier deployments
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(token) = var("TELEGRAM_TOKEN") {
            info!("Using TELEGRAM_TOKEN environment variable");
            self.telegram.token = token;
        }

        if let Some(debug) = var("TELEGRAM_DEBUG") {
            self.telegram.debug = debug.parse().context("Invalid TELEGRAM_DEBUG value")?;
        }

        if let Some(address) = var("HTTP_ADDRESS") {
            info!("Using HTTP_ADDRESS environment variable");
            let (host, port) = parse_listen_address(&address)?;
            self.http.host = host;
            self.http.port = port;
        }

        if let Some(client_id) = var("FASTMAIL_OAUTH2_CLIENT_ID") {
            self.oauth2.client_id = client_id;
        }

        if let Some(redirect_uri) = var("FASTMAIL_OAUTH2_REDIRECT_URL") {
            self.oauth2.redirect_uri = redirect_uri;
        }

        if let Some(url) = var("FASTMAIL_OAUTH2_AUTH_URL") {
            self.oauth2.authorization_endpoint = url;
        }

        if let Some(url) = var("FASTMAIL_OAUTH2_TOKEN_URL") {
            self.oauth2.token_endpoint = url;
        }

        if let Some(scopes) = var("FASTMAIL_OAUTH2_SCOPES") {
            self.oauth2.scopes = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(path) = var("STORE_PATH") {
            info!("Using STORE_PATH environment variable");
            self.store.path = PathBuf::from(path);
        }

        if let Some(log_level) = var("RUST_LOG") {
            self.logging.level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.is_empty() {
            anyhow::bail!("Telegram token is required (TELEGRAM_TOKEN)");
        }

        if self.oauth2.client_id.is_empty() {
            anyhow::bail!("OAuth2 client id is required (FASTMAIL_OAUTH2_CLIENT_ID)");
        }

        if self.oauth2.redirect_uri.is_empty() {
            anyhow::bail!("OAuth2 redirect URI is required (FASTMAIL_OAUTH2_REDIRECT_URL)");
        }

        if self.oauth2.scopes.is_empty() {
            anyhow::bail!("At least one OAuth2 scope is required");
        }

        if self.http.port == 0 {
            anyhow::bail!("HTTP port cannot be 0");
        }

        if self.http.host.trim().is_empty() {
            anyhow::bail!("HTTP host cannot be empty");
        }

        if self.oauth2.state_ttl_seconds == 0 {
            anyhow::bail!("Authorization state TTL must be positive");
        }

        if self.oauth2.state_ttl_seconds > MAX_STATE_TTL_SECONDS {
            anyhow::bail!(
                "Authorization state TTL cannot exceed {} seconds",
                MAX_STATE_TTL_SECONDS
            );
        }

        if self.store.cleanup_interval_seconds == 0 {
            anyhow::bail!("Store cleanup interval must be positive");
        }

        let valid_backends = ["file", "memory"];
        if !valid_backends.contains(&self.store.backend.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid store backend '{}'. Must be one of: {:?}",
                self.store.backend,
                valid_backends
            );
        }

        // A full filter directive is passed through to EnvFilter as-is.
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level_lower = self.logging.level.to_lowercase();
        if !self.is_filter_directive() && !valid_levels.contains(&level_lower.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        let valid_formats = ["pretty", "json", "compact"];
        let format_lower = self.logging.format.to_lowercase();
        if !valid_formats.contains(&format_lower.as_str()) {
            anyhow::bail!(
                "Invalid log format '{}'. Must be one of: {:?}",
                self.logging.format,
                valid_formats
            );
        }

        Ok(())
    }

    /// Address for the redirect listener, as accepted by `TcpListener::bind`
    pub fn listen_address(&self) -> String {
        if self.http.host.contains(':') {
            format!("[{}]:{}", self.http.host, self.http.port)
        } else {
            format!("{}:{}", self.http.host, self.http.port)
        }
    }

    /// Get the log filter string for tracing
    pub fn log_filter(&self) -> String {
        if self.is_filter_directive() {
            self.logging.level.clone()
        } else {
            let level = self.logging.level.to_lowercase();
            format!(
                "masked_email_bot={level},meb_server={level},meb_core={level},meb_store={level},\
                 meb_jmap={level},meb_identity_oauth2={level},meb_telegram={level},\
                 tower_http={level},warn"
            )
        }
    }

    fn is_filter_directive(&self) -> bool {
        self.logging.level.contains('=') || self.logging.level.contains(',')
    }

    pub fn oauth2_provider(&self) -> OAuth2ProviderConfig {
        OAuth2ProviderConfig {
            client_id: self.oauth2.client_id.clone(),
            client_secret: self.oauth2.client_secret.clone(),
            authorization_endpoint: self.oauth2.authorization_endpoint.clone(),
            token_endpoint: self.oauth2.token_endpoint.clone(),
            redirect_uri: self.oauth2.redirect_uri.clone(),
            scopes: self.oauth2.scopes.clone(),
            state_ttl_seconds: self.oauth2.state_ttl_seconds,
            http_timeout_seconds: self.oauth2.http_timeout_seconds,
        }
    }

    pub fn jmap_client(&self) -> JmapConfig {
        JmapConfig {
            session_url: self.jmap.session_url.clone(),
            api_url: self.jmap.api_url.clone(),
            http_timeout_seconds: self.jmap.http_timeout_seconds,
            ..JmapConfig::default()
        }
    }
}

/// Parse `host:port` or `:port`; an empty host listens on all interfaces.
/// Hostnames are kept as-is and resolved when binding.
fn parse_listen_address(address: &str) -> Result<(String, u16)> {
    let (host, port) = address
        .rsplit_once(':')
        .with_context(|| format!("Invalid HTTP_ADDRESS '{address}', expected host:port"))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    let host = if host.is_empty() {
        default_host()
    } else {
        host.to_string()
    };
    let port = port
        .parse()
        .with_context(|| format!("Invalid HTTP_ADDRESS port '{port}'"))?;

    Ok((host, port))
}
