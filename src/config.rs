//! Configuration management for idgate
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{IdgateError, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Main configuration structure for idgate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Identity provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Local redirect targets
    #[serde(default)]
    pub redirect: RedirectConfig,
    /// Interactive surface settings
    #[serde(default)]
    pub surface: SurfaceConfig,
    /// Workflow timing
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

/// Identity provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Well-known OIDC discovery document URL
    #[serde(default = "default_discovery_url")]
    pub discovery_url: String,

    /// Session-management logout endpoint
    #[serde(default = "default_logout_endpoint")]
    pub logout_endpoint: String,

    /// Registered client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Namespace string the sign-in nonce is derived from
    #[serde(default = "default_nonce_namespace")]
    pub nonce_namespace: String,

    /// Value sent as `x-client-SKU`
    #[serde(default = "default_client_sku")]
    pub client_sku: String,

    /// Value sent as `x-client-Ver`
    #[serde(default = "default_client_version")]
    pub client_version: String,
}

fn default_discovery_url() -> String {
    "https://login.microsoftonline.com/common/.well-known/openid-configuration".to_string()
}

fn default_logout_endpoint() -> String {
    "https://login.microsoftonline.com/common/oauth2/logout/".to_string()
}

fn default_client_id() -> String {
    "4f28e5eb-6b7f-49e6-ac0e-f992b622da57".to_string()
}

fn default_nonce_namespace() -> String {
    "https://github.com/Microsoft/BotFramework-Emulator".to_string()
}

fn default_client_sku() -> String {
    "Js".to_string()
}

fn default_client_version() -> String {
    "1.0.17".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            discovery_url: default_discovery_url(),
            logout_endpoint: default_logout_endpoint(),
            client_id: default_client_id(),
            nonce_namespace: default_nonce_namespace(),
            client_sku: default_client_sku(),
            client_version: default_client_version(),
        }
    }
}

/// Redirect configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    /// Default redirect URI for sign-in (callers may supply their own)
    #[serde(default = "default_login_redirect_uri")]
    pub login_redirect_uri: String,

    /// Fixed redirect target after sign-out
    #[serde(default = "default_post_logout_redirect_uri")]
    pub post_logout_redirect_uri: String,

    /// Navigations whose host contains this marker are our own redirects
    #[serde(default = "default_host_marker")]
    pub host_marker: String,
}

fn default_login_redirect_uri() -> String {
    "http://localhost:3000/botframework-emulator".to_string()
}

fn default_post_logout_redirect_uri() -> String {
    "http://localhost:3000/botframework-emulator".to_string()
}

fn default_host_marker() -> String {
    "localhost".to_string()
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            login_redirect_uri: default_login_redirect_uri(),
            post_logout_redirect_uri: default_post_logout_redirect_uri(),
            host_marker: default_host_marker(),
        }
    }
}

/// Width and height of a surface in logical pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

/// Interactive surface configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceConfig {
    /// Size of the sign-in surface
    #[serde(default = "default_login_size")]
    pub login: SurfaceSize,

    /// Size of the sign-out surface
    #[serde(default = "default_sign_out_size")]
    pub sign_out: SurfaceSize,

    /// Address the loopback relay listens on (CLI surface adapter)
    #[serde(default = "default_loopback_addr")]
    pub loopback_addr: String,

    /// Launch the system browser when a loopback surface is shown
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,
}

fn default_login_size() -> SurfaceSize {
    SurfaceSize {
        width: 490,
        height: 366,
    }
}

fn default_sign_out_size() -> SurfaceSize {
    SurfaceSize {
        width: 440,
        height: 367,
    }
}

fn default_loopback_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_open_browser() -> bool {
    true
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            login: default_login_size(),
            sign_out: default_sign_out_size(),
            loopback_addr: default_loopback_addr(),
            open_browser: default_open_browser(),
        }
    }
}

/// Workflow timing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// How long sign-out waits for the redirect before assuming success
    #[serde(default = "default_sign_out_timeout_ms")]
    pub sign_out_timeout_ms: u64,

    /// Timeout applied to discovery and key-set requests (seconds)
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_sign_out_timeout_ms() -> u64 {
    5000
}

fn default_http_timeout_seconds() -> u64 {
    30
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            sign_out_timeout_ms: default_sign_out_timeout_ms(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

impl WorkflowConfig {
    /// Sign-out fallback timeout as a [`Duration`]
    pub fn sign_out_timeout(&self) -> Duration {
        Duration::from_millis(self.sign_out_timeout_ms)
    }

    /// HTTP request timeout as a [`Duration`]
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| IdgateError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| IdgateError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("IDGATE_DISCOVERY_URL") {
            self.provider.discovery_url = url;
        }

        if let Ok(endpoint) = std::env::var("IDGATE_LOGOUT_ENDPOINT") {
            self.provider.logout_endpoint = endpoint;
        }

        if let Ok(client_id) = std::env::var("IDGATE_CLIENT_ID") {
            self.provider.client_id = client_id;
        }

        if let Ok(uri) = std::env::var("IDGATE_REDIRECT_URI") {
            self.redirect.login_redirect_uri = uri;
        }

        if let Ok(uri) = std::env::var("IDGATE_POST_LOGOUT_REDIRECT_URI") {
            self.redirect.post_logout_redirect_uri = uri;
        }

        if let Ok(marker) = std::env::var("IDGATE_REDIRECT_HOST_MARKER") {
            self.redirect.host_marker = marker;
        }

        if let Ok(addr) = std::env::var("IDGATE_LOOPBACK_ADDR") {
            self.surface.loopback_addr = addr;
        }

        if let Ok(timeout) = std::env::var("IDGATE_SIGN_OUT_TIMEOUT_MS") {
            if let Ok(value) = timeout.parse() {
                self.workflow.sign_out_timeout_ms = value;
            } else {
                tracing::warn!("Invalid IDGATE_SIGN_OUT_TIMEOUT_MS: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("IDGATE_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.workflow.http_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid IDGATE_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
        if cli.no_browser {
            self.surface.open_browser = false;
        }
    }

    /// Parsed discovery document URL
    pub fn discovery_url(&self) -> Result<Url> {
        parse_url("provider.discovery_url", &self.provider.discovery_url)
    }

    /// Parsed logout endpoint
    pub fn logout_endpoint(&self) -> Result<Url> {
        parse_url("provider.logout_endpoint", &self.provider.logout_endpoint)
    }

    /// Parsed loopback relay address
    pub fn loopback_addr(&self) -> Result<SocketAddr> {
        self.surface.loopback_addr.parse().map_err(|e| {
            IdgateError::Config(format!(
                "surface.loopback_addr '{}' is not a socket address: {}",
                self.surface.loopback_addr, e
            ))
            .into()
        })
    }

    /// Validate the configuration
    ///
    /// Ensures URLs parse, redirect targets point at the local redirect
    /// host, and timeouts and surface sizes are non-zero.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.provider.client_id.trim().is_empty() {
            return Err(IdgateError::Config("client_id cannot be empty".to_string()).into());
        }

        self.discovery_url()?;
        self.logout_endpoint()?;
        self.loopback_addr()?;

        if self.redirect.host_marker.trim().is_empty() {
            return Err(
                IdgateError::Config("redirect.host_marker cannot be empty".to_string()).into(),
            );
        }

        for (field, value) in [
            ("redirect.login_redirect_uri", &self.redirect.login_redirect_uri),
            (
                "redirect.post_logout_redirect_uri",
                &self.redirect.post_logout_redirect_uri,
            ),
        ] {
            let url = parse_url(field, value)?;
            let host = url.host_str().unwrap_or_default().to_lowercase();
            if !host.contains(&self.redirect.host_marker.to_lowercase()) {
                return Err(IdgateError::Config(format!(
                    "{} host '{}' does not contain redirect marker '{}'",
                    field, host, self.redirect.host_marker
                ))
                .into());
            }
        }

        if self.workflow.sign_out_timeout_ms == 0 {
            return Err(IdgateError::Config(
                "workflow.sign_out_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.workflow.http_timeout_seconds == 0 {
            return Err(IdgateError::Config(
                "workflow.http_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        for (field, size) in [
            ("surface.login", self.surface.login),
            ("surface.sign_out", self.surface.sign_out),
        ] {
            if size.width == 0 || size.height == 0 {
                return Err(IdgateError::Config(format!(
                    "{} width and height must be greater than 0",
                    field
                ))
                .into());
            }
        }

        Ok(())
    }
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| {
        IdgateError::Config(format!("{} '{}' is not a valid URL: {}", field, value, e)).into()
    })
}
