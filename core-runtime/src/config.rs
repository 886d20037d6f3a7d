//! # Core Configuration Module
//!
//! Provides configuration management for the client core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds all dependencies and settings for the core library.
//! It enforces fail-fast validation so that every required bridge is present
//! before the auth stack is wired.
//!
//! ## Required Dependencies
//!
//! - `HttpClient` - Raw HTTP transport (desktop default: reqwest)
//! - `SecureStore` - Credential persistence (desktop default: OS keyring)
//! - `Navigator` - Host navigation boundary (desktop default: watch channel)
//!
//! When the `desktop-shims` feature is enabled, desktop-ready defaults are
//! injected automatically for any bridge that was not provided.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//!
//! let config = CoreConfig::builder()
//!     .api_base_url("https://api.example.com/api")
//!     .http_client(Arc::new(MyHttpClient))
//!     .secure_store(Arc::new(MySecureStore))
//!     .navigator(Arc::new(MyNavigator))
//!     .build()?;
//!
//! assert_eq!(config.api_base_url.as_str(), "https://api.example.com/api/");
//! ```
//!
//! ## Environment
//!
//! [`CoreConfigBuilder::from_env`] seeds a builder from:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `FOLIO_API_BASE_URL` | API base URL |
//! | `FOLIO_REQUEST_TIMEOUT_SECS` | Per-request timeout in seconds |

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{HttpClient, Navigator, SecureStore};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

pub const ENV_API_BASE_URL: &str = "FOLIO_API_BASE_URL";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FOLIO_REQUEST_TIMEOUT_SECS";

/// Paths of the backend auth endpoints, relative to the API base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login: String,
    pub logout: String,
    pub token_refresh: String,
    pub current_user: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "auth/login/".to_string(),
            logout: "auth/logout/".to_string(),
            token_refresh: "auth/token/refresh/".to_string(),
            current_user: "auth/user/".to_string(),
        }
    }
}

impl AuthEndpoints {
    fn normalized(self) -> Result<Self> {
        Ok(Self {
            login: normalize_path("login", self.login)?,
            logout: normalize_path("logout", self.logout)?,
            token_refresh: normalize_path("token_refresh", self.token_refresh)?,
            current_user: normalize_path("current_user", self.current_user)?,
        })
    }
}

/// Leading slashes are dropped so that joining keeps the base URL's path.
fn normalize_path(name: &str, path: String) -> Result<String> {
    let trimmed = path.trim().trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Config(format!(
            "Endpoint path '{}' cannot be empty",
            name
        )));
    }
    if trimmed.contains("://") {
        return Err(Error::Config(format!(
            "Endpoint path '{}' must be relative to the API base URL, got '{}'",
            name, trimmed
        )));
    }
    Ok(trimmed.to_string())
}

/// Core configuration for the client core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Base URL every relative request path is resolved against. Always ends with `/`.
    pub api_base_url: Url,

    /// Auth endpoint paths
    pub endpoints: AuthEndpoints,

    /// Timeout applied by the default HTTP client
    pub request_timeout: Duration,

    /// Event bus buffer size
    pub event_buffer_size: usize,

    /// Raw HTTP transport
    pub http_client: Arc<dyn HttpClient>,

    /// Durable credential storage
    pub secure_store: Arc<dyn SecureStore>,

    /// Host navigation boundary
    pub navigator: Arc<dyn Navigator>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("api_base_url", &self.api_base_url.as_str())
            .field("endpoints", &self.endpoints)
            .field("request_timeout", &self.request_timeout)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("http_client", &"HttpClient { ... }")
            .field("secure_store", &"SecureStore { ... }")
            .field("navigator", &"Navigator { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Scheme, host and port of the API. Stored credentials are scoped to it.
    pub fn origin(&self) -> String {
        self.api_base_url.origin().ascii_serialization()
    }

    /// Resolve a path relative to the API base URL.
    pub fn resolve(&self, path: &str) -> Result<Url> {
        self.api_base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::Config(format!("Invalid request path '{}': {}", path, e)))
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        validate_base_url(&self.api_base_url)?;

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "Request timeout must be greater than zero".to_string(),
            ));
        }

        if self.request_timeout > MAX_REQUEST_TIMEOUT {
            return Err(Error::Config(format!(
                "Request timeout exceeds maximum of {} seconds",
                MAX_REQUEST_TIMEOUT.as_secs()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn validate_base_url(url: &Url) -> Result<()> {
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "API base URL must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(Error::Config("API base URL must include a host".to_string()));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::Config(
            "API base URL must not carry a query or fragment".to_string(),
        ));
    }
    Ok(())
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    let url = Url::parse(&raw)
        .map_err(|e| Error::Config(format!("Invalid API base URL '{}': {}", raw, e)))?;
    validate_base_url(&url)?;
    Ok(url)
}

#[cfg(not(feature = "desktop-shims"))]
fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout).map_err(|e| {
        Error::Internal(format!("Failed to initialize default HttpClient: {}", e))
    })?;
    Ok(Arc::new(client))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(capability_missing(
        "HttpClient",
        "HttpClient implementation is required for API access. \
         Desktop: enable the 'desktop-shims' feature to use the default ReqwestHttpClient. \
         Mobile: inject a platform-native HTTP adapter.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    use bridge_desktop::KeyringSecureStore;

    let store: Arc<dyn SecureStore> = Arc::new(KeyringSecureStore::new());
    Ok(store)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_secure_store() -> Result<Arc<dyn SecureStore>> {
    Err(capability_missing(
        "SecureStore",
        "SecureStore implementation is required for credential persistence. \
         Desktop: enable the 'desktop-shims' feature to use the default KeyringSecureStore. \
         Mobile: inject platform-native secure storage (Keychain/Keystore).",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_navigator() -> Result<Arc<dyn Navigator>> {
    use bridge_desktop::WatchNavigator;

    let navigator: Arc<dyn Navigator> = Arc::new(WatchNavigator::new());
    Ok(navigator)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_navigator() -> Result<Arc<dyn Navigator>> {
    Err(capability_missing(
        "Navigator",
        "Navigator implementation is required to route the host UI when the session changes. \
         Desktop: enable the 'desktop-shims' feature to use the default WatchNavigator. \
         Mobile: inject a navigator bound to the host router.",
    ))
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Default)]
pub struct CoreConfigBuilder {
    api_base_url: Option<String>,
    endpoints: Option<AuthEndpoints>,
    request_timeout: Option<Duration>,
    event_buffer_size: Option<usize>,
    http_client: Option<Arc<dyn HttpClient>>,
    secure_store: Option<Arc<dyn SecureStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl CoreConfigBuilder {
    /// Seed a builder from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Seed a builder from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::default();

        if let Some(url) = lookup(ENV_API_BASE_URL).filter(|v| !v.trim().is_empty()) {
            builder = builder.api_base_url(url);
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_REQUEST_TIMEOUT_SECS, raw
                ))
            })?;
            builder = builder.request_timeout(Duration::from_secs(secs));
        }

        Ok(builder)
    }

    /// Sets the API base URL. A trailing `/` is added when missing.
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = Some(endpoints);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn secure_store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.secure_store = Some(store);
        self
    }

    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] when a value is invalid
    /// - [`Error::CapabilityMissing`] when a bridge is absent and no platform
    ///   default is compiled in
    pub fn build(self) -> Result<CoreConfig> {
        let api_base_url =
            parse_base_url(self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL))?;
        let endpoints = self.endpoints.unwrap_or_default().normalized()?;
        let request_timeout = self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT);

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(request_timeout)?,
        };

        let secure_store = match self.secure_store {
            Some(store) => store,
            None => provide_default_secure_store()?,
        };

        let navigator = match self.navigator {
            Some(navigator) => navigator,
            None => provide_default_navigator()?,
        };

        let config = CoreConfig {
            api_base_url,
            endpoints,
            request_timeout,
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            http_client,
            secure_store,
            navigator,
        };

        config.validate()?;

        Ok(config)
    }
}
