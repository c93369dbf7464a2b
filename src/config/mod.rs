//
//  octopus-client
//  config/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration Module
//!
//! Everything the client needs to talk to one server: the base address, the
//! credential, an optional space selector, the per-request timeout, the retry
//! policy for idempotent requests and the defaults for task polling.
//!
//! A [`ClientConfiguration`] is immutable once built. It is assembled in
//! layers, each overriding the one before:
//!
//! 1. Built-in defaults
//! 2. The optional [`ConfigFile`] (`config.toml`)
//! 3. Environment variables (`OCTOPUS_URL`, `OCTOPUS_API_KEY`,
//!    `OCTOPUS_ACCESS_TOKEN`, `OCTOPUS_SPACE`)
//! 4. Explicit builder calls (the CLI's flags)
//!
//! ## Usage
//!
//! ```rust,no_run
//! use octopus_client::config::ClientConfiguration;
//!
//! let config = ClientConfiguration::builder()
//!     .server("https://octopus.example.com")
//!     .api_key("API-XXXXXXXXXXXXXXXXXXXXXXXXXX")
//!     .space("Default")
//!     .build()?;
//!
//! assert_eq!(config.space(), Some("Default"));
//! # Ok::<(), octopus_client::config::ConfigError>(())
//! ```
//!
//! ## Submodules
//!
//! - [`file`]: the TOML configuration file

mod file;

pub use file::*;

use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use url::Url;

use crate::auth::Credential;

/// Environment variable holding the server address.
pub const ENV_SERVER: &str = "OCTOPUS_URL";
/// Environment variable holding an API key.
pub const ENV_API_KEY: &str = "OCTOPUS_API_KEY";
/// Environment variable holding a bearer token.
pub const ENV_ACCESS_TOKEN: &str = "OCTOPUS_ACCESS_TOKEN";
/// Environment variable holding the space selector.
pub const ENV_SPACE: &str = "OCTOPUS_SPACE";

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors raised while assembling a configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No server address was supplied by any layer.
    #[error("No server address configured (set --server or OCTOPUS_URL)")]
    MissingServer,

    /// No credential was supplied by any layer.
    #[error("No credential configured (set --api-key, OCTOPUS_API_KEY or OCTOPUS_ACCESS_TOKEN)")]
    MissingCredential,

    /// The server address is not a usable URL.
    #[error("Invalid server address '{url}': {reason}")]
    InvalidUrl {
        /// The rejected value
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The configuration file could not be read.
    #[error("Failed to read configuration: {0}")]
    Io(String),

    /// The configuration file is not valid TOML.
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// The platform has no configuration directory.
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Retry behaviour for idempotent requests that fail at the transport level.
///
/// # Fields
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `max_attempts` | 3 | Total attempts, the first included |
/// | `initial_backoff` | 200 ms | Delay before the second attempt |
/// | `max_backoff` | 5 s | Upper bound for any delay |
/// | `jitter` | on | Randomize each delay between half and all of it |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Returns the delay to wait after the given failed attempt (1-based).
    ///
    /// The delay doubles with each attempt and is capped at `max_backoff`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_backoff);
        if self.jitter && !base.is_zero() {
            base.mul_f64(rand::rng().random_range(0.5..=1.0))
        } else {
            base
        }
    }
}

/// Defaults for waiting on server tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingOptions {
    /// Delay between two polls of the same task.
    pub interval: Duration,
    /// Overall budget for one task.
    pub timeout: Duration,
    /// Whether to cancel the task when the budget runs out.
    pub cancel_on_timeout: bool,
}

impl Default for PollingOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(600),
            cancel_on_timeout: false,
        }
    }
}

/// Immutable settings for one client session.
///
/// Construct with [`ClientConfiguration::builder`] or
/// [`ClientConfiguration::load`].
#[derive(Debug, Clone)]
pub struct ClientConfiguration {
    server_url: Url,
    credential: Credential,
    space: Option<String>,
    request_timeout: Duration,
    retry: RetryPolicy,
    polling: PollingOptions,
    user_agent: String,
}

impl ClientConfiguration {
    /// Starts an empty builder.
    pub fn builder() -> ClientConfigurationBuilder {
        ClientConfigurationBuilder::default()
    }

    /// Builds a configuration from the default file and the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is unreadable, or if no layer
    /// supplies a server or a credential.
    pub fn load() -> Result<Self, ConfigError> {
        let file = ConfigFile::load_default()?;
        Self::builder()
            .with_file(&file)
            .with_env(&EnvSettings::from_env())
            .build()
    }

    /// Builds a configuration from the process environment alone.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::builder().with_env(&EnvSettings::from_env()).build()
    }

    /// The server's base address.
    pub fn server_url(&self) -> &Url {
        &self.server_url
    }

    /// The credential attached to every request.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// The configured space selector, if any.
    pub fn space(&self) -> Option<&str> {
        self.space.as_deref()
    }

    /// The per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// The retry policy for idempotent requests.
    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }

    /// The polling defaults.
    pub fn polling(&self) -> &PollingOptions {
        &self.polling
    }

    /// The `User-Agent` header value.
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns a copy scoped to another space selector.
    pub fn with_space(&self, space: Option<String>) -> Self {
        Self {
            space,
            ..self.clone()
        }
    }
}

/// Values read from the `OCTOPUS_*` environment variables.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSettings {
    pub server: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub space: Option<String>,
}

impl EnvSettings {
    /// Reads the process environment.
    pub fn from_env() -> Self {
        Self::with_lookup(|name| std::env::var(name).ok())
    }

    /// Reads through `lookup`, ignoring blank values.
    pub fn with_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            server: read(ENV_SERVER),
            api_key: read(ENV_API_KEY),
            access_token: read(ENV_ACCESS_TOKEN),
            space: read(ENV_SPACE),
        }
    }
}

/// Layered builder for [`ClientConfiguration`].
///
/// Later calls override earlier ones, so apply layers from least to most
/// specific.
#[derive(Debug, Clone, Default)]
pub struct ClientConfigurationBuilder {
    server: Option<String>,
    credential: Option<Credential>,
    space: Option<String>,
    request_timeout: Option<Duration>,
    retry: RetryPolicy,
    polling: PollingOptions,
}

impl ClientConfigurationBuilder {
    /// Applies the values present in a configuration file.
    pub fn with_file(mut self, file: &ConfigFile) -> Self {
        if let Some(server) = &file.server {
            self.server = Some(server.clone());
        }
        if let Some(token) = &file.access_token {
            self.credential = Some(Credential::bearer(token));
        }
        if let Some(key) = &file.api_key {
            self.credential = Some(Credential::api_key(key));
        }
        if let Some(space) = &file.space {
            self.space = Some(space.clone());
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout = Some(Duration::from_secs(secs));
        }

        let retry = &file.retry;
        if let Some(attempts) = retry.max_attempts {
            self.retry.max_attempts = attempts.max(1);
        }
        if let Some(ms) = retry.initial_backoff_ms {
            self.retry.initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = retry.max_backoff_ms {
            self.retry.max_backoff = Duration::from_millis(ms);
        }
        if let Some(jitter) = retry.jitter {
            self.retry.jitter = jitter;
        }

        let polling = &file.polling;
        if let Some(secs) = polling.interval_secs {
            self.polling.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = polling.timeout_secs {
            self.polling.timeout = Duration::from_secs(secs);
        }
        if let Some(cancel) = polling.cancel_on_timeout {
            self.polling.cancel_on_timeout = cancel;
        }
        self
    }

    /// Applies the values present in the environment. An API key wins over
    /// an access token when both are set.
    pub fn with_env(mut self, env: &EnvSettings) -> Self {
        if let Some(server) = &env.server {
            self.server = Some(server.clone());
        }
        if let Some(token) = &env.access_token {
            self.credential = Some(Credential::bearer(token));
        }
        if let Some(key) = &env.api_key {
            self.credential = Some(Credential::api_key(key));
        }
        if let Some(space) = &env.space {
            self.space = Some(space.clone());
        }
        self
    }

    /// Sets the server base address.
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }

    /// Authenticates with an API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.credential = Some(Credential::api_key(key));
        self
    }

    /// Authenticates with a bearer token.
    pub fn access_token(mut self, token: impl Into<String>) -> Self {
        self.credential = Some(Credential::bearer(token));
        self
    }

    /// Sets the credential directly.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the space selector.
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Sets the per-request timeout.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Replaces the retry policy.
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the polling defaults.
    pub fn polling(mut self, polling: PollingOptions) -> Self {
        self.polling = polling;
        self
    }

    /// Validates and freezes the configuration.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::MissingServer`] when no server was supplied
    /// - [`ConfigError::InvalidUrl`] when it is not an absolute http(s) URL
    /// - [`ConfigError::MissingCredential`] when no non-blank credential was supplied
    pub fn build(self) -> Result<ClientConfiguration, ConfigError> {
        let raw = self
            .server
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingServer)?;
        let server_url = parse_server_url(&raw)?;

        let credential = self
            .credential
            .filter(|c| !c.is_blank())
            .ok_or(ConfigError::MissingCredential)?;

        Ok(ClientConfiguration {
            server_url,
            credential,
            space: self.space.filter(|s| !s.trim().is_empty()),
            request_timeout: self.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            retry: self.retry,
            polling: self.polling,
            user_agent: format!("{}/{}", crate::APP_NAME, crate::VERSION),
        })
    }
}

fn parse_server_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };
    let mut url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("missing host"));
    }
    url.set_query(None);
    url.set_fragment(None);
    let path = url.path().trim_end_matches('/').to_string();
    url.set_path(&path);
    Ok(url)
}
