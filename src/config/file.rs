//
//  octopus-client
//  config/file.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Configuration File
//!
//! The optional on-disk layer of the configuration. Every field is optional;
//! anything left out falls back to the environment or the built-in defaults.
//!
//! ## Location
//!
//! - **Linux**: `~/.config/octo/config.toml`
//! - **macOS**: `~/Library/Application Support/octo/config.toml`
//! - **Windows**: `C:\Users\<User>\AppData\Roaming\octo\config\config.toml`
//!
//! ## Example
//!
//! ```toml
//! server = "https://octopus.example.com"
//! api_key = "API-XXXXXXXXXXXXXXXXXXXXXXXXXX"
//! space = "Default"
//! request_timeout_secs = 30
//!
//! [retry]
//! max_attempts = 3
//! initial_backoff_ms = 200
//! max_backoff_ms = 5000
//! jitter = true
//!
//! [polling]
//! interval_secs = 10
//! timeout_secs = 600
//! cancel_on_timeout = false
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Parsed `config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// Server base address
    pub server: Option<String>,
    /// API key credential
    pub api_key: Option<String>,
    /// Bearer token credential
    pub access_token: Option<String>,
    /// Space name or id
    pub space: Option<String>,
    /// Per-request timeout in seconds
    pub request_timeout_secs: Option<u64>,
    /// Retry settings
    pub retry: RetrySection,
    /// Polling settings
    pub polling: PollingSection,
}

/// `[retry]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub jitter: Option<bool>,
}

/// `[polling]` table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingSection {
    pub interval_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub cancel_on_timeout: Option<bool>,
}

impl ConfigFile {
    /// Returns the platform-specific path of `config.toml`.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = ProjectDirs::from("", "", crate::APP_NAME).ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Reads and parses the file at `path`.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    /// Parses TOML content.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Reads the file at the default location, or returns an empty
    /// configuration when it does not exist.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::read(&path)
        } else {
            Ok(Self::default())
        }
    }
}
