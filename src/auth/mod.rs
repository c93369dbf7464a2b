//
//  octopus-client
//  auth/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Authentication Module
//!
//! The server accepts one of two credentials on every request:
//!
//! - **API key**: sent as the `X-Octopus-ApiKey` header. This is what service
//!   accounts and build agents use.
//! - **Access token**: a bearer token sent as `Authorization: Bearer <token>`,
//!   typically obtained through an OIDC exchange.
//!
//! ## Example
//!
//! ```rust
//! use octopus_client::auth::Credential;
//!
//! let credential = Credential::api_key("API-XXXXXXXXXXXXXXXXXXXXXXXXXX");
//! let (name, value) = credential.header();
//! assert_eq!(name, "X-Octopus-ApiKey");
//! assert_eq!(value, "API-XXXXXXXXXXXXXXXXXXXXXXXXXX");
//! ```

use std::fmt;

/// Header carrying an API key.
pub const API_KEY_HEADER: &str = "X-Octopus-ApiKey";

/// Header carrying a bearer token.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// A credential attached to every request.
///
/// # Variants
///
/// - `ApiKey`: a long-lived key issued to a user or service account.
/// - `BearerToken`: a short-lived access token.
///
/// # Notes
///
/// - `Debug` output never includes the secret.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// An API key, sent as `X-Octopus-ApiKey`.
    ApiKey(String),
    /// An access token, sent as `Authorization: Bearer`.
    BearerToken(String),
}

impl Credential {
    /// Creates an API key credential.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::ApiKey(key.into())
    }

    /// Creates a bearer token credential.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self::BearerToken(token.into())
    }

    /// Returns the header name and value for this credential.
    pub fn header(&self) -> (&'static str, String) {
        match self {
            Self::ApiKey(key) => (API_KEY_HEADER, key.clone()),
            Self::BearerToken(token) => (AUTHORIZATION_HEADER, format!("Bearer {}", token)),
        }
    }

    /// Returns a short label for log output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApiKey(_) => "api-key",
            Self::BearerToken(_) => "access-token",
        }
    }

    /// Returns `true` if the secret is blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::ApiKey(secret) | Self::BearerToken(secret) => secret.trim().is_empty(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ApiKey(_) => f.write_str("ApiKey(***)"),
            Self::BearerToken(_) => f.write_str("BearerToken(***)"),
        }
    }
}
