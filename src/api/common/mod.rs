//
//  octopus-client
//  api/common/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Common API Types for the Octopus Client
//!
//! This module provides the shared error taxonomy and response shapes used by
//! every layer of the client: the transport wrapper, the repositories, the
//! resolvers and the release orchestrator.
//!
//! # Overview
//!
//! - [`ApiError`] - Unified error type for all API operations
//! - [`ErrorResponseDetails`] - Parsed body of a non-2xx response
//! - Pagination types (re-exported from [`pagination`] submodule)
//!
//! # Example
//!
//! ```rust,ignore
//! use octopus_client::api::common::ApiError;
//!
//! fn handle_result<T>(result: Result<T, ApiError>) {
//!     match result {
//!         Ok(_) => println!("Success!"),
//!         Err(ApiError::Authentication { .. }) => println!("Check your API key"),
//!         Err(ApiError::NotFound(resource)) => println!("Resource not found: {}", resource),
//!         Err(e) => println!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Notes
//!
//! - `ApiError` is `Clone` so a single failed root-document fetch can be handed
//!   to every caller that joined the in-flight request
//! - Server error bodies use PascalCase field names (`ErrorMessage`, `Errors`)

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::transport::TransportError;
use crate::release::PackageMismatch;

mod pagination;

pub use pagination::*;

/// Unified error type for all Octopus API operations.
///
/// # Variants
///
/// | Variant | Description | HTTP Status |
/// |---------|-------------|-------------|
/// | `Authentication` | Credential rejected | 401 / 403 |
/// | `NotFound` | Direct lookup found nothing | 404 |
/// | `AmbiguousName` / `AmbiguousSpace` | Name lookup matched several resources | N/A |
/// | `SpaceNotFound` | No space matches the selector | N/A |
/// | `Validation` | Server rejected the request body | other 4xx |
/// | `ReleaseConflict` | Release version already exists | 409 |
/// | `Server` | Server-side failure | 5xx |
/// | `UnreachableServer` / `Transport` / `Timeout` | Connection-level failures | N/A |
/// | `ScheduleExpired` / `PollTimeoutExceeded` / `Cancelled` | Polling outcomes | N/A |
/// | `InvalidOperation` | Caller misuse | N/A |
///
/// # Notes
///
/// - Only connection-level failures are retryable, see [`ApiError::is_retryable`]
/// - Error messages are designed to be rendered without re-querying the server
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The server rejected the configured credential.
    #[error("Authentication failed ({status}): {message}")]
    Authentication {
        /// HTTP status code (401 or 403)
        status: u16,
        /// Message reported by the server
        message: String,
    },

    /// The requested resource does not exist.
    ///
    /// # Parameters
    ///
    /// - `0` - Description of the resource that was not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A name lookup matched more than one resource.
    #[error("More than one {kind} is named '{name}': {}", .matches.join(", "))]
    AmbiguousName {
        /// Resource kind, e.g. "project"
        kind: String,
        /// The name that was looked up
        name: String,
        /// Ids of every matching resource
        matches: Vec<String>,
    },

    /// No space matches the selector.
    #[error("Space not found: {0}")]
    SpaceNotFound(String),

    /// More than one space matches the selector.
    #[error("More than one space is named '{name}': {}", .matches.join(", "))]
    AmbiguousSpace {
        /// The selector that was looked up
        name: String,
        /// Ids of every matching space
        matches: Vec<String>,
    },

    /// The server rejected the request (4xx with a structured body).
    #[error("{0}")]
    Validation(ErrorResponseDetails),

    /// A release with the requested version already exists.
    #[error("Release {version} already exists: {details}")]
    ReleaseConflict {
        /// The version that was requested
        version: String,
        /// Server response describing the conflict
        details: ErrorResponseDetails,
    },

    /// The server could not be reached at all.
    #[error("Unable to reach {url}: {message}")]
    UnreachableServer {
        /// URL of the failed request
        url: String,
        /// Underlying connection failure
        message: String,
    },

    /// A single request exceeded the configured timeout.
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout {
        /// URL of the failed request
        url: String,
        /// The timeout that elapsed
        timeout: Duration,
    },

    /// Any other transport-level failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server failed while handling the request (5xx).
    #[error("Server error: {0}")]
    Server(ErrorResponseDetails),

    /// The response body did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// A required link template variable had no value.
    #[error("Link template '{template}' requires a value for '{parameter}'")]
    MissingParameter {
        /// The template being expanded
        template: String,
        /// The variable without a value
        parameter: String,
    },

    /// A document does not advertise the requested link.
    #[error("Document does not advertise a '{0}' link")]
    MissingLink(String),

    /// A scheduled task was still queued after its expiry.
    #[error("Task {task_id} was still queued when its schedule expired at {expiry}")]
    ScheduleExpired {
        /// The server task id
        task_id: String,
        /// The task's `QueueTimeExpiry`
        expiry: DateTime<Utc>,
    },

    /// The overall wait budget ran out before the task finished.
    #[error("Gave up waiting for task {task_id} after {waited:?} (last state: {state})")]
    PollTimeoutExceeded {
        /// The server task id
        task_id: String,
        /// How long the poller waited
        waited: Duration,
        /// The last observed task state
        state: String,
    },

    /// The caller cancelled the operation.
    #[error("Operation cancelled")]
    Cancelled,

    /// Requested package versions are not available in their feeds.
    #[error("Package versions are unavailable: {}", PackageMismatch::summarize(.0))]
    PackageMismatch(Vec<PackageMismatch>),

    /// The caller used the API incorrectly.
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    Io(String),
}

impl ApiError {
    /// Translates a non-2xx response into the error taxonomy.
    ///
    /// # Parameters
    ///
    /// * `status` - The HTTP status code
    /// * `body` - The raw response body
    /// * `url` - The request URL, used when the body carries no message
    ///
    /// # Returns
    ///
    /// The matching [`ApiError`] variant.
    pub fn from_response(status: u16, body: &str, url: &str) -> Self {
        let details = ErrorResponseDetails::from_body(status, body);
        match status {
            401 | 403 => Self::Authentication {
                status,
                message: details.error_message,
            },
            404 => {
                if details.parsed {
                    Self::NotFound(details.error_message)
                } else {
                    Self::NotFound(url.to_string())
                }
            }
            400..=499 => Self::Validation(details),
            500..=599 => Self::Server(details),
            _ => Self::UnexpectedResponse(format!("{} returned status {}", url, status)),
        }
    }

    /// Translates a transport failure for the request at `url`.
    pub fn from_transport(error: TransportError, url: &str, timeout: Duration) -> Self {
        match error {
            TransportError::Connect(message) => Self::UnreachableServer {
                url: url.to_string(),
                message,
            },
            TransportError::Timeout => Self::Timeout {
                url: url.to_string(),
                timeout,
            },
            TransportError::Other(message) => Self::Transport(message),
        }
    }

    /// Returns `true` for connection-level failures that are safe to retry
    /// on idempotent requests.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::UnreachableServer { .. } | Self::Timeout { .. } | Self::Transport(_)
        )
    }

    /// Returns `true` if this is a [`ApiError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns `true` if this is an [`ApiError::Authentication`].
    pub fn is_authentication(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns the HTTP status code behind this error, when there is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } => Some(*status),
            Self::NotFound(_) => Some(404),
            Self::Validation(details) | Self::Server(details) => Some(details.status_code),
            Self::ReleaseConflict { details, .. } => Some(details.status_code),
            _ => None,
        }
    }
}

/// Parsed shape of a non-2xx response body.
///
/// The server reports failures as:
///
/// ```json
/// {"ErrorMessage": "There was a problem with your request.", "Errors": ["Name must be unique"]}
/// ```
///
/// # Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `status_code` | `u16` | HTTP status of the response |
/// | `error_message` | `String` | Summary message |
/// | `errors` | `Vec<String>` | Per-field errors, in server order |
///
/// # Notes
///
/// - When the body cannot be parsed, the message is synthesized from the
///   status code and `parsed` is `false`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ErrorResponseDetails {
    /// HTTP status of the response.
    #[serde(default)]
    pub status_code: u16,

    /// Summary message.
    #[serde(default)]
    pub error_message: String,

    /// Per-field validation errors, in server order.
    #[serde(default)]
    pub errors: Vec<String>,

    /// Whether the details came from the response body.
    #[serde(skip)]
    pub parsed: bool,
}

impl ErrorResponseDetails {
    /// Parses a response body, falling back to a message derived from the
    /// status code.
    pub fn from_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponseDetails>(body) {
            Ok(details) if !details.error_message.is_empty() || !details.errors.is_empty() => {
                Self {
                    status_code: status,
                    parsed: true,
                    ..details
                }
            }
            _ => Self::synthesized(status),
        }
    }

    /// Builds details for a response without a usable body.
    pub fn synthesized(status: u16) -> Self {
        let reason = StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown status");
        Self {
            status_code: status,
            error_message: format!("Request failed with status {} ({})", status, reason),
            errors: Vec::new(),
            parsed: false,
        }
    }

    /// Returns `true` if the message or any field error contains `needle`,
    /// ignoring case.
    pub fn mentions(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.error_message.to_lowercase().contains(&needle)
            || self.errors.iter().any(|e| e.to_lowercase().contains(&needle))
    }
}

impl fmt::Display for ErrorResponseDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error_message)?;
        for error in &self.errors {
            write!(f, "\n - {}", error)?;
        }
        Ok(())
    }
}
