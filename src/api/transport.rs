//
//  octopus-client
//  api/transport.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Transport Seam
//!
//! The [`Transport`] trait is the only place the client touches the network.
//! It takes a fully resolved request and returns the raw status, headers and
//! body. Everything above it (status translation, JSON decoding, retries,
//! caching) lives in [`ApiClient`](super::ApiClient), so tests substitute an
//! in-memory transport and exercise the real client logic.
//!
//! [`ReqwestTransport`] is the production implementation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;
use thiserror::Error;

/// HTTP methods the client issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// Read a resource.
    Get,
    /// Create a resource or trigger an action.
    Post,
    /// Replace a resource.
    Put,
    /// Remove a resource.
    Delete,
}

impl HttpMethod {
    /// Returns `true` for methods that may be retried without side effects.
    pub fn is_idempotent(&self) -> bool {
        matches!(self, Self::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

impl From<HttpMethod> for Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    /// A JSON document.
    Json(Value),
    /// A file sent as multipart form data under `fileToUpload`.
    File {
        /// File name reported to the server
        file_name: String,
        /// Raw file content
        content: Vec<u8>,
    },
}

/// A fully resolved request.
#[derive(Debug, Clone)]
pub struct RequestDetails {
    /// HTTP method
    pub method: HttpMethod,
    /// Absolute URL including the query string
    pub url: String,
    /// Extra headers, credential included
    pub headers: Vec<(String, String)>,
    /// Optional payload
    pub body: Option<RequestBody>,
}

impl RequestDetails {
    /// Creates a request without headers or body.
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the payload.
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Returns the first value of the named header, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response returned by a [`Transport`].
#[derive(Debug, Clone)]
pub struct ResponseDetails {
    /// HTTP status code
    pub status: u16,
    /// Response headers, names lowercased
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub body: String,
}

impl ResponseDetails {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Returns `true` for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure to complete an exchange with the server.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),
    /// The exchange did not complete in time.
    #[error("request timed out")]
    Timeout,
    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

/// Sends requests to the server.
///
/// # Example
///
/// ```rust,ignore
/// use octopus_client::api::transport::{HttpMethod, RequestDetails, Transport};
///
/// async fn ping(transport: &dyn Transport) {
///     let response = transport
///         .send(RequestDetails::new(HttpMethod::Get, "https://octopus.example.com/api"))
///         .await;
///     println!("{:?}", response.map(|r| r.status));
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one exchange.
    async fn send(&self, request: RequestDetails) -> Result<ResponseDetails, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    /// Builds a transport with the given user agent and connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Other`] if the TLS backend cannot be
    /// initialised.
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { http })
    }

    /// Wraps an existing `reqwest` client.
    pub fn from_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: RequestDetails) -> Result<ResponseDetails, TransportError> {
        let mut builder = self.http.request(request.method.into(), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        builder = match request.body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::File { file_name, content }) => {
                let part = Part::bytes(content)
                    .file_name(file_name)
                    .mime_str("application/octet-stream")
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                builder.multipart(Form::new().part("fileToUpload", part))
            }
            None => builder,
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();
        let body = response.text().await.map_err(classify)?;

        Ok(ResponseDetails {
            status,
            headers,
            body,
        })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}
