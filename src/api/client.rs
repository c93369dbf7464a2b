//
//  octopus-client
//  api/client.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Hypermedia Client
//!
//! [`ApiClient`] is the shared entry point for every request. It resolves
//! server-relative links against the configured base address, attaches the
//! credential, bounds each exchange with the request timeout, retries
//! idempotent reads that fail at the transport level, and translates non-2xx
//! responses into [`ApiError`].
//!
//! ## Features
//!
//! - Root-document bootstrap from `<base>/api`, memoized per server and space
//! - Request coalescing through [`SingleFlightCache`]
//! - Authentication failures clear every cached root document
//! - A pluggable [`Transport`] for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use octopus_client::api::ApiClient;
//! use octopus_client::config::ClientConfiguration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfiguration::builder()
//!     .server("https://octopus.example.com")
//!     .api_key("API-XXXXXXXXXXXXXXXXXXXXXXXXXX")
//!     .build()?;
//!
//! let client = ApiClient::new(config)?;
//! let root = client.server_information().await?;
//! println!("Connected to {} {}", root.application, root.version);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::cache::SingleFlightCache;
use super::common::ApiError;
use super::links::LinkParams;
use super::resources::{RootDocument, SpaceResource, SPACE_HOME};
use super::spaces::SpaceSelector;
use super::transport::{
    HttpMethod, ReqwestTransport, RequestBody, RequestDetails, ResponseDetails, Transport,
    TransportError,
};
use crate::config::ClientConfiguration;

/// Cache key of a root document: the server and, for space roots, the space id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootKey {
    server: String,
    space_id: Option<String>,
}

struct ClientInner {
    config: ClientConfiguration,
    transport: Arc<dyn Transport>,
    roots: SingleFlightCache<RootKey, Arc<RootDocument>>,
    spaces: SingleFlightCache<SpaceSelector, SpaceResource>,
}

/// Shared client for one server. Cloning is cheap and clones share caches.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("server", &self.inner.config.server_url().as_str())
            .field("credential", self.inner.config.credential())
            .finish()
    }
}

impl ApiClient {
    /// Creates a client that talks HTTP through `reqwest`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Transport`] if the HTTP stack cannot be built.
    pub fn new(config: ClientConfiguration) -> Result<Self, ApiError> {
        let transport = ReqwestTransport::new(config.user_agent(), config.request_timeout())
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a client over an arbitrary [`Transport`].
    pub fn with_transport(config: ClientConfiguration, transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                roots: SingleFlightCache::new(),
                spaces: SingleFlightCache::new(),
            }),
        }
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfiguration {
        &self.inner.config
    }

    pub(crate) fn space_cache(&self) -> &SingleFlightCache<SpaceSelector, SpaceResource> {
        &self.inner.spaces
    }

    /// Turns a server link into an absolute URL.
    ///
    /// Absolute links are returned unchanged. Server-relative links (`/api/...`
    /// or `~/api/...`) are placed under the configured base address, keeping
    /// any virtual directory it has.
    pub fn resolve_url(&self, href: &str) -> Result<String, ApiError> {
        if href.starts_with("http://") || href.starts_with("https://") {
            return Ok(href.to_string());
        }

        let base = self.inner.config.server_url();
        let base_path = base.path().trim_end_matches('/');

        let relative = href.strip_prefix('~').unwrap_or(href);
        let mut path = if relative.starts_with('/') {
            relative.to_string()
        } else {
            format!("/{}", relative)
        };
        if !base_path.is_empty() && !path.starts_with(&format!("{}/", base_path)) {
            path = format!("{}{}", base_path, path);
        }

        base.join(&path)
            .map(|url: Url| url.to_string())
            .map_err(|e| ApiError::InvalidOperation(format!("Cannot resolve link '{}': {}", href, e)))
    }

    /// Fetches and decodes a document.
    pub async fn get<T: DeserializeOwned>(&self, href: &str) -> Result<T, ApiError> {
        let (url, response) = self.send(HttpMethod::Get, href, None).await?;
        decode(&url, &response)
    }

    /// Sends a JSON body and decodes the response.
    pub async fn post<B, T>(&self, href: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let (url, response) = self.send(HttpMethod::Post, href, Some(body)).await?;
        decode(&url, &response)
    }

    /// Triggers an action link that takes no body, ignoring the response.
    pub async fn post_action(&self, href: &str) -> Result<(), ApiError> {
        self.send(HttpMethod::Post, href, None).await.map(|_| ())
    }

    /// Replaces a document and decodes the server's copy.
    pub async fn put<B, T>(&self, href: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = encode(body)?;
        let (url, response) = self.send(HttpMethod::Put, href, Some(body)).await?;
        decode(&url, &response)
    }

    /// Deletes a document.
    pub async fn delete(&self, href: &str) -> Result<(), ApiError> {
        self.send(HttpMethod::Delete, href, None).await.map(|_| ())
    }

    /// Uploads a file as multipart form data and decodes the response.
    pub async fn upload<T: DeserializeOwned>(
        &self,
        href: &str,
        file_name: &str,
        content: Vec<u8>,
    ) -> Result<T, ApiError> {
        let body = RequestBody::File {
            file_name: file_name.to_string(),
            content,
        };
        let (url, response) = self.send(HttpMethod::Post, href, Some(body)).await?;
        decode(&url, &response)
    }

    /// Returns the server root document, fetching it at most once.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Authentication`] if the credential is rejected
    /// - [`ApiError::UnreachableServer`] if the server cannot be reached
    /// - [`ApiError::UnexpectedResponse`] if the body is not a root document
    pub async fn server_information(&self) -> Result<Arc<RootDocument>, ApiError> {
        let key = RootKey {
            server: self.inner.config.server_url().to_string(),
            space_id: None,
        };
        let client = self.clone();
        self.inner
            .roots
            .get_or_resolve(key, move || async move {
                debug!("Fetching server root document");
                client.fetch_root("/api").await
            })
            .await
    }

    /// Returns the root document of `space`, fetching it at most once.
    pub async fn space_root(&self, space: &SpaceResource) -> Result<Arc<RootDocument>, ApiError> {
        let key = RootKey {
            server: self.inner.config.server_url().to_string(),
            space_id: Some(space.id.clone()),
        };
        let client = self.clone();
        let space = space.clone();
        self.inner
            .roots
            .get_or_resolve(key, move || async move {
                let href = match space.links.get(SPACE_HOME) {
                    Some(href) => href.to_string(),
                    None => {
                        let root = client.server_information().await?;
                        root.links
                            .template(SPACE_HOME)?
                            .expand(&LinkParams::new().with("spaceId", &space.id))?
                    }
                };
                debug!("Fetching root document of space {}", space.id);
                client.fetch_root(&href).await
            })
            .await
    }

    /// Expands a relation of the server root document.
    pub async fn root_link(&self, rel: &str, params: &LinkParams) -> Result<String, ApiError> {
        let root = self.server_information().await?;
        root.links.template(rel)?.expand(params)
    }

    /// Drops every cached root document and space lookup.
    pub fn reset_cache(&self) {
        self.inner.roots.clear();
        self.inner.spaces.clear();
    }

    /// Drops the cached root document of one space.
    pub fn invalidate_space(&self, space_id: &str) {
        self.inner.roots.invalidate(&RootKey {
            server: self.inner.config.server_url().to_string(),
            space_id: Some(space_id.to_string()),
        });
    }

    async fn fetch_root(&self, href: &str) -> Result<Arc<RootDocument>, ApiError> {
        let root: RootDocument = self.get(href).await?;
        if root.links.is_empty() {
            return Err(ApiError::UnexpectedResponse(format!(
                "{} is not a root document (no links)",
                href
            )));
        }
        Ok(Arc::new(root))
    }

    /// Performs one logical request: resolves the link, attaches headers,
    /// applies the timeout, retries idempotent transport failures and maps
    /// the status.
    async fn send(
        &self,
        method: HttpMethod,
        href: &str,
        body: Option<RequestBody>,
    ) -> Result<(String, ResponseDetails), ApiError> {
        let config = &self.inner.config;
        let url = self.resolve_url(href)?;
        let (auth_name, auth_value) = config.credential().header();

        let mut request = RequestDetails::new(method, url.clone())
            .header(auth_name, auth_value)
            .header("Accept", "application/json");
        request.body = body;

        let policy = config.retry();
        let timeout = config.request_timeout();
        let mut attempt = 1;

        loop {
            debug!("{} {} (attempt {})", method, url, attempt);
            let outcome = match tokio::time::timeout(timeout, self.inner.transport.send(request.clone())).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };

            match outcome {
                Ok(response) if response.is_success() => return Ok((url, response)),
                Ok(response) => {
                    let error = ApiError::from_response(response.status, &response.body, &url);
                    if error.is_authentication() {
                        warn!("Credential rejected by {}, clearing cached documents", url);
                        self.reset_cache();
                    }
                    return Err(error);
                }
                Err(transport_error) => {
                    let error = ApiError::from_transport(transport_error, &url, timeout);
                    if !(error.is_retryable() && method.is_idempotent() && attempt < policy.max_attempts) {
                        return Err(error);
                    }
                    let delay = policy.backoff_for(attempt);
                    warn!("{} {} failed ({}), retrying in {:?}", method, url, error, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<RequestBody, ApiError> {
    serde_json::to_value(body)
        .map(RequestBody::Json)
        .map_err(|e| ApiError::InvalidOperation(format!("Cannot serialize request body: {}", e)))
}

fn decode<T: DeserializeOwned>(url: &str, response: &ResponseDetails) -> Result<T, ApiError> {
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body)
        .map_err(|e| ApiError::UnexpectedResponse(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{fixtures, MockTransport};
    use crate::config::RetryPolicy;
    use serde_json::{json, Value};
    use std::time::Duration;

    #[tokio::test]
    async fn test_root_is_fetched_once_under_concurrency() {
        let mock = MockTransport::new();
        mock.respond_after(HttpMethod::Get, "/api", Duration::from_millis(20), 200, fixtures::server_root());
        let client = fixtures::client(&mock);

        let lookups = (0..8).map(|_| client.server_information());
        let results = futures::future::join_all(lookups).await;

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 1);

        client.server_information().await.unwrap();
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 1);
    }

    #[tokio::test]
    async fn test_sends_credential_and_accept_headers() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api", 200, fixtures::server_root());
        let client = fixtures::client(&mock);

        client.server_information().await.unwrap();

        let request = mock.last_request().unwrap();
        assert_eq!(request.header_value("X-Octopus-ApiKey"), Some(fixtures::API_KEY));
        assert_eq!(request.header_value("accept"), Some("application/json"));
        assert_eq!(request.url, format!("{}/api", fixtures::BASE));
    }

    #[tokio::test]
    async fn test_authentication_failure_clears_cache() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api", 200, fixtures::server_root());
        mock.respond(HttpMethod::Get, "/api/Spaces-1/projects/Projects-1", 401, r#"{"ErrorMessage": "Invalid API key"}"#);
        let client = fixtures::client(&mock);

        client.server_information().await.unwrap();
        let error = client
            .get::<Value>("/api/Spaces-1/projects/Projects-1")
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::Authentication { status: 401, ref message } if message == "Invalid API key"));
        client.server_information().await.unwrap();
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 2);
    }

    #[tokio::test]
    async fn test_failed_root_fetch_is_not_memoized() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api", 503, "");
        mock.respond(HttpMethod::Get, "/api", 200, fixtures::server_root());
        let client = fixtures::client(&mock);

        assert!(matches!(client.server_information().await, Err(ApiError::Server(_))));
        assert!(client.server_information().await.is_ok());
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 2);
    }

    #[tokio::test]
    async fn test_root_without_links_is_rejected() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api", 200, r#"{"Application": "Something else"}"#);
        let client = fixtures::client(&mock);

        assert!(matches!(
            client.server_information().await,
            Err(ApiError::UnexpectedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_get_retries_transport_failures() {
        let mock = MockTransport::new();
        mock.fail(HttpMethod::Get, "/api", TransportError::Connect("refused".to_string()));
        mock.respond(HttpMethod::Get, "/api", 200, fixtures::server_root());
        let client = fixtures::client(&mock);

        client.server_information().await.unwrap();
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 2);
    }

    #[tokio::test]
    async fn test_post_is_never_retried() {
        let mock = MockTransport::new();
        mock.fail(HttpMethod::Post, "/api/Spaces-1/releases", TransportError::Connect("refused".to_string()));
        let client = fixtures::client(&mock);

        let error = client
            .post::<_, Value>("/api/Spaces-1/releases", &json!({"Version": "1.0.0"}))
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::UnreachableServer { .. }));
        assert_eq!(mock.calls(HttpMethod::Post, "/api/Spaces-1/releases"), 1);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let mock = MockTransport::new();
        mock.fail(HttpMethod::Get, "/api", TransportError::Other("reset".to_string()));
        let client = fixtures::client(&mock);

        assert!(matches!(client.server_information().await, Err(ApiError::Transport(_))));
        assert_eq!(mock.calls(HttpMethod::Get, "/api"), 3);
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let mock = MockTransport::new();
        mock.respond_after(HttpMethod::Get, "/api", Duration::from_millis(200), 200, fixtures::server_root());
        let config = fixtures::config_builder()
            .request_timeout(Duration::from_millis(20))
            .retry(RetryPolicy::none())
            .build()
            .unwrap();
        let client = ApiClient::with_transport(config, mock.clone());

        match client.server_information().await {
            Err(ApiError::Timeout { timeout, .. }) => assert_eq!(timeout, Duration::from_millis(20)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unparseable_success_body() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api/Spaces-1/projects/Projects-1", 200, "<html></html>");
        let client = fixtures::client(&mock);

        let error = client.get::<Value>("/api/Spaces-1/projects/Projects-1").await.unwrap_err();
        assert!(matches!(error, ApiError::UnexpectedResponse(_)));
    }

    #[tokio::test]
    async fn test_space_root_is_cached_per_space() {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api/Spaces-1", 200, fixtures::space_root());
        let client = fixtures::client(&mock);
        let space = fixtures::default_space();

        let root = client.space_root(&space).await.unwrap();
        client.space_root(&space).await.unwrap();

        assert_eq!(root.space_id.as_deref(), Some("Spaces-1"));
        assert_eq!(mock.calls(HttpMethod::Get, "/api/Spaces-1"), 1);

        client.invalidate_space("Spaces-1");
        client.space_root(&space).await.unwrap();
        assert_eq!(mock.calls(HttpMethod::Get, "/api/Spaces-1"), 2);
    }

    #[test]
    fn test_resolve_url_variants() {
        let mock = MockTransport::new();
        let plain = fixtures::client(&mock);
        assert_eq!(plain.resolve_url("/api/spaces").unwrap(), "http://octopus.test/api/spaces");
        assert_eq!(plain.resolve_url("~/api/spaces").unwrap(), "http://octopus.test/api/spaces");
        assert_eq!(plain.resolve_url("api/spaces?take=1").unwrap(), "http://octopus.test/api/spaces?take=1");
        assert_eq!(
            plain.resolve_url("https://elsewhere.test/api").unwrap(),
            "https://elsewhere.test/api"
        );

        let config = fixtures::config_builder()
            .server("http://octopus.test/octopus/")
            .build()
            .unwrap();
        let nested = ApiClient::with_transport(config, mock.clone());
        assert_eq!(nested.resolve_url("/api").unwrap(), "http://octopus.test/octopus/api");
        assert_eq!(
            nested.resolve_url("/octopus/api/Spaces-1").unwrap(),
            "http://octopus.test/octopus/api/Spaces-1"
        );
    }
}
