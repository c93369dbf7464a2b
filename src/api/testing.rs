//
//  octopus-client
//  api/testing.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Scripted in-memory transport and shared fixtures for unit tests.
//!
//! Routes are keyed by method and by path plus query, exactly as the client
//! sends them. Replies queued on a route are consumed in order and the last
//! one repeats. Unrouted requests get a 404.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::transport::{HttpMethod, RequestBody, RequestDetails, ResponseDetails, Transport, TransportError};

type Handler = Arc<dyn Fn(&RequestDetails) -> (u16, String) + Send + Sync>;

#[derive(Clone)]
enum Reply {
    Respond { status: u16, body: String, delay: Option<Duration> },
    Fail(TransportError),
    Handle(Handler),
}

struct Route {
    method: HttpMethod,
    path: String,
    body_contains: Option<String>,
    replies: VecDeque<Reply>,
}

impl Route {
    fn matches(&self, method: HttpMethod, path: &str, body: &str) -> bool {
        self.method == method
            && self.path == path
            && self
                .body_contains
                .as_ref()
                .map_or(true, |needle| body.contains(needle.as_str()))
    }

    fn next_reply(&mut self) -> Option<Reply> {
        if self.replies.len() > 1 {
            self.replies.pop_front()
        } else {
            self.replies.front().cloned()
        }
    }
}

/// A [`Transport`] that replays scripted responses and records requests.
#[derive(Default)]
pub(crate) struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<RequestDetails>>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: HttpMethod, path: &str, body_contains: Option<&str>, reply: Reply) {
        let mut routes = self.routes.lock().unwrap();
        let existing = routes.iter_mut().find(|route| {
            route.method == method && route.path == path && route.body_contains.as_deref() == body_contains
        });
        match existing {
            Some(route) => route.replies.push_back(reply),
            None => routes.push(Route {
                method,
                path: path.to_string(),
                body_contains: body_contains.map(str::to_string),
                replies: VecDeque::from([reply]),
            }),
        }
    }

    pub(crate) fn respond(&self, method: HttpMethod, path: &str, status: u16, body: impl Into<String>) {
        self.push(
            method,
            path,
            None,
            Reply::Respond { status, body: body.into(), delay: None },
        );
    }

    pub(crate) fn respond_json(&self, method: HttpMethod, path: &str, status: u16, body: Value) {
        self.respond(method, path, status, body.to_string());
    }

    pub(crate) fn respond_after(
        &self,
        method: HttpMethod,
        path: &str,
        delay: Duration,
        status: u16,
        body: impl Into<String>,
    ) {
        self.push(
            method,
            path,
            None,
            Reply::Respond { status, body: body.into(), delay: Some(delay) },
        );
    }

    /// Responds only when the serialized request body contains `needle`.
    /// Such routes take precedence over plain routes for the same path.
    pub(crate) fn respond_when_body_contains(
        &self,
        method: HttpMethod,
        path: &str,
        needle: &str,
        status: u16,
        body: Value,
    ) {
        self.push(
            method,
            path,
            Some(needle),
            Reply::Respond { status, body: body.to_string(), delay: None },
        );
    }

    pub(crate) fn fail(&self, method: HttpMethod, path: &str, error: TransportError) {
        self.push(method, path, None, Reply::Fail(error));
    }

    pub(crate) fn handle<F>(&self, method: HttpMethod, path: &str, handler: F)
    where
        F: Fn(&RequestDetails) -> (u16, String) + Send + Sync + 'static,
    {
        self.push(method, path, None, Reply::Handle(Arc::new(handler)));
    }

    /// Number of requests sent to exactly this method and path.
    pub(crate) fn calls(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.method == method && path_of(&request.url) == path)
            .count()
    }

    /// Number of requests whose path (query excluded) equals `path`.
    pub(crate) fn calls_ignoring_query(&self, method: HttpMethod, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| {
                request.method == method && path_of(&request.url).split('?').next() == Some(path)
            })
            .count()
    }

    /// JSON bodies sent to this method and path, in order.
    pub(crate) fn bodies(&self, method: HttpMethod, path: &str) -> Vec<Value> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.method == method && path_of(&request.url) == path)
            .filter_map(|request| match &request.body {
                Some(RequestBody::Json(value)) => Some(value.clone()),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn requests(&self) -> Vec<RequestDetails> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn last_request(&self) -> Option<RequestDetails> {
        self.requests.lock().unwrap().last().cloned()
    }
}

fn path_of(url: &str) -> &str {
    url.strip_prefix(fixtures::BASE).unwrap_or(url)
}

fn body_text(request: &RequestDetails) -> String {
    match &request.body {
        Some(RequestBody::Json(value)) => value.to_string(),
        Some(RequestBody::File { file_name, .. }) => file_name.clone(),
        None => String::new(),
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: RequestDetails) -> Result<ResponseDetails, TransportError> {
        self.requests.lock().unwrap().push(request.clone());

        let path = path_of(&request.url).to_string();
        let body = body_text(&request);
        let reply = {
            let mut routes = self.routes.lock().unwrap();
            let specific = routes
                .iter()
                .position(|r| r.body_contains.is_some() && r.matches(request.method, &path, &body));
            let plain = routes
                .iter()
                .position(|r| r.body_contains.is_none() && r.matches(request.method, &path, &body));
            specific.or(plain).and_then(|index| routes[index].next_reply())
        };

        match reply {
            Some(Reply::Respond { status, body, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(ResponseDetails::new(status, body))
            }
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Handle(handler)) => {
                let (status, body) = handler(&request);
                Ok(ResponseDetails::new(status, body))
            }
            None => Ok(ResponseDetails::new(
                404,
                format!(
                    r#"{{"ErrorMessage": "No route for {} {}"}}"#,
                    request.method, path
                ),
            )),
        }
    }
}

pub(crate) mod fixtures {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::{json, Value};

    use super::MockTransport;
    use crate::api::client::ApiClient;
    use crate::api::resources::SpaceResource;
    use crate::api::spaces::{SpaceContext, SpaceResolver};
    use crate::api::transport::HttpMethod;
    use crate::config::{ClientConfiguration, ClientConfigurationBuilder, PollingOptions, RetryPolicy};

    pub(crate) const BASE: &str = "http://octopus.test";
    pub(crate) const API_KEY: &str = "API-TESTKEY";

    pub(crate) fn config_builder() -> ClientConfigurationBuilder {
        ClientConfiguration::builder()
            .server(BASE)
            .api_key(API_KEY)
            .request_timeout(Duration::from_secs(2))
            .retry(RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
                jitter: false,
            })
            .polling(PollingOptions {
                interval: Duration::from_millis(5),
                timeout: Duration::from_secs(5),
                cancel_on_timeout: false,
            })
    }

    pub(crate) fn client(mock: &Arc<MockTransport>) -> ApiClient {
        let config = config_builder().build().unwrap();
        ApiClient::with_transport(config, mock.clone())
    }

    pub(crate) fn server_root() -> String {
        json!({
            "Application": "Octopus Deploy",
            "Version": "2024.2.0",
            "ApiVersion": "3.0.0",
            "Links": {
                "Self": "/api",
                "Spaces": "/api/spaces{/id}{?skip,ids,take,partialName}",
                "SpaceHome": "/api/{spaceId}"
            }
        })
        .to_string()
    }

    pub(crate) fn space(id: &str, name: &str, is_default: bool) -> Value {
        json!({
            "Id": id,
            "Name": name,
            "IsDefault": is_default,
            "Links": {"Self": format!("/api/spaces/{}", id), "SpaceHome": format!("/api/{}", id)}
        })
    }

    pub(crate) fn default_space() -> SpaceResource {
        serde_json::from_value(space("Spaces-1", "Default", true)).unwrap()
    }

    pub(crate) fn space_root() -> String {
        let s = "/api/Spaces-1";
        json!({
            "SpaceId": "Spaces-1",
            "Links": {
                "Self": s,
                "Projects": format!("{s}/projects{{/id}}{{?name,skip,ids,clone,take,partialName}}"),
                "Environments": format!("{s}/environments{{/id}}{{?name,skip,ids,take,partialName}}"),
                "Tenants": format!("{s}/tenants{{/id}}{{?skip,projectId,name,tags,take,ids,partialName}}"),
                "Releases": format!("{s}/releases{{/id}}{{?skip,take,ids}}"),
                "Deployments": format!("{s}/deployments{{/id}}{{?skip,take,ids,projects,environments}}"),
                "Tasks": format!("{s}/tasks{{/id}}{{?skip,take,ids,states}}"),
                "Feeds": format!("{s}/feeds{{/id}}{{?skip,take,ids,partialName,feedType,name}}"),
                "Channels": format!("{s}/channels{{/id}}{{?skip,take,ids,partialName}}"),
                "PackageUpload": format!("{s}/packages/raw{{?replace}}")
            }
        })
        .to_string()
    }

    /// A page of items with an optional next link.
    pub(crate) fn page(items: Vec<Value>, total: usize, next: Option<&str>) -> Value {
        let mut links = serde_json::Map::new();
        if let Some(next) = next {
            links.insert("Page.Next".to_string(), json!(next));
        }
        json!({
            "ItemType": "Any",
            "TotalResults": total,
            "ItemsPerPage": items.len(),
            "Items": items,
            "Links": links
        })
    }

    /// A mock serving the server root, one default space and its root.
    pub(crate) fn space_mock() -> Arc<MockTransport> {
        let mock = MockTransport::new();
        mock.respond(HttpMethod::Get, "/api", 200, server_root());
        mock.respond_json(
            HttpMethod::Get,
            "/api/spaces",
            200,
            page(vec![space("Spaces-1", "Default", true)], 1, None),
        );
        mock.respond(HttpMethod::Get, "/api/Spaces-1", 200, space_root());
        mock
    }

    pub(crate) async fn space_context(mock: &Arc<MockTransport>) -> SpaceContext {
        SpaceResolver::new(client(mock))
            .resolve_space("Default")
            .await
            .unwrap()
    }

    pub(crate) fn named(id: &str, name: &str, self_link: &str) -> Value {
        json!({"Id": id, "Name": name, "Links": {"Self": self_link}})
    }
}
