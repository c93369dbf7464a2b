//
//  octopus-client
//  api/spaces.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Space Resolution
//!
//! Most resources live inside a space. [`SpaceResolver`] turns a space name or
//! id into a [`SpaceContext`]: the space itself plus its root document, from
//! which every space-scoped repository is built.
//!
//! Both lookups are memoized on the client. Resolving the same selector again
//! performs no network traffic, and concurrent resolutions of one selector
//! share a single set of requests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use octopus_client::api::{ApiClient, SpaceResolver};
//! use octopus_client::config::ClientConfiguration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfiguration::load()?)?;
//! let space = SpaceResolver::new(client).resolve_space("Default").await?;
//! let web = space.projects()?.resolve("Web Frontend").await?;
//! println!("{} is {}", web.name, web.id);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::client::ApiClient;
use super::common::ApiError;
use super::links::{LinkTemplate, Links};
use super::repository::{ListArgs, Repository};
use super::resources::{
    ChannelResource, DeploymentResource, EnvironmentResource, FeedResource, ProjectResource,
    ReleaseResource, Resource, RootDocument, SpaceResource, TaskResource, TenantResource, CHANNELS,
};

/// Cache key of a space lookup.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SpaceSelector {
    /// A name or id, as typed. Ids match exactly, so the key keeps its case.
    Named(String),
    /// The space flagged as the server's default.
    Default,
}

impl SpaceSelector {
    fn named(selector: &str) -> Self {
        Self::Named(selector.trim().to_string())
    }
}

impl fmt::Display for SpaceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::Default => f.write_str("default space"),
        }
    }
}

/// One space and its root document.
#[derive(Debug, Clone)]
pub struct SpaceContext {
    client: ApiClient,
    space: SpaceResource,
    root: Arc<RootDocument>,
}

impl SpaceContext {
    /// The space.
    pub fn space(&self) -> &SpaceResource {
        &self.space
    }

    /// The space's root document.
    pub fn root(&self) -> &RootDocument {
        &self.root
    }

    /// The client the space was resolved with.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The space root's template for `rel`.
    pub fn link(&self, rel: &str) -> Result<LinkTemplate, ApiError> {
        self.root.links.template(rel)
    }

    /// A repository over the space root's collection `rel`.
    pub fn repository<T: Resource>(&self, rel: &str) -> Result<Repository<T>, ApiError> {
        Repository::from_links(self.client.clone(), &self.root.links, rel)
    }

    /// A repository over a collection advertised by another document.
    pub fn repository_from<T: Resource>(&self, links: &Links, rel: &str) -> Result<Repository<T>, ApiError> {
        Repository::from_links(self.client.clone(), links, rel)
    }

    pub fn projects(&self) -> Result<Repository<ProjectResource>, ApiError> {
        self.repository("Projects")
    }

    pub fn environments(&self) -> Result<Repository<EnvironmentResource>, ApiError> {
        self.repository("Environments")
    }

    pub fn tenants(&self) -> Result<Repository<TenantResource>, ApiError> {
        self.repository("Tenants")
    }

    pub fn releases(&self) -> Result<Repository<ReleaseResource>, ApiError> {
        self.repository("Releases")
    }

    pub fn deployments(&self) -> Result<Repository<DeploymentResource>, ApiError> {
        self.repository("Deployments")
    }

    pub fn tasks(&self) -> Result<Repository<TaskResource>, ApiError> {
        self.repository("Tasks")
    }

    pub fn feeds(&self) -> Result<Repository<FeedResource>, ApiError> {
        self.repository("Feeds")
    }

    /// The channels of one project.
    pub fn channels_for(&self, project: &ProjectResource) -> Result<Repository<ChannelResource>, ApiError> {
        self.repository_from(&project.links, CHANNELS)
    }
}

/// Turns space selectors into [`SpaceContext`]s.
#[derive(Debug, Clone)]
pub struct SpaceResolver {
    client: ApiClient,
}

impl SpaceResolver {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Lists every space on the server.
    pub async fn list_spaces(&self) -> Result<Vec<SpaceResource>, ApiError> {
        let root = self.client.server_information().await?;
        Repository::<SpaceResource>::from_links(self.client.clone(), &root.links, "Spaces")?
            .all(&ListArgs::new())
            .await
    }

    /// Resolves a space by id or name.
    ///
    /// # Errors
    ///
    /// - [`ApiError::SpaceNotFound`] when nothing matches
    /// - [`ApiError::AmbiguousSpace`] when several spaces share the name
    pub async fn resolve_space(&self, selector: &str) -> Result<SpaceContext, ApiError> {
        let wanted = selector.trim().to_string();
        let space = self
            .find(SpaceSelector::named(selector), move |spaces| match_space(spaces, &wanted))
            .await?;
        self.context(space).await
    }

    /// Resolves the space the server flags as default.
    pub async fn resolve_default_space(&self) -> Result<SpaceContext, ApiError> {
        let space = self
            .find(SpaceSelector::Default, |spaces| {
                spaces
                    .iter()
                    .find(|space| space.is_default)
                    .cloned()
                    .ok_or_else(|| ApiError::SpaceNotFound("no space is marked as default".to_string()))
            })
            .await?;
        self.context(space).await
    }

    /// Resolves the configured space, or the default space when none is set.
    pub async fn resolve_configured(&self) -> Result<SpaceContext, ApiError> {
        match self.client.config().space() {
            Some(selector) => self.resolve_space(selector).await,
            None => self.resolve_default_space().await,
        }
    }

    async fn find<F>(&self, key: SpaceSelector, pick: F) -> Result<SpaceResource, ApiError>
    where
        F: FnOnce(&[SpaceResource]) -> Result<SpaceResource, ApiError> + Send + 'static,
    {
        let resolver = self.clone();
        self.client
            .space_cache()
            .get_or_resolve(key, move || async move {
                let spaces = resolver.list_spaces().await?;
                pick(&spaces)
            })
            .await
    }

    async fn context(&self, space: SpaceResource) -> Result<SpaceContext, ApiError> {
        let root = self.client.space_root(&space).await?;
        debug!("Using space {} ({})", space.name, space.id);
        Ok(SpaceContext {
            client: self.client.clone(),
            space,
            root,
        })
    }
}

/// Picks the space whose id equals `selector`, else the one whose name
/// equals it ignoring case.
pub fn match_space(spaces: &[SpaceResource], selector: &str) -> Result<SpaceResource, ApiError> {
    if let Some(space) = spaces.iter().find(|space| space.id == selector) {
        return Ok(space.clone());
    }

    let by_name: Vec<&SpaceResource> = spaces
        .iter()
        .filter(|space| space.name.eq_ignore_ascii_case(selector))
        .collect();

    match by_name.as_slice() {
        [] => Err(ApiError::SpaceNotFound(selector.to_string())),
        [space] => Ok((*space).clone()),
        many => Err(ApiError::AmbiguousSpace {
            name: selector.to_string(),
            matches: many.iter().map(|space| space.id.clone()).collect(),
        }),
    }
}
