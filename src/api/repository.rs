//
//  octopus-client
//  api/repository.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Resource Repository
//!
//! [`Repository`] provides CRUD and paging for one resource kind, driven
//! entirely by the collection link template the server advertises (for
//! example `Projects` on a space root). The same code serves every kind.
//!
//! ## Operations
//!
//! | Method | Request |
//! |--------|---------|
//! | [`get`](Repository::get) | `GET` collection template with `id`, or a direct link |
//! | [`list`](Repository::list) | `GET` collection template with paging and filters |
//! | [`list_all`](Repository::list_all) | `list`, then follow `Page.Next` |
//! | [`create`](Repository::create) | `POST` collection |
//! | [`modify`](Repository::modify) | `PUT` the resource's `Self` link |
//! | [`delete`](Repository::delete) | `DELETE` the resource's `Self` link |
//!
//! ## Example
//!
//! ```rust,ignore
//! use futures::TryStreamExt;
//! use octopus_client::api::repository::ListArgs;
//!
//! let projects = space.projects()?;
//! let all: Vec<_> = projects.list_all(ListArgs::new()).try_collect().await?;
//! ```

use std::collections::HashSet;
use std::marker::PhantomData;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use super::client::ApiClient;
use super::common::{ApiError, ResourceCollection};
use super::links::{LinkParams, LinkTemplate, Links};
use super::resolver;
use super::resources::{NamedResource, Resource};

/// Relation every resource uses to point at itself.
pub const SELF_LINK: &str = "Self";

/// Paging and filter arguments for [`Repository::list`].
///
/// Filters are only sent when the collection template declares them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListArgs {
    skip: Option<u32>,
    take: Option<u32>,
    filters: LinkParams,
}

impl ListArgs {
    /// No paging, no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Skips the first `skip` items.
    pub fn skip(mut self, skip: u32) -> Self {
        self.skip = Some(skip);
        self
    }

    /// Requests at most `take` items per page.
    pub fn take(mut self, take: u32) -> Self {
        self.take = Some(take);
        self
    }

    /// Adds a scalar filter, e.g. `partialName`.
    pub fn filter(mut self, name: &str, value: impl ToString) -> Self {
        self.filters.set(name, value);
        self
    }

    /// Adds a list filter, e.g. `ids` or `tags`.
    pub fn filter_list<I, V>(mut self, name: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        self.filters = self.filters.with_list(name, values);
        self
    }

    fn params(&self) -> LinkParams {
        LinkParams::new()
            .with_opt("skip", self.skip)
            .with_opt("take", self.take)
            .merge(&self.filters)
    }
}

/// CRUD and paging for one resource kind.
pub struct Repository<T> {
    client: ApiClient,
    template: LinkTemplate,
    _kind: PhantomData<fn() -> T>,
}

impl<T> Clone for Repository<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            template: self.template.clone(),
            _kind: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for Repository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("template", &self.template.as_str())
            .finish()
    }
}

impl<T: Resource> Repository<T> {
    /// Creates a repository over an explicit collection template.
    pub fn new(client: ApiClient, template: LinkTemplate) -> Self {
        Self {
            client,
            template,
            _kind: PhantomData,
        }
    }

    /// Creates a repository over the relation `rel` of a document.
    ///
    /// # Errors
    ///
    /// [`ApiError::MissingLink`] if the document does not advertise `rel`.
    pub fn from_links(client: ApiClient, links: &Links, rel: &str) -> Result<Self, ApiError> {
        Ok(Self::new(client, links.template(rel)?))
    }

    /// The collection template.
    pub fn template(&self) -> &LinkTemplate {
        &self.template
    }

    /// The client this repository sends through.
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Returns `true` if resources can be fetched by id through the template.
    pub fn supports_id_lookup(&self) -> bool {
        self.template.has_variable("id")
    }

    /// Fetches one resource by id, or by a link when `id_or_href` is one.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] if the server has no such resource
    /// - [`ApiError::InvalidOperation`] if an id is given but the template has
    ///   no `id` variable
    pub async fn get(&self, id_or_href: &str) -> Result<T, ApiError> {
        if is_link(id_or_href) {
            return self.client.get(id_or_href).await;
        }
        if !self.supports_id_lookup() {
            return Err(ApiError::InvalidOperation(format!(
                "The {} collection link '{}' cannot look up by id",
                T::KIND,
                self.template
            )));
        }
        let href = self.template.expand(&LinkParams::new().with("id", id_or_href))?;
        self.client.get(&href).await.map_err(|error| match error {
            ApiError::NotFound(_) => ApiError::NotFound(format!("{} '{}'", T::KIND, id_or_href)),
            other => other,
        })
    }

    /// Fetches one page.
    pub async fn list(&self, args: &ListArgs) -> Result<ResourceCollection<T>, ApiError> {
        let href = self.template.expand(&args.params())?;
        debug!("Listing {} from {}", T::KIND, href);
        self.client.get(&href).await
    }

    /// Streams every item of every page, in server order.
    ///
    /// Pages are fetched one at a time, following `Page.Next`. Ids already
    /// yielded in this pass are skipped, and a next link that was already
    /// visited ends the stream. A failing page yields its error and ends the
    /// stream without retracting earlier items.
    pub fn list_all(&self, args: &ListArgs) -> BoxStream<'static, Result<T, ApiError>> {
        let first = match self.template.expand(&args.params()) {
            Ok(href) => href,
            Err(error) => return stream::once(async move { Err(error) }).boxed(),
        };

        let cursor = PageCursor {
            client: self.client.clone(),
            visited: HashSet::from([first.clone()]),
            next: Some(first),
            seen: HashSet::new(),
        };

        stream::unfold(cursor, |mut cursor| async move {
            let href = cursor.next.take()?;
            match cursor.client.get::<ResourceCollection<T>>(&href).await {
                Ok(page) => {
                    if let Some(next) = page.next_url() {
                        if cursor.visited.insert(next.to_string()) {
                            cursor.next = Some(next.to_string());
                        } else {
                            warn!("Page link {} was already visited, stopping", next);
                        }
                    }
                    let items: Vec<Result<T, ApiError>> = page
                        .items
                        .into_iter()
                        .filter(|item| cursor.seen.insert(item.id().to_string()))
                        .map(Ok)
                        .collect();
                    Some((items, cursor))
                }
                Err(error) => Some((vec![Err(error)], cursor)),
            }
        })
        .flat_map(stream::iter)
        .boxed()
    }

    /// Collects [`list_all`](Self::list_all) into a vector.
    pub async fn all(&self, args: &ListArgs) -> Result<Vec<T>, ApiError> {
        self.list_all(args).try_collect().await
    }

    /// Creates a resource from `body` and returns the server's copy.
    pub async fn create<B: Serialize + ?Sized>(&self, body: &B) -> Result<T, ApiError> {
        let href = self.template.expand(&LinkParams::new())?;
        self.client.post(&href, body).await
    }

    /// Replaces `resource` through its `Self` link.
    ///
    /// # Errors
    ///
    /// [`ApiError::InvalidOperation`] if the resource carries no `Self` link,
    /// which is the case for values that never came from the server.
    pub async fn modify(&self, resource: &T) -> Result<T, ApiError> {
        let href = self_link(resource)?;
        self.client.put(href, resource).await
    }

    /// Deletes `resource` through its `Self` link.
    pub async fn delete(&self, resource: &T) -> Result<(), ApiError> {
        let href = self_link(resource)?;
        self.client.delete(href).await
    }
}

impl<T: NamedResource> Repository<T> {
    /// Resolves a resource by id, falling back to an exact name match.
    pub async fn resolve(&self, name_or_id: &str) -> Result<T, ApiError> {
        resolver::resolve_by_name_or_id(self, name_or_id).await
    }
}

struct PageCursor {
    client: ApiClient,
    next: Option<String>,
    visited: HashSet<String>,
    seen: HashSet<String>,
}

fn is_link(value: &str) -> bool {
    value.starts_with('/')
        || value.starts_with("~/")
        || value.starts_with("http://")
        || value.starts_with("https://")
}

fn self_link<T: Resource>(resource: &T) -> Result<&str, ApiError> {
    resource.links().get(SELF_LINK).ok_or_else(|| {
        ApiError::InvalidOperation(format!(
            "The {} '{}' has no Self link; fetch it from the server before modifying it",
            T::KIND,
            resource.id()
        ))
    })
}
