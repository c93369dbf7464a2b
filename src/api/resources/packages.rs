//
//  octopus-client
//  api/resources/packages.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Feeds and Packages
//!
//! Steps pull packages from feeds. The server's own feed (`feeds-builtin`)
//! accepts uploads through the space's `PackageUpload` link; external feeds
//! are read-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// Id of the server's built-in package repository.
pub const BUILT_IN_FEED_ID: &str = "feeds-builtin";

/// Relation that searches versions of one package in a feed.
pub const SEARCH_PACKAGE_VERSIONS: &str = "SearchPackageVersionsTemplate";

/// A package feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FeedResource {
    pub id: String,

    pub name: String,

    /// Feed kind, e.g. `BuiltIn`, `NuGet`, `Docker`
    #[serde(default)]
    pub feed_type: String,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(FeedResource, "feed", named);

impl FeedResource {
    /// Returns `true` for the server's own package repository.
    pub fn is_built_in(&self) -> bool {
        self.id == BUILT_IN_FEED_ID || self.feed_type.eq_ignore_ascii_case("BuiltIn")
    }
}

/// One version of a package, as returned by feed searches and uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageResource {
    #[serde(default)]
    pub id: String,

    pub package_id: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<DateTime<Utc>>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(PackageResource, "package");
