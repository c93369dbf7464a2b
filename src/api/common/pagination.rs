//
//  octopus-client
//  api/common/pagination.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Pagination Types for Octopus API Responses
//!
//! Collection endpoints return one page at a time, wrapped in a
//! [`ResourceCollection`]. The page carries its own hypermedia links, and
//! iteration follows the `Page.Next` link until the server stops advertising
//! one.
//!
//! # Example
//!
//! ```rust
//! use octopus_client::api::common::ResourceCollection;
//! use serde::Deserialize;
//!
//! #[derive(Clone, Deserialize)]
//! struct Project {
//!     #[serde(rename = "Id")]
//!     id: String,
//! }
//!
//! let json = r#"{
//!     "ItemType": "Project",
//!     "TotalResults": 2,
//!     "ItemsPerPage": 1,
//!     "Items": [{"Id": "Projects-1"}],
//!     "Links": {"Page.Next": "/api/Spaces-1/projects?skip=1&take=1"}
//! }"#;
//!
//! let page: ResourceCollection<Project> = serde_json::from_str(json).unwrap();
//! assert!(page.has_next());
//! assert_eq!(page.next_url(), Some("/api/Spaces-1/projects?skip=1&take=1"));
//! ```
//!
//! # Notes
//!
//! - Page links are server-issued and followed verbatim
//! - `TotalResults` is advisory; the last page is the one without `Page.Next`

use serde::{Deserialize, Serialize};

use crate::api::links::Links;

/// Link relation pointing at the following page.
pub const NEXT_PAGE: &str = "Page.Next";

/// Link relation pointing at the last page.
pub const LAST_PAGE: &str = "Page.Last";

/// One page of a collection endpoint.
///
/// # Type Parameters
///
/// - `T` - The resource type contained in `Items`
///
/// # Fields
///
/// | Field | Type | Description |
/// |-------|------|-------------|
/// | `items` | `Vec<T>` | Resources on this page |
/// | `items_per_page` | `u32` | Page size the server applied |
/// | `total_results` | `u32` | Count across all pages |
/// | `item_type` | `String` | Resource kind of the items |
/// | `links` | `Links` | Page navigation links |
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceCollection<T> {
    /// Resources on this page.
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    /// Page size the server applied.
    #[serde(default)]
    pub items_per_page: u32,

    /// Number of matching resources across all pages.
    #[serde(default)]
    pub total_results: u32,

    /// Resource kind of the items.
    #[serde(default)]
    pub item_type: String,

    /// Page navigation links.
    #[serde(default)]
    pub links: Links,
}

impl<T> ResourceCollection<T> {
    /// Checks if the server advertises a following page.
    pub fn has_next(&self) -> bool {
        self.next_url().is_some()
    }

    /// Returns the link to the following page, if any.
    pub fn next_url(&self) -> Option<&str> {
        self.links.get(NEXT_PAGE)
    }

    /// Returns the link to the last page, if any.
    pub fn last_url(&self) -> Option<&str> {
        self.links.get(LAST_PAGE)
    }
}
