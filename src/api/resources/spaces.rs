//
//  octopus-client
//  api/resources/spaces.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Spaces
//!
//! A space partitions one server into isolated tenants of configuration. Each
//! space has its own root document, reached through the space's `SpaceHome`
//! link.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// Link relation pointing at a space's root document.
pub const SPACE_HOME: &str = "SpaceHome";

/// A space on the server.
///
/// # Fields
///
/// * `id` - Server id, e.g. `Spaces-1`
/// * `name` - Display name, unique per server
/// * `is_default` - Whether this is the server's default space
/// * `task_queue_stopped` - Whether the space has stopped processing tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SpaceResource {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub task_queue_stopped: bool,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(SpaceResource, "space", named);
