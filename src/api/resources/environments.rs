//
//  octopus-client
//  api/resources/environments.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// A deployment environment, e.g. `Production`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnvironmentResource {
    pub id: String,

    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub sort_order: i32,

    #[serde(default)]
    pub use_guided_failure: bool,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(EnvironmentResource, "environment", named);
