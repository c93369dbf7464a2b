//
//  octopus-client
//  api/resources/projects.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Projects, Channels and Deployment Processes
//!
//! A project owns a deployment process (the steps a release runs) and one or
//! more channels (which versions and packages may flow through it).
//!
//! ## Links Used
//!
//! | Resource | Relation | Target |
//! |----------|----------|--------|
//! | project | `Channels` | the project's channels |
//! | project | `DeploymentProcess` | the project's deployment process |
//! | deployment process | `Template` | release template for a channel |

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// Relation from a project to its channels.
pub const CHANNELS: &str = "Channels";
/// Relation from a project to its deployment process.
pub const DEPLOYMENT_PROCESS: &str = "DeploymentProcess";
/// Relation from a deployment process to its release template.
pub const RELEASE_TEMPLATE: &str = "Template";

/// A project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectResource {
    /// Server id, e.g. `Projects-1`
    pub id: String,

    /// Display name
    pub name: String,

    /// URL slug
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_process_id: Option<String>,

    #[serde(default)]
    pub is_disabled: bool,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(ProjectResource, "project", named);

/// A release channel within a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChannelResource {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub project_id: String,

    /// Whether releases use this channel when none is named
    #[serde(default)]
    pub is_default: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifecycle_id: Option<String>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(ChannelResource, "channel", named);

/// A project's deployment process. Only its links are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentProcessResource {
    pub id: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub version: u32,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(DeploymentProcessResource, "deployment process");
