//
//  octopus-client
//  api/resources/deployments.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Deployments
//!
//! A deployment sends one release to one environment, optionally for one
//! tenant. Creating a deployment queues a server task; the deployment's
//! `TaskId` identifies that task.
//!
//! ## Scheduling
//!
//! `QueueTime` delays the task until the given instant. `QueueTimeExpiry`
//! bounds how long the task may sit in the queue before the server abandons
//! it. Both are ISO-8601 instants and are sent exactly as given.
//!
//! ## Prompted Variables
//!
//! Variables marked as prompted are filled through `FormValues`, keyed by the
//! form element ids that the release's deployment preview returns for the
//! target environment.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// A deployment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentResource {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub release_id: String,

    pub environment_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Id of the server task executing this deployment
    pub task_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time_expiry: Option<DateTime<Utc>>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(DeploymentResource, "deployment");

/// Body of a deployment creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewDeployment {
    pub release_id: String,

    pub environment_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_time_expiry: Option<DateTime<Utc>>,

    #[serde(default)]
    pub force_package_download: bool,

    #[serde(default)]
    pub force_package_redeployment: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub use_guided_failure: Option<bool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_actions: Vec<String>,

    /// Form element id to prompted variable value
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub form_values: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
}

/// Preview of deploying a release to one environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentPreview {
    #[serde(default)]
    pub form: DeploymentForm,
}

/// Prompted-variable form of a [`DeploymentPreview`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeploymentForm {
    /// Default values keyed by element id
    #[serde(default)]
    pub values: BTreeMap<String, Value>,

    #[serde(default)]
    pub elements: Vec<FormElement>,
}

/// One prompted variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormElement {
    /// Element id used as the `FormValues` key
    pub name: String,

    pub control: FormControl,

    #[serde(default)]
    pub is_value_required: bool,
}

/// Presentation details of a [`FormElement`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FormControl {
    /// Variable name
    #[serde(default)]
    pub name: String,

    /// Prompt label
    #[serde(default)]
    pub label: String,

    #[serde(default)]
    pub required: bool,
}

impl DeploymentForm {
    /// Finds the element whose variable name or label equals `key`,
    /// ignoring case.
    pub fn element_for(&self, key: &str) -> Option<&FormElement> {
        self.elements.iter().find(|element| {
            element.control.name.eq_ignore_ascii_case(key) || element.control.label.eq_ignore_ascii_case(key)
        })
    }
}
