//
//  octopus-client
//  api/resources/tenants.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Tenants
//!
//! A tenant is a customer or site that receives its own deployments. Tenants
//! are connected to projects per environment, and carry canonical tag names
//! (`"Tag Set/Tag"`) used to select groups of tenants.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// A tenant.
///
/// # Fields
///
/// * `tenant_tags` - Canonical tag names, e.g. `"Region/Europe"`
/// * `project_environments` - Project id to the environment ids the tenant is
///   connected to for that project
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TenantResource {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub tenant_tags: Vec<String>,

    #[serde(default)]
    pub project_environments: HashMap<String, Vec<String>>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(TenantResource, "tenant", named);

impl TenantResource {
    /// Returns `true` if the tenant is connected to `project_id` in
    /// `environment_id`.
    pub fn is_connected(&self, project_id: &str, environment_id: &str) -> bool {
        self.project_environments
            .get(project_id)
            .is_some_and(|envs| envs.iter().any(|e| e == environment_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_lookup() {
        let tenant: TenantResource = serde_json::from_str(
            r#"{"Id": "Tenants-1", "Name": "Acme", "ProjectEnvironments": {"Projects-1": ["Environments-1"]}}"#,
        )
        .unwrap();
        assert!(tenant.is_connected("Projects-1", "Environments-1"));
        assert!(!tenant.is_connected("Projects-1", "Environments-2"));
        assert!(!tenant.is_connected("Projects-2", "Environments-1"));
    }
}
