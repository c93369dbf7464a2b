//
//  octopus-client
//  api/resources/releases.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Releases
//!
//! A release is an immutable snapshot of a project's deployment process,
//! variables and selected package versions, identified by a version string
//! unique within the project.
//!
//! Creating a release starts from the [`ReleaseTemplate`] of the project's
//! deployment process for the chosen channel: it proposes the next version
//! and lists every package reference a step needs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::impl_resource;
use crate::api::links::Links;

/// Relation from a release to its per-environment deployment preview.
pub const DEPLOYMENT_PREVIEW: &str = "DeploymentPreview";

/// A release.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseResource {
    pub id: String,

    pub version: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub channel_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,

    #[serde(default)]
    pub selected_packages: Vec<SelectedPackage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assembled: Option<DateTime<Utc>>,

    #[serde(default)]
    pub links: Links,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl_resource!(ReleaseResource, "release");

/// Body of a release creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewRelease {
    pub project_id: String,

    pub channel_id: String,

    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,

    #[serde(default)]
    pub selected_packages: Vec<SelectedPackage>,
}

/// A package version pinned for one step of the release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SelectedPackage {
    /// Name of the step action that references the package
    pub action_name: String,

    /// Name of the package reference within the action, when it has several
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_reference_name: Option<String>,

    pub version: String,
}

/// Release template for one channel of a deployment process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseTemplate {
    /// Version the server proposes for the next release
    #[serde(default)]
    pub next_version_increment: String,

    /// Step whose package version drives the release version, if configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versioning_package_step_name: Option<String>,

    /// Every package reference the process needs
    #[serde(default)]
    pub packages: Vec<ReleaseTemplatePackage>,
}

/// One package reference of a [`ReleaseTemplate`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseTemplatePackage {
    pub action_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_reference_name: Option<String>,

    #[serde(default)]
    pub step_name: String,

    pub package_id: String,

    pub feed_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_selected_last_release: Option<String>,

    /// Whether the package id and feed are fixed (not bound to variables)
    #[serde(default = "default_resolvable")]
    pub is_resolvable: bool,
}

fn default_resolvable() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_release_omits_absent_notes() {
        let body = serde_json::to_value(NewRelease {
            project_id: "Projects-1".to_string(),
            channel_id: "Channels-1".to_string(),
            version: "1.2.3".to_string(),
            release_notes: None,
            selected_packages: vec![SelectedPackage {
                action_name: "Deploy".to_string(),
                package_reference_name: None,
                version: "1.0.0".to_string(),
            }],
        })
        .unwrap();

        assert_eq!(body["Version"], "1.2.3");
        assert!(body.get("ReleaseNotes").is_none());
        assert_eq!(body["SelectedPackages"][0]["ActionName"], "Deploy");
        assert!(body["SelectedPackages"][0].get("PackageReferenceName").is_none());
    }

    #[test]
    fn test_template_defaults_to_resolvable() {
        let template: ReleaseTemplate = serde_json::from_str(
            r#"{"NextVersionIncrement": "0.0.2", "Packages": [{"ActionName": "Deploy", "PackageId": "Hello", "FeedId": "feeds-builtin"}]}"#,
        )
        .unwrap();
        assert_eq!(template.next_version_increment, "0.0.2");
        assert!(template.packages[0].is_resolvable);
    }
}
