//
//  octopus-client
//  api/resources/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Resource Models
//!
//! Typed views of the documents the server returns. Only the fields the client
//! and the release workflow read are modeled; everything else is preserved in
//! an `extra` map so that a fetched resource can be sent back with `PUT`
//! without losing data.
//!
//! ## Traits
//!
//! - [`Resource`]: anything with an `Id` and `Links`
//! - [`NamedResource`]: a resource that also has a `Name`, and so can be
//!   looked up by name
//!
//! ## Documents
//!
//! | Type | Kind | Reached through |
//! |------|------|-----------------|
//! | [`RootDocument`] | server or space root | `/api`, `SpaceHome` |
//! | [`SpaceResource`] | space | `Spaces` |
//! | [`ProjectResource`] | project | `Projects` |
//! | [`ChannelResource`] | channel | project `Channels` |
//! | [`EnvironmentResource`] | environment | `Environments` |
//! | [`TenantResource`] | tenant | `Tenants` |
//! | [`ReleaseResource`] | release | `Releases` |
//! | [`DeploymentResource`] | deployment | `Deployments` |
//! | [`TaskResource`] | task | `Tasks` |
//! | [`FeedResource`] | feed | `Feeds` |
//! | [`PackageResource`] | package version | feed search, `PackageUpload` |
//!
//! All documents use PascalCase field names on the wire.

/// Implements [`Resource`] (and optionally [`NamedResource`]) for a struct
/// with `id`, `links` and `name` fields.
macro_rules! impl_resource {
    ($ty:ty, $kind:literal) => {
        impl $crate::api::resources::Resource for $ty {
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn links(&self) -> &$crate::api::links::Links {
                &self.links
            }
        }
    };
    ($ty:ty, $kind:literal, named) => {
        $crate::api::resources::impl_resource!($ty, $kind);

        impl $crate::api::resources::NamedResource for $ty {
            fn name(&self) -> &str {
                &self.name
            }
        }
    };
}

pub(crate) use impl_resource;

mod deployments;
mod environments;
mod packages;
mod projects;
mod releases;
mod spaces;
mod tasks;
mod tenants;

pub use deployments::*;
pub use environments::*;
pub use packages::*;
pub use projects::*;
pub use releases::*;
pub use spaces::*;
pub use tasks::*;
pub use tenants::*;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::links::Links;

/// A server document with a stable id and hypermedia links.
pub trait Resource: DeserializeOwned + Serialize + Clone + Send + Sync + 'static {
    /// Human-readable kind used in error messages, e.g. `"project"`.
    const KIND: &'static str;

    /// The server-assigned id.
    fn id(&self) -> &str;

    /// The document's links.
    fn links(&self) -> &Links;
}

/// A resource that can be looked up by name.
pub trait NamedResource: Resource {
    /// The resource's display name.
    fn name(&self) -> &str;
}

/// The server root (`/api`) or a space root (`SpaceHome`).
///
/// Both carry the `Links` map that every other request starts from.
///
/// # Example
///
/// ```rust
/// use octopus_client::api::resources::RootDocument;
///
/// let root: RootDocument = serde_json::from_str(r#"{
///     "Application": "Octopus Deploy",
///     "Version": "2024.1.0",
///     "ApiVersion": "3.0.0",
///     "Links": {"Spaces": "/api/spaces{/id}{?skip,ids,take,partialName}"}
/// }"#).unwrap();
///
/// assert!(root.links.contains("Spaces"));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RootDocument {
    /// Application name reported by the server
    #[serde(default)]
    pub application: String,

    /// Server version
    #[serde(default)]
    pub version: String,

    /// API version
    #[serde(default)]
    pub api_version: String,

    /// Space id, set on space roots only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space_id: Option<String>,

    /// Relation name to URI template
    #[serde(default)]
    pub links: Links,
}

/// The server-wide root document.
pub type ServerInformation = RootDocument;

/// A space-scoped root document.
pub type SpaceRootDocument = RootDocument;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_resource_preserves_unknown_fields() {
        let json = r#"{
            "Id": "Projects-1",
            "Name": "Web",
            "LifecycleId": "Lifecycles-1",
            "AutoCreateRelease": true,
            "Links": {"Self": "/api/Spaces-1/projects/Projects-1"}
        }"#;
        let project: ProjectResource = serde_json::from_str(json).unwrap();
        assert_eq!(project.id(), "Projects-1");
        assert_eq!(project.name(), "Web");
        assert_eq!(ProjectResource::KIND, "project");

        let round = serde_json::to_value(&project).unwrap();
        assert_eq!(round["AutoCreateRelease"], serde_json::json!(true));
    }

    #[test]
    fn test_space_root_document() {
        let root: SpaceRootDocument = serde_json::from_str(
            r#"{"SpaceId": "Spaces-1", "Links": {"Projects": "/api/Spaces-1/projects{/id}"}}"#,
        )
        .unwrap();
        assert_eq!(root.space_id.as_deref(), Some("Spaces-1"));
        assert!(root.links.contains("projects"));
    }
}
