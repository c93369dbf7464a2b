//
//  octopus-client
//  release/packages.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Package Staging
//!
//! Picks a version for every package reference in a release template and
//! makes sure the chosen versions exist in their feeds.
//!
//! ## Version Sources
//!
//! For each package reference, the first source that applies wins:
//!
//! 1. An explicit override matching the package id or the step name
//! 2. A package file in the packages folder (e.g. `Hello.1.0.0.zip`),
//!    uploaded to the built-in feed when the feed does not have it yet
//! 3. The latest version in the step's feed
//!
//! Versions that cannot be found are collected and reported together as
//! [`ApiError::PackageMismatch`]. Overrides that no step references are
//! reported as unused.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::links::LinkParams;
use crate::api::resources::{
    FeedResource, PackageResource, ReleaseTemplate, ReleaseTemplatePackage, SelectedPackage,
    SEARCH_PACKAGE_VERSIONS,
};
use crate::api::{ApiError, ResourceCollection, SpaceContext};

/// Relation on a space root that accepts package uploads.
pub const PACKAGE_UPLOAD: &str = "PackageUpload";

/// Archive extensions recognized in a packages folder, longest first.
const PACKAGE_EXTENSIONS: &[&str] = &[".tar.bz2", ".tar.gz", ".nupkg", ".zip", ".tgz", ".tar", ".jar"];

/// Splits a file stem such as `My.Package.2.0.0-beta.1` into id and version.
static PACKAGE_STEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>.+?)\.(?P<version>\d+(?:\.\d+)*(?:[-+][0-9A-Za-z.+-]*)?)$")
        .expect("valid package file pattern")
});

/// A package id and version, written `Id:Version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PackageIdentity {
    pub id: String,
    pub version: String,
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(':') {
            Some((id, version)) if !id.trim().is_empty() && !version.trim().is_empty() => {
                Ok(Self::new(id.trim(), version.trim()))
            }
            _ => Err(ApiError::InvalidOperation(format!(
                "Package '{}' must be written as Id:Version",
                value
            ))),
        }
    }
}

/// A package version that could not be found in its feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageMismatch {
    pub package_id: String,
    pub feed_id: String,
    /// The version asked for, or `latest`
    pub requested: String,
}

impl PackageMismatch {
    /// Renders a list of mismatches on one line.
    pub fn summarize(mismatches: &[PackageMismatch]) -> String {
        mismatches
            .iter()
            .map(|m| format!("{} {} (feed {})", m.package_id, m.requested, m.feed_id))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Where a selected version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PackageSource {
    /// An explicit override.
    Explicit,
    /// A file in the packages folder.
    Folder,
    /// The latest version in the feed.
    Feed,
}

impl fmt::Display for PackageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Explicit => "explicit",
            Self::Folder => "folder",
            Self::Feed => "latest",
        };
        f.write_str(label)
    }
}

/// The version chosen for one package reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageSelection {
    pub action_name: String,
    pub package_reference_name: Option<String>,
    pub package_id: String,
    pub feed_id: String,
    pub version: String,
    pub source: PackageSource,
}

impl PackageSelection {
    /// The release body entry for this selection.
    pub fn to_selected_package(&self) -> SelectedPackage {
        SelectedPackage {
            action_name: self.action_name.clone(),
            package_reference_name: self.package_reference_name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Summary of package staging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    /// One entry per resolvable package reference, in template order
    pub selected: Vec<PackageSelection>,
    /// Files uploaded to the built-in feed
    pub uploaded: Vec<PackageIdentity>,
    /// Overrides no step references
    pub unused: Vec<PackageIdentity>,
}

impl PackageReport {
    /// The `SelectedPackages` body of the release.
    pub fn selected_packages(&self) -> Vec<SelectedPackage> {
        self.selected.iter().map(PackageSelection::to_selected_package).collect()
    }
}

/// A package file found in the packages folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPackage {
    pub identity: PackageIdentity,
    pub path: PathBuf,
    pub file_name: String,
}

/// Parses `Id.Version.ext` into a [`PackageIdentity`].
///
/// # Example
///
/// ```rust
/// use octopus_client::release::parse_package_file;
///
/// let package = parse_package_file("Acme.Web.1.4.0-beta.2.zip").unwrap();
/// assert_eq!(package.id, "Acme.Web");
/// assert_eq!(package.version, "1.4.0-beta.2");
/// ```
pub fn parse_package_file(file_name: &str) -> Option<PackageIdentity> {
    let lower = file_name.to_lowercase();
    let extension = PACKAGE_EXTENSIONS.iter().find(|ext| lower.ends_with(*ext))?;
    let stem = &file_name[..file_name.len() - extension.len()];
    let caps = PACKAGE_STEM.captures(stem)?;
    Some(PackageIdentity::new(&caps["id"], &caps["version"]))
}

/// Lists the package files in `folder`, sorted by file name.
pub fn scan_folder(folder: &Path) -> Result<Vec<LocalPackage>, ApiError> {
    let io_error = |e: std::io::Error| ApiError::Io(format!("{}: {}", folder.display(), e));
    let mut packages = Vec::new();

    for entry in std::fs::read_dir(folder).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        if !entry.file_type().map_err(io_error)?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        match parse_package_file(&file_name) {
            Some(identity) => packages.push(LocalPackage {
                identity,
                path: entry.path(),
                file_name,
            }),
            None => debug!("Ignoring {}, not a package file", file_name),
        }
    }

    packages.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(packages)
}

/// Orders versions numerically by segment; a pre-release sorts before its
/// release.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    fn split(version: &str) -> (Vec<u64>, Option<&str>) {
        let (release, pre) = match version.split_once(['-', '+']) {
            Some((release, pre)) => (release, Some(pre)),
            None => (version, None),
        };
        let numbers = release.split('.').map(|part| part.parse().unwrap_or(0)).collect();
        (numbers, pre)
    }

    let (a_numbers, a_pre) = split(a);
    let (b_numbers, b_pre) = split(b);
    let width = a_numbers.len().max(b_numbers.len());
    for i in 0..width {
        let left = a_numbers.get(i).copied().unwrap_or(0);
        let right = b_numbers.get(i).copied().unwrap_or(0);
        match left.cmp(&right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    match (a_pre, b_pre) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(x), Some(y)) => x.cmp(y),
    }
}

/// Chooses, verifies and uploads package versions for one release.
pub(crate) struct PackageStager<'a> {
    space: &'a SpaceContext,
    feeds: HashMap<String, FeedResource>,
    known: HashMap<(String, String, String), bool>,
}

impl<'a> PackageStager<'a> {
    pub(crate) fn new(space: &'a SpaceContext) -> Self {
        Self {
            space,
            feeds: HashMap::new(),
            known: HashMap::new(),
        }
    }

    /// Stages every package of `template`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::PackageMismatch`] listing every version that is missing
    /// - [`ApiError::Io`] if the folder or a package file cannot be read
    /// - Any API error raised while querying feeds or uploading
    pub(crate) async fn stage(
        &mut self,
        template: &ReleaseTemplate,
        overrides: &[PackageIdentity],
        folder: Option<&Path>,
    ) -> Result<PackageReport, ApiError> {
        let local = match folder {
            Some(folder) => scan_folder(folder)?,
            None => Vec::new(),
        };

        let mut report = PackageReport::default();
        let mut mismatches = Vec::new();
        let mut used = HashSet::new();
        let mut uploaded = HashSet::new();

        for package in &template.packages {
            if !package.is_resolvable {
                warn!(
                    "Package of step '{}' is bound to variables, leaving its version to the server",
                    package.action_name
                );
                continue;
            }

            let explicit = overrides.iter().find(|o| {
                o.id.eq_ignore_ascii_case(&package.package_id)
                    || o.id.eq_ignore_ascii_case(&package.action_name)
                    || (!package.step_name.is_empty() && o.id.eq_ignore_ascii_case(&package.step_name))
            });
            let from_folder = local
                .iter()
                .filter(|l| l.identity.id.eq_ignore_ascii_case(&package.package_id))
                .max_by(|a, b| compare_versions(&a.identity.version, &b.identity.version));

            let (version, source) = if let Some(explicit) = explicit {
                used.insert(explicit.clone());
                (Some(explicit.version.clone()), PackageSource::Explicit)
            } else if let Some(file) = from_folder {
                (Some(file.identity.version.clone()), PackageSource::Folder)
            } else {
                (self.latest_version(package).await?, PackageSource::Feed)
            };

            let Some(version) = version else {
                mismatches.push(PackageMismatch {
                    package_id: package.package_id.clone(),
                    feed_id: package.feed_id.clone(),
                    requested: "latest".to_string(),
                });
                continue;
            };

            if source != PackageSource::Feed && !self.feed_has_version(package, &version).await? {
                let file = local.iter().find(|l| {
                    l.identity.id.eq_ignore_ascii_case(&package.package_id) && l.identity.version == version
                });
                let feed = self.feed(&package.feed_id).await?;
                match file {
                    Some(file) if feed.is_built_in() => {
                        if uploaded.insert(file.identity.clone()) {
                            self.upload(file).await?;
                            report.uploaded.push(file.identity.clone());
                        }
                        self.known.insert(version_key(package, &version), true);
                    }
                    _ => {
                        mismatches.push(PackageMismatch {
                            package_id: package.package_id.clone(),
                            feed_id: package.feed_id.clone(),
                            requested: version,
                        });
                        continue;
                    }
                }
            }

            debug!("{} {} selected from {}", package.package_id, version, source);
            report.selected.push(PackageSelection {
                action_name: package.action_name.clone(),
                package_reference_name: package.package_reference_name.clone(),
                package_id: package.package_id.clone(),
                feed_id: package.feed_id.clone(),
                version,
                source,
            });
        }

        report.unused = overrides.iter().filter(|o| !used.contains(*o)).cloned().collect();
        for unused in &report.unused {
            warn!("Package override {} does not match any step", unused);
        }

        if mismatches.is_empty() {
            Ok(report)
        } else {
            Err(ApiError::PackageMismatch(mismatches))
        }
    }

    async fn feed(&mut self, feed_id: &str) -> Result<FeedResource, ApiError> {
        if let Some(feed) = self.feeds.get(feed_id) {
            return Ok(feed.clone());
        }
        let feed = self.space.feeds()?.get(feed_id).await?;
        self.feeds.insert(feed_id.to_string(), feed.clone());
        Ok(feed)
    }

    async fn search(
        &mut self,
        package: &ReleaseTemplatePackage,
        version: Option<&str>,
    ) -> Result<Vec<PackageResource>, ApiError> {
        let feed = self.feed(&package.feed_id).await?;
        let href = feed.links.template(SEARCH_PACKAGE_VERSIONS)?.expand(
            &LinkParams::new()
                .with("packageId", &package.package_id)
                .with("take", 1)
                .with("includePreRelease", true)
                .with_opt("versionRange", version.map(|v| format!("[{}]", v))),
        )?;
        let page: ResourceCollection<PackageResource> = self.space.client().get(&href).await?;
        Ok(page.items)
    }

    async fn latest_version(&mut self, package: &ReleaseTemplatePackage) -> Result<Option<String>, ApiError> {
        let found = self.search(package, None).await?;
        Ok(found.into_iter().next().map(|p| p.version))
    }

    async fn feed_has_version(&mut self, package: &ReleaseTemplatePackage, version: &str) -> Result<bool, ApiError> {
        let key = version_key(package, version);
        if let Some(known) = self.known.get(&key) {
            return Ok(*known);
        }
        let found = self
            .search(package, Some(version))
            .await?
            .iter()
            .any(|p| p.version.eq_ignore_ascii_case(version));
        self.known.insert(key, found);
        Ok(found)
    }

    async fn upload(&self, file: &LocalPackage) -> Result<PackageResource, ApiError> {
        let content = tokio::fs::read(&file.path)
            .await
            .map_err(|e| ApiError::Io(format!("{}: {}", file.path.display(), e)))?;
        let href = self.space.link(PACKAGE_UPLOAD)?.expand(&LinkParams::new())?;
        info!("Uploading {} to the built-in feed", file.file_name);
        self.space.client().upload(&href, &file.file_name, content).await
    }
}

fn version_key(package: &ReleaseTemplatePackage, version: &str) -> (String, String, String) {
    (
        package.feed_id.clone(),
        package.package_id.to_lowercase(),
        version.to_lowercase(),
    )
}
