//
//  octopus-client
//  api/resolver.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Name-or-Id Resolution
//!
//! Users refer to projects, environments, tenants and channels either by id
//! (`Projects-1`) or by display name (`Web Frontend`). Resolution tries the
//! value as an id first and, only when the server reports it missing, runs a
//! single filtered list and looks for an exact, case-insensitive name match.
//!
//! A name that matches several resources is an error rather than a guess.

use tracing::debug;

use super::common::ApiError;
use super::repository::{ListArgs, Repository};
use super::resources::NamedResource;

/// Page size that asks the server for every match in one response.
pub const ALL_ITEMS: u32 = i32::MAX as u32;

/// Resolves a resource by id, falling back to an exact name match.
///
/// # Parameters
///
/// * `repository` - Collection to search
/// * `name_or_id` - An id, a link, or a display name
///
/// # Returns
///
/// The single matching resource.
///
/// # Errors
///
/// - [`ApiError::NotFound`] when neither the id nor any name matches
/// - [`ApiError::AmbiguousName`] when several resources share the name
/// - Any error of the direct lookup other than `NotFound`
pub async fn resolve_by_name_or_id<T: NamedResource>(
    repository: &Repository<T>,
    name_or_id: &str,
) -> Result<T, ApiError> {
    if repository.supports_id_lookup() {
        match repository.get(name_or_id).await {
            Ok(resource) => return Ok(resource),
            Err(error) if error.is_not_found() => {
                debug!("No {} with id '{}', searching by name", T::KIND, name_or_id);
            }
            Err(error) => return Err(error),
        }
    }

    let args = ListArgs::new()
        .take(ALL_ITEMS)
        .filter("name", name_or_id)
        .filter("partialName", name_or_id);
    let page = repository.list(&args).await?;
    select_by_name(page.items, name_or_id)
}

/// Picks the one resource whose name equals `name`, ignoring case.
pub fn select_by_name<T: NamedResource>(candidates: Vec<T>, name: &str) -> Result<T, ApiError> {
    let mut matches: Vec<T> = candidates
        .into_iter()
        .filter(|candidate| candidate.name().eq_ignore_ascii_case(name))
        .collect();

    match matches.len() {
        0 => Err(ApiError::NotFound(format!("{} '{}'", T::KIND, name))),
        1 => Ok(matches.remove(0)),
        _ => Err(ApiError::AmbiguousName {
            kind: T::KIND.to_string(),
            name: name.to_string(),
            matches: matches.iter().map(|m| m.id().to_string()).collect(),
        }),
    }
}
