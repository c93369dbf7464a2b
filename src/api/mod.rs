//
//  octopus-client
//  api/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # API Module
//!
//! The resource-access core of the client.
//!
//! ## Layers
//!
//! | Module | Role |
//! |--------|------|
//! | [`transport`] | Sends one HTTP exchange |
//! | [`client`] | Link resolution, credentials, retries, root documents |
//! | [`cache`] | Single-flight memoization of root documents and spaces |
//! | [`links`] | `Links` maps and URI template expansion |
//! | [`spaces`] | Space selector to space-scoped root document |
//! | [`repository`] | Generic CRUD and paging per resource kind |
//! | [`resolver`] | Name-or-id lookup |
//! | [`resources`] | Typed documents |
//! | [`common`] | Errors and pagination |

pub mod cache;

pub mod client;

pub mod common;

pub mod links;

pub mod repository;

pub mod resolver;

pub mod resources;

pub mod spaces;

pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::ApiClient;

pub use common::{ApiError, ErrorResponseDetails, ResourceCollection};

pub use repository::{ListArgs, Repository};

pub use spaces::{SpaceContext, SpaceResolver};
