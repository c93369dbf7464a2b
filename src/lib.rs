//
//  octopus-client
//  lib.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Octopus Client Library
//!
//! A typed client for Octopus-style deployment servers and the library
//! behind the `octo` CLI.
//!
//! ## Overview
//!
//! The server describes itself through hypermedia: every document carries a
//! `Links` map of URI templates, and only the bootstrap `/api` path is fixed.
//! This crate follows those links to reach spaces, projects, environments,
//! tenants, releases, deployments and tasks, and builds a release workflow on
//! top.
//!
//! ## Features
//!
//! - **Link Following**: Root documents fetched once and shared, link
//!   templates expanded at runtime
//! - **Spaces**: Name-or-id space selection with memoized lookups
//! - **Repositories**: Generic get, list, streamed paging, create, modify and
//!   delete for every resource kind
//! - **Release Orchestration**: Project, channel, version and package
//!   selection, concurrent deployments to environments and tenants, task
//!   polling with cancellation
//!
//! ## Module Structure
//!
//! - [`api`]: Transport, link resolution, caching, repositories, resources
//! - [`auth`]: Credentials
//! - [`config`]: Client configuration from file, environment and flags
//! - [`release`]: The release workflow
//! - [`output`]: Table and JSON rendering for the CLI
//! - [`cli`]: Command-line interface definitions using clap
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use octopus_client::{ApiClient, ClientConfiguration, SpaceResolver};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfiguration::load()?)?;
//! let space = SpaceResolver::new(client).resolve_space("Default").await?;
//!
//! let production = space.environments()?.resolve("Production").await?;
//! println!("Production is {}", production.id);
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions.
///
/// Contains the `octo` commands, arguments and subcommands defined using the
/// clap derive API.
pub mod cli;

/// The resource-access core.
///
/// Transport, link templates, the single-flight cache, spaces, repositories,
/// name resolution and the typed resource documents.
pub mod api;

/// Credentials attached to every request.
pub mod auth;

/// Client configuration.
///
/// Reads the optional configuration file from the platform config directory:
/// - Linux: `~/.config/octo/config.toml`
/// - macOS: `~/Library/Application Support/octo/config.toml`
/// - Windows: `%APPDATA%\octo\config.toml`
pub mod config;

/// Release creation, deployment and task polling.
pub mod release;

/// Output formatting for the CLI.
pub mod output;

pub use api::{ApiClient, ApiError, SpaceContext, SpaceResolver};

pub use cli::Cli;

pub use config::ClientConfiguration;

pub use release::ReleaseOrchestrator;

/// Application name constant.
///
/// The name of the CLI binary, used for the configuration directory and the
/// `User-Agent` header.
pub const APP_NAME: &str = "octo";

/// Application version constant, from Cargo.toml.
///
/// ```rust
/// use octopus_client::VERSION;
///
/// println!("octo version {}", VERSION);
/// ```
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes for the CLI.
///
/// # Exit Code Ranges
///
/// - `0`: Success
/// - `1-3`: General errors and usage issues
/// - `4-7`: Authentication-related issues
/// - `8-15`: Resource-related issues
/// - `16-31`: Operation-related issues
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;

    /// General error.
    ///
    /// An unspecified error occurred during execution.
    /// Check stderr for details.
    pub const ERROR: i32 = 1;

    /// Invalid usage, arguments or configuration.
    ///
    /// The command was invoked with invalid arguments, or no server or
    /// credential was configured.
    pub const USAGE: i32 = 2;

    /// Authentication failed.
    ///
    /// The server rejected the API key or access token.
    pub const AUTH_ERROR: i32 = 4;

    /// Resource not found.
    ///
    /// A space, project, channel, environment or tenant does not exist.
    pub const NOT_FOUND: i32 = 8;

    /// Operation cancelled by user.
    ///
    /// Typically by pressing Ctrl+C while waiting for deployments.
    pub const CANCELLED: i32 = 16;

    /// Some deployments failed.
    ///
    /// The release was created but at least one target did not deploy
    /// successfully.
    pub const PARTIAL_FAILURE: i32 = 17;
}
