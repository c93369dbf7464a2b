//
//  octopus-client
//  cli/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! CLI command definitions using clap derive macros

mod release;
mod space;

pub use release::ReleaseCommand;
pub use space::SpaceCommand;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use thiserror::Error;

use crate::api::{ApiClient, ApiError, SpaceContext, SpaceResolver};
use crate::config::{ClientConfiguration, ConfigError, ConfigFile, EnvSettings};
use crate::exit_codes;
use crate::output::OutputFormat;

/// octo - Create and deploy releases on an Octopus server
#[derive(Parser, Debug)]
#[command(
    name = "octo",
    version,
    about = "Create and deploy releases on an Octopus server",
    long_about = "octo talks to an Octopus Deploy server through its hypermedia API.\n\n\
                  It creates releases, picks package versions and rolls releases out \
                  to environments and tenants.",
    propagate_version = true,
    after_help = "Use 'octo <command> --help' for more information about a command."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Server address, e.g. https://octopus.example.com
    #[arg(long, global = true, env = "OCTOPUS_URL")]
    pub server: Option<String>,

    /// API key sent as X-Octopus-ApiKey
    #[arg(long, global = true, env = "OCTOPUS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Space name or id; the server's default space when omitted
    #[arg(long, short = 's', global = true, env = "OCTOPUS_SPACE")]
    pub space: Option<String>,

    /// Output format as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalOptions {
    pub fn format(&self) -> OutputFormat {
        OutputFormat::from_flag(self.json)
    }

    /// Builds the client configuration: config file, then environment, then
    /// these flags.
    pub fn configuration(&self) -> Result<ClientConfiguration, ConfigError> {
        let file = ConfigFile::load_default()?;
        let mut builder = ClientConfiguration::builder()
            .with_file(&file)
            .with_env(&EnvSettings::from_env());
        if let Some(server) = &self.server {
            builder = builder.server(server);
        }
        if let Some(key) = &self.api_key {
            builder = builder.api_key(key);
        }
        if let Some(space) = &self.space {
            builder = builder.space(space);
        }
        builder.build()
    }

    pub fn client(&self) -> Result<ApiClient> {
        let config = self.configuration()?;
        Ok(ApiClient::new(config)?)
    }

    /// Resolves the selected space, or the default one.
    pub async fn space_context(&self, client: ApiClient) -> Result<SpaceContext> {
        let selector = client.config().space().map(str::to_string);
        SpaceResolver::new(client)
            .resolve_configured()
            .await
            .with_context(|| match selector {
                Some(space) => format!("Could not open space '{}'", space),
                None => "Could not open the default space".to_string(),
            })
    }
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create and deploy releases
    #[command(visible_alias = "r")]
    Release(ReleaseCommand),

    /// Inspect spaces
    Space(SpaceCommand),

    /// Print version information
    Version,
}

/// Some deployments of a release did not succeed.
#[derive(Debug, Error)]
#[error("{failed} of {total} deployment(s) did not succeed")]
pub struct PartialFailure {
    pub failed: usize,
    pub total: usize,
}

/// Maps a command error to the process exit code.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<PartialFailure>().is_some() {
        return exit_codes::PARTIAL_FAILURE;
    }
    if error.downcast_ref::<ConfigError>().is_some() {
        return exit_codes::USAGE;
    }
    match error.downcast_ref::<ApiError>() {
        Some(api) if api.is_authentication() => exit_codes::AUTH_ERROR,
        Some(ApiError::NotFound(_) | ApiError::SpaceNotFound(_)) => exit_codes::NOT_FOUND,
        Some(ApiError::Cancelled) => exit_codes::CANCELLED,
        _ => exit_codes::ERROR,
    }
}
