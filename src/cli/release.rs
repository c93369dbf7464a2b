//
//  octopus-client
//  cli/release.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Release commands
//!
//! `octo release create` creates a release for a project and, when
//! `--deploy-to` is given, deploys it to each environment (and tenant).
//! With `--wait` the command follows every deployment task to completion.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use console::style;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::api::resources::TaskState;
use crate::output::{
    format_task_state, print_field, print_header, OutputFormat, OutputWriter, TableBuilder, TableOutput,
};
use crate::release::{
    CreateReleaseOptions, DeployOptions, DeploymentOutcome, DeploymentTarget, PackageIdentity, PackageReport,
    PromptedVariable, ReleaseOrchestrator, ReleaseOutcome, ReleaseStage, StageObserver,
};

use super::{GlobalOptions, PartialFailure};

/// Create and deploy releases
#[derive(Args, Debug)]
pub struct ReleaseCommand {
    #[command(subcommand)]
    pub command: ReleaseSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ReleaseSubcommand {
    /// Create a release and optionally deploy it
    #[command(visible_alias = "new")]
    Create(CreateArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Project name or id
    #[arg(long, short = 'p')]
    pub project: String,

    /// Channel name or id (default: the project's default channel)
    #[arg(long, short = 'c')]
    pub channel: Option<String>,

    /// Release version (default: the version the server proposes)
    #[arg(long = "release-number", short = 'r', visible_alias = "release-version")]
    pub release_number: Option<String>,

    /// Release notes
    #[arg(long)]
    pub notes: Option<String>,

    /// Package version as PackageIdOrStep:Version (repeatable)
    #[arg(long = "package", value_name = "ID:VERSION")]
    pub packages: Vec<PackageIdentity>,

    /// Folder of package files (e.g. Hello.1.0.0.zip) to select and upload
    #[arg(long, value_name = "DIR")]
    pub packages_folder: Option<PathBuf>,

    /// Environment name or id to deploy to (repeatable)
    #[arg(long = "deploy-to", short = 'd', value_name = "ENVIRONMENT")]
    pub deploy_to: Vec<String>,

    /// Tenant name or id to deploy for (repeatable)
    #[arg(long = "tenant", value_name = "TENANT")]
    pub tenants: Vec<String>,

    /// Deploy for every tenant carrying this canonical tag, e.g. Region/us (repeatable)
    #[arg(long = "tenant-tag", value_name = "TAG")]
    pub tenant_tags: Vec<String>,

    /// Schedule the deployment, as an RFC 3339 instant
    #[arg(long, value_name = "TIME")]
    pub deploy_at: Option<DateTime<Utc>>,

    /// Cancel a scheduled deployment that has not started by this instant
    #[arg(long, value_name = "TIME", requires = "deploy_at")]
    pub no_deploy_after: Option<DateTime<Utc>>,

    /// Re-download packages even if already on the target
    #[arg(long)]
    pub force_package_download: bool,

    /// Redeploy packages even if already installed
    #[arg(long)]
    pub force_package_redeployment: bool,

    /// Override guided failure mode
    #[arg(long, value_name = "BOOL")]
    pub guided_failure: Option<bool>,

    /// Action id to skip (repeatable)
    #[arg(long = "skip", value_name = "ACTION")]
    pub skip_actions: Vec<String>,

    /// Prompted variable value as Name=Value (repeatable)
    #[arg(long = "variable", short = 'v', value_name = "NAME=VALUE")]
    pub variables: Vec<PromptedVariable>,

    /// Deployment comments
    #[arg(long)]
    pub comments: Option<String>,

    /// Wait for the deployments to finish
    #[arg(long, short = 'w')]
    pub wait: bool,

    /// Seconds to wait in total before giving up
    #[arg(long, value_name = "SECONDS", requires = "wait")]
    pub wait_timeout: Option<u64>,

    /// Seconds between task polls
    #[arg(long, value_name = "SECONDS", requires = "wait")]
    pub poll_interval: Option<u64>,

    /// Cancel deployments still running when the wait times out
    #[arg(long, requires = "wait")]
    pub cancel_on_timeout: bool,
}

impl CreateArgs {
    fn release_options(&self) -> CreateReleaseOptions {
        CreateReleaseOptions {
            project: self.project.clone(),
            channel: self.channel.clone(),
            version: self.release_number.clone(),
            release_notes: self.notes.clone(),
            packages: self.packages.clone(),
            packages_folder: self.packages_folder.clone(),
        }
    }

    fn deploy_options(&self) -> DeployOptions {
        DeployOptions {
            environments: self.deploy_to.clone(),
            tenants: self.tenants.clone(),
            tenant_tags: self.tenant_tags.clone(),
            queue_time: self.deploy_at,
            queue_time_expiry: self.no_deploy_after,
            force_package_download: self.force_package_download,
            force_package_redeployment: self.force_package_redeployment,
            guided_failure: self.guided_failure,
            skip_actions: self.skip_actions.clone(),
            variables: self.variables.clone(),
            comments: self.comments.clone(),
            wait_for_deployment: self.wait,
        }
    }
}

#[derive(Debug, Serialize)]
struct DeploymentRow {
    target: DeploymentTarget,
    deployment_id: Option<String>,
    task_id: Option<String>,
    state: Option<TaskState>,
    error: Option<String>,
    succeeded: bool,
}

impl From<&DeploymentOutcome> for DeploymentRow {
    fn from(outcome: &DeploymentOutcome) -> Self {
        let deployment = outcome.deployment.as_ref().ok();
        let task = outcome.completion.as_ref().and_then(|c| c.as_ref().ok());
        Self {
            target: outcome.target.clone(),
            deployment_id: deployment.map(|d| d.id.clone()),
            task_id: deployment.map(|d| d.task_id.clone()),
            state: task.map(|t| t.state),
            error: outcome
                .error()
                .map(|e| e.to_string())
                .or_else(|| task.and_then(|t| t.error_message.clone())),
            succeeded: outcome.succeeded(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ReleaseReport {
    release_id: String,
    version: String,
    project: String,
    channel: String,
    packages: PackageReport,
    deployments: Vec<DeploymentRow>,
}

impl From<&ReleaseOutcome> for ReleaseReport {
    fn from(outcome: &ReleaseOutcome) -> Self {
        Self {
            release_id: outcome.release.id.clone(),
            version: outcome.release.version.clone(),
            project: outcome.project.name.clone(),
            channel: outcome.channel.name.clone(),
            packages: outcome.packages.clone(),
            deployments: outcome.deployments.iter().map(DeploymentRow::from).collect(),
        }
    }
}

impl TableOutput for ReleaseReport {
    fn print_table(&self, color: bool) {
        println!();
        print_header(&format!("{} {}", self.project, self.version));
        print_field("Release", &self.release_id, color);
        print_field("Channel", &self.channel, color);

        if !self.packages.selected.is_empty() {
            println!();
            TableBuilder::new()
                .color(color)
                .headers(["STEP", "PACKAGE", "VERSION", "SOURCE"])
                .rows(self.packages.selected.iter().map(|p| {
                    [
                        p.action_name.clone(),
                        p.package_id.clone(),
                        p.version.clone(),
                        p.source.to_string(),
                    ]
                }))
                .print();
        }
        for uploaded in &self.packages.uploaded {
            print_field("Uploaded", &uploaded.to_string(), color);
        }

        if !self.deployments.is_empty() {
            println!();
            TableBuilder::new()
                .color(color)
                .headers(["TARGET", "DEPLOYMENT", "STATE", "ERROR"])
                .rows(self.deployments.iter().map(|d| {
                    let state = match (d.state, d.deployment_id.is_some()) {
                        (Some(state), _) => format_task_state(state, color),
                        (None, true) => "Queued".to_string(),
                        (None, false) => "Not created".to_string(),
                    };
                    [
                        d.target.to_string(),
                        d.deployment_id.clone().unwrap_or_else(|| "-".to_string()),
                        state,
                        d.error.clone().unwrap_or_default(),
                    ]
                }))
                .print();
        }
    }
}

impl ReleaseCommand {
    pub async fn run(&self, global: &GlobalOptions, cancellation: CancellationToken) -> Result<()> {
        match &self.command {
            ReleaseSubcommand::Create(args) => self.create(args, global, cancellation).await,
        }
    }

    async fn create(&self, args: &CreateArgs, global: &GlobalOptions, cancellation: CancellationToken) -> Result<()> {
        let client = global.client()?;
        let space = global.space_context(client).await?;
        let writer = OutputWriter::new(global.format());

        let mut polling = *space.client().config().polling();
        if let Some(seconds) = args.wait_timeout {
            polling.timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = args.poll_interval {
            polling.interval = Duration::from_secs(seconds.max(1));
        }
        polling.cancel_on_timeout |= args.cancel_on_timeout;

        let orchestrator = ReleaseOrchestrator::new(space)
            .with_polling(polling)
            .with_cancellation(cancellation)
            .with_observer(progress(global.format()));

        let outcome = orchestrator
            .run(&args.release_options(), &args.deploy_options())
            .await
            .with_context(|| format!("Could not release {}", args.project))?;

        let report = ReleaseReport::from(&outcome);
        writer.write(&report)?;

        for unused in &outcome.packages.unused {
            writer.write_warning(&format!("--package {} matched no step", unused));
        }

        if !outcome.all_succeeded() {
            return Err(PartialFailure {
                failed: outcome.failed_count(),
                total: outcome.deployments.len(),
            }
            .into());
        }

        if outcome.deployments.is_empty() {
            writer.write_success(&format!("Created release {}", outcome.release.version));
        } else {
            writer.write_success(&format!(
                "Released {} to {} target(s)",
                outcome.release.version,
                outcome.deployments.len()
            ));
        }
        Ok(())
    }
}

/// Prints each stage as a dimmed progress line in table mode.
fn progress(format: OutputFormat) -> StageObserver {
    let writer = OutputWriter::new(format);
    Arc::new(move |stage: ReleaseStage, detail: &str| {
        if writer.color_enabled() {
            writer.write_info(&format!("{} {}", style(stage).dim(), detail));
        } else {
            writer.write_info(&format!("{} {}", stage, detail));
        }
    })
}
