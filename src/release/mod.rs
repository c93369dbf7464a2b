//
//  octopus-client
//  release/mod.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! # Release Orchestration
//!
//! Creates a release and rolls it out.
//!
//! ## Stages
//!
//! ```text
//! ResolvingProject -> ResolvingChannel -> DeterminingVersion
//!   -> StagingPackages -> CreatingRelease -> ReleaseCreated
//!   -> per target: CreatingDeployment -> DeploymentCreated | DeploymentFailed
//!   -> optionally: Polling -> TaskFinished
//! ```
//!
//! Every stage up to `ReleaseCreated` is fatal: the first error is returned
//! and nothing is deployed. Deployment failures are collected per target.
//!
//! ## Example
//!
//! ```rust,no_run
//! use octopus_client::api::{ApiClient, SpaceResolver};
//! use octopus_client::config::ClientConfiguration;
//! use octopus_client::release::{CreateReleaseOptions, DeployOptions, ReleaseOrchestrator};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ApiClient::new(ClientConfiguration::load()?)?;
//! let space = SpaceResolver::new(client).resolve_configured().await?;
//!
//! let release = CreateReleaseOptions {
//!     project: "Web Frontend".to_string(),
//!     ..Default::default()
//! };
//! let deploy = DeployOptions {
//!     environments: vec!["Staging".to_string()],
//!     wait_for_deployment: true,
//!     ..Default::default()
//! };
//!
//! let outcome = ReleaseOrchestrator::new(space).run(&release, &deploy).await?;
//! println!("{} deployed: {}", outcome.release.version, outcome.all_succeeded());
//! # Ok(())
//! # }
//! ```

pub mod packages;

pub mod poll;

pub mod targets;

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::api::links::LinkParams;
use crate::api::resources::{
    ChannelResource, DeploymentPreview, DeploymentProcessResource, DeploymentResource, NewDeployment,
    NewRelease, ProjectResource, ReleaseResource, ReleaseTemplate, TaskResource, DEPLOYMENT_PREVIEW,
    DEPLOYMENT_PROCESS, RELEASE_TEMPLATE,
};
use crate::api::{ApiError, ListArgs, SpaceContext};
use crate::config::PollingOptions;

pub use packages::{
    compare_versions, parse_package_file, scan_folder, LocalPackage, PackageIdentity, PackageMismatch,
    PackageReport, PackageSelection, PackageSource,
};
pub use poll::{cancel_task, next_transition, Clock, PollTransition, Sleeper, SystemClock, TaskPoller, TokioSleeper};
pub use targets::{plan_targets, DeploymentTarget, ResolvedTarget, TargetPlan, TargetRequest};

use packages::PackageStager;

/// What release to create.
#[derive(Debug, Clone, Default)]
pub struct CreateReleaseOptions {
    /// Project name or id
    pub project: String,
    /// Channel name or id; the project's default channel when `None`
    pub channel: Option<String>,
    /// Release version; the server's proposed next version when `None`
    pub version: Option<String>,
    pub release_notes: Option<String>,
    /// Explicit package versions, matched by package id or step name
    pub packages: Vec<PackageIdentity>,
    /// Folder of package files to select from and upload
    pub packages_folder: Option<PathBuf>,
}

/// A value for a prompted variable, written `Name=Value` or `Name:Value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptedVariable {
    pub name: String,
    pub value: String,
}

impl PromptedVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl FromStr for PromptedVariable {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.split_once(['=', ':']) {
            Some((name, val)) if !name.trim().is_empty() => Ok(Self::new(name.trim(), val)),
            _ => Err(ApiError::InvalidOperation(format!(
                "Variable '{}' must be written as Name=Value",
                value
            ))),
        }
    }
}

/// Where and how to deploy a release.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Environment names or ids, in the order results are reported
    pub environments: Vec<String>,
    /// Tenant names or ids
    pub tenants: Vec<String>,
    /// Canonical tag names, e.g. `Region/us-east`
    pub tenant_tags: Vec<String>,
    /// When to start; immediately when `None`
    pub queue_time: Option<DateTime<Utc>>,
    /// Latest start time of a scheduled deployment
    pub queue_time_expiry: Option<DateTime<Utc>>,
    pub force_package_download: bool,
    pub force_package_redeployment: bool,
    /// Overrides the environment's guided failure setting
    pub guided_failure: Option<bool>,
    /// Action ids to skip
    pub skip_actions: Vec<String>,
    pub variables: Vec<PromptedVariable>,
    pub comments: Option<String>,
    /// Poll each deployment's task until it finishes
    pub wait_for_deployment: bool,
}

impl DeployOptions {
    /// Checks option combinations the server would reject.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.environments.is_empty() && (!self.tenants.is_empty() || !self.tenant_tags.is_empty()) {
            return Err(ApiError::InvalidOperation(
                "Tenants were given without an environment to deploy to".to_string(),
            ));
        }
        if let (Some(start), Some(expiry)) = (self.queue_time, self.queue_time_expiry) {
            if expiry <= start {
                return Err(ApiError::InvalidOperation(format!(
                    "Queue time expiry {} must be after queue time {}",
                    expiry, start
                )));
            }
        }
        Ok(())
    }
}

/// Progress of a release run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStage {
    ResolvingProject,
    ResolvingChannel,
    DeterminingVersion,
    StagingPackages,
    CreatingRelease,
    ReleaseCreated,
    CreatingDeployment,
    DeploymentCreated,
    DeploymentFailed,
    Polling,
    TaskFinished,
}

impl fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ResolvingProject => "Resolving project",
            Self::ResolvingChannel => "Resolving channel",
            Self::DeterminingVersion => "Determining version",
            Self::StagingPackages => "Staging packages",
            Self::CreatingRelease => "Creating release",
            Self::ReleaseCreated => "Release created",
            Self::CreatingDeployment => "Creating deployment",
            Self::DeploymentCreated => "Deployment created",
            Self::DeploymentFailed => "Deployment failed",
            Self::Polling => "Waiting for deployment",
            Self::TaskFinished => "Deployment finished",
        };
        f.write_str(label)
    }
}

/// Receives stage changes, e.g. to print progress.
pub type StageObserver = Arc<dyn Fn(ReleaseStage, &str) + Send + Sync>;

/// Result of deploying to one target.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    pub target: DeploymentTarget,
    pub deployment: Result<DeploymentResource, ApiError>,
    /// The finished task, when waiting was requested and the deployment
    /// was created
    pub completion: Option<Result<TaskResource, ApiError>>,
}

impl DeploymentOutcome {
    /// `true` when the deployment was created and, if awaited, its task
    /// succeeded.
    pub fn succeeded(&self) -> bool {
        match (&self.deployment, &self.completion) {
            (Err(_), _) => false,
            (Ok(_), None) => true,
            (Ok(_), Some(Ok(task))) => task.state.is_success(),
            (Ok(_), Some(Err(_))) => false,
        }
    }

    /// The first error of this target, if any.
    pub fn error(&self) -> Option<&ApiError> {
        match (&self.deployment, &self.completion) {
            (Err(error), _) => Some(error),
            (Ok(_), Some(Err(error))) => Some(error),
            _ => None,
        }
    }
}

/// Result of a release run.
#[derive(Debug, Clone)]
pub struct ReleaseOutcome {
    pub release: ReleaseResource,
    pub project: ProjectResource,
    pub channel: ChannelResource,
    pub packages: PackageReport,
    /// One entry per target, in request order
    pub deployments: Vec<DeploymentOutcome>,
}

impl ReleaseOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.deployments.iter().all(DeploymentOutcome::succeeded)
    }

    pub fn failed_count(&self) -> usize {
        self.deployments.iter().filter(|d| !d.succeeded()).count()
    }
}

/// Runs the release workflow within one space.
#[derive(Clone)]
pub struct ReleaseOrchestrator {
    space: SpaceContext,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    polling: PollingOptions,
    cancellation: CancellationToken,
    observer: Option<StageObserver>,
}

impl fmt::Debug for ReleaseOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReleaseOrchestrator")
            .field("space", &self.space.space().id)
            .field("polling", &self.polling)
            .finish()
    }
}

impl ReleaseOrchestrator {
    pub fn new(space: SpaceContext) -> Self {
        let polling = *space.client().config().polling();
        Self {
            space,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
            polling,
            cancellation: CancellationToken::new(),
            observer: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_polling(mut self, polling: PollingOptions) -> Self {
        self.polling = polling;
        self
    }

    /// Stops polling when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Creates the release, then deploys it.
    ///
    /// # Errors
    ///
    /// Errors of [`create_release`](Self::create_release), invalid
    /// [`DeployOptions`], or [`ApiError::Cancelled`] when cancelled before
    /// deploying. Per-target failures are reported in the outcome instead.
    pub async fn run(
        &self,
        release: &CreateReleaseOptions,
        deploy: &DeployOptions,
    ) -> Result<ReleaseOutcome, ApiError> {
        deploy.validate()?;
        let mut outcome = self.create_release(release).await?;
        if self.cancellation.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        outcome.deployments = self.deploy_release(&outcome, deploy).await;
        Ok(outcome)
    }

    /// Resolves the project, channel, version and packages, then creates
    /// the release. The returned outcome has no deployments.
    ///
    /// # Errors
    ///
    /// - [`ApiError::NotFound`] / [`ApiError::AmbiguousName`] for the
    ///   project or channel
    /// - [`ApiError::PackageMismatch`] when package versions are missing
    /// - [`ApiError::ReleaseConflict`] when the version already exists
    pub async fn create_release(&self, options: &CreateReleaseOptions) -> Result<ReleaseOutcome, ApiError> {
        if self.cancellation.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        self.report(ReleaseStage::ResolvingProject, &options.project);
        let project = self.space.projects()?.resolve(&options.project).await?;

        self.report(
            ReleaseStage::ResolvingChannel,
            options.channel.as_deref().unwrap_or("default channel"),
        );
        let channel = self.resolve_channel(&project, options.channel.as_deref()).await?;

        let template = self.release_template(&project, &channel).await?;
        let version = match &options.version {
            Some(version) => version.clone(),
            None if template.next_version_increment.is_empty() => {
                return Err(ApiError::InvalidOperation(format!(
                    "The server proposed no version for {}; pass one explicitly",
                    project.name
                )));
            }
            None => template.next_version_increment.clone(),
        };
        self.report(ReleaseStage::DeterminingVersion, &version);

        self.report(
            ReleaseStage::StagingPackages,
            &format!("{} package reference(s)", template.packages.len()),
        );
        let packages = PackageStager::new(&self.space)
            .stage(&template, &options.packages, options.packages_folder.as_deref())
            .await?;

        self.report(ReleaseStage::CreatingRelease, &version);
        let body = NewRelease {
            project_id: project.id.clone(),
            channel_id: channel.id.clone(),
            version: version.clone(),
            release_notes: options.release_notes.clone(),
            selected_packages: packages.selected_packages(),
        };
        let release = self
            .space
            .releases()?
            .create(&body)
            .await
            .map_err(|error| conflict_or(error, &version))?;
        self.report(ReleaseStage::ReleaseCreated, &release.id);

        Ok(ReleaseOutcome {
            release,
            project,
            channel,
            packages,
            deployments: Vec::new(),
        })
    }

    /// Deploys a created release to every target concurrently and, when
    /// asked, waits for the tasks. Results follow request order.
    pub async fn deploy_release(&self, created: &ReleaseOutcome, options: &DeployOptions) -> Vec<DeploymentOutcome> {
        let request = TargetRequest {
            environments: &options.environments,
            tenants: &options.tenants,
            tenant_tags: &options.tenant_tags,
        };
        let plans = plan_targets(&self.space, &created.project, request).await;

        let deployments = join_all(
            plans
                .into_iter()
                .map(|plan| self.deploy_one(&created.release, plan, options)),
        )
        .await;

        if !options.wait_for_deployment {
            return deployments
                .into_iter()
                .map(|(target, deployment)| DeploymentOutcome {
                    target,
                    deployment,
                    completion: None,
                })
                .collect();
        }

        let completions = join_all(deployments.iter().map(|(target, deployment)| async move {
            match deployment {
                Ok(deployment) => Some(self.wait_for(target, deployment).await),
                Err(_) => None,
            }
        }))
        .await;

        deployments
            .into_iter()
            .zip(completions)
            .map(|((target, deployment), completion)| DeploymentOutcome {
                target,
                deployment,
                completion,
            })
            .collect()
    }

    async fn resolve_channel(
        &self,
        project: &ProjectResource,
        channel: Option<&str>,
    ) -> Result<ChannelResource, ApiError> {
        let channels = self.space.channels_for(project)?;
        match channel {
            Some(name) => channels.resolve(name).await,
            None => channels
                .all(&ListArgs::new())
                .await?
                .into_iter()
                .find(|c| c.is_default)
                .ok_or_else(|| ApiError::NotFound(format!("default channel of project '{}'", project.name))),
        }
    }

    async fn release_template(
        &self,
        project: &ProjectResource,
        channel: &ChannelResource,
    ) -> Result<ReleaseTemplate, ApiError> {
        let client = self.space.client();
        let process: DeploymentProcessResource = client.get(project.links.require(DEPLOYMENT_PROCESS)?).await?;
        let href = process
            .links
            .template(RELEASE_TEMPLATE)?
            .expand(&LinkParams::new().with("channel", &channel.id))?;
        client.get(&href).await
    }

    async fn deploy_one(
        &self,
        release: &ReleaseResource,
        plan: TargetPlan,
        options: &DeployOptions,
    ) -> (DeploymentTarget, Result<DeploymentResource, ApiError>) {
        let label = plan.target.to_string();
        self.report(ReleaseStage::CreatingDeployment, &label);

        let result = match plan.resolved {
            Ok(resolved) => self.create_deployment(release, &resolved, options).await,
            Err(error) => Err(error),
        };

        match &result {
            Ok(deployment) => self.report(
                ReleaseStage::DeploymentCreated,
                &format!("{} ({})", label, deployment.id),
            ),
            Err(error) => {
                warn!("Deployment to {} failed: {}", label, error);
                self.report(ReleaseStage::DeploymentFailed, &label);
            }
        }
        (plan.target, result)
    }

    async fn create_deployment(
        &self,
        release: &ReleaseResource,
        target: &ResolvedTarget,
        options: &DeployOptions,
    ) -> Result<DeploymentResource, ApiError> {
        let tenant_id = target.tenant.as_ref().map(|t| t.id.clone());
        let form_values = if options.variables.is_empty() {
            BTreeMap::new()
        } else {
            self.form_values(release, &target.environment.id, tenant_id.as_deref(), &options.variables)
                .await?
        };

        let body = NewDeployment {
            release_id: release.id.clone(),
            environment_id: target.environment.id.clone(),
            tenant_id,
            queue_time: options.queue_time,
            queue_time_expiry: options.queue_time_expiry,
            force_package_download: options.force_package_download,
            force_package_redeployment: options.force_package_redeployment,
            use_guided_failure: options.guided_failure,
            skip_actions: options.skip_actions.clone(),
            form_values,
            comments: options.comments.clone(),
        };
        self.space.deployments()?.create(&body).await
    }

    /// Maps prompted variable names or labels to the preview's form keys.
    async fn form_values(
        &self,
        release: &ReleaseResource,
        environment_id: &str,
        tenant_id: Option<&str>,
        variables: &[PromptedVariable],
    ) -> Result<BTreeMap<String, String>, ApiError> {
        let href = release.links.template(DEPLOYMENT_PREVIEW)?.expand(
            &LinkParams::new()
                .with("environment", environment_id)
                .with_opt("tenant", tenant_id),
        )?;
        let preview: DeploymentPreview = self.space.client().get(&href).await?;

        let mut values = BTreeMap::new();
        for variable in variables {
            let element = preview.form.element_for(&variable.name).ok_or_else(|| {
                ApiError::InvalidOperation(format!(
                    "Release {} has no prompted variable '{}' in {}",
                    release.version, variable.name, environment_id
                ))
            })?;
            values.insert(element.name.clone(), variable.value.clone());
        }
        Ok(values)
    }

    async fn wait_for(&self, target: &DeploymentTarget, deployment: &DeploymentResource) -> Result<TaskResource, ApiError> {
        self.report(ReleaseStage::Polling, &format!("{} ({})", target, deployment.task_id));
        let poller = TaskPoller::new(self.space.tasks()?, self.polling)
            .with_clock(self.clock.clone())
            .with_sleeper(self.sleeper.clone())
            .with_cancellation(self.cancellation.clone());
        let result = poller.wait(&deployment.task_id).await;
        match &result {
            Ok(task) => self.report(ReleaseStage::TaskFinished, &format!("{}: {}", target, task.state)),
            Err(error) => warn!("Stopped waiting for {}: {}", target, error),
        }
        result
    }

    fn report(&self, stage: ReleaseStage, detail: &str) {
        info!("{}: {}", stage, detail);
        if let Some(observer) = &self.observer {
            observer(stage, detail);
        }
    }
}

/// Maps a rejected release creation to [`ApiError::ReleaseConflict`] when
/// the server says the version exists.
fn conflict_or(error: ApiError, version: &str) -> ApiError {
    match error {
        ApiError::Validation(details) if details.status_code == 409 || details.mentions("already exists") => {
            ApiError::ReleaseConflict {
                version: version.to_string(),
                details,
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{fixtures, MockTransport};
    use crate::api::transport::{HttpMethod, RequestBody};
    use async_trait::async_trait;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::Mutex;

    const PROJECT: &str = "/api/Spaces-1/projects/Projects-1";
    const RELEASES: &str = "/api/Spaces-1/releases";
    const DEPLOYMENTS: &str = "/api/Spaces-1/deployments";
    const FEED: &str = "/api/Spaces-1/feeds/feeds-builtin";

    /// A space with project "Web" (two channels, one package step) and
    /// environments Dev, Test and Prod.
    fn release_mock() -> Arc<MockTransport> {
        let mock = fixtures::space_mock();
        mock.respond_json(
            HttpMethod::Get,
            PROJECT,
            200,
            json!({
                "Id": "Projects-1",
                "Name": "Web",
                "DeploymentProcessId": "deploymentprocess-Projects-1",
                "Links": {
                    "Self": PROJECT,
                    "Channels": format!("{PROJECT}/channels{{/id}}{{?skip,take,partialName}}"),
                    "DeploymentProcess": "/api/Spaces-1/deploymentprocesses/deploymentprocess-Projects-1"
                }
            }),
        );
        mock.respond_json(
            HttpMethod::Get,
            &format!("{PROJECT}/channels"),
            200,
            fixtures::page(
                vec![
                    json!({"Id": "Channels-1", "Name": "Default", "IsDefault": true, "Links": {}}),
                    json!({"Id": "Channels-2", "Name": "Hotfix", "IsDefault": false, "Links": {}}),
                ],
                2,
                None,
            ),
        );
        mock.respond_json(
            HttpMethod::Get,
            "/api/Spaces-1/deploymentprocesses/deploymentprocess-Projects-1",
            200,
            json!({
                "Id": "deploymentprocess-Projects-1",
                "ProjectId": "Projects-1",
                "Links": {"Template": "/api/Spaces-1/deploymentprocesses/deploymentprocess-Projects-1/template{?channel,releaseId}"}
            }),
        );
        for channel in ["Channels-1", "Channels-2"] {
            mock.respond_json(
                HttpMethod::Get,
                &format!("/api/Spaces-1/deploymentprocesses/deploymentprocess-Projects-1/template?channel={channel}"),
                200,
                json!({
                    "NextVersionIncrement": "0.0.7",
                    "Packages": [{"ActionName": "Hello", "StepName": "Hello", "PackageId": "Hello", "FeedId": "feeds-builtin"}]
                }),
            );
        }
        mock.respond_json(
            HttpMethod::Get,
            FEED,
            200,
            json!({
                "Id": "feeds-builtin",
                "Name": "Built-in",
                "FeedType": "BuiltIn",
                "Links": {"SearchPackageVersionsTemplate": format!("{FEED}/packages/versions{{?packageId,take,includePreRelease,versionRange}}")}
            }),
        );
        mock.respond_json(
            HttpMethod::Get,
            &format!("{FEED}/packages/versions?packageId=Hello&take=1&includePreRelease=true"),
            200,
            fixtures::page(vec![json!({"PackageId": "Hello", "Version": "1.0.0"})], 1, None),
        );
        for (id, name) in [("Environments-1", "Dev"), ("Environments-2", "Test"), ("Environments-3", "Prod")] {
            mock.respond_json(
                HttpMethod::Get,
                &format!("/api/Spaces-1/environments/{id}"),
                200,
                fixtures::named(id, name, &format!("/api/Spaces-1/environments/{id}")),
            );
        }
        mock.respond_json(
            HttpMethod::Post,
            RELEASES,
            201,
            json!({
                "Id": "Releases-1",
                "Version": "0.0.7",
                "ProjectId": "Projects-1",
                "ChannelId": "Channels-1",
                "Links": {
                    "Self": "/api/Spaces-1/releases/Releases-1",
                    "DeploymentPreview": "/api/Spaces-1/releases/Releases-1/deployments/preview/{environment}{/tenant}"
                }
            }),
        );
        mock
    }

    fn deployment(id: &str, environment: &str, task: &str) -> serde_json::Value {
        json!({
            "Id": id,
            "Name": format!("Deploy to {environment}"),
            "ReleaseId": "Releases-1",
            "EnvironmentId": environment,
            "TaskId": task,
            "Links": {"Self": format!("{DEPLOYMENTS}/{id}")}
        })
    }

    fn task(id: &str, state: &str) -> serde_json::Value {
        json!({
            "Id": id,
            "State": state,
            "Links": {"Self": format!("/api/Spaces-1/tasks/{id}"), "Cancel": format!("/api/Spaces-1/tasks/{id}/cancel")}
        })
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    /// Fires the token on the first sleep and never wakes.
    struct CancellingSleeper(CancellationToken);

    #[async_trait]
    impl Sleeper for CancellingSleeper {
        async fn sleep(&self, _duration: std::time::Duration) {
            self.0.cancel();
            std::future::pending::<()>().await;
        }
    }

    async fn orchestrator(mock: &Arc<MockTransport>) -> ReleaseOrchestrator {
        ReleaseOrchestrator::new(fixtures::space_context(mock).await)
    }

    fn project_only() -> CreateReleaseOptions {
        CreateReleaseOptions {
            project: "Projects-1".to_string(),
            ..Default::default()
        }
    }

    fn to(environments: &[&str]) -> DeployOptions {
        DeployOptions {
            environments: environments.iter().map(|e| e.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_prompted_variable_from_str() {
        assert_eq!(
            "Name=John".parse::<PromptedVariable>().unwrap(),
            PromptedVariable::new("Name", "John")
        );
        assert_eq!(
            "Url=http://x:80".parse::<PromptedVariable>().unwrap(),
            PromptedVariable::new("Url", "http://x:80")
        );
        assert!("=John".parse::<PromptedVariable>().is_err());
        assert!("John".parse::<PromptedVariable>().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_schedule() {
        let now = Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0).unwrap();
        let options = DeployOptions {
            environments: vec!["Dev".to_string()],
            queue_time: Some(now),
            queue_time_expiry: Some(now),
            ..Default::default()
        };
        assert!(matches!(options.validate(), Err(ApiError::InvalidOperation(_))));

        let tenants_only = DeployOptions {
            tenants: vec!["Acme".to_string()],
            ..Default::default()
        };
        assert!(tenants_only.validate().is_err());
    }

    #[tokio::test]
    async fn test_creates_release_with_default_channel_and_latest_packages() {
        let mock = release_mock();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let seen = stages.clone();

        let outcome = orchestrator(&mock)
            .await
            .with_observer(Arc::new(move |stage: ReleaseStage, _: &str| seen.lock().unwrap().push(stage)))
            .run(&project_only(), &DeployOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.channel.id, "Channels-1");
        assert_eq!(outcome.release.version, "0.0.7");
        assert!(outcome.deployments.is_empty());

        let body = &mock.bodies(HttpMethod::Post, RELEASES)[0];
        assert_eq!(body["ProjectId"], "Projects-1");
        assert_eq!(body["ChannelId"], "Channels-1");
        assert_eq!(body["Version"], "0.0.7");
        assert_eq!(body["SelectedPackages"], json!([{"ActionName": "Hello", "Version": "1.0.0"}]));

        assert_eq!(
            *stages.lock().unwrap(),
            vec![
                ReleaseStage::ResolvingProject,
                ReleaseStage::ResolvingChannel,
                ReleaseStage::DeterminingVersion,
                ReleaseStage::StagingPackages,
                ReleaseStage::CreatingRelease,
                ReleaseStage::ReleaseCreated,
            ]
        );
    }

    #[tokio::test]
    async fn test_named_channel_and_explicit_version() {
        let mock = release_mock();
        let options = CreateReleaseOptions {
            channel: Some("Channels-2".to_string()),
            version: Some("1.2.3".to_string()),
            ..project_only()
        };
        mock.respond_json(
            HttpMethod::Get,
            &format!("{PROJECT}/channels/Channels-2"),
            200,
            json!({"Id": "Channels-2", "Name": "Hotfix", "Links": {}}),
        );

        orchestrator(&mock).await.create_release(&options).await.unwrap();

        let body = &mock.bodies(HttpMethod::Post, RELEASES)[0];
        assert_eq!(body["ChannelId"], "Channels-2");
        assert_eq!(body["Version"], "1.2.3");
    }

    #[tokio::test]
    async fn test_release_conflict_attempts_no_deployment() {
        let mock = release_mock();
        mock.respond_when_body_contains(
            HttpMethod::Post,
            RELEASES,
            "0.0.7",
            400,
            json!({
                "ErrorMessage": "There was a problem with your request.",
                "Errors": ["A release with the version number '0.0.7' already exists."]
            }),
        );

        let error = orchestrator(&mock)
            .await
            .run(&project_only(), &to(&["Environments-1"]))
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::ReleaseConflict { ref version, .. } if version == "0.0.7"));
        assert_eq!(mock.calls_ignoring_query(HttpMethod::Post, DEPLOYMENTS), 0);
        assert_eq!(mock.calls(HttpMethod::Get, "/api/Spaces-1/environments/Environments-1"), 0);
    }

    #[tokio::test]
    async fn test_conflict_status_is_release_conflict() {
        let mock = release_mock();
        mock.respond_when_body_contains(
            HttpMethod::Post,
            RELEASES,
            "0.0.7",
            409,
            json!({"ErrorMessage": "Conflict", "Errors": []}),
        );

        let error = orchestrator(&mock)
            .await
            .run(&project_only(), &to(&["Environments-1", "Environments-2"]))
            .await
            .unwrap_err();

        match error {
            ApiError::ReleaseConflict { version, details } => {
                assert_eq!(version, "0.0.7");
                assert_eq!(details.status_code, 409);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.calls_ignoring_query(HttpMethod::Post, DEPLOYMENTS), 0);
    }

    #[tokio::test]
    async fn test_missing_project_is_fatal() {
        let mock = release_mock();
        mock.respond_json(
            HttpMethod::Get,
            "/api/Spaces-1/projects?name=Nope&take=2147483647&partialName=Nope",
            200,
            fixtures::page(vec![], 0, None),
        );
        let options = CreateReleaseOptions {
            project: "Nope".to_string(),
            ..Default::default()
        };

        let error = orchestrator(&mock).await.run(&options, &to(&["Dev"])).await.unwrap_err();

        assert!(matches!(error, ApiError::NotFound(_)));
        assert_eq!(mock.calls(HttpMethod::Post, RELEASES), 0);
    }

    #[tokio::test]
    async fn test_one_failed_environment_of_three() {
        let mock = release_mock();
        mock.respond_when_body_contains(HttpMethod::Post, DEPLOYMENTS, "Environments-1", 201, deployment("Deployments-1", "Environments-1", "ServerTasks-1"));
        mock.respond_when_body_contains(
            HttpMethod::Post,
            DEPLOYMENTS,
            "Environments-2",
            400,
            json!({"ErrorMessage": "Lifecycle does not allow Test yet", "Errors": []}),
        );
        mock.respond_when_body_contains(HttpMethod::Post, DEPLOYMENTS, "Environments-3", 201, deployment("Deployments-3", "Environments-3", "ServerTasks-3"));

        let outcome = orchestrator(&mock)
            .await
            .run(&project_only(), &to(&["Environments-1", "Environments-2", "Environments-3"]))
            .await
            .unwrap();

        let targets: Vec<_> = outcome.deployments.iter().map(|d| d.target.environment.as_str()).collect();
        assert_eq!(targets, vec!["Dev", "Test", "Prod"]);
        let succeeded: Vec<_> = outcome.deployments.iter().map(DeploymentOutcome::succeeded).collect();
        assert_eq!(succeeded, vec![true, false, true]);
        assert_eq!(outcome.failed_count(), 1);
        assert!(matches!(outcome.deployments[1].error(), Some(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_schedule_round_trips_exactly() {
        let mock = release_mock();
        mock.handle(HttpMethod::Post, DEPLOYMENTS, |request| {
            let sent = match &request.body {
                Some(RequestBody::Json(value)) => value.clone(),
                _ => json!({}),
            };
            let mut reply = deployment("Deployments-1", "Environments-1", "ServerTasks-1");
            reply["QueueTime"] = sent["QueueTime"].clone();
            reply["QueueTimeExpiry"] = sent["QueueTimeExpiry"].clone();
            (201, reply.to_string())
        });
        let queue_time = Utc.with_ymd_and_hms(2026, 2, 1, 22, 0, 0).unwrap();
        let expiry = Utc.with_ymd_and_hms(2026, 2, 2, 22, 0, 0).unwrap();
        let options = DeployOptions {
            queue_time: Some(queue_time),
            queue_time_expiry: Some(expiry),
            ..to(&["Environments-1"])
        };

        let outcome = orchestrator(&mock).await.run(&project_only(), &options).await.unwrap();

        let body = &mock.bodies(HttpMethod::Post, DEPLOYMENTS)[0];
        let sent_start: DateTime<Utc> = serde_json::from_value(body["QueueTime"].clone()).unwrap();
        let sent_expiry: DateTime<Utc> = serde_json::from_value(body["QueueTimeExpiry"].clone()).unwrap();
        assert_eq!(sent_start, queue_time);
        assert_eq!(sent_expiry, expiry);

        let created = outcome.deployments[0].deployment.as_ref().unwrap();
        assert_eq!(created.queue_time, Some(queue_time));
        assert_eq!(created.queue_time_expiry, Some(expiry));
    }

    #[tokio::test]
    async fn test_waiting_stops_when_schedule_expires() {
        let mock = release_mock();
        let expiry = Utc.with_ymd_and_hms(2026, 2, 2, 22, 0, 0).unwrap();
        let mut created = deployment("Deployments-1", "Environments-1", "ServerTasks-1");
        created["QueueTimeExpiry"] = json!(expiry);
        mock.respond_json(HttpMethod::Post, DEPLOYMENTS, 201, created);
        let mut queued = task("ServerTasks-1", "Queued");
        queued["QueueTimeExpiry"] = json!(expiry);
        mock.respond_json(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1", 200, queued);
        let options = DeployOptions {
            queue_time_expiry: Some(expiry),
            queue_time: Some(expiry - chrono::Duration::days(1)),
            wait_for_deployment: true,
            ..to(&["Environments-1"])
        };

        let outcome = orchestrator(&mock)
            .await
            .with_clock(Arc::new(FixedClock(expiry + chrono::Duration::minutes(1))))
            .run(&project_only(), &options)
            .await
            .unwrap();

        let completion = outcome.deployments[0].completion.as_ref().unwrap();
        assert!(matches!(completion, Err(ApiError::ScheduleExpired { expiry: e, .. }) if *e == expiry));
        assert_eq!(outcome.failed_count(), 1);
        assert_eq!(mock.calls(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1"), 1);
    }

    #[tokio::test]
    async fn test_cancellation_while_waiting_cancels_the_task() {
        let mock = release_mock();
        mock.respond_json(HttpMethod::Post, DEPLOYMENTS, 201, deployment("Deployments-1", "Environments-1", "ServerTasks-1"));
        mock.respond_json(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1", 200, task("ServerTasks-1", "Executing"));
        mock.respond(HttpMethod::Post, "/api/Spaces-1/tasks/ServerTasks-1/cancel", 200, "");
        let token = CancellationToken::new();
        let options = DeployOptions {
            wait_for_deployment: true,
            ..to(&["Environments-1"])
        };

        let outcome = orchestrator(&mock)
            .await
            .with_cancellation(token.clone())
            .with_sleeper(Arc::new(CancellingSleeper(token.clone())))
            .run(&project_only(), &options)
            .await
            .unwrap();

        assert!(token.is_cancelled());
        assert!(matches!(outcome.deployments[0].completion, Some(Err(ApiError::Cancelled))));
        assert!(!outcome.all_succeeded());
        assert_eq!(mock.calls(HttpMethod::Post, "/api/Spaces-1/tasks/ServerTasks-1/cancel"), 1);
    }

    #[tokio::test]
    async fn test_prompted_variables_become_form_values() {
        let mock = release_mock();
        mock.respond_json(
            HttpMethod::Get,
            "/api/Spaces-1/releases/Releases-1/deployments/preview/Environments-1",
            200,
            json!({
                "Form": {
                    "Values": {},
                    "Elements": [{
                        "Name": "6a1c0d7e-0000-4000-8000-000000000001",
                        "Control": {"Name": "Name", "Label": "Your name", "Required": true},
                        "IsValueRequired": true
                    }]
                }
            }),
        );
        mock.respond_json(HttpMethod::Post, DEPLOYMENTS, 201, deployment("Deployments-1", "Environments-1", "ServerTasks-1"));
        let options = DeployOptions {
            variables: vec![PromptedVariable::new("Name", "John")],
            ..to(&["Environments-1"])
        };

        orchestrator(&mock).await.run(&project_only(), &options).await.unwrap();

        let body = &mock.bodies(HttpMethod::Post, DEPLOYMENTS)[0];
        assert_eq!(body["FormValues"], json!({"6a1c0d7e-0000-4000-8000-000000000001": "John"}));
    }

    #[tokio::test]
    async fn test_waits_for_deployments() {
        let mock = release_mock();
        mock.respond_when_body_contains(HttpMethod::Post, DEPLOYMENTS, "Environments-1", 201, deployment("Deployments-1", "Environments-1", "ServerTasks-1"));
        mock.respond_when_body_contains(HttpMethod::Post, DEPLOYMENTS, "Environments-2", 201, deployment("Deployments-2", "Environments-2", "ServerTasks-2"));
        mock.respond_json(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1", 200, task("ServerTasks-1", "Executing"));
        mock.respond_json(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1", 200, task("ServerTasks-1", "Success"));
        mock.respond_json(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-2", 200, task("ServerTasks-2", "Failed"));
        let options = DeployOptions {
            wait_for_deployment: true,
            ..to(&["Environments-1", "Environments-2"])
        };

        let outcome = orchestrator(&mock).await.run(&project_only(), &options).await.unwrap();

        let states: Vec<_> = outcome
            .deployments
            .iter()
            .map(|d| d.completion.as_ref().unwrap().as_ref().unwrap().state)
            .collect();
        assert_eq!(states, vec![crate::api::resources::TaskState::Success, crate::api::resources::TaskState::Failed]);
        assert!(!outcome.all_succeeded());
        assert_eq!(mock.calls(HttpMethod::Get, "/api/Spaces-1/tasks/ServerTasks-1"), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_deploying() {
        let mock = release_mock();
        let token = CancellationToken::new();
        token.cancel();

        let error = orchestrator(&mock)
            .await
            .with_cancellation(token)
            .run(&project_only(), &to(&["Environments-1"]))
            .await
            .unwrap_err();

        assert!(matches!(error, ApiError::Cancelled));
        assert_eq!(mock.calls(HttpMethod::Post, RELEASES), 0);
    }
}
