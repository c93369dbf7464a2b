//
//  octopus-client
//  release/targets.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

//! Expands requested environments, tenants and tenant tags into deployment
//! targets.
//!
//! Lookups that fail do not abort planning. The failure is carried on each
//! target it affects so the other targets still deploy.

use std::collections::HashSet;
use std::fmt;

use futures::future::join_all;
use serde::Serialize;
use tracing::debug;

use crate::api::resources::{EnvironmentResource, NamedResource, ProjectResource, TenantResource};
use crate::api::{ApiError, ListArgs, Repository, SpaceContext};

/// One environment, optionally for one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentTarget {
    pub environment: String,
    pub tenant: Option<String>,
}

impl fmt::Display for DeploymentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tenant {
            Some(tenant) => write!(f, "{} for {}", self.environment, tenant),
            None => f.write_str(&self.environment),
        }
    }
}

/// The resources behind a target.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    pub environment: EnvironmentResource,
    pub tenant: Option<TenantResource>,
}

/// A target and the outcome of resolving it.
#[derive(Debug, Clone)]
pub struct TargetPlan {
    pub target: DeploymentTarget,
    pub resolved: Result<ResolvedTarget, ApiError>,
}

/// What to deploy to.
#[derive(Debug, Clone, Copy)]
pub struct TargetRequest<'a> {
    pub environments: &'a [String],
    pub tenants: &'a [String],
    pub tenant_tags: &'a [String],
}

impl TargetRequest<'_> {
    fn is_tenanted(&self) -> bool {
        !self.tenants.is_empty() || !self.tenant_tags.is_empty()
    }
}

/// Plans one target per environment, or per environment and tenant when
/// tenants or tags are given.
///
/// Environments and explicit tenants are resolved concurrently. Tenants
/// matched by tag are deduplicated against explicit ones and skipped for
/// environments they are not connected to for `project`. An environment
/// left without any tenant gets a failed plan.
pub async fn plan_targets(space: &SpaceContext, project: &ProjectResource, request: TargetRequest<'_>) -> Vec<TargetPlan> {
    let (environments, explicit, tagged) = futures::join!(
        resolve_all(space.environments(), request.environments),
        resolve_all(space.tenants(), request.tenants),
        tagged_tenants(space, project, request.tenant_tags),
    );

    let mut plans = Vec::new();
    for (requested, environment) in request.environments.iter().zip(environments) {
        let env_label = label(&environment, requested);

        if !request.is_tenanted() {
            plans.push(TargetPlan {
                target: DeploymentTarget {
                    environment: env_label,
                    tenant: None,
                },
                resolved: environment.map(|environment| ResolvedTarget {
                    environment,
                    tenant: None,
                }),
            });
            continue;
        }

        let planned = plans.len();
        let mut seen = HashSet::new();
        for (requested_tenant, tenant) in request.tenants.iter().zip(&explicit) {
            if let Ok(tenant) = tenant {
                if !seen.insert(tenant.id.clone()) {
                    continue;
                }
            }
            plans.push(TargetPlan {
                target: DeploymentTarget {
                    environment: env_label.clone(),
                    tenant: Some(label(tenant, requested_tenant)),
                },
                resolved: combine(&environment, tenant.clone()),
            });
        }

        match &tagged {
            Err(error) => plans.push(TargetPlan {
                target: DeploymentTarget {
                    environment: env_label.clone(),
                    tenant: Some(format!("tags {}", request.tenant_tags.join(", "))),
                },
                resolved: Err(error.clone()),
            }),
            Ok(tenants) => {
                for tenant in tenants {
                    if !seen.insert(tenant.id.clone()) {
                        continue;
                    }
                    if let Ok(environment) = &environment {
                        if !tenant.is_connected(&project.id, &environment.id) {
                            debug!(
                                "Skipping tenant {}, not connected to {} in {}",
                                tenant.name, project.name, environment.name
                            );
                            continue;
                        }
                    }
                    plans.push(TargetPlan {
                        target: DeploymentTarget {
                            environment: env_label.clone(),
                            tenant: Some(tenant.name.clone()),
                        },
                        resolved: combine(&environment, Ok(tenant.clone())),
                    });
                }
            }
        }

        if plans.len() == planned {
            plans.push(TargetPlan {
                target: DeploymentTarget {
                    environment: env_label.clone(),
                    tenant: Some(format!("tags {}", request.tenant_tags.join(", "))),
                },
                resolved: environment.clone().and_then(|environment| {
                    Err(ApiError::NotFound(format!(
                        "no tenants tagged {} are connected to {} in {}",
                        request.tenant_tags.join(", "),
                        project.name,
                        environment.name
                    )))
                }),
            });
        }
    }
    plans
}

async fn resolve_all<T: NamedResource>(
    repository: Result<Repository<T>, ApiError>,
    names: &[String],
) -> Vec<Result<T, ApiError>> {
    match repository {
        Ok(repository) => join_all(names.iter().map(|name| repository.resolve(name))).await,
        Err(error) => names.iter().map(|_| Err(error.clone())).collect(),
    }
}

async fn tagged_tenants(
    space: &SpaceContext,
    project: &ProjectResource,
    tags: &[String],
) -> Result<Vec<TenantResource>, ApiError> {
    if tags.is_empty() {
        return Ok(Vec::new());
    }
    let args = ListArgs::new()
        .filter("projectId", &project.id)
        .filter_list("tags", tags);
    space.tenants()?.all(&args).await
}

fn combine(
    environment: &Result<EnvironmentResource, ApiError>,
    tenant: Result<TenantResource, ApiError>,
) -> Result<ResolvedTarget, ApiError> {
    let environment = environment.clone()?;
    Ok(ResolvedTarget {
        environment,
        tenant: Some(tenant?),
    })
}

fn label<T: NamedResource>(resolved: &Result<T, ApiError>, requested: &str) -> String {
    match resolved {
        Ok(resource) => resource.name().to_string(),
        Err(_) => requested.to_string(),
    }
}
