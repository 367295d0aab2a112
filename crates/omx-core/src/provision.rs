//! Workflow catalog provisioning: upsert of workflow definitions and the
//! registry entries derived from them.
//!
//! Runs ahead of orchestration, not during it. All catalog calls go through
//! the `WorkflowCatalog` seam so provisioning stays provider-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{OmxError, OmxResult};
use crate::model::RegistryEntry;

/// A `name:version` workflow request, parsed from CLI or config input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSpec {
    pub name: String,
    pub version: String,
}

impl WorkflowSpec {
    /// Parse `name:version`. Both parts must be non-empty.
    pub fn parse(raw: &str) -> OmxResult<Self> {
        let (name, version) = raw.split_once(':').ok_or_else(|| OmxError::Configuration {
            job_type: raw.to_string(),
            reason: "expected name:version".to_string(),
        })?;
        if name.is_empty() || version.is_empty() {
            return Err(OmxError::Configuration {
                job_type: raw.to_string(),
                reason: "workflow name and version must be non-empty".to_string(),
            });
        }
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Catalog-facing name. Version dots become dashes so the name stays
    /// valid in catalogs that reject dots.
    pub fn catalog_name(&self) -> String {
        format!("nfcore-{}-{}", self.name, self.version.replace('.', "-"))
    }

    /// Where the definition bundle for this workflow lives.
    pub fn bundle_locator(&self, bundle_prefix: &str) -> String {
        format!(
            "{}/{}/nf-core-{}_{}.zip",
            bundle_prefix.trim_end_matches('/'),
            self.name,
            self.name,
            self.version
        )
    }
}

/// One workflow definition as the catalog reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogWorkflow {
    pub id: String,
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    pub definition_locator: String,
    pub description: String,
    pub storage_capacity_gib: u32,
}

#[async_trait]
pub trait WorkflowCatalog: Send + Sync {
    async fn list_workflows(&self, name_filter: &str) -> anyhow::Result<Vec<CatalogWorkflow>>;

    async fn create_workflow(
        &self,
        request: &CreateWorkflowRequest,
    ) -> anyhow::Result<CatalogWorkflow>;

    async fn delete_workflow(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct ProvisionOptions {
    pub bundle_prefix: String,
    pub storage_capacity_gib: u32,
}

/// Outcome of one upsert: the catalog record plus whether this call
/// created it.
#[derive(Debug, Clone)]
pub struct ProvisionedWorkflow {
    pub spec: WorkflowSpec,
    pub workflow: CatalogWorkflow,
    pub created: bool,
}

/// Upsert every requested workflow definition into the catalog.
///
/// Lookup precedes creation, so re-running provisioning over an already
/// populated catalog is a no-op. A failure for one spec is logged and the
/// rest still run; the call errors at the end if anything failed.
pub async fn ensure_workflows(
    specs: &[WorkflowSpec],
    catalog: &dyn WorkflowCatalog,
    options: &ProvisionOptions,
) -> OmxResult<Vec<ProvisionedWorkflow>> {
    let mut provisioned = Vec::new();
    let mut failed: Vec<String> = Vec::new();

    for spec in specs {
        match ensure_one(spec, catalog, options).await {
            Ok(workflow) => provisioned.push(workflow),
            Err(e) => {
                warn!("Provisioning {} failed: {:#}", spec.catalog_name(), e);
                failed.push(spec.catalog_name());
            }
        }
    }

    if !failed.is_empty() {
        return Err(OmxError::Provisioning(format!(
            "failed to provision: {}",
            failed.join(", ")
        )));
    }
    Ok(provisioned)
}

async fn ensure_one(
    spec: &WorkflowSpec,
    catalog: &dyn WorkflowCatalog,
    options: &ProvisionOptions,
) -> anyhow::Result<ProvisionedWorkflow> {
    let catalog_name = spec.catalog_name();

    let existing = catalog.list_workflows(&catalog_name).await?;
    if let Some(workflow) = existing.into_iter().next() {
        debug!("Workflow {} already in catalog as {}", catalog_name, workflow.id);
        return Ok(ProvisionedWorkflow {
            spec: spec.clone(),
            workflow,
            created: false,
        });
    }

    let request = CreateWorkflowRequest {
        name: catalog_name.clone(),
        definition_locator: spec.bundle_locator(&options.bundle_prefix),
        description: format!("nf-core/{} version {}", spec.name, spec.version),
        storage_capacity_gib: options.storage_capacity_gib,
    };
    let workflow = catalog.create_workflow(&request).await?;
    info!("Created workflow {} as {}", catalog_name, workflow.id);
    Ok(ProvisionedWorkflow {
        spec: spec.clone(),
        workflow,
        created: true,
    })
}

/// Delete the catalog entries for the given specs. Missing entries are
/// skipped; deletion failures are collected and reported together.
pub async fn remove_workflows(
    specs: &[WorkflowSpec],
    catalog: &dyn WorkflowCatalog,
) -> OmxResult<()> {
    let mut failed: Vec<String> = Vec::new();

    for spec in specs {
        let catalog_name = spec.catalog_name();
        let listed = match catalog.list_workflows(&catalog_name).await {
            Ok(listed) => listed,
            Err(e) => {
                warn!("Listing {} for removal failed: {:#}", catalog_name, e);
                failed.push(catalog_name);
                continue;
            }
        };
        for workflow in listed {
            if let Err(e) = catalog.delete_workflow(&workflow.id).await {
                warn!("Deleting workflow {} failed: {:#}", workflow.id, e);
                failed.push(catalog_name.clone());
            } else {
                info!("Deleted workflow {} ({})", catalog_name, workflow.id);
            }
        }
    }

    if !failed.is_empty() {
        return Err(OmxError::Provisioning(format!(
            "failed to remove: {}",
            failed.join(", ")
        )));
    }
    Ok(())
}

/// Identity every registry entry built from the catalog must carry.
#[derive(Debug, Clone)]
pub struct RegistryRoles {
    pub execution_role: String,
    pub resource_group: String,
}

/// Retry schedule for registry population. Catalog listings can lag behind
/// workflow creation, so absence is retried before it becomes an error.
#[derive(Debug, Clone)]
pub struct PopulateConfig {
    pub initial_delay_secs: f64,
    pub backoff_factor: f64,
    pub max_delay_secs: f64,
    pub max_attempts: u32,
}

impl Default for PopulateConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: 3.0,
            backoff_factor: 1.5,
            max_delay_secs: 20.0,
            max_attempts: 10,
        }
    }
}

/// Build registry entries by matching the requested specs against the
/// catalog listing.
///
/// Specs not yet listed are retried on the `PopulateConfig` schedule;
/// exhaustion errors naming whichever specs never appeared. Output order
/// follows the input order.
pub async fn populate_registry(
    specs: &[WorkflowSpec],
    catalog: &dyn WorkflowCatalog,
    roles: &RegistryRoles,
    config: &PopulateConfig,
) -> OmxResult<Vec<(String, RegistryEntry)>> {
    let mut found: Vec<Option<RegistryEntry>> = vec![None; specs.len()];
    let mut delay = config.initial_delay_secs.max(0.0);

    for attempt in 1..=config.max_attempts.max(1) {
        for (spec, slot) in specs.iter().zip(found.iter_mut()) {
            if slot.is_some() {
                continue;
            }
            let catalog_name = spec.catalog_name();
            let listed = catalog
                .list_workflows(&catalog_name)
                .await
                .map_err(|e| OmxError::Provisioning(format!("catalog listing failed: {e:#}")))?;
            if let Some(workflow) = listed.into_iter().next() {
                debug!("Registry entry for {} resolved to {}", spec.name, workflow.arn);
                *slot = Some(RegistryEntry {
                    job_definition_ref: workflow.arn,
                    execution_role: roles.execution_role.clone(),
                    resource_group: roles.resource_group.clone(),
                    version: Some(spec.version.clone()),
                });
            }
        }

        if found.iter().all(Option::is_some) {
            break;
        }
        if attempt == config.max_attempts.max(1) {
            break;
        }

        debug!(
            "Attempt {} left entries unresolved, retrying in {:.1}s",
            attempt, delay
        );
        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
        delay = (delay * config.backoff_factor).min(config.max_delay_secs);
    }

    let missing: Vec<String> = specs
        .iter()
        .zip(found.iter())
        .filter(|(_, slot)| slot.is_none())
        .map(|(spec, _)| spec.catalog_name())
        .collect();
    if !missing.is_empty() {
        return Err(OmxError::Provisioning(format!(
            "workflows never appeared in the catalog: {}",
            missing.join(", ")
        )));
    }

    Ok(specs
        .iter()
        .zip(found)
        .filter_map(|(spec, slot)| slot.map(|entry| (spec.name.clone(), entry)))
        .collect())
}
