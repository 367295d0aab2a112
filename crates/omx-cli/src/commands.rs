//! Subcommand implementations. The HTTP clients are built in `main` and
//! injected here through the core trait objects, so every command stays
//! testable against in-process fakes.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use tracing::{info, warn};

use omx_core::config::WatchConfig;
use omx_core::model::{Manifest, RegistryEntry, RunAggregate, RunState};
use omx_core::notify::{render_report, Notifier};
use omx_core::provision::{
    ensure_workflows, populate_registry, PopulateConfig, ProvisionOptions, RegistryRoles,
    WorkflowCatalog, WorkflowSpec,
};
use omx_core::registry::FileRegistry;
use omx_core::service::RunService;
use omx_core::{resolve, Launcher, OmxError, Poller};

pub fn samplesheet(
    samples_dir: &Path,
    input_prefix: &str,
    workflows: &[String],
    out_dir: &Path,
    run_label: &str,
) -> Result<()> {
    let manifest = crate::samples::write_batch(samples_dir, out_dir, workflows, input_prefix, run_label)?;
    info!(
        "Prepared {} samplesheets for run {}",
        manifest.samplesheets.len(),
        manifest.run_label
    );
    Ok(())
}

pub async fn launch(
    service: Arc<dyn RunService>,
    manifest_path: &Path,
    registry_path: &Path,
    output_prefix: &str,
    state_out: &Path,
) -> Result<()> {
    let manifest = Manifest::from_path(manifest_path)?;
    let registry = FileRegistry::load(registry_path)?;
    let specs = resolve(&manifest, &registry, output_prefix);
    info!(
        "Resolved {} workflows for run {}",
        specs.len(),
        manifest.run_label
    );

    let launcher = Launcher::new(service);
    let launched = launcher.launch(&specs).await?;

    let state = RunState {
        run_label: manifest.run_label.clone(),
        output_locator: format!(
            "{}/{}/",
            output_prefix.trim_end_matches('/'),
            manifest.run_label
        ),
        launched,
    };
    state.save(state_out)?;
    info!(
        "Launched {} workflows, run state written to {}",
        state.launched.len(),
        state_out.display()
    );
    Ok(())
}

pub async fn poll_once(
    service: Arc<dyn RunService>,
    state_path: &Path,
) -> Result<RunAggregate> {
    let state = RunState::load(state_path)?;
    let poller = Poller::new(service);
    Ok(poller.poll(&state.run_label, &state.launched).await)
}

pub async fn poll(service: Arc<dyn RunService>, state_path: &Path) -> Result<()> {
    let aggregate = poll_once(service, state_path).await?;
    let rendered =
        serde_json::to_string_pretty(&aggregate).context("failed to render aggregate as json")?;
    println!("{rendered}");
    Ok(())
}

/// Poll on a fixed interval until every run is terminal or the cycle budget
/// runs out, then publish the report. Budget exhaustion still publishes
/// (the report reads FAILED) and errors afterwards.
pub async fn watch(
    service: Arc<dyn RunService>,
    notifier: &dyn Notifier,
    state_path: &Path,
    config: &WatchConfig,
) -> Result<()> {
    let state = RunState::load(state_path)?;
    let poller = Poller::new(service);
    let max_cycles = config.max_cycles.max(1);

    let mut aggregate = poller.poll(&state.run_label, &state.launched).await;
    for cycle in 1..=max_cycles {
        let terminal = aggregate
            .job_statuses
            .iter()
            .filter(|s| s.state.is_terminal())
            .count();
        info!(
            "Cycle {}/{}: {}/{} workflows terminal",
            cycle,
            max_cycles,
            terminal,
            aggregate.job_statuses.len()
        );
        if aggregate.all_terminal || cycle == max_cycles {
            break;
        }
        tokio::time::sleep(config.poll_interval()).await;
        aggregate = poller.poll(&state.run_label, &state.launched).await;
    }

    let notification = render_report(&aggregate);
    notifier
        .publish(&notification)
        .await
        .map_err(|source| OmxError::Notification { source })?;

    if !aggregate.all_terminal {
        warn!(
            "Run {} still had non-terminal workflows after {} cycles",
            state.run_label, max_cycles
        );
        anyhow::bail!(
            "run {} did not reach a terminal state within {} poll cycles",
            state.run_label,
            max_cycles
        );
    }
    Ok(())
}

pub async fn notify(
    service: Arc<dyn RunService>,
    notifier: &dyn Notifier,
    state_path: &Path,
) -> Result<()> {
    let aggregate = poll_once(service, state_path).await?;
    let notification = render_report(&aggregate);
    notifier
        .publish(&notification)
        .await
        .map_err(|source| OmxError::Notification { source })?;
    info!("Published report for run {}", aggregate.run_label);
    Ok(())
}

pub async fn register(
    catalog: &dyn WorkflowCatalog,
    workflows: &[String],
    bundle_prefix: &str,
    storage_capacity_gib: u32,
    roles: &RegistryRoles,
    out: Option<&Path>,
) -> Result<()> {
    let specs = workflows
        .iter()
        .map(|raw| WorkflowSpec::parse(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let options = ProvisionOptions {
        bundle_prefix: bundle_prefix.to_string(),
        storage_capacity_gib,
    };
    let provisioned = ensure_workflows(&specs, catalog, &options).await?;
    let created = provisioned.iter().filter(|p| p.created).count();
    info!(
        "Catalog holds {} workflows ({} newly created)",
        provisioned.len(),
        created
    );

    let entries = populate_registry(&specs, catalog, roles, &PopulateConfig::default()).await?;
    let registry: IndexMap<String, RegistryEntry> = entries.into_iter().collect();
    let rendered =
        serde_yaml::to_string(&registry).context("failed to render registry as yaml")?;

    match out {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("failed to write registry to {}", path.display()))?;
            info!("Wrote registry for {} workflows to {}", registry.len(), path.display());
        }
        None => print!("{rendered}"),
    }
    Ok(())
}
