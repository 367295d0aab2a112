//! Turns a trigger manifest into the list of jobs to launch.

use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::model::{JobSpec, Manifest};
use crate::registry::WorkflowRegistry;

/// Resolve the manifest against the registry.
///
/// A job type is included iff the manifest carries its samplesheet
/// reference. A samplesheet whose job type is missing from the registry is
/// skipped with a warning; the batch continues. Output order follows the
/// manifest's declaration order, first occurrence wins.
pub fn resolve(
    manifest: &Manifest,
    registry: &dyn WorkflowRegistry,
    output_prefix: &str,
) -> Vec<JobSpec> {
    let mut specs = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for (key, locator) in &manifest.samplesheets {
        let Some(job_type) = job_type_from_key(key) else {
            debug!("Ignoring non-samplesheet manifest entry: {}", key);
            continue;
        };

        if !seen.insert(job_type.to_string()) {
            warn!(
                "Duplicate samplesheet entry for {} in manifest, keeping the first",
                job_type
            );
            continue;
        }

        let Some(entry) = registry.entry(job_type) else {
            warn!(
                "No registry entry for workflow {}, skipping its samplesheet",
                job_type
            );
            continue;
        };

        let output_locator = format!(
            "{}/{}/{}/",
            output_prefix.trim_end_matches('/'),
            manifest.run_label,
            job_type
        );

        let mut extra_parameters = IndexMap::new();
        extra_parameters.insert("input".to_string(), locator.clone());
        extra_parameters.insert("outdir".to_string(), output_locator.clone());
        if let Some(overrides) = manifest.parameters.get(job_type) {
            for (k, v) in overrides {
                extra_parameters.insert(k.clone(), v.clone());
            }
        }

        specs.push(JobSpec {
            job_type: job_type.to_string(),
            run_label: manifest.run_label.clone(),
            input_locator: locator.clone(),
            output_locator,
            extra_parameters,
            job_definition_ref: entry.job_definition_ref,
            execution_role: entry.execution_role,
            resource_group: entry.resource_group,
        });
    }

    for job_type in registry.job_types() {
        if !seen.contains(&job_type) {
            debug!("No samplesheet for workflow {}, skipping", job_type);
        }
    }

    specs
}

fn job_type_from_key(key: &str) -> Option<&str> {
    key.strip_prefix("samplesheet_")?
        .strip_suffix(".csv")
        .filter(|name| !name.is_empty())
}
