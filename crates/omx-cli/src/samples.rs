//! Samplesheet preparation: pair FASTQ files from a staging directory and
//! emit one CSV per requested workflow plus the trigger manifest.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use omx_core::error::{OmxError, OmxResult};
use omx_core::model::Manifest;

const FASTQ_SUFFIX: &str = ".fastq.gz";

/// One sample with both mates present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedSample {
    pub sample: String,
    pub forward: String,
    pub reverse: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mate {
    Forward,
    Reverse,
}

/// Split a FASTQ file name into its sample stem and mate. Both the
/// `_R1/_R2` and the `_1/_2` naming conventions are recognized.
fn split_mate(file_name: &str) -> Option<(&str, Mate)> {
    let stem = file_name.strip_suffix(FASTQ_SUFFIX)?;
    for (suffix, mate) in [
        ("_R1", Mate::Forward),
        ("_R2", Mate::Reverse),
        ("_1", Mate::Forward),
        ("_2", Mate::Reverse),
    ] {
        if let Some(sample) = stem.strip_suffix(suffix) {
            if !sample.is_empty() {
                return Some((sample, mate));
            }
        }
    }
    None
}

/// Scan a directory for paired FASTQ files.
///
/// Files without a recognizable mate suffix, and samples missing one mate,
/// are logged and skipped. Output is sorted by sample name.
pub fn pair_fastqs(dir: &Path) -> OmxResult<Vec<PairedSample>> {
    let entries = std::fs::read_dir(dir).map_err(|source| OmxError::ReadFile {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut mates: BTreeMap<String, (Option<String>, Option<String>)> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| OmxError::ReadFile {
            path: dir.to_path_buf(),
            source,
        })?;
        if !entry.path().is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some((sample, mate)) = split_mate(&file_name) else {
            debug!("Ignoring non-FASTQ file {}", file_name);
            continue;
        };
        let slot = mates.entry(sample.to_string()).or_default();
        match mate {
            Mate::Forward => slot.0 = Some(file_name),
            Mate::Reverse => slot.1 = Some(file_name),
        }
    }

    let mut paired = Vec::new();
    for (sample, (forward, reverse)) in mates {
        match (forward, reverse) {
            (Some(forward), Some(reverse)) => paired.push(PairedSample {
                sample,
                forward,
                reverse,
            }),
            (forward, reverse) => {
                let present = forward.or(reverse).unwrap_or_default();
                warn!("Sample {} has no mate for {}, skipping", sample, present);
            }
        }
    }
    Ok(paired)
}

/// Render the samplesheet CSV for one workflow. Each workflow family has
/// its own header vocabulary.
pub fn samplesheet_csv(
    job_type: &str,
    samples: &[PairedSample],
    input_prefix: &str,
) -> OmxResult<String> {
    let prefix = input_prefix.trim_end_matches('/');
    let mut csv = String::new();

    match job_type {
        "mag" | "metatdenovo" => {
            csv.push_str("sample,fastq_1,fastq_2\n");
            for s in samples {
                csv.push_str(&format!(
                    "{},{prefix}/{},{prefix}/{}\n",
                    s.sample, s.forward, s.reverse
                ));
            }
        }
        "rnaseq" => {
            csv.push_str("sample,fastq_1,fastq_2,strandedness\n");
            for s in samples {
                csv.push_str(&format!(
                    "{},{prefix}/{},{prefix}/{},auto\n",
                    s.sample, s.forward, s.reverse
                ));
            }
        }
        "ampliseq" => {
            csv.push_str("sampleID,forwardReads,reverseReads\n");
            for s in samples {
                csv.push_str(&format!(
                    "{},{prefix}/{},{prefix}/{}\n",
                    s.sample, s.forward, s.reverse
                ));
            }
        }
        other => {
            return Err(OmxError::Configuration {
                job_type: other.to_string(),
                reason: "no samplesheet vocabulary for this workflow".to_string(),
            })
        }
    }
    Ok(csv)
}

/// Pair the staged FASTQ files, write one samplesheet per workflow into
/// `out_dir`, and write the trigger manifest next to them.
pub fn write_batch(
    samples_dir: &Path,
    out_dir: &Path,
    workflows: &[String],
    input_prefix: &str,
    run_label: &str,
) -> OmxResult<Manifest> {
    let samples = pair_fastqs(samples_dir)?;
    info!(
        "Paired {} samples from {} for {} workflows",
        samples.len(),
        samples_dir.display(),
        workflows.len()
    );

    let prefix = input_prefix.trim_end_matches('/');
    let mut samplesheets = IndexMap::new();
    for workflow in workflows {
        let csv = samplesheet_csv(workflow, &samples, input_prefix)?;
        let csv_name = Manifest::samplesheet_key(workflow);
        let csv_path = out_dir.join(&csv_name);
        std::fs::write(&csv_path, csv).map_err(|source| OmxError::WriteFile {
            path: csv_path.clone(),
            source,
        })?;
        samplesheets.insert(csv_name.clone(), format!("{prefix}/{csv_name}"));
    }

    let manifest = Manifest {
        run_label: run_label.to_string(),
        timestamp: Some(Utc::now()),
        workflows: workflows.to_vec(),
        samplesheets,
        parameters: IndexMap::new(),
    };

    let manifest_path = out_dir.join(Manifest::FILE_NAME);
    let raw = serde_json::to_string_pretty(&manifest).map_err(|source| OmxError::JsonParse {
        path: manifest_path.clone(),
        source,
    })?;
    std::fs::write(&manifest_path, raw).map_err(|source| OmxError::WriteFile {
        path: manifest_path.clone(),
        source,
    })?;
    info!("Wrote trigger manifest to {}", manifest_path.display());

    Ok(manifest)
}
