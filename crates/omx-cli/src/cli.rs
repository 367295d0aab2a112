use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "omx", about = "Batch genomics workflow fan-out orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Base URL of the job-control API
    #[arg(long, default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Bearer token for the job-control API
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Pair FASTQ files and write per-workflow samplesheets plus the
    /// trigger manifest
    Samplesheet {
        /// Directory containing paired *.fastq.gz files
        #[arg(long)]
        samples_dir: PathBuf,

        /// URI prefix under which the FASTQs and samplesheets are staged
        #[arg(long)]
        input_prefix: String,

        /// Comma-separated workflow names (e.g. mag,rnaseq)
        #[arg(long, value_delimiter = ',')]
        workflows: Vec<String>,

        /// Directory to write the samplesheets and manifest into
        #[arg(long)]
        out_dir: PathBuf,

        /// Batch label for this run
        #[arg(long)]
        run_label: String,
    },

    /// Resolve a trigger manifest and launch the matching workflows
    Launch {
        /// Path to the trigger manifest (run_manifest.json)
        #[arg(long)]
        manifest: PathBuf,

        /// Workflow registry file (YAML or JSON)
        #[arg(long)]
        registry: PathBuf,

        /// Prefix under which per-workflow output directories are created
        #[arg(long)]
        output_prefix: String,

        /// Where to write the run-state file
        #[arg(long)]
        state_out: PathBuf,
    },

    /// Query every launched run once and print the aggregate as JSON
    Poll {
        /// Run-state file written by launch
        #[arg(long)]
        state: PathBuf,
    },

    /// Poll until every run is terminal, then publish the report
    Watch {
        /// Run-state file written by launch
        #[arg(long)]
        state: PathBuf,

        /// Seconds between poll cycles
        #[arg(long)]
        interval: Option<f64>,

        /// Poll cycle budget before the run is declared failed
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Webhook URL notifications are published to
        #[arg(long)]
        topic_url: String,
    },

    /// Poll once and publish the report unconditionally
    Notify {
        /// Run-state file written by launch
        #[arg(long)]
        state: PathBuf,

        /// Webhook URL notifications are published to
        #[arg(long)]
        topic_url: String,
    },

    /// Provision workflow definitions and emit the matching registry
    Register {
        /// Comma-separated name:version workflow specs (e.g. mag:3.0.0)
        #[arg(long, value_delimiter = ',')]
        workflows: Vec<String>,

        /// URI prefix of the workflow definition bundles
        #[arg(long)]
        bundle_prefix: String,

        /// Run storage to request per workflow, in GiB
        #[arg(long, default_value_t = 1200)]
        storage_capacity: u32,

        /// Execution role every registry entry carries
        #[arg(long)]
        execution_role: String,

        /// Resource group every registry entry carries
        #[arg(long)]
        resource_group: String,

        /// Registry YAML output path; prints to stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
    },
}
