mod cli;
mod commands;
mod samples;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use omx_core::config::WatchConfig;
use omx_core::provision::RegistryRoles;
use omx_client::{HttpRunService, HttpWorkflowCatalog, WebhookNotifier};

use cli::{Cli, Commands};

fn run_service(cli: &Cli) -> Arc<HttpRunService> {
    let mut service = HttpRunService::new(cli.api_url.clone());
    if let Some(token) = &cli.token {
        service = service.with_token(token.clone());
    }
    Arc::new(service)
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match &cli.command {
        Commands::Samplesheet {
            samples_dir,
            input_prefix,
            workflows,
            out_dir,
            run_label,
        } => {
            commands::samplesheet(samples_dir, input_prefix, workflows, out_dir, run_label)?;
        }

        Commands::Launch {
            manifest,
            registry,
            output_prefix,
            state_out,
        } => {
            commands::launch(run_service(&cli), manifest, registry, output_prefix, state_out)
                .await?;
        }

        Commands::Poll { state } => {
            commands::poll(run_service(&cli), state).await?;
        }

        Commands::Watch {
            state,
            interval,
            max_cycles,
            topic_url,
        } => {
            let mut config = WatchConfig::default();
            if let Some(interval) = interval {
                config.poll_interval_secs = *interval;
            }
            if let Some(max_cycles) = max_cycles {
                config.max_cycles = *max_cycles;
            }
            let mut notifier = WebhookNotifier::new(topic_url.clone());
            if let Some(token) = &cli.token {
                notifier = notifier.with_token(token.clone());
            }
            commands::watch(run_service(&cli), &notifier, state, &config).await?;
        }

        Commands::Notify { state, topic_url } => {
            let mut notifier = WebhookNotifier::new(topic_url.clone());
            if let Some(token) = &cli.token {
                notifier = notifier.with_token(token.clone());
            }
            commands::notify(run_service(&cli), &notifier, state).await?;
        }

        Commands::Register {
            workflows,
            bundle_prefix,
            storage_capacity,
            execution_role,
            resource_group,
            out,
        } => {
            let mut catalog = HttpWorkflowCatalog::new(cli.api_url.clone());
            if let Some(token) = &cli.token {
                catalog = catalog.with_token(token.clone());
            }
            let roles = RegistryRoles {
                execution_role: execution_role.clone(),
                resource_group: resource_group.clone(),
            };
            commands::register(
                &catalog,
                workflows,
                bundle_prefix,
                *storage_capacity,
                &roles,
                out.as_deref(),
            )
            .await?;
        }
    }

    Ok(())
}
