//! hpcdash - collect and parse HPC cluster state for a dashboard.

mod output;
mod watch;

use clap::Parser;
use hpcdash_cli::{Args, Command, Settings};
use hpcdash_parsers::TokioRunner;
use hpcdash_state::{Dashboard, RefreshMode, Section};
use hpcdash_store::FsStore;
use miette::{IntoDiagnostic, Result};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

type HostDashboard = Dashboard<TokioRunner, FsStore>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hpcdash=info")),
        )
        .init();

    let settings = Settings::from_args(&args).into_diagnostic()?;
    tracing::debug!(logs_dir = %settings.logs_dir, catalog = %settings.catalog_path, "Loaded settings");
    let mut dashboard = Dashboard::new(TokioRunner, settings.store(), settings.dashboard_config());

    match args.command {
        Command::Refresh { force } => {
            let mode = if force {
                RefreshMode::Force
            } else {
                RefreshMode::IfStale
            };
            let result = dashboard.refresh(mode).await;
            print!("{}", output::render_status(&dashboard));
            let refreshed = result.into_diagnostic()?;
            tracing::info!(sections = refreshed.len(), "Refresh complete");
        }
        Command::Modules(out) => {
            load(&mut dashboard, Section::Modules);
            print!("{}", output::render_modules(dashboard.modules(), out.json)?);
        }
        Command::Partitions(out) => {
            load(&mut dashboard, Section::Partitions);
            print!(
                "{}",
                output::render_partitions(
                    dashboard.partitions(),
                    &dashboard.partition_summary(),
                    dashboard.partition_reference(),
                    dashboard.cluster_load(),
                    out.json,
                )?
            );
        }
        Command::Quotas(out) => {
            load(&mut dashboard, Section::Quota);
            print!("{}", output::render_quotas(dashboard.quotas(), out.json)?);
        }
        Command::Categorize { family, category } => {
            dashboard.categorize(&family, &category).into_diagnostic()?;
            println!("{family} -> {category}");
        }
        Command::Watch { interval } => {
            watch::run(dashboard, Duration::from_secs(interval.max(1))).await;
        }
    }

    Ok(())
}

/// Parse stored artifacts. Unreadable sections are reported and print empty.
fn load(dashboard: &mut HostDashboard, section: Section) {
    if let Err(e) = dashboard.reload() {
        tracing::warn!(error = %e, "Some artifacts could not be read");
    }
    if dashboard.section_status(section).artifact_modified.is_none() {
        tracing::info!(%section, "No data yet, run `hpcdash refresh`");
    }
}
