//! Periodic refresh loop for `hpcdash watch`.

use hpcdash_parsers::CommandRunner;
use hpcdash_state::{Dashboard, RefreshMode};
use hpcdash_store::StateStore;
use std::future::Future;
use std::time::Duration;
use tokio::signal;
use tokio::time::{MissedTickBehavior, interval};

/// Refresh stale sections every `every` until Ctrl-C.
///
/// Each pass only runs the collectors whose artifacts have aged out, so the
/// module spider (hourly) and sinfo (every few minutes) keep their own pace
/// under one ticker.
pub async fn run<R, S>(dashboard: Dashboard<R, S>, every: Duration)
where
    R: CommandRunner + 'static,
    S: StateStore,
{
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    run_until(dashboard, every, ctrl_c).await;
}

/// Refresh on every tick until `shutdown` completes.
///
/// Shutdown also cancels a refresh that is still in flight; collectors not
/// yet finished leave their previous artifacts in place.
pub async fn run_until<R, S, F>(
    mut dashboard: Dashboard<R, S>,
    every: Duration,
    shutdown: F,
) -> Dashboard<R, S>
where
    R: CommandRunner + 'static,
    S: StateStore,
    F: Future<Output = ()>,
{
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    tracing::info!(interval_secs = every.as_secs(), "Watching for stale sections");

    'watch: loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break 'watch,
            _ = ticker.tick() => {}
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Interrupted during refresh");
                break 'watch;
            }
            result = dashboard.refresh(RefreshMode::IfStale) => match result {
                Ok(sections) if sections.is_empty() => {
                    tracing::debug!("Everything fresh");
                }
                Ok(sections) => {
                    tracing::info!(?sections, "Refreshed");
                }
                Err(e) => {
                    tracing::error!("Error refreshing: {}", e);
                }
            },
        }
    }

    tracing::info!("Shutting down");
    dashboard
}
