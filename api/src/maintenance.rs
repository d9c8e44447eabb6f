use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::app::App;

const PASS_INTERVAL: Duration = Duration::from_secs(3600);
const VACUUM_EVERY_N_PASSES: u32 = 24;

/// Retention/maintenance task: runs once on startup, then hourly. Each pass cleans up
/// aged rows and rotates backups; every 24th pass also runs an opportunistic vacuum.
pub fn spawn_maintenance(app: App, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { run_loop(app, cancel).await })
}

#[tracing::instrument(skip(app, cancel))]
async fn run_loop(app: App, cancel: CancellationToken) {
    let mut pass: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        run_once(&app, pass).await;
        pass = pass.wrapping_add(1);

        tokio::select! {
            _ = tokio::time::sleep(PASS_INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

async fn run_once(app: &App, pass: u32) {
    let dismissed_retention_hours = app.config.dismissed_retention_hours;
    let story_retention_days = app.config.story_retention_days;
    let url_cache_retention_days = app.config.url_cache_retention_days;

    let store = app.store.clone();
    let cleanup = tokio::task::spawn_blocking({
        let store = store.clone();
        move || store.cleanup(dismissed_retention_hours, story_retention_days, url_cache_retention_days)
    })
    .await;

    match cleanup {
        Ok(Ok(stats)) => tracing::info!(
            stories = stats.stories_deleted,
            dismissed = stats.dismissed_deleted,
            url_cache = stats.url_cache_deleted,
            "cleanup pass complete"
        ),
        Ok(Err(err)) => tracing::error!(?err, "cleanup pass failed"),
        Err(err) => tracing::error!(?err, "cleanup task panicked"),
    }

    let usage_rollup = tokio::task::spawn_blocking({
        let store = store.clone();
        move || store.aggregate_old_usage()
    })
    .await;
    match usage_rollup {
        Ok(Ok(n)) if n > 0 => tracing::info!(rolled = n, "usage log rolled into monthly summary"),
        Ok(Ok(_)) => {}
        Ok(Err(err)) => tracing::error!(?err, "usage rollup failed"),
        Err(err) => tracing::error!(?err, "usage rollup task panicked"),
    }

    let backups_dir = format!("{}/backups", app.config.data_dir);
    let backup = tokio::task::spawn_blocking({
        let store = store.clone();
        move || store.rotate_backups(&backups_dir)
    })
    .await;
    match backup {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(?err, "backup rotation failed"),
        Err(err) => tracing::error!(?err, "backup rotation task panicked"),
    }

    if pass % VACUUM_EVERY_N_PASSES == 0 {
        let vacuum = tokio::task::spawn_blocking(move || store.vacuum_if_needed()).await;
        match vacuum {
            Ok(Ok(true)) => tracing::info!("opportunistic vacuum ran"),
            Ok(Ok(false)) => {}
            Ok(Err(err)) => tracing::error!(?err, "vacuum failed"),
            Err(err) => tracing::error!(?err, "vacuum task panicked"),
        }
    }
}
