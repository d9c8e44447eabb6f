use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::app::App;

const POLL_INTERVAL: Duration = Duration::from_secs(5 * 60);
const FRONT_PAGE_SIZE: usize = 30;

/// Periodic task that annotates stories reaching the HN front page.
pub fn spawn_front_page_tracker(app: App, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { run_loop(app, cancel).await })
}

#[tracing::instrument(skip(app, cancel))]
async fn run_loop(app: App, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        if let Err(err) = run_once(&app).await {
            tracing::warn!(?err, "front-page poll failed");
        }

        tokio::select! {
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

async fn run_once(app: &App) -> Result<(), reqwest::Error> {
    let ids = crate::ingest::fetch_top_story_ids(&app.http).await?;
    let ranked: Vec<(i64, i64)> = ids
        .into_iter()
        .take(FRONT_PAGE_SIZE)
        .enumerate()
        .map(|(idx, id)| (id, idx as i64 + 1))
        .collect();

    let store = app.store.clone();
    let result = tokio::task::spawn_blocking(move || -> rusqlite::Result<()> {
        for (id, rank) in ranked {
            store.mark_front_page(id, rank)?;
        }
        Ok(())
    })
    .await;

    match result {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::error!(?err, "failed to mark front-page rank"),
        Err(err) => tracing::error!(?err, "front-page write task panicked"),
    }

    Ok(())
}
