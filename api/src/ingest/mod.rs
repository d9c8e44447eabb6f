mod hn_firebase;
mod hn_search;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use hn_firebase::fetch_top_story_ids;

use crate::app::App;

const DEFAULT_LOOKBACK_HOURS: i64 = 80;

#[derive(thiserror::Error, Debug)]
pub enum IngestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Store(#[from] crate::store::BlockingError),
}

pub fn spawn_ingestor(app: App, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move { run_loop(app, cancel).await })
}

/// Runs immediately on startup, then every `fetch_interval`, aligned to the wall-clock interval
/// boundary so runs land at e.g. the top of the hour regardless of process start time.
#[tracing::instrument(skip(app, cancel))]
async fn run_loop(app: App, cancel: CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        match trigger_ingest(&app).await {
            Ok(TriggerResult::Ran(count)) if count > 0 => tracing::info!(count, "ingested stories"),
            Ok(TriggerResult::Ran(_)) => {}
            Ok(TriggerResult::AlreadyInProgress) => {
                tracing::debug!("ingestion already in progress, skipping scheduled pass");
            }
            Err(err) => tracing::error!(?err, "ingestion pass failed"),
        }

        let wait = next_aligned_wait(app.config.fetch_interval);
        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            _ = cancel.cancelled() => return,
        }
    }
}

fn next_aligned_wait(interval: Duration) -> Duration {
    let interval_secs = interval.as_secs().max(1);
    let now = crate::store::now().max(0) as u64;
    let remainder = now % interval_secs;
    let wait_secs = if remainder == 0 { interval_secs } else { interval_secs - remainder };
    Duration::from_secs(wait_secs)
}

/// Outcome of [`trigger_ingest`]: either it ran and ingested `usize` stories, or it found an
/// ingestion pass already in flight and skipped.
pub enum TriggerResult {
    Ran(usize),
    AlreadyInProgress,
}

/// Runs one ingestion pass behind `App::ingest_in_progress`, so the periodic loop and
/// `POST /api/fetch` never overlap. The caller decides what "already in progress" means for its
/// caller (silently skip for the loop, a 409 for the API).
pub async fn trigger_ingest(app: &App) -> Result<TriggerResult, IngestError> {
    {
        let mut in_progress = app.ingest_in_progress.lock().await;
        if *in_progress {
            return Ok(TriggerResult::AlreadyInProgress);
        }
        *in_progress = true;
    }

    let result = run_once(app).await;

    {
        let mut in_progress = app.ingest_in_progress.lock().await;
        *in_progress = false;
    }

    result.map(TriggerResult::Ran)
}

/// One ingestion pass: derive the checkpoint, fetch new stories (Algolia primary, Firebase
/// fallback), and upsert them. Returns the number of stories upserted. Callers that need the
/// overlap guard should go through [`trigger_ingest`] instead of calling this directly.
async fn run_once(app: &App) -> Result<usize, IngestError> {
    let since = crate::store::run_blocking(&app.store, |store| store.checkpoint()).await?;
    let since = since.unwrap_or_else(|| crate::store::now() - DEFAULT_LOOKBACK_HOURS * 3600);

    let stories = match hn_search::fetch_since(&app.http, since).await {
        Ok(stories) => stories,
        Err(err) => {
            tracing::warn!(?err, "algolia search failed on first request, falling back to firebase");
            hn_firebase::fetch_new_stories_since(&app.http, since).await?
        }
    };

    let count = stories.len();
    if count == 0 {
        return Ok(0);
    }

    crate::store::run_blocking(&app.store, move |store| {
        for story in stories {
            store.upsert_story(story)?;
        }
        Ok(())
    })
    .await?;

    Ok(count)
}
