mod ratelimit;
pub mod renderer;

use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub use ratelimit::RendererGate;
use ratelimit::DomainLimiter;

use crate::app::App;
use crate::store::{run_blocking, BlockingError, ContentSource, ContentStatus, MAX_ATTEMPTS};
use renderer::RenderOutcome;

const IDLE_POLL: Duration = Duration::from_secs(5);
const STUCK_JOB_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Spawns the fixed extraction worker pool. Worker 0 additionally owns periodic
/// stuck-job cleanup while idle; all workers share one [`DomainLimiter`] and the app-wide
/// [`RendererGate`].
pub fn spawn_workers(app: App, cancel: CancellationToken) -> Vec<tokio::task::JoinHandle<()>> {
    let domain_limiter = std::sync::Arc::new(DomainLimiter::new());

    if let Err(err) = app.store.cleanup_stuck_jobs() {
        tracing::error!(?err, "startup stuck-job cleanup failed");
    }

    (0..app.config.content_workers)
        .map(|idx| {
            let app = app.clone();
            let domain_limiter = domain_limiter.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { worker_loop(idx, app, domain_limiter, cancel).await })
        })
        .collect()
}

#[tracing::instrument(skip(app, domain_limiter, cancel), fields(worker = idx))]
async fn worker_loop(
    idx: usize,
    app: App,
    domain_limiter: std::sync::Arc<DomainLimiter>,
    cancel: CancellationToken,
) {
    let mut idle_elapsed = Duration::ZERO;

    loop {
        if cancel.is_cancelled() {
            return;
        }

        if let Some(wait) = app.renderer_gate.gate_wait(crate::store::now()) {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = cancel.cancelled() => return,
            }
            continue;
        }

        let claim = tokio::task::spawn_blocking({
            let store = app.store.clone();
            move || store.claim_job()
        })
        .await;

        let claimed = match claim {
            Ok(Ok(claimed)) => claimed,
            Ok(Err(err)) => {
                tracing::error!(?err, "claim_job failed");
                None
            }
            Err(err) => {
                tracing::error!(?err, "claim_job task panicked");
                None
            }
        };

        let Some(job) = claimed else {
            if idx == 0 {
                idle_elapsed += IDLE_POLL;
                if idle_elapsed >= STUCK_JOB_SWEEP_INTERVAL {
                    idle_elapsed = Duration::ZERO;
                    match run_blocking(&app.store, |store| store.cleanup_stuck_jobs()).await {
                        Ok(n) if n > 0 => tracing::info!(cleaned = n, "stuck-job cleanup"),
                        Ok(_) => {}
                        Err(err) => tracing::error!(?err, "stuck-job cleanup failed"),
                    }
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(IDLE_POLL) => {}
                _ = cancel.cancelled() => return,
            }
            continue;
        };

        idle_elapsed = Duration::ZERO;

        if let Err(err) = process_job(&app, &domain_limiter, &job).await {
            tracing::error!(?err, story_id = job.id, "failed to process job");
            let attempts = job.attempts;
            let outcome_status = if attempts >= MAX_ATTEMPTS {
                ContentStatus::Failed
            } else {
                ContentStatus::Retry
            };
            let _ = run_blocking(&app.store, move |store| {
                store.finalize_status(job.id, outcome_status, None)
            })
            .await;
        }
    }
}

async fn process_job(
    app: &App,
    domain_limiter: &DomainLimiter,
    job: &crate::store::ClaimedJob,
) -> Result<(), BlockingError> {
    if let Some(cached) = run_blocking(&app.store, {
        let url = job.url.clone();
        move |store| store.get_cached_content(&url)
    })
    .await?
    {
        run_blocking(&app.store, {
            let id = job.id;
            move |store| store.finalize_from_cache(id, &cached.content, ContentSource::Cache, 0)
        })
        .await?;
        tracing::info!(story_id = job.id, url = %job.url, "served from url cache");
        return Ok(());
    }

    domain_limiter.wait(&job.domain).await;

    let Some(creds) = app.config.renderer.as_ref() else {
        tracing::warn!("renderer not configured; marking job retry");
        run_blocking(&app.store, {
            let id = job.id;
            let attempts = job.attempts;
            move |store| {
                let status = if attempts >= MAX_ATTEMPTS {
                    ContentStatus::Failed
                } else {
                    ContentStatus::Retry
                };
                store.finalize_status(id, status, None)
            }
        })
        .await?;
        return Ok(());
    };

    let outcome = renderer::render(&app.http, creds, &job.url, app.config.browser_timeout).await;

    match outcome {
        RenderOutcome::Success { content, billed_ms } => {
            run_blocking(&app.store, {
                let id = job.id;
                let url = job.url.clone();
                move |store| {
                    store.finalize_done(id, &content, ContentSource::Renderer, billed_ms)?;
                    let compressed = crate::store::compress_text(&content);
                    store.put_cached_content(&url, &compressed, ContentSource::Renderer.as_str(), billed_ms)?;
                    store.log_usage(id, &url, billed_ms, ContentSource::Renderer.as_str())
                }
            })
            .await?;
        }
        RenderOutcome::Blocked { content, billed_ms } => {
            let attempts = job.attempts;
            let terminal = attempts >= MAX_ATTEMPTS;
            run_blocking(&app.store, {
                let id = job.id;
                let url = job.url.clone();
                move |store| {
                    if terminal {
                        store.finalize_status(id, ContentStatus::Blocked, Some(&content))?;
                        if billed_ms > 0 {
                            store.log_usage(id, &url, billed_ms, "blocked")?;
                        }
                    } else {
                        store.add_billed_ms(id, billed_ms)?;
                        store.finalize_status(id, ContentStatus::Retry, None)?;
                    }
                    Ok(())
                }
            })
            .await?;
        }
        RenderOutcome::Empty | RenderOutcome::ServerError | RenderOutcome::Timeout => {
            finalize_transient_failure(app, job).await?;
        }
        RenderOutcome::Failed(reason) => {
            tracing::warn!(story_id = job.id, %reason, "renderer call failed");
            finalize_transient_failure(app, job).await?;
        }
        RenderOutcome::QuotaExceeded => {
            let until = next_utc_midnight();
            app.renderer_gate.set_quota_exceeded_until(until);
            run_blocking(&app.store, {
                let id = job.id;
                move |store| store.finalize_status(id, ContentStatus::Retry, None)
            })
            .await?;
        }
        RenderOutcome::RateLimited { retry_after_secs } => {
            app.renderer_gate
                .set_rate_limited_until(crate::store::now() + retry_after_secs);
            run_blocking(&app.store, {
                let id = job.id;
                move |store| store.finalize_status(id, ContentStatus::Retry, None)
            })
            .await?;
        }
    }

    Ok(())
}

async fn finalize_transient_failure(app: &App, job: &crate::store::ClaimedJob) -> Result<(), BlockingError> {
    let attempts = job.attempts;
    let terminal = attempts >= MAX_ATTEMPTS;
    run_blocking(&app.store, {
        let id = job.id;
        move |store| {
            let status = if terminal { ContentStatus::Failed } else { ContentStatus::Retry };
            store.finalize_status(id, status, None)
        }
    })
    .await?;
    Ok(())
}

fn next_utc_midnight() -> i64 {
    let now = chrono::Utc::now();
    let tomorrow = now.date_naive().succ_opt().unwrap_or(now.date_naive());
    tomorrow.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
}
