use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::store::Store;
use crate::workers::RendererGate;

/// Shared context threaded through Axum state and every background task: a pool/cache/config
/// bundle behind one Clone-able struct handed to the router as state, alongside the rate-limiter
/// and crawl-progress fields a background pipeline needs.
#[derive(Clone)]
pub struct App(Arc<AppInner>);

pub struct AppInner {
    pub store: Store,
    pub http: reqwest::Client,
    pub config: Config,
    pub renderer_gate: RendererGate,
    /// Guards against overlapping ingestion passes, whether triggered by the periodic loop or
    /// `POST /api/fetch`. Mirrors the teacher's `crawl_in_progress` flag.
    pub ingest_in_progress: Mutex<bool>,
}

impl App {
    pub fn new(store: Store, http: reqwest::Client, config: Config) -> Self {
        App(Arc::new(AppInner {
            store,
            http,
            config,
            renderer_gate: RendererGate::new(),
            ingest_in_progress: Mutex::new(false),
        }))
    }
}

impl std::ops::Deref for App {
    type Target = AppInner;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
