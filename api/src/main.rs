mod api;
mod app;
mod auth;
mod config;
mod error;
mod frontpage;
mod ingest;
mod json;
mod maintenance;
mod store;
mod workers;

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use mimalloc::MiMalloc;
use tokio_util::sync::CancellationToken;

use app::App;
use config::Config;
use store::Store;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Personal Hacker News "new stories" browser with asynchronous article-content extraction.
#[derive(Parser, Debug)]
#[command(name = "hn-new")]
struct Cli {
    /// Port the HTTP API listens on.
    #[arg(long, default_value_t = 8000)]
    port: u16,

    /// Bind 0.0.0.0 instead of 127.0.0.1.
    #[arg(long)]
    public: bool,

    /// Wipe stories, URL cache, usage log, dismissed and history, then exit.
    #[arg(long)]
    reset: bool,

    /// Override HN_CONTENT_WORKERS.
    #[arg(long)]
    workers: Option<usize>,

    /// Run the compression migration over legacy uncompressed rows, then exit.
    #[arg(long)]
    migrate_compress: bool,

    /// Run an opportunistic vacuum, then exit.
    #[arg(long)]
    vacuum: bool,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let one_shot = cli.reset || cli.migrate_compress || cli.vacuum;

    let mut config = Config::from_env(!one_shot);
    if let Some(workers) = cli.workers {
        config.content_workers = workers;
    }

    let store = match Store::open(&config.data_dir) {
        Ok(store) => store,
        Err(err) => {
            tracing::error!(?err, "failed to open store");
            std::process::exit(1);
        }
    };

    if cli.reset {
        match store.reset() {
            Ok(()) => {
                tracing::info!("store reset complete");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!(?err, "store reset failed");
                std::process::exit(1);
            }
        }
    }

    if cli.migrate_compress {
        run_migrate_compress(&store);
        std::process::exit(0);
    }

    if cli.vacuum {
        match store.vacuum_if_needed() {
            Ok(ran) => {
                tracing::info!(ran, "vacuum complete");
                std::process::exit(0);
            }
            Err(err) => {
                tracing::error!(?err, "vacuum failed");
                std::process::exit(1);
            }
        }
    }

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .expect("build http client");

    let app = App::new(store, http, config);
    let cancel = CancellationToken::new();

    let mut tasks = Vec::new();
    tasks.push(ingest::spawn_ingestor(app.clone(), cancel.clone()));
    tasks.push(frontpage::spawn_front_page_tracker(app.clone(), cancel.clone()));
    tasks.push(maintenance::spawn_maintenance(app.clone(), cancel.clone()));
    tasks.extend(workers::spawn_workers(app.clone(), cancel.clone()));

    let router = axum::Router::new()
        .nest("/api", api::router())
        .layer(axum::middleware::from_fn_with_state(
            app.clone(),
            auth::require_basic_auth,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(app.clone());

    let bind_addr = if cli.public { [0, 0, 0, 0] } else { [127, 0, 0, 1] };
    let addr = SocketAddr::from((bind_addr, cli.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(?err, %addr, "failed to bind http listener");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "listening");

    let shutdown_cancel = cancel.clone();
    let serve = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown_cancel.cancel();
        });

    if let Err(err) = serve.await {
        tracing::error!(?err, "http server error");
    }

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
}

fn run_migrate_compress(store: &Store) {
    const BATCH_SIZE: i64 = 100;
    let mut total_migrated = 0;
    let mut total_errored = 0;

    loop {
        match store.migrate_compress_batch(BATCH_SIZE) {
            Ok((0, 0)) => break,
            Ok((migrated, errored)) => {
                total_migrated += migrated;
                total_errored += errored;
            }
            Err(err) => {
                tracing::error!(?err, "migration batch failed");
                std::process::exit(1);
            }
        }
    }

    tracing::info!(migrated = total_migrated, errored = total_errored, "compression migration complete");
}
