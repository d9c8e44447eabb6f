mod backup;
mod cleanup;
mod compress;
mod content;
mod rules;
mod schema;
mod stories;
mod usage;
mod user_state;
mod vacuum;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub use cleanup::CleanupStats;
pub use compress::compress as compress_text;
pub use content::UrlCacheEntry;
pub use rules::{RuleKind, ScoredStory};
pub use stories::{
    ClaimedJob, ContentSource, ContentStatus, IncomingStory, ListFilter, ListPage, SortOrder, Story,
    MAX_ATTEMPTS,
};
pub use usage::{UsageSummaryRow, UsageTotals};

/// Embedded SQLite store, shared by every background task and the HTTP API. A single pool
/// hands out pooled connections; callers invoke store methods from `tokio::task::spawn_blocking`
/// since `rusqlite` is synchronous end to end.
#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
    pub db_path: String,
}

impl Store {
    pub fn open(data_dir: &str) -> rusqlite::Result<Self> {
        std::fs::create_dir_all(data_dir).expect("create data directory");
        let db_path = format!("{data_dir}/hn.db");

        let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
            for pragma in schema::PRAGMAS {
                conn.execute_batch(pragma)?;
            }
            Ok(())
        });
        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .expect("build sqlite connection pool");

        let conn = pool.get().expect("acquire connection for migrations");
        schema::run_migrations(&conn)?;

        Ok(Store { pool, db_path })
    }

    fn conn(&self) -> r2d2::PooledConnection<SqliteConnectionManager> {
        self.pool.get().expect("sqlite pool exhausted or poisoned")
    }

    /// Wipes all mutable content: stories, url cache, usage log/summary, dismissed, history,
    /// read-later. Rule tables are left intact (`--reset` is meant to re-ingest fresh data, not
    /// throw away curated scoring rules).
    pub fn reset(&self) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "DELETE FROM history;
             DELETE FROM read_later;
             DELETE FROM dismissed;
             DELETE FROM usage_log;
             DELETE FROM usage_summary;
             DELETE FROM url_cache;
             DELETE FROM stories;",
        )
    }
}

/// Lowercases and strips a leading `www.` from a URL's host, for domain-based scoring/grouping.
pub fn derive_domain(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

pub fn make_teaser(content: &str) -> String {
    const TEASER_LEN: usize = 300;
    let trimmed = content.trim();
    if trimmed.chars().count() <= TEASER_LEN {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(TEASER_LEN).collect();
        format!("{}...", truncated.trim_end())
    }
}

pub(crate) fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Errors from running a store closure on the blocking pool: either the query itself failed, or
/// the `spawn_blocking` task it ran on panicked. Shared by every caller that dispatches a `Store`
/// call off the async runtime.
#[derive(thiserror::Error, Debug)]
pub enum BlockingError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("blocking task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Runs `f` on the blocking thread pool with a cloned pool handle, the standard way every
/// long-running task and HTTP handler talks to the synchronous `rusqlite` store.
pub async fn run_blocking<T, F>(store: &Store, f: F) -> Result<T, BlockingError>
where
    T: Send + 'static,
    F: FnOnce(&Store) -> rusqlite::Result<T> + Send + 'static,
{
    let store = store.clone();
    let result = tokio::task::spawn_blocking(move || f(&store)).await?;
    Ok(result?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_domain_lowercases_and_strips_www() {
        assert_eq!(derive_domain("https://WWW.Example.COM/path").as_deref(), Some("example.com"));
        assert_eq!(derive_domain("https://sub.example.com/a").as_deref(), Some("sub.example.com"));
        assert_eq!(derive_domain("not a url"), None);
    }

    #[test]
    fn teaser_passes_short_content_through_unchanged() {
        let short = "a short article body";
        assert_eq!(make_teaser(short), short);
    }

    #[test]
    fn teaser_truncates_long_content_with_ellipsis() {
        let long = "x".repeat(301);
        let teaser = make_teaser(&long);
        assert!(teaser.ends_with("..."));
        assert_eq!(teaser.chars().count(), 303); // 300 chars + "..."
    }
}

pub(crate) fn open_memory_for_test() -> Store {
    let manager = SqliteConnectionManager::memory().with_init(|conn: &mut Connection| {
        conn.execute_batch("PRAGMA foreign_keys=ON")
    });
    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .expect("build in-memory sqlite pool");
    let conn = pool.get().unwrap();
    schema::run_migrations(&conn).unwrap();
    Store {
        pool,
        db_path: ":memory:".to_string(),
    }
}
