use rusqlite::{OptionalExtension, params};

use super::Store;

/// A cached extraction result keyed by URL, shared across any story that links to it.
#[derive(Debug, Clone)]
pub struct UrlCacheEntry {
    pub content: String,
    pub source: String,
    pub billed_ms: i64,
    pub fetched_at: i64,
}

impl Store {
    pub fn get_cached_content(&self, url: &str) -> rusqlite::Result<Option<UrlCacheEntry>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT content, source, billed_ms, fetched_at FROM url_cache WHERE url = ?1",
            params![url],
            |row| {
                Ok(UrlCacheEntry {
                    content: row.get(0)?,
                    source: row.get(1)?,
                    billed_ms: row.get(2)?,
                    fetched_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    /// Writes (or overwrites) the URL cache entry. `raw_content` is compressed by the caller
    /// beforehand since the cache stores the same `z:`-tagged wire format as `stories.content`.
    pub fn put_cached_content(
        &self,
        url: &str,
        compressed_content: &str,
        source: &str,
        billed_ms: i64,
    ) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO url_cache (url, content, source, billed_ms, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(url) DO UPDATE SET
                content = excluded.content,
                source = excluded.source,
                billed_ms = excluded.billed_ms,
                fetched_at = excluded.fetched_at",
            params![url, compressed_content, source, billed_ms, super::now()],
        )?;
        Ok(())
    }

    /// Deletes URL cache rows older than `retention_days`. Returns the number of rows removed.
    pub fn cleanup_url_cache(&self, retention_days: i64) -> rusqlite::Result<usize> {
        let conn = self.conn();
        let cutoff = super::now() - retention_days * 86_400;
        conn.execute("DELETE FROM url_cache WHERE fetched_at < ?1", params![cutoff])
    }
}

#[cfg(test)]
mod tests {
    use crate::store::open_memory_for_test;

    #[test]
    fn put_then_get_round_trips_and_overwrites_on_conflict() {
        let store = open_memory_for_test();
        assert!(store.get_cached_content("https://example.com/a").unwrap().is_none());

        store.put_cached_content("https://example.com/a", "z:abc", "renderer", 120).unwrap();
        let entry = store.get_cached_content("https://example.com/a").unwrap().unwrap();
        assert_eq!(entry.content, "z:abc");
        assert_eq!(entry.billed_ms, 120);

        store.put_cached_content("https://example.com/a", "z:def", "renderer", 80).unwrap();
        let entry = store.get_cached_content("https://example.com/a").unwrap().unwrap();
        assert_eq!(entry.content, "z:def");
        assert_eq!(entry.billed_ms, 80);
    }

    #[test]
    fn cleanup_url_cache_removes_only_rows_past_retention() {
        let store = open_memory_for_test();
        store.put_cached_content("https://old.example/a", "z:old", "renderer", 10).unwrap();
        store.put_cached_content("https://fresh.example/a", "z:fresh", "renderer", 10).unwrap();

        {
            let conn = store.conn();
            conn.execute(
                "UPDATE url_cache SET fetched_at = ?1 WHERE url = ?2",
                rusqlite::params![crate::store::now() - 30 * 86_400, "https://old.example/a"],
            )
            .unwrap();
        }

        let removed = store.cleanup_url_cache(14).unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_cached_content("https://old.example/a").unwrap().is_none());
        assert!(store.get_cached_content("https://fresh.example/a").unwrap().is_some());
    }
}
