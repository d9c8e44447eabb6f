use rusqlite::{OptionalExtension, Row, params};

use super::{Store, compress, derive_domain, make_teaser, now};

pub const MAX_ATTEMPTS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Pending,
    Fetching,
    Done,
    Blocked,
    Failed,
    Skipped,
    Retry,
}

impl ContentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Fetching => "fetching",
            ContentStatus::Done => "done",
            ContentStatus::Blocked => "blocked",
            ContentStatus::Failed => "failed",
            ContentStatus::Skipped => "skipped",
            ContentStatus::Retry => "retry",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "fetching" => ContentStatus::Fetching,
            "done" => ContentStatus::Done,
            "blocked" => ContentStatus::Blocked,
            "failed" => ContentStatus::Failed,
            "skipped" => ContentStatus::Skipped,
            "retry" => ContentStatus::Retry,
            _ => ContentStatus::Pending,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ContentStatus::Done | ContentStatus::Failed | ContentStatus::Blocked | ContentStatus::Skipped
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSource {
    HnText,
    Renderer,
    Cache,
}

impl ContentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentSource::HnText => "hn_text",
            ContentSource::Renderer => "renderer",
            ContentSource::Cache => "cache",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Story {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub author: String,
    pub time: i64,
    pub score: i64,
    pub descendants: i64,
    pub content: Option<String>,
    pub teaser: Option<String>,
    pub content_status: ContentStatus,
    pub attempts: i64,
    pub content_source: Option<String>,
    pub billed_ms: i64,
    pub hit_front_page: bool,
    pub front_page_rank: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Story {
    pub(crate) fn from_row_public(row: &Row) -> rusqlite::Result<Self> {
        Self::from_row(row)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Story {
            id: row.get("id")?,
            title: row.get("title")?,
            url: row.get("url")?,
            domain: row.get("domain")?,
            author: row.get("author")?,
            time: row.get("time")?,
            score: row.get("score")?,
            descendants: row.get("descendants")?,
            content: row.get("content")?,
            teaser: row.get("teaser")?,
            content_status: ContentStatus::from_str(&row.get::<_, String>("content_status")?),
            attempts: row.get("attempts")?,
            content_source: row.get("content_source")?,
            billed_ms: row.get("billed_ms")?,
            hit_front_page: row.get::<_, i64>("hit_front_page")? != 0,
            front_page_rank: row.get("front_page_rank")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    /// Content decompressed for callers. `None` if no content has been fetched yet.
    pub fn decompressed_content(&self) -> Option<String> {
        self.content.as_deref().map(compress::decompress)
    }
}

/// A freshly-parsed item from an ingestion source, prior to any store interaction.
pub struct IncomingStory {
    pub id: i64,
    pub title: String,
    pub url: Option<String>,
    pub text: Option<String>,
    pub author: String,
    pub time: i64,
    pub score: i64,
    pub descendants: i64,
}

/// A claimed job ready for a worker to act on.
#[derive(Debug, Clone)]
pub struct ClaimedJob {
    pub id: i64,
    pub url: String,
    pub domain: String,
    pub attempts: i64,
}

impl Store {
    /// Derives the ingestion checkpoint as `MAX(time)` over all stories. Returns `None` when the
    /// store is empty, letting the caller fall back to its own lookback window.
    pub fn checkpoint(&self) -> rusqlite::Result<Option<i64>> {
        let conn = self.conn();
        conn.query_row("SELECT MAX(time) FROM stories", [], |row| row.get(0))
    }

    /// Inserts a story, or on conflict updates only `score`/`descendants`/`updated_at` — content,
    /// status, attempts and front-page annotations are never clobbered by re-ingestion.
    pub fn upsert_story(&self, item: IncomingStory) -> rusqlite::Result<()> {
        let conn = self.conn();
        let domain = item.url.as_deref().and_then(derive_domain);
        let ts = now();

        let (content, teaser, status, source) = match &item.text {
            Some(text) if item.url.is_none() && !text.is_empty() => {
                let compressed = compress::compress(text);
                let teaser = make_teaser(text);
                (
                    Some(compressed),
                    Some(teaser),
                    ContentStatus::Done,
                    Some(ContentSource::HnText.as_str()),
                )
            }
            _ => (None, None, ContentStatus::Pending, None),
        };

        conn.execute(
            "INSERT INTO stories
                (id, title, url, domain, author, time, score, descendants,
                 content, teaser, content_status, attempts, content_source,
                 billed_ms, hit_front_page, front_page_rank, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12, 0, 0, NULL, ?13, ?13)
             ON CONFLICT(id) DO UPDATE SET
                score = excluded.score,
                descendants = excluded.descendants,
                updated_at = excluded.updated_at",
            params![
                item.id,
                item.title,
                item.url,
                domain,
                item.author,
                item.time,
                item.score,
                item.descendants,
                content,
                teaser,
                status.as_str(),
                source,
                ts,
            ],
        )?;
        Ok(())
    }

    pub fn get_story(&self, id: i64) -> rusqlite::Result<Option<Story>> {
        let conn = self.conn();
        conn.query_row("SELECT * FROM stories WHERE id = ?1", params![id], Story::from_row)
            .optional()
    }

    /// Atomically claims the next eligible job: `status IN (pending, retry)`, URL not null,
    /// `attempts < MAX_ATTEMPTS`, ordered by `attempts ASC, time ASC`. Emulated with a short
    /// `IMMEDIATE` transaction rather than `UPDATE ... RETURNING` so concurrent claimers under
    /// WAL never observe or double-claim the same row; a racing claim just re-selects.
    pub fn claim_job(&self) -> rusqlite::Result<Option<ClaimedJob>> {
        let mut conn = self.conn();
        loop {
            let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

            let candidate: Option<(i64, String, i64)> = tx
                .query_row(
                    "SELECT id, url, attempts FROM stories
                     WHERE content_status IN ('pending', 'retry')
                       AND url IS NOT NULL
                       AND attempts < ?1
                     ORDER BY attempts ASC, time ASC
                     LIMIT 1",
                    params![MAX_ATTEMPTS],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((id, url, attempts)) = candidate else {
                tx.commit()?;
                return Ok(None);
            };

            let affected = tx.execute(
                "UPDATE stories SET content_status = 'fetching', attempts = attempts + 1, updated_at = ?1
                 WHERE id = ?2 AND content_status IN ('pending', 'retry')",
                params![now(), id],
            )?;

            if affected == 0 {
                // Another connection claimed it between our SELECT and UPDATE; retry.
                tx.rollback()?;
                continue;
            }

            tx.commit()?;

            let domain = derive_domain(&url).unwrap_or_else(|| url.clone());
            return Ok(Some(ClaimedJob {
                id,
                url,
                domain,
                attempts: attempts + 1,
            }));
        }
    }

    /// Finalizes a job as successfully fetched: writes content to the story row (and lets the
    /// caller separately populate the URL cache / usage log).
    pub fn finalize_done(&self, id: i64, raw_content: &str, source: ContentSource, billed_ms: i64) -> rusqlite::Result<()> {
        let compressed = compress::compress(raw_content);
        let teaser = make_teaser(raw_content);
        self.write_done(id, &compressed, &teaser, source, billed_ms)
    }

    /// Same as [`Store::finalize_done`], but `compressed_content` is already in the `z:` wire
    /// format (e.g. a URL-cache hit) instead of raw text, so it's written through unchanged
    /// rather than compressed again.
    pub fn finalize_from_cache(
        &self,
        id: i64,
        compressed_content: &str,
        source: ContentSource,
        billed_ms: i64,
    ) -> rusqlite::Result<()> {
        let teaser = make_teaser(&compress::decompress(compressed_content));
        self.write_done(id, compressed_content, &teaser, source, billed_ms)
    }

    fn write_done(
        &self,
        id: i64,
        compressed_content: &str,
        teaser: &str,
        source: ContentSource,
        billed_ms: i64,
    ) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE stories SET
                content = ?1, teaser = ?2, content_status = 'done',
                content_source = ?3, billed_ms = billed_ms + ?4, updated_at = ?5
             WHERE id = ?6",
            params![compressed_content, teaser, source.as_str(), billed_ms, now(), id],
        )?;
        Ok(())
    }

    /// Stores an intermediate or terminal non-success status. `content` is set only for
    /// terminal `blocked` (kept for inspection); `retry`/`failed`/`skipped` clear content.
    pub fn finalize_status(&self, id: i64, status: ContentStatus, content: Option<&str>) -> rusqlite::Result<()> {
        let conn = self.conn();
        match content {
            Some(c) => {
                let compressed = compress::compress(c);
                let teaser = make_teaser(c);
                conn.execute(
                    "UPDATE stories SET content = ?1, teaser = ?2, content_status = ?3, updated_at = ?4 WHERE id = ?5",
                    params![compressed, teaser, status.as_str(), now(), id],
                )?;
            }
            None => {
                conn.execute(
                    "UPDATE stories SET content_status = ?1, updated_at = ?2 WHERE id = ?3",
                    params![status.as_str(), now(), id],
                )?;
            }
        }
        Ok(())
    }

    pub fn add_billed_ms(&self, id: i64, billed_ms: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE stories SET billed_ms = billed_ms + ?1, updated_at = ?2 WHERE id = ?3",
            params![billed_ms, now(), id],
        )?;
        Ok(())
    }

    /// Cleans up jobs left in a non-terminal state by a crashed process: stories with no URL and
    /// a non-terminal status become `skipped`; stuck `fetching` rows below the attempt ceiling go
    /// back to `retry`; anything non-terminal at or past the ceiling becomes `failed`.
    pub fn cleanup_stuck_jobs(&self) -> rusqlite::Result<usize> {
        let conn = self.conn();
        let ts = now();
        let mut total = 0;

        total += conn.execute(
            "UPDATE stories SET content_status = 'skipped', updated_at = ?1
             WHERE url IS NULL AND content_status NOT IN ('done', 'failed', 'blocked', 'skipped')",
            params![ts],
        )?;

        total += conn.execute(
            "UPDATE stories SET content_status = 'retry', updated_at = ?1
             WHERE content_status = 'fetching' AND attempts < ?2",
            params![ts, MAX_ATTEMPTS],
        )?;

        total += conn.execute(
            "UPDATE stories SET content_status = 'failed', updated_at = ?1
             WHERE content_status NOT IN ('done', 'failed', 'blocked', 'skipped') AND attempts >= ?2",
            params![ts, MAX_ATTEMPTS],
        )?;

        Ok(total)
    }

    /// Front-page annotation: `front_page_rank = min(existing, rank)`, treating NULL as infinity.
    pub fn mark_front_page(&self, id: i64, rank: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "UPDATE stories SET
                hit_front_page = 1,
                front_page_rank = MIN(COALESCE(front_page_rank, ?1), ?1),
                updated_at = ?2
             WHERE id = ?3",
            params![rank, now(), id],
        )?;
        Ok(())
    }

    /// Counts of stories per `content_status`, for `GET /api/stats`.
    pub fn status_counts(&self) -> rusqlite::Result<Vec<(String, i64)>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT content_status, COUNT(*) FROM stories GROUP BY content_status")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn total_story_count(&self) -> rusqlite::Result<i64> {
        let conn = self.conn();
        conn.query_row("SELECT COUNT(*) FROM stories", [], |row| row.get(0))
    }

    /// One batch of the `--migrate-compress` walk: up to `batch_size` uncompressed rows,
    /// compressed then verified by decompressing and comparing to the original bytes. A row is
    /// only written back once the round trip matches; mismatches are left untouched and counted
    /// as errors rather than aborting the batch. Returns `(migrated, errored)`, with `migrated ==
    /// 0 && errored == 0` signalling the walk is complete.
    pub fn migrate_compress_batch(&self, batch_size: i64) -> rusqlite::Result<(usize, usize)> {
        let conn = self.conn();
        let candidates: Vec<(i64, String)> = {
            let mut stmt = conn.prepare(
                "SELECT id, content FROM stories
                 WHERE content IS NOT NULL AND content NOT LIKE 'z:%'
                 LIMIT ?1",
            )?;
            stmt.query_map(params![batch_size], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut migrated = 0;
        let mut errored = 0;
        for (id, plain) in candidates {
            let compressed = compress::compress(&plain);
            if compress::decompress(&compressed) != plain {
                tracing::error!(id, "compression round-trip mismatch, leaving row untouched");
                errored += 1;
                continue;
            }
            conn.execute(
                "UPDATE stories SET content = ?1 WHERE id = ?2",
                params![compressed, id],
            )?;
            migrated += 1;
        }

        Ok((migrated, errored))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    NewestFirst,
    OldestFirst,
}

pub struct ListFilter {
    pub order: SortOrder,
    pub limit: usize,
    pub cursor: Option<(i64, i64)>,
    pub dismissed_only: bool,
    pub exclude_dismissed: bool,
    pub exclude_blocked_domains: bool,
    pub exclude_read_later: bool,
    pub read_later_only: bool,
}

impl Default for ListFilter {
    fn default() -> Self {
        ListFilter {
            order: SortOrder::NewestFirst,
            limit: 30,
            cursor: None,
            dismissed_only: false,
            exclude_dismissed: true,
            exclude_blocked_domains: true,
            exclude_read_later: false,
            read_later_only: false,
        }
    }
}

pub struct ListPage {
    pub stories: Vec<super::ScoredStory>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::open_memory_for_test;

    fn incoming(id: i64, url: Option<&str>, text: Option<&str>, time: i64) -> IncomingStory {
        IncomingStory {
            id,
            title: format!("story {id}"),
            url: url.map(str::to_string),
            text: text.map(str::to_string),
            author: "someone".to_string(),
            time,
            score: 1,
            descendants: 0,
        }
    }

    #[test]
    fn self_text_story_is_done_with_hn_text_source() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(1, None, Some("body text"), 100)).unwrap();

        let story = store.get_story(1).unwrap().unwrap();
        assert_eq!(story.content_status, ContentStatus::Done);
        assert_eq!(story.content_source.as_deref(), Some("hn_text"));
        assert_eq!(story.decompressed_content().as_deref(), Some("body text"));
        assert!(story.teaser.is_some());
    }

    #[test]
    fn url_story_starts_pending_with_no_content() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(2, Some("https://example.com/a"), None, 100)).unwrap();

        let story = store.get_story(2).unwrap().unwrap();
        assert_eq!(story.content_status, ContentStatus::Pending);
        assert!(story.content.is_none());
        assert_eq!(story.domain.as_deref(), Some("example.com"));
    }

    #[test]
    fn upsert_conflict_updates_score_but_never_content_or_status() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(3, Some("https://example.com/b"), None, 100)).unwrap();
        store.finalize_done(3, "fetched content", ContentSource::Renderer, 42).unwrap();

        store.upsert_story(incoming(3, Some("https://example.com/b"), None, 100)).unwrap();
        let mut refreshed = incoming(3, Some("https://example.com/b"), None, 100);
        refreshed.score = 99;
        refreshed.descendants = 12;
        store.upsert_story(refreshed).unwrap();

        let story = store.get_story(3).unwrap().unwrap();
        assert_eq!(story.score, 99);
        assert_eq!(story.descendants, 12);
        assert_eq!(story.content_status, ContentStatus::Done);
        assert_eq!(story.decompressed_content().as_deref(), Some("fetched content"));
    }

    #[test]
    fn claim_job_skips_urlless_and_terminal_rows_and_is_single_use() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(4, None, None, 100)).unwrap();
        store.upsert_story(incoming(5, Some("https://a.example/x"), None, 200)).unwrap();

        let claimed = store.claim_job().unwrap().expect("a claimable job exists");
        assert_eq!(claimed.id, 5);
        assert_eq!(claimed.attempts, 1);

        // story 5 is now `fetching`; story 4 has no url. Nothing left to claim.
        assert!(store.claim_job().unwrap().is_none());
    }

    #[test]
    fn claim_job_respects_attempt_ceiling() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(6, Some("https://b.example/x"), None, 100)).unwrap();

        for _ in 0..MAX_ATTEMPTS {
            let job = store.claim_job().unwrap().expect("claimable while under ceiling");
            store.finalize_status(job.id, ContentStatus::Retry, None).unwrap();
        }

        assert!(store.claim_job().unwrap().is_none(), "attempts reached MAX_ATTEMPTS");
    }

    #[test]
    fn cleanup_stuck_jobs_reclassifies_by_url_and_attempts() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(7, None, None, 100)).unwrap(); // -> skipped
        store.upsert_story(incoming(8, Some("https://c.example/x"), None, 100)).unwrap();
        let job = store.claim_job().unwrap().unwrap(); // story 8 now `fetching`, attempts=1
        assert_eq!(job.id, 8);

        let cleaned = store.cleanup_stuck_jobs().unwrap();
        assert!(cleaned >= 2);

        let skipped = store.get_story(7).unwrap().unwrap();
        assert_eq!(skipped.content_status, ContentStatus::Skipped);
        let retried = store.get_story(8).unwrap().unwrap();
        assert_eq!(retried.content_status, ContentStatus::Retry);
    }

    #[test]
    fn checkpoint_tracks_max_story_time_and_none_when_empty() {
        let store = open_memory_for_test();
        assert_eq!(store.checkpoint().unwrap(), None);

        store.upsert_story(incoming(9, Some("https://d.example/x"), None, 100)).unwrap();
        store.upsert_story(incoming(10, Some("https://d.example/y"), None, 250)).unwrap();
        assert_eq!(store.checkpoint().unwrap(), Some(250));
    }

    #[test]
    fn mark_front_page_keeps_the_best_rank() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(11, Some("https://e.example/x"), None, 100)).unwrap();

        store.mark_front_page(11, 5).unwrap();
        store.mark_front_page(11, 2).unwrap();
        store.mark_front_page(11, 9).unwrap();

        let story = store.get_story(11).unwrap().unwrap();
        assert!(story.hit_front_page);
        assert_eq!(story.front_page_rank, Some(2));
    }
}
