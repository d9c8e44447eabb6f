use rusqlite::Connection;

pub const PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode=WAL",
    "PRAGMA busy_timeout=5000",
    "PRAGMA foreign_keys=ON",
    "PRAGMA mmap_size=268435456",
    "PRAGMA cache_size=-20000",
];

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS stories (
    id                INTEGER PRIMARY KEY,
    title             TEXT NOT NULL,
    url               TEXT,
    domain            TEXT,
    author            TEXT NOT NULL,
    time              INTEGER NOT NULL,
    score             INTEGER NOT NULL DEFAULT 0,
    descendants       INTEGER NOT NULL DEFAULT 0,
    content           TEXT,
    teaser            TEXT,
    content_status    TEXT NOT NULL DEFAULT 'pending',
    attempts          INTEGER NOT NULL DEFAULT 0,
    content_source    TEXT,
    billed_ms         INTEGER NOT NULL DEFAULT 0,
    hit_front_page    INTEGER NOT NULL DEFAULT 0,
    front_page_rank   INTEGER,
    created_at        INTEGER NOT NULL,
    updated_at        INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_stories_time ON stories(time);
CREATE INDEX IF NOT EXISTS idx_stories_url ON stories(url);
CREATE INDEX IF NOT EXISTS idx_stories_claim
    ON stories(content_status, attempts, time)
    WHERE url IS NOT NULL;

CREATE TABLE IF NOT EXISTS url_cache (
    url        TEXT PRIMARY KEY,
    content    TEXT NOT NULL,
    source     TEXT NOT NULL,
    billed_ms  INTEGER NOT NULL DEFAULT 0,
    fetched_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS usage_log (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    story_id  INTEGER,
    url       TEXT NOT NULL,
    billed_ms INTEGER NOT NULL DEFAULT 0,
    source    TEXT NOT NULL,
    time      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_log_time ON usage_log(time);

CREATE TABLE IF NOT EXISTS usage_summary (
    month          TEXT PRIMARY KEY,
    request_count  INTEGER NOT NULL DEFAULT 0,
    total_billed_ms INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS merit_words (
    word   TEXT PRIMARY KEY,
    weight INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS demerit_words (
    word   TEXT PRIMARY KEY,
    weight INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS merit_domains (
    domain TEXT PRIMARY KEY,
    weight INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS demerit_domains (
    domain TEXT PRIMARY KEY,
    weight INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS blocked_words (
    word TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS blocked_domains (
    domain TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS read_later (
    story_id   INTEGER PRIMARY KEY REFERENCES stories(id) ON DELETE CASCADE,
    added_at   INTEGER NOT NULL
);

-- Deliberately no FK to stories: a dismissal must outlive the story it refers to, so the
-- ingestor can never resurrect a dismissed-and-deleted story.
CREATE TABLE IF NOT EXISTS dismissed (
    story_id    INTEGER PRIMARY KEY,
    dismissed_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS history (
    story_id  INTEGER PRIMARY KEY REFERENCES stories(id) ON DELETE CASCADE,
    opened_at INTEGER NOT NULL
);
"#;

pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(DDL)
}
