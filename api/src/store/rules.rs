use std::collections::HashMap;

use rusqlite::params;

use super::stories::{ListFilter, ListPage, SortOrder, Story};
use super::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    MeritWord,
    DemeritWord,
    MeritDomain,
    DemeritDomain,
    BlockedWord,
    BlockedDomain,
}

impl RuleKind {
    fn table(self) -> &'static str {
        match self {
            RuleKind::MeritWord => "merit_words",
            RuleKind::DemeritWord => "demerit_words",
            RuleKind::MeritDomain => "merit_domains",
            RuleKind::DemeritDomain => "demerit_domains",
            RuleKind::BlockedWord => "blocked_words",
            RuleKind::BlockedDomain => "blocked_domains",
        }
    }

    fn key_column(self) -> &'static str {
        match self {
            RuleKind::MeritWord | RuleKind::DemeritWord | RuleKind::BlockedWord => "word",
            RuleKind::MeritDomain | RuleKind::DemeritDomain | RuleKind::BlockedDomain => "domain",
        }
    }

    fn weighted(self) -> bool {
        !matches!(self, RuleKind::BlockedWord | RuleKind::BlockedDomain)
    }
}

/// A story annotated with the score breakdown the listing endpoint needs to display.
#[derive(Debug, Clone)]
pub struct ScoredStory {
    pub story: Story,
    pub domain_merit: i64,
    pub domain_demerit: i64,
    pub word_merit: i64,
    pub word_demerit: i64,
    pub net_score: i64,
}

impl Store {
    pub fn add_rule(&self, kind: RuleKind, key: &str, weight: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        let key = key.to_lowercase();
        let sql = if kind.weighted() {
            format!(
                "INSERT INTO {} ({}, weight) VALUES (?1, ?2)
                 ON CONFLICT({}) DO UPDATE SET weight = excluded.weight",
                kind.table(),
                kind.key_column(),
                kind.key_column()
            )
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES (?1) ON CONFLICT({}) DO NOTHING",
                kind.table(),
                kind.key_column(),
                kind.key_column()
            )
        };
        conn.execute(&sql, params![key, weight])?;
        Ok(())
    }

    pub fn remove_rule(&self, kind: RuleKind, key: &str) -> rusqlite::Result<()> {
        let conn = self.conn();
        let key = key.to_lowercase();
        let sql = format!("DELETE FROM {} WHERE {} = ?1", kind.table(), kind.key_column());
        conn.execute(&sql, params![key])?;
        Ok(())
    }

    pub fn list_rules(&self, kind: RuleKind) -> rusqlite::Result<Vec<(String, i64)>> {
        let conn = self.conn();
        let sql = if kind.weighted() {
            format!("SELECT {}, weight FROM {}", kind.key_column(), kind.table())
        } else {
            format!("SELECT {}, 0 FROM {}", kind.key_column(), kind.table())
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn rule_map(&self, kind: RuleKind) -> rusqlite::Result<HashMap<String, i64>> {
        Ok(self.list_rules(kind)?.into_iter().collect())
    }

    /// Paginated, deduplicated, scored story listing. Over-fetches by 3x the page
    /// size because blocked-word filtering happens in Rust after the SQL query returns, and that
    /// post-filter can shrink a batch below the caller's requested page size.
    pub fn list_stories(&self, filter: &ListFilter) -> rusqlite::Result<ListPage> {
        let merit_words = self.rule_map(RuleKind::MeritWord)?;
        let demerit_words = self.rule_map(RuleKind::DemeritWord)?;
        let merit_domains = self.rule_map(RuleKind::MeritDomain)?;
        let demerit_domains = self.rule_map(RuleKind::DemeritDomain)?;
        let blocked_words: Vec<String> = self
            .list_rules(RuleKind::BlockedWord)?
            .into_iter()
            .map(|(w, _)| w)
            .collect();
        let blocked_domains: Vec<String> = self
            .list_rules(RuleKind::BlockedDomain)?
            .into_iter()
            .map(|(d, _)| d)
            .collect();

        let order_sql = match filter.order {
            SortOrder::NewestFirst => "time DESC, id DESC",
            SortOrder::OldestFirst => "time ASC, id ASC",
        };
        let cursor_cmp = match filter.order {
            SortOrder::NewestFirst => "<",
            SortOrder::OldestFirst => ">",
        };

        let mut seen_urls: std::collections::HashSet<String> = std::collections::HashSet::new();
        let mut out: Vec<ScoredStory> = Vec::new();
        let mut cursor = filter.cursor;
        let mut exhausted = false;
        let fetch_batch = filter.limit.max(1) * 3;

        loop {
            let conn = self.conn();

            let base_where = if filter.dismissed_only {
                "s.id IN (SELECT story_id FROM dismissed)"
            } else if filter.exclude_dismissed {
                "s.id NOT IN (SELECT story_id FROM dismissed)"
            } else {
                "1=1"
            };

            let read_later_clause = if filter.read_later_only {
                "AND s.id IN (SELECT story_id FROM read_later)"
            } else if filter.exclude_read_later {
                "AND s.id NOT IN (SELECT story_id FROM read_later)"
            } else {
                ""
            };

            let sql = match cursor {
                Some(_) => format!(
                    "SELECT s.* FROM stories s WHERE {base_where} {read_later_clause}
                     AND (s.time, s.id) {cursor_cmp} (?1, ?2)
                     ORDER BY {order_sql} LIMIT ?3"
                ),
                None => format!(
                    "SELECT s.* FROM stories s WHERE {base_where} {read_later_clause}
                     ORDER BY {order_sql} LIMIT ?1"
                ),
            };

            let mut stmt = conn.prepare(&sql)?;
            let rows: Vec<Story> = match cursor {
                Some((t, id)) => stmt
                    .query_map(params![t, id, fetch_batch as i64], Story::from_row_public)?
                    .collect::<Result<Vec<_>, _>>()?,
                None => stmt
                    .query_map(params![fetch_batch as i64], Story::from_row_public)?
                    .collect::<Result<Vec<_>, _>>()?,
            };
            drop(stmt);
            drop(conn);

            let got = rows.len();
            if got < fetch_batch {
                // A short batch means the DB had no more rows to give us, even if it wasn't
                // empty — the next fetch would return 0, so treat this as exhausted now rather
                // than waiting for one more round trip to confirm it.
                exhausted = true;
            }

            for story in rows {
                cursor = Some((story.time, story.id));

                if filter.exclude_blocked_domains {
                    if let Some(domain) = &story.domain {
                        if blocked_domains.iter().any(|d| d == domain) {
                            continue;
                        }
                    }
                }

                let title_lower = story.title.to_lowercase();
                if blocked_words.iter().any(|w| title_lower.contains(w.as_str())) {
                    continue;
                }

                let dedup_key = story
                    .url
                    .clone()
                    .unwrap_or_else(|| format!("hn:{}", story.id));
                if !seen_urls.insert(dedup_key) {
                    continue;
                }

                let domain_merit = story
                    .domain
                    .as_ref()
                    .and_then(|d| merit_domains.get(d))
                    .copied()
                    .unwrap_or(0);
                let domain_demerit = story
                    .domain
                    .as_ref()
                    .and_then(|d| demerit_domains.get(d))
                    .copied()
                    .unwrap_or(0);
                let word_merit: i64 = merit_words
                    .iter()
                    .filter(|(w, _)| title_lower.contains(w.as_str()))
                    .map(|(_, weight)| weight)
                    .sum();
                let word_demerit: i64 = demerit_words
                    .iter()
                    .filter(|(w, _)| title_lower.contains(w.as_str()))
                    .map(|(_, weight)| weight)
                    .sum();

                out.push(ScoredStory {
                    net_score: (domain_merit + word_merit) - (domain_demerit + word_demerit),
                    story,
                    domain_merit,
                    domain_demerit,
                    word_merit,
                    word_demerit,
                });

                if out.len() >= filter.limit {
                    break;
                }
            }

            if out.len() >= filter.limit || exhausted || got < fetch_batch {
                break;
            }
        }

        let has_more = !exhausted && out.len() >= filter.limit;
        out.truncate(filter.limit);

        let next_cursor = out
            .last()
            .map(|s| format!("{}:{}", s.story.time, s.story.id));

        Ok(ListPage {
            stories: out,
            next_cursor,
            has_more,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::stories::IncomingStory;
    use super::*;
    use crate::store::open_memory_for_test;

    fn incoming(id: i64, url: &str, title: &str, time: i64) -> IncomingStory {
        IncomingStory {
            id,
            title: title.to_string(),
            url: Some(url.to_string()),
            text: None,
            author: "someone".to_string(),
            time,
            score: 1,
            descendants: 0,
        }
    }

    #[test]
    fn score_composition_nets_merit_against_demerit() {
        let store = open_memory_for_test();
        store
            .upsert_story(incoming(1, "https://rust-lang.org/a", "Rust 2.0 released", 100))
            .unwrap();
        store.add_rule(RuleKind::MeritDomain, "rust-lang.org", 5).unwrap();
        store.add_rule(RuleKind::MeritWord, "rust", 3).unwrap();
        store.add_rule(RuleKind::DemeritWord, "released", 2).unwrap();

        let page = store.list_stories(&ListFilter::default()).unwrap();
        assert_eq!(page.stories.len(), 1);
        let scored = &page.stories[0];
        assert_eq!(scored.domain_merit, 5);
        assert_eq!(scored.word_merit, 3);
        assert_eq!(scored.word_demerit, 2);
        assert_eq!(scored.net_score, 5 + 3 - 2);
    }

    #[test]
    fn blocked_word_and_blocked_domain_are_excluded() {
        let store = open_memory_for_test();
        store
            .upsert_story(incoming(1, "https://spam.example/a", "buy cheap watches now", 100))
            .unwrap();
        store
            .upsert_story(incoming(2, "https://news.example/b", "a legitimate headline", 200))
            .unwrap();
        store.add_rule(RuleKind::BlockedDomain, "spam.example", 0).unwrap();
        store.add_rule(RuleKind::BlockedWord, "cheap", 0).unwrap();

        let page = store.list_stories(&ListFilter::default()).unwrap();
        assert_eq!(page.stories.len(), 1);
        assert_eq!(page.stories[0].story.id, 2);
    }

    #[test]
    fn read_later_only_shows_exclusively_saved_stories() {
        let store = open_memory_for_test();
        store
            .upsert_story(incoming(1, "https://a.example/x", "saved for later", 100))
            .unwrap();
        store
            .upsert_story(incoming(2, "https://b.example/y", "not saved", 200))
            .unwrap();
        store.add_read_later(1).unwrap();

        let filter = ListFilter { read_later_only: true, ..ListFilter::default() };
        let page = store.list_stories(&filter).unwrap();
        assert_eq!(page.stories.len(), 1);
        assert_eq!(page.stories[0].story.id, 1);
    }

    #[test]
    fn same_url_is_deduplicated_keeping_the_first_in_order() {
        let store = open_memory_for_test();
        store
            .upsert_story(incoming(1, "https://dup.example/same", "first copy", 200))
            .unwrap();
        // Different HN id, identical URL, posted earlier: under newest-first order the id=1 row
        // (later time) sorts first and wins the dedup.
        store
            .upsert_story(incoming(2, "https://dup.example/same", "second copy", 100))
            .unwrap();

        let page = store.list_stories(&ListFilter::default()).unwrap();
        assert_eq!(page.stories.len(), 1);
        assert_eq!(page.stories[0].story.id, 1);
    }

    #[test]
    fn pagination_cursor_advances_without_duplicates() {
        let store = open_memory_for_test();
        for i in 1..=5 {
            store
                .upsert_story(incoming(i, &format!("https://many.example/{i}"), "story", i * 100))
                .unwrap();
        }

        let mut filter = ListFilter { limit: 2, ..ListFilter::default() };
        let mut seen = std::collections::HashSet::new();
        loop {
            let page = store.list_stories(&filter).unwrap();
            for s in &page.stories {
                assert!(seen.insert(s.story.id), "story {} returned twice across pages", s.story.id);
            }
            if !page.has_more {
                break;
            }
            let cursor = page.next_cursor.as_deref().expect("has_more implies a cursor");
            let (time, id) = cursor.split_once(':').expect("cursor is `<time>:<id>`");
            filter.cursor = Some((time.parse().unwrap(), id.parse().unwrap()));
        }
        assert_eq!(seen.len(), 5);
    }
}
