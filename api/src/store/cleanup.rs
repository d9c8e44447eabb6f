use rusqlite::params;

use super::Store;

/// Summary of rows removed by one cleanup pass, logged by the maintenance task.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanupStats {
    pub stories_deleted: usize,
    pub dismissed_deleted: usize,
    pub url_cache_deleted: usize,
}

impl Store {
    /// Deletes aged rows across four independent horizons:
    /// - dismissed stories older than `dismissed_retention_hours`, story row only — the
    ///   dismissal marker is kept
    /// - stories older than `story_retention_days`, excluding read-later and (not yet aged-out)
    ///   dismissed ones
    /// - dismissal markers older than `dismissed_retention_hours` *past the 60-day floor* that
    ///   outlive their story on purpose
    /// - URL cache rows older than `url_cache_retention_days`
    ///
    /// Child tables (`history`, `read_later`, `dismissed`) are deleted before `stories` to satisfy
    /// the foreign keys that reference it.
    pub fn cleanup(
        &self,
        dismissed_retention_hours: i64,
        story_retention_days: i64,
        url_cache_retention_days: i64,
    ) -> rusqlite::Result<CleanupStats> {
        let conn = self.conn();
        let now = super::now();

        let story_cutoff = now - story_retention_days * 86_400;
        let doomed_story_ids: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT id FROM stories
                 WHERE time < ?1
                   AND id NOT IN (SELECT story_id FROM read_later)
                   AND id NOT IN (SELECT story_id FROM dismissed)",
            )?;
            stmt.query_map(params![story_cutoff], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?
        };

        // Dismissed stories get their own horizon, independent of `story_retention_days`: a
        // dismissed story's row is deleted once it is older than `dismissed_retention_hours`,
        // even if that's shorter than the general retention window. The marker in `dismissed`
        // is untouched here — it has no FK to stories and must outlive the deleted row so
        // re-ingestion can never resurrect it.
        let dismissed_story_cutoff = now - dismissed_retention_hours * 3600;
        let doomed_dismissed_story_ids: Vec<i64> = {
            let mut stmt = conn.prepare(
                "SELECT s.id FROM stories s
                 JOIN dismissed d ON d.story_id = s.id
                 WHERE s.time < ?1",
            )?;
            stmt.query_map(params![dismissed_story_cutoff], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut stories_deleted = 0;
        for id in doomed_story_ids.iter().chain(doomed_dismissed_story_ids.iter()) {
            conn.execute("DELETE FROM history WHERE story_id = ?1", params![id])?;
            conn.execute("DELETE FROM read_later WHERE story_id = ?1", params![id])?;
            stories_deleted += conn.execute("DELETE FROM stories WHERE id = ?1", params![id])?;
        }

        // Dismissal markers are kept a flat 60 days past the story's own deletion horizon, since
        // HN never reissues ids within the new-feed window.
        let dismissed_floor_seconds = (60 * 86_400).max(dismissed_retention_hours * 3600);
        let dismissed_cutoff = now - dismissed_floor_seconds;
        let dismissed_deleted = conn.execute(
            "DELETE FROM dismissed WHERE dismissed_at < ?1",
            params![dismissed_cutoff],
        )?;

        let url_cache_deleted = self.cleanup_url_cache(url_cache_retention_days)?;

        Ok(CleanupStats {
            stories_deleted,
            dismissed_deleted,
            url_cache_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::store::open_memory_for_test;
    use crate::store::stories::IncomingStory;

    fn incoming(id: i64, time: i64) -> IncomingStory {
        IncomingStory {
            id,
            title: format!("story {id}"),
            url: Some(format!("https://example.com/{id}")),
            text: None,
            author: "someone".to_string(),
            time,
            score: 1,
            descendants: 0,
        }
    }

    #[test]
    fn old_story_is_deleted_unless_read_later_or_not_yet_past_its_own_dismissed_horizon() {
        let store = open_memory_for_test();
        let now = crate::store::now();
        let old = now - 40 * 86_400;

        store.upsert_story(incoming(1, old)).unwrap();
        store.upsert_story(incoming(2, old)).unwrap();
        store.upsert_story(incoming(3, old)).unwrap();
        store.add_read_later(2).unwrap();
        store.dismiss(3).unwrap();

        // A `dismissed_retention_hours` well beyond the stories' own 40-day age means the
        // dismissed-story horizon hasn't elapsed yet, so id 3 only needs exemption from the
        // general `story_retention_days` horizon to survive this pass.
        let stats = store.cleanup(2000, 30, 14).unwrap();
        assert_eq!(stats.stories_deleted, 1);
        assert!(store.get_story(1).unwrap().is_none());
        assert!(store.get_story(2).unwrap().is_some());
        assert!(store.get_story(3).unwrap().is_some());
    }

    #[test]
    fn dismissal_outlives_its_deleted_story() {
        let store = open_memory_for_test();
        let old = crate::store::now() - 40 * 86_400;
        store.upsert_story(incoming(4, old)).unwrap();
        store.dismiss(4).unwrap();

        // 720h (30 days) is shorter than the story's own 40-day age, so the dismissed-story
        // horizon has elapsed and the row is deleted even though general story retention alone
        // wouldn't have touched it yet.
        store.cleanup(720, 30, 14).unwrap();

        assert!(store.get_story(4).unwrap().is_none());
        assert!(store.is_dismissed(4).unwrap(), "dismissal marker must survive story deletion");
    }

    #[test]
    fn recent_story_survives_a_cleanup_pass() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(5, crate::store::now())).unwrap();

        let stats = store.cleanup(720, 30, 14).unwrap();
        assert_eq!(stats.stories_deleted, 0);
        assert!(store.get_story(5).unwrap().is_some());
    }
}
