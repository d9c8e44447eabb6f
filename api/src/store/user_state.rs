use rusqlite::params;

use super::Store;

impl Store {
    pub fn add_read_later(&self, story_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO read_later (story_id, added_at) VALUES (?1, ?2)
             ON CONFLICT(story_id) DO NOTHING",
            params![story_id, super::now()],
        )?;
        Ok(())
    }

    pub fn remove_read_later(&self, story_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM read_later WHERE story_id = ?1", params![story_id])?;
        Ok(())
    }

    pub fn list_read_later(&self) -> rusqlite::Result<Vec<super::Story>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT s.* FROM stories s
             JOIN read_later r ON r.story_id = s.id
             ORDER BY r.added_at DESC",
        )?;
        let rows = stmt
            .query_map([], super::stories::Story::from_row_public)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn dismiss(&self, story_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO dismissed (story_id, dismissed_at) VALUES (?1, ?2)
             ON CONFLICT(story_id) DO NOTHING",
            params![story_id, super::now()],
        )?;
        Ok(())
    }

    pub fn undismiss(&self, story_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM dismissed WHERE story_id = ?1", params![story_id])?;
        Ok(())
    }

    pub fn undismiss_all(&self) -> rusqlite::Result<usize> {
        let conn = self.conn();
        conn.execute("DELETE FROM dismissed", [])
    }

    pub fn is_dismissed(&self, story_id: i64) -> rusqlite::Result<bool> {
        let conn = self.conn();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM dismissed WHERE story_id = ?1",
            params![story_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn mark_opened(&self, story_id: i64) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO history (story_id, opened_at) VALUES (?1, ?2)
             ON CONFLICT(story_id) DO UPDATE SET opened_at = excluded.opened_at",
            params![story_id, super::now()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::store::open_memory_for_test;
    use crate::store::stories::IncomingStory;

    fn incoming(id: i64) -> IncomingStory {
        IncomingStory {
            id,
            title: format!("story {id}"),
            url: Some(format!("https://example.com/{id}")),
            text: None,
            author: "someone".to_string(),
            time: crate::store::now(),
            score: 1,
            descendants: 0,
        }
    }

    #[test]
    fn dismiss_and_undismiss_round_trip() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(1)).unwrap();

        assert!(!store.is_dismissed(1).unwrap());
        store.dismiss(1).unwrap();
        assert!(store.is_dismissed(1).unwrap());
        store.undismiss(1).unwrap();
        assert!(!store.is_dismissed(1).unwrap());
    }

    #[test]
    fn undismiss_all_clears_every_row() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(1)).unwrap();
        store.upsert_story(incoming(2)).unwrap();
        store.dismiss(1).unwrap();
        store.dismiss(2).unwrap();

        let removed = store.undismiss_all().unwrap();
        assert_eq!(removed, 2);
        assert!(!store.is_dismissed(1).unwrap());
        assert!(!store.is_dismissed(2).unwrap());
    }

    #[test]
    fn read_later_list_reflects_additions_and_removals() {
        let store = open_memory_for_test();
        store.upsert_story(incoming(1)).unwrap();
        store.upsert_story(incoming(2)).unwrap();

        store.add_read_later(1).unwrap();
        store.add_read_later(2).unwrap();
        assert_eq!(store.list_read_later().unwrap().len(), 2);

        store.remove_read_later(1).unwrap();
        let remaining = store.list_read_later().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, 2);
    }
}
