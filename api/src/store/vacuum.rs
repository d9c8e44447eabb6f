use super::Store;

const FREE_PAGE_THRESHOLD: i64 = 1000;
const FREE_PAGE_FRACTION: f64 = 0.05;

impl Store {
    /// Opportunistic vacuum: runs `VACUUM` only when the free-page count is large in absolute
    /// terms or as a fraction of the database, to avoid needlessly rewriting a healthy file.
    /// Returns whether a vacuum actually ran.
    pub fn vacuum_if_needed(&self) -> rusqlite::Result<bool> {
        let conn = self.conn();
        let free_pages: i64 = conn.query_row("PRAGMA freelist_count", [], |row| row.get(0))?;
        let page_count: i64 = conn.query_row("PRAGMA page_count", [], |row| row.get(0))?;

        let fraction = if page_count > 0 {
            free_pages as f64 / page_count as f64
        } else {
            0.0
        };

        if free_pages >= FREE_PAGE_THRESHOLD || fraction >= FREE_PAGE_FRACTION {
            conn.execute_batch("VACUUM")?;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::open_memory_for_test;

    #[test]
    fn fresh_store_has_nothing_to_vacuum() {
        let store = open_memory_for_test();
        assert!(!store.vacuum_if_needed().unwrap());
    }
}
