use rusqlite::params;
use serde::Serialize;

use super::Store;

/// One row of the monthly usage rollup (`YYYY-MM` -> totals).
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummaryRow {
    pub month: String,
    pub request_count: i64,
    pub total_billed_ms: i64,
}

/// Usage totals across the raw log plus the aggregated summary, as returned by `GET /api/usage`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageTotals {
    pub request_count: i64,
    pub total_billed_ms: i64,
}

impl Store {
    /// Appends an append-only usage log row. Called once per renderer fetch that actually billed;
    /// cache hits intentionally skip this since no renderer time was billed.
    pub fn log_usage(&self, story_id: i64, url: &str, billed_ms: i64, source: &str) -> rusqlite::Result<()> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO usage_log (story_id, url, billed_ms, source, time) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![story_id, url, billed_ms, source, super::now()],
        )?;
        Ok(())
    }

    pub fn usage_totals(&self) -> rusqlite::Result<UsageTotals> {
        let conn = self.conn();
        let (log_count, log_ms): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(billed_ms), 0) FROM usage_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let (summary_count, summary_ms): (i64, i64) = conn.query_row(
            "SELECT COALESCE(SUM(request_count), 0), COALESCE(SUM(total_billed_ms), 0) FROM usage_summary",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(UsageTotals {
            request_count: log_count + summary_count,
            total_billed_ms: log_ms + summary_ms,
        })
    }

    pub fn usage_summary(&self) -> rusqlite::Result<Vec<UsageSummaryRow>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT month, request_count, total_billed_ms FROM usage_summary ORDER BY month DESC",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UsageSummaryRow {
                    month: row.get(0)?,
                    request_count: row.get(1)?,
                    total_billed_ms: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Rolls usage-log rows older than 6 months into `usage_summary` (upsert-add per `YYYY-MM`),
    /// then deletes the rolled-up rows. Summary rows older than 36 months are discarded outright.
    /// Returns the number of raw log rows rolled up.
    pub fn aggregate_old_usage(&self) -> rusqlite::Result<usize> {
        let now = super::now();
        let six_months_ago = now - 180 * 86_400;
        let thirty_six_months_ago = now - 36 * 30 * 86_400;

        let conn = self.conn();

        let months: Vec<String> = {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT strftime('%Y-%m', time, 'unixepoch') FROM usage_log WHERE time < ?1",
            )?;
            stmt.query_map(params![six_months_ago], |row| row.get(0))?
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut rolled = 0;
        for month in months {
            let (count, ms): (i64, i64) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(billed_ms), 0) FROM usage_log
                 WHERE time < ?1 AND strftime('%Y-%m', time, 'unixepoch') = ?2",
                params![six_months_ago, month],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            rolled += count as usize;

            conn.execute(
                "INSERT INTO usage_summary (month, request_count, total_billed_ms) VALUES (?1, ?2, ?3)
                 ON CONFLICT(month) DO UPDATE SET
                    request_count = request_count + excluded.request_count,
                    total_billed_ms = total_billed_ms + excluded.total_billed_ms",
                params![month, count, ms],
            )?;
        }

        conn.execute("DELETE FROM usage_log WHERE time < ?1", params![six_months_ago])?;

        let cutoff_month = chrono::DateTime::from_timestamp(thirty_six_months_ago, 0)
            .map(|dt| dt.format("%Y-%m").to_string())
            .unwrap_or_default();
        conn.execute("DELETE FROM usage_summary WHERE month < ?1", params![cutoff_month])?;

        Ok(rolled)
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::params;

    use crate::store::open_memory_for_test;

    #[test]
    fn aggregate_rolls_old_log_rows_into_monthly_summary_and_deletes_them() {
        let store = open_memory_for_test();
        let now = crate::store::now();
        let old = now - 200 * 86_400;

        {
            let conn = store.pool.get().unwrap();
            conn.execute(
                "INSERT INTO usage_log (story_id, url, billed_ms, source, time) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![1, "https://example.com/a", 500, "renderer", old],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO usage_log (story_id, url, billed_ms, source, time) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![2, "https://example.com/b", 300, "renderer", now],
            )
            .unwrap();
        }

        let rolled = store.aggregate_old_usage().unwrap();
        assert_eq!(rolled, 1);

        let totals = store.usage_totals().unwrap();
        assert_eq!(totals.request_count, 2);
        assert_eq!(totals.total_billed_ms, 800);

        let summary = store.usage_summary().unwrap();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].request_count, 1);
        assert_eq!(summary[0].total_billed_ms, 500);
    }
}
