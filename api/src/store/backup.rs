use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::Store;

struct Slot {
    name: &'static str,
    max_age: Duration,
}

/// 15 rotation slots ordered oldest-to-newest (largest max age first): each pass cascades files
/// from the previous entry in this list toward the next.
const SLOTS: &[Slot] = &[
    Slot { name: "4w", max_age: Duration::from_secs(4 * 7 * 86_400) },
    Slot { name: "3w", max_age: Duration::from_secs(3 * 7 * 86_400) },
    Slot { name: "2w", max_age: Duration::from_secs(2 * 7 * 86_400) },
    Slot { name: "1w", max_age: Duration::from_secs(7 * 86_400) },
    Slot { name: "7d", max_age: Duration::from_secs(7 * 86_400) },
    Slot { name: "6d", max_age: Duration::from_secs(6 * 86_400) },
    Slot { name: "5d", max_age: Duration::from_secs(5 * 86_400) },
    Slot { name: "4d", max_age: Duration::from_secs(4 * 86_400) },
    Slot { name: "3d", max_age: Duration::from_secs(3 * 86_400) },
    Slot { name: "2d", max_age: Duration::from_secs(2 * 86_400) },
    Slot { name: "1d", max_age: Duration::from_secs(86_400) },
    Slot { name: "12h", max_age: Duration::from_secs(12 * 3600) },
    Slot { name: "6h", max_age: Duration::from_secs(6 * 3600) },
    Slot { name: "2h", max_age: Duration::from_secs(2 * 3600) },
    Slot { name: "1h", max_age: Duration::from_secs(3600) },
];

fn slot_path(backups_dir: &Path, name: &str) -> PathBuf {
    backups_dir.join(format!("backup-{name}.db"))
}

fn file_age(path: &Path) -> Option<Duration> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

impl Store {
    /// Runs one backup rotation pass: cascades aged slot files toward older slots (or deletes the
    /// oldest slot's file once it's past its own max age), then writes a fresh online backup into
    /// the 1h slot, moving any existing 1h file to 2h first. A failure on any single step is
    /// logged and does not abort the remaining steps.
    pub fn rotate_backups(&self, backups_dir: &str) -> std::io::Result<()> {
        let dir = Path::new(backups_dir);
        std::fs::create_dir_all(dir)?;

        for (i, slot) in SLOTS.iter().enumerate() {
            let path = slot_path(dir, slot.name);
            let Some(age) = file_age(&path) else { continue };
            if age <= slot.max_age {
                continue;
            }

            if i == 0 {
                if let Err(err) = std::fs::remove_file(&path) {
                    tracing::warn!(?err, slot = slot.name, "failed to delete oldest backup slot");
                }
                continue;
            }

            let older = &SLOTS[i - 1];
            let older_path = slot_path(dir, older.name);
            match std::fs::copy(&path, &older_path) {
                Ok(_) => {
                    if let Err(err) = std::fs::remove_file(&path) {
                        tracing::warn!(?err, slot = slot.name, "failed to remove rotated backup source");
                    }
                }
                Err(err) => {
                    tracing::warn!(?err, from = slot.name, to = older.name, "failed to cascade backup slot");
                }
            }
        }

        let one_hour_path = slot_path(dir, "1h");
        let two_hour_path = slot_path(dir, "2h");
        if let Some(age) = file_age(&one_hour_path) {
            if age >= Duration::from_secs(3600) && !two_hour_path.exists() {
                if let Err(err) = std::fs::copy(&one_hour_path, &two_hour_path) {
                    tracing::warn!(?err, "failed to preserve existing 1h backup before overwrite");
                }
            }
        }

        if let Err(err) = self.write_online_backup(&one_hour_path) {
            tracing::warn!(?err, "online backup to 1h slot failed");
        }

        Ok(())
    }

    fn write_online_backup(&self, dest: &Path) -> rusqlite::Result<()> {
        let conn = self.conn();
        let mut dest_conn = rusqlite::Connection::open(dest)?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest_conn)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(250), None)
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::time::{Duration, SystemTime};

    use super::{slot_path, SLOTS};
    use crate::store::open_memory_for_test;

    fn touch_aged(path: &std::path::Path, age: Duration) {
        let file = File::create(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[test]
    fn aged_slot_cascades_toward_the_next_older_slot() {
        let store = open_memory_for_test();
        let dir = tempfile::tempdir().unwrap();

        let two_hour_path = slot_path(dir.path(), "2h");
        touch_aged(&two_hour_path, Duration::from_secs(8 * 3600));

        store.rotate_backups(dir.path().to_str().unwrap()).unwrap();

        assert!(!two_hour_path.exists(), "aged 2h slot should be rotated out");
        assert!(slot_path(dir.path(), "6h").exists(), "6h slot should receive the cascaded file");
        assert!(slot_path(dir.path(), "1h").exists(), "a fresh online backup should land in 1h");
    }

    #[test]
    fn oldest_slot_past_its_max_age_is_deleted_outright() {
        let store = open_memory_for_test();
        let dir = tempfile::tempdir().unwrap();

        let oldest = &SLOTS[0];
        let oldest_path = slot_path(dir.path(), oldest.name);
        touch_aged(&oldest_path, oldest.max_age + Duration::from_secs(3600));

        store.rotate_backups(dir.path().to_str().unwrap()).unwrap();

        assert!(!oldest_path.exists(), "oldest slot past its max age has nowhere to cascade to");
    }
}
