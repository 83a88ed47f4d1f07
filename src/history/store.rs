use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::{HistoryError, HistoryRecord};

/// Records returned by a listing when the caller does not ask for fewer.
pub const DEFAULT_LIMIT: usize = 50;

/// Append-only JSON-lines log of history records.
pub struct HistoryStore {
    path: PathBuf,
    write: Mutex<()>,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn insert(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(id = %record.id, path = %self.path.display(), "history record appended");
        Ok(())
    }

    /// Newest records first, at most `limit` of them.
    pub async fn latest(&self, limit: usize) -> Result<Vec<HistoryRecord>, HistoryError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut records: Vec<HistoryRecord> = raw
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(idx, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(line = idx + 1, %err, "skipping unreadable history line");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::NewHistoryRecord;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    fn record(text: &str, minute: i64) -> HistoryRecord {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        NewHistoryRecord {
            original_text: Some(text.to_string()),
            ..Default::default()
        }
        .validate(base + Duration::minutes(minute))
        .unwrap()
    }

    #[tokio::test]
    async fn missing_file_lists_nothing() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("none.jsonl"));
        assert!(store.latest(DEFAULT_LIMIT).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn latest_is_newest_first_and_capped() {
        let dir = tempdir().unwrap();
        let store = HistoryStore::new(dir.path().join("nested/history.jsonl"));
        for minute in [3, 1, 7, 5] {
            store.insert(&record(&format!("t{minute}"), minute)).await.unwrap();
        }

        let latest = store.latest(3).await.unwrap();
        let texts: Vec<&str> = latest.iter().map(|r| r.original_text.as_str()).collect();
        assert_eq!(texts, vec!["t7", "t5", "t3"]);
    }

    #[tokio::test]
    async fn corrupt_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = HistoryStore::new(&path);
        store.insert(&record("kept", 0)).await.unwrap();
        let mut raw = fs::read_to_string(&path).await.unwrap();
        raw.push_str("{not json\n\n");
        fs::write(&path, raw).await.unwrap();

        let latest = store.latest(DEFAULT_LIMIT).await.unwrap();
        assert_eq!(latest.len(), 1);
        assert_eq!(latest[0].original_text, "kept");
    }
}
