//! Append-only storage for accepted survey records

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

use crate::error::StorageError;
use crate::models::StoredSurveyRecord;

/// Append target for stored survey records.
///
/// Entries are only ever added at the tail; nothing is updated or removed.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append one record as a single complete entry
    async fn append(&self, record: &StoredSurveyRecord) -> Result<(), StorageError>;
}

/// Newline-delimited JSON file, one record per line
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesStore {
    /// Create a store appending to `path`. The file is created on first append.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl RecordStore for JsonLinesStore {
    async fn append(&self, record: &StoredSurveyRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        let offset = file.metadata().await.map_err(|e| self.io_error(e))?.len();

        self.commit(&mut file, offset, &line).await?;
        if let Err(err) = file.sync_data().await {
            return Err(self.roll_back(offset, err).await);
        }

        debug!(
            "Appended record {} to {}",
            record.submission().submission_id(),
            self.path.display()
        );
        Ok(())
    }
}

impl JsonLinesStore {
    /// Write one entry at `offset`, cutting the file back to `offset` if the
    /// write fails partway.
    async fn commit<W>(&self, writer: &mut W, offset: u64, line: &[u8]) -> Result<(), StorageError>
    where
        W: AsyncWrite + Unpin,
    {
        match write_entry(writer, line).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.roll_back(offset, err).await),
        }
    }

    async fn roll_back(&self, offset: u64, err: io::Error) -> StorageError {
        warn!(
            "Append to {} failed, rolling back to offset {}: {}",
            self.path.display(),
            offset,
            err
        );
        if let Err(rollback) = truncate_to(&self.path, offset).await {
            error!(
                "Failed to roll back partial entry in {}: {}",
                self.path.display(),
                rollback
            );
        }
        self.io_error(err)
    }
}

async fn write_entry<W>(writer: &mut W, line: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(line).await?;
    writer.flush().await
}

async fn truncate_to(path: &Path, offset: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path).await?;
    file.set_len(offset).await?;
    file.sync_data().await
}

/// In-memory record store, for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<StoredSurveyRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all appended records, in append order
    pub async fn records(&self) -> Vec<StoredSurveyRecord> {
        self.records.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, record: &StoredSurveyRecord) -> Result<(), StorageError> {
        self.records.lock().await.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::validate;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};
    use std::pin::Pin;
    use std::sync::Arc;
    use std::task::{ready, Context, Poll};
    use tokio::fs::File;

    /// Accepts `budget` bytes, then fails every write like a full device.
    struct ShortDevice {
        inner: File,
        budget: usize,
    }

    impl AsyncWrite for ShortDevice {
        fn poll_write(
            self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = self.get_mut();
            if this.budget == 0 {
                // Land the bytes already accepted before reporting failure
                ready!(Pin::new(&mut this.inner).poll_flush(cx))?;
                return Poll::Ready(Err(io::Error::other("no space left on device")));
            }
            let n = buf.len().min(this.budget);
            let written = ready!(Pin::new(&mut this.inner).poll_write(cx, &buf[..n]))?;
            this.budget -= written;
            Poll::Ready(Ok(written))
        }

        fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_flush(cx)
        }

        fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
        }
    }

    fn record(id: &str) -> StoredSurveyRecord {
        let Value::Object(payload) = json!({ "submission_id": id, "answer": "yes" }) else {
            unreachable!()
        };
        let submission = validate(&payload).unwrap();
        let received_at = Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap();
        StoredSurveyRecord::new(submission, received_at, "10.0.0.1")
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_creates_file_and_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("survey.ndjson");
        let store = JsonLinesStore::new(&path);

        store.append(&record("first")).await.unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["submission_id"], "first");
        assert_eq!(lines[0]["received_at"], "2024-01-01T10:15:00Z");
        assert_eq!(lines[0]["ip"], "10.0.0.1");
        assert_eq!(lines[0]["rating"], Value::Null);
    }

    #[tokio::test]
    async fn test_appends_in_order_without_rewriting() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.ndjson");
        std::fs::write(&path, "{\"existing\":true}\n").unwrap();
        let store = JsonLinesStore::new(&path);

        for id in ["a", "b", "c"] {
            store.append(&record(id)).await.unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["existing"], true);
        let ids: Vec<&str> = lines[1..]
            .iter()
            .map(|l| l["submission_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.ndjson");
        let store = Arc::new(JsonLinesStore::new(&path));

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.append(&record(&format!("id-{i}"))).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 32);
        let mut ids: Vec<String> = lines
            .iter()
            .map(|l| l["submission_id"].as_str().unwrap().to_string())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 32);
    }

    #[tokio::test]
    async fn test_unwritable_target_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let store = JsonLinesStore::new(dir.path());

        let err = store.append(&record("x")).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
    }

    #[tokio::test]
    async fn test_failed_write_is_rolled_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("survey.ndjson");
        let store = JsonLinesStore::new(&path);
        store.append(&record("kept")).await.unwrap();
        let offset = std::fs::metadata(&path).unwrap().len();

        let file = OpenOptions::new().append(true).open(&path).await.unwrap();
        let mut device = ShortDevice {
            inner: file,
            budget: 10,
        };
        let mut line = serde_json::to_vec(&record("lost")).unwrap();
        line.push(b'\n');

        let err = store.commit(&mut device, offset, &line).await.unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        drop(device);

        assert_eq!(std::fs::metadata(&path).unwrap().len(), offset);
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["submission_id"], "kept");

        store.append(&record("next")).await.unwrap();
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["submission_id"], "next");
    }

    #[tokio::test]
    async fn test_memory_store_keeps_order() {
        let store = MemoryStore::new();
        assert!(store.is_empty().await);

        store.append(&record("a")).await.unwrap();
        store.append(&record("b")).await.unwrap();

        let records = store.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].submission().submission_id(), "a");
        assert_eq!(records[1].submission().submission_id(), "b");
    }
}
