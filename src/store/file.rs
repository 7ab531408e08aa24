//! JSON file store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::{fs, sync::Mutex};
use tracing::{debug, warn};

use super::{select, KeyValueStore, Record};
use crate::error::StoreError;

/// Store backed by a single JSON object on disk.
///
/// Writes read the current object, merge the new keys and replace the file
/// through a temporary sibling, so a crash mid-write leaves the old contents.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable store file is moved before a fresh one is written
    pub fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("json.corrupt")
    }

    /// Move an unreadable file out of the way so writes can start over
    async fn set_aside(&self, err: &StoreError) -> Result<(), StoreError> {
        let corrupt = self.corrupt_path();
        warn!(
            "Store file {} is unreadable ({}), moving it to {}",
            self.path.display(),
            err,
            corrupt.display()
        );
        fs::rename(&self.path, &corrupt).await?;
        Ok(())
    }

    async fn read_all(&self) -> Result<Record, StoreError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Store file {} does not exist yet", self.path.display());
                return Ok(Record::new());
            }
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Record::new());
        }
        match serde_json::from_slice(&bytes)? {
            Value::Object(record) => Ok(record),
            _ => Err(StoreError::NotAnObject),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<Record, StoreError> {
        let all = self.read_all().await?;
        Ok(select(&all, keys))
    }

    async fn set(&self, record: Record) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut all = match self.read_all().await {
            Ok(all) => all,
            Err(e @ (StoreError::Json(_) | StoreError::NotAnObject)) => {
                self.set_aside(&e).await?;
                Record::new()
            }
            Err(e) => return Err(e),
        };
        all.extend(record);

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&Value::Object(all))?;
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nope.json"));
        assert!(store.get(&["settings"]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn writes_survive_a_new_handle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::new(&path);
        assert_eq!(store.path(), path.as_path());
        let mut record = Record::new();
        record.insert("timerState".into(), json!({"timeLeft": 42}));
        store.set(record).await.unwrap();

        let mut record = Record::new();
        record.insert("tasks".into(), json!([{"title": "inbox zero"}]));
        store.set(record).await.unwrap();

        let reopened = JsonFileStore::new(&path);
        let got = reopened.get(&["timerState", "tasks"]).await.unwrap();
        assert_eq!(got["timerState"]["timeLeft"], 42);
        assert_eq!(got["tasks"][0]["title"], "inbox zero");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_set_aside_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, r#"{"settings": {"workTime": 25"#).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get(&["settings"]).await,
            Err(StoreError::Json(_))
        ));

        let mut record = Record::new();
        record.insert("timerState".into(), json!({"timeLeft": 600}));
        store.set(record).await.unwrap();
        let mut record = Record::new();
        record.insert("stats".into(), json!({"completedSessions": 2}));
        store.set(record).await.unwrap();

        let got = store.get(&["settings", "timerState", "stats"]).await.unwrap();
        assert!(got.get("settings").is_none());
        assert_eq!(got["timerState"]["timeLeft"], 600);
        assert_eq!(got["stats"]["completedSessions"], 2);
        assert_eq!(
            std::fs::read_to_string(store.corrupt_path()).unwrap(),
            r#"{"settings": {"workTime": 25"#
        );
    }

    #[tokio::test]
    async fn non_object_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(
            store.get(&["settings"]).await,
            Err(StoreError::NotAnObject)
        ));
    }
}
