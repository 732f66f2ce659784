//! Whole-file JSON persistence for the anchor and counter records.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tokio::fs;

use crate::dao::{
    models::{AnchorRecord, CounterRecord},
    storage::{StorageError, StorageResult},
};

use super::StateStore;

/// File holding the verification anchor record.
pub const ANCHOR_FILE: &str = "verification.json";
/// File holding the counting game record.
pub const COUNTER_FILE: &str = "counting.json";

/// Failures specific to the JSON file backend.
#[derive(Debug, Error)]
pub enum JsonFileError {
    /// The record file exists but could not be read.
    #[error("failed to read `{path}`")]
    Read {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The record file could not be written or replaced.
    #[error("failed to write `{path}`")]
    Write {
        /// File that was accessed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The record file holds invalid JSON.
    #[error("failed to parse `{path}`")]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Parser failure.
        #[source]
        source: serde_json::Error,
    },
    /// The record could not be serialised.
    #[error("failed to encode record for `{path}`")]
    Encode {
        /// File the record was meant for.
        path: PathBuf,
        /// Serialiser failure.
        #[source]
        source: serde_json::Error,
    },
}

impl From<JsonFileError> for StorageError {
    fn from(err: JsonFileError) -> Self {
        match err {
            JsonFileError::Parse { .. } => StorageError::corrupt(err.to_string(), err),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}

/// [`StateStore`] writing each record to its own JSON file inside a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    anchor_path: Arc<Path>,
    counter_path: Arc<Path>,
}

impl JsonFileStore {
    /// Store records inside `dir` (created on first write).
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            anchor_path: Arc::from(dir.join(ANCHOR_FILE)),
            counter_path: Arc::from(dir.join(COUNTER_FILE)),
        }
    }

    async fn read<T>(path: &Path) -> Result<T, JsonFileError>
    where
        T: DeserializeOwned + Default,
    {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(source) => {
                return Err(JsonFileError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_str(&contents).map_err(|source| JsonFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Overwrite the whole file: write a sibling temporary file, then rename over the target.
    async fn write<T>(path: &Path, record: &T) -> Result<(), JsonFileError>
    where
        T: Serialize,
    {
        let payload = serde_json::to_vec(record).map_err(|source| JsonFileError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| JsonFileError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, payload)
            .await
            .map_err(|source| JsonFileError::Write {
                path: tmp.clone(),
                source,
            })?;
        fs::rename(&tmp, path)
            .await
            .map_err(|source| JsonFileError::Write {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl StateStore for JsonFileStore {
    fn load_anchor(&self) -> BoxFuture<'static, StorageResult<AnchorRecord>> {
        let path = self.anchor_path.clone();
        Box::pin(async move { Self::read(&path).await.map_err(Into::into) })
    }

    fn save_anchor(&self, record: AnchorRecord) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.anchor_path.clone();
        Box::pin(async move { Self::write(&path, &record).await.map_err(Into::into) })
    }

    fn load_counter(&self) -> BoxFuture<'static, StorageResult<CounterRecord>> {
        let path = self.counter_path.clone();
        Box::pin(async move { Self::read(&path).await.map_err(Into::into) })
    }

    fn save_counter(&self, record: CounterRecord) -> BoxFuture<'static, StorageResult<()>> {
        let path = self.counter_path.clone();
        Box::pin(async move { Self::write(&path, &record).await.map_err(Into::into) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_files_load_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        assert_eq!(store.load_anchor().await.unwrap(), AnchorRecord::default());
        assert_eq!(store.load_counter().await.unwrap().last_accepted_number, 0);
    }

    #[tokio::test]
    async fn records_are_written_in_the_documented_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store
            .save_anchor(AnchorRecord {
                message_id: Some(1234),
            })
            .await
            .unwrap();
        store
            .save_counter(CounterRecord {
                last_accepted_number: 42,
            })
            .await
            .unwrap();

        let anchor: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(ANCHOR_FILE)).unwrap()).unwrap();
        assert_eq!(anchor, serde_json::json!({ "message_id": 1234 }));

        let counter: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join(COUNTER_FILE)).unwrap()).unwrap();
        assert_eq!(counter, serde_json::json!({ "last_accepted_number": 42 }));

        assert!(!dir.path().join("counting.json.tmp").exists());
    }

    #[tokio::test]
    async fn overwrites_replace_the_whole_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        for value in [1, 2, 3] {
            store
                .save_counter(CounterRecord {
                    last_accepted_number: value,
                })
                .await
                .unwrap();
        }

        assert_eq!(store.load_counter().await.unwrap().last_accepted_number, 3);
    }

    #[tokio::test]
    async fn legacy_null_anchor_is_accepted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(ANCHOR_FILE), r#"{"message_id": null}"#).unwrap();

        let store = JsonFileStore::new(dir.path());
        assert_eq!(store.load_anchor().await.unwrap().message_id, None);
    }

    #[tokio::test]
    async fn unparsable_file_is_reported_as_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(COUNTER_FILE), "not json").unwrap();

        let store = JsonFileStore::new(dir.path());
        let err = store.load_counter().await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn creates_missing_state_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state").join("bot");
        let store = JsonFileStore::new(&nested);

        store
            .save_counter(CounterRecord {
                last_accepted_number: 7,
            })
            .await
            .unwrap();
        assert!(nested.join(COUNTER_FILE).exists());
    }
}
