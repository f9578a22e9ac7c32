//! Append-only log of estimate submissions
//!
//! The log is a single JSON array on disk. Each append rewrites the whole
//! file through a temp file and rename so readers never see a torn write.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Submission log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Submission log is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// One stored questionnaire submission with its generated estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRecord {
    pub id: String,
    pub submitted_at: DateTime<Utc>,
    pub contact: Value,
    pub answers: Value,
    pub estimate: Value,
}

impl SubmissionRecord {
    pub fn new(contact: Value, answers: Value, estimate: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            submitted_at: Utc::now(),
            contact,
            answers,
            estimate,
        }
    }
}

pub struct SubmissionStore {
    path: PathBuf,
    // Serializes read-modify-write cycles across handler tasks
    lock: Mutex<()>,
}

impl SubmissionStore {
    pub const FILE_NAME: &'static str = "submissions.json";

    /// Store writing to `submissions.json` under `data_dir`
    pub fn in_dir(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(Self::FILE_NAME),
            lock: Mutex::new(()),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &SubmissionRecord) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let mut records = self.read_unlocked().await?;
        records.push(serde_json::to_value(record)?);

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&records)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::info!(id = %record.id, total = records.len(), "Stored submission");
        Ok(())
    }

    /// All stored records, oldest first
    #[cfg(test)]
    pub async fn list(&self) -> Result<Vec<SubmissionRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        self.read_unlocked()
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(StoreError::from))
            .collect()
    }

    async fn read_unlocked(&self) -> Result<Vec<Value>, StoreError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }
}
