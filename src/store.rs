//! Record persistence
//!
//! The protocol hands its finished record to a [`RecordStore`] exactly once. A
//! failing store is reported back to the caller as-is; nothing here retries.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::encoder::{RecordEncoder, RecordEnvelope};
use crate::error::StoreError;
use crate::types::BiomarkerRecord;

/// Persistence collaborator for finished records
pub trait RecordStore {
    /// Persist `record` and return its identifier
    fn save(&mut self, record: &BiomarkerRecord) -> Result<String, StoreError>;
}

/// One line of a record file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(flatten)]
    pub envelope: RecordEnvelope,
}

/// Append-only NDJSON store on the local filesystem
pub struct FileRecordStore {
    path: PathBuf,
    encoder: RecordEncoder,
    last_saved: Option<StoredRecord>,
}

impl FileRecordStore {
    /// Store records in `path`, creating the file on first save
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_encoder(path, RecordEncoder::new())
    }

    pub fn with_encoder(path: impl Into<PathBuf>, encoder: RecordEncoder) -> Self {
        Self {
            path: path.into(),
            encoder,
            last_saved: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The line written by the most recent successful save
    pub fn last_saved(&self) -> Option<&StoredRecord> {
        self.last_saved.as_ref()
    }

    /// Read back every stored record. A missing file reads as empty.
    pub fn load_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

impl RecordStore for FileRecordStore {
    fn save(&mut self, record: &BiomarkerRecord) -> Result<String, StoreError> {
        let stored = StoredRecord {
            id: Uuid::new_v4().to_string(),
            envelope: self.encoder.encode(record),
        };
        let line = serde_json::to_string(&stored)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;

        log::debug!("stored record {} in {}", stored.id, self.path.display());
        let id = stored.id.clone();
        self.last_saved = Some(stored);
        Ok(id)
    }
}

/// In-process store, useful for embedding and tests
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: Vec<(String, BiomarkerRecord)>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[(String, BiomarkerRecord)] {
        &self.records
    }

    pub fn get(&self, id: &str) -> Option<&BiomarkerRecord> {
        self.records
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, record)| record)
    }
}

impl RecordStore for MemoryRecordStore {
    fn save(&mut self, record: &BiomarkerRecord) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        self.records.push((id.clone(), record.clone()));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Biomarkers, FrownMetrics, SmileMetrics, Subject, Summary};
    use pretty_assertions::assert_eq;

    fn record(name: &str) -> BiomarkerRecord {
        BiomarkerRecord {
            subject: Subject::new(name, 30).unwrap(),
            biomarkers: Biomarkers {
                baseline_stability: 0.01,
                smile_metrics: SmileMetrics {
                    peak_intensity: 0.7,
                    latency_ms: 280,
                    symmetry: 0.9,
                },
                frown_metrics: FrownMetrics {
                    peak_intensity: 0.5,
                    latency_ms: 350,
                },
                blink_rate: 11.0,
            },
            summary: Summary::Normal,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_file_store_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.ndjson");
        let mut store = FileRecordStore::new(&path);

        assert!(store.load_all().unwrap().is_empty());

        let first = store.save(&record("Ada")).unwrap();
        let second = store.save(&record("Grace")).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.last_saved().map(|s| s.id.as_str()), Some(second.as_str()));

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first);
        assert_eq!(loaded[0].envelope.record, record("Ada"));
        assert_eq!(loaded[1].envelope.record.subject.name, "Grace");
        // What was written is exactly what the caller can echo back
        assert_eq!(store.last_saved(), Some(&loaded[1]));
    }

    #[test]
    fn test_file_store_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened for appending
        let mut store = FileRecordStore::new(dir.path());
        assert!(matches!(store.save(&record("Ada")), Err(StoreError::Io(_))));
        assert!(store.last_saved().is_none());
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryRecordStore::new();
        let id = store.save(&record("Ada")).unwrap();
        assert_eq!(store.records().len(), 1);
        assert_eq!(store.get(&id), Some(&record("Ada")));
        assert!(store.get("missing").is_none());
    }
}
