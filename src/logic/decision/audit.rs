//! Decision Audit Writer
//!
//! Append-only JSONL file of DecisionRecords with size-based rotation.
//! Location: {data_dir}/risk-fusion/audit/decisions_*.jsonl

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::store::StoreError;
use super::types::DecisionRecord;

/// Maximum file size before rotation (10 MB)
const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

const FILE_PREFIX: &str = "decisions_";
const LOG_EXT: &str = "jsonl";

pub struct AuditWriter {
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_size: u64,
    base_dir: PathBuf,
    max_file_size: u64,
    sequence: u32,
}

impl AuditWriter {
    pub fn new(base_dir: PathBuf) -> Result<Self, StoreError> {
        Self::with_max_size(base_dir, MAX_FILE_SIZE)
    }

    pub fn with_max_size(base_dir: PathBuf, max_file_size: u64) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&base_dir)?;
        let (current_file, file) = Self::open_new_file(&base_dir, 0)?;

        Ok(Self {
            writer: BufWriter::new(file),
            current_file,
            current_size: 0,
            base_dir,
            max_file_size: max_file_size.max(1),
            sequence: 0,
        })
    }

    /// Default location under the local data dir
    pub fn default_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("risk-fusion")
            .join("audit")
    }

    fn open_new_file(base_dir: &Path, sequence: u32) -> Result<(PathBuf, File), StoreError> {
        let filename = format!(
            "{}{}_{:03}.{}",
            FILE_PREFIX,
            Utc::now().format("%Y_%m_%d_%H%M%S"),
            sequence,
            LOG_EXT
        );
        let path = base_dir.join(filename);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        log::info!("[Audit] Opened decision audit log: {:?}", path);
        Ok((path, file))
    }

    pub fn record(&mut self, record: &DecisionRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(record)?;
        let bytes = line.len() as u64 + 1;

        if self.current_size > 0 && self.current_size + bytes > self.max_file_size {
            self.rotate()?;
        }

        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.current_size += bytes;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        self.sequence += 1;

        let (path, file) = Self::open_new_file(&self.base_dir, self.sequence)?;
        log::info!("[Audit] Rotated decision audit from {:?} to {:?}", self.current_file, path);

        self.writer = BufWriter::new(file);
        self.current_file = path;
        self.current_size = 0;
        Ok(())
    }

    pub fn current_file(&self) -> &Path {
        &self.current_file
    }
}

/// Read every record from one audit file, skipping malformed lines
pub fn read_records(path: &Path) -> Result<Vec<DecisionRecord>, StoreError> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<DecisionRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("[Audit] Skipping malformed audit line: {}", e),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::decision::DecisionAction;
    use crate::logic::fusion::ThreatLevel;
    use std::collections::BTreeSet;

    fn record(score: f64) -> DecisionRecord {
        DecisionRecord::new(ThreatLevel::Low, score, DecisionAction::Logged, BTreeSet::new())
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AuditWriter::new(dir.path().to_path_buf()).unwrap();

        writer.record(&record(0.1)).unwrap();
        writer.record(&record(0.2)).unwrap();

        let records = read_records(writer.current_file()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].overall_score, 0.2);
        assert_eq!(records[0].action, DecisionAction::Logged);
    }

    #[test]
    fn test_default_dir_layout() {
        let dir = AuditWriter::default_dir();
        assert!(dir.ends_with("risk-fusion/audit"));
    }

    #[test]
    fn test_rotation_creates_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = AuditWriter::with_max_size(dir.path().to_path_buf(), 64).unwrap();
        let first = writer.current_file().to_path_buf();

        writer.record(&record(0.1)).unwrap();
        writer.record(&record(0.2)).unwrap();

        assert_ne!(writer.current_file(), first.as_path());
        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 2);
        assert_eq!(read_records(&first).unwrap().len(), 1);
    }
}
