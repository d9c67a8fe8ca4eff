//! JSONL audit sink - one JSON object per line, append-only

use super::error::SinkError;
use super::sinks::{AuditRecord, AuditSink};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

pub struct JsonlAuditSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlAuditSink {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::info!("📝 Writing audit log to: {}", path.display());

        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse every well-formed line; malformed lines are skipped
    fn load(&self) -> Result<Vec<AuditRecord>, SinkError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AuditRecord>(&line) {
                Ok(record) => records.push(record),
                Err(e) => log::debug!("Skipping malformed audit line: {}", e),
            }
        }
        Ok(records)
    }
}

#[async_trait]
impl AuditSink for JsonlAuditSink {
    async fn record(&self, record: &AuditRecord) -> Result<(), SinkError> {
        let json = serde_json::to_string(record)?;

        let mut writer = self.writer.lock().await;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        Ok(())
    }

    async fn read_recent(&self, limit: usize, offset: usize) -> Result<Vec<AuditRecord>, SinkError> {
        // Hold the writer lock so a concurrent append is never read half-written
        let _guard = self.writer.lock().await;

        let mut records = self.load()?;
        records.reverse();
        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        Ok(records.into_iter().skip(offset).take(limit).collect())
    }

    /// Number of non-empty lines in the file. Malformed lines are counted
    /// here even though `read_recent` skips them, so the two can disagree
    /// after a torn write.
    async fn count(&self) -> Result<usize, SinkError> {
        let _guard = self.writer.lock().await;

        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut count = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn backend_type(&self) -> &'static str {
        "JSONL"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sinks::AuditStatus;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let sink = JsonlAuditSink::new(dir.path().join("audit_log.jsonl")).unwrap();

        for i in 0..3 {
            sink.record(&AuditRecord::system(
                "safety_alert",
                format!("alert/{}", i),
                serde_json::json!({ "seq": i }),
            ))
            .await
            .unwrap();
        }

        assert_eq!(sink.count().await.unwrap(), 3);

        let recent = sink.read_recent(10, 0).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].resource, "alert/2");
        assert_eq!(recent[0].details["seq"], 2);

        let page = sink.read_recent(1, 1).await.unwrap();
        assert_eq!(page[0].resource, "alert/1");
    }

    #[tokio::test]
    async fn test_malformed_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit_log.jsonl");
        let sink = JsonlAuditSink::new(&path).unwrap();

        sink.record(&AuditRecord::new(
            Some("commander"),
            "approve",
            "recommendation",
            AuditStatus::Success,
            serde_json::Value::Null,
        ))
        .await
        .unwrap();

        {
            let mut file = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "not json").unwrap();
        }

        // count() counts lines; read_recent() only parses valid records
        assert_eq!(sink.count().await.unwrap(), 2);
        let records = sink.read_recent(10, 0).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user.as_deref(), Some("commander"));
    }

    #[tokio::test]
    async fn test_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logs").join("audit.jsonl");
        let sink = JsonlAuditSink::new(&path).unwrap();

        sink.record(&AuditRecord::system("startup", "pipeline", serde_json::Value::Null))
            .await
            .unwrap();
        assert!(path.exists());
        assert_eq!(sink.path(), path.as_path());
    }
}
