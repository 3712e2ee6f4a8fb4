//! Append-only JSON Lines journal.
//!
//! Uses JSON Lines format (.jsonl) for robustness:
//! - Each line is a complete JSON object
//! - Partial file corruption only affects individual lines
//! - Can be read even if a write was interrupted
//!
//! One file per UTC day per stream (`<stream>_YYYY-MM-DD.jsonl`), opened in
//! append mode. File rotation uses the wall clock; record timestamps inside
//! the lines come from the domain `Clock` upstream.

use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use tracing::{debug, info, warn};

use crate::error::StoreResult;

/// Active writer state for the current daily file.
struct ActiveWriter {
    writer: BufWriter<File>,
    date: String,
    records_written: usize,
}

/// Date-rotated JSON Lines journal for one record stream.
pub struct JsonLinesJournal<T: Serialize> {
    /// Base directory for output files.
    base_dir: String,
    /// Stream name, used as the file prefix.
    stream: String,
    /// Buffer of pending records.
    buffer: Vec<T>,
    /// Maximum buffer size before flush.
    max_buffer_size: usize,
    /// Active writer (open until date rotation).
    active_writer: Option<ActiveWriter>,
}

impl<T: Serialize> JsonLinesJournal<T> {
    /// Create a journal for `stream` under `base_dir`.
    pub fn new(base_dir: &str, stream: &str, max_buffer_size: usize) -> Self {
        if let Err(e) = std::fs::create_dir_all(base_dir) {
            warn!(?e, "Failed to create journal directory: {}", base_dir);
        }

        Self {
            base_dir: base_dir.to_string(),
            stream: stream.to_string(),
            buffer: Vec::with_capacity(max_buffer_size),
            max_buffer_size,
            active_writer: None,
        }
    }

    /// Buffer a record, flushing when the buffer fills.
    pub fn append(&mut self, record: T) -> StoreResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_buffer_size {
            self.flush()?;
        }

        Ok(())
    }

    fn close_active_writer(&mut self) -> StoreResult<()> {
        if let Some(mut active) = self.active_writer.take() {
            if let Err(e) = active.writer.flush() {
                warn!(?e, stream = %self.stream, "Failed to flush journal on close");
            }
            info!(
                stream = %self.stream,
                date = %active.date,
                records = active.records_written,
                "Closed journal file"
            );
        }
        Ok(())
    }

    fn create_new_writer(&mut self, date: &str) -> StoreResult<()> {
        let filename = format!("{}/{}_{}.jsonl", self.base_dir, self.stream, date);

        info!(filename = %filename, "Opening journal file (append mode)");

        // Append mode - never truncates existing data.
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&filename)?;

        self.active_writer = Some(ActiveWriter {
            writer: BufWriter::new(file),
            date: date.to_string(),
            records_written: 0,
        });

        Ok(())
    }

    /// Flush the buffer to the current daily file.
    pub fn flush(&mut self) -> StoreResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let today = Utc::now().format("%Y-%m-%d").to_string();

        let needs_rotation = self
            .active_writer
            .as_ref()
            .map(|w| w.date != today)
            .unwrap_or(false);

        if needs_rotation {
            self.close_active_writer()?;
        }

        if self.active_writer.is_none() {
            self.create_new_writer(&today)?;
        }

        let record_count = self.buffer.len();

        {
            let active = self
                .active_writer
                .as_mut()
                .expect("active_writer should exist");

            for record in &self.buffer {
                let json = serde_json::to_string(record)?;
                writeln!(active.writer, "{}", json)?;
            }

            active.writer.flush()?;
            active.records_written += record_count;
        }

        debug!(
            stream = %self.stream,
            date = %today,
            records = record_count,
            "Flushed journal records"
        );

        self.buffer.clear();

        Ok(())
    }

    /// Flush any pending records and close the file.
    pub fn close(&mut self) -> StoreResult<()> {
        self.flush()?;
        self.close_active_writer()
    }
}

impl<T: Serialize> Drop for JsonLinesJournal<T> {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(?e, stream = %self.stream, "Failed to flush journal on drop");
        }
        if let Err(e) = self.close_active_writer() {
            warn!(?e, stream = %self.stream, "Failed to close journal on drop");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::{BufRead, BufReader};
    use tempfile::TempDir;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct TestRecord {
        id: u64,
        label: String,
    }

    fn record(id: u64) -> TestRecord {
        TestRecord {
            id,
            label: format!("rec_{}", id),
        }
    }

    fn read_lines(dir: &TempDir) -> Vec<String> {
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(entries.len(), 1);
        let file = File::open(entries[0].path()).unwrap();
        BufReader::new(file).lines().filter_map(|l| l.ok()).collect()
    }

    #[test]
    fn test_write_and_read_back() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal =
            JsonLinesJournal::new(temp_dir.path().to_str().unwrap(), "snapshots", 100);

        for i in 0..5 {
            journal.append(record(i)).unwrap();
        }
        journal.close().unwrap();

        let lines = read_lines(&temp_dir);
        assert_eq!(lines.len(), 5);
        let first: TestRecord = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first, record(0));
    }

    #[test]
    fn test_append_mode_across_writers() {
        let temp_dir = TempDir::new().unwrap();

        {
            let mut journal =
                JsonLinesJournal::new(temp_dir.path().to_str().unwrap(), "outcomes", 100);
            for i in 0..3 {
                journal.append(record(i)).unwrap();
            }
            journal.close().unwrap();
        }
        {
            let mut journal =
                JsonLinesJournal::new(temp_dir.path().to_str().unwrap(), "outcomes", 100);
            for i in 3..6 {
                journal.append(record(i)).unwrap();
            }
            journal.close().unwrap();
        }

        assert_eq!(read_lines(&temp_dir).len(), 6);
    }

    #[test]
    fn test_buffer_flushes_at_capacity() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = JsonLinesJournal::new(temp_dir.path().to_str().unwrap(), "alerts", 2);

        journal.append(record(0)).unwrap();
        journal.append(record(1)).unwrap(); // triggers flush
        journal.append(record(2)).unwrap();
        journal.close().unwrap();

        assert_eq!(read_lines(&temp_dir).len(), 3);
    }

    #[test]
    fn test_empty_flush_creates_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut journal = JsonLinesJournal::<TestRecord>::new(
            temp_dir.path().to_str().unwrap(),
            "snapshots",
            100,
        );
        journal.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert!(entries.is_empty());
    }
}
