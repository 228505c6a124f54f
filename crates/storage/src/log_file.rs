//! Append-only CSV log file

use crate::StorageError;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;
use transducer::SampleRecord;

/// Fixed first line of every log file
pub const CSV_HEADER: &str = "peso_kg,peso_N,pressao_sd,pressao_conv,tempo";

/// Serialize one record as a CSV line (no trailing newline).
///
/// Field order and the two-decimal float format match the bench's
/// long-standing log layout; downstream tooling parses it positionally.
pub fn format_record(record: &SampleRecord) -> String {
    format!(
        "{:.2},{:.2},{:.2},{:.2},{}",
        record.weight_kg,
        record.weight_n,
        record.raw_pressure,
        record.pressure_conv,
        record.timestamp_ms
    )
}

/// Destination for drained record buffers.
///
/// `append` stages a whole buffer; `sync` must not return before the data
/// is durable. Split so the writer loop can count the two failure modes
/// separately and tests can inject either.
pub trait RecordSink {
    fn append(&mut self, records: &[SampleRecord]) -> Result<(), StorageError>;

    /// Force everything appended so far onto durable storage.
    fn sync(&mut self) -> Result<(), StorageError>;
}

/// CSV log backed by a file handle that stays open for the whole run.
pub struct LogFile {
    file: File,
    path: PathBuf,
    /// Reused serialization buffer; one write_all per drained buffer
    stage: String,
}

impl LogFile {
    /// Create a fresh log: writes the header and syncs it. Refuses to
    /// clobber an existing file; name selection happens upstream.
    pub fn create(path: &Path) -> Result<Self, StorageError> {
        let mut file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(path)?;
        file.write_all(CSV_HEADER.as_bytes())?;
        file.write_all(b"\n")?;
        file.sync_data()?;
        info!(path = %path.display(), "log file created");
        Ok(Self {
            file,
            path: path.to_path_buf(),
            stage: String::new(),
        })
    }

    /// Reopen an existing log for append; the header is assumed present.
    pub fn open_append(path: &Path) -> Result<Self, StorageError> {
        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            stage: String::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordSink for LogFile {
    fn append(&mut self, records: &[SampleRecord]) -> Result<(), StorageError> {
        self.stage.clear();
        for record in records {
            self.stage.push_str(&format_record(record));
            self.stage.push('\n');
        }
        self.file.write_all(self.stage.as_bytes())?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.file.sync_data()?;
        Ok(())
    }
}
