//! Storage Layer
//!
//! The consumer side of the pipeline: claims sealed record buffers and
//! appends them to a CSV log with an explicit sync after every buffer, so
//! data survives a crash immediately after the write returns. A failed
//! write costs exactly one buffer's records and never stops acquisition.

mod log_file;
mod naming;
mod writer;

pub use log_file::{format_record, LogFile, RecordSink, CSV_HEADER};
pub use naming::next_log_path;
pub use writer::{StorageWriter, WriterConfig, WriterStats};

use std::path::PathBuf;
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("no unused log name under {dir} (tried {tried} indices)")]
    NamesExhausted { dir: PathBuf, tried: u32 },
}
