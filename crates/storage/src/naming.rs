//! Incremental log-file naming

use crate::StorageError;
use std::path::{Path, PathBuf};

/// Upper bound on the run index; hitting it means the medium needs clearing
const MAX_INDEX: u32 = 10_000;

/// First unused `<prefix>_NNN.csv` under `dir`.
///
/// Selection happens once at startup, before the loops spawn; the returned
/// path may still race with other writers, which [`crate::LogFile::create`]
/// catches by refusing to clobber.
pub fn next_log_path(dir: &Path, prefix: &str) -> Result<PathBuf, StorageError> {
    for index in 0..MAX_INDEX {
        let candidate = dir.join(format!("{prefix}_{index:03}.csv"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(StorageError::NamesExhausted {
        dir: dir.to_path_buf(),
        tried: MAX_INDEX,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_dir_gets_index_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = next_log_path(dir.path(), "bench_run").unwrap();
        assert_eq!(path, dir.path().join("bench_run_000.csv"));
    }

    #[test]
    fn test_skips_existing_runs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bench_run_000.csv"), "x").unwrap();
        std::fs::write(dir.path().join("bench_run_001.csv"), "x").unwrap();

        let path = next_log_path(dir.path(), "bench_run").unwrap();
        assert_eq!(path, dir.path().join("bench_run_002.csv"));
    }

    #[test]
    fn test_prefixes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bench_run_000.csv"), "x").unwrap();

        let path = next_log_path(dir.path(), "cold_flow").unwrap();
        assert_eq!(path, dir.path().join("cold_flow_000.csv"));
    }
}
