//! Runtime configuration

use acquisition::SamplerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use storage::WriterConfig;
use thiserror::Error;
use transducer::ConverterConfig;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),

    #[error("{field} must be non-zero")]
    Zero { field: &'static str },
}

/// Full runtime configuration.
///
/// Assembled in layers: built-in defaults, then an optional TOML file, then
/// `BENCH_*` environment overrides (`BENCH_ACQUISITION__CYCLES_PER_BUFFER`
/// and friends).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub acquisition: AcquisitionSection,
    pub calibration: ConverterConfig,
    pub storage: StorageSection,
}

/// `[acquisition]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionSection {
    /// Sample steps per buffer; also the buffer capacity
    pub cycles_per_buffer: usize,
    /// Fixed sample period in microseconds
    pub sample_interval_us: u64,
    /// Stop after this many buffers (unset = run until Ctrl-C)
    pub run_limit: Option<u64>,
}

impl Default for AcquisitionSection {
    fn default() -> Self {
        Self {
            cycles_per_buffer: 120,
            sample_interval_us: 10_000,
            run_limit: None,
        }
    }
}

/// `[storage]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory the log files land in (e.g. the SD card mount point)
    pub log_dir: PathBuf,
    /// Log files are named `<log_prefix>_NNN.csv`
    pub log_prefix: String,
    /// Writer poll interval while the hand-off slot is empty (ms)
    pub poll_interval_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("."),
            log_prefix: "bench_run".to_string(),
            poll_interval_ms: 1,
        }
    }
}

impl BenchConfig {
    /// Load configuration; `path` overrides the default `bench.toml` lookup.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let builder = match path {
            Some(p) => config::Config::builder().add_source(config::File::with_name(p)),
            None => config::Config::builder()
                .add_source(config::File::with_name("bench").required(false)),
        };
        let loaded: Self = builder
            .add_source(
                config::Environment::with_prefix("BENCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.acquisition.cycles_per_buffer == 0 {
            return Err(ConfigError::Zero {
                field: "acquisition.cycles_per_buffer",
            });
        }
        if self.acquisition.sample_interval_us == 0 {
            return Err(ConfigError::Zero {
                field: "acquisition.sample_interval_us",
            });
        }
        Ok(())
    }

    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            cycles_per_buffer: self.acquisition.cycles_per_buffer,
            sample_interval: Duration::from_micros(self.acquisition.sample_interval_us),
            run_limit: self.acquisition.run_limit,
        }
    }

    pub fn writer(&self) -> WriterConfig {
        WriterConfig {
            poll_interval: Duration::from_millis(self.storage.poll_interval_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_the_bench() {
        let cfg = BenchConfig::default();

        assert_eq!(cfg.acquisition.cycles_per_buffer, 120);
        assert_eq!(cfg.acquisition.sample_interval_us, 10_000);
        assert_eq!(cfg.calibration.pressure_offset, 602.0);
        assert_eq!(cfg.storage.log_prefix, "bench_run");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bench.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[acquisition]\n\
             cycles_per_buffer = 60\n\
             run_limit = 10\n\
             \n\
             [calibration]\n\
             pressure_offset = 600.0\n"
        )
        .unwrap();

        let cfg = BenchConfig::load(Some(path.to_str().unwrap())).unwrap();

        assert_eq!(cfg.acquisition.cycles_per_buffer, 60);
        assert_eq!(cfg.acquisition.run_limit, Some(10));
        assert_eq!(cfg.calibration.pressure_offset, 600.0);
        // Untouched sections keep their defaults
        assert_eq!(cfg.acquisition.sample_interval_us, 10_000);
        assert_eq!(cfg.storage.poll_interval_ms, 1);
    }

    #[test]
    fn test_zero_cadence_is_rejected() {
        let cfg = BenchConfig {
            acquisition: AcquisitionSection {
                sample_interval_us: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Zero {
                field: "acquisition.sample_interval_us"
            })
        ));
    }
}
