//! Pipeline bring-up and supervision

use crate::BenchConfig;
use acquisition::{AcquisitionError, Sampler, SamplerStats};
use double_buffer::{BufferPair, HandoffMonitor};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use storage::{LogFile, StorageWriter, WriterStats};
use tracing::error;
use transducer::{SampleSource, UnitConverter};

/// The two running loops and their shared signals.
pub struct Pipeline {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    sampler_stats: Arc<SamplerStats>,
    writer_stats: Arc<WriterStats>,
    monitor: HandoffMonitor,
    log_path: PathBuf,
    sampler_handle: JoinHandle<Result<(), AcquisitionError>>,
    writer_handle: JoinHandle<LogFile>,
}

impl Pipeline {
    /// Allocate the buffer pair and spawn both loop threads.
    ///
    /// The log file must already exist with its header written; creating
    /// it is a startup step that fails fatally before anything spawns.
    pub fn launch<S>(source: S, config: &BenchConfig, log: LogFile) -> std::io::Result<Self>
    where
        S: SampleSource + Send + 'static,
    {
        let (producer, consumer) = BufferPair::split(config.acquisition.cycles_per_buffer);
        let monitor = producer.monitor();
        let stop = Arc::new(AtomicBool::new(false));
        let log_path = log.path().to_path_buf();

        let sampler = Sampler::new(
            source,
            UnitConverter::new(config.calibration),
            producer,
            config.sampler(),
            Arc::clone(&stop),
        );
        let sampler_stats = sampler.stats();
        let done = sampler.done_flag();

        let writer = StorageWriter::new(consumer, log, config.writer(), Arc::clone(&done));
        let writer_stats = writer.stats();

        let sampler_handle = std::thread::Builder::new()
            .name("sampler".to_string())
            .spawn(move || sampler.run())?;
        let writer_handle = std::thread::Builder::new()
            .name("storage-writer".to_string())
            .spawn(move || writer.run())?;

        Ok(Self {
            stop,
            done,
            sampler_stats,
            writer_stats,
            monitor,
            log_path,
            sampler_handle,
            writer_handle,
        })
    }

    /// Ask the sampler to stop at its next step. It seals whatever is in
    /// the active buffer; the writer drains it before exiting.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// True once the sampler loop has exited (stop flag or run limit).
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn sampler_stats(&self) -> &SamplerStats {
        &self.sampler_stats
    }

    pub fn writer_stats(&self) -> &WriterStats {
        &self.writer_stats
    }

    pub fn monitor(&self) -> &HandoffMonitor {
        &self.monitor
    }

    /// Join both loops and total up the run.
    pub fn join(self) -> PipelineSummary {
        let sampler_error = match self.sampler_handle.join() {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("sampler thread panicked".to_string()),
        };
        if self.writer_handle.join().is_err() {
            error!("storage writer thread panicked");
        }

        let handoff = self.monitor.stats();
        PipelineSummary {
            samples: self.sampler_stats.samples(),
            read_failures: self.sampler_stats.read_failures(),
            buffers_published: handoff.published,
            buffers_flushed: self.writer_stats.buffers_flushed(),
            records_written: self.writer_stats.records_written(),
            write_failures: self.writer_stats.write_failures(),
            overruns: handoff.overruns,
            log_path: self.log_path,
            sampler_error,
        }
    }
}

/// Totals for one acquisition run.
#[derive(Debug, Clone)]
pub struct PipelineSummary {
    pub samples: u64,
    pub read_failures: u64,
    pub buffers_published: u64,
    pub buffers_flushed: u64,
    pub records_written: u64,
    pub write_failures: u64,
    pub overruns: u64,
    pub log_path: PathBuf,
    /// Set when the sampler exited abnormally
    pub sampler_error: Option<String>,
}
