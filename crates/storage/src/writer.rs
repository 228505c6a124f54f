//! Consumer loop

use crate::{RecordSink, StorageError};
use double_buffer::{Consumer, DrainGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info};

/// Configuration for the storage loop
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// How long to yield when no buffer is pending
    pub poll_interval: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Storage-side counters, readable from any thread.
#[derive(Debug, Default)]
pub struct WriterStats {
    buffers_flushed: AtomicU64,
    records_written: AtomicU64,
    write_failures: AtomicU64,
}

impl WriterStats {
    /// Buffers appended and synced successfully
    pub fn buffers_flushed(&self) -> u64 {
        self.buffers_flushed.load(Ordering::Relaxed)
    }

    /// Records across all flushed buffers
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    /// Buffers lost to a failed append or sync (one count per buffer)
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }
}

/// The consumer loop: claim, serialize, sync, hand the buffer back.
///
/// Polls the hand-off slot, yielding for `poll_interval` when it is empty;
/// this is the pipeline's only suspension point. Exits once the producer
/// signals done and the last pending buffer is drained.
pub struct StorageWriter<W> {
    consumer: Consumer,
    sink: W,
    config: WriterConfig,
    producer_done: Arc<AtomicBool>,
    stats: Arc<WriterStats>,
}

impl<W: RecordSink> StorageWriter<W> {
    pub fn new(
        consumer: Consumer,
        sink: W,
        config: WriterConfig,
        producer_done: Arc<AtomicBool>,
    ) -> Self {
        Self {
            consumer,
            sink,
            config,
            producer_done,
            stats: Arc::new(WriterStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<WriterStats> {
        Arc::clone(&self.stats)
    }

    /// Run until the producer is done and everything is on disk. Returns
    /// the sink so the caller can inspect or close it.
    pub fn run(mut self) -> W {
        info!("storage writer started");

        loop {
            if let Some(claim) = self.consumer.try_claim() {
                Self::drain(&mut self.sink, &self.stats, &claim);
                continue;
            }
            if self.producer_done.load(Ordering::Acquire) {
                // The done flag is raised after the final publish, so one
                // more claim attempt settles any buffer still in the slot.
                if let Some(claim) = self.consumer.try_claim() {
                    Self::drain(&mut self.sink, &self.stats, &claim);
                }
                break;
            }
            thread::sleep(self.config.poll_interval);
        }

        info!(
            buffers = self.stats.buffers_flushed(),
            records = self.stats.records_written(),
            failures = self.stats.write_failures(),
            "storage writer stopped"
        );
        self.sink
    }

    /// Append and sync one claimed buffer. On failure the records are
    /// dropped with the claim; the loop carries on with the next buffer.
    fn drain(sink: &mut W, stats: &WriterStats, claim: &DrainGuard<'_>) {
        let records = claim.records();
        match sink.append(records).and_then(|()| sink.sync()) {
            Ok(()) => {
                stats.buffers_flushed.fetch_add(1, Ordering::Relaxed);
                stats
                    .records_written
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                debug!(seq = claim.seq(), records = records.len(), "buffer flushed");
            }
            Err(e) => {
                stats.write_failures.fetch_add(1, Ordering::Relaxed);
                error!(seq = claim.seq(), error = %e, "buffer write failed; records dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use double_buffer::BufferPair;
    use transducer::SampleRecord;

    /// Sink that fails its first `fail_appends` appends, then records
    /// everything it is given.
    #[derive(Default)]
    struct FlakySink {
        appended: Vec<SampleRecord>,
        fail_appends: usize,
    }

    impl RecordSink for FlakySink {
        fn append(&mut self, records: &[SampleRecord]) -> Result<(), StorageError> {
            if self.fail_appends > 0 {
                self.fail_appends -= 1;
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "injected failure",
                )));
            }
            self.appended.extend_from_slice(records);
            Ok(())
        }

        fn sync(&mut self) -> Result<(), StorageError> {
            Ok(())
        }
    }

    fn record(timestamp_ms: u64) -> SampleRecord {
        SampleRecord {
            timestamp_ms,
            ..Default::default()
        }
    }

    #[test]
    fn test_drains_published_buffers_in_order() {
        let (mut producer, consumer) = BufferPair::split(2);
        let done = Arc::new(AtomicBool::new(false));
        let writer = StorageWriter::new(
            consumer,
            FlakySink::default(),
            WriterConfig::default(),
            Arc::clone(&done),
        );
        let stats = writer.stats();
        let handle = thread::spawn(move || writer.run());

        for pass in 0..3u64 {
            producer.begin_fill().unwrap();
            producer.push(record(pass * 2)).unwrap();
            producer.push(record(pass * 2 + 1)).unwrap();
            producer.publish().unwrap();
        }
        done.store(true, Ordering::Release);

        let sink = handle.join().unwrap();
        let stamps: Vec<u64> = sink.appended.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(stats.buffers_flushed(), 3);
        assert_eq!(stats.records_written(), 6);
        assert_eq!(stats.write_failures(), 0);
    }

    #[test]
    fn test_failed_write_loses_only_that_buffer() {
        let (mut producer, consumer) = BufferPair::split(2);
        let done = Arc::new(AtomicBool::new(false));
        let writer = StorageWriter::new(
            consumer,
            FlakySink {
                appended: Vec::new(),
                fail_appends: 1,
            },
            WriterConfig::default(),
            Arc::clone(&done),
        );
        let stats = writer.stats();
        let handle = thread::spawn(move || writer.run());

        producer.begin_fill().unwrap();
        producer.push(record(1)).unwrap();
        producer.publish().unwrap();

        producer.begin_fill().unwrap();
        producer.push(record(2)).unwrap();
        producer.publish().unwrap();

        done.store(true, Ordering::Release);
        let sink = handle.join().unwrap();

        // First buffer dropped, second intact, exactly one failure reported
        let stamps: Vec<u64> = sink.appended.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(stamps, vec![2]);
        assert_eq!(stats.write_failures(), 1);
        assert_eq!(stats.buffers_flushed(), 1);
    }

    #[test]
    fn test_pending_buffer_is_drained_after_done() {
        let (mut producer, consumer) = BufferPair::split(1);
        let done = Arc::new(AtomicBool::new(false));

        // Publish before the writer even starts, with done already raised.
        producer.begin_fill().unwrap();
        producer.push(record(7)).unwrap();
        producer.publish().unwrap();
        done.store(true, Ordering::Release);

        let writer = StorageWriter::new(
            consumer,
            FlakySink::default(),
            WriterConfig::default(),
            done,
        );
        let sink = writer.run();

        assert_eq!(sink.appended.len(), 1);
        assert_eq!(sink.appended[0].timestamp_ms, 7);
    }
}
