//! Producer loop

use crate::{cadence::spin_until, AcquisitionError};
use double_buffer::Producer;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use transducer::{SampleSource, UnitConverter};

/// Configuration for the sampling loop
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Sample steps per buffer; must equal the buffer capacity
    pub cycles_per_buffer: usize,
    /// Fixed period of one sample step
    pub sample_interval: Duration,
    /// Stop after this many published buffers (`None` = run until stopped)
    pub run_limit: Option<u64>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            cycles_per_buffer: 120,
            sample_interval: Duration::from_micros(10_000),
            run_limit: None,
        }
    }
}

/// Sampling-side counters, readable from any thread.
#[derive(Debug, Default)]
pub struct SamplerStats {
    samples: AtomicU64,
    read_failures: AtomicU64,
    buffers_filled: AtomicU64,
}

impl SamplerStats {
    /// Records appended across all buffers
    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    /// Source reads that failed (record skipped, cadence kept)
    pub fn read_failures(&self) -> u64 {
        self.read_failures.load(Ordering::Relaxed)
    }

    /// Buffers sealed and handed to the storage writer
    pub fn buffers_filled(&self) -> u64 {
        self.buffers_filled.load(Ordering::Relaxed)
    }
}

/// The producer loop: read, convert, append, spin out the interval.
///
/// Owns the source and the producer half of the buffer pair for the whole
/// run. Exits when the stop flag is raised (sealing any partial buffer), on
/// reaching `run_limit`, or on a hand-off invariant violation.
pub struct Sampler<S> {
    source: S,
    converter: UnitConverter,
    producer: Producer,
    config: SamplerConfig,
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    stats: Arc<SamplerStats>,
}

impl<S: SampleSource> Sampler<S> {
    pub fn new(
        source: S,
        converter: UnitConverter,
        producer: Producer,
        config: SamplerConfig,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            source,
            converter,
            producer,
            config,
            stop,
            done: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SamplerStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SamplerStats> {
        Arc::clone(&self.stats)
    }

    /// Raised once the loop has exited and its last buffer is published.
    /// The storage writer drains to this signal before shutting down.
    pub fn done_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.done)
    }

    /// Run until stopped. Consumes the sampler; the loop is the thread's
    /// whole life.
    pub fn run(mut self) -> Result<(), AcquisitionError> {
        info!(
            cycles_per_buffer = self.config.cycles_per_buffer,
            interval_us = self.config.sample_interval.as_micros() as u64,
            "sampler started"
        );

        let result = self.acquire();
        // Publish-then-signal: the writer re-checks the slot after seeing
        // this flag, so the final buffer is never stranded.
        self.done.store(true, Ordering::Release);

        match &result {
            Ok(()) => info!(
                samples = self.stats.samples(),
                buffers = self.stats.buffers_filled(),
                "sampler stopped"
            ),
            Err(e) => error!(error = %e, "sampler aborted"),
        }
        result
    }

    fn acquire(&mut self) -> Result<(), AcquisitionError> {
        let interval = self.config.sample_interval;
        let epoch = Instant::now();
        let mut published = 0u64;

        loop {
            self.producer.begin_fill()?;

            for _ in 0..self.config.cycles_per_buffer {
                if self.stop.load(Ordering::Relaxed) {
                    break;
                }
                let step_start = Instant::now();

                match self.source.read() {
                    Ok(raw) => {
                        let timestamp_ms = step_start.duration_since(epoch).as_millis() as u64;
                        self.producer
                            .push(self.converter.convert(raw, timestamp_ms))?;
                        self.stats.samples.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.stats.read_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(error = %e, "sample read failed; record skipped");
                    }
                }

                // A read that overran the interval slips this cycle only.
                spin_until(step_start + interval);
            }

            if self.producer.fill_len() > 0 {
                self.producer.publish()?;
                published += 1;
                self.stats.buffers_filled.fetch_add(1, Ordering::Relaxed);
            } else {
                self.producer.abandon()?;
            }

            if self.stop.load(Ordering::Relaxed) {
                break;
            }
            if self.config.run_limit.map_or(false, |limit| published >= limit) {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use double_buffer::{BufferPair, Consumer};
    use std::thread;
    use transducer::mock::ScriptedSource;
    use transducer::{ConverterConfig, SampleRecord, SourceError};

    fn test_converter() -> UnitConverter {
        UnitConverter::new(ConverterConfig {
            pressure_offset: 600.0,
            pressure_scale: 100.0,
            gravity: 9.81,
        })
    }

    fn fast_config(cycles: usize, run_limit: Option<u64>) -> SamplerConfig {
        SamplerConfig {
            cycles_per_buffer: cycles,
            sample_interval: Duration::from_micros(50),
            run_limit,
        }
    }

    /// Drain every buffer the sampler publishes until its done flag rises.
    fn collect_all(mut consumer: Consumer, done: Arc<AtomicBool>) -> Vec<SampleRecord> {
        let mut records = Vec::new();
        loop {
            if let Some(claim) = consumer.try_claim() {
                records.extend_from_slice(claim.records());
                continue;
            }
            if done.load(Ordering::Acquire) {
                if let Some(claim) = consumer.try_claim() {
                    records.extend_from_slice(claim.records());
                }
                return records;
            }
            thread::yield_now();
        }
    }

    #[test]
    fn test_records_cross_buffer_boundary_in_order() {
        let script = [
            (10.0, 700.0),
            (20.0, 750.0),
            (30.0, 800.0),
            (40.0, 850.0),
            (50.0, 900.0),
            (60.0, 950.0),
        ];
        let (producer, consumer) = BufferPair::split(3);
        let sampler = Sampler::new(
            ScriptedSource::new(&script),
            test_converter(),
            producer,
            fast_config(3, Some(2)),
            Arc::new(AtomicBool::new(false)),
        );
        let stats = sampler.stats();
        let done = sampler.done_flag();

        let handle = thread::spawn(move || sampler.run());
        let records = collect_all(consumer, done);
        handle.join().unwrap().unwrap();

        let weights: Vec<f64> = records.iter().map(|r| r.weight_kg).collect();
        assert_eq!(weights, vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0]);
        assert!((records[0].pressure_conv - 1.0).abs() < 1e-9);
        assert!((records[1].pressure_conv - 1.5).abs() < 1e-9);
        assert!(records
            .windows(2)
            .all(|w| w[0].timestamp_ms <= w[1].timestamp_ms));
        assert_eq!(stats.samples(), 6);
        assert_eq!(stats.buffers_filled(), 2);
        assert_eq!(stats.read_failures(), 0);
    }

    #[test]
    fn test_read_failure_skips_record_and_keeps_going() {
        let script = vec![
            Ok(transducer::RawReading {
                force_kg: 1.0,
                pressure_counts: 700.0,
            }),
            Err(SourceError::NotReady),
            Ok(transducer::RawReading {
                force_kg: 3.0,
                pressure_counts: 800.0,
            }),
        ];
        let (producer, consumer) = BufferPair::split(3);
        let sampler = Sampler::new(
            ScriptedSource::with_results(script),
            test_converter(),
            producer,
            fast_config(3, Some(1)),
            Arc::new(AtomicBool::new(false)),
        );
        let stats = sampler.stats();
        let done = sampler.done_flag();

        let handle = thread::spawn(move || sampler.run());
        let records = collect_all(consumer, done);
        handle.join().unwrap().unwrap();

        let weights: Vec<f64> = records.iter().map(|r| r.weight_kg).collect();
        assert_eq!(weights, vec![1.0, 3.0]);
        assert_eq!(stats.read_failures(), 1);
        assert_eq!(stats.samples(), 2);
    }

    #[test]
    fn test_stop_seals_partial_buffer() {
        let (producer, consumer) = BufferPair::split(100);
        let stop = Arc::new(AtomicBool::new(false));
        let sampler = Sampler::new(
            ScriptedSource::new(&[(5.0, 700.0)]).looping(),
            test_converter(),
            producer,
            fast_config(100, None),
            Arc::clone(&stop),
        );
        let stats = sampler.stats();
        let done = sampler.done_flag();

        let handle = thread::spawn(move || sampler.run());
        while stats.samples() < 5 {
            thread::yield_now();
        }
        stop.store(true, Ordering::Relaxed);

        let records = collect_all(consumer, done);
        handle.join().unwrap().unwrap();

        // Everything sampled before the stop landed in the partial buffer.
        assert_eq!(records.len() as u64, stats.samples());
        assert!(!records.is_empty());
    }
}
