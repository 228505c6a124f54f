//! Scripted and simulated bench front ends
//!
//! Real HX711/ADC drivers live outside this workspace; these stand-ins keep
//! the pipeline runnable on a desk and deterministic under test.

use crate::{RawReading, SampleSource, SourceError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Replays a fixed sequence of read results in order.
///
/// Once the script is exhausted every further read returns
/// [`SourceError::NotReady`], unless the source was made [`looping`].
///
/// [`looping`]: ScriptedSource::looping
pub struct ScriptedSource {
    script: Vec<Result<RawReading, SourceError>>,
    cursor: usize,
    wrap: bool,
}

impl ScriptedSource {
    /// Script of successful `(force_kg, pressure_counts)` readings.
    pub fn new(readings: &[(f64, f64)]) -> Self {
        Self {
            script: readings
                .iter()
                .map(|&(force_kg, pressure_counts)| {
                    Ok(RawReading {
                        force_kg,
                        pressure_counts,
                    })
                })
                .collect(),
            cursor: 0,
            wrap: false,
        }
    }

    /// Script with explicit per-step results, for failure injection.
    pub fn with_results(script: Vec<Result<RawReading, SourceError>>) -> Self {
        Self {
            script,
            cursor: 0,
            wrap: false,
        }
    }

    /// Restart from the top instead of running dry.
    pub fn looping(mut self) -> Self {
        self.wrap = true;
        self
    }
}

impl SampleSource for ScriptedSource {
    fn read(&mut self) -> Result<RawReading, SourceError> {
        if self.cursor >= self.script.len() {
            if !self.wrap || self.script.is_empty() {
                return Err(SourceError::NotReady);
            }
            self.cursor = 0;
        }
        let result = self.script[self.cursor].clone();
        self.cursor += 1;
        result
    }
}

/// Seeded synthetic static-fire profile with sensor noise.
///
/// Thrust ramps up, holds, then tails off; chamber pressure tracks the
/// thrust curve on top of the transducer's zero offset. Same seed, same
/// readings.
pub struct SimulatedBench {
    rng: StdRng,
    step: u64,
    peak_force_kg: f64,
    pressure_offset_counts: f64,
    pressure_span_counts: f64,
    noise: f64,
}

impl SimulatedBench {
    /// Profile phase lengths in steps
    const RAMP_STEPS: u64 = 200;
    const HOLD_STEPS: u64 = 600;
    const DECAY_STEPS: u64 = 300;

    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            step: 0,
            peak_force_kg: 35.0,
            pressure_offset_counts: 602.0,
            pressure_span_counts: 2800.0,
            noise: 0.01,
        }
    }

    /// Normalized thrust level for the current step, 0.0..=1.0.
    fn profile(&self) -> f64 {
        let t = self.step;
        if t < Self::RAMP_STEPS {
            t as f64 / Self::RAMP_STEPS as f64
        } else if t < Self::RAMP_STEPS + Self::HOLD_STEPS {
            1.0
        } else {
            let into_decay = t - Self::RAMP_STEPS - Self::HOLD_STEPS;
            (1.0 - into_decay as f64 / Self::DECAY_STEPS as f64).max(0.0)
        }
    }
}

impl SampleSource for SimulatedBench {
    fn read(&mut self) -> Result<RawReading, SourceError> {
        let level = self.profile();
        self.step += 1;

        let jitter = |rng: &mut StdRng, noise: f64| 1.0 + rng.gen_range(-noise..=noise);
        Ok(RawReading {
            force_kg: self.peak_force_kg * level * jitter(&mut self.rng, self.noise),
            pressure_counts: self.pressure_offset_counts
                + self.pressure_span_counts * level * jitter(&mut self.rng, self.noise),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_in_order() {
        let mut source = ScriptedSource::new(&[(1.0, 700.0), (2.0, 750.0)]);

        assert_eq!(source.read().unwrap().force_kg, 1.0);
        assert_eq!(source.read().unwrap().force_kg, 2.0);
        assert!(matches!(source.read(), Err(SourceError::NotReady)));
    }

    #[test]
    fn test_scripted_looping_wraps() {
        let mut source = ScriptedSource::new(&[(1.0, 700.0)]).looping();

        for _ in 0..5 {
            assert_eq!(source.read().unwrap().force_kg, 1.0);
        }
    }

    #[test]
    fn test_scripted_failure_injection() {
        let mut source = ScriptedSource::with_results(vec![
            Ok(RawReading {
                force_kg: 1.0,
                pressure_counts: 700.0,
            }),
            Err(SourceError::Force("saturated".into())),
            Ok(RawReading {
                force_kg: 3.0,
                pressure_counts: 800.0,
            }),
        ]);

        assert!(source.read().is_ok());
        assert!(matches!(source.read(), Err(SourceError::Force(_))));
        assert_eq!(source.read().unwrap().force_kg, 3.0);
    }

    #[test]
    fn test_simulated_bench_is_deterministic() {
        let mut a = SimulatedBench::new(7);
        let mut b = SimulatedBench::new(7);

        for _ in 0..50 {
            let ra = a.read().unwrap();
            let rb = b.read().unwrap();
            assert_eq!(ra.force_kg, rb.force_kg);
            assert_eq!(ra.pressure_counts, rb.pressure_counts);
        }
    }

    #[test]
    fn test_simulated_bench_ramps_to_peak() {
        let mut bench = SimulatedBench::new(1);
        let first = bench.read().unwrap();

        for _ in 0..SimulatedBench::RAMP_STEPS {
            bench.read().unwrap();
        }
        let at_peak = bench.read().unwrap();

        assert!(at_peak.force_kg > first.force_kg);
        assert!(at_peak.pressure_counts > first.pressure_counts);
    }
}
