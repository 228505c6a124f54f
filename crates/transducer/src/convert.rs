//! Raw-to-engineering-unit conversion

use crate::{RawReading, SampleRecord, STANDARD_GRAVITY};
use serde::{Deserialize, Serialize};

/// Calibration constants for the conversion stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConverterConfig {
    /// Pressure channel zero offset (ADC counts)
    pub pressure_offset: f64,
    /// Pressure channel counts per engineering unit
    pub pressure_scale: f64,
    /// Local gravitational acceleration (m/s²)
    pub gravity: f64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            pressure_offset: 602.0,
            pressure_scale: 94.73684210526,
            gravity: STANDARD_GRAVITY,
        }
    }
}

/// Pure mapping from raw readings to sample records.
///
/// Stateless and infallible: out-of-range raw values pass through as
/// computed floats, no clamping.
#[derive(Debug, Clone, Copy)]
pub struct UnitConverter {
    config: ConverterConfig,
}

impl UnitConverter {
    /// Create a converter with the given calibration constants.
    pub fn new(config: ConverterConfig) -> Self {
        Self { config }
    }

    /// Convert one raw reading taken at `timestamp_ms`.
    pub fn convert(&self, raw: RawReading, timestamp_ms: u64) -> SampleRecord {
        SampleRecord {
            weight_kg: raw.force_kg,
            weight_n: raw.force_kg * self.config.gravity,
            raw_pressure: raw.pressure_counts,
            pressure_conv: (raw.pressure_counts - self.config.pressure_offset)
                / self.config.pressure_scale,
            timestamp_ms,
        }
    }
}
