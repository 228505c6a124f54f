//! Sample value types

use serde::{Deserialize, Serialize};

/// One raw reading pair from the bench front end.
///
/// The force channel arrives already scaled and tared to kilograms by the
/// driver (see [`crate::ForceCalibration`]); the pressure channel is the
/// untouched ADC output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// Load-cell output in kilograms
    pub force_kg: f64,
    /// Pressure transducer output in raw ADC counts
    pub pressure_counts: f64,
}

/// One converted sample, immutable once created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Measured mass on the load cell (kg)
    pub weight_kg: f64,
    /// Thrust equivalent (N)
    pub weight_n: f64,
    /// Pressure channel as read (ADC counts)
    pub raw_pressure: f64,
    /// Pressure in engineering units after offset/scale
    pub pressure_conv: f64,
    /// Milliseconds since acquisition start
    pub timestamp_ms: u64,
}
