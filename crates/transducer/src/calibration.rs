//! Load-cell scaling and tare

use serde::{Deserialize, Serialize};

/// Two-point load-cell calibration: raw counts to kilograms.
///
/// Applied by driver implementations upstream of the sampling loop, so the
/// pipeline only ever sees kilograms on the force channel.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ForceCalibration {
    /// ADC counts per kilogram
    pub counts_per_kg: f64,
    /// Zero-load offset in counts
    pub tare_counts: f64,
}

impl Default for ForceCalibration {
    fn default() -> Self {
        Self {
            counts_per_kg: 25772.0 / 6.098,
            tare_counts: 0.0,
        }
    }
}

impl ForceCalibration {
    /// Calibration with a known scale factor and no tare.
    pub fn new(counts_per_kg: f64) -> Self {
        Self {
            counts_per_kg,
            tare_counts: 0.0,
        }
    }

    /// Re-zero from a set of no-load readings.
    pub fn tare(&mut self, no_load_counts: &[f64]) {
        if no_load_counts.is_empty() {
            return;
        }
        self.tare_counts = no_load_counts.iter().sum::<f64>() / no_load_counts.len() as f64;
    }

    /// Convert raw counts to kilograms.
    pub fn apply(&self, counts: f64) -> f64 {
        (counts - self.tare_counts) / self.counts_per_kg
    }
}
