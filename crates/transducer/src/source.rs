//! Sample source contract

use crate::RawReading;
use thiserror::Error;

/// Errors from a front-end read
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// Load-cell channel failed to deliver a value
    #[error("force channel read failed: {0}")]
    Force(String),

    /// Pressure channel failed to deliver a value
    #[error("pressure channel read failed: {0}")]
    Pressure(String),

    /// Front end has no data (e.g. a scripted source ran out)
    #[error("front end not ready")]
    NotReady,
}

/// A synchronous force + pressure front end.
///
/// `read` is expected to return well within the sampling interval; a read
/// that runs long slips that cycle's cadence but is not an error. Force
/// readings arrive pre-calibrated (scale and tare applied by the driver).
pub trait SampleSource {
    /// Take one reading pair from both channels.
    fn read(&mut self) -> Result<RawReading, SourceError>;
}
