//! Bench Transducer Layer
//!
//! Types and contracts for the test-bench front end: raw force/pressure
//! readings, engineering-unit conversion, and load-cell calibration.
//! Hardware drivers implement [`SampleSource`]; the [`mock`] module provides
//! scripted and simulated sources for tests and desk runs.

mod calibration;
mod convert;
mod reading;
mod source;

pub mod mock;

pub use calibration::ForceCalibration;
pub use convert::{ConverterConfig, UnitConverter};
pub use reading::{RawReading, SampleRecord};
pub use source::{SampleSource, SourceError};

/// Local gravitational acceleration used by the default calibration (m/s²)
pub const STANDARD_GRAVITY: f64 = 9.81;
