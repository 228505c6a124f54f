//! Acquisition Loop
//!
//! The producer side of the pipeline: reads the transducers on a fixed
//! cadence, converts to engineering units, and fills/publishes the double
//! buffers. The cadence is enforced by spinning on the monotonic clock, not
//! by sleeping: the tolerated jitter is below scheduler tick granularity.

mod cadence;
mod sampler;

pub use cadence::spin_until;
pub use sampler::{Sampler, SamplerConfig, SamplerStats};

use double_buffer::HandoffError;
use thiserror::Error;

/// Errors that abort the sampling loop
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// A hand-off invariant was violated; continuing could corrupt data.
    #[error("buffer hand-off failed: {0}")]
    Handoff(#[from] HandoffError),
}
