//! Double-Buffered Record Hand-Off
//!
//! Two preallocated record buffers alternate between exactly one producer
//! (the sampling loop) and exactly one consumer (the storage loop). The only
//! cross-thread channel is a single atomic slot carrying the index of a
//! sealed buffer; payloads are read and written without locks, guarded by a
//! per-buffer state machine with acquire/release transitions.

mod buffer;
mod pair;

pub use buffer::RecordBuffer;
pub use pair::{
    BufferPair, BufferState, Consumer, DrainGuard, HandoffMonitor, HandoffStats, Producer,
};

use thiserror::Error;

/// Hand-off protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandoffError {
    /// Append exceeded the configured buffer capacity. The cycle count and
    /// capacity are meant to be equal, so this is a logic error, not a
    /// runtime condition.
    #[error("record buffer overflow: capacity {capacity} exceeded")]
    Overflow { capacity: usize },

    /// The hand-off slot still holds an unconsumed buffer at publish time.
    #[error("hand-off slot still occupied; storage writer has fallen behind")]
    SlotOccupied,

    /// The buffer the producer wants to refill has not been returned to
    /// `Empty` by the consumer yet.
    #[error("buffer {buffer} still held by the storage writer")]
    BufferBusy { buffer: usize },

    /// A state transition found the buffer in an unexpected state.
    #[error("buffer {buffer} in state {actual:?}, expected {expected:?}")]
    StateViolation {
        buffer: usize,
        expected: BufferState,
        actual: BufferState,
    },

    /// Producer methods called out of order.
    #[error("producer call out of order: {0}")]
    Phase(&'static str),
}
