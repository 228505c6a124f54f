//! Buffer state machine and atomic hand-off slot

use crate::{HandoffError, RecordBuffer};
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicI8, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::error;
use transducer::SampleRecord;

/// Lifecycle of one buffer. Stored as an `AtomicU8`; a buffer holds exactly
/// one state at a time, so it can never be owned by both loops at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BufferState {
    /// Cleared and available to the producer
    Empty = 0,
    /// Owned exclusively by the producer, being appended to
    Filling = 1,
    /// Sealed, immutable, awaiting the consumer
    Ready = 2,
    /// Owned exclusively by the consumer, being written out
    Draining = 3,
}

impl BufferState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Empty,
            1 => Self::Filling,
            2 => Self::Ready,
            _ => Self::Draining,
        }
    }
}

/// Hand-off slot value meaning "no sealed buffer pending"
const SLOT_EMPTY: i8 = -1;

/// Shared core of the hand-off: the two payload buffers, their states, and
/// the single slot the loops communicate through.
struct Shared {
    buffers: [UnsafeCell<RecordBuffer>; 2],
    states: [AtomicU8; 2],
    /// `SLOT_EMPTY`, or the index of a sealed buffer awaiting the consumer.
    /// Only the producer stores an index, only the consumer clears it.
    slot: AtomicI8,
    published: AtomicU64,
    drained: AtomicU64,
    overruns: AtomicU64,
}

// SAFETY: buffer payloads are only touched by the side the state machine
// currently grants ownership to (`Filling` -> producer, `Draining` ->
// consumer), and every state transition is an acquire/release CAS, so
// contents written under one ownership are visible after the hand-over.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

impl Shared {
    fn state(&self, buffer: usize) -> BufferState {
        BufferState::from_u8(self.states[buffer].load(Ordering::Acquire))
    }

    fn transition(
        &self,
        buffer: usize,
        from: BufferState,
        to: BufferState,
    ) -> Result<(), HandoffError> {
        self.states[buffer]
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(drop)
            .map_err(|actual| HandoffError::StateViolation {
                buffer,
                expected: from,
                actual: BufferState::from_u8(actual),
            })
    }
}

/// Hand-off counters, readable from any thread.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandoffStats {
    /// Buffers sealed and placed in the slot
    pub published: u64,
    /// Buffers drained and returned to `Empty`
    pub drained: u64,
    /// Times the producer had to wait on the consumer
    pub overruns: u64,
}

/// Read-only view of the hand-off for diagnostics and tests.
#[derive(Clone)]
pub struct HandoffMonitor {
    shared: Arc<Shared>,
}

impl HandoffMonitor {
    pub fn state(&self, buffer: usize) -> BufferState {
        self.shared.state(buffer)
    }

    pub fn stats(&self) -> HandoffStats {
        HandoffStats {
            published: self.shared.published.load(Ordering::Relaxed),
            drained: self.shared.drained.load(Ordering::Relaxed),
            overruns: self.shared.overruns.load(Ordering::Relaxed),
        }
    }
}

/// The two-buffer pair. Exists only long enough to be split into its
/// producer and consumer halves.
pub struct BufferPair;

impl BufferPair {
    /// Allocate both buffers and split into the two loop handles.
    ///
    /// This is the only allocation the hand-off ever performs.
    pub fn split(capacity: usize) -> (Producer, Consumer) {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        let shared = Arc::new(Shared {
            buffers: [
                UnsafeCell::new(RecordBuffer::new(capacity)),
                UnsafeCell::new(RecordBuffer::new(capacity)),
            ],
            states: [AtomicU8::new(0), AtomicU8::new(0)],
            slot: AtomicI8::new(SLOT_EMPTY),
            published: AtomicU64::new(0),
            drained: AtomicU64::new(0),
            overruns: AtomicU64::new(0),
        });
        (
            Producer {
                shared: Arc::clone(&shared),
                active: 0,
                phase: Phase::Idle,
                passes: 0,
                overrun_reported: false,
            },
            Consumer { shared },
        )
    }
}

/// Local call-order tracking for the producer handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Filling,
    Sealed,
}

/// Producer half: fills the active buffer and publishes it.
///
/// Not `Clone`; the protocol is strictly single-producer.
pub struct Producer {
    shared: Arc<Shared>,
    active: usize,
    phase: Phase,
    passes: u64,
    overrun_reported: bool,
}

impl Producer {
    /// Claim the active buffer for filling, without waiting.
    ///
    /// Fails with [`HandoffError::BufferBusy`] while the consumer still
    /// holds the buffer; an empty hand-off slot alone is not permission to
    /// touch it.
    pub fn try_begin_fill(&mut self) -> Result<(), HandoffError> {
        if self.phase != Phase::Idle {
            return Err(HandoffError::Phase("begin_fill while a fill is open"));
        }
        let idx = self.active;
        if self.shared.state(idx) != BufferState::Empty {
            self.report_overrun("buffer not yet returned by the storage writer", idx);
            return Err(HandoffError::BufferBusy { buffer: idx });
        }
        self.shared
            .transition(idx, BufferState::Empty, BufferState::Filling)?;
        self.phase = Phase::Filling;
        self.passes += 1;
        self.overrun_reported = false;
        // SAFETY: the Filling state grants this side exclusive access, and
        // the acquire in the transition synchronised with the consumer's
        // release when it cleared the buffer.
        let buffer = unsafe { &mut *self.shared.buffers[idx].get() };
        buffer.clear();
        buffer.set_seq(self.passes);
        Ok(())
    }

    /// Claim the active buffer, spinning until the consumer returns it.
    ///
    /// Waiting here means the writer has fallen a full buffer behind; it is
    /// reported once per stall and counted as an overrun.
    pub fn begin_fill(&mut self) -> Result<(), HandoffError> {
        loop {
            match self.try_begin_fill() {
                Err(HandoffError::BufferBusy { .. }) => std::hint::spin_loop(),
                other => return other,
            }
        }
    }

    /// Append one record to the open fill.
    pub fn push(&mut self, record: SampleRecord) -> Result<(), HandoffError> {
        if self.phase != Phase::Filling {
            return Err(HandoffError::Phase("push without an open fill"));
        }
        // SAFETY: phase Filling implies this side owns the active buffer.
        let buffer = unsafe { &mut *self.shared.buffers[self.active].get() };
        buffer.push(record)
    }

    /// Records appended to the open fill so far.
    pub fn fill_len(&self) -> usize {
        if self.phase == Phase::Idle {
            return 0;
        }
        // SAFETY: phase Filling/Sealed implies the consumer cannot touch
        // the active buffer.
        unsafe { (*self.shared.buffers[self.active].get()).len() }
    }

    /// Seal the open fill and offer it to the consumer, without waiting.
    ///
    /// Fails with [`HandoffError::SlotOccupied`] if the previous buffer has
    /// not been claimed yet; the fill stays sealed and a retry is allowed.
    pub fn try_publish(&mut self) -> Result<u64, HandoffError> {
        match self.phase {
            Phase::Filling => {
                // Seal first: the release in the transition makes the
                // records visible to whoever observes Ready.
                self.shared
                    .transition(self.active, BufferState::Filling, BufferState::Ready)?;
                self.phase = Phase::Sealed;
            }
            Phase::Sealed => {}
            Phase::Idle => return Err(HandoffError::Phase("publish without an open fill")),
        }

        let idx = self.active;
        if self
            .shared
            .slot
            .compare_exchange(SLOT_EMPTY, idx as i8, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.report_overrun("hand-off slot still occupied", idx);
            return Err(HandoffError::SlotOccupied);
        }

        self.shared.published.fetch_add(1, Ordering::Relaxed);
        self.phase = Phase::Idle;
        self.overrun_reported = false;
        self.active ^= 1;
        Ok(self.passes)
    }

    /// Seal and publish, spinning through any overrun until the slot frees.
    ///
    /// The overrun is reported once and counted; records are never dropped.
    pub fn publish(&mut self) -> Result<u64, HandoffError> {
        loop {
            match self.try_publish() {
                Err(HandoffError::SlotOccupied) => std::hint::spin_loop(),
                other => return other,
            }
        }
    }

    /// Discard an open fill and return the buffer to `Empty`.
    pub fn abandon(&mut self) -> Result<(), HandoffError> {
        if self.phase != Phase::Filling {
            return Err(HandoffError::Phase("abandon without an open fill"));
        }
        // SAFETY: phase Filling implies exclusive access.
        unsafe { (*self.shared.buffers[self.active].get()).clear() };
        self.shared
            .transition(self.active, BufferState::Filling, BufferState::Empty)?;
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Index of the buffer the producer is (or will next be) filling.
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// Whether a fill is currently open.
    pub fn is_filling(&self) -> bool {
        self.phase == Phase::Filling
    }

    pub fn monitor(&self) -> HandoffMonitor {
        HandoffMonitor {
            shared: Arc::clone(&self.shared),
        }
    }

    fn report_overrun(&mut self, what: &str, buffer: usize) {
        if !self.overrun_reported {
            self.overrun_reported = true;
            self.shared.overruns.fetch_add(1, Ordering::Relaxed);
            error!(buffer, "hand-off overrun: {what}");
        }
    }
}

/// Consumer half: claims sealed buffers and returns them empty.
///
/// Not `Clone`; the protocol is strictly single-consumer.
pub struct Consumer {
    shared: Arc<Shared>,
}

impl Consumer {
    /// Claim a sealed buffer if one is pending.
    ///
    /// The buffer is moved to `Draining` before the slot is cleared, so the
    /// producer can never start refilling it while the guard is alive.
    pub fn try_claim(&mut self) -> Option<DrainGuard<'_>> {
        let raw = self.shared.slot.load(Ordering::Acquire);
        if raw == SLOT_EMPTY {
            return None;
        }
        let idx = raw as usize;

        if let Err(e) = self
            .shared
            .transition(idx, BufferState::Ready, BufferState::Draining)
        {
            // Only the producer writes indices into the slot and only after
            // sealing, so this cannot happen in a correct build.
            error!(error = %e, "hand-off invariant violated on claim");
            return None;
        }
        self.shared.slot.store(SLOT_EMPTY, Ordering::Release);

        Some(DrainGuard {
            consumer: self,
            idx,
        })
    }

    pub fn monitor(&self) -> HandoffMonitor {
        HandoffMonitor {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Exclusive access to one claimed buffer.
///
/// Dropping the guard clears the buffer and hands it back to the producer,
/// whether or not the drain succeeded; a failed write costs exactly that
/// buffer's records.
pub struct DrainGuard<'a> {
    consumer: &'a mut Consumer,
    idx: usize,
}

impl DrainGuard<'_> {
    /// Records of the claimed buffer, in append order.
    pub fn records(&self) -> &[SampleRecord] {
        // SAFETY: the Draining state grants this side exclusive access for
        // the guard's lifetime.
        unsafe { (*self.consumer.shared.buffers[self.idx].get()).records() }
    }

    /// Fill pass that produced this buffer.
    pub fn seq(&self) -> u64 {
        // SAFETY: as in `records`.
        unsafe { (*self.consumer.shared.buffers[self.idx].get()).seq() }
    }

    /// Index of the claimed buffer.
    pub fn index(&self) -> usize {
        self.idx
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: still Draining; clearing happens before the release store
        // below, so the producer never observes a non-empty "Empty" buffer.
        unsafe { (*self.consumer.shared.buffers[self.idx].get()).clear() };
        self.consumer.shared.states[self.idx].store(BufferState::Empty as u8, Ordering::Release);
        self.consumer.shared.drained.fetch_add(1, Ordering::Relaxed);
    }
}
