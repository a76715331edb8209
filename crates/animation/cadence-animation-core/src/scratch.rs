//! Pose buffers owned by a sequencer and reused every frame.
//!
//! Buffers are allocated once from the resource curve count and addressed by
//! slot index. Each slot is shared with in-flight evaluation chains.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::mix::SampleBuffer;

pub type SharedBuffer = Arc<Mutex<SampleBuffer>>;

pub const RESULT_SLOT: usize = 0;
pub const MIX_SLOT: usize = 1;
const NUM_SLOTS: usize = 2;

#[derive(Debug)]
pub struct Scratch {
    buffers: Vec<SharedBuffer>,
    num_curves: usize,
}

impl Scratch {
    pub fn new(num_curves: usize) -> Self {
        let buffers = (0..NUM_SLOTS)
            .map(|_| Arc::new(Mutex::new(SampleBuffer::new(num_curves))))
            .collect();
        Self {
            buffers,
            num_curves,
        }
    }

    #[inline]
    pub fn num_curves(&self) -> usize {
        self.num_curves
    }

    /// Destination of every evaluation chain.
    #[inline]
    pub fn result(&self) -> &SharedBuffer {
        &self.buffers[RESULT_SLOT]
    }

    /// Per-link sampling target before it is mixed into the result.
    #[inline]
    pub fn mix(&self) -> &SharedBuffer {
        &self.buffers[MIX_SLOT]
    }

    #[inline]
    pub fn slot(&self, index: usize) -> Option<&SharedBuffer> {
        self.buffers.get(index)
    }
}
