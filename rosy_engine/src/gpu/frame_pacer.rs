/// Frame pacing over frames in flight.
///
/// Each frame slot owns two fences: the shadow-pass fence and the render
/// (in-flight) fence. Before the CPU records into a slot again it waits on
/// both, so at most `MAX_FRAMES_IN_FLIGHT - 1` other slots are executing
/// while one is recorded. Every wait is bounded; an expired wait is fatal.

use crate::error::Result;

/// Number of frame slots recorded round-robin
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Default fence wait bound (1 second)
pub const DEFAULT_FENCE_TIMEOUT_NS: u64 = 1_000_000_000;

/// Fence operations the pacer needs from the device
pub trait FenceBackend {
    type Fence: Copy;

    /// Block until `fence` is signaled or `timeout_ns` expires
    ///
    /// # Errors
    ///
    /// `Error::Timeout` when the bound expires.
    fn wait_fence(&self, fence: Self::Fence, timeout_ns: u64) -> Result<()>;

    fn reset_fence(&self, fence: Self::Fence) -> Result<()>;
}

/// The two fences of one frame slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotFences<F> {
    pub shadow: F,
    pub render: F,
}

/// Round-robin frame slot tracker
pub struct FramePacer<F: Copy> {
    slots: Vec<SlotFences<F>>,
    current: usize,
    frame_number: u64,
    timeout_ns: u64,
}

impl<F: Copy> FramePacer<F> {
    /// One entry of `slots` per frame in flight; fences must be created signaled.
    pub fn new(slots: Vec<SlotFences<F>>, timeout_ns: u64) -> Self {
        Self {
            slots,
            current: 0,
            frame_number: 0,
            timeout_ns,
        }
    }

    /// Slot being recorded
    pub fn current_slot(&self) -> usize {
        self.current
    }

    /// Frames advanced since creation
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn current_fences(&self) -> SlotFences<F> {
        self.slots[self.current]
    }

    pub fn slots(&self) -> &[SlotFences<F>] {
        &self.slots
    }

    /// Wait until the current slot's previous shadow and render submissions
    /// have completed. Nothing is reset, so an early exit (for example an
    /// out-of-date swapchain) leaves the slot waitable again.
    pub fn wait_for_slot<B: FenceBackend<Fence = F>>(&self, backend: &B) -> Result<()> {
        let fences = self.current_fences();
        backend.wait_fence(fences.shadow, self.timeout_ns)?;
        backend.wait_fence(fences.render, self.timeout_ns)?;
        Ok(())
    }

    /// Arm the shadow fence for this frame's shadow submission
    pub fn reset_shadow<B: FenceBackend<Fence = F>>(&self, backend: &B) -> Result<()> {
        backend.reset_fence(self.current_fences().shadow)
    }

    /// Wait on and reset the render fence before the render submission
    pub fn wait_and_reset_render<B: FenceBackend<Fence = F>>(&self, backend: &B) -> Result<()> {
        let render = self.current_fences().render;
        backend.wait_fence(render, self.timeout_ns)?;
        backend.reset_fence(render)
    }

    /// Move to the next slot
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
        self.frame_number += 1;
    }
}

#[cfg(test)]
#[path = "frame_pacer_tests.rs"]
mod tests;
