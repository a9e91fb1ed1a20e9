/// Mock GPU backends for unit tests.
///
/// `MockPoolBackend` models descriptor pools with a fixed set capacity.
/// `MockTimeline` models fences signaled by a simulated queue that completes
/// submissions in order.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use crate::error::{Error, Result};
use super::descriptor_allocator::{DescriptorPoolBackend, PoolAllocFailure, PoolSizeRatio};
use super::frame_pacer::FenceBackend;

// ============================================================================
// DESCRIPTOR POOLS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockPool(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockSet {
    pub pool: usize,
    pub index: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockDescriptorType {
    UniformBuffer,
    CombinedImageSampler,
}

#[derive(Debug, Default)]
pub struct MockPoolState {
    pub capacity: u32,
    pub used: u32,
    pub resets: u32,
    pub destroyed: bool,
}

#[derive(Default)]
pub struct MockPoolBackend {
    pub pools: RefCell<Vec<MockPoolState>>,
    pub fail_creation: RefCell<bool>,
}

impl MockPoolBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> usize {
        self.pools.borrow().len()
    }

    pub fn capacity_of(&self, pool: usize) -> u32 {
        self.pools.borrow()[pool].capacity
    }
}

impl DescriptorPoolBackend for MockPoolBackend {
    type Pool = MockPool;
    type Layout = ();
    type Set = MockSet;
    type DescriptorType = MockDescriptorType;

    fn create_pool(&self, max_sets: u32, _ratios: &[PoolSizeRatio<MockDescriptorType>]) -> Result<MockPool> {
        if *self.fail_creation.borrow() {
            return Err(Error::OutOfMemory);
        }
        let mut pools = self.pools.borrow_mut();
        pools.push(MockPoolState { capacity: max_sets, ..Default::default() });
        Ok(MockPool(pools.len() - 1))
    }

    fn allocate_set(&self, pool: MockPool, _layout: ()) -> std::result::Result<MockSet, PoolAllocFailure> {
        let mut pools = self.pools.borrow_mut();
        let state = &mut pools[pool.0];
        if state.used >= state.capacity {
            return Err(PoolAllocFailure::OutOfPoolMemory);
        }
        let index = state.used;
        state.used += 1;
        Ok(MockSet { pool: pool.0, index })
    }

    fn reset_pool(&self, pool: MockPool) -> Result<()> {
        let mut pools = self.pools.borrow_mut();
        pools[pool.0].used = 0;
        pools[pool.0].resets += 1;
        Ok(())
    }

    fn destroy_pool(&self, pool: MockPool) {
        self.pools.borrow_mut()[pool.0].destroyed = true;
    }
}

// ============================================================================
// FENCES
// ============================================================================

struct TimelineState {
    signaled: Vec<bool>,
    /// Fences waiting for the simulated queue, oldest first
    pending: VecDeque<usize>,
}

/// Fence timeline shared between the test thread and a simulated GPU thread
#[derive(Clone)]
pub struct MockTimeline {
    inner: Arc<(Mutex<TimelineState>, Condvar)>,
}

impl MockTimeline {
    pub fn new() -> Self {
        Self {
            inner: Arc::new((
                Mutex::new(TimelineState { signaled: Vec::new(), pending: VecDeque::new() }),
                Condvar::new(),
            )),
        }
    }

    /// New fence, created signaled like the renderer's frame fences
    pub fn create_fence(&self) -> usize {
        let mut state = self.inner.0.lock().unwrap();
        state.signaled.push(true);
        state.signaled.len() - 1
    }

    /// Queue a submission that will signal `fence` when completed
    pub fn submit(&self, fence: usize) {
        let mut state = self.inner.0.lock().unwrap();
        state.pending.push_back(fence);
    }

    /// Complete the oldest pending submission
    pub fn complete_oldest(&self) -> Option<usize> {
        let (lock, cvar) = &*self.inner;
        let mut state = lock.lock().unwrap();
        let fence = state.pending.pop_front()?;
        state.signaled[fence] = true;
        cvar.notify_all();
        Some(fence)
    }

    pub fn is_signaled(&self, fence: usize) -> bool {
        self.inner.0.lock().unwrap().signaled[fence]
    }

    pub fn pending(&self) -> usize {
        self.inner.0.lock().unwrap().pending.len()
    }
}

impl FenceBackend for MockTimeline {
    type Fence = usize;

    fn wait_fence(&self, fence: usize, timeout_ns: u64) -> Result<()> {
        let (lock, cvar) = &*self.inner;
        let state = lock.lock().unwrap();
        let (state, result) = cvar
            .wait_timeout_while(state, Duration::from_nanos(timeout_ns), |s| !s.signaled[fence])
            .unwrap();
        if result.timed_out() && !state.signaled[fence] {
            return Err(Error::Timeout(format!("mock fence {}", fence)));
        }
        Ok(())
    }

    fn reset_fence(&self, fence: usize) -> Result<()> {
        self.inner.0.lock().unwrap().signaled[fence] = false;
        Ok(())
    }
}
