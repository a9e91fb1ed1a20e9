/// Growable descriptor allocator.
///
/// Keeps a set of descriptor pools split into `ready_pools` (may still have
/// room) and `full_pools` (reported exhaustion). Pools are reset as a whole
/// by [`GrowableDescriptorAllocator::clear_pools`] and never freed per set,
/// so a set stays valid until the owner clears the allocator, which the
/// renderer only does after the owning frame's fences were waited on.
///
/// The pool API itself is abstracted by [`DescriptorPoolBackend`]; the Vulkan
/// backend implements it on its GPU context.

use crate::engine_err;
use crate::error::{Error, Result};

/// Upper bound on sets per newly created pool
pub const MAX_SETS_PER_POOL: u32 = 4096;

/// Growth factor applied to `sets_per_pool` after each pool creation
pub const POOL_GROWTH_FACTOR: f32 = 1.5;

/// Descriptors of one type to reserve per set in a new pool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoolSizeRatio<T> {
    pub descriptor_type: T,
    pub ratio: f32,
}

/// Why a set allocation from one pool failed
#[derive(Debug, Clone, PartialEq)]
pub enum PoolAllocFailure {
    /// The pool has no room left (`VK_ERROR_OUT_OF_POOL_MEMORY`)
    OutOfPoolMemory,
    /// The pool is fragmented (`VK_ERROR_FRAGMENTED_POOL`)
    FragmentedPool,
    /// Any other failure, not retried
    Fatal(Error),
}

/// Device-side pool operations
pub trait DescriptorPoolBackend {
    type Pool: Copy + PartialEq + std::fmt::Debug;
    type Layout: Copy;
    type Set: Copy;
    type DescriptorType: Copy;

    fn create_pool(
        &self,
        max_sets: u32,
        ratios: &[PoolSizeRatio<Self::DescriptorType>],
    ) -> Result<Self::Pool>;

    fn allocate_set(
        &self,
        pool: Self::Pool,
        layout: Self::Layout,
    ) -> std::result::Result<Self::Set, PoolAllocFailure>;

    fn reset_pool(&self, pool: Self::Pool) -> Result<()>;

    fn destroy_pool(&self, pool: Self::Pool);
}

/// Number of descriptors of one type reserved for `max_sets` sets
pub fn descriptor_count(ratio: f32, max_sets: u32) -> u32 {
    ((ratio * max_sets as f32) as u32).max(1)
}

/// Size of the pool created after one of `current` sets
pub fn next_pool_size(current: u32) -> u32 {
    ((current as f32 * POOL_GROWTH_FACTOR) as u32).max(current.saturating_add(1)).min(MAX_SETS_PER_POOL)
}

/// Pool-of-pools descriptor allocator
pub struct GrowableDescriptorAllocator<B: DescriptorPoolBackend> {
    ratios: Vec<PoolSizeRatio<B::DescriptorType>>,
    ready_pools: Vec<B::Pool>,
    full_pools: Vec<B::Pool>,
    sets_per_pool: u32,
}

impl<B: DescriptorPoolBackend> GrowableDescriptorAllocator<B> {
    /// Create the allocator and its first pool sized `max_sets`
    ///
    /// # Errors
    ///
    /// Propagates the backend's pool creation failure.
    pub fn init(
        backend: &B,
        max_sets: u32,
        ratios: &[PoolSizeRatio<B::DescriptorType>],
    ) -> Result<Self> {
        let first = backend.create_pool(max_sets, ratios)?;
        Ok(Self {
            ratios: ratios.to_vec(),
            ready_pools: vec![first],
            full_pools: Vec::new(),
            sets_per_pool: next_pool_size(max_sets),
        })
    }

    /// Allocate one set for `layout`
    ///
    /// Exhausted pools move to the full list and the allocation is retried
    /// exactly once on a fresh (or recycled) pool.
    ///
    /// # Errors
    ///
    /// `Error::DescriptorPoolExhausted` when the retry fails too, or the
    /// backend error for non-exhaustion failures.
    pub fn allocate(&mut self, backend: &B, layout: B::Layout) -> Result<B::Set> {
        let pool = self.get_pool(backend)?;

        match backend.allocate_set(pool, layout) {
            Ok(set) => {
                self.ready_pools.push(pool);
                Ok(set)
            }
            Err(PoolAllocFailure::OutOfPoolMemory) | Err(PoolAllocFailure::FragmentedPool) => {
                self.full_pools.push(pool);

                let retry_pool = self.get_pool(backend)?;
                match backend.allocate_set(retry_pool, layout) {
                    Ok(set) => {
                        self.ready_pools.push(retry_pool);
                        Ok(set)
                    }
                    Err(PoolAllocFailure::Fatal(err)) => {
                        self.ready_pools.push(retry_pool);
                        Err(err)
                    }
                    Err(failure) => {
                        self.full_pools.push(retry_pool);
                        Err(engine_err!("rosy::descriptor", DescriptorPoolExhausted =>
                            "Descriptor allocation failed after growing the pool set: {:?}", failure))
                    }
                }
            }
            Err(PoolAllocFailure::Fatal(err)) => {
                self.ready_pools.push(pool);
                Err(err)
            }
        }
    }

    /// Reset every pool; full pools become ready again. Nothing is destroyed.
    pub fn clear_pools(&mut self, backend: &B) -> Result<()> {
        for &pool in &self.ready_pools {
            backend.reset_pool(pool)?;
        }
        for pool in self.full_pools.drain(..) {
            backend.reset_pool(pool)?;
            self.ready_pools.push(pool);
        }
        Ok(())
    }

    /// Destroy every pool
    pub fn destroy_pools(&mut self, backend: &B) {
        for pool in self.ready_pools.drain(..).chain(self.full_pools.drain(..)) {
            backend.destroy_pool(pool);
        }
    }

    /// Pop a ready pool, or create one with the current `sets_per_pool`
    fn get_pool(&mut self, backend: &B) -> Result<B::Pool> {
        if let Some(pool) = self.ready_pools.pop() {
            return Ok(pool);
        }
        let pool = backend.create_pool(self.sets_per_pool, &self.ratios)?;
        self.sets_per_pool = next_pool_size(self.sets_per_pool);
        Ok(pool)
    }

    pub fn ready_count(&self) -> usize {
        self.ready_pools.len()
    }

    pub fn full_count(&self) -> usize {
        self.full_pools.len()
    }

    pub fn pool_count(&self) -> usize {
        self.ready_pools.len() + self.full_pools.len()
    }

    /// Size the next created pool will have
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }
}

#[cfg(test)]
#[path = "descriptor_allocator_tests.rs"]
mod tests;
