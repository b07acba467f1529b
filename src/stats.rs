//! Allocator statistics.

use alloc::vec::Vec;

use crate::Block;

/// A snapshot of a [`BuddyAllocator`]'s accounting.
///
/// [`BuddyAllocator`]: crate::BuddyAllocator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// The size of the managed range.
    pub total_bytes: usize,
    /// The combined size of all free blocks.
    pub free_bytes: usize,
    /// The combined size of all allocated blocks.
    pub allocated_bytes: usize,
    /// The combined size requested by callers for all outstanding
    /// allocations.
    pub requested_bytes: usize,
    /// The number of outstanding allocations.
    pub allocations: usize,
    /// The number of free blocks of each order, indexed by order.
    pub free_blocks_by_order: Vec<usize>,
    /// The size of the largest free block, if any block is free.
    pub largest_free_block: Option<usize>,
}

impl Stats {
    pub(crate) fn new(total_bytes: usize, max_order: u32) -> Stats {
        let mut free_blocks_by_order = Vec::new();
        free_blocks_by_order.resize(max_order as usize + 1, 0);

        Stats {
            total_bytes,
            free_blocks_by_order,
            ..Stats::default()
        }
    }

    pub(crate) fn add_free(&mut self, block: Block) {
        self.free_bytes += block.size();
        self.free_blocks_by_order[block.order as usize] += 1;
        self.largest_free_block = self.largest_free_block.max(Some(block.size()));
    }

    pub(crate) fn add_allocation(&mut self, block: Block, requested: usize) {
        self.allocated_bytes += block.size();
        self.requested_bytes += requested;
        self.allocations += 1;
    }

    /// Returns the number of allocated bytes that callers did not ask for.
    #[inline]
    pub fn internal_fragmentation(&self) -> usize {
        self.allocated_bytes - self.requested_bytes
    }

    /// Returns the number of free blocks.
    pub fn free_blocks(&self) -> usize {
        self.free_blocks_by_order.iter().sum()
    }
}
