use std::collections::BTreeSet;

use alloc_hater::Subject;
use buddy_sim::{AllocError, AllocInitError, Block, BuddyAllocator, FreeError};

/// A `BuddyAllocator` under evaluation.
///
/// After every operation, the subject verifies that the memory map tiles the
/// managed range and that no two free blocks are buddies.
pub struct BuddySubject(BuddyAllocator);

impl BuddySubject {
    pub fn new(size: usize, min_alloc: usize) -> Result<Self, AllocInitError> {
        let b = BuddyAllocator::try_new_with_min_alloc(size, min_alloc)?;
        Ok(BuddySubject(b))
    }

    pub fn allocator(&self) -> &BuddyAllocator {
        &self.0
    }

    pub fn into_inner(self) -> BuddyAllocator {
        self.0
    }
}

impl Subject for BuddySubject {
    type AllocError = AllocError;
    type FreeError = FreeError;

    fn capacity(&self) -> usize {
        self.0.size()
    }

    fn allocate(&mut self, size: usize) -> Result<usize, AllocError> {
        let before = self.0.clone();

        self.0.alloc(size).map_err(|e| {
            assert_eq!(self.0, before, "failed alloc({size}) mutated the allocator");
            e
        })
    }

    fn deallocate(&mut self, addr: usize) -> Result<(), FreeError> {
        let before = self.0.clone();

        self.0.free(addr).map_err(|e| {
            assert_eq!(self.0, before, "failed free({addr:#x}) mutated the allocator");
            e
        })
    }

    fn check(&self) -> Result<(), String> {
        check_tiling(&self.0)?;
        check_buddies(&self.0)
    }
}

/// Verifies that the memory map covers `[0, size)` with no gap or overlap.
pub fn check_tiling(buddy: &BuddyAllocator) -> Result<(), String> {
    let mut cursor = 0;

    for entry in buddy.memory_map() {
        if entry.block.addr != cursor {
            return Err(format!(
                "block at {:#x} does not follow {:#x}",
                entry.block.addr, cursor
            ));
        }

        cursor = entry.block.end();
    }

    if cursor != buddy.size() {
        return Err(format!("map ends at {cursor:#x}, not {:#x}", buddy.size()));
    }

    Ok(())
}

/// Verifies that no free block's buddy is also free.
pub fn check_buddies(buddy: &BuddyAllocator) -> Result<(), String> {
    let free: BTreeSet<Block> = buddy.free_blocks().collect();

    for block in free.iter().filter(|b| b.order < buddy.max_order()) {
        let buddy_block = Block {
            addr: block.buddy(),
            order: block.order,
        };

        if free.contains(&buddy_block) {
            return Err(format!(
                "free buddies at {:#x} and {:#x} (order {})",
                block.addr, buddy_block.addr, block.order
            ));
        }
    }

    Ok(())
}
