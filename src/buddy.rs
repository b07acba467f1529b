//! Binary-buddy allocation.
//!
//! A binary-buddy allocator manages a range whose size is a power of two. The
//! range starts out as a single free block; to satisfy a request, the
//! smallest sufficiently large free block is repeatedly halved until it
//! matches the rounded-up request, and every upper half produced along the
//! way is kept as a free block of its own. When a block is freed, it is
//! merged with its *buddy* (the other half of the block it was split from)
//! for as long as that buddy is free as well.
//!
//! ## Characteristics
//!
//! #### Time complexity
//!
//! Let `L` be the number of orders (`max_order - min_order + 1`) and `n` the
//! number of free blocks of a single order.
//!
//! | Operation                | Best-case   | Worst-case      |
//! |--------------------------|-------------|-----------------|
//! | Allocate                 | O(log n)    | O(L log n)      |
//! | Deallocate               | O(log n)    | O(L log n)      |
//!
//! #### Fragmentation
//!
//! Every allocation is rounded up to a power of two no smaller than
//! `min_alloc`, so internal fragmentation can approach half of each block.
//! External fragmentation is bounded by eager coalescing: two free buddies
//! never coexist once an operation returns.

use core::{cell::RefCell, cmp};

#[cfg(feature = "std")]
use std::sync::{Mutex, PoisonError, RwLock};

use alloc::{
    collections::{BTreeMap, BTreeSet},
    vec::Vec,
};

use crate::{
    render::{MapEntry, MemoryMap},
    stats::Stats,
    AllocError, AllocInitError, Block, FreeError,
};

/// Declares wrappers which serialize access to a `BuddyAllocator`.
///
/// Each operation holds the wrapper's guard until it returns, so a split or
/// merge in progress is never observed by another caller.
macro_rules! declare_wrappers {
    ($($(#[$attr:meta])* $wrapper:ident uses $typename:ident via |$cell:ident| $acquire:expr;)*) => {
        $(
            #[doc = concat!("A `BuddyAllocator` wrapped by a `", stringify!($typename), "`.")]
            ///
            /// Every method acquires the wrapper for the full duration of the
            /// operation.
            $(#[$attr])*
            #[derive(Debug)]
            pub struct $wrapper {
                inner: $typename<BuddyAllocator>,
            }

            $(#[$attr])*
            impl $wrapper {
                #[doc = concat!("Wraps `allocator` in a `", stringify!($typename), "`.")]
                pub fn new(allocator: BuddyAllocator) -> $wrapper {
                    $wrapper {
                        inner: $typename::new(allocator),
                    }
                }

                /// Returns a reference to the inner wrapper.
                pub fn inner(&self) -> &$typename<BuddyAllocator> {
                    &self.inner
                }

                /// Runs `f` with exclusive access to the allocator.
                pub fn with<R>(&self, f: impl FnOnce(&mut BuddyAllocator) -> R) -> R {
                    let $cell = &self.inner;
                    let mut guard = $acquire;
                    f(&mut guard)
                }

                /// Allocates a block. See [`BuddyAllocator::alloc`].
                pub fn alloc(&self, size: usize) -> Result<usize, AllocError> {
                    self.with(|buddy| buddy.alloc(size))
                }

                /// Frees a block. See [`BuddyAllocator::free`].
                pub fn free(&self, addr: usize) -> Result<(), FreeError> {
                    self.with(|buddy| buddy.free(addr))
                }

                /// Renders the block layout. See [`BuddyAllocator::render`].
                pub fn render(&self) -> Vec<MapEntry> {
                    self.with(|buddy| buddy.render())
                }

                /// Collects statistics. See [`BuddyAllocator::stats`].
                pub fn stats(&self) -> Stats {
                    self.with(|buddy| buddy.stats())
                }
            }

            impl From<BuddyAllocator> for $wrapper {
                fn from(allocator: BuddyAllocator) -> $wrapper {
                    $wrapper::new(allocator)
                }
            }
        )*
    };
}

declare_wrappers! {
    RefCellBuddyAllocator uses RefCell via |cell| cell.borrow_mut();
}

#[cfg(feature = "std")]
declare_wrappers! {
    #[cfg_attr(docs_rs, doc(cfg(feature = "std")))]
    MutexBuddyAllocator uses Mutex via |lock| lock.lock().unwrap_or_else(PoisonError::into_inner);

    #[cfg_attr(docs_rs, doc(cfg(feature = "std")))]
    RwLockBuddyAllocator uses RwLock via |lock| lock.write().unwrap_or_else(PoisonError::into_inner);
}

/// The free blocks of a single order.
#[derive(Clone, Debug, PartialEq, Eq)]
struct BuddyLevel {
    order: u32,
    free: BTreeSet<usize>,
}

impl BuddyLevel {
    fn new(order: u32) -> BuddyLevel {
        BuddyLevel {
            order,
            free: BTreeSet::new(),
        }
    }

    #[inline]
    fn block_size(&self) -> usize {
        1 << self.order
    }

    /// Retrieves the offset of the buddy of the block which starts at
    /// `block_ofs`.
    #[inline]
    fn buddy_ofs(&self, block_ofs: usize) -> usize {
        block_ofs ^ self.block_size()
    }

    #[inline]
    fn contains(&self, block_ofs: usize) -> bool {
        self.free.contains(&block_ofs)
    }

    /// Removes and returns the lowest-addressed free block.
    fn allocate(&mut self) -> Option<usize> {
        self.free.pop_first()
    }

    /// Assigns a free block to this level.
    fn assign(&mut self, block_ofs: usize) {
        debug_assert_eq!(block_ofs % self.block_size(), 0, "misaligned block");

        let inserted = self.free.insert(block_ofs);
        debug_assert!(inserted, "block {block_ofs:#x} already free");
    }

    /// Returns a block to this level.
    ///
    /// If `coalesce` is set and the block's buddy is free, the buddy is
    /// removed and the offset of the merged block is returned so that the
    /// caller can free it at the next level up. Otherwise the block is added
    /// to this level and `None` is returned.
    fn free(&mut self, block_ofs: usize, coalesce: bool) -> Option<usize> {
        if coalesce {
            let buddy_ofs = self.buddy_ofs(block_ofs);

            if self.free.remove(&buddy_ofs) {
                trace!(
                    "merge {:#x} with buddy {:#x} at order {}",
                    block_ofs,
                    buddy_ofs,
                    self.order
                );

                return Some(cmp::min(block_ofs, buddy_ofs));
            }
        }

        self.assign(block_ofs);
        None
    }
}

/// An outstanding allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Allocation {
    order: u32,
    requested: usize,
}

/// A binary-buddy allocator over the abstract range `[0, size)`.
///
/// Both `size` and the minimum allocation size `min_alloc` are powers of
/// two; every block handed out has a power-of-two size between the two.
///
/// Free blocks of each order are kept in address order, and allocation always
/// takes the lowest-addressed block of the smallest order that fits, so the
/// addresses returned for a given sequence of calls are deterministic.
///
/// ```
/// use buddy_sim::{AllocError, BuddyAllocator};
///
/// let mut buddy = BuddyAllocator::try_new_with_min_alloc(1024, 64).unwrap();
///
/// // Requests are rounded up to a power of two of at least `min_alloc`.
/// let a = buddy.alloc(100).unwrap();
/// assert_eq!(buddy.allocation(a).unwrap().size(), 128);
///
/// assert_eq!(
///     buddy.alloc(2048),
///     Err(AllocError::OutOfMemory { requested: 2048 })
/// );
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuddyAllocator {
    size: usize,
    min_order: u32,
    /// Free blocks by level. Level 0 holds blocks of `size`; each subsequent
    /// level holds blocks of half the size of the previous one.
    levels: Vec<BuddyLevel>,
    /// Outstanding allocations, keyed by address.
    allocated: BTreeMap<usize, Allocation>,
}

impl BuddyAllocator {
    /// Constructs a new `BuddyAllocator` over `[0, size)` with a minimum
    /// allocation size of 1.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is not a nonzero power of two.
    pub fn try_new(size: usize) -> Result<BuddyAllocator, AllocInitError> {
        Self::try_new_with_min_alloc(size, 1)
    }

    /// Constructs a new `BuddyAllocator` over `[0, size)` whose smallest
    /// block holds `min_alloc` addresses.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the following are true:
    /// - `size` is not a nonzero power of two.
    /// - `min_alloc` is not a nonzero power of two.
    /// - `min_alloc` is greater than `size`.
    pub fn try_new_with_min_alloc(
        size: usize,
        min_alloc: usize,
    ) -> Result<BuddyAllocator, AllocInitError> {
        if !size.is_power_of_two() {
            return Err(AllocInitError::InvalidSize(size));
        }

        if !min_alloc.is_power_of_two() {
            return Err(AllocInitError::InvalidMinAlloc(min_alloc));
        }

        if min_alloc > size {
            return Err(AllocInitError::MinAllocTooLarge { size, min_alloc });
        }

        let max_order = size.trailing_zeros();
        let min_order = min_alloc.trailing_zeros();

        let mut levels: Vec<BuddyLevel> = (min_order..=max_order)
            .rev()
            .map(BuddyLevel::new)
            .collect();

        // Initially, the whole range is one free block.
        levels[0].assign(0);

        debug!(
            "new buddy allocator: size={:#x} min_alloc={:#x} orders={}..={}",
            size,
            min_alloc,
            min_order,
            max_order
        );

        Ok(BuddyAllocator {
            size,
            min_order,
            levels,
            allocated: BTreeMap::new(),
        })
    }

    /// Returns the size of the managed range.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the size of the smallest block.
    #[inline]
    pub fn min_alloc(&self) -> usize {
        1 << self.min_order
    }

    /// Returns the order of the smallest block.
    #[inline]
    pub fn min_order(&self) -> u32 {
        self.min_order
    }

    /// Returns the order of the largest block, which spans the whole range.
    #[inline]
    pub fn max_order(&self) -> u32 {
        self.levels[0].order
    }

    #[inline]
    fn level_of(&self, order: u32) -> usize {
        debug_assert!(self.min_order <= order && order <= self.max_order());

        (self.max_order() - order) as usize
    }

    /// Returns the order of the block that would back an allocation of
    /// `size`.
    ///
    /// This does not consider which blocks are currently free.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidRequest`] if `size` is zero, and
    /// [`AllocError::OutOfMemory`] if `size` exceeds the managed range.
    pub fn order_for(&self, size: usize) -> Result<u32, AllocError> {
        if size == 0 {
            return Err(AllocError::InvalidRequest);
        }

        if size > self.size {
            return Err(AllocError::OutOfMemory { requested: size });
        }

        // `size <= self.size`, and `self.size` is a power of two, so rounding
        // up cannot overflow.
        let alloc_size = cmp::max(size, self.min_alloc()).next_power_of_two();

        Ok(alloc_size.trailing_zeros())
    }

    /// Allocates a block which can hold `size` addresses.
    ///
    /// On success, returns the address of the first element of the block.
    /// The block's size is `size` rounded up to the next power of two, and at
    /// least [`min_alloc`](Self::min_alloc).
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidRequest`] if `size` is zero, and
    /// [`AllocError::OutOfMemory`] if no free block is large enough. The
    /// allocator is left unchanged on failure.
    pub fn alloc(&mut self, size: usize) -> Result<usize, AllocError> {
        let order = match self.order_for(size) {
            Ok(o) => o,
            Err(e) => {
                warn!("alloc({:#x}) rejected: {}", size, e);
                return Err(e);
            }
        };

        let target_level = self.level_of(order);

        // Scan increasing block sizes, starting at the target size, until a
        // free block is found.
        let (block, init_level) = match (0..=target_level).rev().find_map(|level| {
            self.levels[level]
                .allocate()
                .map(|block| (block, level))
        }) {
            Some(found) => found,
            None => {
                warn!("alloc({:#x}): no free block of order >= {}", size, order);
                return Err(AllocError::OutOfMemory { requested: size });
            }
        };

        // Split the block repeatedly to obtain a suitably sized block. The
        // address of the front half does not change.
        for level in init_level..target_level {
            let back_half = block + self.levels[level + 1].block_size();

            trace!(
                "split {:#x} at order {}, freeing {:#x}",
                block,
                self.levels[level].order,
                back_half
            );

            self.levels[level + 1].assign(back_half);
        }

        self.allocated.insert(
            block,
            Allocation {
                order,
                requested: size,
            },
        );

        debug!("alloc({:#x}) -> {:#x} (order {})", size, block, order);

        Ok(block)
    }

    /// Frees the block allocated at `addr`.
    ///
    /// The block is merged with its buddy, and the result with its own buddy,
    /// for as long as the buddy is free.
    ///
    /// # Errors
    ///
    /// Returns [`FreeError::UnknownAllocation`] if `addr` does not start an
    /// outstanding allocation. The allocator is left unchanged on failure.
    pub fn free(&mut self, addr: usize) -> Result<(), FreeError> {
        let Some(allocation) = self.allocated.remove(&addr) else {
            warn!("free({:#x}): unknown allocation", addr);
            return Err(FreeError::UnknownAllocation(addr));
        };

        let at_level = self.level_of(allocation.order);

        let mut block = Some(addr);
        for level in (0..=at_level).rev() {
            match block.take() {
                Some(b) => {
                    block = self.levels[level].free(b, level != 0);
                }
                None => break,
            }
        }

        debug_assert!(block.is_none(), "top level coalesced a block");

        debug!("free({:#x}) (order {})", addr, allocation.order);

        Ok(())
    }

    /// Returns `true` if `addr` starts an outstanding allocation.
    #[inline]
    pub fn is_allocated(&self, addr: usize) -> bool {
        self.allocated.contains_key(&addr)
    }

    /// Returns the block backing the allocation at `addr`, if any.
    pub fn allocation(&self, addr: usize) -> Option<Block> {
        self.allocated
            .get(&addr)
            .map(|a| Block { addr, order: a.order })
    }

    /// Returns the blocks backing all outstanding allocations, in address
    /// order.
    pub fn allocations(&self) -> impl Iterator<Item = Block> + '_ {
        self.allocated.iter().map(|(&addr, a)| Block {
            addr,
            order: a.order,
        })
    }

    /// Returns all free blocks, ordered by ascending order and then by
    /// ascending address.
    pub fn free_blocks(&self) -> impl Iterator<Item = Block> + '_ {
        self.levels.iter().rev().flat_map(|level| {
            level.free.iter().map(move |&addr| Block {
                addr,
                order: level.order,
            })
        })
    }

    /// Returns the map entry for the block which starts at `addr`, if any.
    pub(crate) fn entry_at(&self, addr: usize) -> Option<MapEntry> {
        if let Some(a) = self.allocated.get(&addr) {
            return Some(MapEntry {
                block: Block {
                    addr,
                    order: a.order,
                },
                allocated: true,
            });
        }

        self.levels
            .iter()
            .find(|level| level.contains(addr))
            .map(|level| MapEntry {
                block: Block {
                    addr,
                    order: level.order,
                },
                allocated: false,
            })
    }

    /// Returns a view of the current block layout.
    ///
    /// The view iterates every block in address order and renders as a
    /// `|`-separated list of block sizes, with allocated blocks prefixed by
    /// `*`.
    pub fn memory_map(&self) -> MemoryMap<'_> {
        MemoryMap::new(self)
    }

    /// Returns every block in address order, tagged with whether it is
    /// allocated.
    ///
    /// The block sizes always sum to [`size`](Self::size).
    pub fn render(&self) -> Vec<MapEntry> {
        self.memory_map().iter().collect()
    }

    /// Collects statistics about the current state of the allocator.
    pub fn stats(&self) -> Stats {
        let mut stats = Stats::new(self.size, self.max_order());

        for block in self.free_blocks() {
            stats.add_free(block);
        }

        for (&addr, a) in &self.allocated {
            stats.add_allocation(
                Block {
                    addr,
                    order: a.order,
                },
                a.requested,
            );
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::prelude::rust_2021::*;

    use super::*;

    fn demo() -> BuddyAllocator {
        BuddyAllocator::try_new_with_min_alloc(1024, 64).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        for size in [0, 3, 6, 1000, usize::MAX] {
            assert_eq!(
                BuddyAllocator::try_new(size),
                Err(AllocInitError::InvalidSize(size))
            );
        }

        for min_alloc in [0, 3, 6, 48] {
            assert_eq!(
                BuddyAllocator::try_new_with_min_alloc(1024, min_alloc),
                Err(AllocInitError::InvalidMinAlloc(min_alloc))
            );
        }

        assert_eq!(
            BuddyAllocator::try_new_with_min_alloc(64, 128),
            Err(AllocInitError::MinAllocTooLarge {
                size: 64,
                min_alloc: 128
            })
        );
    }

    #[test]
    fn accepts_extreme_configs() {
        let one = BuddyAllocator::try_new(1).unwrap();
        assert_eq!(one.max_order(), 0);
        assert_eq!(one.min_order(), 0);

        let huge = BuddyAllocator::try_new(1 << (usize::BITS - 1)).unwrap();
        assert_eq!(huge.max_order(), usize::BITS - 1);

        let single = BuddyAllocator::try_new_with_min_alloc(256, 256).unwrap();
        assert_eq!(single.levels.len(), 1);
    }

    #[test]
    fn new_allocator_is_one_free_block() {
        let buddy = demo();

        assert_eq!(buddy.size(), 1024);
        assert_eq!(buddy.min_alloc(), 64);
        assert_eq!(buddy.min_order(), 6);
        assert_eq!(buddy.max_order(), 10);
        assert_eq!(
            buddy.free_blocks().collect::<Vec<_>>(),
            [Block {
                addr: 0,
                order: 10
            }]
        );
        assert_eq!(buddy.allocations().count(), 0);
    }

    #[test]
    fn order_for_rounds_up() {
        let buddy = demo();

        assert_eq!(buddy.order_for(0), Err(AllocError::InvalidRequest));
        assert_eq!(buddy.order_for(1), Ok(6));
        assert_eq!(buddy.order_for(60), Ok(6));
        assert_eq!(buddy.order_for(64), Ok(6));
        assert_eq!(buddy.order_for(65), Ok(7));
        assert_eq!(buddy.order_for(100), Ok(7));
        assert_eq!(buddy.order_for(240), Ok(8));
        assert_eq!(buddy.order_for(1024), Ok(10));
        assert_eq!(
            buddy.order_for(1025),
            Err(AllocError::OutOfMemory { requested: 1025 })
        );
        assert_eq!(
            buddy.order_for(usize::MAX),
            Err(AllocError::OutOfMemory {
                requested: usize::MAX
            })
        );
    }

    #[test]
    fn alloc_splits_down_to_target() {
        let mut buddy = demo();

        assert_eq!(buddy.alloc(100), Ok(0));
        assert_eq!(
            buddy.allocation(0),
            Some(Block {
                addr: 0,
                order: 7
            })
        );
        assert_eq!(
            buddy.free_blocks().collect::<Vec<_>>(),
            [
                Block {
                    addr: 128,
                    order: 7
                },
                Block {
                    addr: 256,
                    order: 8
                },
                Block {
                    addr: 512,
                    order: 9
                },
            ]
        );
    }

    #[test]
    fn alloc_takes_lowest_address() {
        let mut buddy = BuddyAllocator::try_new(16).unwrap();

        let addrs: Vec<usize> = (0..4).map(|_| buddy.alloc(4).unwrap()).collect();
        assert_eq!(addrs, [0, 4, 8, 12]);

        // Leave two free order-2 blocks which cannot merge.
        buddy.free(12).unwrap();
        buddy.free(4).unwrap();
        assert_eq!(buddy.alloc(3), Ok(4));
        assert_eq!(buddy.alloc(3), Ok(12));
    }

    #[test]
    fn free_merges_transitively() {
        let mut buddy = BuddyAllocator::try_new(64).unwrap();

        let a = buddy.alloc(1).unwrap();
        let b = buddy.alloc(1).unwrap();
        let c = buddy.alloc(2).unwrap();
        assert_eq!((a, b, c), (0, 1, 2));

        buddy.free(c).unwrap();
        buddy.free(a).unwrap();
        // 1 is still allocated, so nothing above order 0 can merge.
        assert!(buddy.levels.iter().all(|l| !l.contains(0) || l.order == 0));

        buddy.free(b).unwrap();
        assert_eq!(
            buddy.free_blocks().collect::<Vec<_>>(),
            [Block {
                addr: 0,
                order: 6
            }]
        );
    }

    #[test]
    fn zero_size_is_invalid() {
        let mut buddy = demo();
        let before = buddy.clone();

        assert_eq!(buddy.alloc(0), Err(AllocError::InvalidRequest));
        assert_eq!(buddy, before);
    }

    #[test]
    fn oversized_request_is_out_of_memory() {
        let mut buddy = demo();
        let before = buddy.clone();

        assert_eq!(
            buddy.alloc(2048),
            Err(AllocError::OutOfMemory { requested: 2048 })
        );
        assert_eq!(buddy, before);
    }

    #[test]
    fn exhaustion_leaves_state_untouched() {
        let mut buddy = demo();

        // Each request rounds up to 256, so only four fit.
        let addrs: Vec<usize> = (0..4).map(|_| buddy.alloc(129).unwrap()).collect();
        assert_eq!(addrs, [0, 256, 512, 768]);

        let before = buddy.clone();
        assert_eq!(
            buddy.alloc(1),
            Err(AllocError::OutOfMemory { requested: 1 })
        );
        assert_eq!(buddy, before);

        for addr in addrs {
            assert!(buddy.is_allocated(addr));
        }
    }

    #[test]
    fn double_free_is_rejected() {
        let mut buddy = demo();

        let a = buddy.alloc(64).unwrap();
        let _b = buddy.alloc(64).unwrap();
        buddy.free(a).unwrap();

        let before = buddy.clone();
        assert_eq!(buddy.free(a), Err(FreeError::UnknownAllocation(a)));
        assert_eq!(buddy, before);
    }

    #[test]
    fn bogus_free_is_rejected() {
        let mut buddy = demo();
        let a = buddy.alloc(256).unwrap();

        // An address inside an allocation is not the allocation itself.
        assert_eq!(
            buddy.free(a + 64),
            Err(FreeError::UnknownAllocation(a + 64))
        );
        assert_eq!(buddy.free(4096), Err(FreeError::UnknownAllocation(4096)));
        assert!(buddy.is_allocated(a));
    }

    #[test]
    fn round_trip_restores_initial_state() {
        for size in [1, 60, 64, 65, 100, 240, 512, 1000, 1024] {
            let mut buddy = demo();
            let initial = buddy.clone();

            let addr = buddy.alloc(size).unwrap();
            buddy.free(addr).unwrap();

            assert_eq!(buddy, initial, "round trip of {size} changed state");
        }
    }

    #[test]
    fn worked_scenario() {
        let mut buddy = demo();

        let a100 = buddy.alloc(100).unwrap();
        let a240 = buddy.alloc(240).unwrap();
        let a60 = buddy.alloc(60).unwrap();
        let a200 = buddy.alloc(200).unwrap();

        assert_eq!((a100, a240, a60, a200), (0, 256, 128, 512));
        assert_eq!(buddy.allocation(a100).unwrap().size(), 128);
        assert_eq!(buddy.allocation(a240).unwrap().size(), 256);
        assert_eq!(buddy.allocation(a60).unwrap().size(), 64);
        assert_eq!(buddy.allocation(a200).unwrap().size(), 256);

        buddy.free(a240).unwrap();
        buddy.free(a100).unwrap();

        // The 70-byte request reuses the freed 128-byte block at 0.
        let a70 = buddy.alloc(70).unwrap();
        assert_eq!(a70, 0);
        assert_eq!(buddy.allocation(a70).unwrap().size(), 128);

        buddy.free(a60).unwrap();
        buddy.free(a70).unwrap();
        buddy.free(a200).unwrap();

        assert_eq!(buddy, demo());
    }

    #[test]
    fn single_block_allocator() {
        let mut buddy = BuddyAllocator::try_new(1).unwrap();

        assert_eq!(buddy.alloc(1), Ok(0));
        assert_eq!(
            buddy.alloc(1),
            Err(AllocError::OutOfMemory { requested: 1 })
        );
        buddy.free(0).unwrap();
        assert_eq!(buddy.alloc(1), Ok(0));
    }

    #[test]
    fn refcell_wrapper_serializes_operations() {
        let buddy = RefCellBuddyAllocator::new(demo());

        let a = buddy.alloc(100).unwrap();
        let b = buddy.with(|inner| {
            let b = inner.alloc(64).unwrap();
            assert!(inner.is_allocated(a));
            b
        });

        assert_eq!(buddy.render().len(), 5);
        assert_eq!(buddy.stats().allocations, 2);

        buddy.free(a).unwrap();
        buddy.free(b).unwrap();
        assert_eq!(*buddy.inner().borrow(), demo());
    }

    #[cfg(feature = "std")]
    #[test]
    fn mutex_wrapper_is_shareable() {
        use std::{sync::Arc, thread};

        let buddy = Arc::new(MutexBuddyAllocator::new(demo()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buddy = Arc::clone(&buddy);
                thread::spawn(move || {
                    let addr = buddy.alloc(200).unwrap();
                    buddy.free(addr).unwrap();
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        buddy.with(|inner| assert_eq!(*inner, demo()));
    }

    #[cfg(feature = "std")]
    #[test]
    fn rwlock_wrapper_allocates() {
        let buddy: RwLockBuddyAllocator = demo().into();

        let a = buddy.alloc(512).unwrap();
        assert_eq!(buddy.stats().allocated_bytes, 512);
        buddy.free(a).unwrap();
        assert_eq!(buddy.stats().free_bytes, 1024);
    }
}
