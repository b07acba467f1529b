//! A simulated binary-buddy allocator.
//!
//! [`BuddyAllocator`] manages an abstract address range `[0, size)` whose size
//! is a power of two. No memory is ever touched; addresses are plain offsets
//! and all state is bookkeeping, which makes the allocator useful for
//! modelling fragmentation, planning layouts, or teaching the algorithm.
//!
//! ```
//! use buddy_sim::BuddyAllocator;
//!
//! let mut buddy = BuddyAllocator::try_new_with_min_alloc(1024, 64).unwrap();
//!
//! let a = buddy.alloc(100).unwrap();
//! assert_eq!(a, 0);
//! assert_eq!(buddy.memory_map().to_string(), "*128|128|256|512");
//!
//! buddy.free(a).unwrap();
//! assert_eq!(buddy.memory_map().to_string(), "1024");
//! ```

#![doc(html_root_url = "https://docs.rs/buddy_sim/0.1.0")]
#![warn(missing_debug_implementations)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docs_rs, feature(doc_cfg))]

extern crate alloc;

// Logging goes through the `log` facade when the "log" feature is enabled.
// Otherwise these expand to nothing.
#[cfg(feature = "log")]
macro_rules! trace {
    ($($arg:tt)*) => { ::log::trace!($($arg)*) };
}
#[cfg(feature = "log")]
macro_rules! debug {
    ($($arg:tt)*) => { ::log::debug!($($arg)*) };
}
#[cfg(feature = "log")]
macro_rules! warn {
    ($($arg:tt)*) => { ::log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}
#[cfg(not(feature = "log"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

pub mod buddy;
pub mod render;
pub mod stats;


use core::fmt;

#[cfg(feature = "std")]
pub use crate::buddy::{MutexBuddyAllocator, RwLockBuddyAllocator};
pub use crate::{
    buddy::{BuddyAllocator, RefCellBuddyAllocator},
    render::{MapEntry, MemoryMap},
    stats::Stats,
};

/// A block of the managed address range.
///
/// A block of order `k` spans `2^k` addresses starting at `addr`, and `addr`
/// is always a multiple of `2^k`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block {
    /// The first address covered by the block.
    pub addr: usize,
    /// The base-two logarithm of the block size.
    pub order: u32,
}

impl Block {
    /// Returns the number of addresses spanned by the block.
    #[inline]
    pub fn size(self) -> usize {
        1 << self.order
    }

    /// Returns the address one past the end of the block.
    #[inline]
    pub fn end(self) -> usize {
        self.addr + self.size()
    }

    /// Returns the address of this block's buddy.
    ///
    /// The buddy is the other half of the order `order + 1` block that
    /// contains `self`; its address differs from `self.addr` only in bit
    /// `order`.
    #[inline]
    pub fn buddy(self) -> usize {
        self.addr ^ self.size()
    }
}

/// The error type for allocator constructors.
///
/// Every variant indicates an invalid configuration; no constructor performs
/// an operation that can fail for any other reason.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AllocInitError {
    /// The total size is zero or not a power of two.
    InvalidSize(usize),

    /// The minimum allocation size is zero or not a power of two.
    InvalidMinAlloc(usize),

    /// The minimum allocation size is larger than the managed range.
    MinAllocTooLarge {
        /// The requested total size.
        size: usize,
        /// The requested minimum allocation size.
        min_alloc: usize,
    },
}

impl fmt::Display for AllocInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocInitError::InvalidSize(size) => {
                write!(f, "size must be a nonzero power of two (got {size})")
            }
            AllocInitError::InvalidMinAlloc(min_alloc) => write!(
                f,
                "min_alloc must be a nonzero power of two (got {min_alloc})"
            ),
            AllocInitError::MinAllocTooLarge { size, min_alloc } => write!(
                f,
                "min_alloc ({min_alloc}) must not exceed size ({size})"
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocInitError {}

/// Indicates that an allocation request could not be satisfied.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum AllocError {
    /// The requested size was zero.
    InvalidRequest,

    /// No free block is large enough to hold the request.
    ///
    /// This includes requests larger than the whole managed range.
    OutOfMemory {
        /// The size that was requested.
        requested: usize,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocError::InvalidRequest => f.write_str("cannot allocate zero bytes"),
            AllocError::OutOfMemory { requested } => {
                write!(f, "out of memory (requested {requested} bytes)")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Indicates that a block could not be freed.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum FreeError {
    /// The address does not start an outstanding allocation.
    ///
    /// This is returned for double frees as well as for addresses that were
    /// never returned by `alloc`.
    UnknownAllocation(usize),
}

impl fmt::Display for FreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FreeError::UnknownAllocation(addr) => write!(f, "unknown allocation: {addr:#x}"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FreeError {}
