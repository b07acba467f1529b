//! Observing the block layout of a [`BuddyAllocator`].

use core::{fmt, iter::FusedIterator};

use crate::{Block, BuddyAllocator};

/// A block of the managed range, tagged with its state.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MapEntry {
    /// The block.
    pub block: Block,
    /// `true` if the block backs an outstanding allocation.
    pub allocated: bool,
}

impl MapEntry {
    /// Returns the size of the block.
    #[inline]
    pub fn size(&self) -> usize {
        self.block.size()
    }
}

impl fmt::Display for MapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allocated {
            f.write_str("*")?;
        }

        write!(f, "{}", self.size())
    }
}

/// A borrowed view of the block layout of a [`BuddyAllocator`].
///
/// Iterating the map yields every block, free or allocated, in address
/// order. The blocks tile the managed range exactly.
///
/// The `Display` implementation joins the blocks with `|`, writing allocated
/// blocks as `*N` and free blocks as `N`:
///
/// ```
/// use buddy_sim::BuddyAllocator;
///
/// let mut buddy = BuddyAllocator::try_new_with_min_alloc(1024, 64).unwrap();
/// buddy.alloc(100).unwrap();
/// buddy.alloc(60).unwrap();
///
/// assert_eq!(buddy.memory_map().to_string(), "*128|*64|64|256|512");
/// ```
#[derive(Copy, Clone, Debug)]
pub struct MemoryMap<'a> {
    buddy: &'a BuddyAllocator,
}

impl<'a> MemoryMap<'a> {
    pub(crate) fn new(buddy: &'a BuddyAllocator) -> MemoryMap<'a> {
        MemoryMap { buddy }
    }

    /// Returns an iterator over the blocks in address order.
    pub fn iter(&self) -> Iter<'a> {
        Iter {
            buddy: self.buddy,
            cursor: 0,
        }
    }
}

impl<'a> IntoIterator for MemoryMap<'a> {
    type Item = MapEntry;

    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl<'a> IntoIterator for &MemoryMap<'a> {
    type Item = MapEntry;

    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl fmt::Display for MemoryMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, entry) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }

            write!(f, "{entry}")?;
        }

        Ok(())
    }
}

/// An iterator over the blocks of a [`MemoryMap`].
#[derive(Clone, Debug)]
pub struct Iter<'a> {
    buddy: &'a BuddyAllocator,
    cursor: usize,
}

impl Iterator for Iter<'_> {
    type Item = MapEntry;

    fn next(&mut self) -> Option<MapEntry> {
        if self.cursor >= self.buddy.size() {
            return None;
        }

        let Some(entry) = self.buddy.entry_at(self.cursor) else {
            debug_assert!(false, "no block starts at {:#x}", self.cursor);

            // Stop rather than loop forever on corrupted bookkeeping.
            self.cursor = self.buddy.size();
            return None;
        };

        self.cursor = entry.block.end();
        Some(entry)
    }
}

impl FusedIterator for Iter<'_> {}
