//! A small library for ~~hating on~~ evaluating the correctness of offset
//! allocators.
//!
//! An offset allocator hands out ranges of an abstract address space rather
//! than pointers. The [`Evaluator`] drives such an allocator through a
//! sequence of [`AllocatorOp`]s and keeps a shadow record of every range it
//! handed out, failing as soon as two outstanding ranges overlap, a range
//! leaves the managed space, a valid free is refused, or a stale free is
//! accepted.

use std::{collections::BTreeMap, fmt::Debug};

/// A request size which implements `Arbitrary`.
///
/// Sizes are spread evenly across powers of two, and may be zero.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ArbSize(pub usize);

/// Limit on generated request sizes, expressed in bits.
pub const SIZE_LIMIT_BITS: u8 = 24;

impl arbitrary::Arbitrary<'_> for ArbSize {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        // Select a random bit index and shift to obtain an upper bound.
        let shift = u8::arbitrary(u)? % (SIZE_LIMIT_BITS + 1);
        let bound: usize = 1 << shift;

        Ok(ArbSize(usize::arbitrary(u)? % bound))
    }
}

#[derive(arbitrary::Arbitrary)]
enum AllocatorOpTag {
    Alloc,
    Dealloc,
    Redealloc,
}

/// An operation applied to a [`Subject`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocatorOp {
    /// Allocate a range of the given size.
    Alloc(usize),
    /// Free an outstanding allocation.
    ///
    /// Given `n` outstanding allocations, the allocation to free is at index
    /// `idx % n`.
    Dealloc(usize),
    /// Free an address that was already freed.
    ///
    /// Given `n` previously freed addresses, the address to free again is at
    /// index `idx % n`. The subject must reject it unless it has since been
    /// handed out again.
    Redealloc(usize),
}

impl arbitrary::Arbitrary<'_> for AllocatorOp {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let tag = AllocatorOpTag::arbitrary(u)?;

        let op = match tag {
            AllocatorOpTag::Alloc => AllocatorOp::Alloc(ArbSize::arbitrary(u)?.0),
            AllocatorOpTag::Dealloc => AllocatorOp::Dealloc(usize::arbitrary(u)?),
            AllocatorOpTag::Redealloc => AllocatorOp::Redealloc(usize::arbitrary(u)?),
        };

        Ok(op)
    }
}

/// An allocator under evaluation.
pub trait Subject {
    type AllocError: Debug;
    type FreeError: Debug;

    /// Returns the size of the address space managed by the subject.
    fn capacity(&self) -> usize;

    /// Allocates a range of at least `size` addresses, returning its start.
    fn allocate(&mut self, size: usize) -> Result<usize, Self::AllocError>;

    /// Frees the range starting at `addr`.
    fn deallocate(&mut self, addr: usize) -> Result<(), Self::FreeError>;

    /// Checks subject-specific invariants. Called after every operation.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Why an evaluation failed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// A new allocation overlaps the allocation made by operation `other`.
    Overlap { addr: usize, other: u64 },
    /// A new allocation does not fit in the managed space.
    OutOfBounds { addr: usize, size: usize },
    /// The subject refused to free an outstanding allocation.
    FreeRefused { addr: usize, error: String },
    /// The subject accepted a free of an address it did not hand out.
    StaleFreeAccepted { addr: usize },
    /// The subject's own invariant check failed.
    Invariant(String),
}

/// A record of the ranges currently handed out by a subject.
#[derive(Debug, Default)]
pub struct Claims {
    /// Outstanding ranges keyed by start address, as `(end, id)`.
    by_addr: BTreeMap<usize, (usize, u64)>,
    /// Start addresses in allocation order, for index-based selection.
    order: Vec<usize>,
}

impl Claims {
    pub fn new() -> Claims {
        Claims::default()
    }

    /// Returns the number of outstanding claims.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Returns `true` if a claim starts at `addr`.
    pub fn contains(&self, addr: usize) -> bool {
        self.by_addr.contains_key(&addr)
    }

    /// Records the range `[addr, addr + size)` as owned by operation `id`.
    ///
    /// Zero-sized ranges still claim their start address. Returns the id of
    /// the conflicting claim if the range overlaps an existing one.
    pub fn claim(&mut self, addr: usize, size: usize, id: u64) -> Result<(), u64> {
        let end = addr.saturating_add(size.max(1));

        // The closest claim starting at or before `addr` must end before it.
        if let Some((_, &(prev_end, prev_id))) = self.by_addr.range(..=addr).next_back() {
            if prev_end > addr {
                return Err(prev_id);
            }
        }

        // No claim may start inside the new range.
        if let Some((_, &(_, next_id))) = self.by_addr.range(addr..end).next() {
            return Err(next_id);
        }

        self.by_addr.insert(addr, (end, id));
        self.order.push(addr);
        Ok(())
    }

    /// Releases the claim at index `idx % len`, returning its start address.
    pub fn release_modulo(&mut self, idx: usize) -> Option<usize> {
        let len = self.order.len();
        if len == 0 {
            return None;
        }

        let addr = self.order.swap_remove(idx % len);
        self.by_addr.remove(&addr);
        Some(addr)
    }

    /// Returns the start addresses of all outstanding claims.
    pub fn addrs(&self) -> impl Iterator<Item = usize> + '_ {
        self.order.iter().copied()
    }
}

pub struct Evaluator<S: Subject> {
    subject: S,
}

#[derive(Clone, Debug)]
pub struct Failed {
    pub completed: Vec<AllocatorOp>,
    pub failed_op: AllocatorOp,
    pub failure: Failure,
}

impl<S: Subject> Evaluator<S> {
    pub fn new(subject: S) -> Evaluator<S> {
        Evaluator { subject }
    }

    pub fn subject(&self) -> &S {
        &self.subject
    }

    pub fn into_subject(self) -> S {
        self.subject
    }

    /// Applies `ops` in order, then frees every outstanding allocation.
    pub fn evaluate<I>(&mut self, ops: I) -> Result<(), Failed>
    where
        I: IntoIterator<Item = AllocatorOp>,
    {
        let mut completed = Vec::new();
        let mut claims = Claims::new();
        let mut freed: Vec<usize> = Vec::new();

        for (op_id, op) in ops.into_iter().enumerate() {
            let op_id: u64 = op_id.try_into().unwrap();

            if let Err(failure) = self.apply(&op, op_id, &mut claims, &mut freed) {
                return Err(Failed {
                    completed,
                    failed_op: op,
                    failure,
                });
            }

            completed.push(op);
        }

        let outstanding: Vec<usize> = claims.addrs().collect();
        for addr in outstanding {
            if let Err(e) = self.subject.deallocate(addr) {
                return Err(Failed {
                    completed,
                    failed_op: AllocatorOp::Dealloc(0),
                    failure: Failure::FreeRefused {
                        addr,
                        error: format!("{e:?}"),
                    },
                });
            }
        }

        Ok(())
    }

    fn apply(
        &mut self,
        op: &AllocatorOp,
        op_id: u64,
        claims: &mut Claims,
        freed: &mut Vec<usize>,
    ) -> Result<(), Failure> {
        match *op {
            AllocatorOp::Alloc(size) => {
                let addr = match self.subject.allocate(size) {
                    Ok(a) => a,
                    Err(_) => return Ok(()),
                };

                if addr.checked_add(size).map_or(true, |end| end > self.subject.capacity()) {
                    return Err(Failure::OutOfBounds { addr, size });
                }

                claims
                    .claim(addr, size, op_id)
                    .map_err(|other| Failure::Overlap { addr, other })?;
            }

            AllocatorOp::Dealloc(raw_idx) => {
                let addr = match claims.release_modulo(raw_idx) {
                    Some(a) => a,
                    None => return Ok(()),
                };

                self.subject
                    .deallocate(addr)
                    .map_err(|e| Failure::FreeRefused {
                        addr,
                        error: format!("{e:?}"),
                    })?;

                freed.push(addr);
            }

            AllocatorOp::Redealloc(raw_idx) => {
                if freed.is_empty() {
                    return Ok(());
                }

                let addr = freed[raw_idx % freed.len()];

                // The address may legitimately have been handed out again.
                if claims.contains(addr) {
                    return Ok(());
                }

                if self.subject.deallocate(addr).is_ok() {
                    return Err(Failure::StaleFreeAccepted { addr });
                }
            }
        }

        self.subject.check().map_err(Failure::Invariant)
    }
}
