#![no_main]

use arbitrary::Arbitrary;
use buddy_sim::{AllocError, BuddyAllocator, MutexBuddyAllocator};
use libfuzzer_sys::fuzz_target;

const SIZE: usize = 1 << 16;
const MIN_ALLOC: usize = 16;

#[derive(Clone, Debug, Arbitrary)]
enum BuddyOp {
    Allocate(u32),
    Deallocate(usize),
    Render,
}

fuzz_target!(|ops: Vec<BuddyOp>| {
    let buddy = MutexBuddyAllocator::new(
        BuddyAllocator::try_new_with_min_alloc(SIZE, MIN_ALLOC).unwrap(),
    );

    let mut outstanding = Vec::new();

    for op in ops {
        match op {
            BuddyOp::Allocate(size) => match buddy.alloc(size as usize) {
                Ok(addr) => outstanding.push(addr),
                Err(AllocError::InvalidRequest) => assert_eq!(size, 0),
                Err(AllocError::OutOfMemory { requested }) => {
                    assert_eq!(requested, size as usize)
                }
            },

            BuddyOp::Deallocate(raw_idx) => {
                if outstanding.is_empty() {
                    continue;
                }

                let idx = raw_idx % outstanding.len();
                let addr = outstanding.swap_remove(idx);
                buddy.free(addr).unwrap();
            }

            BuddyOp::Render => {
                let total: usize = buddy.render().iter().map(|e| e.size()).sum();
                assert_eq!(total, SIZE);
            }
        }
    }

    for addr in outstanding {
        buddy.free(addr).unwrap();
    }

    assert_eq!(buddy.stats().free_bytes, SIZE);
});
