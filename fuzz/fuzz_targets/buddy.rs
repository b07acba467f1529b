#![no_main]

use alloc_hater::{AllocatorOp, Evaluator};
use arbitrary::{Arbitrary, Unstructured};
use buddy_sim_hater::BuddySubject;
use libfuzzer_sys::fuzz_target;

/// Largest managed range, expressed in bits.
const MAX_ORDER: u8 = 24;

#[derive(Clone, Debug)]
struct Args {
    size: usize,
    min_alloc: usize,
    ops: Vec<AllocatorOp>,
}

impl Arbitrary<'_> for Args {
    fn arbitrary(un: &mut Unstructured) -> arbitrary::Result<Args> {
        let shift = u8::arbitrary(un)? % (MAX_ORDER + 1);
        let min_shift = u8::arbitrary(un)? % (shift + 1);

        Ok(Args {
            size: 1 << shift,
            min_alloc: 1 << min_shift,
            ops: Vec::arbitrary(un)?,
        })
    }
}

fuzz_target!(|args: Args| {
    let subject = BuddySubject::new(args.size, args.min_alloc)
        .expect("generated configuration is valid");

    let mut eval = Evaluator::new(subject);

    if let Err(failed) = eval.evaluate(args.ops) {
        panic!("{:?} failed: {:?}", failed.failed_op, failed.failure);
    }

    // Everything was freed, so the range must have coalesced back into one
    // block.
    let buddy = eval.into_subject().into_inner();
    assert_eq!(buddy.free_blocks().count(), 1);
});
