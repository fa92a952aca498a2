//! Episode slot allocation.
use rand::{rngs::StdRng, RngCore, SeedableRng};

/// Source of uniformly distributed slot indices.
///
/// Overwrite decisions go through this seam so the allocation logic stays
/// deterministic under test.
pub trait SlotRng: Send {
    /// Returns an index uniformly drawn from `[0, upper)`.
    fn below(&mut self, upper: usize) -> usize;
}

/// A [`SlotRng`] backed by a seeded [`StdRng`].
pub struct SeededSlotRng(StdRng);

impl SeededSlotRng {
    /// Creates a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl SlotRng for SeededSlotRng {
    fn below(&mut self, upper: usize) -> usize {
        (self.0.next_u32() as usize) % upper
    }
}

/// Picks storage slots for `inc` incoming episodes.
///
/// Unused slots are filled consecutively first; once the buffer runs out of
/// fresh space, the remainder is drawn uniformly with replacement from slots
/// already holding data. A slot drawn twice within one call is written
/// twice, last write wins. Callers update `current_size` to
/// `min(capacity, current_size + inc)` afterwards.
pub(crate) fn allocate(
    current_size: usize,
    capacity: usize,
    inc: usize,
    rng: &mut dyn SlotRng,
) -> Vec<usize> {
    debug_assert!(inc >= 1 && inc <= capacity);

    if current_size + inc <= capacity {
        (current_size..current_size + inc).collect()
    } else if current_size < capacity {
        let overflow = inc - (capacity - current_size);
        let mut idx: Vec<usize> = (current_size..capacity).collect();
        idx.extend((0..overflow).map(|_| rng.below(current_size)));
        idx
    } else {
        (0..inc).map(|_| rng.below(capacity)).collect()
    }
}
