//! Bit arrays supporting constant-time "find the first set bit" for the ready
//! queue's priority levels.
use core::fmt;

use super::Init;

type Word = usize;

/// The number of bits in a bitmap word.
pub const WORD_LEN: usize = Word::BITS as usize;

/// Operations on a bitmap indexed by ready queue level.
///
/// All methods panic when the given bit position is out of range.
pub trait PrioBitmap: Init + Clone + Copy + fmt::Debug + 'static {
    /// The number of bits that can be stored.
    const LEN: usize;

    /// Get the bit at the specified position.
    fn get(&self, i: usize) -> bool;

    /// Clear the bit at the specified position.
    fn clear(&mut self, i: usize);

    /// Set the bit at the specified position.
    fn set(&mut self, i: usize);

    /// Get the position of the first set bit.
    fn find_set(&self) -> Option<usize>;
}

/// Stores up to [`WORD_LEN`] bits in one word.
#[derive(Clone, Copy)]
pub struct OneLevelPrioBitmap {
    bits: Word,
}

impl Init for OneLevelPrioBitmap {
    const INIT: Self = Self { bits: 0 };
}

impl fmt::Debug for OneLevelPrioBitmap {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(one_digits(self.bits)).finish()
    }
}

impl PrioBitmap for OneLevelPrioBitmap {
    const LEN: usize = WORD_LEN;

    fn get(&self, i: usize) -> bool {
        assert!(i < WORD_LEN);
        self.bits & (1 << i) != 0
    }

    fn clear(&mut self, i: usize) {
        assert!(i < WORD_LEN);
        self.bits &= !(1 << i);
    }

    fn set(&mut self, i: usize) {
        assert!(i < WORD_LEN);
        self.bits |= 1 << i;
    }

    fn find_set(&self) -> Option<usize> {
        if self.bits == 0 {
            None
        } else {
            Some(self.bits.trailing_zeros() as usize)
        }
    }
}

/// Stores up to `WORD_LEN * GROUPS` bits. `GROUPS` must not exceed
/// [`WORD_LEN`].
#[derive(Clone, Copy)]
pub struct TwoLevelPrioBitmap<const GROUPS: usize> {
    // Invariant: `first.get(i) == (second[i] != 0)`
    first: OneLevelPrioBitmap,
    second: [Word; GROUPS],
}

impl<const GROUPS: usize> Init for TwoLevelPrioBitmap<GROUPS> {
    const INIT: Self = Self {
        first: OneLevelPrioBitmap::INIT,
        second: [0; GROUPS],
    };
}

impl<const GROUPS: usize> fmt::Debug for TwoLevelPrioBitmap<GROUPS> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list()
            .entries(self.second.iter().enumerate().flat_map(|(group_i, &group)| {
                one_digits(group).map(move |subgroup_i| subgroup_i + group_i * WORD_LEN)
            }))
            .finish()
    }
}

impl<const GROUPS: usize> PrioBitmap for TwoLevelPrioBitmap<GROUPS> {
    const LEN: usize = WORD_LEN * GROUPS;

    fn get(&self, i: usize) -> bool {
        self.second[i / WORD_LEN] & (1 << (i % WORD_LEN)) != 0
    }

    fn clear(&mut self, i: usize) {
        let group = &mut self.second[i / WORD_LEN];
        *group &= !(1 << (i % WORD_LEN));
        if *group == 0 {
            self.first.clear(i / WORD_LEN);
        }
    }

    fn set(&mut self, i: usize) {
        let group = &mut self.second[i / WORD_LEN];
        *group |= 1 << (i % WORD_LEN);
        self.first.set(i / WORD_LEN);
    }

    fn find_set(&self) -> Option<usize> {
        self.first.find_set().map(|group_i| {
            let group = self.second[group_i];
            let subgroup_i = group.trailing_zeros() as usize;
            debug_assert_ne!(subgroup_i, WORD_LEN);
            subgroup_i + group_i * WORD_LEN
        })
    }
}

/// Enumerate the positions of set bits in ascending order.
fn one_digits(mut bits: Word) -> impl Iterator<Item = usize> {
    core::iter::from_fn(move || {
        if bits == 0 {
            None
        } else {
            let i = bits.trailing_zeros() as usize;
            bits &= bits - 1;
            Some(i)
        }
    })
}
