//! Allocation layout metadata
//!
//! A layout is precomputed by the authoring builder for a whole evaluator
//! tree, then trusted verbatim by the arena. Combining layouts follows the
//! same rule the builder uses when a rig definition embeds sub-rigs: the
//! second block is aligned up before being appended.

use crate::align_up;

/// Size and alignment requirement for one contiguous allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllocationLayout {
    /// Total byte size
    pub size: usize,
    /// Maximum alignment of anything placed in the block
    pub align: usize,
}

impl AllocationLayout {
    /// Layout of an empty block
    pub const EMPTY: Self = Self { size: 0, align: 1 };

    /// Create a new layout
    pub const fn new(size: usize, align: usize) -> Self {
        debug_assert!(align.is_power_of_two());
        Self { size, align }
    }

    /// Layout of a single value of type `T`
    pub const fn of<T>() -> Self {
        Self {
            size: core::mem::size_of::<T>(),
            align: core::mem::align_of::<T>(),
        }
    }

    /// Check if this layout describes an empty block
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Combine with a block appended after this one.
    ///
    /// The appended block's start is aligned up to its own requirement;
    /// the result's alignment is the max of both.
    pub const fn combined(self, other: Self) -> Self {
        Self {
            size: align_up(self.size, other.align) + other.size,
            align: if self.align >= other.align {
                self.align
            } else {
                other.align
            },
        }
    }
}

impl Default for AllocationLayout {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_alignment_padding() {
        let a = AllocationLayout::new(5, 1);
        let b = AllocationLayout::new(8, 8);

        let combined = a.combined(b);
        assert_eq!(combined.size, 16); // 5 padded to 8, plus 8
        assert_eq!(combined.align, 8);
    }

    #[test]
    fn test_combined_keeps_max_alignment() {
        let a = AllocationLayout::new(16, 16);
        let b = AllocationLayout::new(4, 4);

        let combined = a.combined(b);
        assert_eq!(combined.size, 20);
        assert_eq!(combined.align, 16);
    }

    #[test]
    fn test_empty_is_identity() {
        let a = AllocationLayout::new(24, 8);
        assert_eq!(AllocationLayout::EMPTY.combined(a), a);
        assert_eq!(a.combined(AllocationLayout::EMPTY).size, 24);
    }

    #[test]
    fn test_of() {
        let layout = AllocationLayout::of::<u64>();
        assert_eq!(layout.size, 8);
        assert_eq!(layout.align, 8);
    }
}
