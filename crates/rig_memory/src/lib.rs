//! # rig_memory - Evaluator Arena Allocation
//!
//! Memory layout metadata and the bump arena that backs one rig
//! instance's evaluator tree:
//! - AllocationLayout: size/alignment pair with the combine rule for
//!   nested rig descriptors
//! - EvaluatorArena: exactly-sized placement construction with
//!   reverse-order teardown

pub mod arena;
pub mod layout;

pub use arena::EvaluatorArena;
pub use layout::AllocationLayout;

/// Align a value up to the given alignment
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Align a value down to the given alignment
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

pub mod prelude {
    pub use crate::{align_down, align_up, AllocationLayout, EvaluatorArena};
}
