//! Evaluator arena - placement construction with bulk teardown
//!
//! One arena backs one rig instance's evaluator tree. Its capacity comes
//! from the rig definition's allocation descriptor, which the authoring
//! builder precomputed by walking the node graph; a correct descriptor
//! means the arena never runs out mid-build and never reallocates.

use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};

use crate::{align_up, AllocationLayout};

/// Records how to drop one placement-constructed value.
struct Dropper {
    ptr: *mut u8,
    drop_fn: unsafe fn(*mut u8),
}

unsafe fn drop_in_place_erased<T>(ptr: *mut u8) {
    core::ptr::drop_in_place(ptr as *mut T);
}

/// Bump arena sized exactly from an [`AllocationLayout`].
///
/// Values are placement-constructed at the next aligned offset and torn
/// down in reverse construction order. Individual deallocation is not
/// supported; the whole block is released in one deallocation.
pub struct EvaluatorArena {
    /// Backing block; null when the layout is empty
    base: *mut u8,
    /// The layout this arena was sized from
    layout: AllocationLayout,
    /// Current allocation offset
    offset: usize,
    /// Constructed values, in construction order
    droppers: Vec<Dropper>,
}

impl EvaluatorArena {
    /// Allocate an arena for the given layout.
    ///
    /// An empty layout yields a valid arena that serves no allocations.
    pub fn new(layout: AllocationLayout) -> Self {
        debug_assert!(layout.align.is_power_of_two());

        let base = if layout.size == 0 {
            core::ptr::null_mut()
        } else {
            // Safety: size is non-zero and align is a power of two.
            unsafe {
                let block = Layout::from_size_align_unchecked(layout.size, layout.align);
                let ptr = alloc(block);
                if ptr.is_null() {
                    handle_alloc_error(block);
                }
                ptr
            }
        };

        Self {
            base,
            layout,
            offset: 0,
            droppers: Vec::new(),
        }
    }

    /// Arena with no capacity
    pub fn empty() -> Self {
        Self::new(AllocationLayout::EMPTY)
    }

    /// Placement-construct a value at the next aligned offset.
    ///
    /// Returns `None` when the value does not fit or needs stricter
    /// alignment than the arena provides, which means the precomputed
    /// layout disagrees with what is being built into it.
    pub fn alloc_value<T>(&mut self, value: T) -> Option<NonNull<T>> {
        let size = core::mem::size_of::<T>();
        let align = core::mem::align_of::<T>();

        if size == 0 {
            return NonNull::new(align as *mut T);
        }
        // The base pointer only guarantees the arena's own alignment.
        if align > self.layout.align {
            return None;
        }

        let aligned = align_up(self.offset, align);
        let end = aligned + size;
        if end > self.layout.size {
            return None;
        }
        self.offset = end;

        // Safety: the range [aligned, end) is in bounds and the base
        // pointer satisfies the arena's max alignment.
        unsafe {
            let ptr = self.base.add(aligned) as *mut T;
            ptr.write(value);

            if core::mem::needs_drop::<T>() {
                self.droppers.push(Dropper {
                    ptr: ptr as *mut u8,
                    drop_fn: drop_in_place_erased::<T>,
                });
            }

            Some(NonNull::new_unchecked(ptr))
        }
    }

    /// Drop every constructed value in reverse construction order and
    /// rewind the allocation offset. The backing block is kept.
    pub fn reset(&mut self) {
        for dropper in self.droppers.drain(..).rev() {
            // Safety: each recorded pointer was placement-constructed by
            // alloc_value and has not been dropped since.
            unsafe { (dropper.drop_fn)(dropper.ptr) };
        }
        self.offset = 0;
    }

    /// Get the layout this arena was sized from
    pub fn layout(&self) -> AllocationLayout {
        self.layout
    }

    /// Get the total capacity in bytes
    pub fn capacity(&self) -> usize {
        self.layout.size
    }

    /// Get the currently used bytes
    pub fn used(&self) -> usize {
        self.offset
    }

    /// Check whether nothing has been constructed
    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }
}

impl Drop for EvaluatorArena {
    fn drop(&mut self) {
        self.reset();
        if !self.base.is_null() {
            // Safety: base was allocated with this exact layout.
            unsafe {
                let block =
                    Layout::from_size_align_unchecked(self.layout.size, self.layout.align);
                dealloc(self.base, block);
            }
        }
    }
}

impl Default for EvaluatorArena {
    fn default() -> Self {
        Self::empty()
    }
}
