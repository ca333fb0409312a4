//! Caller-owned thread stacks and stack-paint inspection.

use crate::config::STACK_PAINT;
use core::ptr::NonNull;

/// Stack memory handed to the kernel at thread creation.
///
/// The region is `'static` and never resized or freed. After creation the
/// kernel only reads it for diagnostics; the owning thread is the only writer.
#[derive(Debug, Clone, Copy)]
pub struct StackRegion {
    base: NonNull<usize>,
    words: usize,
}

// Safety: the region is 'static memory owned by exactly one thread; the kernel
// only hands out volatile reads of it.
unsafe impl Send for StackRegion {}

impl StackRegion {
    /// Take ownership of a stack for the rest of the program.
    pub fn new(stack: &'static mut [usize]) -> Self {
        let words = stack.len();
        // A slice pointer is never null, even for an empty slice.
        let base = NonNull::new(stack.as_mut_ptr()).unwrap_or(NonNull::dangling());
        Self { base, words }
    }

    /// Lowest address of the region.
    pub fn base(&self) -> *const usize {
        self.base.as_ptr()
    }

    /// One past the highest address of the region.
    pub fn end(&self) -> *const usize {
        self.base.as_ptr().wrapping_add(self.words)
    }

    /// Size in words.
    pub fn words(&self) -> usize {
        self.words
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.words * core::mem::size_of::<usize>()
    }

    /// Whether `sp` points into this region (the end address counts as inside,
    /// it is the value of an empty full-descending stack).
    pub fn contains(&self, sp: *const usize) -> bool {
        sp >= self.base() && sp <= self.end()
    }

    /// Number of words at the bottom of the stack that still carry the paint
    /// pattern, i.e. were never touched by the thread.
    ///
    /// A result of 0 means the thread has used its whole stack and has most
    /// likely overflowed.
    pub fn high_water_mark(&self) -> usize {
        (0..self.words)
            // Safety: every index is inside the 'static region; the volatile
            // read tolerates the owning thread writing concurrently.
            .map(|i| unsafe { self.base.as_ptr().add(i).read_volatile() })
            .skip_while(|word| *word != STACK_PAINT)
            .take_while(|word| *word == STACK_PAINT)
            .count()
    }

    /// Words of this stack that have been used at some point.
    pub fn used_words(&self) -> usize {
        self.words - self.high_water_mark()
    }
}
