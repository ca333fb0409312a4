//! Initial stack frames for threads that have never run.
//!
//! A new thread is started by the same exception return that resumes a
//! preempted one, so its stack must look as if it had been switched out right
//! before its first instruction. From the saved stack pointer upwards:
//!
//! ```text
//!  sp + 0 .. 7   r4 - r11   popped by the trap
//!  sp + 8 .. 11  r0 - r3    \
//!  sp + 12       r12         |
//!  sp + 13       lr          |  popped by exception return
//!  sp + 14       pc          |
//!  sp + 15       xPSR       /
//! ```
//!
//! Every word below the frame is painted with [`STACK_PAINT`].

use super::SavedContext;
use crate::config::{FRAME_WORDS, MIN_STACK_WORDS, STACK_PAINT};
use crate::errors::{fatal, KernelError, KernelResult};

/// Word offsets of each register within a fabricated frame.
pub mod offset {
    pub const R4: usize = 0;
    pub const R11: usize = 7;
    pub const R0: usize = 8;
    pub const R3: usize = 11;
    pub const R12: usize = 12;
    pub const LR: usize = 13;
    pub const PC: usize = 14;
    pub const XPSR: usize = 15;
}

/// xPSR with only the Thumb state bit set. Exception return faults on
/// Cortex-M if this bit is clear.
pub const XPSR_THUMB: usize = 1 << 24;

/// Placeholder loaded into r12.
pub const R12_PLACEHOLDER: usize = 0xC;

/// Required alignment of the top of a fabricated frame, in bytes.
pub const FRAME_ALIGN: usize = 8;

/// Placeholder for general-purpose register `rN` (its own number).
pub const fn register_placeholder(n: usize) -> usize {
    n
}

/// Lay out the first frame of a thread at the top of `stack`.
///
/// `entry` becomes the resume address (Thumb bit cleared, as exception return
/// requires) and `exit` the link register, so a thread function that returns
/// lands in `exit`. Returns the saved context pointing at the frame.
pub fn fabricate(entry: usize, exit: usize, stack: &mut [usize]) -> KernelResult<SavedContext> {
    if stack.len() < MIN_STACK_WORDS {
        return Err(KernelError::StackTooSmall {
            words: stack.len(),
            required: MIN_STACK_WORDS,
        });
    }

    let word = core::mem::size_of::<usize>();
    let base = stack.as_ptr() as usize;
    let aligned_top = (base + stack.len() * word) & !(FRAME_ALIGN - 1);
    let top = (aligned_top - base) / word;
    let sp = top - FRAME_WORDS;

    let frame = &mut stack[sp..top];
    for (n, reg) in frame[offset::R4..=offset::R11].iter_mut().enumerate() {
        *reg = register_placeholder(n + 4);
    }
    for (n, reg) in frame[offset::R0..=offset::R3].iter_mut().enumerate() {
        *reg = register_placeholder(n);
    }
    frame[offset::R12] = R12_PLACEHOLDER;
    frame[offset::LR] = exit;
    frame[offset::PC] = entry & !1;
    frame[offset::XPSR] = XPSR_THUMB;

    let bottom = (base.next_multiple_of(FRAME_ALIGN) - base) / word;
    for paint in stack[bottom.min(sp)..sp].iter_mut() {
        *paint = STACK_PAINT;
    }

    Ok(SavedContext::from_stack_pointer(stack[sp..].as_mut_ptr()))
}

/// Return address planted under every thread entry point.
///
/// Thread functions run forever; getting here means one returned.
pub fn thread_return_trap() -> ! {
    fatal(KernelError::ThreadReturned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::boxed::Box;
    use std::vec;

    fn leak(words: usize) -> &'static mut [usize] {
        Box::leak(vec![0usize; words].into_boxed_slice())
    }

    fn frame_of(ctx: SavedContext) -> &'static [usize] {
        // Safety: the context points at a fabricated frame inside a leaked stack.
        unsafe { core::slice::from_raw_parts(ctx.stack_pointer(), FRAME_WORDS) }
    }

    #[test]
    fn test_frame_layout() {
        let stack = leak(64);
        let ctx = fabricate(0x0800_1235, 0x0800_2001, stack).unwrap();
        let frame = frame_of(ctx);

        assert_eq!(frame[offset::PC], 0x0800_1234);
        assert_eq!(frame[offset::LR], 0x0800_2001);
        assert_eq!(frame[offset::XPSR], XPSR_THUMB);
        assert_eq!(frame[offset::R12], 0xC);
        assert_eq!(&frame[offset::R0..=offset::R3], &[0, 1, 2, 3]);
        assert_eq!(&frame[offset::R4..=offset::R11], &[4, 5, 6, 7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_frame_top_aligned() {
        let stack = leak(65);
        let end = stack.as_ptr_range().end as usize;
        let ctx = fabricate(0x100, 0x200, stack).unwrap();
        let frame_end = ctx.stack_pointer() as usize + FRAME_WORDS * core::mem::size_of::<usize>();
        assert_eq!(frame_end % FRAME_ALIGN, 0);
        assert!(frame_end <= end);
        assert!(end - frame_end < FRAME_ALIGN);
    }

    #[test]
    fn test_paint_below_frame() {
        let stack = leak(48);
        let base = stack.as_ptr();
        let ctx = fabricate(0x100, 0x200, stack).unwrap();
        // Safety: base and the frame pointer belong to the same leaked slice.
        let painted = unsafe { (ctx.stack_pointer() as *const usize).offset_from(base) } as usize;
        let below = unsafe { core::slice::from_raw_parts(base, painted) };
        assert!(below.iter().all(|word| *word == STACK_PAINT));
        assert_eq!(painted, 48 - FRAME_WORDS);
    }

    #[test]
    fn test_rejects_small_stack() {
        let stack = leak(MIN_STACK_WORDS - 1);
        assert_eq!(
            fabricate(0x100, 0x200, stack),
            Err(KernelError::StackTooSmall {
                words: MIN_STACK_WORDS - 1,
                required: MIN_STACK_WORDS,
            })
        );
    }

    #[test]
    #[should_panic(expected = "Thread entry function returned")]
    fn test_return_trap_is_fatal() {
        thread_return_trap();
    }
}
