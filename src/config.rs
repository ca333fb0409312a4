//! Compile-time kernel configuration.
//!
//! All limits are fixed at build time; the kernel never allocates.

/// Maximum number of application threads (one bit each in a `u32` slot set).
pub const MAX_THREADS: usize = 32;

/// Registry size: the idle thread plus [`MAX_THREADS`] application threads.
pub const REGISTRY_CAPACITY: usize = MAX_THREADS + 1;

/// Frequency of the periodic tick interrupt in Hz (1 tick = 1 ms).
pub const TICK_HZ: u32 = 1000;

/// Core clock feeding SysTick (16 MHz HSI on STM32F4 parts).
pub const CLOCK_HZ: u32 = 16_000_000;

/// Pattern written below each fabricated frame for high-water-mark inspection.
pub const STACK_PAINT: usize = 0xBABE_CAFE;

/// Number of words in a fabricated frame: eight software-saved registers
/// (r4-r11) followed by the eight-word hardware exception frame.
pub const FRAME_WORDS: usize = 16;

/// Smallest stack region accepted by `create`: one frame plus a word of
/// alignment slack on either end.
pub const MIN_STACK_WORDS: usize = FRAME_WORDS + 2;

/// Convert milliseconds to ticks at [`TICK_HZ`], rounding up so a delay never
/// comes out shorter than requested.
pub const fn ms_to_ticks(ms: u32) -> u32 {
    let ticks = (ms as u64 * TICK_HZ as u64).div_ceil(1000);
    if ticks > u32::MAX as u64 {
        u32::MAX
    } else {
        ticks as u32
    }
}

/// SysTick period in core clock cycles for [`TICK_HZ`] at [`CLOCK_HZ`].
pub const SYSTICK_PERIOD: u32 = CLOCK_HZ / TICK_HZ;
