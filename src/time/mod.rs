//! Tick counting and software timers.
//!
//! Time is measured in ticks of the periodic timer interrupt
//! ([`TICK_HZ`](crate::config::TICK_HZ) per second). All counters are 32 bits
//! and wrap.

pub mod tick;
pub mod timer;

pub use tick::TickCounter;
pub use timer::PeriodicTimer;

use crate::errors::{KernelError, KernelResult};

/// Largest value the 24-bit SysTick reload register accepts.
pub const SYSTICK_MAX_RELOAD: u32 = 0x00FF_FFFF;

/// Convert a tick period in core clock cycles to a SysTick reload value.
///
/// The counter counts `reload..=0`, so the register holds `period - 1`.
pub fn systick_reload(period: u32) -> KernelResult<u32> {
    match period.checked_sub(1) {
        Some(reload) if reload > 0 && reload <= SYSTICK_MAX_RELOAD => Ok(reload),
        _ => Err(KernelError::TickReloadOutOfRange(period)),
    }
}
