#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![forbid(unreachable_pub)]

//! Tick-driven preemptive threads for single-core ARM Cortex-M.
//!
//! A fixed set of threads, registered at startup, share the core under a
//! round-robin (default) or strict-priority policy. Threads never exit and
//! the only way to block is [`delay`]. A periodic timer interrupt drives
//! timeouts and preemption; the switch itself happens in the lowest-priority
//! PendSV exception.
//!
//! # Target Platform
//!
//! - **Architecture**: ARMv7-M / ARMv7E-M (`thumbv7m-none-eabi`,
//!   `thumbv7em-none-eabi`, `thumbv7em-none-eabihf` without FPU use in threads)
//! - **Environment**: Bare-metal, threads in privileged thread mode on the
//!   main stack
//! - **Host builds**: a simulated architecture for tests
//!
//! # Features
//!
//! - `systick` (default): export the `SysTick` handler driving the global kernel
//! - `strict-priority`: make [`DefaultPolicy`] the strict-priority policy
//!
//! # Quick Start
//!
//! ```ignore
//! use cortex_threads::{DefaultArch, DefaultPolicy, Kernel, KernelHooks};
//!
//! static KERNEL: Kernel<DefaultArch, DefaultPolicy> = Kernel::new(DefaultPolicy::new());
//! static mut IDLE_STACK: [usize; 64] = [0; 64];
//! static mut BLINK_STACK: [usize; 256] = [0; 256];
//!
//! fn blink() {
//!     loop {
//!         toggle_led();
//!         cortex_threads::delay(cortex_threads::config::ms_to_ticks(500));
//!     }
//! }
//!
//! fn start_tick() {
//!     cortex_threads::arch::cortex_m::configure_systick(cortex_threads::config::SYSTICK_PERIOD)
//!         .unwrap();
//! }
//!
//! #[cortex_m_rt::entry]
//! fn main() -> ! {
//!     let hooks = KernelHooks::new(start_tick, KernelHooks::noop);
//!     KERNEL.init(unsafe { &mut *core::ptr::addr_of_mut!(IDLE_STACK) }, hooks).unwrap();
//!     KERNEL.create(blink, unsafe { &mut *core::ptr::addr_of_mut!(BLINK_STACK) }).unwrap();
//!     KERNEL.run()
//! }
//! ```

// Core modules
pub mod arch;
pub mod config;
pub mod debug;
pub mod errors;
pub mod kernel;
pub mod sched;
pub mod sync;
pub mod thread;
pub mod time;

#[cfg(not(target_os = "none"))]
extern crate std;

#[cfg(test)]
mod tests;

// Panic handler for bare-metal
#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &core::panic::PanicInfo<'_>) -> ! {
    use crate::arch::Arch;

    DefaultArch::disable_interrupts();
    crate::debug_println!("{}", info);
    loop {
        DefaultArch::wait_for_interrupt();
    }
}

// ============================================================================
// Public API
// ============================================================================

// Architecture abstraction
pub use arch::{Arch, DefaultArch, SavedContext};

// Kernel
pub use kernel::{global_kernel, Kernel, KernelHooks, Snapshot};

// Scheduler
pub use sched::{DefaultPolicy, RoundRobin, SelectionPolicy, StrictPriority};

// Threads
pub use thread::{Slot, SlotSet, ThreadEntry, ThreadState};

// Synchronization
pub use sync::DelayLock;

// Errors
pub use errors::{ErrorKind, KernelError, KernelResult};

// ============================================================================
// Convenience Functions
// ============================================================================

/// Suspend the calling thread for `ticks` timer ticks on the running kernel.
///
/// `delay(0)` yields. Fatal when no kernel is running or when called from the
/// idle thread.
pub fn delay(ticks: u32) {
    match kernel::registered() {
        Some(kernel) => kernel.delay(ticks),
        None => errors::fatal(KernelError::NotRunning),
    }
}

/// Timer interrupt body for the running kernel: count the tick, wake expired
/// threads, reschedule. Does nothing before [`Kernel::run`].
pub fn timer_interrupt() {
    if let Some(kernel) = kernel::registered() {
        kernel.on_timer_interrupt();
    }
}

/// Ticks since the running kernel started, or 0 before [`Kernel::run`].
pub fn now() -> u32 {
    kernel::registered().map_or(0, |kernel| kernel.now())
}
