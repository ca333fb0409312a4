//! Host implementation of the architecture layer.
//!
//! Used for unit tests and simulation on a development machine. No registers
//! are switched: a switch request only sets a pending flag that the caller
//! (a test harness) consumes by invoking the kernel's switch hook itself.
//! State is kept per OS thread so parallel tests do not interfere.

use super::{Arch, SwitchHandler};
use core::cell::Cell;

std::thread_local! {
    static INTERRUPTS_ENABLED: Cell<bool> = const { Cell::new(true) };
    static SWITCH_PENDING: Cell<bool> = const { Cell::new(false) };
    static SWITCH_REQUESTS: Cell<usize> = const { Cell::new(0) };
    static TRAP_CONFIGURED: Cell<bool> = const { Cell::new(false) };
    static SWITCH_HANDLER: Cell<Option<SwitchHandler>> = const { Cell::new(None) };
}

/// Architecture implementation for hosted builds.
pub struct HostArch;

impl HostArch {
    /// Consume the pending switch request, as the trap would.
    pub fn take_switch_request() -> bool {
        SWITCH_PENDING.with(|pending| pending.replace(false))
    }

    /// Whether a switch request is pending.
    pub fn switch_pending() -> bool {
        SWITCH_PENDING.with(Cell::get)
    }

    /// Total number of switch requests made on this thread.
    pub fn switch_requests() -> usize {
        SWITCH_REQUESTS.with(Cell::get)
    }

    /// Whether `configure_switch_trap` has run on this thread.
    pub fn trap_configured() -> bool {
        TRAP_CONFIGURED.with(Cell::get)
    }

    /// The installed switch handler, if any.
    pub fn switch_handler() -> Option<SwitchHandler> {
        SWITCH_HANDLER.with(Cell::get)
    }

    /// Return this thread's simulated core to its power-on state.
    pub fn reset() {
        INTERRUPTS_ENABLED.with(|enabled| enabled.set(true));
        SWITCH_PENDING.with(|pending| pending.set(false));
        SWITCH_REQUESTS.with(|count| count.set(0));
        TRAP_CONFIGURED.with(|configured| configured.set(false));
        SWITCH_HANDLER.with(|slot| slot.set(None));
    }
}

impl Arch for HostArch {
    fn request_switch() {
        // Pending is a level, like the PendSV set-pending bit.
        SWITCH_PENDING.with(|pending| pending.set(true));
        SWITCH_REQUESTS.with(|count| count.set(count.get() + 1));
    }

    fn configure_switch_trap() {
        TRAP_CONFIGURED.with(|configured| configured.set(true));
    }

    unsafe fn install_switch_handler(handler: SwitchHandler) {
        SWITCH_HANDLER.with(|slot| slot.set(Some(handler)));
    }

    fn enable_interrupts() {
        INTERRUPTS_ENABLED.with(|enabled| enabled.set(true));
    }

    fn disable_interrupts() {
        INTERRUPTS_ENABLED.with(|enabled| enabled.set(false));
    }

    fn interrupts_enabled() -> bool {
        INTERRUPTS_ENABLED.with(Cell::get)
    }

    fn wait_for_interrupt() {
        std::thread::yield_now();
    }
}
