//! ARM Cortex-M (ARMv7-M / ARMv7E-M) port.
//!
//! Threads run in privileged thread mode on the main stack. The context switch
//! is done in PendSV, configured at the lowest exception priority so it only
//! runs once every other pending handler (SysTick included) has returned.

use super::{Arch, SwitchHandler};
use crate::errors::KernelResult;
use core::arch::naked_asm;
use cortex_m::peripheral::scb::SystemHandler;
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::SCB;
use portable_atomic::{AtomicUsize, Ordering};

/// Address of the kernel's [`SwitchHandler`], read by `PendSV`.
static SWITCH_HOOK: AtomicUsize = AtomicUsize::new(0);

/// Lowest exception priority; only the implemented upper bits are kept.
const LOWEST_PRIORITY: u8 = 0xFF;

pub struct CortexMArch;

impl Arch for CortexMArch {
    fn request_switch() {
        SCB::set_pendsv();
    }

    fn configure_switch_trap() {
        // Safety: the kernel is the only owner of the PendSV priority and this
        // runs once, before any thread exists.
        unsafe {
            let mut peripherals = cortex_m::Peripherals::steal();
            peripherals.SCB.set_priority(SystemHandler::PendSV, LOWEST_PRIORITY);
        }
    }

    unsafe fn install_switch_handler(handler: SwitchHandler) {
        SWITCH_HOOK.store(handler as usize, Ordering::Release);
    }

    fn enable_interrupts() {
        // Safety: kernel critical sections are strictly nested and never
        // re-enable inside a section opened by someone else.
        unsafe { cortex_m::interrupt::enable() }
    }

    fn disable_interrupts() {
        cortex_m::interrupt::disable();
    }

    fn interrupts_enabled() -> bool {
        cortex_m::register::primask::read().is_inactive()
    }

    fn wait_for_interrupt() {
        cortex_m::asm::wfi();
    }
}

/// Start SysTick so it fires every `period` core clock cycles.
pub fn configure_systick(period: u32) -> KernelResult<()> {
    let reload = crate::time::systick_reload(period)?;
    // Safety: SysTick is owned by the kernel's tick source.
    let mut syst = unsafe { cortex_m::Peripherals::steal() }.SYST;
    syst.set_clock_source(SystClkSource::Core);
    syst.set_reload(reload);
    syst.clear_current();
    syst.enable_interrupt();
    syst.enable_counter();
    Ok(())
}

/// Context-switch trap.
///
/// On entry the hardware has stacked r0-r3, r12, lr, pc and xPSR of the
/// interrupted thread. The trap pushes r4-r11 below them, lets the kernel swap
/// the stack pointer, pops r4-r11 from the incoming stack and exception-returns
/// into it. `lr` holds EXC_RETURN and is parked in r4 across the call; r4 is
/// callee-saved so the hook preserves it.
#[unsafe(no_mangle)]
#[unsafe(naked)]
unsafe extern "C" fn PendSV() {
    naked_asm!(
        "cpsid i",
        "push {{r4-r11}}",
        "mov r4, lr",
        "mov r0, sp",
        "ldr r1, ={hook}",
        "ldr r1, [r1]",
        "blx r1",
        "mov sp, r0",
        "mov lr, r4",
        "pop {{r4-r11}}",
        "cpsie i",
        "bx lr",
        hook = sym SWITCH_HOOK,
    );
}

/// Periodic tick handler driving the global kernel.
#[cfg(feature = "systick")]
#[unsafe(no_mangle)]
extern "C" fn SysTick() {
    crate::timer_interrupt();
}
