//! Architecture abstraction layer for context switching and interrupt control.
//!
//! The kernel never touches registers itself. It asks the architecture to
//! fabricate a first context for a new thread and to pend the context-switch
//! trap; the trap then calls back into the kernel through a [`SwitchHandler`]
//! to exchange stack pointers.

use crate::errors::KernelResult;
use crate::thread::ThreadEntry;

pub mod frame;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub mod cortex_m;

#[cfg(not(target_os = "none"))]
pub mod host;

#[cfg(all(target_arch = "arm", target_os = "none"))]
pub use self::cortex_m::CortexMArch as DefaultArch;

#[cfg(not(target_os = "none"))]
pub use self::host::HostArch as DefaultArch;

#[cfg(all(not(target_arch = "arm"), target_os = "none"))]
compile_error!("Bare-metal builds are only supported on ARM Cortex-M (thumbv6m/thumbv7m/thumbv7em).");

/// Callback invoked by the context-switch trap.
///
/// Receives the outgoing thread's stack pointer (after the callee-saved
/// registers have been pushed) and returns the incoming thread's.
pub type SwitchHandler = unsafe extern "C" fn(*mut usize) -> *mut usize;

/// Saved execution context of a switched-out thread: its stack pointer.
///
/// Everything else lives on the thread's own stack, pushed partly by the
/// exception entry and partly by the trap.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedContext {
    sp: *mut usize,
}

// Safety: the pointer is only dereferenced by the trap, with interrupts
// disabled, on the single core.
unsafe impl Send for SavedContext {}

impl SavedContext {
    /// Context that has never been saved.
    pub const fn null() -> Self {
        Self {
            sp: core::ptr::null_mut(),
        }
    }

    pub const fn from_stack_pointer(sp: *mut usize) -> Self {
        Self { sp }
    }

    pub const fn stack_pointer(self) -> *mut usize {
        self.sp
    }

    pub fn is_null(self) -> bool {
        self.sp.is_null()
    }
}

impl Default for SavedContext {
    fn default() -> Self {
        Self::null()
    }
}

/// Architecture abstraction trait.
///
/// # Safety
///
/// Implementations manipulate interrupt masks and exception state directly.
/// [`Arch::install_switch_handler`] has preconditions the caller must uphold.
pub trait Arch: 'static {
    /// Build the first context of a thread at the top of `stack`.
    ///
    /// The default lays out a Cortex-M exception-return frame; see
    /// [`frame::fabricate`].
    fn fabricate(entry: ThreadEntry, stack: &mut [usize]) -> KernelResult<SavedContext> {
        frame::fabricate(
            entry as *const () as usize,
            frame::thread_return_trap as *const () as usize,
            stack,
        )
    }

    /// Pend the context-switch trap. The switch happens once every other
    /// pending interrupt has been serviced and interrupts are enabled.
    fn request_switch();

    /// Give the context-switch trap the lowest priority in the system.
    fn configure_switch_trap();

    /// Register the routine the trap calls to exchange stack pointers.
    ///
    /// # Safety
    ///
    /// `handler` must stay valid for the rest of the program and must be
    /// installed before the first [`Arch::request_switch`].
    unsafe fn install_switch_handler(handler: SwitchHandler);

    /// Enable interrupt delivery on the current core.
    fn enable_interrupts();

    /// Disable interrupt delivery on the current core.
    fn disable_interrupts();

    /// Whether interrupts are currently enabled.
    fn interrupts_enabled() -> bool;

    /// Wait for the next interrupt (low-power idle).
    fn wait_for_interrupt();
}

/// Run `f` with interrupts disabled, restoring the previous mask afterwards.
///
/// Nests safely: an inner section leaves interrupts disabled on exit if the
/// outer one had disabled them.
#[inline]
pub fn without_interrupts<A: Arch, R>(f: impl FnOnce() -> R) -> R {
    let was_enabled = A::interrupts_enabled();
    A::disable_interrupts();
    let result = f();
    if was_enabled {
        A::enable_interrupts();
    }
    result
}

#[cfg(test)]
mod tests {
    use super::host::HostArch;
    use super::*;

    #[test]
    fn test_without_interrupts_restores_state() {
        assert!(HostArch::interrupts_enabled());
        let inside = without_interrupts::<HostArch, _>(HostArch::interrupts_enabled);
        assert!(!inside);
        assert!(HostArch::interrupts_enabled());
    }

    #[test]
    fn test_without_interrupts_nests() {
        without_interrupts::<HostArch, _>(|| {
            without_interrupts::<HostArch, _>(|| {});
            assert!(!HostArch::interrupts_enabled());
        });
        assert!(HostArch::interrupts_enabled());
    }

    #[test]
    fn test_saved_context_null() {
        assert!(SavedContext::default().is_null());
        let mut word = 0usize;
        let ctx = SavedContext::from_stack_pointer(&mut word);
        assert!(!ctx.is_null());
        assert_eq!(ctx.stack_pointer(), &mut word as *mut usize);
    }
}
