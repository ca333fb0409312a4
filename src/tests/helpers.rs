//! Test helper utilities shared by kernel tests.

use crate::arch::host::HostArch;
use crate::arch::{without_interrupts, Arch};
use crate::kernel::{Kernel, KernelHooks};
use crate::sched::SelectionPolicy;
use crate::thread::Slot;
use std::boxed::Box;
use std::vec;

/// Kernel on the simulated architecture.
pub(crate) type TestKernel<P> = Kernel<HostArch, P>;

/// Stack words given to every test thread.
pub(crate) const TEST_STACK_WORDS: usize = 64;

/// Leak a zeroed stack region.
pub(crate) fn leak_stack(words: usize) -> &'static mut [usize] {
    Box::leak(vec![0usize; words].into_boxed_slice())
}

/// Thread entry for threads that are never actually executed.
pub(crate) fn noop_thread() {}

/// Initialized kernel with `threads` threads in slots `1..=threads`, not yet
/// started.
pub(crate) fn configured<P: SelectionPolicy>(policy: P, threads: u8) -> TestKernel<P> {
    HostArch::reset();
    let kernel = TestKernel::new(policy);
    kernel
        .init(leak_stack(TEST_STACK_WORDS), KernelHooks::default())
        .unwrap();
    for _ in 0..threads {
        kernel.create(noop_thread, leak_stack(TEST_STACK_WORDS)).unwrap();
    }
    kernel
}

/// Like [`configured`], then started; the first switch is pending.
pub(crate) fn started<P: SelectionPolicy>(policy: P, threads: u8) -> TestKernel<P> {
    let kernel = configured(policy, threads);
    kernel.start().unwrap();
    kernel
}

/// Run the scheduler from a critical section, as interrupt handlers do.
pub(crate) fn schedule<P: SelectionPolicy>(kernel: &TestKernel<P>) -> bool {
    without_interrupts::<HostArch, _>(|| kernel.schedule())
}

/// Take the context-switch trap if it is pending.
///
/// The running thread is treated as parked on its last saved frame, which is
/// what it hands back to the kernel.
pub(crate) fn run_trap<P: SelectionPolicy>(kernel: &TestKernel<P>) -> bool {
    if !HostArch::take_switch_request() {
        return false;
    }
    let sp = kernel
        .current_slot()
        .and_then(|slot| kernel.saved_context(slot))
        .map_or(core::ptr::null_mut(), |context| context.stack_pointer());

    HostArch::disable_interrupts();
    // Safety: the kernel only stores `sp`; host tests never load the result.
    unsafe { kernel.switch_stacks(sp) };
    HostArch::enable_interrupts();
    true
}

/// Timer interrupt followed by the trap it may have pended.
pub(crate) fn timer_interrupt<P: SelectionPolicy>(kernel: &TestKernel<P>) {
    kernel.on_timer_interrupt();
    run_trap(kernel);
}

/// `delay` from the running thread followed by the trap it pended.
pub(crate) fn delay<P: SelectionPolicy>(kernel: &TestKernel<P>, ticks: u32) {
    kernel.delay(ticks);
    run_trap(kernel);
}

/// Running slot; panics before the first switch.
pub(crate) fn running<P: SelectionPolicy>(kernel: &TestKernel<P>) -> u8 {
    kernel.current_slot().map(Slot::get).unwrap()
}

/// Slot `n`.
pub(crate) fn slot(n: u8) -> Slot {
    Slot::new(n).unwrap()
}

/// Check the set/cursor invariants that must hold whenever no trap is
/// pending.
pub(crate) fn assert_consistent<P: SelectionPolicy>(kernel: &TestKernel<P>) {
    let snapshot = kernel.snapshot();
    assert_eq!(
        snapshot.ready.bits() & snapshot.delayed.bits(),
        0,
        "ready and delayed overlap: {:?}",
        snapshot
    );
    if let Some(current) = snapshot.current {
        assert!(!snapshot.ready.contains(current), "running thread is ready: {:?}", snapshot);
    }
    for delayed in snapshot.delayed {
        assert!(kernel.timeout(delayed).unwrap() > 0, "delayed with no timeout: {:?}", snapshot);
    }
    let mut all = snapshot.ready.bits() | snapshot.delayed.bits();
    if let Some(current) = snapshot.current.filter(|slot| !slot.is_idle()) {
        all |= 1 << (current.get() - 1);
    }
    let registered = kernel.thread_count() - 1;
    assert_eq!(all.count_ones() as usize, registered, "thread lost: {:?}", snapshot);
}
