//! The thread kernel.
//!
//! [`Kernel`] owns the thread registry, the ready and delayed sets and the
//! scheduling cursor. Every mutation happens with interrupts disabled; the
//! state mutex is only ever taken inside such a critical section, so on a
//! single core it is never contended.
//!
//! Three contexts call in:
//! - threads, through [`Kernel::delay`];
//! - the periodic timer interrupt, through [`Kernel::on_timer_interrupt`];
//! - the context-switch trap, through the handler installed by [`Kernel::run`],
//!   which calls [`Kernel::switch_stacks`].

use crate::arch::{without_interrupts, Arch, SavedContext};
use crate::config::TICK_HZ;
use crate::errors::{fatal, KernelError, KernelResult};
use crate::sched::SelectionPolicy;
use crate::thread::{
    Registry, Slot, SlotSet, StackRegion, ThreadControlBlock, ThreadEntry, ThreadState,
};
use crate::time::TickCounter;
use core::any::TypeId;
use core::marker::PhantomData;

/// Process-wide kernel used by interrupt handlers and the crate-level free
/// functions. Set once by [`Kernel::run`].
static GLOBAL_KERNEL: spin::Once<GlobalKernel> = spin::Once::new();

/// The registered kernel with its type erased. The entry points are the
/// monomorphized [`Kernel`] methods, so interrupt handlers and the free
/// functions work whatever the kernel's arch and policy.
pub(crate) struct GlobalKernel {
    type_id: TypeId,
    kernel: *const (),
    on_timer_interrupt: unsafe fn(*const ()),
    delay: unsafe fn(*const (), u32),
    now: unsafe fn(*const ()) -> u32,
}

// Safety: the pointer refers to a `'static` kernel, which is itself Sync.
unsafe impl Send for GlobalKernel {}
unsafe impl Sync for GlobalKernel {}

impl GlobalKernel {
    fn of<A: Arch, P: SelectionPolicy>(kernel: &'static Kernel<A, P>) -> Self {
        Self {
            type_id: TypeId::of::<Kernel<A, P>>(),
            kernel: kernel as *const Kernel<A, P> as *const (),
            on_timer_interrupt: erased_timer_interrupt::<A, P>,
            delay: erased_delay::<A, P>,
            now: erased_now::<A, P>,
        }
    }

    pub(crate) fn on_timer_interrupt(&self) {
        // Safety: `kernel` was erased from the kernel type these fns expect.
        unsafe { (self.on_timer_interrupt)(self.kernel) }
    }

    pub(crate) fn delay(&self, ticks: u32) {
        // Safety: as above.
        unsafe { (self.delay)(self.kernel, ticks) }
    }

    pub(crate) fn now(&self) -> u32 {
        // Safety: as above.
        unsafe { (self.now)(self.kernel) }
    }
}

/// # Safety
///
/// `kernel` must point to a live `Kernel<A, P>`.
unsafe fn erased_timer_interrupt<A: Arch, P: SelectionPolicy>(kernel: *const ()) {
    unsafe { &*(kernel as *const Kernel<A, P>) }.on_timer_interrupt();
}

/// # Safety
///
/// `kernel` must point to a live `Kernel<A, P>`.
unsafe fn erased_delay<A: Arch, P: SelectionPolicy>(kernel: *const (), ticks: u32) {
    unsafe { &*(kernel as *const Kernel<A, P>) }.delay(ticks);
}

/// # Safety
///
/// `kernel` must point to a live `Kernel<A, P>`.
unsafe fn erased_now<A: Arch, P: SelectionPolicy>(kernel: *const ()) -> u32 {
    unsafe { &*(kernel as *const Kernel<A, P>) }.now()
}

/// The registered kernel, whatever its type.
pub(crate) fn registered() -> Option<&'static GlobalKernel> {
    GLOBAL_KERNEL.get()
}

/// Application callbacks run by the kernel.
#[derive(Debug, Clone, Copy)]
pub struct KernelHooks {
    /// Called once from [`Kernel::run`] before the first switch, with
    /// interrupts enabled. Typically starts the periodic tick timer.
    pub on_startup: fn(),
    /// Called in a loop by the idle thread.
    pub on_idle: fn(),
}

impl KernelHooks {
    pub const fn new(on_startup: fn(), on_idle: fn()) -> Self {
        Self { on_startup, on_idle }
    }

    /// Hook that does nothing.
    pub fn noop() {}
}

impl Default for KernelHooks {
    fn default() -> Self {
        Self::new(Self::noop, Self::noop)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Uninit,
    Configured,
    Running,
}

/// Point-in-time copy of the scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub ready: SlotSet,
    pub delayed: SlotSet,
    /// Slot executing; `None` while the boot stack is still live
    pub current: Option<Slot>,
    /// Slot the pending switch will resume
    pub next: Option<Slot>,
    pub switch_pending: bool,
    pub ticks: u32,
}

struct KernelState {
    registry: Registry,
    ready: SlotSet,
    delayed: SlotSet,
    current: Option<Slot>,
    next: Option<Slot>,
    switch_pending: bool,
    phase: Phase,
    hooks: KernelHooks,
}

impl KernelState {
    const fn new() -> Self {
        Self {
            registry: Registry::new(),
            ready: SlotSet::EMPTY,
            delayed: SlotSet::EMPTY,
            current: None,
            next: None,
            switch_pending: false,
            phase: Phase::Uninit,
            hooks: KernelHooks::new(KernelHooks::noop, KernelHooks::noop),
        }
    }

    fn check_registrable(&self) -> KernelResult<()> {
        match self.phase {
            Phase::Uninit => Err(KernelError::NotInitialized),
            Phase::Configured => Ok(()),
            Phase::Running => Err(KernelError::AlreadyRunning),
        }
    }

    /// Running slot, if it may keep running.
    fn runnable_current(&self) -> Option<Slot> {
        self.current
            .filter(|slot| !slot.is_idle() && !self.delayed.contains(*slot))
    }

    fn candidates(&self) -> SlotSet {
        match self.runnable_current() {
            Some(slot) => self.ready.with(slot),
            None => self.ready,
        }
    }

    /// Point the cursor at `selected`. Returns whether a new switch request is
    /// needed.
    fn retarget(&mut self, selected: Slot) -> bool {
        if self.current == Some(selected) {
            if self.switch_pending {
                self.next = Some(selected);
            }
            return false;
        }
        self.next = Some(selected);
        if self.switch_pending {
            return false;
        }
        self.switch_pending = true;
        true
    }

    fn suspend(&mut self, slot: Slot, ticks: u32) {
        if let Some(tcb) = self.registry.get_mut(slot) {
            tcb.timeout = ticks;
        }
        self.ready.remove(slot);
        self.delayed.insert(slot);
    }
}

/// Thread kernel for one core.
///
/// # Type Parameters
///
/// * `A` - Architecture implementation
/// * `P` - Selection policy
pub struct Kernel<A: Arch, P: SelectionPolicy> {
    state: spin::Mutex<KernelState>,
    policy: P,
    ticks: TickCounter,
    _arch: PhantomData<A>,
}

impl<A: Arch, P: SelectionPolicy> Kernel<A, P> {
    /// Create an empty, uninitialized kernel. Usable in a `static`.
    pub const fn new(policy: P) -> Self {
        Self {
            state: spin::Mutex::new(KernelState::new()),
            policy,
            ticks: TickCounter::new(TICK_HZ),
            _arch: PhantomData,
        }
    }

    /// One-time setup: give the switch trap the lowest priority and register
    /// the idle thread in slot 0 on `idle_stack`.
    pub fn init(&self, idle_stack: &'static mut [usize], hooks: KernelHooks) -> KernelResult<()> {
        without_interrupts::<A, _>(|| {
            let mut state = self.state.lock();
            if state.phase != Phase::Uninit {
                return Err(KernelError::AlreadyInitialized);
            }

            let entry: ThreadEntry = idle_entry::<A, P>;
            let context = A::fabricate(entry, idle_stack)?;
            let tcb = ThreadControlBlock::new(Slot::IDLE, entry, StackRegion::new(idle_stack), context);
            state.registry.register(tcb)?;
            state.hooks = hooks;
            state.phase = Phase::Configured;

            A::configure_switch_trap();
            log::debug!("kernel initialized ({} policy)", self.policy.name());
            Ok(())
        })
    }

    /// Register a thread in the lowest free slot. It is ready immediately.
    ///
    /// Only valid between [`init`](Self::init) and [`run`](Self::run).
    pub fn create(&self, entry: ThreadEntry, stack: &'static mut [usize]) -> KernelResult<Slot> {
        without_interrupts::<A, _>(|| {
            let mut state = self.state.lock();
            state.check_registrable()?;
            let slot = state.registry.next_free()?;
            Self::register_thread(&mut state, slot, entry, stack)
        })
    }

    /// Register a thread in slot `priority`. Under the strict-priority policy a
    /// higher slot always wins.
    pub fn create_with_priority(
        &self,
        entry: ThreadEntry,
        stack: &'static mut [usize],
        priority: u8,
    ) -> KernelResult<Slot> {
        let slot = Slot::new(priority).ok_or(KernelError::InvalidSlot(priority))?;
        without_interrupts::<A, _>(|| {
            let mut state = self.state.lock();
            state.check_registrable()?;
            state.registry.check_vacant(slot)?;
            Self::register_thread(&mut state, slot, entry, stack)
        })
    }

    fn register_thread(
        state: &mut KernelState,
        slot: Slot,
        entry: ThreadEntry,
        stack: &'static mut [usize],
    ) -> KernelResult<Slot> {
        let words = stack.len();
        let context = A::fabricate(entry, stack)?;
        let slot = state
            .registry
            .register(ThreadControlBlock::new(slot, entry, StackRegion::new(stack), context))?;
        state.ready.insert(slot);
        log::debug!("created thread {} ({} words of stack)", slot, words);
        Ok(slot)
    }

    /// Pick the thread that should run and pend the switch trap if it is not
    /// the running one.
    ///
    /// Must be called with interrupts disabled. Idempotent: while a switch is
    /// pending further calls only retarget it. Returns whether a switch was
    /// requested by this call.
    ///
    /// Fatal if the policy picks nothing, or a slot outside the candidates,
    /// while threads are ready.
    pub fn schedule(&self) -> bool {
        debug_assert!(
            !A::interrupts_enabled(),
            "schedule() called with interrupts enabled"
        );
        let requested = {
            let mut state = self.state.lock();
            if state.phase != Phase::Running {
                return false;
            }
            let candidates = state.candidates();
            let current = state.current.unwrap_or(Slot::IDLE);
            let selected = if candidates.is_empty() {
                Some(Slot::IDLE)
            } else {
                // Anything outside the candidates is unregistered or asleep.
                self.policy
                    .select(candidates, current)
                    .filter(|slot| candidates.contains(*slot))
            };
            selected.map(|slot| state.retarget(slot))
        };
        let Some(requested) = requested else {
            fatal(KernelError::NoRunnableThread);
        };
        if requested {
            A::request_switch();
        }
        requested
    }

    /// Advance every delayed thread by one tick, readying those whose timeout
    /// runs out. Does not reschedule.
    pub fn tick(&self) {
        without_interrupts::<A, _>(|| {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            for slot in state.delayed {
                let Some(tcb) = state.registry.get_mut(slot) else {
                    continue;
                };
                tcb.timeout = tcb.timeout.saturating_sub(1);
                if tcb.timeout == 0 {
                    state.delayed.remove(slot);
                    // A thread woken before the trap switched it out is
                    // still the running one and stays out of the ready set.
                    if state.current != Some(slot) {
                        state.ready.insert(slot);
                    }
                    log::trace!("woke thread {}", slot);
                }
            }
        })
    }

    /// Body of the periodic timer interrupt: count the tick, wake expired
    /// threads, reschedule.
    pub fn on_timer_interrupt(&self) {
        self.ticks.increment();
        self.tick();
        without_interrupts::<A, _>(|| {
            self.schedule();
        });
    }

    /// Suspend the calling thread for `ticks` timer ticks.
    ///
    /// The thread becomes ready again on the `ticks`-th tick after the call.
    /// `delay(0)` yields: the caller stays runnable and is switched out only
    /// if the policy prefers another ready thread. Calling this from the idle
    /// thread, or before [`run`](Self::run), is fatal.
    pub fn delay(&self, ticks: u32) {
        without_interrupts::<A, _>(|| {
            let outcome = {
                let mut state = self.state.lock();
                match state.current {
                    None => Err(KernelError::NotRunning),
                    Some(slot) if slot.is_idle() => Err(KernelError::DelayFromIdle),
                    Some(slot) => {
                        if ticks > 0 {
                            state.suspend(slot, ticks);
                        }
                        Ok(())
                    }
                }
            };
            if let Err(error) = outcome {
                fatal(error);
            }
            self.schedule();
        })
    }

    /// Run the startup hook and make the first scheduling decision.
    ///
    /// The first switch happens as soon as interrupts are enabled. Split out of
    /// [`run`](Self::run) so hosted builds can drive the kernel by hand.
    pub fn start(&self) -> KernelResult<()> {
        let on_startup = without_interrupts::<A, _>(|| {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Uninit => Err(KernelError::NotInitialized),
                Phase::Running => Err(KernelError::AlreadyRunning),
                Phase::Configured => {
                    state.phase = Phase::Running;
                    Ok(state.hooks.on_startup)
                }
            }
        })?;

        log::debug!("starting {} threads", self.thread_count());
        on_startup();
        without_interrupts::<A, _>(|| {
            self.schedule();
        });
        Ok(())
    }

    /// Hand the CPU to the threads. Never returns.
    ///
    /// Registers this kernel as the process-wide kernel, installs the switch
    /// handler and starts scheduling; the boot stack is abandoned at the first
    /// switch.
    pub fn run(&'static self) -> ! {
        if !self.register_global() {
            fatal(KernelError::AlreadyRunning);
        }
        // Safety: the trampoline only reaches `'static` state and is installed
        // before `start` makes the first switch request.
        unsafe { A::install_switch_handler(switch_trampoline::<A, P>) };
        if let Err(error) = self.start() {
            fatal(error);
        }
        A::enable_interrupts();
        fatal(KernelError::RunReturned)
    }

    /// Commit the pending switch: save `sp` as the outgoing thread's context
    /// and return the incoming thread's.
    ///
    /// A trap with nothing pending resumes the interrupted thread.
    ///
    /// # Safety
    ///
    /// Must be called from the context-switch trap with interrupts disabled;
    /// `sp` must be the outgoing thread's stack pointer after the callee-saved
    /// registers were pushed. The returned pointer is loaded as the new stack
    /// pointer.
    pub unsafe fn switch_stacks(&self, sp: *mut usize) -> *mut usize {
        let mut state = self.state.lock();
        state.switch_pending = false;
        let Some(next) = state.next.take() else {
            if state.current.is_none() {
                drop(state);
                fatal(KernelError::NoRunnableThread);
            }
            return sp;
        };

        let outgoing = state.current;
        if let Some(slot) = outgoing {
            if let Some(tcb) = state.registry.get_mut(slot) {
                tcb.context = SavedContext::from_stack_pointer(sp);
            }
            if !slot.is_idle() && !state.delayed.contains(slot) {
                state.ready.insert(slot);
            }
        }

        let incoming = state.registry.get(next).map(|tcb| tcb.context.stack_pointer());
        let Some(incoming) = incoming else {
            drop(state);
            fatal(KernelError::NoRunnableThread);
        };
        state.ready.remove(next);
        state.current = Some(next);
        log::trace!("switch {:?} -> {}", outgoing, next);
        incoming
    }

    /// Register this kernel as the process-wide kernel.
    ///
    /// The first registration wins; returns whether this kernel is the
    /// registered one.
    pub fn register_global(&'static self) -> bool {
        let global = GLOBAL_KERNEL.call_once(|| GlobalKernel::of(self));
        core::ptr::eq(global.kernel, self as *const Self as *const ())
    }

    /// Ticks counted since start.
    pub fn now(&self) -> u32 {
        self.ticks.ticks()
    }

    pub fn tick_counter(&self) -> &TickCounter {
        &self.ticks
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn is_initialized(&self) -> bool {
        self.with_state(|state| state.phase != Phase::Uninit)
    }

    pub fn is_running(&self) -> bool {
        self.with_state(|state| state.phase == Phase::Running)
    }

    /// Copy of the sets and cursor.
    pub fn snapshot(&self) -> Snapshot {
        self.with_state(|state| Snapshot {
            ready: state.ready,
            delayed: state.delayed,
            current: state.current,
            next: state.next,
            switch_pending: state.switch_pending,
            ticks: self.ticks.ticks(),
        })
    }

    /// Slot of the thread executing now.
    pub fn current_slot(&self) -> Option<Slot> {
        self.with_state(|state| state.current)
    }

    /// Registered threads, idle included.
    pub fn thread_count(&self) -> usize {
        self.with_state(|state| state.registry.len())
    }

    pub fn thread_state(&self, slot: Slot) -> Option<ThreadState> {
        self.with_state(|state| {
            if !state.registry.contains(slot) {
                None
            } else if state.current == Some(slot) {
                Some(ThreadState::Running)
            } else if state.delayed.contains(slot) {
                Some(ThreadState::Waiting)
            } else {
                Some(ThreadState::Ready)
            }
        })
    }

    /// Remaining delay of a thread in ticks.
    pub fn timeout(&self, slot: Slot) -> Option<u32> {
        self.with_state(|state| state.registry.get(slot).map(ThreadControlBlock::timeout))
    }

    /// Context saved the last time the thread was switched out (or its
    /// fabricated first frame).
    pub fn saved_context(&self, slot: Slot) -> Option<SavedContext> {
        self.with_state(|state| state.registry.get(slot).map(ThreadControlBlock::context))
    }

    /// Words of a thread's stack never touched so far, judged by the paint
    /// left below its first frame. This is the least free stack seen.
    pub fn stack_high_water_mark(&self, slot: Slot) -> Option<usize> {
        self.with_state(|state| state.registry.get(slot).map(|tcb| tcb.stack().high_water_mark()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&KernelState) -> R) -> R {
        without_interrupts::<A, _>(|| f(&*self.state.lock()))
    }
}

// Safety: all state is behind the mutex and only touched with interrupts
// disabled on a single core.
unsafe impl<A: Arch, P: SelectionPolicy> Send for Kernel<A, P> {}
unsafe impl<A: Arch, P: SelectionPolicy> Sync for Kernel<A, P> {}

/// The kernel registered by [`Kernel::run`], if it is a `Kernel<A, P>`.
pub fn global_kernel<A: Arch, P: SelectionPolicy>() -> Option<&'static Kernel<A, P>> {
    let global = GLOBAL_KERNEL.get()?;
    if global.type_id != TypeId::of::<Kernel<A, P>>() {
        return None;
    }
    // Safety: the type id matches and registration requires `&'static self`.
    Some(unsafe { &*(global.kernel as *const Kernel<A, P>) })
}

/// Switch handler installed into the trap.
unsafe extern "C" fn switch_trampoline<A: Arch, P: SelectionPolicy>(sp: *mut usize) -> *mut usize {
    match global_kernel::<A, P>() {
        // Safety: called by the trap under the same contract.
        Some(kernel) => unsafe { kernel.switch_stacks(sp) },
        None => sp,
    }
}

/// Body of the idle thread: run the idle hook forever.
fn idle_entry<A: Arch, P: SelectionPolicy>() {
    loop {
        match global_kernel::<A, P>() {
            Some(kernel) => {
                let on_idle = without_interrupts::<A, _>(|| kernel.state.lock().hooks.on_idle);
                on_idle();
            }
            None => A::wait_for_interrupt(),
        }
    }
}
