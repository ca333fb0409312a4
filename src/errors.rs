//! Error handling for the thread kernel.
//!
//! Registration calls return [`KernelResult`]; contract violations and fatal
//! runtime conditions are routed through [`fatal`], which never returns.

#![allow(clippy::uninlined_format_args)]

use core::fmt;

/// Result type for kernel operations.
pub type KernelResult<T> = Result<T, KernelError>;

/// Error type for all kernel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelError {
    /// `init` has not been called yet
    NotInitialized,
    /// `init` was called a second time
    AlreadyInitialized,
    /// Threads can only be registered before `run`
    AlreadyRunning,
    /// Every registry slot is taken
    RegistryFull { capacity: usize },
    /// Requested slot is outside `1..=MAX_THREADS`
    InvalidSlot(u8),
    /// Requested slot already holds a thread
    SlotOccupied(u8),
    /// Stack region cannot hold an initial frame
    StackTooSmall { words: usize, required: usize },
    /// SysTick reload value does not fit in 24 bits
    TickReloadOutOfRange(u32),
    /// `delay` was called from the idle thread
    DelayFromIdle,
    /// A kernel call that needs a running thread was made before `run`
    NotRunning,
    /// A thread entry function returned
    ThreadReturned,
    /// The scheduler found no thread to switch to
    NoRunnableThread,
    /// `run` fell through after starting the first thread
    RunReturned,
}

/// Broad classification of a [`KernelError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Detected at startup while registering threads
    Configuration,
    /// A caller broke a documented precondition
    ContractViolation,
    /// The kernel cannot continue
    Fatal,
}

impl KernelError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            KernelError::NotInitialized
            | KernelError::AlreadyInitialized
            | KernelError::AlreadyRunning
            | KernelError::RegistryFull { .. }
            | KernelError::InvalidSlot(_)
            | KernelError::StackTooSmall { .. }
            | KernelError::TickReloadOutOfRange(_) => ErrorKind::Configuration,
            KernelError::SlotOccupied(_) | KernelError::DelayFromIdle | KernelError::NotRunning => {
                ErrorKind::ContractViolation
            }
            KernelError::ThreadReturned
            | KernelError::NoRunnableThread
            | KernelError::RunReturned => ErrorKind::Fatal,
        }
    }
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::NotInitialized => write!(f, "Kernel not initialized"),
            KernelError::AlreadyInitialized => write!(f, "Kernel already initialized"),
            KernelError::AlreadyRunning => write!(f, "Kernel already running"),
            KernelError::RegistryFull { capacity } => {
                write!(f, "Thread registry full ({} slots)", capacity)
            }
            KernelError::InvalidSlot(slot) => write!(f, "Invalid thread slot: {}", slot),
            KernelError::SlotOccupied(slot) => write!(f, "Thread slot {} already occupied", slot),
            KernelError::StackTooSmall { words, required } => {
                write!(f, "Stack too small: {} words, need at least {}", words, required)
            }
            KernelError::TickReloadOutOfRange(reload) => {
                write!(f, "SysTick reload out of range: {:#x}", reload)
            }
            KernelError::DelayFromIdle => write!(f, "delay() called from the idle thread"),
            KernelError::NotRunning => write!(f, "No thread is running"),
            KernelError::ThreadReturned => write!(f, "Thread entry function returned"),
            KernelError::NoRunnableThread => write!(f, "No runnable thread to switch to"),
            KernelError::RunReturned => write!(f, "run() returned"),
        }
    }
}

/// Report an unrecoverable kernel condition and stop.
///
/// The message goes out through the diagnostic log first; the panic that
/// follows is turned into a halt by the firmware panic handler.
#[cold]
#[track_caller]
pub fn fatal(error: KernelError) -> ! {
    log::error!("fatal: {}", error);
    panic!("kernel fault: {}", error);
}
