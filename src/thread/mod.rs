//! Thread control blocks and their fixed-capacity registry.

use crate::arch::SavedContext;
use crate::config::MAX_THREADS;

pub mod registry;
pub mod set;
pub mod stack;

pub use registry::Registry;
pub use set::SlotSet;
pub use stack::StackRegion;

/// Entry point of a thread. It must never return.
pub type ThreadEntry = fn();

/// Stable identity of a thread within the registry.
///
/// Slot 0 is always the idle thread. Application threads occupy
/// `1..=MAX_THREADS`, which is also their priority under the strict-priority
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Slot(u8);

impl core::fmt::Display for Slot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Slot {
    /// The idle thread's slot.
    pub const IDLE: Slot = Slot(0);

    /// Create a slot for an application thread, rejecting 0 and anything past
    /// [`MAX_THREADS`].
    pub const fn new(index: u8) -> Option<Self> {
        if index == 0 || index as usize > MAX_THREADS {
            None
        } else {
            Some(Self(index))
        }
    }

    /// Registry index of this slot.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw slot number.
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether this is the idle slot.
    pub const fn is_idle(self) -> bool {
        self.0 == 0
    }

    /// Bit for this slot in a [`SlotSet`]. The idle slot has no bit.
    pub(crate) const fn bit(self) -> u32 {
        if self.0 == 0 {
            0
        } else {
            1 << (self.0 - 1)
        }
    }
}

/// Scheduling state of a thread, derived from the kernel's sets and cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Currently executing
    Running,
    /// Eligible to be selected
    Ready,
    /// Sleeping until its timeout reaches zero
    Waiting,
}

/// Per-thread kernel record.
pub struct ThreadControlBlock {
    /// Saved stack pointer; valid only while the thread is not running
    pub(crate) context: SavedContext,
    /// Remaining ticks before the thread is readied again (0 = not waiting)
    pub(crate) timeout: u32,
    slot: Slot,
    entry: ThreadEntry,
    stack: StackRegion,
}

impl ThreadControlBlock {
    pub(crate) fn new(slot: Slot, entry: ThreadEntry, stack: StackRegion, context: SavedContext) -> Self {
        Self {
            context,
            timeout: 0,
            slot,
            entry,
            stack,
        }
    }

    /// Slot this thread was registered in.
    pub fn slot(&self) -> Slot {
        self.slot
    }

    /// Function the thread started executing at.
    pub fn entry(&self) -> ThreadEntry {
        self.entry
    }

    /// Remaining timeout in ticks.
    pub fn timeout(&self) -> u32 {
        self.timeout
    }

    /// Saved context (meaningful only while the thread is switched out).
    pub fn context(&self) -> SavedContext {
        self.context
    }

    /// The caller-owned stack region backing this thread.
    pub fn stack(&self) -> &StackRegion {
        &self.stack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_bounds() {
        assert!(Slot::new(0).is_none());
        assert!(Slot::new(33).is_none());
        assert_eq!(Slot::new(1).map(Slot::index), Some(1));
        assert_eq!(Slot::new(32).map(Slot::get), Some(32));
        assert!(Slot::IDLE.is_idle());
    }

    #[test]
    fn test_slot_bits() {
        assert_eq!(Slot::IDLE.bit(), 0);
        assert_eq!(Slot::new(1).map(Slot::bit), Some(1));
        assert_eq!(Slot::new(32).map(Slot::bit), Some(1 << 31));
    }
}
