//! Fixed-capacity table of thread control blocks indexed by slot.

use super::{Slot, ThreadControlBlock};
use crate::config::REGISTRY_CAPACITY;
use crate::errors::{KernelError, KernelResult};

const EMPTY: Option<ThreadControlBlock> = None;

/// Registry of every thread in the system. Slots are never freed.
pub struct Registry {
    threads: [Option<ThreadControlBlock>; REGISTRY_CAPACITY],
    count: usize,
}

impl Registry {
    pub const fn new() -> Self {
        Self {
            threads: [EMPTY; REGISTRY_CAPACITY],
            count: 0,
        }
    }

    /// Lowest free application slot, in registration order.
    pub fn next_free(&self) -> KernelResult<Slot> {
        self.threads
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, tcb)| tcb.is_none())
            .and_then(|(index, _)| Slot::new(index as u8))
            .ok_or(KernelError::RegistryFull {
                capacity: REGISTRY_CAPACITY,
            })
    }

    /// Check that `slot` can still be registered.
    pub fn check_vacant(&self, slot: Slot) -> KernelResult<()> {
        if self.threads[slot.index()].is_some() {
            Err(KernelError::SlotOccupied(slot.get()))
        } else {
            Ok(())
        }
    }

    /// Store a thread in its slot.
    pub fn register(&mut self, tcb: ThreadControlBlock) -> KernelResult<Slot> {
        let slot = tcb.slot();
        self.check_vacant(slot)?;
        self.threads[slot.index()] = Some(tcb);
        self.count += 1;
        Ok(slot)
    }

    pub fn get(&self, slot: Slot) -> Option<&ThreadControlBlock> {
        self.threads[slot.index()].as_ref()
    }

    pub fn get_mut(&mut self, slot: Slot) -> Option<&mut ThreadControlBlock> {
        self.threads[slot.index()].as_mut()
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.get(slot).is_some()
    }

    /// Number of registered threads, idle included.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Iterate registered threads in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreadControlBlock> {
        self.threads.iter().flatten()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::SavedContext;
    use crate::config::MAX_THREADS;
    use crate::thread::StackRegion;
    use std::boxed::Box;
    use std::vec;

    fn tcb(slot: Slot) -> ThreadControlBlock {
        let stack = Box::leak(vec![0usize; 32].into_boxed_slice());
        ThreadControlBlock::new(slot, || {}, StackRegion::new(stack), SavedContext::null())
    }

    #[test]
    fn test_next_free_skips_idle() {
        let mut registry = Registry::new();
        registry.register(tcb(Slot::IDLE)).unwrap();
        assert_eq!(registry.next_free(), Ok(Slot::new(1).unwrap()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_rejects_duplicate() {
        let mut registry = Registry::new();
        let slot = Slot::new(4).unwrap();
        registry.register(tcb(slot)).unwrap();
        assert_eq!(registry.register(tcb(slot)).err(), Some(KernelError::SlotOccupied(4)));
        assert!(registry.contains(slot));
    }

    #[test]
    fn test_registry_full() {
        let mut registry = Registry::new();
        for _ in 0..MAX_THREADS {
            let slot = registry.next_free().unwrap();
            registry.register(tcb(slot)).unwrap();
        }
        assert_eq!(
            registry.next_free(),
            Err(KernelError::RegistryFull {
                capacity: REGISTRY_CAPACITY
            })
        );
    }

    #[test]
    fn test_next_free_fills_gaps_in_order() {
        let mut registry = Registry::new();
        registry.register(tcb(Slot::new(2).unwrap())).unwrap();
        assert_eq!(registry.next_free(), Ok(Slot::new(1).unwrap()));
        registry.register(tcb(Slot::new(1).unwrap())).unwrap();
        assert_eq!(registry.next_free(), Ok(Slot::new(3).unwrap()));
    }
}
