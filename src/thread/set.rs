//! Bit-per-slot membership sets used for the ready and delayed queues.

use super::Slot;

/// Set of application slots, one bit per slot (`slot n` is bit `n - 1`).
///
/// The idle slot is never a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotSet(u32);

impl SlotSet {
    /// The empty set.
    pub const EMPTY: SlotSet = SlotSet(0);

    /// Build a set from its raw bitmask.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask.
    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn insert(&mut self, slot: Slot) {
        self.0 |= slot.bit();
    }

    pub fn remove(&mut self, slot: Slot) {
        self.0 &= !slot.bit();
    }

    pub fn contains(self, slot: Slot) -> bool {
        !slot.is_idle() && self.0 & slot.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Set with `slot` added, leaving `self` untouched.
    pub fn with(mut self, slot: Slot) -> Self {
        self.insert(slot);
        self
    }

    /// Highest member, found with a leading-zero count.
    pub fn highest(self) -> Option<Slot> {
        if self.0 == 0 {
            None
        } else {
            Some(Slot((u32::BITS - self.0.leading_zeros()) as u8))
        }
    }

    /// Lowest member.
    pub fn lowest(self) -> Option<Slot> {
        if self.0 == 0 {
            None
        } else {
            Some(Slot((self.0.trailing_zeros() + 1) as u8))
        }
    }

    /// First member strictly after `slot`, wrapping around to the lowest
    /// member. Returns `slot` itself only if it is the sole member.
    pub fn next_after(self, slot: Slot) -> Option<Slot> {
        // Slots above `slot` live at bit positions >= slot.get().
        let above = if slot.index() >= u32::BITS as usize {
            0
        } else {
            self.0 & (u32::MAX << slot.get())
        };
        SlotSet(above).lowest().or_else(|| self.lowest())
    }

    /// Iterate members in ascending slot order.
    pub fn iter(self) -> SlotSetIter {
        SlotSetIter(self.0)
    }
}

impl IntoIterator for SlotSet {
    type Item = Slot;
    type IntoIter = SlotSetIter;

    fn into_iter(self) -> SlotSetIter {
        self.iter()
    }
}

/// Iterator over the members of a [`SlotSet`].
pub struct SlotSetIter(u32);

impl Iterator for SlotSetIter {
    type Item = Slot;

    fn next(&mut self) -> Option<Slot> {
        let slot = SlotSet(self.0).lowest()?;
        self.0 &= self.0 - 1;
        Some(slot)
    }
}
