//! Round-robin selection.

use super::trait_def::SelectionPolicy;
use crate::thread::{Slot, SlotSet};

/// Rotates through runnable threads in ascending slot order.
///
/// Each decision picks the first candidate after the running slot, wrapping
/// past the highest slot back to the lowest. A thread that is the only
/// candidate keeps running.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin;

impl RoundRobin {
    pub const fn new() -> Self {
        RoundRobin
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(&self, candidates: SlotSet, current: Slot) -> Option<Slot> {
        candidates.next_after(current)
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}
