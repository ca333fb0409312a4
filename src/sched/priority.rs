//! Strict-priority selection.

use super::trait_def::SelectionPolicy;
use crate::thread::{Slot, SlotSet};

/// Always runs the highest-numbered runnable slot.
///
/// The slot number is the priority. Lower-priority threads run only while
/// every higher one is delayed; threads of different slots never share the
/// CPU by rotation.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictPriority;

impl StrictPriority {
    pub const fn new() -> Self {
        StrictPriority
    }
}

impl SelectionPolicy for StrictPriority {
    fn select(&self, candidates: SlotSet, _current: Slot) -> Option<Slot> {
        candidates.highest()
    }

    fn name(&self) -> &'static str {
        "strict-priority"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(n: u8) -> Slot {
        Slot::new(n).unwrap()
    }

    #[test]
    fn test_highest_slot_wins() {
        let policy = StrictPriority::new();
        let candidates = SlotSet::EMPTY.with(slot(3)).with(slot(9)).with(slot(5));
        assert_eq!(policy.select(candidates, Slot::IDLE), Some(slot(9)));
        assert_eq!(policy.select(candidates, slot(9)), Some(slot(9)));
        assert_eq!(policy.select(candidates, slot(3)), Some(slot(9)));
    }

    #[test]
    fn test_top_slot() {
        let policy = StrictPriority::new();
        let candidates = SlotSet::EMPTY.with(slot(1)).with(slot(32));
        assert_eq!(policy.select(candidates, slot(1)), Some(slot(32)));
        assert_eq!(policy.select(SlotSet::EMPTY, slot(1)), None);
    }
}
