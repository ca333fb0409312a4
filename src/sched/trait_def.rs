//! Selection policy trait.

use crate::thread::{Slot, SlotSet};

/// Picks the next thread to run from a set of candidates.
///
/// Policies are pure functions of their inputs: the kernel builds the
/// candidate set (ready threads plus the running thread if it can keep
/// running) and commits the result. Policies never see the idle thread; when
/// the candidate set is empty the kernel selects idle itself.
pub trait SelectionPolicy: Send + Sync + 'static {
    /// Choose a member of `candidates`.
    ///
    /// `current` is the running slot ([`Slot::IDLE`] before the first switch or
    /// while idling). Returning `None`, or a slot that is not a candidate, is a
    /// fatal kernel error.
    fn select(&self, candidates: SlotSet, current: Slot) -> Option<Slot>;

    /// Short name for diagnostics.
    fn name(&self) -> &'static str;
}
