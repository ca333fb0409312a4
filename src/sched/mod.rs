//! Thread selection policies.
//!
//! Round-robin is the default; the `strict-priority` feature switches the
//! default to priority-by-slot.

pub mod priority;
pub mod rr;
pub mod trait_def;

pub use priority::StrictPriority;
pub use rr::RoundRobin;
pub use trait_def::SelectionPolicy;

/// Default selection policy.
#[cfg(not(feature = "strict-priority"))]
pub type DefaultPolicy = RoundRobin;

/// Default selection policy.
#[cfg(feature = "strict-priority")]
pub type DefaultPolicy = StrictPriority;
