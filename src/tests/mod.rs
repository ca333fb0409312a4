//! Cross-module tests driving a kernel on the simulated host architecture.

pub(crate) mod helpers;
