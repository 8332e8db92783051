//! Internal implementation details.

pub(crate) mod circular;
pub(crate) mod teardown_stack;

pub(crate) use circular::with_circular_check;
pub(crate) use teardown_stack::{TearDown, TearDownStack};
