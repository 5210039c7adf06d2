//! Testing utilities for ptrkit crates

#![warn(missing_docs)]

mod allocation;
mod drop_tracker;
mod logging;

pub use allocation::{AllocationStats, CountingAllocator, allocation_stats, count_allocations};
pub use drop_tracker::{DropTracker, Tracked};
pub use logging::init_logging;
