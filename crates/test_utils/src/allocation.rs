use std::{
    alloc::{GlobalAlloc, Layout, System},
    cell::Cell,
};

/// Heap allocation counts for the current thread
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocationStats {
    /// The number of allocations
    pub allocations: usize,
    /// The number of deallocations
    pub deallocations: usize,
}

impl AllocationStats {
    /// Returns the number of allocations that haven't been deallocated
    pub fn live(&self) -> isize {
        self.allocations as isize - self.deallocations as isize
    }

    fn since(&self, earlier: &Self) -> Self {
        Self {
            allocations: self.allocations - earlier.allocations,
            deallocations: self.deallocations - earlier.deallocations,
        }
    }
}

thread_local! {
    static STATS: Cell<AllocationStats> = const {
        Cell::new(AllocationStats {
            allocations: 0,
            deallocations: 0,
        })
    };
}

// The thread local is const-initialized and has no destructor, so accessing it doesn't allocate.
fn record(f: impl FnOnce(&mut AllocationStats)) {
    let _ = STATS.try_with(|stats| {
        let mut updated = stats.get();
        f(&mut updated);
        stats.set(updated);
    });
}

/// A global allocator that counts allocations per thread
///
/// Counting per thread keeps the results of tests that run in parallel independent from each
/// other. Allocations are forwarded to the [System] allocator.
///
/// ```ignore
/// #[global_allocator]
/// static ALLOC: ptrkit_test_utils::CountingAllocator = ptrkit_test_utils::CountingAllocator;
/// ```
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        record(|stats| stats.allocations += 1);
        unsafe { System.alloc(layout) }
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        record(|stats| stats.allocations += 1);
        unsafe { System.alloc_zeroed(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        record(|stats| stats.deallocations += 1);
        unsafe { System.dealloc(ptr, layout) }
    }

    // A reallocation replaces one allocation with another, so the counts are left unchanged
    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

/// Returns the allocation counts of the current thread
///
/// The counts are only updated when [CountingAllocator] is the global allocator.
pub fn allocation_stats() -> AllocationStats {
    STATS.with(Cell::get)
}

/// Runs the function, returning its result along with the allocations it made
pub fn count_allocations<R>(f: impl FnOnce() -> R) -> (R, AllocationStats) {
    let before = allocation_stats();
    let result = f();
    let after = allocation_stats();
    (result, after.since(&before))
}
