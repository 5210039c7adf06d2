use std::{cell::Cell, fmt, ops::Deref, rc::Rc};

/// Counts how many [Tracked] values have been dropped
///
/// Clones of a tracker share the same count.
#[derive(Clone, Debug, Default)]
pub struct DropTracker {
    drops: Rc<Cell<usize>>,
}

impl DropTracker {
    /// Makes a new tracker with a drop count of zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps the value so that dropping it increments the tracker's count
    pub fn track<T>(&self, value: T) -> Tracked<T> {
        Tracked {
            value,
            tracker: self.clone(),
        }
    }

    /// Returns the number of tracked values that have been dropped
    pub fn drops(&self) -> usize {
        self.drops.get()
    }
}

/// A value that reports to a [DropTracker] when it's dropped
pub struct Tracked<T> {
    value: T,
    tracker: DropTracker,
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        let drops = &self.tracker.drops;
        drops.set(drops.get() + 1);
    }
}

impl<T: fmt::Debug> fmt::Debug for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Tracked").field(&self.value).finish()
    }
}
