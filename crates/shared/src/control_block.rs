//! Control blocks for shared ownership groups
//!
//! Every ownership group has exactly one control block, starting with a [BlockHeader] that holds
//! the counts and the lifecycle state. The header is followed by the variant-specific part:
//!
//! - [ControlBlockPointer] points to a separately allocated value,
//! - [ControlBlockInline] stores the value inside the block.
//!
//! Handles only ever see `NonNull<BlockHeader>`, the variant is reached through the header's
//! [BlockVTable].

use std::{
    cell::Cell,
    mem::MaybeUninit,
    process,
    ptr::{self, NonNull},
};

/// The lifecycle of a control block
///
/// The final state, where both counts are zero, is the freed block itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockState {
    /// The value is alive, the strong count is greater than zero
    Live,
    /// The strong count has reached zero and the value's destructor is running
    Releasing,
    /// The value has been dropped, only weak handles keep the block alive
    StrongReleased,
}

/// The allocation strategy used by a control block
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockKind {
    /// The value is allocated separately, see [ControlBlockPointer]
    Pointer,
    /// The value is stored in the block, see [ControlBlockInline]
    Inline,
}

/// The lifecycle hooks of a control block variant
pub(crate) struct BlockVTable {
    kind: BlockKind,
    /// Drops the value, called once when the strong count reaches zero
    on_zero_strong: unsafe fn(NonNull<BlockHeader>),
    /// Frees the block, called once when both counts are zero
    on_zero_weak: unsafe fn(NonNull<BlockHeader>),
}

/// The part of a control block that is common to all variants
///
/// Each variant is `repr(C)` with the header as its first field, so a pointer to a variant can
/// be cast to a pointer to its header and back.
#[repr(C)]
pub(crate) struct BlockHeader {
    strong: Cell<usize>,
    weak: Cell<usize>,
    state: Cell<BlockState>,
    vtable: &'static BlockVTable,
}

impl BlockHeader {
    // New blocks are owned by the handle that's being constructed
    fn new(vtable: &'static BlockVTable) -> Self {
        Self {
            strong: Cell::new(1),
            weak: Cell::new(0),
            state: Cell::new(BlockState::Live),
            vtable,
        }
    }

    pub(crate) fn strong(&self) -> usize {
        self.strong.get()
    }

    pub(crate) fn weak(&self) -> usize {
        self.weak.get()
    }

    pub(crate) fn state(&self) -> BlockState {
        self.state.get()
    }

    pub(crate) fn kind(&self) -> BlockKind {
        self.vtable.kind
    }

    /// Adds a strong reference to a block with a live value
    pub(crate) fn increment_strong(&self) {
        debug_assert!(self.strong() > 0);
        self.strong.set(increment(self.strong()));
    }

    /// Adds a strong reference if the value is still alive
    ///
    /// Returns false without modifying the count if the value has already been dropped.
    pub(crate) fn try_increment_strong(&self) -> bool {
        match self.strong() {
            0 => false,
            strong => {
                self.strong.set(increment(strong));
                true
            }
        }
    }

    pub(crate) fn increment_weak(&self) {
        self.weak.set(increment(self.weak()));
    }

    /// Removes a strong reference, dropping the value and freeing the block as needed
    ///
    /// # Safety
    ///
    /// `header` must point to a live block, and the caller must be giving up one of the block's
    /// strong references.
    pub(crate) unsafe fn release_strong(header: NonNull<Self>) {
        let (vtable, reclaim) = {
            // SAFETY: The block stays allocated while the caller's strong reference exists
            let block = unsafe { header.as_ref() };
            debug_assert!(block.strong() > 0);

            let strong = block.strong() - 1;
            block.strong.set(strong);
            if strong > 0 {
                return;
            }

            block.transition(BlockState::Live, BlockState::Releasing);
            lifecycle_trace!("{header:p}: dropping {:?} value", block.kind());

            // SAFETY: The strong count has just reached zero, so the value can be dropped.
            // The block stays allocated because its state is `Releasing`, which prevents weak
            // handles dropped by the value's destructor from freeing it.
            unsafe { (block.vtable.on_zero_strong)(header) };

            block.transition(BlockState::Releasing, BlockState::StrongReleased);
            (block.vtable, block.weak() == 0)
        };

        if reclaim {
            // SAFETY: Both counts are zero and no references to the block remain
            unsafe { Self::reclaim(header, vtable) };
        }
    }

    /// Removes a weak reference, freeing the block if it was the last reference
    ///
    /// # Safety
    ///
    /// `header` must point to a live block, and the caller must be giving up one of the block's
    /// weak references.
    pub(crate) unsafe fn release_weak(header: NonNull<Self>) {
        let vtable = {
            // SAFETY: The block stays allocated while the caller's weak reference exists
            let block = unsafe { header.as_ref() };
            debug_assert!(block.weak() > 0);

            let weak = block.weak() - 1;
            block.weak.set(weak);
            if weak > 0 || block.state() != BlockState::StrongReleased {
                return;
            }

            block.vtable
        };

        // SAFETY: The value has been dropped and this was the last weak reference
        unsafe { Self::reclaim(header, vtable) };
    }

    unsafe fn reclaim(header: NonNull<Self>, vtable: &'static BlockVTable) {
        lifecycle_trace!("{header:p}: freeing {:?} block", vtable.kind);
        // SAFETY: See callers
        unsafe { (vtable.on_zero_weak)(header) };
    }

    fn transition(&self, from: BlockState, to: BlockState) {
        debug_assert_eq!(self.state(), from);
        lifecycle_trace!("{:p}: {from:?} -> {to:?}", self);
        self.state.set(to);
    }
}

// Counts are incremented one at a time, so overflowing requires leaking handles with
// `mem::forget`. Like `std::rc::Rc`, the process is aborted rather than risking a use after free.
fn increment(count: usize) -> usize {
    match count.checked_add(1) {
        Some(count) => count,
        None => process::abort(),
    }
}

/// A control block for a value in a separate allocation
///
/// The value is owned as a `Box<T>` that has been converted into a raw pointer.
#[repr(C)]
pub(crate) struct ControlBlockPointer<T: ?Sized> {
    header: BlockHeader,
    value: NonNull<T>,
}

impl<T: ?Sized> ControlBlockPointer<T> {
    /// Allocates a control block that takes ownership of the boxed value
    ///
    /// # Safety
    ///
    /// `value` must have been produced by `Box::into_raw`, and must not be owned by anything else.
    pub(crate) unsafe fn allocate(value: NonNull<T>) -> NonNull<BlockHeader> {
        let block = Box::new(Self {
            header: BlockHeader::new(&BlockVTable {
                kind: BlockKind::Pointer,
                on_zero_strong: Self::on_zero_strong,
                on_zero_weak: Self::on_zero_weak,
            }),
            value,
        });

        let header = NonNull::from(Box::leak(block)).cast::<BlockHeader>();
        lifecycle_trace!("{header:p}: adopted value at {value:p}");
        header
    }

    unsafe fn on_zero_strong(header: NonNull<BlockHeader>) {
        // SAFETY: The header was cast from a block of this type in `allocate`
        let value = unsafe { header.cast::<Self>().as_ref().value };
        // SAFETY: The value came from `Box::into_raw` and is only dropped here, once
        drop(unsafe { Box::from_raw(value.as_ptr()) });
    }

    unsafe fn on_zero_weak(header: NonNull<BlockHeader>) {
        // SAFETY: The block was leaked from a box in `allocate`, and is only freed here, once
        drop(unsafe { Box::from_raw(header.cast::<Self>().as_ptr()) });
    }
}

/// A control block that stores the value alongside the counts
///
/// The value is dropped in place when the strong count reaches zero, but its storage is only
/// freed along with the rest of the block.
#[repr(C)]
pub(crate) struct ControlBlockInline<T> {
    header: BlockHeader,
    value: MaybeUninit<T>,
}

impl<T> ControlBlockInline<T> {
    /// Allocates a control block containing the value
    ///
    /// Returns the block's header along with a pointer to the stored value.
    pub(crate) fn allocate(value: T) -> (NonNull<BlockHeader>, NonNull<T>) {
        let block = Box::new(Self {
            header: BlockHeader::new(&BlockVTable {
                kind: BlockKind::Inline,
                on_zero_strong: Self::on_zero_strong,
                on_zero_weak: Self::on_zero_weak,
            }),
            value: MaybeUninit::new(value),
        });

        let block = NonNull::from(Box::leak(block));
        let header = block.cast::<BlockHeader>();
        // SAFETY: The block has just been allocated, so projecting to its field is valid
        let value = unsafe { Self::value_ptr(block) };

        lifecycle_trace!("{header:p}: allocated value at {value:p}");
        (header, value)
    }

    unsafe fn value_ptr(block: NonNull<Self>) -> NonNull<T> {
        // SAFETY: `block` points to an allocated block, so the field pointer is non-null
        unsafe {
            NonNull::new_unchecked(ptr::addr_of_mut!((*block.as_ptr()).value)).cast::<T>()
        }
    }

    unsafe fn on_zero_strong(header: NonNull<BlockHeader>) {
        // SAFETY: The header was cast from a block of this type in `allocate`, and the value is
        // initialized until it's dropped here, once
        unsafe { ptr::drop_in_place(Self::value_ptr(header.cast::<Self>()).as_ptr()) };
    }

    unsafe fn on_zero_weak(header: NonNull<BlockHeader>) {
        // SAFETY: The block was leaked from a box in `allocate`, and is only freed here, once.
        // `MaybeUninit` prevents the already-dropped value from being dropped again.
        drop(unsafe { Box::from_raw(header.cast::<Self>().as_ptr()) });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{cell::RefCell, rc::Rc};

    type EventLog = Rc<RefCell<Vec<&'static str>>>;

    struct Noisy(EventLog);

    impl Drop for Noisy {
        fn drop(&mut self) {
            self.0.borrow_mut().push("drop");
        }
    }

    fn inline_block(events: &EventLog) -> NonNull<BlockHeader> {
        ControlBlockInline::allocate(Noisy(events.clone())).0
    }

    fn pointer_block(events: &EventLog) -> NonNull<BlockHeader> {
        let value = NonNull::from(Box::leak(Box::new(Noisy(events.clone()))));
        unsafe { ControlBlockPointer::allocate(value) }
    }

    mod state_machine {
        use super::*;
        use test_case::test_case;

        #[test_case(inline_block, BlockKind::Inline; "inline")]
        #[test_case(pointer_block, BlockKind::Pointer; "pointer")]
        fn new_block_is_live_with_one_strong_reference(
            make_block: fn(&EventLog) -> NonNull<BlockHeader>,
            expected_kind: BlockKind,
        ) {
            let events = EventLog::default();
            let header = make_block(&events);

            let block = unsafe { header.as_ref() };
            assert_eq!(block.kind(), expected_kind);
            assert_eq!(block.state(), BlockState::Live);
            assert_eq!(block.strong(), 1);
            assert_eq!(block.weak(), 0);

            unsafe { BlockHeader::release_strong(header) };
            assert_eq!(*events.borrow(), ["drop"]);
        }

        #[test_case(inline_block; "inline")]
        #[test_case(pointer_block; "pointer")]
        fn value_is_dropped_before_the_block_is_freed(
            make_block: fn(&EventLog) -> NonNull<BlockHeader>,
        ) {
            let events = EventLog::default();
            let header = make_block(&events);

            let block = unsafe { header.as_ref() };
            block.increment_weak();
            unsafe { BlockHeader::release_strong(header) };

            assert_eq!(*events.borrow(), ["drop"]);
            assert_eq!(block.state(), BlockState::StrongReleased);
            assert_eq!(block.strong(), 0);
            assert_eq!(block.weak(), 1);
            assert!(!block.try_increment_strong());
            assert_eq!(block.strong(), 0);

            unsafe { BlockHeader::release_weak(header) };
            assert_eq!(*events.borrow(), ["drop"]);
        }

        #[test]
        fn value_is_dropped_once_after_the_last_strong_reference() {
            let events = EventLog::default();
            let header = inline_block(&events);

            let block = unsafe { header.as_ref() };
            block.increment_strong();
            block.increment_strong();
            block.increment_weak();
            assert!(block.try_increment_strong());
            assert_eq!(block.strong(), 4);

            for _ in 0..3 {
                unsafe { BlockHeader::release_strong(header) };
                assert!(events.borrow().is_empty());
                assert_eq!(block.state(), BlockState::Live);
            }

            unsafe { BlockHeader::release_strong(header) };
            assert_eq!(*events.borrow(), ["drop"]);

            unsafe { BlockHeader::release_weak(header) };
        }
    }

    mod releasing {
        use super::*;

        // A value that holds a weak reference to its own block, released by its destructor
        struct SelfObserving {
            header: Rc<Cell<Option<NonNull<BlockHeader>>>>,
            events: EventLog,
        }

        impl Drop for SelfObserving {
            fn drop(&mut self) {
                let header = self.header.get().unwrap();
                let block = unsafe { header.as_ref() };
                assert_eq!(block.state(), BlockState::Releasing);
                assert!(!block.try_increment_strong());

                unsafe { BlockHeader::release_weak(header) };
                self.events.borrow_mut().push("released weak");
            }
        }

        #[test]
        fn weak_reference_released_by_the_value_does_not_free_the_block_early() {
            let events = EventLog::default();
            let header_slot = Rc::new(Cell::new(None));
            let (header, _) = ControlBlockInline::allocate(SelfObserving {
                header: header_slot.clone(),
                events: events.clone(),
            });
            header_slot.set(Some(header));
            unsafe { header.as_ref() }.increment_weak();

            // The block is freed by the strong release once the destructor has returned
            unsafe { BlockHeader::release_strong(header) };
            assert_eq!(*events.borrow(), ["released weak"]);
        }
    }
}
