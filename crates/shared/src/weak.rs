use std::{fmt, mem, ptr::NonNull};

use crate::{Address, Result, SharedHandle, control_block::BlockHeader};

/// A weak handle to a value with shared ownership
///
/// A weak handle doesn't keep its value alive, it only keeps the ownership group's control block
/// allocated so that it can check whether the value is still alive. The value can be accessed by
/// promoting the weak handle to a [SharedHandle] with [WeakHandle::lock] or
/// [WeakHandle::upgrade].
pub struct WeakHandle<T: ?Sized> {
    owner: Option<NonNull<BlockHeader>>,
    view: Option<NonNull<T>>,
    // Carried over to promoted handles, see `SharedHandle::get_mut`
    owns_view: bool,
}

impl<T: ?Sized> WeakHandle<T> {
    /// Returns a weak handle that doesn't observe anything
    ///
    /// An empty weak handle is always expired.
    pub const fn empty() -> Self {
        Self {
            owner: None,
            view: None,
            owns_view: false,
        }
    }

    /// Returns true if the value has been dropped, or if the handle is empty
    pub fn expired(&self) -> bool {
        self.use_count() == 0
    }

    /// Returns a strong handle to the value, or an empty handle if the value has been dropped
    pub fn lock(&self) -> SharedHandle<T> {
        self.upgrade().unwrap_or_default()
    }

    /// Returns a strong handle to the value
    ///
    /// [Error::Expired](crate::Error::Expired) is returned if the value has been dropped.
    pub fn upgrade(&self) -> Result<SharedHandle<T>> {
        SharedHandle::promote(self)
    }

    /// Returns the number of strong handles in the ownership group
    ///
    /// 0 is returned for empty handles.
    pub fn use_count(&self) -> usize {
        // SAFETY: The handle's weak reference keeps the block allocated
        self.owner.map_or(0, |owner| unsafe { owner.as_ref() }.strong())
    }

    /// Returns the number of weak handles in the ownership group, including this one
    ///
    /// 0 is returned for empty handles.
    pub fn weak_count(&self) -> usize {
        // SAFETY: The handle's weak reference keeps the block allocated
        self.owner.map_or(0, |owner| unsafe { owner.as_ref() }.weak())
    }

    /// Returns the address of the observed value
    ///
    /// The address remains available after the value has been dropped, but it mustn't be
    /// dereferenced. A null address is returned for empty handles.
    pub fn address(&self) -> Address {
        match self.view {
            Some(view) => view.as_ptr().cast_const().into(),
            None => Address::null(),
        }
    }

    /// Returns true if the two handles observe the same address
    pub fn ptr_eq<U: ?Sized>(&self, other: &WeakHandle<U>) -> bool {
        self.address() == other.address()
    }

    /// Returns true if the handle belongs to the same ownership group as the strong handle
    pub fn owner_eq<U: ?Sized>(&self, other: &SharedHandle<U>) -> bool {
        match other.parts() {
            Some((owner, _)) => self.owner == Some(owner),
            None => self.owner.is_none(),
        }
    }

    /// Releases the handle's weak reference, leaving it empty
    pub fn reset(&mut self) {
        self.view = None;
        self.owns_view = false;
        if let Some(owner) = self.owner.take() {
            // SAFETY: The handle's weak reference is being given up
            unsafe { BlockHeader::release_weak(owner) };
        }
    }

    /// Exchanges the observed values of two handles
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    pub(crate) fn parts(&self) -> Option<(NonNull<BlockHeader>, NonNull<T>)> {
        self.owner.zip(self.view)
    }

    pub(crate) fn owns_view(&self) -> bool {
        self.owns_view
    }

    // Adds a weak reference to the block
    //
    // The block must be kept alive by the caller.
    unsafe fn observe(owner: NonNull<BlockHeader>, view: NonNull<T>, owns_view: bool) -> Self {
        // SAFETY: The caller guarantees that the block is alive
        unsafe { owner.as_ref() }.increment_weak();
        Self {
            owner: Some(owner),
            view: Some(view),
            owns_view,
        }
    }
}

impl<T: ?Sized> From<&SharedHandle<T>> for WeakHandle<T> {
    fn from(shared: &SharedHandle<T>) -> Self {
        match shared.parts() {
            // SAFETY: The strong handle keeps the block alive
            Some((owner, view)) => unsafe { Self::observe(owner, view, shared.owns_view()) },
            None => Self::empty(),
        }
    }
}

impl<T: ?Sized> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        match self.parts() {
            // SAFETY: This handle keeps the block alive
            Some((owner, view)) => unsafe { Self::observe(owner, view, self.owns_view) },
            None => Self::empty(),
        }
    }

    /// Observes `source`'s value
    ///
    /// If both handles already belong to the same ownership group then only the view is
    /// copied, the counts are left unchanged.
    fn clone_from(&mut self, source: &Self) {
        if self.owner == source.owner {
            self.view = source.view;
            self.owns_view = source.owns_view;
        } else {
            *self = source.clone();
        }
    }
}

impl<T: ?Sized> Drop for WeakHandle<T> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized> Default for WeakHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owner.is_none() {
            f.write_str("WeakHandle(<empty>)")
        } else if self.expired() {
            f.write_str("WeakHandle(<expired>)")
        } else {
            f.debug_struct("WeakHandle")
                .field("use_count", &self.use_count())
                .field("weak_count", &self.weak_count())
                .finish()
        }
    }
}
