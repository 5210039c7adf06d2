use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    mem::{self, ManuallyDrop},
    ops::Deref,
    ptr::NonNull,
};

use crate::{
    Address, Result, WeakHandle,
    control_block::{BlockHeader, ControlBlockInline, ControlBlockPointer},
    error::Error,
};

/// Moves the value into a new shared ownership group, using a single allocation
///
/// The value is stored in the same allocation as the group's counts.
/// See [SharedHandle::from_box] for adopting a value that has already been allocated.
pub fn make_shared<T>(value: T) -> SharedHandle<T> {
    SharedHandle::new(value)
}

/// A strong handle to a value with shared ownership
///
/// Cloning the handle increments the strong count of the value's ownership group, and dropping
/// it decrements the count again. The value is dropped when the last strong handle is dropped.
///
/// A handle is made up of two parts: the group's control block, which determines what the handle
/// keeps alive, and the view, which is the value exposed by [Deref]. The two can differ, see
/// [SharedHandle::alias].
///
/// Like [std::rc::Rc], operations on the handle are associated functions (e.g.
/// `SharedHandle::use_count(&handle)`) so that they don't shadow methods of the value.
pub struct SharedHandle<T: ?Sized> {
    owner: Option<NonNull<BlockHeader>>,
    view: Option<NonNull<T>>,
    // False for views made by aliasing, which may point to read-only memory
    owns_view: bool,
    _marker: PhantomData<T>,
}

impl<T> SharedHandle<T> {
    /// Moves the value into a new ownership group, using a single allocation
    pub fn new(value: T) -> Self {
        let (owner, view) = ControlBlockInline::allocate(value);
        // SAFETY: The new block's strong reference is taken by the handle
        unsafe { Self::from_parts(owner, view, true) }
    }
}

impl<T: ?Sized> SharedHandle<T> {
    /// Returns a handle that doesn't own anything
    pub const fn empty() -> Self {
        Self {
            owner: None,
            view: None,
            owns_view: false,
            _marker: PhantomData,
        }
    }

    /// Adopts an allocated value into a new ownership group
    ///
    /// A control block is allocated separately from the value.
    ///
    /// The box can contain an unsized value, which allows a value to be shared as a trait object:
    ///
    /// ```
    /// use ptrkit_shared::SharedHandle;
    /// use std::fmt::Display;
    ///
    /// let boxed: Box<dyn Display> = Box::new(99);
    /// let handle = SharedHandle::from_box(boxed);
    /// assert_eq!(handle.to_string(), "99");
    /// ```
    pub fn from_box(value: Box<T>) -> Self {
        // SAFETY: The pointer comes from `Box::into_raw`, so it's non-null and uniquely owned
        unsafe { Self::from_raw(Box::into_raw(value)) }
    }

    /// Adopts a value from a raw pointer into a new ownership group
    ///
    /// An empty handle is returned if the pointer is null.
    ///
    /// # Safety
    ///
    /// The pointer must have been produced by `Box::into_raw`, and must not be owned by anything
    /// else. In particular, adopting the same pointer twice results in the value being dropped
    /// twice.
    pub unsafe fn from_raw(value: *mut T) -> Self {
        match NonNull::new(value) {
            Some(view) => {
                // SAFETY: The caller guarantees that the value is a uniquely owned allocation
                let owner = unsafe { ControlBlockPointer::allocate(view) };
                // SAFETY: The new block's strong reference is taken by the handle
                unsafe { Self::from_parts(owner, view, true) }
            }
            None => Self::empty(),
        }
    }

    /// Takes ownership of one of the block's strong references
    ///
    /// # Safety
    ///
    /// `owner` must be a live block, and the caller must be passing one of the block's strong
    /// references to the handle. `view` must be valid for as long as the block's value is alive.
    /// `owns_view` may only be true if `view` is the block's value, with write access.
    pub(crate) unsafe fn from_parts(
        owner: NonNull<BlockHeader>,
        view: NonNull<T>,
        owns_view: bool,
    ) -> Self {
        Self {
            owner: Some(owner),
            view: Some(view),
            owns_view,
            _marker: PhantomData,
        }
    }

    /// Promotes a weak handle into a strong handle
    ///
    /// [Error::Expired] is returned if the weak handle's value has already been dropped, or if
    /// the weak handle is empty. See [WeakHandle::lock] for a version that returns an empty
    /// handle instead.
    pub fn promote(weak: &WeakHandle<T>) -> Result<Self> {
        match weak.parts() {
            Some((owner, view)) => {
                // SAFETY: The weak handle keeps the block allocated
                if unsafe { owner.as_ref() }.try_increment_strong() {
                    // SAFETY: A strong reference has just been added for the new handle
                    Ok(unsafe { Self::from_parts(owner, view, weak.owns_view()) })
                } else {
                    Err(Error::Expired)
                }
            }
            None => Err(Error::Expired),
        }
    }

    /// Makes a handle that shares ownership with `this`, but exposes a part of the value
    ///
    /// The returned handle keeps the whole of `this`'s value alive, so the exposed part remains
    /// valid after `this` has been dropped.
    ///
    /// An empty handle is returned if `this` is empty.
    ///
    /// ```
    /// use ptrkit_shared::{SharedHandle, make_shared};
    ///
    /// struct Pair {
    ///     a: String,
    ///     b: String,
    /// }
    ///
    /// let pair = make_shared(Pair { a: "a".into(), b: "b".into() });
    /// let b = SharedHandle::alias(&pair, |pair| &pair.b);
    /// assert_eq!(SharedHandle::use_count(&b), 2);
    ///
    /// drop(pair);
    /// assert_eq!(*b, "b");
    /// ```
    pub fn alias<U, F>(this: &Self, f: F) -> SharedHandle<U>
    where
        T: 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        match Self::get(this) {
            // SAFETY: The projected reference borrows from the value, so it's valid for as long
            // as the value is alive
            Some(value) => unsafe { Self::alias_raw(this, NonNull::from(f(value))) },
            None => SharedHandle::empty(),
        }
    }

    /// Makes a handle that shares ownership with `this`, but exposes an arbitrary view
    ///
    /// An empty handle is returned if `this` is empty.
    ///
    /// # Safety
    ///
    /// The view must remain valid for as long as `this`'s value is alive, and dropping the
    /// value must not invalidate anything that the view's type borrows.
    pub unsafe fn alias_raw<U: ?Sized>(this: &Self, view: NonNull<U>) -> SharedHandle<U> {
        match this.owner {
            Some(owner) => {
                // SAFETY: `this` keeps the block alive
                unsafe { owner.as_ref() }.increment_strong();
                // SAFETY: A strong reference has just been added for the new handle
                unsafe { SharedHandle::from_parts(owner, view, false) }
            }
            None => SharedHandle::empty(),
        }
    }

    /// Converts the handle into one that exposes a part of the value
    ///
    /// Unlike [SharedHandle::alias], the handle's strong reference is moved into the result, so
    /// the use count doesn't change. This allows a handle to be converted into a trait object
    /// handle:
    ///
    /// ```
    /// use ptrkit_shared::{SharedHandle, make_shared};
    /// use std::fmt::Display;
    ///
    /// fn as_display(value: &f64) -> &(dyn Display + 'static) {
    ///     value
    /// }
    ///
    /// let number = make_shared(1.5);
    /// let display: SharedHandle<dyn Display> = SharedHandle::map_view(number, as_display);
    /// assert_eq!(SharedHandle::use_count(&display), 1);
    /// assert_eq!(display.to_string(), "1.5");
    /// ```
    ///
    /// An empty handle is returned if `this` is empty.
    pub fn map_view<U, F>(this: Self, f: F) -> SharedHandle<U>
    where
        T: 'static,
        U: ?Sized,
        F: FnOnce(&T) -> &U,
    {
        let view = match Self::get(&this) {
            Some(value) => NonNull::from(f(value)),
            None => return SharedHandle::empty(),
        };

        let this = ManuallyDrop::new(this);
        match this.owner {
            // SAFETY: The strong reference of `this` is moved into the new handle, and the view
            // borrows from the value so it's valid for as long as the value is alive
            Some(owner) => unsafe { SharedHandle::from_parts(owner, view, false) },
            None => SharedHandle::empty(),
        }
    }

    /// Makes a weak handle that observes the same value as `this`
    pub fn downgrade(this: &Self) -> WeakHandle<T> {
        WeakHandle::from(this)
    }

    /// Returns true if the handle owns a value
    pub fn is_some(this: &Self) -> bool {
        this.owner.is_some() && this.view.is_some()
    }

    /// Returns a reference to the value, or None if the handle is empty
    pub fn get(this: &Self) -> Option<&T> {
        match (this.owner, this.view) {
            // SAFETY: The handle's strong reference keeps the value alive
            (Some(_), Some(view)) => Some(unsafe { view.as_ref() }),
            _ => None,
        }
    }

    /// Returns a mutable reference to the value if no other handles refer to it
    ///
    /// None is returned if there are other strong or weak handles in the ownership group,
    /// or if the handle is empty.
    ///
    /// Views made by [SharedHandle::alias], [SharedHandle::alias_raw], or
    /// [SharedHandle::map_view] are only ever shared, so None is returned for them too.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if !this.owns_view {
            return None;
        }

        match (this.owner, this.view) {
            (Some(owner), Some(mut view)) => {
                // SAFETY: The handle's strong reference keeps the block alive
                let block = unsafe { owner.as_ref() };
                if block.strong() == 1 && block.weak() == 0 {
                    // SAFETY: The handle is the only reference to the value
                    Some(unsafe { view.as_mut() })
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Returns the address of the exposed value
    ///
    /// A null address is returned for empty handles.
    pub fn address(this: &Self) -> Address {
        match this.view {
            Some(view) => view.as_ptr().cast_const().into(),
            None => Address::null(),
        }
    }

    /// Returns true if the two handles expose the same address
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &SharedHandle<U>) -> bool {
        Self::address(this) == SharedHandle::address(other)
    }

    /// Returns true if the two handles belong to the same ownership group
    ///
    /// Aliases made with [SharedHandle::alias] share ownership with their source, even though
    /// they expose a different address.
    pub fn owner_eq<U: ?Sized>(this: &Self, other: &SharedHandle<U>) -> bool {
        this.owner == other.owner
    }

    /// Returns the number of strong handles in the ownership group
    ///
    /// 0 is returned for empty handles.
    pub fn use_count(this: &Self) -> usize {
        // SAFETY: The handle's strong reference keeps the block alive
        this.owner.map_or(0, |owner| unsafe { owner.as_ref() }.strong())
    }

    /// Returns the number of weak handles in the ownership group
    ///
    /// 0 is returned for empty handles.
    pub fn weak_count(this: &Self) -> usize {
        // SAFETY: The handle's strong reference keeps the block alive
        this.owner.map_or(0, |owner| unsafe { owner.as_ref() }.weak())
    }

    /// Releases the handle's ownership, leaving it empty
    pub fn reset(this: &mut Self) {
        this.view = None;
        this.owns_view = false;
        if let Some(owner) = this.owner.take() {
            // SAFETY: The handle's strong reference is being given up
            unsafe { BlockHeader::release_strong(owner) };
        }
    }

    /// Releases the handle's ownership, and then adopts the boxed value into a new group
    pub fn reset_with(this: &mut Self, value: Box<T>) {
        Self::reset(this);
        *this = Self::from_box(value);
    }

    /// Releases the handle's ownership, and then adopts a value from a raw pointer
    ///
    /// The handle is left empty if the pointer is null.
    ///
    /// # Safety
    ///
    /// See [SharedHandle::from_raw].
    pub unsafe fn reset_raw(this: &mut Self, value: *mut T) {
        Self::reset(this);
        // SAFETY: See the function's safety requirements
        *this = unsafe { Self::from_raw(value) };
    }

    /// Exchanges the ownership and views of two handles
    pub fn swap(this: &mut Self, other: &mut Self) {
        mem::swap(this, other);
    }

    pub(crate) fn parts(&self) -> Option<(NonNull<BlockHeader>, NonNull<T>)> {
        self.owner.zip(self.view)
    }

    pub(crate) fn owns_view(&self) -> bool {
        self.owns_view
    }
}

impl<T: ?Sized> Clone for SharedHandle<T> {
    fn clone(&self) -> Self {
        match self.parts() {
            Some((owner, view)) => {
                // SAFETY: The handle keeps the block alive
                unsafe { owner.as_ref() }.increment_strong();
                // SAFETY: A strong reference has just been added for the clone
                unsafe { Self::from_parts(owner, view, self.owns_view) }
            }
            None => Self::empty(),
        }
    }

    /// Takes shared ownership of `source`'s value
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

impl<T: ?Sized> Drop for SharedHandle<T> {
    fn drop(&mut self) {
        Self::reset(self);
    }
}

impl<T: ?Sized> Default for SharedHandle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized> Deref for SharedHandle<T> {
    type Target = T;

    /// Returns a reference to the value
    ///
    /// # Panics
    ///
    /// Panics if the handle is empty, see [SharedHandle::get] for a non-panicking version.
    #[track_caller]
    fn deref(&self) -> &T {
        match Self::get(self) {
            Some(value) => value,
            None => panic!("attempted to dereference an empty SharedHandle"),
        }
    }
}

impl<T> From<T> for SharedHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for SharedHandle<T> {
    fn from(boxed: Box<T>) -> Self {
        Self::from_box(boxed)
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<SharedHandle<U>> for SharedHandle<T> {
    fn eq(&self, other: &SharedHandle<U>) -> bool {
        Self::ptr_eq(self, other)
    }
}

impl<T: ?Sized> Eq for SharedHandle<T> {}

impl<T: ?Sized> Ord for SharedHandle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        Self::address(self).cmp(&Self::address(other))
    }
}

impl<T: ?Sized> PartialOrd for SharedHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized> Hash for SharedHandle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Self::address(self).hash(state)
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => f.debug_tuple("SharedHandle").field(&value).finish(),
            None => f.write_str("SharedHandle(<empty>)"),
        }
    }
}

impl<T: ?Sized + fmt::Display> fmt::Display for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::get(self) {
            Some(value) => value.fmt(f),
            None => f.write_str("<empty>"),
        }
    }
}

impl<T: ?Sized> fmt::Pointer for SharedHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&Self::address(self).as_ptr(), f)
    }
}
