use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{Deref, DerefMut, Index, IndexMut},
    ptr::{self, NonNull},
    slice::SliceIndex,
};

use crate::{DefaultDeleter, Deleter};

/// A handle with exclusive ownership of a value
///
/// The value is passed to the handle's deleter when the handle is dropped or reset. By default
/// the value is expected to have been allocated with [Box], see [UniqueHandle::with_deleter] for
/// taking ownership of values that need to be disposed of in some other way.
///
/// A handle can be empty, e.g. after [UniqueHandle::release] has been called.
pub struct UniqueHandle<T: ?Sized, D: Deleter<T> = DefaultDeleter> {
    value: Option<NonNull<T>>,
    deleter: D,
    _marker: PhantomData<T>,
}

impl<T> UniqueHandle<T> {
    /// Moves the value into a new allocation owned by the handle
    pub fn new(value: T) -> Self {
        Self::from_box(Box::new(value))
    }
}

impl<T: ?Sized> UniqueHandle<T> {
    /// Takes ownership of a boxed value
    pub fn from_box(value: Box<T>) -> Self {
        Self::with_deleter(value, DefaultDeleter)
    }

    /// Gives up ownership of the value, returning it as a [Box]
    ///
    /// None is returned if the handle is empty.
    pub fn into_box(mut self) -> Option<Box<T>> {
        self.release()
            // SAFETY: Values owned with the default deleter were allocated with `Box`
            .map(|value| unsafe { Box::from_raw(value.as_ptr()) })
    }
}

impl<T: ?Sized, D: Deleter<T>> UniqueHandle<T, D> {
    /// Takes ownership of a boxed value, which will be disposed of by the provided deleter
    ///
    /// The deleter receives the pointer that was produced by `Box::into_raw`.
    pub fn with_deleter(value: Box<T>, deleter: D) -> Self {
        Self {
            value: Some(NonNull::from(Box::leak(value))),
            deleter,
            _marker: PhantomData,
        }
    }

    /// Returns an empty handle
    pub fn empty() -> Self
    where
        D: Default,
    {
        Self {
            value: None,
            deleter: D::default(),
            _marker: PhantomData,
        }
    }

    /// Takes ownership of a value from a raw pointer
    ///
    /// An empty handle is returned if the pointer is null.
    ///
    /// # Safety
    ///
    /// The pointer must be valid for reads and writes until it's passed to the deleter, and it
    /// must be a pointer that the deleter is able to dispose of. Nothing else may own the value.
    pub unsafe fn from_raw(value: *mut T) -> Self
    where
        D: Default,
    {
        // SAFETY: See the function's safety requirements
        unsafe { Self::from_raw_with_deleter(value, D::default()) }
    }

    /// Takes ownership of a value from a raw pointer, along with the deleter to dispose of it
    ///
    /// An empty handle is returned if the pointer is null.
    ///
    /// # Safety
    ///
    /// See [UniqueHandle::from_raw].
    pub unsafe fn from_raw_with_deleter(value: *mut T, deleter: D) -> Self {
        Self {
            value: NonNull::new(value),
            deleter,
            _marker: PhantomData,
        }
    }

    /// Gives up ownership of the value without disposing of it, leaving the handle empty
    ///
    /// The caller becomes responsible for the returned value.
    #[must_use = "the released value is leaked if it isn't used"]
    pub fn release(&mut self) -> Option<NonNull<T>> {
        self.value.take()
    }

    /// Disposes of the value, leaving the handle empty
    pub fn reset(&mut self) {
        if let Some(value) = self.value.take() {
            // SAFETY: The handle owned the value, and no longer refers to it
            unsafe { self.deleter.delete(value) };
        }
    }

    /// Replaces the value with one from a raw pointer, disposing of the previous value
    ///
    /// Nothing happens if the pointer refers to the value that the handle already owns.
    ///
    /// # Safety
    ///
    /// See [UniqueHandle::from_raw].
    pub unsafe fn reset_raw(&mut self, value: *mut T) {
        let unchanged = match self.value {
            Some(current) => ptr::addr_eq(current.as_ptr().cast_const(), value.cast_const()),
            None => value.is_null(),
        };
        if unchanged {
            return;
        }

        // The new value is in place before the deleter runs
        if let Some(previous) = mem::replace(&mut self.value, NonNull::new(value)) {
            // SAFETY: The handle owned the previous value, and no longer refers to it
            unsafe { self.deleter.delete(previous) };
        }
    }

    /// Exchanges the values and deleters of two handles
    pub fn swap(&mut self, other: &mut Self) {
        mem::swap(self, other);
    }

    /// Returns true if the handle owns a value
    pub fn is_some(&self) -> bool {
        self.value.is_some()
    }

    /// Returns a reference to the value, or None if the handle is empty
    pub fn get(&self) -> Option<&T> {
        // SAFETY: The value is owned by the handle
        self.value.map(|value| unsafe { value.as_ref() })
    }

    /// Returns a mutable reference to the value, or None if the handle is empty
    pub fn get_mut(&mut self) -> Option<&mut T> {
        // SAFETY: The value is exclusively owned by the handle
        self.value.map(|mut value| unsafe { value.as_mut() })
    }

    /// Returns a pointer to the value without giving up ownership
    pub fn as_ptr(&self) -> Option<NonNull<T>> {
        self.value
    }

    /// Returns a reference to the handle's deleter
    pub fn deleter(&self) -> &D {
        &self.deleter
    }

    /// Returns a mutable reference to the handle's deleter
    pub fn deleter_mut(&mut self) -> &mut D {
        &mut self.deleter
    }
}

// SAFETY: The handle owns its value exclusively, like `Box`
unsafe impl<T: ?Sized + Send, D: Deleter<T> + Send> Send for UniqueHandle<T, D> {}
// SAFETY: Shared access to the handle only gives shared access to the value and deleter
unsafe impl<T: ?Sized + Sync, D: Deleter<T> + Sync> Sync for UniqueHandle<T, D> {}

impl<T: ?Sized, D: Deleter<T>> Drop for UniqueHandle<T, D> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T: ?Sized, D: Deleter<T> + Default> Default for UniqueHandle<T, D> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ?Sized, D: Deleter<T>> Deref for UniqueHandle<T, D> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is empty.
    #[track_caller]
    fn deref(&self) -> &T {
        match self.get() {
            Some(value) => value,
            None => panic!("attempted to dereference an empty UniqueHandle"),
        }
    }
}

impl<T: ?Sized, D: Deleter<T>> DerefMut for UniqueHandle<T, D> {
    #[track_caller]
    fn deref_mut(&mut self) -> &mut T {
        match self.get_mut() {
            Some(value) => value,
            None => panic!("attempted to dereference an empty UniqueHandle"),
        }
    }
}

impl<T, D, I> Index<I> for UniqueHandle<[T], D>
where
    D: Deleter<[T]>,
    I: SliceIndex<[T]>,
{
    type Output = I::Output;

    #[track_caller]
    fn index(&self, index: I) -> &I::Output {
        &(**self)[index]
    }
}

impl<T, D, I> IndexMut<I> for UniqueHandle<[T], D>
where
    D: Deleter<[T]>,
    I: SliceIndex<[T]>,
{
    #[track_caller]
    fn index_mut(&mut self, index: I) -> &mut I::Output {
        &mut (**self)[index]
    }
}

impl<T> From<T> for UniqueHandle<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: ?Sized> From<Box<T>> for UniqueHandle<T> {
    fn from(value: Box<T>) -> Self {
        Self::from_box(value)
    }
}

impl<T> From<Vec<T>> for UniqueHandle<[T]> {
    fn from(values: Vec<T>) -> Self {
        Self::from_box(values.into_boxed_slice())
    }
}

impl<T: ?Sized + fmt::Debug, D: Deleter<T>> fmt::Debug for UniqueHandle<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(value) => f.debug_tuple("UniqueHandle").field(&value).finish(),
            None => f.write_str("UniqueHandle(<empty>)"),
        }
    }
}
