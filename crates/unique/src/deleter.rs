use std::ptr::NonNull;

/// Disposes of the values owned by a [UniqueHandle](crate::UniqueHandle)
///
/// Any `FnMut(NonNull<T>)` closure can be used as a deleter.
pub trait Deleter<T: ?Sized> {
    /// Disposes of the value
    ///
    /// # Safety
    ///
    /// `value` must be a pointer that the deleter is able to dispose of, and it must not be used
    /// again after this call.
    unsafe fn delete(&mut self, value: NonNull<T>);
}

/// The default deleter, which frees values that were allocated with [Box]
///
/// Both single values and slices are supported, the pointer's metadata determines how many
/// values get dropped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DefaultDeleter;

impl<T: ?Sized> Deleter<T> for DefaultDeleter {
    unsafe fn delete(&mut self, value: NonNull<T>) {
        // SAFETY: The caller guarantees that the value was allocated by `Box`
        drop(unsafe { Box::from_raw(value.as_ptr()) });
    }
}

impl<T, F> Deleter<T> for F
where
    T: ?Sized,
    F: FnMut(NonNull<T>),
{
    unsafe fn delete(&mut self, value: NonNull<T>) {
        self(value)
    }
}
