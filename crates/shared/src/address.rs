use std::{
    fmt,
    hash::{Hash, Hasher},
    ptr,
};

/// A wrapper for comparing and hashing pointer addresses
///
/// Only the address is kept, any pointer metadata (slice lengths, vtables) is discarded so that
/// views of the same location compare equal regardless of their type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Address(*const u8);

impl Address {
    /// The address of an empty handle
    pub const fn null() -> Self {
        Self(ptr::null())
    }

    /// Returns true if this is the address of an empty handle
    pub fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Returns the address as a raw pointer
    pub fn as_ptr(self) -> *const u8 {
        self.0
    }
}

impl<T: ?Sized> From<*const T> for Address {
    fn from(pointer: *const T) -> Self {
        Self(pointer as *const u8)
    }
}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.addr());
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Pointer::fmt(&self.0, f)
    }
}
