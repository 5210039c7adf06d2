//! An exclusively owning handle with a pluggable deleter
//!
//! [UniqueHandle] owns a value through a pointer, and hands the pointer to its [Deleter] when the
//! handle is reset or dropped. The [DefaultDeleter] frees values that were allocated with [Box],
//! including boxed slices.
//!
//! Deleters without state take up no space, so a `UniqueHandle<T>` is the size of a pointer.
//!
//! ## Example
//!
//! ```
//! use ptrkit_unique::UniqueHandle;
//!
//! let mut handle = UniqueHandle::new(String::from("hello"));
//! handle.push_str(", world");
//! assert_eq!(*handle, "hello, world");
//!
//! handle.reset();
//! assert!(!handle.is_some());
//! ```

#![warn(missing_docs)]

mod deleter;
mod unique;

pub use crate::{
    deleter::{DefaultDeleter, Deleter},
    unique::UniqueHandle,
};
