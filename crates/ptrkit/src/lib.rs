//! # ptrkit
//!
//! Ownership handles for values in allocated memory.
//!
//! - [SharedHandle] and [WeakHandle] share a value between owners, counting strong and weak
//!   references in a control block. [make_shared] stores the value in the control block itself.
//! - [SharesSelf] lets a value produce handles to itself from `&self`.
//! - `UniqueHandle` owns a value exclusively and disposes of it with a pluggable deleter.
//!   It's available when the `unique` feature is enabled.
//!
//! ## Example
//!
//! ```
//! use ptrkit::prelude::*;
//!
//! let shared = make_shared(vec![1, 2, 3]);
//! let weak = SharedHandle::downgrade(&shared);
//! let second = SharedHandle::alias(&shared, |values| &values[1]);
//!
//! drop(shared);
//! assert_eq!(*second, 2);
//! assert!(!weak.expired());
//!
//! drop(second);
//! assert!(weak.expired());
//! ```

#![warn(missing_docs)]

pub mod prelude;

pub use ptrkit_shared::{
    Address, Error, Result, SelfSharing, SharedHandle, SharesSelf, WeakHandle, make_shared,
};

#[cfg(feature = "unique")]
pub use ptrkit_unique::{DefaultDeleter, Deleter, UniqueHandle};
