//! Shared ownership handles for values in allocated memory
//!
//! A [SharedHandle] owns a value jointly with its clones, and a [WeakHandle] observes the value
//! without keeping it alive. Both refer to a control block that holds the strong and weak counts
//! for one ownership group:
//!
//! - when the strong count reaches zero the value is dropped,
//! - when the weak count then also reaches zero the control block itself is freed.
//!
//! Values can be placed under shared ownership in two ways. [make_shared] (or
//! [SharedHandle::new]) stores the value inside the control block, so a single allocation holds
//! both. [SharedHandle::from_box] adopts an existing allocation and allocates a separate control
//! block for it.
//!
//! The counts are plain integers and the handles are neither `Send` nor `Sync`: the handles are
//! designed for single-threaded ownership.
//!
//! ## Example
//!
//! ```
//! use ptrkit_shared::{SharedHandle, WeakHandle, make_shared};
//!
//! let h1 = make_shared(42);
//! let h2 = h1.clone();
//! assert_eq!(SharedHandle::use_count(&h1), 2);
//!
//! let weak = WeakHandle::from(&h1);
//! assert!(!weak.expired());
//!
//! drop(h1);
//! drop(h2);
//! assert!(weak.expired());
//! assert!(!SharedHandle::is_some(&weak.lock()));
//! ```

#![warn(missing_docs)]

macro_rules! lifecycle_trace {
    ($($arg:tt)+) => {
        #[cfg(feature = "lifecycle-logging")]
        log::trace!(target: "ptrkit::lifecycle", $($arg)+);
    };
}

mod address;
mod control_block;
mod error;
mod self_sharing;
mod shared;
mod weak;

pub use crate::{
    address::Address,
    error::{Error, Result},
    self_sharing::{SelfSharing, SharesSelf},
    shared::{SharedHandle, make_shared},
    weak::WeakHandle,
};
