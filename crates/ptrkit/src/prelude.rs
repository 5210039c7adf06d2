//! A collection of useful items to make it easier to work with `ptrkit`

pub use ptrkit_shared::{SelfSharing, SharedHandle, SharesSelf, WeakHandle, make_shared};
#[cfg(feature = "unique")]
pub use ptrkit_unique::UniqueHandle;
