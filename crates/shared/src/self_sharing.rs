use std::{cell::RefCell, fmt, ptr};

use crate::{Error, Result, SharedHandle, WeakHandle};

/// Gives a value the ability to make shared handles to itself
///
/// Types that need handles to themselves embed a [SelfSharing] field and return it from
/// [SharesSelf::self_sharing]. The value then needs to be placed under shared ownership with
/// [SharedHandle::new_self_sharing] or [SharedHandle::from_box_self_sharing], after which
/// [SharesSelf::shared_from_this] and [SharesSelf::weak_from_this] become available.
///
/// ```
/// use ptrkit_shared::{SelfSharing, SharedHandle, SharesSelf};
///
/// #[derive(Debug, Default)]
/// struct Node {
///     this: SelfSharing<Node>,
/// }
///
/// impl SharesSelf for Node {
///     fn self_sharing(&self) -> &SelfSharing<Self> {
///         &self.this
///     }
/// }
///
/// let node = SharedHandle::new_self_sharing(Node::default());
/// let this = node.shared_from_this().unwrap();
/// assert_eq!(this, node);
/// assert_eq!(SharedHandle::use_count(&node), 2);
/// ```
pub trait SharesSelf: Sized {
    /// Returns the value's [SelfSharing] field
    fn self_sharing(&self) -> &SelfSharing<Self>;

    /// Returns a strong handle to the value
    ///
    /// [Error::NotShared] is returned if the value wasn't placed under shared ownership by one of
    /// the self-sharing constructors. [Error::Expired] is returned if the value is being dropped.
    fn shared_from_this(&self) -> Result<SharedHandle<Self>> {
        self.self_sharing().shared_from(self)
    }

    /// Returns a weak handle to the value
    ///
    /// [Error::NotShared] is returned if the value wasn't placed under shared ownership by one of
    /// the self-sharing constructors.
    fn weak_from_this(&self) -> Result<WeakHandle<Self>> {
        self.self_sharing().weak_from(self)
    }
}

/// A weak back-reference from a value to its own ownership group
///
/// The back-reference is populated when the value is placed under shared ownership by
/// [SharedHandle::new_self_sharing] or [SharedHandle::from_box_self_sharing]. It's a weak handle,
/// so it's included in the group's weak count.
///
/// Cloning a [SelfSharing] produces an unpopulated back-reference: a clone of the value is a
/// different object that isn't owned by the source value's group.
pub struct SelfSharing<T> {
    this: RefCell<WeakHandle<T>>,
}

impl<T> SelfSharing<T> {
    /// Makes an unpopulated back-reference
    pub const fn new() -> Self {
        Self {
            this: RefCell::new(WeakHandle::empty()),
        }
    }

    /// Returns true if the back-reference has been populated
    pub fn is_populated(&self) -> bool {
        self.this.borrow().parts().is_some()
    }

    /// Returns a strong handle to `this`, which should be the value containing the field
    ///
    /// See [SharesSelf::shared_from_this].
    pub fn shared_from(&self, this: &T) -> Result<SharedHandle<T>> {
        self.weak_from(this)?.upgrade()
    }

    /// Returns a weak handle to `this`, which should be the value containing the field
    ///
    /// See [SharesSelf::weak_from_this].
    pub fn weak_from(&self, this: &T) -> Result<WeakHandle<T>> {
        let weak = self.this.borrow();
        // The address check catches back-references that were moved to another value,
        // e.g. by swapping the contents of two uniquely owned values.
        if weak.parts().is_some() && ptr::addr_eq(weak.address().as_ptr(), this as *const T) {
            Ok(weak.clone())
        } else {
            Err(Error::NotShared)
        }
    }

    fn populate(&self, handle: &SharedHandle<T>) {
        *self.this.borrow_mut() = WeakHandle::from(handle);
    }
}

impl<T> Default for SelfSharing<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for SelfSharing<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SelfSharing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfSharing")
            .field("populated", &self.is_populated())
            .finish()
    }
}

impl<T: SharesSelf> SharedHandle<T> {
    /// Moves a self-sharing value into a new ownership group, using a single allocation
    ///
    /// The value's back-reference is populated, see [SharesSelf].
    pub fn new_self_sharing(value: T) -> Self {
        let handle = Self::new(value);
        handle.self_sharing().populate(&handle);
        handle
    }

    /// Adopts an allocated self-sharing value into a new ownership group
    ///
    /// The value's back-reference is populated, see [SharesSelf].
    pub fn from_box_self_sharing(value: Box<T>) -> Self {
        let handle = Self::from_box(value);
        handle.self_sharing().populate(&handle);
        handle
    }
}
