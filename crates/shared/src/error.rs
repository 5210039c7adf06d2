use thiserror::Error;

/// The errors that can be reported by shared handle operations
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// A weak handle was promoted after its value had been dropped
    #[error("the referenced value has already been dropped")]
    Expired,
    /// A self-sharing object was asked for a handle to itself, but it isn't owned by a
    /// [SharedHandle](crate::SharedHandle)
    #[error("the object isn't owned by a shared handle")]
    NotShared,
}

/// The Result type used by shared handle operations
pub type Result<T> = std::result::Result<T, Error>;
