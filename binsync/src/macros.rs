//! Utility macros for error handling.
//!
//! These macros reduce the boilerplate of creating and returning
//! [`crate::error::SyncError`] values with consistent formatting.

/// Creates a [`crate::error::SyncError`] from an error kind and description.
///
/// An optional third argument attaches dynamic detail to the error.
///
/// # Examples
/// ```rust
/// use binsync::error::ErrorKind;
/// use binsync::sync_error;
///
/// let error = sync_error!(ErrorKind::InvalidState, "buffer layout mismatch");
/// let detailed = sync_error!(
///     ErrorKind::UnsupportedType,
///     "unsupported field type",
///     format!("{} -> {}", "bytes", "Int32")
/// );
/// ```
#[macro_export]
macro_rules! sync_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::SyncError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::SyncError::from(($kind, $desc, $detail.to_string()))
    };
}

/// Creates and returns a [`crate::error::SyncError`] from the current
/// function.
///
/// # Examples
/// ```rust
/// use binsync::bail;
/// use binsync::error::{ErrorKind, SyncResult};
///
/// fn ensure_even(value: usize) -> SyncResult<usize> {
///     if value % 2 != 0 {
///         bail!(ErrorKind::InvalidState, "value must be even");
///     }
///     Ok(value)
/// }
/// ```
#[macro_export]
macro_rules! bail {
    ($kind:expr, $desc:expr) => {
        return Err($crate::sync_error!($kind, $desc))
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        return Err($crate::sync_error!($kind, $desc, $detail))
    };
}
