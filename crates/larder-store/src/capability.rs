//! Capability signalling for optional store operations.

/// Outcome of an optional [`Store`](crate::Store) operation.
///
/// Backends advertise optional operations through their return value instead
/// of being probed for method presence: a backend that can execute the
/// operation natively returns [`Capability::Supported`] carrying the result,
/// while a backend without a native implementation returns
/// [`Capability::Unsupported`] and the caller selects a fallback composed
/// from the required primitives.
///
/// `Unsupported` is a signal, not a failure; genuine failures use
/// [`StoreError`](crate::StoreError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability<T> {
    /// The backend executed the operation natively.
    Supported(T),
    /// The backend has no native implementation for this operation.
    Unsupported,
}

impl<T> Capability<T> {
    /// Returns `true` if the operation was executed natively.
    #[must_use]
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::Supported(_))
    }

    /// Converts into an `Option`, discarding the unsupported marker.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Supported(value) => Some(value),
            Self::Unsupported => None,
        }
    }
}
