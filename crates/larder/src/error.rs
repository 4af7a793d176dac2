//! Error types for the caching facade.

use std::time::Duration;

use larder_store::StoreError;

/// Errors that can occur in the caching facade.
///
/// Backend failures arrive as [`CacheError::Store`] and propagate unchanged;
/// the facade never catches or retries them. The configuration variants are
/// fatal wiring mistakes surfaced at the composition root.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// A named store is missing from the manager configuration.
    #[error("Cache store [{name}] is not defined")]
    UnknownStore {
        /// The store name that was requested.
        name: String,
    },

    /// A configured backend kind has no registered factory.
    #[error("Cache backend kind [{kind}] is not registered")]
    UnknownKind {
        /// The backend kind named by the configuration.
        kind: String,
    },

    /// A factory registration was rejected.
    #[error("Invalid factory registration: {message}")]
    InvalidRegistration {
        /// Why the registration was rejected.
        message: String,
    },

    /// A blocking lock acquisition ran out of time.
    #[error("Could not acquire cache lock [{name}] within {} seconds", .timeout.as_secs_f64())]
    LockTimeout {
        /// The lock that could not be acquired.
        name: String,
        /// How long the acquisition was allowed to wait.
        timeout: Duration,
    },

    /// A backend operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Creates a new `UnknownStore` error.
    #[must_use]
    pub fn unknown_store(name: impl Into<String>) -> Self {
        Self::UnknownStore { name: name.into() }
    }

    /// Creates a new `UnknownKind` error.
    #[must_use]
    pub fn unknown_kind(kind: impl Into<String>) -> Self {
        Self::UnknownKind { kind: kind.into() }
    }

    /// Creates a new `InvalidRegistration` error.
    #[must_use]
    pub fn invalid_registration(message: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            message: message.into(),
        }
    }

    /// Creates a new `LockTimeout` error.
    #[must_use]
    pub fn lock_timeout(name: impl Into<String>, timeout: Duration) -> Self {
        Self::LockTimeout {
            name: name.into(),
            timeout,
        }
    }

    /// Returns `true` if this is a lock timeout error.
    #[must_use]
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }

    /// Returns `true` for the configuration variants (unknown store/kind,
    /// rejected registration).
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownStore { .. } | Self::UnknownKind { .. } | Self::InvalidRegistration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::unknown_store("sessions");
        assert_eq!(err.to_string(), "Cache store [sessions] is not defined");

        let err = CacheError::unknown_kind("redis");
        assert_eq!(
            err.to_string(),
            "Cache backend kind [redis] is not registered"
        );

        let err = CacheError::lock_timeout("reports", Duration::from_secs(1));
        assert_eq!(
            err.to_string(),
            "Could not acquire cache lock [reports] within 1 seconds"
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(CacheError::lock_timeout("n", Duration::from_secs(1)).is_lock_timeout());
        assert!(CacheError::unknown_store("n").is_configuration());
        assert!(CacheError::unknown_kind("k").is_configuration());
        assert!(CacheError::invalid_registration("blank").is_configuration());
        assert!(!CacheError::lock_timeout("n", Duration::ZERO).is_configuration());
    }

    #[test]
    fn test_store_errors_pass_through() {
        let err = CacheError::from(StoreError::unavailable("connection refused"));
        assert_eq!(err.to_string(), "Backend unavailable: connection refused");
        assert!(!err.is_configuration());
    }
}
