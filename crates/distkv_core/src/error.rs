//! Error types for the distkv core.

use distkv_codec::CodecError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Numeric error codes surfaced to external callers.
pub mod codes {
    /// Malformed or missing arguments.
    pub const INVALID_ARGUMENT: i32 = 401;
    /// Capability not supported.
    pub const NOT_SUPPORTED: i32 = 801;
    /// Generic store failure.
    pub const STORE_ERROR: i32 = 15_100_000;
    /// A fixed resource bound was exceeded.
    pub const OVER_MAX_LIMITS: i32 = 15_100_001;
    /// Store reopened with conflicting options.
    pub const OPTIONS_MISMATCH: i32 = 15_100_002;
    /// Stored or supplied data is corrupted.
    pub const CORRUPTED: i32 = 15_100_003;
    /// Key or store not found.
    pub const NOT_FOUND: i32 = 15_100_004;
    /// Store or result set already closed.
    pub const ALREADY_CLOSED: i32 = 15_100_005;
}

/// Errors that can occur in store, query and manager operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Wrong arity, wrong type or otherwise malformed argument.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },

    /// Key absent in the addressed scope.
    #[error("key not found: {key}")]
    NotFound {
        /// The key that was looked up.
        key: String,
    },

    /// Unknown store identity or device scope.
    #[error("store not found: {store_id}")]
    StoreNotFound {
        /// The store id that was looked up.
        store_id: String,
    },

    /// The store handle has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// The result set has been closed.
    #[error("result set is closed")]
    ResultSetClosed,

    /// Too many data change subscriptions on one store.
    #[error("subscription limit exceeded: at most {limit} data change observers")]
    SubscriptionLimitExceeded {
        /// The bound that was hit.
        limit: usize,
    },

    /// A size or count bound was exceeded.
    #[error("over limit: {message}")]
    OverLimit {
        /// Which bound was exceeded.
        message: String,
    },

    /// Retrieval type disagrees with the stored type.
    #[error("type mismatch: {message}")]
    TypeMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A store was reopened with options conflicting with the open instance.
    #[error("options mismatch: {message}")]
    OptionsMismatch {
        /// Which option conflicted.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// Requested capability is not supported.
    #[error("unsupported: {message}")]
    Unsupported {
        /// What was requested.
        message: String,
    },

    /// Backup data could not be produced or read.
    #[error("backup error: {message}")]
    Backup {
        /// Description of the failure.
        message: String,
    },

    /// Value codec error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

impl CoreError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a not found error for a key.
    pub fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Creates a store not found error.
    pub fn store_not_found(store_id: impl Into<String>) -> Self {
        Self::StoreNotFound {
            store_id: store_id.into(),
        }
    }

    /// Creates an over limit error.
    pub fn over_limit(message: impl Into<String>) -> Self {
        Self::OverLimit {
            message: message.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::TypeMismatch {
            message: message.into(),
        }
    }

    /// Creates an options mismatch error.
    pub fn options_mismatch(message: impl Into<String>) -> Self {
        Self::OptionsMismatch {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an unsupported error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Creates a backup error.
    pub fn backup(message: impl Into<String>) -> Self {
        Self::Backup {
            message: message.into(),
        }
    }

    /// Returns the numeric code reported to external callers.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::InvalidArgument { .. } | Self::TypeMismatch { .. } => codes::INVALID_ARGUMENT,
            Self::Unsupported { .. } => codes::NOT_SUPPORTED,
            Self::InvalidOperation { .. } => codes::STORE_ERROR,
            Self::OverLimit { .. } | Self::SubscriptionLimitExceeded { .. } => {
                codes::OVER_MAX_LIMITS
            }
            Self::OptionsMismatch { .. } => codes::OPTIONS_MISMATCH,
            Self::Backup { .. } => codes::CORRUPTED,
            Self::NotFound { .. } | Self::StoreNotFound { .. } => codes::NOT_FOUND,
            Self::StoreClosed | Self::ResultSetClosed => codes::ALREADY_CLOSED,
            Self::Codec(err) => match err {
                CodecError::ValueTooLarge { .. } => codes::OVER_MAX_LIMITS,
                CodecError::InvalidKey { .. } | CodecError::TypeMismatch { .. } => {
                    codes::INVALID_ARGUMENT
                }
                _ => codes::CORRUPTED,
            },
        }
    }

    /// Returns true if this is an invalid argument error, including rejected keys.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::Codec(CodecError::InvalidKey { .. })
        )
    }

    /// Returns true if a value was read as a type it does not hold.
    #[must_use]
    pub fn is_type_mismatch(&self) -> bool {
        matches!(
            self,
            Self::TypeMismatch { .. } | Self::Codec(CodecError::TypeMismatch { .. })
        )
    }

    /// Returns true if a size or count bound was exceeded.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        matches!(self, Self::OverLimit { .. }) || matches!(self, Self::Codec(e) if e.is_over_limit())
    }
}
