//! Error types for the codec crate.

use crate::value::ValueType;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding, decoding or validating values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The blob does not follow the tagged value layout.
    #[error("malformed value: {message}")]
    Malformed {
        /// Description of the problem.
        message: String,
    },

    /// The leading tag byte is not a known value type.
    #[error("unknown value tag: {tag}")]
    UnknownTag {
        /// The tag byte that was read.
        tag: u8,
    },

    /// Unexpected end of input.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Invalid UTF-8 in a string payload.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// The stored type differs from the requested one.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// The type the caller asked for.
        expected: ValueType,
        /// The type actually stored.
        actual: ValueType,
    },

    /// The encoded value exceeds the maximum value size.
    #[error("value too large: {size} bytes (limit {limit})")]
    ValueTooLarge {
        /// Encoded size in bytes.
        size: usize,
        /// Maximum permitted size.
        limit: usize,
    },

    /// The key is empty or exceeds the maximum key size.
    #[error("invalid key: {message}")]
    InvalidKey {
        /// Why the key was rejected.
        message: String,
    },
}

impl CodecError {
    /// Creates a malformed value error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed {
            message: message.into(),
        }
    }

    /// Creates an invalid key error.
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a size bound being exceeded.
    #[must_use]
    pub fn is_over_limit(&self) -> bool {
        matches!(self, Self::ValueTooLarge { .. })
    }
}
