//! # distkv Codec
//!
//! Typed scalar values and their tagged binary encoding.
//!
//! Every stored value carries a one-byte type tag followed by its payload in
//! big-endian order:
//!
//! | tag | type        | payload                 |
//! |-----|-------------|-------------------------|
//! | 0   | `String`    | UTF-8 bytes             |
//! | 1   | `Integer`   | 8 bytes, two's complement |
//! | 2   | `Float`     | 4 bytes, IEEE 754       |
//! | 3   | `ByteArray` | raw bytes               |
//! | 4   | `Boolean`   | 1 byte, 0 or 1          |
//! | 5   | `Double`    | 8 bytes, IEEE 754       |
//!
//! ## Usage
//!
//! ```
//! use distkv_codec::{decode, decode_as, encode, TypedValue, ValueType};
//!
//! let bytes = encode(&TypedValue::Integer(42)).unwrap();
//! assert_eq!(decode(&bytes).unwrap(), TypedValue::Integer(42));
//!
//! // Lossless widening is the only coercion allowed.
//! assert_eq!(
//!     decode_as(&bytes, ValueType::Double).unwrap(),
//!     TypedValue::Double(42.0)
//! );
//! assert!(decode_as(&bytes, ValueType::String).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{decode, decode_as};
pub use encoder::{encode, encode_into, validate_value};
pub use error::{CodecError, CodecResult};
pub use value::{TypedValue, ValueType};

/// Maximum length of a key in bytes.
pub const MAX_KEY_LENGTH: usize = 1024;

/// Maximum size of an encoded value in bytes (tag included).
pub const MAX_VALUE_LENGTH: usize = 4 * 1024 * 1024;

/// Checks that a key is non-empty and within [`MAX_KEY_LENGTH`].
pub fn validate_key(key: &str) -> CodecResult<()> {
    if key.is_empty() {
        return Err(CodecError::invalid_key("key must not be empty"));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CodecError::invalid_key(format!(
            "key is {} bytes, limit is {MAX_KEY_LENGTH}",
            key.len()
        )));
    }
    Ok(())
}
