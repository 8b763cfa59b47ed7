//! Typed scalar values.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type tag of a stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ValueType {
    /// UTF-8 string.
    String = 0,
    /// 64-bit signed integer.
    Integer = 1,
    /// 32-bit float.
    Float = 2,
    /// Raw bytes.
    ByteArray = 3,
    /// Boolean.
    Boolean = 4,
    /// 64-bit float.
    Double = 5,
}

impl ValueType {
    /// Returns the tag byte written in front of the payload.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Resolves a tag byte.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::String),
            1 => Some(Self::Integer),
            2 => Some(Self::Float),
            3 => Some(Self::ByteArray),
            4 => Some(Self::Boolean),
            5 => Some(Self::Double),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::ByteArray => "byte array",
            Self::Boolean => "boolean",
            Self::Double => "double",
        };
        f.write_str(name)
    }
}

/// A typed scalar value as stored in an entry.
///
/// `PartialEq` compares floating point payloads with IEEE semantics, so a
/// stored `NaN` never equals itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    /// UTF-8 string.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Boolean.
    Boolean(bool),
    /// Raw bytes.
    ByteArray(Vec<u8>),
}

/// Largest magnitude an `f64` holds without losing integer precision.
const MAX_EXACT_F64_INT: i64 = 1 << 53;

impl TypedValue {
    /// Returns the type tag of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
            Self::Boolean(_) => ValueType::Boolean,
            Self::ByteArray(_) => ValueType::ByteArray,
        }
    }

    /// Returns the length of the encoded form (tag included).
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Self::String(s) => s.len(),
            Self::Integer(_) | Self::Double(_) => 8,
            Self::Float(_) => 4,
            Self::Boolean(_) => 1,
            Self::ByteArray(b) => b.len(),
        }
    }

    /// Converts this value into `expected`, allowing only lossless widening.
    ///
    /// Accepted widenings are `Float -> Double` and `Integer -> Double`
    /// when the integer is exactly representable.
    #[must_use]
    pub fn coerce_to(&self, expected: ValueType) -> Option<Self> {
        if self.value_type() == expected {
            return Some(self.clone());
        }
        match (self, expected) {
            (Self::Float(f), ValueType::Double) => Some(Self::Double(f64::from(*f))),
            #[allow(clippy::cast_precision_loss)]
            (Self::Integer(i), ValueType::Double)
                if (-MAX_EXACT_F64_INT..=MAX_EXACT_F64_INT).contains(i) =>
            {
                Some(Self::Double(*i as f64))
            }
            _ => None,
        }
    }

    /// Returns the string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a numeric view of this value.
    ///
    /// Integers, floats and doubles are widened to `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(f64::from(*f)),
            Self::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the boolean payload, if this is a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the byte payload, if this is a byte array.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::ByteArray(b) => Some(b),
            _ => None,
        }
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for TypedValue {
    fn from(i: i64) -> Self {
        Self::Integer(i)
    }
}

impl From<i32> for TypedValue {
    fn from(i: i32) -> Self {
        Self::Integer(i64::from(i))
    }
}

impl From<f32> for TypedValue {
    fn from(f: f32) -> Self {
        Self::Float(f)
    }
}

impl From<f64> for TypedValue {
    fn from(d: f64) -> Self {
        Self::Double(d)
    }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Vec<u8>> for TypedValue {
    fn from(b: Vec<u8>) -> Self {
        Self::ByteArray(b)
    }
}

impl From<&[u8]> for TypedValue {
    fn from(b: &[u8]) -> Self {
        Self::ByteArray(b.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_stable() {
        for tag in 0..=5u8 {
            assert_eq!(ValueType::from_tag(tag).unwrap().tag(), tag);
        }
        assert_eq!(ValueType::from_tag(6), None);
    }

    #[test]
    fn widening_coercions() {
        assert_eq!(
            TypedValue::Float(0.5).coerce_to(ValueType::Double),
            Some(TypedValue::Double(0.5))
        );
        assert_eq!(
            TypedValue::Integer(-7).coerce_to(ValueType::Double),
            Some(TypedValue::Double(-7.0))
        );
        assert_eq!(TypedValue::Integer(i64::MAX).coerce_to(ValueType::Double), None);
        assert_eq!(TypedValue::Double(1.0).coerce_to(ValueType::Integer), None);
        assert_eq!(TypedValue::Boolean(true).coerce_to(ValueType::String), None);
    }

    #[test]
    fn nan_is_not_equal_to_itself() {
        assert_ne!(TypedValue::Double(f64::NAN), TypedValue::Double(f64::NAN));
    }

    #[test]
    fn encoded_len_matches_payload() {
        assert_eq!(TypedValue::from("abc").encoded_len(), 4);
        assert_eq!(TypedValue::from(1i64).encoded_len(), 9);
        assert_eq!(TypedValue::from(1.0f32).encoded_len(), 5);
        assert_eq!(TypedValue::from(true).encoded_len(), 2);
    }
}
