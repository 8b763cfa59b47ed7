//! Tagged value decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{TypedValue, ValueType};
use bytes::Buf;

/// Decodes a tagged value blob.
///
/// # Errors
///
/// Returns `UnexpectedEof` for an empty or truncated blob, `UnknownTag` for
/// an unrecognised tag and `Malformed` when a fixed-width payload carries
/// trailing bytes.
pub fn decode(raw: &[u8]) -> CodecResult<TypedValue> {
    let mut buf = raw;
    if !buf.has_remaining() {
        return Err(CodecError::UnexpectedEof);
    }
    let tag = buf.get_u8();
    let value_type = ValueType::from_tag(tag).ok_or(CodecError::UnknownTag { tag })?;

    let value = match value_type {
        ValueType::String => {
            let s = std::str::from_utf8(buf).map_err(|_| CodecError::InvalidUtf8)?;
            return Ok(TypedValue::String(s.to_string()));
        }
        ValueType::ByteArray => return Ok(TypedValue::ByteArray(buf.to_vec())),
        ValueType::Integer => {
            expect_len(buf, 8)?;
            TypedValue::Integer(buf.get_i64())
        }
        ValueType::Float => {
            expect_len(buf, 4)?;
            TypedValue::Float(buf.get_f32())
        }
        ValueType::Double => {
            expect_len(buf, 8)?;
            TypedValue::Double(buf.get_f64())
        }
        ValueType::Boolean => {
            expect_len(buf, 1)?;
            match buf.get_u8() {
                0 => TypedValue::Boolean(false),
                1 => TypedValue::Boolean(true),
                other => {
                    return Err(CodecError::malformed(format!(
                        "boolean payload must be 0 or 1, got {other}"
                    )))
                }
            }
        }
    };
    Ok(value)
}

/// Decodes a blob and checks it against the expected type.
///
/// Lossless widening (`Float`/`Integer` to `Double`) is applied; any other
/// disagreement is a `TypeMismatch`.
pub fn decode_as(raw: &[u8], expected: ValueType) -> CodecResult<TypedValue> {
    let value = decode(raw)?;
    let actual = value.value_type();
    value
        .coerce_to(expected)
        .ok_or(CodecError::TypeMismatch { expected, actual })
}

fn expect_len(buf: &[u8], len: usize) -> CodecResult<()> {
    match buf.len() {
        n if n < len => Err(CodecError::UnexpectedEof),
        n if n > len => Err(CodecError::malformed(format!(
            "expected {len} payload bytes, found {n}"
        ))),
        _ => Ok(()),
    }
}
