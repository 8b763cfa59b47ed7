//! Tagged value encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::TypedValue;
use crate::MAX_VALUE_LENGTH;
use bytes::BufMut;

/// Checks that a value fits within [`MAX_VALUE_LENGTH`] once encoded.
pub fn validate_value(value: &TypedValue) -> CodecResult<()> {
    let size = value.encoded_len();
    if size > MAX_VALUE_LENGTH {
        return Err(CodecError::ValueTooLarge {
            size,
            limit: MAX_VALUE_LENGTH,
        });
    }
    Ok(())
}

/// Encodes a value into a fresh buffer.
///
/// # Errors
///
/// Returns `ValueTooLarge` if the encoded form would exceed
/// [`MAX_VALUE_LENGTH`]. Values are never truncated.
pub fn encode(value: &TypedValue) -> CodecResult<Vec<u8>> {
    validate_value(value)?;
    let mut buf = Vec::with_capacity(value.encoded_len());
    encode_into(value, &mut buf);
    Ok(buf)
}

/// Appends the encoded form of `value` to `buf` without size checks.
pub fn encode_into<B: BufMut>(value: &TypedValue, buf: &mut B) {
    buf.put_u8(value.value_type().tag());
    match value {
        TypedValue::String(s) => buf.put_slice(s.as_bytes()),
        TypedValue::Integer(i) => buf.put_i64(*i),
        TypedValue::Float(f) => buf.put_f32(*f),
        TypedValue::Double(d) => buf.put_f64(*d),
        TypedValue::Boolean(b) => buf.put_u8(u8::from(*b)),
        TypedValue::ByteArray(b) => buf.put_slice(b),
    }
}
