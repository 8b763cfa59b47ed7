//! Literal values accepted by query clauses.

use crate::error::{CoreError, CoreResult};

/// A scalar literal in a comparison clause.
///
/// The variant decides the type tag written into the plan: `i32` renders as
/// `INTEGER`, `i64` as `LONG`, floating point as `DOUBLE`.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// 32-bit integer.
    Integer(i32),
    /// 64-bit integer.
    Long(i64),
    /// Floating point; `NaN` is allowed.
    Double(f64),
    /// String.
    String(String),
    /// Boolean.
    Bool(bool),
}

impl Literal {
    /// Plan type tag of this literal.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => TYPE_INTEGER,
            Self::Long(_) => TYPE_LONG,
            Self::Double(_) => TYPE_DOUBLE,
            Self::String(_) => TYPE_STRING,
            Self::Bool(_) => TYPE_BOOL,
        }
    }
}

pub(crate) const TYPE_INTEGER: &str = "INTEGER";
pub(crate) const TYPE_LONG: &str = "LONG";
pub(crate) const TYPE_DOUBLE: &str = "DOUBLE";
pub(crate) const TYPE_STRING: &str = "STRING";
pub(crate) const TYPE_BOOL: &str = "BOOL";

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Self::Integer(v)
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f32> for Literal {
    fn from(v: f32) -> Self {
        Self::Double(f64::from(v))
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Literal {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Literal {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

/// A homogeneous list literal in a membership clause.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralList {
    /// 32-bit integers.
    Integer(Vec<i32>),
    /// 64-bit integers.
    Long(Vec<i64>),
    /// Floating point values.
    Double(Vec<f64>),
    /// Strings.
    String(Vec<String>),
}

impl LiteralList {
    /// Plan type tag of the list elements.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => TYPE_INTEGER,
            Self::Long(_) => TYPE_LONG,
            Self::Double(_) => TYPE_DOUBLE,
            Self::String(_) => TYPE_STRING,
        }
    }

    /// Elements as scalar literals.
    #[must_use]
    pub fn to_literals(&self) -> Vec<Literal> {
        match self {
            Self::Integer(v) => v.iter().copied().map(Literal::Integer).collect(),
            Self::Long(v) => v.iter().copied().map(Literal::Long).collect(),
            Self::Double(v) => v.iter().copied().map(Literal::Double).collect(),
            Self::String(v) => v.iter().cloned().map(Literal::String).collect(),
        }
    }
}

/// A fixed-width numeric array view.
#[derive(Debug, Clone, PartialEq)]
pub enum NumericArray {
    /// Signed bytes.
    Int8(Vec<i8>),
    /// Unsigned bytes.
    Uint8(Vec<u8>),
    /// Unsigned bytes clamped on write.
    Uint8Clamped(Vec<u8>),
    /// Signed 16-bit integers.
    Int16(Vec<i16>),
    /// Unsigned 16-bit integers.
    Uint16(Vec<u16>),
    /// Signed 32-bit integers.
    Int32(Vec<i32>),
    /// Unsigned 32-bit integers.
    Uint32(Vec<u32>),
    /// 32-bit floats.
    Float32(Vec<f32>),
    /// 64-bit floats.
    Float64(Vec<f64>),
    /// Signed 64-bit integers. Rejected by membership clauses.
    BigInt64(Vec<i64>),
    /// Unsigned 64-bit integers. Rejected by membership clauses.
    BigUint64(Vec<u64>),
}

/// Input of `in_number`/`not_in_number`.
#[derive(Debug, Clone, PartialEq)]
pub enum NumberList {
    /// A plain array of numbers, taken as doubles.
    Plain(Vec<f64>),
    /// A fixed-width numeric array view.
    Typed(NumericArray),
}

impl From<Vec<f64>> for NumberList {
    fn from(v: Vec<f64>) -> Self {
        Self::Plain(v)
    }
}

impl From<&[f64]> for NumberList {
    fn from(v: &[f64]) -> Self {
        Self::Plain(v.to_vec())
    }
}

impl From<NumericArray> for NumberList {
    fn from(v: NumericArray) -> Self {
        Self::Typed(v)
    }
}

impl TryFrom<NumberList> for LiteralList {
    type Error = CoreError;

    fn try_from(list: NumberList) -> CoreResult<Self> {
        let widen = |v: Vec<i32>| -> CoreResult<Self> { Ok(Self::Integer(v)) };
        match list {
            NumberList::Plain(v) => Ok(Self::Double(v)),
            NumberList::Typed(array) => match array {
                NumericArray::Int8(v) => widen(v.into_iter().map(i32::from).collect()),
                NumericArray::Uint8(v) | NumericArray::Uint8Clamped(v) => {
                    widen(v.into_iter().map(i32::from).collect())
                }
                NumericArray::Int16(v) => widen(v.into_iter().map(i32::from).collect()),
                NumericArray::Uint16(v) => widen(v.into_iter().map(i32::from).collect()),
                NumericArray::Int32(v) => widen(v),
                NumericArray::Uint32(v) => Ok(Self::Long(v.into_iter().map(i64::from).collect())),
                NumericArray::Float32(v) => {
                    Ok(Self::Double(v.into_iter().map(f64::from).collect()))
                }
                NumericArray::Float64(v) => Ok(Self::Double(v)),
                NumericArray::BigInt64(_) | NumericArray::BigUint64(_) => {
                    Err(CoreError::invalid_argument(
                        "64-bit integer arrays cannot be represented in the query number domain",
                    ))
                }
            },
        }
    }
}
