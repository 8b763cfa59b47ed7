//! Loosely-typed builder calls.
//!
//! External callers that only know method names and dynamically typed
//! arguments go through [`Query::call`]. Numbers arrive as doubles, so a
//! scalar number always renders as a `DOUBLE` literal.

use super::literal::{NumberList, NumericArray};
use super::Query;
use crate::error::{CoreError, CoreResult};

/// A dynamically typed argument.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryArg {
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// A boolean.
    Bool(bool),
    /// A plain array of arguments.
    List(Vec<QueryArg>),
    /// A fixed-width numeric array view.
    TypedArray(NumericArray),
    /// An absent value.
    Null,
}

impl QueryArg {
    fn kind(&self) -> &'static str {
        match self {
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Bool(_) => "boolean",
            Self::List(_) => "array",
            Self::TypedArray(_) => "typed array",
            Self::Null => "null",
        }
    }
}

impl From<f64> for QueryArg {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<i32> for QueryArg {
    fn from(v: i32) -> Self {
        Self::Number(f64::from(v))
    }
}

impl From<&str> for QueryArg {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryArg {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<bool> for QueryArg {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<NumericArray> for QueryArg {
    fn from(v: NumericArray) -> Self {
        Self::TypedArray(v)
    }
}

impl<T: Into<QueryArg>> From<Vec<T>> for QueryArg {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

struct Args<'a> {
    method: &'a str,
    args: &'a [QueryArg],
}

impl<'a> Args<'a> {
    fn require(&self, n: usize) -> CoreResult<()> {
        if self.args.len() < n {
            return Err(CoreError::invalid_argument(format!(
                "{} expects {n} argument(s), got {}",
                self.method,
                self.args.len()
            )));
        }
        Ok(())
    }

    fn wrong(&self, index: usize, expected: &str) -> CoreError {
        CoreError::invalid_argument(format!(
            "{} argument {index} must be {expected}, got {}",
            self.method,
            self.args[index].kind()
        ))
    }

    fn string(&self, index: usize) -> CoreResult<&'a str> {
        match &self.args[index] {
            QueryArg::String(s) => Ok(s),
            _ => Err(self.wrong(index, "a string")),
        }
    }

    fn boolean(&self, index: usize) -> CoreResult<bool> {
        match &self.args[index] {
            QueryArg::Bool(b) => Ok(*b),
            _ => Err(self.wrong(index, "a boolean")),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn integer(&self, index: usize) -> CoreResult<i32> {
        match &self.args[index] {
            QueryArg::Number(n)
                if n.fract() == 0.0 && *n >= f64::from(i32::MIN) && *n <= f64::from(i32::MAX) =>
            {
                Ok(*n as i32)
            }
            _ => Err(self.wrong(index, "an integer")),
        }
    }

    fn strings(&self, index: usize) -> CoreResult<Vec<String>> {
        let QueryArg::List(items) = &self.args[index] else {
            return Err(self.wrong(index, "an array of strings"));
        };
        items
            .iter()
            .map(|item| match item {
                QueryArg::String(s) => Ok(s.clone()),
                _ => Err(self.wrong(index, "an array of strings")),
            })
            .collect()
    }

    fn numbers(&self, index: usize) -> CoreResult<NumberList> {
        match &self.args[index] {
            QueryArg::TypedArray(array) => Ok(NumberList::Typed(array.clone())),
            QueryArg::List(items) => items
                .iter()
                .map(|item| match item {
                    QueryArg::Number(n) => Ok(*n),
                    _ => Err(self.wrong(index, "an array of numbers")),
                })
                .collect::<CoreResult<Vec<f64>>>()
                .map(NumberList::Plain),
            _ => Err(self.wrong(index, "an array of numbers")),
        }
    }
}

impl Query {
    /// Applies a builder method by name with dynamically typed arguments.
    ///
    /// Missing arguments fail with `InvalidArgument` and leave the query
    /// unchanged; extra trailing arguments are ignored.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for unknown methods, missing or ill-typed
    /// arguments, and anything the typed builder method rejects.
    pub fn call(&mut self, method: &str, args: &[QueryArg]) -> CoreResult<&mut Self> {
        let a = Args { method, args };
        match method {
            "equalTo" | "notEqualTo" | "greaterThan" | "greaterThanOrEqualTo" | "lessThan"
            | "lessThanOrEqualTo" => {
                a.require(2)?;
                let field = a.string(0)?;
                match &args[1] {
                    QueryArg::String(v) => self.compare_named(method, field, v.as_str()),
                    QueryArg::Bool(v) => self.compare_named(method, field, *v),
                    QueryArg::Number(v) => self.compare_named(method, field, *v),
                    _ => Err(a.wrong(1, "a string, boolean or number")),
                }
            }
            "isNull" => {
                a.require(1)?;
                self.is_null(a.string(0)?)
            }
            "isNotNull" => {
                a.require(1)?;
                self.is_not_null(a.string(0)?)
            }
            "inNumber" | "notInNumber" => {
                a.require(2)?;
                let field = a.string(0)?;
                let values = a.numbers(1)?;
                if method == "inNumber" {
                    self.in_number(field, values)
                } else {
                    self.not_in_number(field, values)
                }
            }
            "inString" | "notInString" => {
                a.require(2)?;
                let field = a.string(0)?;
                let values = a.strings(1)?;
                if method == "inString" {
                    self.in_string(field, values)
                } else {
                    self.not_in_string(field, values)
                }
            }
            "like" => {
                a.require(2)?;
                self.like(a.string(0)?, a.string(1)?)
            }
            "unlike" => {
                a.require(2)?;
                self.unlike(a.string(0)?, a.string(1)?)
            }
            "and" => Ok(self.and()),
            "or" => Ok(self.or()),
            "beginGroup" => Ok(self.begin_group()),
            "endGroup" => Ok(self.end_group()),
            "orderByAsc" => {
                a.require(1)?;
                self.order_by_asc(a.string(0)?)
            }
            "orderByDesc" => {
                a.require(1)?;
                self.order_by_desc(a.string(0)?)
            }
            "orderByWriteTime" => {
                a.require(1)?;
                Ok(self.order_by_write_time(a.boolean(0)?))
            }
            "limit" => {
                a.require(2)?;
                let count = a.integer(0)?;
                let offset = a.integer(1)?;
                self.limit(count, offset)
            }
            "prefixKey" => {
                a.require(1)?;
                self.prefix_key(a.string(0)?)
            }
            "setSuggestIndex" => {
                a.require(1)?;
                self.set_suggest_index(a.string(0)?)
            }
            "deviceId" => {
                a.require(1)?;
                self.device_id(a.string(0)?)
            }
            "inKeys" => {
                a.require(1)?;
                self.in_keys(a.strings(0)?)
            }
            "reset" => {
                if !args.is_empty() {
                    return Err(CoreError::invalid_argument("reset takes no arguments"));
                }
                Ok(self.reset())
            }
            other => Err(CoreError::invalid_argument(format!(
                "unknown query method {other:?}"
            ))),
        }
    }

    /// [`Query::sql_like`] for dynamic callers.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when any argument is passed.
    pub fn sql_like_with(&self, args: &[QueryArg]) -> CoreResult<String> {
        if !args.is_empty() {
            return Err(CoreError::invalid_argument("getSqlLike takes no arguments"));
        }
        Ok(self.sql_like())
    }

    fn compare_named(
        &mut self,
        method: &str,
        field: &str,
        value: impl Into<super::Literal>,
    ) -> CoreResult<&mut Self> {
        match method {
            "equalTo" => self.equal_to(field, value),
            "notEqualTo" => self.not_equal_to(field, value),
            "greaterThan" => self.greater_than(field, value),
            "greaterThanOrEqualTo" => self.greater_than_or_equal_to(field, value),
            "lessThan" => self.less_than(field, value),
            _ => self.less_than_or_equal_to(field, value),
        }
    }
}
