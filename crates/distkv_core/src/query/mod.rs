//! Fluent predicate queries.
//!
//! A [`Query`] is an ordered list of clauses. Builder calls validate their
//! arguments and append exactly one clause; a failed call leaves the query
//! untouched. [`Query::sql_like`] renders the canonical plan string, which is
//! also what the store parses and evaluates.
//!
//! ```rust,ignore
//! let mut query = Query::new();
//! query
//!     .greater_than("$.age", 18)?
//!     .and()
//!     .like("$.name", "a%")?
//!     .order_by_desc("$.age")?
//!     .limit(10, 0)?;
//! let rows = store.get_entries(&query)?;
//! ```

mod args;
mod clause;
mod eval;
mod literal;
mod plan;

pub use args::QueryArg;
pub use clause::{BoolOp, Clause, CompareOp, Direction};
pub use eval::{KEY_FIELD, VALUE_FIELD};
pub use literal::{Literal, LiteralList, NumberList, NumericArray};
pub use plan::{parse, MAX_QUERY_LENGTH};

pub(crate) use eval::CompiledQuery;

use crate::error::{CoreError, CoreResult};

/// An ordered sequence of query clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    clauses: Vec<Clause>,
}

impl Query {
    /// Creates an empty query.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clauses in call order.
    #[must_use]
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Renders the canonical plan string. Identical clause sequences always
    /// render identical plans.
    #[must_use]
    pub fn sql_like(&self) -> String {
        clause::render(&self.clauses)
    }

    /// Clears every clause.
    pub fn reset(&mut self) -> &mut Self {
        self.clauses.clear();
        self
    }

    fn push(&mut self, clause: Clause) -> &mut Self {
        self.clauses.push(clause);
        self
    }

    fn compare(
        &mut self,
        field: &str,
        op: CompareOp,
        literal: impl Into<Literal>,
    ) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::Compare {
            field: field.to_string(),
            op,
            literal: literal.into(),
        }))
    }

    /// `field = value`.
    pub fn equal_to(&mut self, field: &str, value: impl Into<Literal>) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Eq, value)
    }

    /// `field <> value`.
    pub fn not_equal_to(
        &mut self,
        field: &str,
        value: impl Into<Literal>,
    ) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Ne, value)
    }

    /// `field > value`.
    pub fn greater_than(
        &mut self,
        field: &str,
        value: impl Into<Literal>,
    ) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Gt, value)
    }

    /// `field >= value`.
    pub fn greater_than_or_equal_to(
        &mut self,
        field: &str,
        value: impl Into<Literal>,
    ) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Ge, value)
    }

    /// `field < value`.
    pub fn less_than(&mut self, field: &str, value: impl Into<Literal>) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Lt, value)
    }

    /// `field <= value`.
    pub fn less_than_or_equal_to(
        &mut self,
        field: &str,
        value: impl Into<Literal>,
    ) -> CoreResult<&mut Self> {
        self.compare(field, CompareOp::Le, value)
    }

    /// `field IS NULL`. Missing fields count as null.
    pub fn is_null(&mut self, field: &str) -> CoreResult<&mut Self> {
        self.null_check(field, false)
    }

    /// `field IS NOT NULL`.
    pub fn is_not_null(&mut self, field: &str) -> CoreResult<&mut Self> {
        self.null_check(field, true)
    }

    fn null_check(&mut self, field: &str, negated: bool) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::NullCheck {
            field: field.to_string(),
            negated,
        }))
    }

    /// `field IN (numbers)`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for 64-bit integer array views.
    pub fn in_number(
        &mut self,
        field: &str,
        values: impl Into<NumberList>,
    ) -> CoreResult<&mut Self> {
        self.membership(field, false, LiteralList::try_from(values.into())?)
    }

    /// `field NOT IN (numbers)`.
    pub fn not_in_number(
        &mut self,
        field: &str,
        values: impl Into<NumberList>,
    ) -> CoreResult<&mut Self> {
        self.membership(field, true, LiteralList::try_from(values.into())?)
    }

    /// `field IN (strings)`.
    pub fn in_string<I, S>(&mut self, field: &str, values: I) -> CoreResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(field, false, LiteralList::String(values))
    }

    /// `field NOT IN (strings)`.
    pub fn not_in_string<I, S>(&mut self, field: &str, values: I) -> CoreResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(field, true, LiteralList::String(values))
    }

    fn membership(
        &mut self,
        field: &str,
        negated: bool,
        values: LiteralList,
    ) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::Membership {
            field: field.to_string(),
            negated,
            values,
        }))
    }

    /// `field LIKE pattern` with `%` and `_` wildcards.
    pub fn like(&mut self, field: &str, pattern: &str) -> CoreResult<&mut Self> {
        self.pattern(field, false, pattern)
    }

    /// `field NOT LIKE pattern`.
    pub fn unlike(&mut self, field: &str, pattern: &str) -> CoreResult<&mut Self> {
        self.pattern(field, true, pattern)
    }

    fn pattern(&mut self, field: &str, negated: bool, pattern: &str) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::Pattern {
            field: field.to_string(),
            negated,
            pattern: pattern.to_string(),
        }))
    }

    /// Joins the surrounding predicates with `AND`.
    pub fn and(&mut self) -> &mut Self {
        self.push(Clause::Bool(BoolOp::And))
    }

    /// Joins the surrounding predicates with `OR`.
    pub fn or(&mut self) -> &mut Self {
        self.push(Clause::Bool(BoolOp::Or))
    }

    /// Opens a parenthesised group. Balance is checked when the query runs.
    pub fn begin_group(&mut self) -> &mut Self {
        self.push(Clause::GroupOpen)
    }

    /// Closes a parenthesised group.
    pub fn end_group(&mut self) -> &mut Self {
        self.push(Clause::GroupClose)
    }

    /// Sorts ascending by `field`.
    pub fn order_by_asc(&mut self, field: &str) -> CoreResult<&mut Self> {
        self.order_by(field, Direction::Asc)
    }

    /// Sorts descending by `field`.
    pub fn order_by_desc(&mut self, field: &str) -> CoreResult<&mut Self> {
        self.order_by(field, Direction::Desc)
    }

    fn order_by(&mut self, field: &str, direction: Direction) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::OrderBy {
            field: field.to_string(),
            direction,
        }))
    }

    /// Sorts by last write time.
    pub fn order_by_write_time(&mut self, ascending: bool) -> &mut Self {
        let direction = if ascending {
            Direction::Asc
        } else {
            Direction::Desc
        };
        self.push(Clause::OrderByWriteTime(direction))
    }

    /// Returns at most `count` rows after skipping `offset`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when either number is negative.
    pub fn limit(&mut self, count: i32, offset: i32) -> CoreResult<&mut Self> {
        let (Ok(count), Ok(offset)) = (u32::try_from(count), u32::try_from(offset)) else {
            return Err(CoreError::invalid_argument(format!(
                "limit needs non-negative count and offset, got {count} and {offset}"
            )));
        };
        Ok(self.push(Clause::Limit { count, offset }))
    }

    /// Restricts matches to keys starting with `prefix`.
    pub fn prefix_key(&mut self, prefix: &str) -> CoreResult<&mut Self> {
        check_word("prefix", prefix)?;
        Ok(self.push(Clause::PrefixKey(prefix.to_string())))
    }

    /// Hints the index to use for `field`.
    pub fn set_suggest_index(&mut self, field: &str) -> CoreResult<&mut Self> {
        check_field(field)?;
        Ok(self.push(Clause::SuggestIndex(field.to_string())))
    }

    /// Scopes the query to one device. Always rendered first.
    pub fn device_id(&mut self, id: &str) -> CoreResult<&mut Self> {
        check_word("device id", id)?;
        Ok(self.push(Clause::DeviceId(id.to_string())))
    }

    /// Restricts matches to the listed keys.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty list, an invalid key, or when
    /// the query already has a key list.
    pub fn in_keys<I, S>(&mut self, keys: I) -> CoreResult<&mut Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.clauses.iter().any(|c| matches!(c, Clause::InKeys(_))) {
            return Err(CoreError::invalid_argument("in_keys may only be set once"));
        }
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        if keys.is_empty() {
            return Err(CoreError::invalid_argument("in_keys needs at least one key"));
        }
        for key in &keys {
            check_word("key", key)?;
        }
        Ok(self.push(Clause::InKeys(keys)))
    }

    pub(crate) fn compile(&self) -> CoreResult<CompiledQuery> {
        CompiledQuery::compile(plan::parse(&self.sql_like())?)
    }
}

fn check_field(field: &str) -> CoreResult<()> {
    check_word("field", field)
}

fn check_word(what: &str, text: &str) -> CoreResult<()> {
    if text.is_empty() {
        return Err(CoreError::invalid_argument(format!("{what} must not be empty")));
    }
    if text.contains('^') {
        return Err(CoreError::invalid_argument(format!(
            "{what} {text:?} must not contain '^'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_query_renders_empty() {
        assert_eq!(Query::new().sql_like(), "");
    }

    #[test]
    fn chained_rendering() {
        let mut q = Query::new();
        q.equal_to("$.name", "Alice")
            .unwrap()
            .and()
            .greater_than("$.age", 18)
            .unwrap()
            .order_by_desc("$.age")
            .unwrap()
            .limit(10, 5)
            .unwrap();
        assert_eq!(
            q.sql_like(),
            " ^EQUAL STRING $.name Alice ^AND ^GREATER INTEGER $.age 18 ^DESC $.age ^LIMIT 10 5"
        );
    }

    #[test]
    fn sql_like_is_idempotent() {
        let mut q = Query::new();
        q.like("$.city", "new york%").unwrap().is_not_null("$.zip").unwrap();
        assert_eq!(q.sql_like(), q.sql_like());
        assert_eq!(q.sql_like(), " ^LIKE $.city new^^york% ^IS_NOT_NULL $.zip");
    }

    #[test]
    fn device_id_always_first() {
        let mut q = Query::new();
        q.prefix_key("user_").unwrap().device_id("dev1").unwrap();
        assert_eq!(q.sql_like(), " ^DEVICE_ID dev1 ^KEY_PREFIX user_");
    }

    #[test]
    fn reset_clears() {
        let mut q = Query::new();
        q.is_null("$.a").unwrap().reset();
        assert_eq!(q, Query::new());
        q.reset();
        assert_eq!(q.sql_like(), "");
    }

    #[test]
    fn invalid_field_leaves_query_unmodified() {
        let mut q = Query::new();
        q.equal_to("$.a", 1).unwrap();
        let before = q.clone();
        assert!(q.equal_to("", 1).unwrap_err().is_invalid_argument());
        assert!(q.like("a^b", "%").unwrap_err().is_invalid_argument());
        assert_eq!(q, before);
    }

    #[test]
    fn negative_limit_rejected() {
        let mut q = Query::new();
        assert!(q.limit(-1, 0).is_err());
        assert!(q.limit(1, -1).is_err());
        assert!(q.clauses().is_empty());
    }

    #[test]
    fn number_membership() {
        let mut q = Query::new();
        q.in_number("$.n", NumericArray::Int32(vec![-21, 31]))
            .unwrap()
            .not_in_number("$.m", vec![1.5, 2.0])
            .unwrap();
        assert_eq!(
            q.sql_like(),
            " ^IN INTEGER $.n ^START -21 31 ^END ^NOT_IN DOUBLE $.m ^START 1.5 2 ^END"
        );
        let err = q
            .in_number("$.n", NumericArray::BigInt64(vec![1]))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(q.clauses().len(), 2);
    }

    #[test]
    fn in_keys_rules() {
        let mut q = Query::new();
        assert!(q.in_keys(Vec::<String>::new()).is_err());
        assert!(q.in_keys(["a", ""]).is_err());
        q.in_keys(["a", "b c"]).unwrap();
        assert!(q.in_keys(["d"]).is_err());
        assert_eq!(q.sql_like(), " ^IN_KEYS ^START a b^^c ^END");
    }

    #[test]
    fn unbalanced_groups_build_but_fail_to_compile() {
        let mut q = Query::new();
        q.begin_group().equal_to("$.a", 1).unwrap();
        assert_eq!(q.sql_like(), " ^BEGIN_GROUP ^EQUAL INTEGER $.a 1");
        assert!(q.compile().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn compiled_plan_matches_builder() {
        let mut q = Query::new();
        q.device_id("dev").unwrap().prefix_key("k").unwrap();
        let compiled = q.compile().unwrap();
        assert_eq!(compiled.device_id(), Some("dev"));
        assert_eq!(compiled.scan_prefix(), "k");
    }

    #[test]
    fn over_long_query_rejected_at_compile() {
        let mut q = Query::new();
        let long = "x".repeat(MAX_QUERY_LENGTH);
        q.equal_to("$.a", long.as_str()).unwrap();
        assert!(q.compile().unwrap_err().is_over_limit());
    }
}
