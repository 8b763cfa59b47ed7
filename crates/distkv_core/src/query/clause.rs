//! Clause nodes and their canonical plan rendering.

use super::literal::{Literal, LiteralList};
use std::fmt::Write;

pub(crate) const EQUAL: &str = "^EQUAL";
pub(crate) const NOT_EQUAL: &str = "^NOT_EQUAL";
pub(crate) const GREATER: &str = "^GREATER";
pub(crate) const LESS: &str = "^LESS";
pub(crate) const GREATER_EQUAL: &str = "^GREATER_EQUAL";
pub(crate) const LESS_EQUAL: &str = "^LESS_EQUAL";
pub(crate) const IS_NULL: &str = "^IS_NULL";
pub(crate) const IS_NOT_NULL: &str = "^IS_NOT_NULL";
pub(crate) const IN: &str = "^IN";
pub(crate) const NOT_IN: &str = "^NOT_IN";
pub(crate) const LIKE: &str = "^LIKE";
pub(crate) const NOT_LIKE: &str = "^NOT_LIKE";
pub(crate) const AND: &str = "^AND";
pub(crate) const OR: &str = "^OR";
pub(crate) const ASC: &str = "^ASC";
pub(crate) const DESC: &str = "^DESC";
pub(crate) const ORDER_BY_WRITE_TIME: &str = "^OrderByWriteTime";
pub(crate) const IS_ASC: &str = "^IS_ASC";
pub(crate) const IS_DESC: &str = "^IS_DESC";
pub(crate) const LIMIT: &str = "^LIMIT";
pub(crate) const BEGIN_GROUP: &str = "^BEGIN_GROUP";
pub(crate) const END_GROUP: &str = "^END_GROUP";
pub(crate) const KEY_PREFIX: &str = "^KEY_PREFIX";
pub(crate) const DEVICE_ID: &str = "^DEVICE_ID";
pub(crate) const SUGGEST_INDEX: &str = "^SUGGEST_INDEX";
pub(crate) const IN_KEYS: &str = "^IN_KEYS";
pub(crate) const START: &str = "^START";
pub(crate) const END: &str = "^END";
pub(crate) const EMPTY_STRING: &str = "^EMPTY_STRING";

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `<`
    Lt,
    /// `<=`
    Le,
}

impl CompareOp {
    pub(crate) fn keyword(self) -> &'static str {
        match self {
            Self::Eq => EQUAL,
            Self::Ne => NOT_EQUAL,
            Self::Gt => GREATER,
            Self::Ge => GREATER_EQUAL,
            Self::Lt => LESS,
            Self::Le => LESS_EQUAL,
        }
    }

    pub(crate) fn from_keyword(word: &str) -> Option<Self> {
        Some(match word {
            EQUAL => Self::Eq,
            NOT_EQUAL => Self::Ne,
            GREATER => Self::Gt,
            GREATER_EQUAL => Self::Ge,
            LESS => Self::Lt,
            LESS_EQUAL => Self::Le,
            _ => return None,
        })
    }
}

/// Boolean connective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOp {
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// One atomic unit of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Field compared against a literal.
    Compare {
        /// Field path.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        literal: Literal,
    },
    /// Field membership in a literal list.
    Membership {
        /// Field path.
        field: String,
        /// `NOT IN` when true.
        negated: bool,
        /// Candidate values.
        values: LiteralList,
    },
    /// SQL `LIKE` pattern match.
    Pattern {
        /// Field path.
        field: String,
        /// `NOT LIKE` when true.
        negated: bool,
        /// Pattern with `%` and `_` wildcards.
        pattern: String,
    },
    /// `IS NULL` / `IS NOT NULL`.
    NullCheck {
        /// Field path.
        field: String,
        /// `IS NOT NULL` when true.
        negated: bool,
    },
    /// Boolean connective between predicates.
    Bool(BoolOp),
    /// Opens a parenthesised group.
    GroupOpen,
    /// Closes a parenthesised group.
    GroupClose,
    /// Sort key.
    OrderBy {
        /// Field path.
        field: String,
        /// Direction.
        direction: Direction,
    },
    /// Sort by last write time.
    OrderByWriteTime(Direction),
    /// Pagination.
    Limit {
        /// Maximum number of rows.
        count: u32,
        /// Rows to skip.
        offset: u32,
    },
    /// Index hint.
    SuggestIndex(String),
    /// Device scope of the query.
    DeviceId(String),
    /// Key prefix filter.
    PrefixKey(String),
    /// Restricts the query to the listed keys.
    InKeys(Vec<String>),
}

impl Clause {
    /// Whether this clause takes part in the boolean filter expression.
    #[must_use]
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Self::Compare { .. }
                | Self::Membership { .. }
                | Self::Pattern { .. }
                | Self::NullCheck { .. }
        )
    }

    /// Appends the canonical rendering of this clause, with a leading space.
    pub(crate) fn render_into(&self, out: &mut String) {
        match self {
            Self::Compare { field, op, literal } => {
                let _ = write!(
                    out,
                    " {} {} {} {}",
                    op.keyword(),
                    literal.type_name(),
                    escape(field),
                    render_literal(literal)
                );
            }
            Self::Membership {
                field,
                negated,
                values,
            } => {
                let keyword = if *negated { NOT_IN } else { IN };
                let _ = write!(
                    out,
                    " {keyword} {} {} {START} ",
                    values.type_name(),
                    escape(field)
                );
                for literal in values.to_literals() {
                    out.push_str(&render_literal(&literal));
                    out.push(' ');
                }
                out.push_str(END);
            }
            Self::Pattern {
                field,
                negated,
                pattern,
            } => {
                let keyword = if *negated { NOT_LIKE } else { LIKE };
                let _ = write!(out, " {keyword} {} {}", escape(field), escape(pattern));
            }
            Self::NullCheck { field, negated } => {
                let keyword = if *negated { IS_NOT_NULL } else { IS_NULL };
                let _ = write!(out, " {keyword} {}", escape(field));
            }
            Self::Bool(BoolOp::And) => out.push_str(" ^AND"),
            Self::Bool(BoolOp::Or) => out.push_str(" ^OR"),
            Self::GroupOpen => out.push_str(" ^BEGIN_GROUP"),
            Self::GroupClose => out.push_str(" ^END_GROUP"),
            Self::OrderBy { field, direction } => {
                let keyword = match direction {
                    Direction::Asc => ASC,
                    Direction::Desc => DESC,
                };
                let _ = write!(out, " {keyword} {}", escape(field));
            }
            Self::OrderByWriteTime(direction) => {
                let flag = match direction {
                    Direction::Asc => IS_ASC,
                    Direction::Desc => IS_DESC,
                };
                let _ = write!(out, " {ORDER_BY_WRITE_TIME} {flag}");
            }
            Self::Limit { count, offset } => {
                let _ = write!(out, " {LIMIT} {count} {offset}");
            }
            Self::SuggestIndex(field) => {
                let _ = write!(out, " {SUGGEST_INDEX} {}", escape(field));
            }
            Self::DeviceId(id) => {
                let _ = write!(out, " {DEVICE_ID} {}", escape(id));
            }
            Self::PrefixKey(prefix) => {
                let _ = write!(out, " {KEY_PREFIX} {}", escape(prefix));
            }
            Self::InKeys(keys) => {
                let _ = write!(out, " {IN_KEYS} {START} ");
                for key in keys {
                    out.push_str(&escape(key));
                    out.push(' ');
                }
                out.push_str(END);
            }
        }
    }
}

/// Renders clauses into the canonical plan string.
///
/// Device clauses always lead the plan, most recent first.
pub(crate) fn render(clauses: &[Clause]) -> String {
    let mut out = String::new();
    for clause in clauses.iter().rev() {
        if matches!(clause, Clause::DeviceId(_)) {
            clause.render_into(&mut out);
        }
    }
    for clause in clauses {
        if !matches!(clause, Clause::DeviceId(_)) {
            clause.render_into(&mut out);
        }
    }
    out
}

fn render_literal(literal: &Literal) -> String {
    match literal {
        Literal::Integer(v) => v.to_string(),
        Literal::Long(v) => v.to_string(),
        Literal::Double(v) => v.to_string(),
        Literal::String(v) => escape(v),
        Literal::Bool(true) => "true".to_string(),
        Literal::Bool(false) => "false".to_string(),
    }
}

/// Escapes free text so it forms a single plan word.
pub(crate) fn escape(text: &str) -> String {
    if text.is_empty() {
        return EMPTY_STRING.to_string();
    }
    text.replace('^', "(^)").replace(' ', "^^")
}

/// Reverses [`escape`].
pub(crate) fn unescape(word: &str) -> String {
    if word == EMPTY_STRING {
        return String::new();
    }
    word.replace("^^", " ").replace("(^)", "^")
}
