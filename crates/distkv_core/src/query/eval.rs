//! Evaluation of parsed clauses against entries.
//!
//! Predicates combine into an expression tree where `and` binds tighter
//! than `or` and adjacent predicates are joined by an implicit `and`.
//! Unbalanced groups and dangling connectives are rejected here rather
//! than when the query is built.

use super::clause::{BoolOp, Clause, CompareOp, Direction};
use super::literal::Literal;
use crate::entry::Entry;
use crate::error::{CoreError, CoreResult};
use distkv_codec::TypedValue;
use serde_json::Value as Json;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Field name addressing the entry key.
pub const KEY_FIELD: &str = "$key";
/// Field name addressing the whole scalar value.
pub const VALUE_FIELD: &str = "$value";

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Predicate(Clause),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Predicate(Clause),
    Op(BoolOp),
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
enum SortKey {
    Field(String, Direction),
    WriteTime(Direction),
}

/// A query ready to run against a scope's entries.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CompiledQuery {
    filter: Option<Expr>,
    order: Vec<SortKey>,
    limit: Option<(u32, u32)>,
    prefixes: Vec<String>,
    in_keys: Option<BTreeSet<String>>,
    device_id: Option<String>,
}

impl CompiledQuery {
    pub(crate) fn compile(clauses: Vec<Clause>) -> CoreResult<Self> {
        let mut tokens = Vec::new();
        let mut compiled = Self {
            filter: None,
            order: Vec::new(),
            limit: None,
            prefixes: Vec::new(),
            in_keys: None,
            device_id: None,
        };
        for clause in clauses {
            match clause {
                Clause::Bool(op) => tokens.push(Token::Op(op)),
                Clause::GroupOpen => tokens.push(Token::Open),
                Clause::GroupClose => tokens.push(Token::Close),
                Clause::OrderBy { field, direction } => {
                    compiled.order.push(SortKey::Field(field, direction));
                }
                Clause::OrderByWriteTime(direction) => {
                    compiled.order.push(SortKey::WriteTime(direction));
                }
                Clause::Limit { count, offset } => compiled.limit = Some((count, offset)),
                Clause::PrefixKey(prefix) => compiled.prefixes.push(prefix),
                Clause::InKeys(keys) => compiled.in_keys = Some(keys.into_iter().collect()),
                Clause::DeviceId(id) => compiled.device_id = Some(id),
                Clause::SuggestIndex(_) => {}
                predicate => tokens.push(Token::Predicate(predicate)),
            }
        }
        if !tokens.is_empty() {
            let mut parser = ExprParser { tokens, pos: 0 };
            let expr = parser.or_expr()?;
            if parser.pos != parser.tokens.len() {
                return Err(CoreError::invalid_argument(
                    "query has an END_GROUP without a matching BEGIN_GROUP",
                ));
            }
            compiled.filter = Some(expr);
        }
        Ok(compiled)
    }

    /// Device named by the query, if any.
    pub(crate) fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Key prefix usable for a range scan.
    pub(crate) fn scan_prefix(&self) -> &str {
        self.prefixes.first().map_or("", String::as_str)
    }

    /// Whether an entry passes every filtering clause.
    pub(crate) fn matches(&self, entry: &Entry) -> bool {
        if !self.prefixes.iter().all(|p| entry.key.starts_with(p.as_str())) {
            return false;
        }
        if let Some(keys) = &self.in_keys {
            if !keys.contains(&entry.key) {
                return false;
            }
        }
        match &self.filter {
            Some(expr) => eval(expr, &Resolver::new(entry)),
            None => true,
        }
    }

    /// Filters, sorts and paginates candidate entries.
    pub(crate) fn run<'a>(&self, candidates: impl Iterator<Item = &'a Entry>) -> Vec<Entry> {
        let mut rows: Vec<Entry> = candidates.filter(|e| self.matches(e)).cloned().collect();
        if !self.order.is_empty() {
            rows.sort_by(|a, b| self.compare_rows(a, b));
        }
        match self.limit {
            Some((count, offset)) => rows
                .into_iter()
                .skip(offset as usize)
                .take(count as usize)
                .collect(),
            None => rows,
        }
    }

    /// Number of rows [`CompiledQuery::run`] would return.
    pub(crate) fn count<'a>(&self, candidates: impl Iterator<Item = &'a Entry>) -> usize {
        let matched = candidates.filter(|e| self.matches(e)).count();
        match self.limit {
            Some((count, offset)) => matched.saturating_sub(offset as usize).min(count as usize),
            None => matched,
        }
    }

    fn compare_rows(&self, a: &Entry, b: &Entry) -> Ordering {
        let (ra, rb) = (Resolver::new(a), Resolver::new(b));
        for key in &self.order {
            let (ordering, direction) = match key {
                SortKey::Field(field, direction) => {
                    (sort_cmp(&ra.resolve(field), &rb.resolve(field)), *direction)
                }
                SortKey::WriteTime(direction) => (a.updated_at.cmp(&b.updated_at), *direction),
            };
            let ordering = match direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

struct ExprParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self) -> CoreResult<Expr> {
        let mut lhs = self.and_expr()?;
        while self.peek() == Some(&Token::Op(BoolOp::Or)) {
            self.pos += 1;
            let rhs = self.and_expr()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> CoreResult<Expr> {
        let mut lhs = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Op(BoolOp::And)) => self.pos += 1,
                Some(Token::Predicate(_) | Token::Open) => {}
                _ => return Ok(lhs),
            }
            let rhs = self.factor()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
    }

    fn factor(&mut self) -> CoreResult<Expr> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        match token {
            Some(Token::Predicate(clause)) => Ok(Expr::Predicate(clause)),
            Some(Token::Open) => {
                let inner = self.or_expr()?;
                if self.peek() != Some(&Token::Close) {
                    return Err(CoreError::invalid_argument(
                        "query has a BEGIN_GROUP without a matching END_GROUP",
                    ));
                }
                self.pos += 1;
                Ok(inner)
            }
            Some(Token::Op(_)) => Err(CoreError::invalid_argument(
                "and/or must follow a predicate",
            )),
            Some(Token::Close) => Err(CoreError::invalid_argument(
                "query has an empty group or an unmatched END_GROUP",
            )),
            None => Err(CoreError::invalid_argument(
                "query ends with a dangling and/or or an open group",
            )),
        }
    }
}

fn eval(expr: &Expr, row: &Resolver<'_>) -> bool {
    match expr {
        Expr::And(a, b) => eval(a, row) && eval(b, row),
        Expr::Or(a, b) => eval(a, row) || eval(b, row),
        Expr::Predicate(clause) => eval_predicate(clause, row),
    }
}

fn eval_predicate(clause: &Clause, row: &Resolver<'_>) -> bool {
    match clause {
        Clause::Compare { field, op, literal } => {
            let value = row.resolve(field);
            !value.is_null() && compare_op(*op, compare(&value, literal))
        }
        Clause::Membership {
            field,
            negated,
            values,
        } => {
            let value = row.resolve(field);
            if value.is_null() {
                return false;
            }
            let found = values
                .to_literals()
                .iter()
                .any(|l| compare(&value, l) == Some(Ordering::Equal));
            found != *negated
        }
        Clause::Pattern {
            field,
            negated,
            pattern,
        } => {
            let value = row.resolve(field);
            if value.is_null() {
                return false;
            }
            let hit = match &value {
                Scalar::Str(s) => like(pattern, s),
                _ => false,
            };
            hit != *negated
        }
        Clause::NullCheck { field, negated } => row.resolve(field).is_null() != *negated,
        _ => true,
    }
}

fn compare_op(op: CompareOp, ordering: Option<Ordering>) -> bool {
    match op {
        CompareOp::Eq => ordering == Some(Ordering::Equal),
        CompareOp::Ne => ordering != Some(Ordering::Equal),
        CompareOp::Gt => ordering == Some(Ordering::Greater),
        CompareOp::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
        CompareOp::Lt => ordering == Some(Ordering::Less),
        CompareOp::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
    }
}

/// A resolved field value.
#[derive(Debug, Clone, PartialEq)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Num(f64),
    Str(String),
    Bytes(Vec<u8>),
    Composite,
}

impl Scalar {
    fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Num(_) => 2,
            Self::Str(_) => 3,
            Self::Bytes(_) => 4,
            Self::Composite => 5,
        }
    }

    fn from_json(json: &Json) -> Self {
        match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Num))
                .unwrap_or(Self::Composite),
            Json::String(s) => Self::Str(s.clone()),
            Json::Array(_) | Json::Object(_) => Self::Composite,
        }
    }
}

/// Compares a field value with a literal. `None` when incomparable.
#[allow(clippy::cast_precision_loss)]
fn compare(value: &Scalar, literal: &Literal) -> Option<Ordering> {
    match (value, literal) {
        (Scalar::Int(v), Literal::Integer(l)) => Some(v.cmp(&i64::from(*l))),
        (Scalar::Int(v), Literal::Long(l)) => Some(v.cmp(l)),
        (Scalar::Int(v), Literal::Double(l)) => (*v as f64).partial_cmp(l),
        (Scalar::Num(v), Literal::Integer(l)) => v.partial_cmp(&f64::from(*l)),
        (Scalar::Num(v), Literal::Long(l)) => v.partial_cmp(&(*l as f64)),
        (Scalar::Num(v), Literal::Double(l)) => v.partial_cmp(l),
        (Scalar::Str(v), Literal::String(l)) => Some(v.as_str().cmp(l.as_str())),
        (Scalar::Bool(v), Literal::Bool(l)) => Some(v.cmp(l)),
        _ => None,
    }
}

/// Total order used for sorting; nulls first.
#[allow(clippy::cast_precision_loss)]
fn sort_cmp(a: &Scalar, b: &Scalar) -> Ordering {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => x.cmp(y),
        (Scalar::Int(x), Scalar::Num(y)) => (*x as f64).total_cmp(y),
        (Scalar::Num(x), Scalar::Int(y)) => x.total_cmp(&(*y as f64)),
        (Scalar::Num(x), Scalar::Num(y)) => x.total_cmp(y),
        (Scalar::Bool(x), Scalar::Bool(y)) => x.cmp(y),
        (Scalar::Str(x), Scalar::Str(y)) => x.cmp(y),
        (Scalar::Bytes(x), Scalar::Bytes(y)) => x.cmp(y),
        _ => a.rank().cmp(&b.rank()),
    }
}

/// Resolves field paths against one entry, parsing a JSON value at most once.
struct Resolver<'a> {
    entry: &'a Entry,
    json: OnceCell<Option<Json>>,
}

impl<'a> Resolver<'a> {
    fn new(entry: &'a Entry) -> Self {
        Self {
            entry,
            json: OnceCell::new(),
        }
    }

    fn resolve(&self, field: &str) -> Scalar {
        match field {
            KEY_FIELD => Scalar::Str(self.entry.key.clone()),
            VALUE_FIELD => match &self.entry.value {
                TypedValue::String(s) => Scalar::Str(s.clone()),
                TypedValue::Integer(i) => Scalar::Int(*i),
                TypedValue::Float(f) => Scalar::Num(f64::from(*f)),
                TypedValue::Double(d) => Scalar::Num(*d),
                TypedValue::Boolean(b) => Scalar::Bool(*b),
                TypedValue::ByteArray(b) => Scalar::Bytes(b.clone()),
            },
            path => {
                let Some(mut node) = self.document() else {
                    return Scalar::Null;
                };
                let path = path.strip_prefix("$.").unwrap_or(path);
                for segment in path.split('.') {
                    let next = match node {
                        Json::Object(map) => map.get(segment),
                        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                        _ => None,
                    };
                    match next {
                        Some(child) => node = child,
                        None => return Scalar::Null,
                    }
                }
                Scalar::from_json(node)
            }
        }
    }

    fn document(&self) -> Option<&Json> {
        self.json
            .get_or_init(|| match &self.entry.value {
                TypedValue::String(s) => serde_json::from_str::<Json>(s)
                    .ok()
                    .filter(Json::is_object),
                _ => None,
            })
            .as_ref()
    }
}

/// SQL `LIKE` with `%` and `_`, ASCII case-insensitive.
fn like(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi].eq_ignore_ascii_case(&t[ti])) {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '%')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::literal::LiteralList;
    use crate::types::{DeviceScope, LogicalTimestamp};

    fn entry(key: &str, value: TypedValue, ts: u64) -> Entry {
        Entry {
            scope: DeviceScope::Local,
            key: key.to_string(),
            value,
            version: 1,
            updated_at: LogicalTimestamp::new(ts),
            origin: DeviceScope::Local,
        }
    }

    fn json(key: &str, body: &str, ts: u64) -> Entry {
        entry(key, TypedValue::String(body.to_string()), ts)
    }

    fn cmp(field: &str, op: CompareOp, literal: impl Into<Literal>) -> Clause {
        Clause::Compare {
            field: field.to_string(),
            op,
            literal: literal.into(),
        }
    }

    fn compile(clauses: Vec<Clause>) -> CompiledQuery {
        CompiledQuery::compile(clauses).unwrap()
    }

    #[test]
    fn like_wildcards() {
        assert!(like("a%", "abc"));
        assert!(like("%b%", "abc"));
        assert!(like("a_c", "ABC"));
        assert!(like("%", ""));
        assert!(!like("a_", "abc"));
        assert!(!like("b%", "abc"));
        assert!(like("%c%c", "acbcc"));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        // a = 1 OR a = 2 AND b = 3
        let q = compile(vec![
            cmp("$.a", CompareOp::Eq, 1),
            Clause::Bool(BoolOp::Or),
            cmp("$.a", CompareOp::Eq, 2),
            Clause::Bool(BoolOp::And),
            cmp("$.b", CompareOp::Eq, 3),
        ]);
        assert!(q.matches(&json("k", r#"{"a":1,"b":0}"#, 1)));
        assert!(!q.matches(&json("k", r#"{"a":2,"b":0}"#, 1)));
        assert!(q.matches(&json("k", r#"{"a":2,"b":3}"#, 1)));
    }

    #[test]
    fn groups_override_precedence() {
        // (a = 1 OR a = 2) AND b = 3
        let q = compile(vec![
            Clause::GroupOpen,
            cmp("$.a", CompareOp::Eq, 1),
            Clause::Bool(BoolOp::Or),
            cmp("$.a", CompareOp::Eq, 2),
            Clause::GroupClose,
            Clause::Bool(BoolOp::And),
            cmp("$.b", CompareOp::Eq, 3),
        ]);
        assert!(!q.matches(&json("k", r#"{"a":1,"b":0}"#, 1)));
        assert!(q.matches(&json("k", r#"{"a":1,"b":3}"#, 1)));
    }

    #[test]
    fn implicit_and_between_predicates() {
        let q = compile(vec![
            cmp("$.a", CompareOp::Gt, 1),
            cmp("$.a", CompareOp::Lt, 5),
        ]);
        assert!(q.matches(&json("k", r#"{"a":3}"#, 1)));
        assert!(!q.matches(&json("k", r#"{"a":7}"#, 1)));
    }

    #[test]
    fn unbalanced_groups_rejected() {
        let open = CompiledQuery::compile(vec![Clause::GroupOpen, cmp("$.a", CompareOp::Eq, 1)]);
        assert!(open.unwrap_err().is_invalid_argument());

        let close = CompiledQuery::compile(vec![cmp("$.a", CompareOp::Eq, 1), Clause::GroupClose]);
        assert!(close.unwrap_err().is_invalid_argument());
    }

    #[test]
    fn dangling_connectives_rejected() {
        let leading = CompiledQuery::compile(vec![Clause::Bool(BoolOp::And), cmp("$.a", CompareOp::Eq, 1)]);
        assert!(leading.is_err());
        let trailing = CompiledQuery::compile(vec![cmp("$.a", CompareOp::Eq, 1), Clause::Bool(BoolOp::Or)]);
        assert!(trailing.is_err());
        let doubled = CompiledQuery::compile(vec![
            cmp("$.a", CompareOp::Eq, 1),
            Clause::Bool(BoolOp::And),
            Clause::Bool(BoolOp::Or),
            cmp("$.a", CompareOp::Eq, 2),
        ]);
        assert!(doubled.is_err());
    }

    #[test]
    fn missing_fields_are_null() {
        let is_null = compile(vec![Clause::NullCheck {
            field: "$.missing".to_string(),
            negated: false,
        }]);
        assert!(is_null.matches(&json("k", r#"{"a":1}"#, 1)));
        assert!(is_null.matches(&json("k", r#"{"missing":null}"#, 1)));
        assert!(is_null.matches(&entry("k", TypedValue::Integer(3), 1)));

        let ne = compile(vec![cmp("$.missing", CompareOp::Ne, 1)]);
        assert!(!ne.matches(&json("k", r#"{"a":1}"#, 1)));
    }

    #[test]
    fn nan_never_equal() {
        let eq = compile(vec![cmp(VALUE_FIELD, CompareOp::Eq, f64::NAN)]);
        let ne = compile(vec![cmp(VALUE_FIELD, CompareOp::Ne, f64::NAN)]);
        let row = entry("k", TypedValue::Double(f64::NAN), 1);
        assert!(!eq.matches(&row));
        assert!(ne.matches(&row));
    }

    #[test]
    fn membership_in_double_domain() {
        let q = compile(vec![Clause::Membership {
            field: "$.n".to_string(),
            negated: false,
            values: LiteralList::Integer(vec![-21, 31]),
        }]);
        assert!(q.matches(&json("k", r#"{"n":31}"#, 1)));
        assert!(q.matches(&json("k", r#"{"n":-21.0}"#, 1)));
        assert!(!q.matches(&json("k", r#"{"n":0}"#, 1)));

        let not_in = compile(vec![Clause::Membership {
            field: "$.s".to_string(),
            negated: true,
            values: LiteralList::String(vec!["a".to_string()]),
        }]);
        assert!(not_in.matches(&json("k", r#"{"s":"b"}"#, 1)));
        assert!(!not_in.matches(&json("k", r#"{"s":"a"}"#, 1)));
        assert!(!not_in.matches(&json("k", r#"{}"#, 1)));
    }

    #[test]
    fn key_and_value_fields() {
        let q = compile(vec![Clause::Pattern {
            field: KEY_FIELD.to_string(),
            negated: false,
            pattern: "user_%".to_string(),
        }]);
        assert!(q.matches(&entry("user_1", TypedValue::Boolean(true), 1)));
        assert!(!q.matches(&entry("admin", TypedValue::Boolean(true), 1)));

        let v = compile(vec![cmp(VALUE_FIELD, CompareOp::Ge, 10i64)]);
        assert!(v.matches(&entry("a", TypedValue::Integer(10), 1)));
        assert!(v.matches(&entry("a", TypedValue::Float(10.5), 1)));
        assert!(!v.matches(&entry("a", TypedValue::from("10"), 1)));
    }

    #[test]
    fn order_limit_offset() {
        let rows = vec![
            json("a", r#"{"n":3}"#, 1),
            json("b", r#"{"n":1}"#, 2),
            json("c", r#"{}"#, 3),
            json("d", r#"{"n":2}"#, 4),
        ];
        let asc = compile(vec![Clause::OrderBy {
            field: "$.n".to_string(),
            direction: Direction::Asc,
        }]);
        let keys: Vec<_> = asc.run(rows.iter()).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["c", "b", "d", "a"]);

        let paged = compile(vec![
            Clause::OrderByWriteTime(Direction::Desc),
            Clause::Limit { count: 2, offset: 1 },
        ]);
        let keys: Vec<_> = paged.run(rows.iter()).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["c", "b"]);
    }

    #[test]
    fn count_applies_limit_and_offset() {
        let rows: Vec<Entry> = (0..5)
            .map(|i| entry(&format!("k{i}"), TypedValue::Integer(i), i as u64))
            .collect();
        assert_eq!(compile(vec![]).count(rows.iter()), 5);

        let paged = compile(vec![Clause::Limit { count: 2, offset: 1 }]);
        assert_eq!(paged.count(rows.iter()), paged.run(rows.iter()).len());
        assert_eq!(paged.count(rows.iter()), 2);

        let tail = compile(vec![Clause::Limit { count: 10, offset: 4 }]);
        assert_eq!(tail.count(rows.iter()), 1);
        let past_end = compile(vec![Clause::Limit { count: 10, offset: 9 }]);
        assert_eq!(past_end.count(rows.iter()), 0);

        let filtered = compile(vec![cmp("$value", CompareOp::Ge, 3i64)]);
        assert_eq!(filtered.count(rows.iter()), 2);
    }

    #[test]
    fn prefix_and_in_keys() {
        let rows = vec![
            entry("user_1", TypedValue::Integer(1), 1),
            entry("user_2", TypedValue::Integer(2), 2),
            entry("vip_1", TypedValue::Integer(3), 3),
        ];
        let q = compile(vec![
            Clause::PrefixKey("user_".to_string()),
            Clause::InKeys(vec!["user_2".to_string(), "vip_1".to_string()]),
        ]);
        assert_eq!(q.scan_prefix(), "user_");
        let keys: Vec<_> = q.run(rows.iter()).into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["user_2"]);
    }
}
