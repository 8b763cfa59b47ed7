//! Property-based test generators using proptest.
//!
//! Provides strategies for generating values, keys, query-building steps
//! and store operations that respect the store's input rules.

use distkv_core::query::{CompareOp, Literal};
use distkv_core::{CoreResult, KvStore, Query, TypedValue, MAX_BATCH_SIZE};
use proptest::prelude::*;

/// Strategy for generating valid keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("Invalid regex")
}

/// Strategy for generating typed values.
///
/// Floating point values are finite so that generated values compare equal
/// to themselves.
pub fn typed_value_strategy() -> impl Strategy<Value = TypedValue> {
    prop_oneof![
        "\\PC{0,32}".prop_map(TypedValue::String),
        any::<i64>().prop_map(TypedValue::Integer),
        any::<f32>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(TypedValue::Float),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(TypedValue::Double),
        any::<bool>().prop_map(TypedValue::Boolean),
        prop::collection::vec(any::<u8>(), 0..256).prop_map(TypedValue::ByteArray),
    ]
}

/// Strategy for generating query field paths.
pub fn field_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(distkv_core::query::KEY_FIELD.to_string()),
        Just(distkv_core::query::VALUE_FIELD.to_string()),
        prop::string::string_regex("\\$\\.[a-z]{1,8}(\\.[a-z]{1,8})?").expect("Invalid regex"),
    ]
}

/// Strategy for free text, including characters the plan format escapes.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z ^%_()]{0,12}").expect("Invalid regex")
}

/// Strategy for single-word identifiers such as prefixes and device ids.
pub fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z0-9_ ]{1,12}").expect("Invalid regex")
}

/// Strategy for comparison literals.
pub fn literal_strategy() -> impl Strategy<Value = Literal> {
    prop_oneof![
        any::<i32>().prop_map(Literal::Integer),
        any::<i64>().prop_map(Literal::Long),
        any::<f64>()
            .prop_filter("finite", |f| f.is_finite())
            .prop_map(Literal::Double),
        text_strategy().prop_map(Literal::String),
        any::<bool>().prop_map(Literal::Bool),
    ]
}

fn compare_op_strategy() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
    ]
}

/// One step of building a query.
#[derive(Debug, Clone)]
pub enum QueryStep {
    /// A comparison.
    Compare {
        /// Field path.
        field: String,
        /// Operator.
        op: CompareOp,
        /// Right-hand side.
        literal: Literal,
    },
    /// Numeric membership.
    InNumber {
        /// Field path.
        field: String,
        /// Candidates.
        values: Vec<f64>,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// String membership.
    InString {
        /// Field path.
        field: String,
        /// Candidates.
        values: Vec<String>,
        /// `NOT IN` when true.
        negated: bool,
    },
    /// Pattern match.
    Like {
        /// Field path.
        field: String,
        /// Pattern.
        pattern: String,
        /// `NOT LIKE` when true.
        negated: bool,
    },
    /// Null check.
    NullCheck {
        /// Field path.
        field: String,
        /// `IS NOT NULL` when true.
        negated: bool,
    },
    /// `AND`
    And,
    /// `OR`
    Or,
    /// Opening parenthesis.
    BeginGroup,
    /// Closing parenthesis.
    EndGroup,
    /// Sort key.
    OrderBy {
        /// Field path.
        field: String,
        /// Ascending when true.
        ascending: bool,
    },
    /// Pagination.
    Limit {
        /// Row count.
        count: i32,
        /// Rows skipped.
        offset: i32,
    },
    /// Key prefix.
    PrefixKey(String),
    /// Device scope.
    DeviceId(String),
    /// Index hint.
    SuggestIndex(String),
}

impl QueryStep {
    /// Applies this step to `query` through the builder.
    pub fn apply(&self, query: &mut Query) -> CoreResult<()> {
        match self {
            Self::Compare { field, op, literal } => {
                let literal = literal.clone();
                match op {
                    CompareOp::Eq => query.equal_to(field, literal)?,
                    CompareOp::Ne => query.not_equal_to(field, literal)?,
                    CompareOp::Gt => query.greater_than(field, literal)?,
                    CompareOp::Ge => query.greater_than_or_equal_to(field, literal)?,
                    CompareOp::Lt => query.less_than(field, literal)?,
                    CompareOp::Le => query.less_than_or_equal_to(field, literal)?,
                };
            }
            Self::InNumber {
                field,
                values,
                negated: false,
            } => {
                query.in_number(field, values.clone())?;
            }
            Self::InNumber { field, values, .. } => {
                query.not_in_number(field, values.clone())?;
            }
            Self::InString {
                field,
                values,
                negated: false,
            } => {
                query.in_string(field, values.clone())?;
            }
            Self::InString { field, values, .. } => {
                query.not_in_string(field, values.clone())?;
            }
            Self::Like {
                field,
                pattern,
                negated: false,
            } => {
                query.like(field, pattern)?;
            }
            Self::Like { field, pattern, .. } => {
                query.unlike(field, pattern)?;
            }
            Self::NullCheck {
                field,
                negated: false,
            } => {
                query.is_null(field)?;
            }
            Self::NullCheck { field, .. } => {
                query.is_not_null(field)?;
            }
            Self::And => {
                query.and();
            }
            Self::Or => {
                query.or();
            }
            Self::BeginGroup => {
                query.begin_group();
            }
            Self::EndGroup => {
                query.end_group();
            }
            Self::OrderBy {
                field,
                ascending: true,
            } => {
                query.order_by_asc(field)?;
            }
            Self::OrderBy { field, .. } => {
                query.order_by_desc(field)?;
            }
            Self::Limit { count, offset } => {
                query.limit(*count, *offset)?;
            }
            Self::PrefixKey(prefix) => {
                query.prefix_key(prefix)?;
            }
            Self::DeviceId(id) => {
                query.device_id(id)?;
            }
            Self::SuggestIndex(field) => {
                query.set_suggest_index(field)?;
            }
        }
        Ok(())
    }

    /// Whether this step is a filter predicate.
    #[must_use]
    pub fn is_predicate(&self) -> bool {
        matches!(
            self,
            Self::Compare { .. }
                | Self::InNumber { .. }
                | Self::InString { .. }
                | Self::Like { .. }
                | Self::NullCheck { .. }
        )
    }
}

/// Strategy for one query-building step.
pub fn query_step_strategy() -> impl Strategy<Value = QueryStep> {
    prop_oneof![
        4 => (field_strategy(), compare_op_strategy(), literal_strategy())
            .prop_map(|(field, op, literal)| QueryStep::Compare { field, op, literal }),
        1 => (
            field_strategy(),
            prop::collection::vec(-1.0e6f64..1.0e6, 0..5),
            any::<bool>()
        )
            .prop_map(|(field, values, negated)| QueryStep::InNumber { field, values, negated }),
        1 => (
            field_strategy(),
            prop::collection::vec(text_strategy(), 0..5),
            any::<bool>()
        )
            .prop_map(|(field, values, negated)| QueryStep::InString { field, values, negated }),
        1 => (field_strategy(), text_strategy(), any::<bool>())
            .prop_map(|(field, pattern, negated)| QueryStep::Like { field, pattern, negated }),
        1 => (field_strategy(), any::<bool>())
            .prop_map(|(field, negated)| QueryStep::NullCheck { field, negated }),
        1 => Just(QueryStep::And),
        1 => Just(QueryStep::Or),
        1 => Just(QueryStep::BeginGroup),
        1 => Just(QueryStep::EndGroup),
        1 => (field_strategy(), any::<bool>())
            .prop_map(|(field, ascending)| QueryStep::OrderBy { field, ascending }),
        1 => (0..100i32, 0..100i32).prop_map(|(count, offset)| QueryStep::Limit { count, offset }),
        1 => word_strategy().prop_map(QueryStep::PrefixKey),
        1 => word_strategy().prop_map(QueryStep::DeviceId),
        1 => field_strategy().prop_map(QueryStep::SuggestIndex),
    ]
}

/// Strategy for a sequence of query-building steps.
pub fn query_steps_strategy(max_steps: usize) -> impl Strategy<Value = Vec<QueryStep>> {
    prop::collection::vec(query_step_strategy(), 0..max_steps)
}

/// Builds a query from steps, failing on the first rejected step.
pub fn build_query(steps: &[QueryStep]) -> CoreResult<Query> {
    let mut query = Query::new();
    for step in steps {
        step.apply(&mut query)?;
    }
    Ok(query)
}

/// A store mutation.
#[derive(Debug, Clone)]
pub enum StoreOperation {
    /// Write one key.
    Put {
        /// Key.
        key: String,
        /// Value.
        value: TypedValue,
    },
    /// Delete one key.
    Delete {
        /// Key.
        key: String,
    },
    /// Write several keys at once.
    PutBatch(Vec<(String, TypedValue)>),
    /// Delete several keys at once.
    DeleteBatch(Vec<String>),
}

impl StoreOperation {
    /// Runs the operation against `store`.
    pub fn apply(&self, store: &KvStore) -> CoreResult<()> {
        match self {
            Self::Put { key, value } => store.put(key, value.clone()),
            Self::Delete { key } => store.delete(key),
            Self::PutBatch(entries) => store.put_batch(entries.iter().cloned()),
            Self::DeleteBatch(keys) => store.delete_batch(keys),
        }
    }
}

/// Strategy for store mutations over a small key space, so that writes
/// collide often.
pub fn store_operation_strategy() -> impl Strategy<Value = StoreOperation> {
    let key = || prop::string::string_regex("k[0-9]").expect("Invalid regex");
    prop_oneof![
        3 => (key(), typed_value_strategy())
            .prop_map(|(key, value)| StoreOperation::Put { key, value }),
        2 => key().prop_map(|key| StoreOperation::Delete { key }),
        1 => prop::collection::vec((key(), typed_value_strategy()), 0..8)
            .prop_map(StoreOperation::PutBatch),
        1 => prop::collection::vec(key(), 0..8).prop_map(StoreOperation::DeleteBatch),
    ]
}

/// Strategy for a sequence of store mutations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<StoreOperation>> {
    prop::collection::vec(store_operation_strategy(), min_ops..max_ops)
}

/// Strategy for a batch of distinct keys with values, within the batch
/// bound.
pub fn entry_batch_strategy(
    min: usize,
    max: usize,
) -> impl Strategy<Value = Vec<(String, TypedValue)>> {
    let max = max.min(MAX_BATCH_SIZE + 1);
    prop::collection::btree_map(key_strategy(), typed_value_strategy(), min..max)
        .prop_map(|m| m.into_iter().collect())
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
