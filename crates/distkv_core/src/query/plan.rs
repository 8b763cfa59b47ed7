//! Parser for rendered plan strings.

use super::clause::{
    self, unescape, BoolOp, Clause, CompareOp, Direction, ASC, BEGIN_GROUP, DESC, DEVICE_ID, END,
    END_GROUP, IN, IN_KEYS, IS_ASC, IS_DESC, IS_NOT_NULL, IS_NULL, KEY_PREFIX, LIKE, LIMIT,
    NOT_IN, NOT_LIKE, ORDER_BY_WRITE_TIME, START, SUGGEST_INDEX,
};
use super::literal::{
    Literal, LiteralList, TYPE_BOOL, TYPE_DOUBLE, TYPE_INTEGER, TYPE_LONG, TYPE_STRING,
};
use crate::error::{CoreError, CoreResult};

/// Maximum length of a plan string accepted for execution.
pub const MAX_QUERY_LENGTH: usize = 5 * 1024;

/// Maximum number of clauses parsed from one plan.
const MAX_QUERY_COMPLEXITY: usize = 500;

/// Parses a plan string back into clauses.
///
/// # Errors
///
/// Returns `OverLimit` for plans longer than [`MAX_QUERY_LENGTH`] or with
/// too many clauses, and `InvalidArgument` for malformed plans.
pub fn parse(plan: &str) -> CoreResult<Vec<Clause>> {
    if plan.len() > MAX_QUERY_LENGTH {
        return Err(CoreError::over_limit(format!(
            "query plan is {} bytes, limit is {MAX_QUERY_LENGTH}",
            plan.len()
        )));
    }
    let words: Vec<&str> = plan.split(' ').filter(|w| !w.is_empty()).collect();
    let mut parser = Parser { words, pos: 0 };
    let mut clauses = Vec::new();
    while !parser.done() {
        if clauses.len() >= MAX_QUERY_COMPLEXITY {
            return Err(CoreError::over_limit(format!(
                "query has more than {MAX_QUERY_COMPLEXITY} clauses"
            )));
        }
        clauses.push(parser.clause()?);
    }
    Ok(clauses)
}

struct Parser<'a> {
    words: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn done(&self) -> bool {
        self.pos >= self.words.len()
    }

    fn next(&mut self, what: &str) -> CoreResult<&'a str> {
        let word = self
            .words
            .get(self.pos)
            .copied()
            .ok_or_else(|| malformed(format!("missing {what}")))?;
        self.pos += 1;
        Ok(word)
    }

    fn expect(&mut self, keyword: &str) -> CoreResult<()> {
        let word = self.next(keyword)?;
        if word != keyword {
            return Err(malformed(format!("expected {keyword}, found {word}")));
        }
        Ok(())
    }

    fn text(&mut self, what: &str) -> CoreResult<String> {
        self.next(what).map(unescape)
    }

    fn clause(&mut self) -> CoreResult<Clause> {
        let keyword = self.next("keyword")?;
        if let Some(op) = CompareOp::from_keyword(keyword) {
            let type_name = self.next("type")?;
            let field = self.text("field")?;
            let literal = parse_literal(type_name, self.next("value")?)?;
            return Ok(Clause::Compare { field, op, literal });
        }
        let clause = match keyword {
            IS_NULL | IS_NOT_NULL => Clause::NullCheck {
                field: self.text("field")?,
                negated: keyword == IS_NOT_NULL,
            },
            IN | NOT_IN => {
                let type_name = self.next("type")?;
                let field = self.text("field")?;
                self.expect(START)?;
                let words = self.list()?;
                Clause::Membership {
                    field,
                    negated: keyword == NOT_IN,
                    values: parse_list(type_name, &words)?,
                }
            }
            LIKE | NOT_LIKE => Clause::Pattern {
                field: self.text("field")?,
                negated: keyword == NOT_LIKE,
                pattern: self.text("pattern")?,
            },
            clause::AND => Clause::Bool(BoolOp::And),
            clause::OR => Clause::Bool(BoolOp::Or),
            BEGIN_GROUP => Clause::GroupOpen,
            END_GROUP => Clause::GroupClose,
            ASC | DESC => Clause::OrderBy {
                field: self.text("field")?,
                direction: if keyword == ASC {
                    Direction::Asc
                } else {
                    Direction::Desc
                },
            },
            ORDER_BY_WRITE_TIME => match self.next("direction")? {
                IS_ASC => Clause::OrderByWriteTime(Direction::Asc),
                IS_DESC => Clause::OrderByWriteTime(Direction::Desc),
                other => return Err(malformed(format!("bad write time direction {other}"))),
            },
            LIMIT => Clause::Limit {
                count: parse_number(self.next("count")?)?,
                offset: parse_number(self.next("offset")?)?,
            },
            SUGGEST_INDEX => Clause::SuggestIndex(self.text("index")?),
            DEVICE_ID => Clause::DeviceId(self.text("device id")?),
            KEY_PREFIX => Clause::PrefixKey(self.text("prefix")?),
            IN_KEYS => {
                self.expect(START)?;
                Clause::InKeys(self.list()?.iter().map(|w| unescape(w)).collect())
            }
            other => return Err(malformed(format!("unknown keyword {other}"))),
        };
        Ok(clause)
    }

    /// Reads words up to the closing `^END`.
    fn list(&mut self) -> CoreResult<Vec<&'a str>> {
        let mut items = Vec::new();
        loop {
            match self.next(END)? {
                END => return Ok(items),
                word => items.push(word),
            }
        }
    }
}

fn malformed(message: String) -> CoreError {
    CoreError::invalid_argument(format!("malformed query plan: {message}"))
}

fn parse_number<T: std::str::FromStr>(word: &str) -> CoreResult<T> {
    word.parse()
        .map_err(|_| malformed(format!("'{word}' is not a valid number")))
}

fn parse_numbers<T: std::str::FromStr>(words: &[&str]) -> CoreResult<Vec<T>> {
    words.iter().map(|w| parse_number(w)).collect()
}

fn parse_literal(type_name: &str, word: &str) -> CoreResult<Literal> {
    Ok(match type_name {
        TYPE_INTEGER => Literal::Integer(parse_number(word)?),
        TYPE_LONG => Literal::Long(parse_number(word)?),
        TYPE_DOUBLE => Literal::Double(parse_number(word)?),
        TYPE_STRING => Literal::String(unescape(word)),
        TYPE_BOOL => match word {
            "true" => Literal::Bool(true),
            "false" => Literal::Bool(false),
            _ => return Err(malformed(format!("'{word}' is not a boolean"))),
        },
        other => return Err(malformed(format!("unknown type {other}"))),
    })
}

fn parse_list(type_name: &str, words: &[&str]) -> CoreResult<LiteralList> {
    Ok(match type_name {
        TYPE_INTEGER => LiteralList::Integer(parse_numbers(words)?),
        TYPE_LONG => LiteralList::Long(parse_numbers(words)?),
        TYPE_DOUBLE => LiteralList::Double(parse_numbers(words)?),
        TYPE_STRING => LiteralList::String(words.iter().map(|w| unescape(w)).collect()),
        other => return Err(malformed(format!("unknown list type {other}"))),
    })
}
