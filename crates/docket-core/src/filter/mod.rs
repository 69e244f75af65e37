//! Module: filter
//! Responsibility: the `filter` query-parameter language and per-ordering
//! filter tables.
//! Does not own: predicate evaluation (see `predicate`).


use crate::{
    key::percent_decode,
    ordering::OrderField,
    predicate::{CompareOp, Predicate},
    types::Timestamp,
    value::Value,
};
use std::{collections::BTreeMap, fmt, sync::Arc};
use thiserror::Error as ThisError;

// Characters that make up a filter operator.
const OPERATOR_CHARS: [char; 3] = ['<', '=', '>'];

/// Converts the raw text of a filter value into a typed value.
pub type ValueParser = Arc<dyn Fn(&str) -> Result<Value, FilterError> + Send + Sync>;

/// Builds the store predicate for one `(field, operator)` pair.
pub type PredicateBuilder = Arc<dyn Fn(Value) -> Predicate + Send + Sync>;

///
/// FilterError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum FilterError {
    #[error("malformed filter '{expression}': {reason}")]
    Syntax { expression: String, reason: String },

    #[error("no operator \"{op}\" for key \"{field}\"")]
    NoSuchFilterOperator { field: String, op: String },

    #[error("unrepresentable number '{literal}'")]
    UnrepresentableNumber { literal: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

///
/// FilterExpression
///
/// One `<key><op><value>` term after percent-decoding.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterExpression {
    pub field: String,
    pub op: CompareOp,
    pub value: String,
}

/// Parse a single filter term.
///
/// The operator is the run of `<`, `=`, `>` characters following the key.
/// Operator characters after the value has started are rejected.
pub fn parse_expression(raw: &str) -> Result<FilterExpression, FilterError> {
    let syntax = |reason: &str| FilterError::Syntax {
        expression: raw.to_string(),
        reason: reason.to_string(),
    };

    let mut field = String::new();
    let mut operator = String::new();
    let mut value = String::new();

    for ch in raw.chars() {
        if OPERATOR_CHARS.contains(&ch) {
            if !value.is_empty() {
                return Err(syntax("too many operators"));
            }
            operator.push(ch);
        } else if operator.is_empty() {
            field.push(ch);
        } else {
            value.push(ch);
        }
    }

    if operator.is_empty() {
        return Err(syntax("no operator"));
    }
    let op = CompareOp::from_symbol(&operator)
        .ok_or_else(|| syntax(&format!("unknown operator '{operator}'")))?;

    Ok(FilterExpression {
        field: percent_decode(&field).ok_or_else(|| syntax("malformed escape in key"))?,
        op,
        value: percent_decode(&value).ok_or_else(|| syntax("malformed escape in value"))?,
    })
}

/// Parse every `filter` occurrence into store predicates.
///
/// Occurrences and the comma-separated terms inside them are conjunctive;
/// the result lists one predicate per term, in order.
pub fn parse_filter<S: AsRef<str>>(
    occurrences: &[S],
    table: &FilterTable,
) -> Result<Vec<Predicate>, FilterError> {
    let mut conjuncts = Vec::new();

    for occurrence in occurrences {
        for raw in occurrence.as_ref().split(',') {
            let expression = parse_expression(raw)?;
            let builder = table.operator(&expression.field, expression.op).ok_or_else(|| {
                FilterError::NoSuchFilterOperator {
                    field: expression.field.clone(),
                    op: expression.op.symbol().to_string(),
                }
            })?;

            let value = match table.parser(&expression.field) {
                Some(parser) => parser(&expression.value)?,
                None => default_value_parser(&expression.value)?,
            };
            conjuncts.push(builder(value));
        }
    }

    Ok(conjuncts)
}

/// Default filter value parsing.
///
/// `null`, `true` and `false` literals; ISO-8601 timestamps; decimal
/// literals that survive an exact round trip through `i64` or `f64`;
/// anything else is text.
pub fn default_value_parser(text: &str) -> Result<Value, FilterError> {
    match text {
        "null" => return Ok(Value::Null),
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }

    if let Some(ts) = Timestamp::parse_iso8601(text) {
        return Ok(Value::Timestamp(ts));
    }

    if is_numeric_literal(text) {
        return parse_number(text);
    }

    Ok(Value::Text(text.to_string()))
}

// Matches `^(\d*\.)?\d+$`.
fn is_numeric_literal(text: &str) -> bool {
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => ("", text),
    };

    whole.bytes().all(|b| b.is_ascii_digit())
        && !fraction.is_empty()
        && fraction.bytes().all(|b| b.is_ascii_digit())
}

fn parse_number(text: &str) -> Result<Value, FilterError> {
    let unrepresentable = || FilterError::UnrepresentableNumber {
        literal: text.to_string(),
    };

    if !text.contains('.') {
        let int: i64 = text.parse().map_err(|_| unrepresentable())?;
        return if int.to_string() == text {
            Ok(Value::Int(int))
        } else {
            Err(unrepresentable())
        };
    }

    let float: f64 = text.parse().map_err(|_| unrepresentable())?;
    let rendered = float.to_string();
    if rendered == text || format!("0{text}") == rendered {
        Ok(Value::Float(float))
    } else {
        Err(unrepresentable())
    }
}

///
/// FieldFilter
///

#[derive(Clone, Default)]
struct FieldFilter {
    parser: Option<ValueParser>,
    operators: BTreeMap<CompareOp, PredicateBuilder>,
}

///
/// FilterTable
///
/// Per-ordering map of filterable keys to their value parser and the
/// predicate builder for each supported operator.
///

#[derive(Clone, Default)]
pub struct FilterTable {
    fields: BTreeMap<String, FieldFilter>,
}

impl FilterTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Range and equality filters on every field of a normalized ordering,
    /// keyed by the field's selector text.
    #[must_use]
    pub fn with_defaults(fields: &[OrderField]) -> Self {
        let mut table = Self::new();
        for field in fields {
            let path = field.selector.to_storage_path();
            for op in CompareOp::ALL {
                let path = path.clone();
                table.set_operator(
                    field.selector.source(),
                    op,
                    Arc::new(move |value| Predicate::compare(path.clone(), op, value)),
                );
            }
        }

        table
    }

    pub fn set_operator(&mut self, field: &str, op: CompareOp, builder: PredicateBuilder) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .operators
            .insert(op, builder);
    }

    pub fn set_parser(&mut self, field: &str, parser: ValueParser) {
        self.fields.entry(field.to_string()).or_default().parser = Some(parser);
    }

    /// Layer `overrides` on top of this table, per `(field, operator)`.
    pub fn merge(&mut self, overrides: &Self) {
        for (name, field) in &overrides.fields {
            let entry = self.fields.entry(name.clone()).or_default();
            if field.parser.is_some() {
                entry.parser.clone_from(&field.parser);
            }
            for (op, builder) in &field.operators {
                entry.operators.insert(*op, Arc::clone(builder));
            }
        }
    }

    #[must_use]
    pub fn operator(&self, field: &str, op: CompareOp) -> Option<&PredicateBuilder> {
        self.fields.get(field)?.operators.get(&op)
    }

    #[must_use]
    pub fn parser(&self, field: &str) -> Option<&ValueParser> {
        self.fields.get(field)?.parser.as_ref()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Debug for FilterTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, field) in &self.fields {
            let ops: Vec<&str> = field.operators.keys().map(|op| op.symbol()).collect();
            map.entry(name, &ops);
        }
        map.finish()
    }
}
