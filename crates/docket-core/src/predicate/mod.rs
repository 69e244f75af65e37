//! Module: predicate
//! Responsibility: store-level predicate tree and its evaluation.
//! Does not own: filter syntax (see `filter`) or cursor decoding.


use crate::{
    key::StoragePath,
    value::{Document, Value, compare_values, lookup_path},
};
use std::cmp::Ordering;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CompareOp {
    Lt,
    Lte,
    Eq,
    Gte,
    Gt,
}

impl CompareOp {
    pub const ALL: [Self; 5] = [Self::Lt, Self::Lte, Self::Eq, Self::Gte, Self::Gt];

    /// Filter-expression spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Eq => "=",
            Self::Gte => ">=",
            Self::Gt => ">",
        }
    }

    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == symbol)
    }

    /// Query-document operator name.
    #[must_use]
    pub const fn query_operator(self) -> &'static str {
        match self {
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Eq => "$eq",
            Self::Gte => "$gte",
            Self::Gt => "$gt",
        }
    }

    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Lt => ordering.is_lt(),
            Self::Lte => ordering.is_le(),
            Self::Eq => ordering.is_eq(),
            Self::Gte => ordering.is_ge(),
            Self::Gt => ordering.is_gt(),
        }
    }
}

///
/// Predicate
///
/// Boolean tree over storage paths. Missing fields compare as `Null`.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Compare {
        path: StoragePath,
        op: CompareOp,
        value: Value,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
}

impl Predicate {
    #[must_use]
    pub const fn compare(path: StoragePath, op: CompareOp, value: Value) -> Self {
        Self::Compare { path, op, value }
    }

    /// Conjunction of zero or more predicates.
    ///
    /// Zero conjuncts yield no predicate and a single conjunct is returned
    /// bare, so stores never see a redundant one-element `And`.
    #[must_use]
    pub fn all(mut conjuncts: Vec<Self>) -> Option<Self> {
        match conjuncts.len() {
            0 => None,
            1 => conjuncts.pop(),
            _ => Some(Self::And(conjuncts)),
        }
    }

    #[must_use]
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Self::Compare { path, op, value } => {
                let actual = lookup_path(doc, path.as_slice()).unwrap_or(&Value::Null);
                op.holds(compare_values(actual, value))
            }
            Self::And(children) => children.iter().all(|child| child.matches(doc)),
            Self::Or(children) => children.iter().any(|child| child.matches(doc)),
        }
    }

    /// Render in the document store's query shape
    /// (`{"path": {"$op": value}}`, `{"$and": [...]}`, `{"$or": [...]}`).
    #[must_use]
    pub fn to_query_document(&self) -> Document {
        let mut out = Document::new();
        match self {
            Self::Compare { path, op, value } => {
                let mut inner = Document::new();
                inner.insert(op.query_operator().to_string(), value.clone());
                out.insert(path.to_string(), Value::Map(inner));
            }
            Self::And(children) => {
                out.insert("$and".to_string(), render_children(children));
            }
            Self::Or(children) => {
                out.insert("$or".to_string(), render_children(children));
            }
        }

        out
    }
}

fn render_children(children: &[Predicate]) -> Value {
    Value::Array(
        children
            .iter()
            .map(|child| Value::Map(child.to_query_document()))
            .collect(),
    )
}
