//! Module: ordering
//! Responsibility: declared orderings → storage sort / index keys.
//! Boundary: every compiled key ends with the storage identifier so the
//! order is total.

#[cfg(test)]
mod tests;

use crate::{
    key::{KeyError, STORAGE_ID_FIELD, Selector, StoragePath},
    predicate::CompareOp,
    value::{Document, Value, compare_values, lookup_path},
};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeSet, fmt};
use thiserror::Error as ThisError;

/// Name suffix that serves a declared ordering backwards.
pub const REVERSE_SUFFIX: &str = "-reverse";

///
/// OrderingError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum OrderingError {
    #[error("direction for '{field}' must be 1 or -1, found {raw}")]
    InvalidDirection { field: String, raw: i64 },

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error("ordering sorts on '{path}' more than once")]
    DuplicateField { path: String },
}

///
/// Direction
///
/// Sort direction of one ordering field.
///

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Validate a raw `1` / `-1` direction.
    #[must_use]
    pub const fn from_raw(raw: i64) -> Option<Self> {
        match raw {
            1 => Some(Self::Asc),
            -1 => Some(Self::Desc),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_raw(self) -> i64 {
        match self {
            Self::Asc => 1,
            Self::Desc => -1,
        }
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    /// Marker used in suggested index names.
    #[must_use]
    pub const fn suffix(self) -> char {
        match self {
            Self::Asc => '+',
            Self::Desc => '-',
        }
    }

    /// Strict comparison selecting rows after a boundary value.
    #[must_use]
    pub const fn continuation_op(self) -> CompareOp {
        match self {
            Self::Asc => CompareOp::Gt,
            Self::Desc => CompareOp::Lt,
        }
    }
}

///
/// OrderField
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OrderField {
    pub selector: Selector,
    pub direction: Direction,
}

impl OrderField {
    /// Parse a declared `(field, direction)` pair.
    pub fn parse(field: &str, raw_direction: i64) -> Result<Self, OrderingError> {
        let direction =
            Direction::from_raw(raw_direction).ok_or_else(|| OrderingError::InvalidDirection {
                field: field.to_string(),
                raw: raw_direction,
            })?;

        Ok(Self {
            selector: Selector::parse(field)?,
            direction,
        })
    }
}

///
/// IndexKeyField
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct IndexKeyField {
    pub path: StoragePath,
    pub direction: Direction,
}

///
/// IndexKey
///
/// Compiled storage sort key; doubles as the index key shape.
///

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct IndexKey(Vec<IndexKeyField>);

impl IndexKey {
    #[must_use]
    pub const fn new(fields: Vec<IndexKeyField>) -> Self {
        Self(fields)
    }

    #[must_use]
    pub fn fields(&self) -> &[IndexKeyField] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Order two stored documents under this key. Missing fields sort as null.
    #[must_use]
    pub fn compare_documents(&self, left: &Document, right: &Document) -> Ordering {
        for field in &self.0 {
            let a = lookup_path(left, field.path.as_slice()).unwrap_or(&Value::Null);
            let b = lookup_path(right, field.path.as_slice()).unwrap_or(&Value::Null);
            let ord = match field.direction {
                Direction::Asc => compare_values(a, b),
                Direction::Desc => compare_values(b, a),
            };
            if ord.is_ne() {
                return ord;
            }
        }

        Ordering::Equal
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (idx, field) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field.path, field.direction.as_raw())?;
        }
        f.write_str("}")
    }
}

/// Compile an ordering into its storage key.
///
/// `reverse` inverts every direction. The identifier is appended when absent,
/// ascending (descending when reversed).
pub fn compile(fields: &[OrderField], reverse: bool) -> Result<IndexKey, OrderingError> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::with_capacity(fields.len() + 1);

    for field in fields {
        let path = field.selector.to_storage_path();
        if !seen.insert(path.clone()) {
            return Err(OrderingError::DuplicateField {
                path: path.to_string(),
            });
        }

        let direction = if reverse {
            field.direction.reversed()
        } else {
            field.direction
        };
        out.push(IndexKeyField { path, direction });
    }

    let id_path = StoragePath::new(vec![STORAGE_ID_FIELD.to_string()]);
    if !seen.contains(&id_path) {
        let direction = if reverse {
            Direction::Desc
        } else {
            Direction::Asc
        };
        out.push(IndexKeyField {
            path: id_path,
            direction,
        });
    }

    Ok(IndexKey(out))
}

/// Human-readable index name for a normalized ordering.
#[must_use]
pub fn suggested_index_name(fields: &[OrderField]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .map(|field| format!("{}{}", field.selector, field.direction.suffix()))
        .collect();

    format!("Order [{}]", parts.join(","))
}

/// Split a requested ordering name into its declared name and reverse flag.
#[must_use]
pub fn parse_ordering_name(name: &str) -> (&str, bool) {
    name.strip_suffix(REVERSE_SUFFIX)
        .map_or((name, false), |base| (base, true))
}
