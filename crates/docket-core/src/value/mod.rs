mod compare;
mod json;


use crate::types::{ObjectId, Timestamp};
use std::collections::BTreeMap;

pub use compare::compare_values;
pub use json::{JsonNumberError, document_from_json, document_to_json};

///
/// Document
///
/// Map node of the value tree. Entity records and stored documents share
/// this shape; they differ only in key namespace.
///

pub type Document = BTreeMap<String, Value>;

///
/// Value
///
/// Tagged value tree decided once at the store boundary. Store-native leaf
/// types (`Timestamp`, `Binary`, `ObjectId`) are explicit variants rather
/// than inferred from runtime shape.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(Timestamp),
    Binary(Vec<u8>),
    ObjectId(ObjectId),
    Array(Vec<Self>),
    Map(Document),
}

impl Value {
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Binary(_) => ValueKind::Binary,
            Self::ObjectId(_) => ValueKind::ObjectId,
            Self::Array(_) => ValueKind::Array,
            Self::Map(_) => ValueKind::Map,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&Document> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Walk one path component: map key lookup, or array index when the
    /// component parses as one.
    #[must_use]
    pub fn child(&self, component: &str) -> Option<&Self> {
        match self {
            Self::Map(map) => map.get(component),
            Self::Array(items) => component.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Equality under the store's total order (`Int(1)` equals `Float(1.0)`).
    #[must_use]
    pub fn store_eq(&self, other: &Self) -> bool {
        compare_values(self, other).is_eq()
    }
}

/// Resolve a path inside a document.
#[must_use]
pub fn lookup_path<'a, S: AsRef<str>>(doc: &'a Document, path: &[S]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = doc.get(first.as_ref())?;
    for component in rest {
        current = current.child(component.as_ref())?;
    }

    Some(current)
}

/// Deep assign; missing or non-map intermediates become maps.
pub fn set_path<S: AsRef<str>>(root: &mut Document, path: &[S], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut cursor = root;
    for key in parents {
        let slot = cursor
            .entry(key.as_ref().to_string())
            .or_insert_with(|| Value::Map(Document::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(Document::new());
        }
        let Value::Map(next) = slot else {
            return;
        };
        cursor = next;
    }

    cursor.insert(last.as_ref().to_string(), value);
}

///
/// ValueKind
///

#[derive(Clone, Copy, Debug, derive_more::Display, Eq, PartialEq)]
pub enum ValueKind {
    #[display("null")]
    Null,
    #[display("bool")]
    Bool,
    #[display("int")]
    Int,
    #[display("float")]
    Float,
    #[display("text")]
    Text,
    #[display("timestamp")]
    Timestamp,
    #[display("binary")]
    Binary,
    #[display("object id")]
    ObjectId,
    #[display("array")]
    Array,
    #[display("map")]
    Map,
}

macro_rules! impl_value_from {
    ($( $ty:ty => $variant:ident ),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i32 => Int,
    i64 => Int,
    u32 => Int,
    f64 => Float,
    String => Text,
    &str => Text,
    Timestamp => Timestamp,
    ObjectId => ObjectId,
    Vec<Value> => Array,
    Document => Map,
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}
