//! Module: projection
//! Responsibility: build response objects from `from[:to]` field selectors.
//! Does not own: selector parsing rules (see `key`).


use crate::{
    codec,
    key::{KeyError, Selector, split_path},
    value::{Document, Value, set_path},
};

// Prefix of a doubled meta sigil; unescaped to a single `$` in default targets.
const LITERAL_SIGIL_PREFIX: &str = "$$";

///
/// FieldMapping
///
/// One selector: where to read (`from`) and where to write (`to`, raw keys;
/// empty means the response root).
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldMapping {
    pub from: Selector,
    pub to: Vec<String>,
}

impl FieldMapping {
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        let (from_text, to_text) = match raw.split_once(':') {
            Some((from, to)) => (from, Some(to)),
            None => (raw, None),
        };

        let from = Selector::parse(from_text)?;
        let to = match to_text {
            Some(to) => split_path(to),
            None => split_path(from_text)
                .into_iter()
                .map(|component| {
                    if component.starts_with(LITERAL_SIGIL_PREFIX) {
                        component[1..].to_string()
                    } else {
                        component
                    }
                })
                .collect(),
        };

        Ok(Self { from, to })
    }
}

///
/// FieldSelectors
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldSelectors(Vec<FieldMapping>);

impl FieldSelectors {
    /// Parse every occurrence of a field-selector parameter; each occurrence
    /// is a comma-separated list. No occurrences selects the whole entity.
    pub fn parse<S: AsRef<str>>(occurrences: &[S]) -> Result<Self, KeyError> {
        if occurrences.is_empty() {
            return Ok(Self::root());
        }

        let mut mappings = Vec::new();
        for occurrence in occurrences {
            for raw in occurrence.as_ref().split(',') {
                mappings.push(FieldMapping::parse(raw)?);
            }
        }

        Ok(Self(mappings))
    }

    /// The single root-to-root selector.
    #[must_use]
    pub fn root() -> Self {
        Self(vec![FieldMapping {
            from: Selector::root(),
            to: Vec::new(),
        }])
    }

    #[must_use]
    pub fn mappings(&self) -> &[FieldMapping] {
        &self.0
    }
}

impl Default for FieldSelectors {
    fn default() -> Self {
        Self::root()
    }
}

/// Build the response object for one resource.
///
/// Meta selectors read from `stored`; everything else reads from `entity`.
/// Mappings apply in ascending target depth, so a root copy never clobbers a
/// nested one.
#[must_use]
pub fn project(stored: &Document, entity: &Document, selectors: &FieldSelectors) -> Document {
    let mut ordered: Vec<&FieldMapping> = selectors.0.iter().collect();
    ordered.sort_by_key(|mapping| mapping.to.len());

    let mut result = Document::new();
    for mapping in ordered {
        let Some(value) = select(stored, entity, &mapping.from) else {
            continue;
        };

        if mapping.to.is_empty() {
            if let Value::Map(map) = value {
                result.extend(map);
            }
        } else {
            set_path(&mut result, &mapping.to, value);
        }
    }

    result
}

fn select(stored: &Document, entity: &Document, from: &Selector) -> Option<Value> {
    let mut keys = from.entity_keys();

    let mut current = match from.meta_field() {
        Some(field) => codec::meta_value(stored, field)?,
        None => match keys.next() {
            Some(first) => entity.get(first)?,
            None => return Some(Value::Map(entity.clone())),
        },
    };

    for key in keys {
        current = current.child(key)?;
    }

    Some(current.clone())
}
