//! Module: key
//! Responsibility: logical ↔ storage key translation and the selector
//! language used by orderings, filters and projections.
//! Does not own: document walking (see `codec`).
//! Boundary: `META_FIELDS` is the single alias table for the workspace.


use percent_encoding::percent_decode_str;
use std::{
    borrow::Cow,
    fmt::{self, Write as _},
};
use thiserror::Error as ThisError;

///
/// CONSTANTS
///

/// Logical identifier field of every entity record.
pub const ID_FIELD: &str = "id";

/// Store-reserved identifier slot.
pub const STORAGE_ID_FIELD: &str = "_id";

/// Bookkeeping slot holding the creation timestamp.
pub const STORAGE_CREATED_AT_FIELD: &str = "_createdAt";

/// Bookkeeping slot holding the last-update timestamp.
pub const STORAGE_UPDATED_AT_FIELD: &str = "_updatedAt";

/// Bookkeeping slot holding the version tag.
pub const STORAGE_VERSION_FIELD: &str = "_version";

// Selector sigil for meta fields; doubled it denotes a literal key.
const META_SIGIL: char = '$';

// Leading characters the store reserves for its own names and operators.
const RESERVED_LEADING: [char; 2] = ['_', '$'];

///
/// KeyError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum KeyError {
    #[error("unknown meta field '{name}'")]
    UnknownMetaField { name: String },

    #[error("meta field '{component}' is only valid as the first component of '{path}'")]
    NestedMetaSelector { path: String, component: String },

    #[error("malformed escape sequence in stored key '{key}'")]
    MalformedEscape { key: String },

    #[error("empty path component in '{path}'")]
    EmptyPathComponent { path: String },
}

///
/// MetaField
///
/// Bookkeeping values a selector can reach through the `$name` syntax.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum MetaField {
    CreatedAt,
    UpdatedAt,
    ETag,
    Id,
}

// (field, selector name without sigil, storage name)
const META_FIELDS: [(MetaField, &str, &str); 4] = [
    (MetaField::CreatedAt, "createdAt", STORAGE_CREATED_AT_FIELD),
    (MetaField::UpdatedAt, "updatedAt", STORAGE_UPDATED_AT_FIELD),
    (MetaField::ETag, "eTag", STORAGE_VERSION_FIELD),
    (MetaField::Id, "id", STORAGE_ID_FIELD),
];

impl MetaField {
    /// Resolve a selector name (without the sigil).
    #[must_use]
    pub fn from_selector_name(name: &str) -> Option<Self> {
        META_FIELDS
            .iter()
            .find(|(_, selector, _)| *selector == name)
            .map(|(field, _, _)| *field)
    }

    #[must_use]
    pub fn selector_name(self) -> &'static str {
        META_FIELDS
            .iter()
            .find(|(field, _, _)| *field == self)
            .map_or("", |(_, selector, _)| selector)
    }

    #[must_use]
    pub fn storage_name(self) -> &'static str {
        META_FIELDS
            .iter()
            .find(|(field, _, _)| *field == self)
            .map_or("", |(_, _, storage)| storage)
    }
}

impl fmt::Display for MetaField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{META_SIGIL}{}", self.selector_name())
    }
}

///
/// PATH SPLITTING
///

/// Split a path expression into raw components.
///
/// `""` and `"."` are the root. A leading `/` selects JSON-pointer syntax
/// (`~1` is `/`, `~0` is `~`); anything else is dot-separated.
#[must_use]
pub fn split_path(path: &str) -> Vec<String> {
    if path.is_empty() || path == "." {
        return Vec::new();
    }

    if let Some(pointer) = path.strip_prefix('/') {
        return pointer
            .split('/')
            .map(|part| part.replace("~1", "/").replace("~0", "~"))
            .collect();
    }

    path.split('.').map(str::to_string).collect()
}

///
/// PathComponent
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathComponent {
    Meta(MetaField),
    Key(String),
}

///
/// Selector
///
/// A parsed logical path. Meta fields may appear only in first position;
/// `$$name` is the literal key `$name`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Selector {
    source: String,
    components: Vec<PathComponent>,
}

impl Selector {
    /// Parse a dot or JSON-pointer path.
    ///
    /// Empty keys are refused in both forms, so the pointer `/` (the key
    /// `""` in RFC 6901) is an `EmptyPathComponent` error: storage paths are
    /// dot-joined and cannot name an empty field.
    pub fn parse(path: &str) -> Result<Self, KeyError> {
        let raw = split_path(path);
        let mut components = Vec::with_capacity(raw.len());

        for (idx, part) in raw.into_iter().enumerate() {
            if part.is_empty() {
                return Err(KeyError::EmptyPathComponent {
                    path: path.to_string(),
                });
            }

            let component = match part.strip_prefix(META_SIGIL) {
                Some(rest) if rest.starts_with(META_SIGIL) => PathComponent::Key(rest.to_string()),
                Some(_) if idx > 0 => {
                    return Err(KeyError::NestedMetaSelector {
                        path: path.to_string(),
                        component: part,
                    });
                }
                Some(rest) => PathComponent::Meta(MetaField::from_selector_name(rest).ok_or_else(
                    || KeyError::UnknownMetaField {
                        name: part.clone(),
                    },
                )?),
                None => PathComponent::Key(part),
            };
            components.push(component);
        }

        Ok(Self {
            source: path.to_string(),
            components,
        })
    }

    /// The empty selector, naming the whole record.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            source: String::new(),
            components: Vec::new(),
        }
    }

    /// Selector over a single literal entity key.
    #[must_use]
    pub fn field(key: &str) -> Self {
        Self {
            source: key.to_string(),
            components: vec![PathComponent::Key(key.to_string())],
        }
    }

    #[must_use]
    pub fn meta(field: MetaField) -> Self {
        Self {
            source: field.to_string(),
            components: vec![PathComponent::Meta(field)],
        }
    }

    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn components(&self) -> &[PathComponent] {
        &self.components
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Leading meta field, when the selector starts with one.
    #[must_use]
    pub fn meta_field(&self) -> Option<MetaField> {
        match self.components.first() {
            Some(PathComponent::Meta(field)) => Some(*field),
            _ => None,
        }
    }

    /// Entity-record keys after the leading meta field (if any).
    pub fn entity_keys(&self) -> impl Iterator<Item = &str> {
        self.components.iter().filter_map(|component| match component {
            PathComponent::Key(key) => Some(key.as_str()),
            PathComponent::Meta(_) => None,
        })
    }

    #[must_use]
    pub fn to_storage_path(&self) -> StoragePath {
        StoragePath(
            self.components
                .iter()
                .enumerate()
                .map(|(depth, component)| match component {
                    PathComponent::Meta(field) => field.storage_name().to_string(),
                    PathComponent::Key(key) => entity_key_to_storage(key, depth),
                })
                .collect(),
        )
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

///
/// StoragePath
///
/// Escaped storage components; displays dot-joined.
///

#[derive(Clone, Debug, derive_more::Deref, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct StoragePath(Vec<String>);

impl StoragePath {
    #[must_use]
    pub const fn new(components: Vec<String>) -> Self {
        Self(components)
    }

    #[must_use]
    pub fn into_components(self) -> Vec<String> {
        self.0
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Translate a logical selector path into its storage path.
pub fn to_storage_path(path: &str) -> Result<StoragePath, KeyError> {
    Selector::parse(path).map(|selector| selector.to_storage_path())
}

///
/// KEY TRANSLATION
///

/// Translate one entity key at `depth` into its storage form.
#[must_use]
pub fn entity_key_to_storage(key: &str, depth: usize) -> String {
    if depth == 0 && key == ID_FIELD {
        return STORAGE_ID_FIELD.to_string();
    }

    let mut out = String::with_capacity(key.len());
    for (idx, ch) in key.chars().enumerate() {
        let escape = match ch {
            '%' | '.' | '\0' => true,
            _ => idx == 0 && RESERVED_LEADING.contains(&ch),
        };
        if escape {
            let mut buf = [0u8; 4];
            for byte in ch.encode_utf8(&mut buf).bytes() {
                let _ = write!(out, "%{byte:02X}");
            }
        } else {
            out.push(ch);
        }
    }

    out
}

/// Translate one storage key at `depth` into its logical form.
///
/// Returns `Ok(None)` for depth-0 bookkeeping keys, which have no entity
/// counterpart.
pub fn to_logical(storage_key: &str, depth: usize) -> Result<Option<String>, KeyError> {
    if depth == 0 {
        if storage_key == STORAGE_ID_FIELD {
            return Ok(Some(ID_FIELD.to_string()));
        }
        if storage_key.starts_with('_') {
            return Ok(None);
        }
    }

    percent_decode(storage_key)
        .map(Some)
        .ok_or_else(|| KeyError::MalformedEscape {
            key: storage_key.to_string(),
        })
}

/// Reverse `%XX` escapes; `None` when a sequence is malformed or the bytes
/// are not UTF-8.
pub(crate) fn percent_decode(text: &str) -> Option<String> {
    let well_formed = text.split('%').skip(1).all(|escape| {
        escape
            .as_bytes()
            .get(..2)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return None;
    }

    percent_decode_str(text)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}
