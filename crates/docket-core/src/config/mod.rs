//! Module: config
//! Responsibility: engine configuration, its defaults, and one-time
//! validation into compiled orderings.
//! Does not own: index planning (see `index`).


use crate::{
    filter::{FilterTable, PredicateBuilder, ValueParser},
    index::DesiredIndex,
    key::{ID_FIELD, MetaField, STORAGE_ID_FIELD},
    ordering::{
        IndexKey, OrderField, OrderingError, REVERSE_SUFFIX, compile, parse_ordering_name,
        suggested_index_name,
    },
    page::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE},
    predicate::CompareOp,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

/// Ordering that is always available.
pub const CREATED_ORDERING: &str = "created";

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("configuration is not valid TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("prefix must be empty or start with a slash, got '{prefix}'")]
    PrefixMissingSlash { prefix: String },

    #[error("prefix must not end with a slash, got '{prefix}'")]
    PrefixTrailingSlash { prefix: String },

    #[error("default page size {default} exceeds maximum page size {max}")]
    PageSize { default: usize, max: usize },

    #[error("ordering name '{name}' must not end with '-reverse'")]
    ReservedOrderingName { name: String },

    #[error("ordering '{name}': {source}")]
    Ordering {
        name: String,
        #[source]
        source: OrderingError,
    },
}

///
/// EngineConfig
///

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub resource_kind_name: String,
    pub prefix: String,
    pub allow_put_create: bool,
    pub allow_patch_create: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub orderings: BTreeMap<String, OrderingConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            resource_kind_name: "resource".to_string(),
            prefix: String::new(),
            allow_put_create: true,
            allow_patch_create: true,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            orderings: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    #[must_use]
    pub fn with_ordering(mut self, name: impl Into<String>, ordering: OrderingConfig) -> Self {
        self.orderings.insert(name.into(), ordering);
        self
    }

    /// Check every rule and compile each ordering.
    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        if !self.prefix.is_empty() && !self.prefix.starts_with('/') {
            return Err(ConfigError::PrefixMissingSlash {
                prefix: self.prefix,
            });
        }
        if self.prefix.ends_with('/') {
            return Err(ConfigError::PrefixTrailingSlash {
                prefix: self.prefix,
            });
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::PageSize {
                default: self.default_page_size,
                max: self.max_page_size,
            });
        }

        let mut declared = self.orderings;
        declared
            .entry(CREATED_ORDERING.to_string())
            .or_insert_with(|| {
                OrderingConfig::new().field(MetaField::CreatedAt.to_string(), 1)
            });

        let mut orderings = BTreeMap::new();
        for (name, ordering) in declared {
            if name.ends_with(REVERSE_SUFFIX) {
                return Err(ConfigError::ReservedOrderingName { name });
            }

            let compiled = CompiledOrdering::compile(&name, ordering)
                .map_err(|source| ConfigError::Ordering {
                    name: name.clone(),
                    source,
                })?;
            orderings.insert(name, compiled);
        }

        Ok(ValidatedConfig {
            resource_kind_name: self.resource_kind_name,
            prefix: self.prefix,
            allow_put_create: self.allow_put_create,
            allow_patch_create: self.allow_patch_create,
            default_page_size: self.default_page_size,
            max_page_size: self.max_page_size,
            orderings,
        })
    }
}

///
/// OrderFieldConfig
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct OrderFieldConfig {
    pub field: String,
    #[serde(default = "ascending")]
    pub direction: i64,
}

const fn ascending() -> i64 {
    1
}

///
/// OrderingConfig
///
/// A declared ordering. Custom filters are code, so they are attached with
/// `with_operator` / `with_parser` rather than read from TOML.
///

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OrderingConfig {
    pub fields: Vec<OrderFieldConfig>,
    pub default_filters: bool,
    #[serde(skip)]
    pub filters: FilterTable,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            default_filters: true,
            filters: FilterTable::new(),
        }
    }
}

impl OrderingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn field(mut self, field: impl Into<String>, direction: i64) -> Self {
        self.fields.push(OrderFieldConfig {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn without_default_filters(mut self) -> Self {
        self.default_filters = false;
        self
    }

    #[must_use]
    pub fn with_operator(mut self, field: &str, op: CompareOp, builder: PredicateBuilder) -> Self {
        self.filters.set_operator(field, op, builder);
        self
    }

    #[must_use]
    pub fn with_parser(mut self, field: &str, parser: ValueParser) -> Self {
        self.filters.set_parser(field, parser);
        self
    }
}

///
/// CompiledOrdering
///
/// A normalized ordering (identifier appended) with both sort keys and its
/// effective filter table.
///

#[derive(Clone, Debug)]
pub struct CompiledOrdering {
    pub name: String,
    pub fields: Vec<OrderField>,
    pub forward: IndexKey,
    pub reverse: IndexKey,
    pub filters: FilterTable,
}

impl CompiledOrdering {
    fn compile(name: &str, config: OrderingConfig) -> Result<Self, OrderingError> {
        let mut fields = config
            .fields
            .iter()
            .map(|field| OrderField::parse(&field.field, field.direction))
            .collect::<Result<Vec<_>, _>>()?;

        let sorts_on_id = fields
            .iter()
            .any(|field| field.selector.to_storage_path().as_slice() == [STORAGE_ID_FIELD]);
        if !sorts_on_id {
            fields.push(OrderField::parse(ID_FIELD, 1)?);
        }

        let mut filters = if config.default_filters {
            FilterTable::with_defaults(&fields)
        } else {
            FilterTable::new()
        };
        filters.merge(&config.filters);

        Ok(Self {
            name: name.to_string(),
            forward: compile(&fields, false)?,
            reverse: compile(&fields, true)?,
            fields,
            filters,
        })
    }

    #[must_use]
    pub const fn key(&self, reverse: bool) -> &IndexKey {
        if reverse { &self.reverse } else { &self.forward }
    }
}

///
/// ValidatedConfig
///

#[derive(Clone, Debug)]
pub struct ValidatedConfig {
    pub resource_kind_name: String,
    pub prefix: String,
    pub allow_put_create: bool,
    pub allow_patch_create: bool,
    pub default_page_size: usize,
    pub max_page_size: usize,
    orderings: BTreeMap<String, CompiledOrdering>,
}

impl ValidatedConfig {
    /// Resolve a requested ordering name (optionally `-reverse`) to its
    /// compiled ordering and the sort key to use.
    #[must_use]
    pub fn resolve_ordering(&self, requested: &str) -> Option<(&CompiledOrdering, &IndexKey)> {
        let (name, reverse) = parse_ordering_name(requested);
        let ordering = self.orderings.get(name)?;

        Some((ordering, ordering.key(reverse)))
    }

    #[must_use]
    pub fn ordering(&self, name: &str) -> Option<&CompiledOrdering> {
        self.orderings.get(name)
    }

    pub fn orderings(&self) -> impl Iterator<Item = &CompiledOrdering> {
        self.orderings.values()
    }

    /// One index per declared ordering, in its forward direction.
    #[must_use]
    pub fn desired_indexes(&self) -> Vec<DesiredIndex> {
        self.orderings
            .values()
            .map(|ordering| DesiredIndex {
                key: ordering.forward.clone(),
                suggested_name: suggested_index_name(&ordering.fields),
            })
            .collect()
    }
}
