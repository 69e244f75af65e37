//! Module: index
//! Responsibility: reconcile declared orderings against a store's existing
//! indexes.
//! Does not own: applying a plan (see `engine`).
//! Boundary: planning is pure; deleting indexes is always an explicit call.


use crate::{ordering::IndexKey, value::Document};

/// Name prefix marking indexes this engine proposed.
pub const INDEX_NAME_PREFIX: &str = "Order [";

///
/// IndexDescriptor
///
/// An index to create: key shape plus name.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IndexDescriptor {
    pub name: String,
    pub key: IndexKey,
}

///
/// ExistingIndex
///
/// An index as the store lists it. `version` is store metadata and never
/// affects satisfiability; any `options` do.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ExistingIndex {
    pub name: String,
    pub key: IndexKey,
    pub version: Option<i64>,
    pub options: Document,
}

impl ExistingIndex {
    #[must_use]
    pub fn new(name: impl Into<String>, key: IndexKey) -> Self {
        Self {
            name: name.into(),
            key,
            version: None,
            options: Document::new(),
        }
    }

    #[must_use]
    pub fn satisfies(&self, key: &IndexKey) -> bool {
        self.key == *key && self.options.is_empty()
    }
}

///
/// DesiredIndex
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DesiredIndex {
    pub key: IndexKey,
    pub suggested_name: String,
}

///
/// IndexPlan
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct IndexPlan {
    pub to_create: Vec<IndexDescriptor>,
    pub to_retire: Vec<String>,
    pub depended_upon: Vec<String>,
}

impl IndexPlan {
    /// True when the plan neither creates nor retires anything.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.to_create.is_empty() && self.to_retire.is_empty()
    }
}

/// Plan index creation and retirement.
#[must_use]
pub fn plan_indexes(existing: &[ExistingIndex], desired: &[DesiredIndex]) -> IndexPlan {
    let mut plan = IndexPlan::default();

    for wanted in desired {
        if let Some(found) = existing.iter().find(|index| index.satisfies(&wanted.key)) {
            if !plan.depended_upon.contains(&found.name) {
                plan.depended_upon.push(found.name.clone());
            }
            continue;
        }

        if plan.to_create.iter().any(|proposed| proposed.key == wanted.key) {
            continue;
        }

        let name = free_name(&wanted.suggested_name, existing, &plan.to_create);
        plan.to_create.push(IndexDescriptor {
            name,
            key: wanted.key.clone(),
        });
    }

    plan.to_retire = existing
        .iter()
        .filter(|index| index.name.starts_with(INDEX_NAME_PREFIX))
        .filter(|index| !plan.depended_upon.contains(&index.name))
        .map(|index| index.name.clone())
        .collect();

    plan
}

// `base`, then `base 2`, `base 3`, ... until nothing holds the name.
fn free_name(base: &str, existing: &[ExistingIndex], proposed: &[IndexDescriptor]) -> String {
    let taken = |name: &str| {
        existing.iter().any(|index| index.name == name)
            || proposed.iter().any(|index| index.name == name)
    };

    let mut count = 1usize;
    loop {
        let candidate = if count == 1 {
            base.to_string()
        } else {
            format!("{base} {count}")
        };
        if !taken(&candidate) {
            return candidate;
        }
        count += 1;
    }
}
