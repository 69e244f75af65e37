use crate::{
    error::EngineError,
    index::{ExistingIndex, IndexDescriptor},
    key::{
        STORAGE_CREATED_AT_FIELD, STORAGE_ID_FIELD, STORAGE_UPDATED_AT_FIELD,
        STORAGE_VERSION_FIELD, StoragePath,
    },
    ordering::{Direction, IndexKey, IndexKeyField},
    store::{ConfirmDelete, FindQuery, Mutate, Store, StoreError},
    types::{ObjectId, Timestamp},
    value::{Document, Value, compare_values},
};
use parking_lot::RwLock;
use std::{cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

/// Name of the index every namespace starts with.
const PRIMARY_INDEX_NAME: &str = "_id_";

/// Index format version reported for indexes this store builds.
const INDEX_VERSION: i64 = 2;

/// Source of write timestamps.
pub type Clock = Arc<dyn Fn() -> Timestamp + Send + Sync>;

///
/// DocKey
/// Identifier ordered by the store's total value order.
///

#[derive(Clone, Debug)]
struct DocKey(Value);

impl PartialEq for DocKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for DocKey {}

impl PartialOrd for DocKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DocKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_values(&self.0, &other.0)
    }
}

///
/// Namespace
///

struct Namespace {
    docs: BTreeMap<DocKey, Document>,
    indexes: Vec<ExistingIndex>,
}

impl Namespace {
    fn new() -> Self {
        let primary = IndexKey::new(vec![IndexKeyField {
            path: StoragePath::new(vec![STORAGE_ID_FIELD.to_string()]),
            direction: Direction::Asc,
        }]);

        Self {
            docs: BTreeMap::new(),
            indexes: vec![ExistingIndex {
                version: Some(INDEX_VERSION),
                ..ExistingIndex::new(PRIMARY_INDEX_NAME, primary)
            }],
        }
    }
}

#[derive(Default)]
struct State {
    namespace: Option<Namespace>,
    last_version: u64,
    offline: bool,
}

impl State {
    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline {
            Err(StoreError::Unavailable {
                reason: "store is offline".to_string(),
            })
        } else {
            Ok(())
        }
    }

    fn namespace_mut(&mut self) -> &mut Namespace {
        self.namespace.get_or_insert_with(Namespace::new)
    }

    fn next_version(&mut self) -> String {
        self.last_version += 1;
        self.last_version.to_string()
    }
}

///
/// MemoryStore
///
/// In-process `Store` with the document store's observable semantics: the
/// namespace springs into existence on first write, versions increase
/// monotonically per store, and index creation follows name-collision rules.
///

pub struct MemoryStore {
    state: RwLock<State>,
    clock: Clock,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::default()),
            clock: Arc::new(Timestamp::now),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .read()
            .namespace
            .as_ref()
            .map_or(0, |ns| ns.docs.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once anything created the namespace.
    #[must_use]
    pub fn namespace_exists(&self) -> bool {
        self.state.read().namespace.is_some()
    }

    /// Register an index directly, bypassing collision checks.
    pub fn seed_index(&self, index: ExistingIndex) {
        self.state.write().namespace_mut().indexes.push(index);
    }

    /// While offline every call fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.state.write().offline = offline;
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

// Stamp bookkeeping fields; `created_at` carries over from a prior version.
fn stamp(doc: &mut Document, id: Value, created_at: Value, now: Timestamp, version: String) {
    doc.insert(STORAGE_ID_FIELD.to_string(), id);
    doc.insert(STORAGE_CREATED_AT_FIELD.to_string(), created_at);
    doc.insert(STORAGE_UPDATED_AT_FIELD.to_string(), Value::Timestamp(now));
    doc.insert(STORAGE_VERSION_FIELD.to_string(), Value::Text(version));
}

fn render_id(id: &Value) -> String {
    id.clone().into_json().to_string()
}

impl Store for MemoryStore {
    fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let state = self.state.read();
        state.check_online()?;

        let Some(ns) = state.namespace.as_ref() else {
            return Ok(Vec::new());
        };

        let mut rows: Vec<&Document> = ns
            .docs
            .values()
            .filter(|doc| query.predicate.as_ref().is_none_or(|p| p.matches(doc)))
            .collect();
        rows.sort_by(|a, b| query.sort.compare_documents(a, b));

        Ok(rows.into_iter().take(query.limit).cloned().collect())
    }

    fn find_one(&self, id: &Value) -> Result<Option<Document>, StoreError> {
        let state = self.state.read();
        state.check_online()?;

        Ok(state
            .namespace
            .as_ref()
            .and_then(|ns| ns.docs.get(&DocKey(id.clone())))
            .cloned())
    }

    fn list_indexes(&self) -> Result<Vec<ExistingIndex>, StoreError> {
        let state = self.state.read();
        state.check_online()?;

        state
            .namespace
            .as_ref()
            .map(|ns| ns.indexes.clone())
            .ok_or(StoreError::NamespaceNotFound)
    }

    fn create_indexes(&self, indexes: &[IndexDescriptor]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.check_online()?;
        let ns = state.namespace_mut();

        for wanted in indexes {
            // Reusing a name is silently ignored, whatever the key.
            if ns.indexes.iter().any(|index| index.name == wanted.name) {
                continue;
            }
            if let Some(existing) = ns.indexes.iter().find(|index| index.satisfies(&wanted.key)) {
                return Err(StoreError::IndexConflict {
                    name: wanted.name.clone(),
                    existing: existing.name.clone(),
                });
            }

            ns.indexes.push(ExistingIndex {
                version: Some(INDEX_VERSION),
                ..ExistingIndex::new(wanted.name.clone(), wanted.key.clone())
            });
        }

        Ok(())
    }

    fn drop_index(&self, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.check_online()?;

        let ns = state
            .namespace
            .as_mut()
            .ok_or(StoreError::NamespaceNotFound)?;
        let before = ns.indexes.len();
        ns.indexes.retain(|index| index.name != name);

        if ns.indexes.len() == before {
            return Err(StoreError::IndexNotFound {
                name: name.to_string(),
            });
        }

        Ok(())
    }

    fn atomic_insert(&self, mut doc: Document) -> Result<Document, StoreError> {
        let now = self.now();
        let mut state = self.state.write();
        state.check_online()?;

        let id = doc
            .remove(STORAGE_ID_FIELD)
            .unwrap_or_else(|| Value::ObjectId(ObjectId::from_bytes(rand::random())));
        let key = DocKey(id.clone());
        if state
            .namespace
            .as_ref()
            .is_some_and(|ns| ns.docs.contains_key(&key))
        {
            return Err(StoreError::DuplicateKey {
                id: render_id(&id),
            });
        }

        let version = state.next_version();
        stamp(&mut doc, id, Value::Timestamp(now), now, version);
        state.namespace_mut().docs.insert(key, doc.clone());

        Ok(doc)
    }

    fn atomic_update(
        &self,
        id: &Value,
        upsert: bool,
        mutate: &mut Mutate<'_>,
    ) -> Result<Option<Document>, EngineError> {
        let now = self.now();
        let mut state = self.state.write();
        state.check_online()?;

        let key = DocKey(id.clone());
        let current = state
            .namespace
            .as_ref()
            .and_then(|ns| ns.docs.get(&key))
            .cloned();
        if current.is_none() && !upsert {
            return Ok(None);
        }

        let mut next = mutate(current.as_ref())?;
        let created_at = current
            .as_ref()
            .and_then(|doc| doc.get(STORAGE_CREATED_AT_FIELD))
            .cloned()
            .unwrap_or(Value::Timestamp(now));
        let version = state.next_version();
        stamp(&mut next, id.clone(), created_at, now, version);
        state.namespace_mut().docs.insert(key, next.clone());

        Ok(Some(next))
    }

    fn atomic_delete(
        &self,
        id: &Value,
        confirm: &mut ConfirmDelete<'_>,
    ) -> Result<bool, EngineError> {
        let mut state = self.state.write();
        state.check_online()?;

        let key = DocKey(id.clone());
        let Some(ns) = state.namespace.as_mut() else {
            return Ok(false);
        };
        let Some(current) = ns.docs.get(&key) else {
            return Ok(false);
        };

        confirm(current)?;
        ns.docs.remove(&key);

        Ok(true)
    }
}
