//! Module: store
//! Responsibility: the document-store collaborator contract.
//! Does not own: query planning or bookkeeping policy beyond stamping.
//! Boundary: every write goes through an atomic call; the engine never
//! holds a document across calls.

mod memory;


pub use memory::{Clock, MemoryStore};

use crate::{
    error::EngineError,
    index::{ExistingIndex, IndexDescriptor},
    ordering::IndexKey,
    predicate::Predicate,
    value::{Document, Value},
};
use thiserror::Error as ThisError;

///
/// StoreError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum StoreError {
    #[error("namespace does not exist")]
    NamespaceNotFound,

    #[error("index '{name}' has the same key as existing index '{existing}'")]
    IndexConflict { name: String, existing: String },

    #[error("index '{name}' not found")]
    IndexNotFound { name: String },

    #[error("duplicate key for identifier {id}")]
    DuplicateKey { id: String },

    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

///
/// FindQuery
///

#[derive(Clone, Debug, PartialEq)]
pub struct FindQuery {
    pub predicate: Option<Predicate>,
    pub sort: IndexKey,
    pub limit: usize,
}

/// Compute the document to store from the current one (`None` when absent).
/// May run more than once.
pub type Mutate<'a> = dyn FnMut(Option<&Document>) -> Result<Document, EngineError> + 'a;

/// Approve a delete of the current document. May run more than once.
pub type ConfirmDelete<'a> = dyn FnMut(&Document) -> Result<(), EngineError> + 'a;

///
/// Store
///
/// Stored documents carry `_id`; the store stamps `_createdAt`,
/// `_updatedAt` and `_version` on every write.
///

pub trait Store: Send + Sync {
    fn find(&self, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    fn find_one(&self, id: &Value) -> Result<Option<Document>, StoreError>;

    /// Fails with `NamespaceNotFound` before anything was written.
    fn list_indexes(&self) -> Result<Vec<ExistingIndex>, StoreError>;

    fn create_indexes(&self, indexes: &[IndexDescriptor]) -> Result<(), StoreError>;

    fn drop_index(&self, name: &str) -> Result<(), StoreError>;

    fn atomic_insert(&self, doc: Document) -> Result<Document, StoreError>;

    /// Compare-and-set update. Returns `None` when the document is absent and
    /// `upsert` is off; `mutate` is not called then.
    fn atomic_update(
        &self,
        id: &Value,
        upsert: bool,
        mutate: &mut Mutate<'_>,
    ) -> Result<Option<Document>, EngineError>;

    /// Returns `false` when nothing was there to delete.
    fn atomic_delete(&self, id: &Value, confirm: &mut ConfirmDelete<'_>)
    -> Result<bool, EngineError>;
}
