//! Core of Docket: translation between entity records and stored documents,
//! projections, keyset pagination, index reconciliation, conditional
//! requests, and the resource engine that wires them over a `Store`.

// public exports are one module level down
pub mod codec;
pub mod config;
pub mod cursor;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod ids;
pub mod index;
pub mod key;
pub mod obs;
pub mod ordering;
pub mod page;
pub mod patch;
pub mod precondition;
pub mod predicate;
pub mod projection;
pub mod store;
pub mod types;
pub mod value;

///
/// Prelude
///
/// Vocabulary for embedding the engine: the engine itself, its
/// configuration, the hook and store seams, and the value tree.
///

pub mod prelude {
    pub use crate::{
        config::{EngineConfig, OrderingConfig},
        engine::{ListResponse, ResourceEngine, ResourceResponse},
        error::EngineError,
        hooks::{HookContext, HookError, Method, NoHooks, RequestContext, ResourceHooks},
        patch::{PatchApplier, PatchOp},
        store::{MemoryStore, Store},
        types::{ObjectId, Timestamp},
        value::{Document, Value},
    };
}
