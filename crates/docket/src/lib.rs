//! Docket: a resource engine over document stores.
//!
//! ## Crate layout
//! - `core`: the engine, its collaborators, and the value model.
//! - `error`: the stable public error shape for transports.
//!
//! Embedders build a `ResourceEngine` from a `Store`, a `ResourceHooks`
//! implementation and an `EngineConfig`, then map each `EngineError` into
//! `docket::Error` at their transport boundary.

pub use docket_core as core;

pub mod error;

pub use error::{Error, ErrorKind};

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

///
/// Prelude
///

pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::error::{Error, ErrorKind};
}
