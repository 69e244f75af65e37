//! Module: hooks
//! Responsibility: the resource owner's capability surface and the request
//! context handed to it.
//! Does not own: deciding when hooks run (see `engine`).

mod context;


pub use context::{HookContext, Method, RequestContext};

use crate::{
    error::{EngineError, ErrorClass},
    ids::generate_resource_id,
    obs::{self, EngineEvent},
    patch::PatchOp,
    value::{Document, Value},
};
use thiserror::Error as ThisError;

///
/// HookError
///
/// Failures a hook reports on purpose. They surface unchanged, with their own
/// status.
///

#[derive(Clone, Debug, ThisError, PartialEq)]
pub enum HookError {
    #[error("{message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{message}")]
    Authentication { message: String },

    #[error("{message}")]
    Authorization { message: String },

    #[error("{message}")]
    Client {
        status: u16,
        code: String,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("{message}")]
    Unexpected { message: String },
}

impl HookError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Validation { .. } => ErrorClass::Validation,
            Self::Authentication { .. } => ErrorClass::Unauthorized,
            Self::Authorization { .. } => ErrorClass::Forbidden,
            Self::Client { .. } => ErrorClass::Client,
            Self::Unexpected { .. } => ErrorClass::Internal,
        }
    }

    /// Structured details for the response body, when the hook attached any.
    #[must_use]
    pub const fn details(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Validation { details, .. } | Self::Client { details, .. } => details.as_ref(),
            _ => None,
        }
    }
}

///
/// ValidateOptions
///
/// Extra facts for `validate`: whether the write creates the resource, and
/// for patches the operations plus the delta they touched.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct ValidateOptions<'a> {
    pub create: bool,
    pub delta: Option<&'a Document>,
    pub patch: Option<&'a [PatchOp]>,
}

///
/// ResourceHooks
///
/// Every method has a pass-through default. Values are entity records.
///

pub trait ResourceHooks: Send + Sync {
    fn before_request(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before any write; `id` is absent for creates.
    fn before_mutate(&self, _ctx: &mut HookContext<'_>, _id: Option<&Value>) -> Result<(), HookError> {
        Ok(())
    }

    /// Turn the path segment into the stored identifier.
    fn parse_url_id(&self, raw: &str) -> Result<Value, HookError> {
        Ok(Value::Text(raw.to_string()))
    }

    /// Identifier for a new resource. `None` leaves the choice to the store.
    fn generate_id(&self) -> Option<Value> {
        Some(Value::Text(generate_resource_id()))
    }

    /// Fill in a record for a resource that does not exist yet.
    fn populate_missing(
        &self,
        _ctx: &mut HookContext<'_>,
        record: Document,
    ) -> Result<Document, HookError> {
        Ok(record)
    }

    /// JSON pointers (beyond `/id`) whose previous values survive a
    /// replacement body that omits them.
    fn preserved_keys(
        &self,
        _ctx: &mut HookContext<'_>,
        _previous: &Document,
        _proposed: &Document,
    ) -> Vec<String> {
        Vec::new()
    }

    fn validate(
        &self,
        _ctx: &mut HookContext<'_>,
        _value: &Document,
        _options: ValidateOptions<'_>,
    ) -> Result<(), HookError> {
        Ok(())
    }

    /// Last chance to rewrite a value before it is stored.
    fn propagate(&self, _ctx: &mut HookContext<'_>, value: Document) -> Result<Document, HookError> {
        Ok(value)
    }

    /// Redact or reshape a record for this caller.
    fn view(&self, _ctx: &mut HookContext<'_>, value: Document) -> Result<Document, HookError> {
        Ok(value)
    }

    /// Entity record as read from the store.
    fn from_db(&self, value: Document) -> Document {
        value
    }

    /// Entity record about to be written.
    fn to_db(&self, value: Document) -> Document {
        value
    }

    /// Report an unexpected failure. Returning an error replaces it.
    fn on_unexpected_error(&self, request: &RequestContext, err: &EngineError) -> Option<EngineError> {
        obs::record(EngineEvent::UnexpectedError { request, error: err });
        None
    }
}

///
/// NoHooks
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NoHooks;

impl ResourceHooks for NoHooks {}
