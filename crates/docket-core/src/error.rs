use crate::{
    codec::CodecError,
    config::ConfigError,
    cursor::CursorError,
    filter::FilterError,
    hooks::HookError,
    key::KeyError,
    page::PageError,
    patch::PatchError,
    precondition::PreconditionError,
    store::StoreError,
    value::JsonNumberError,
};
use std::{error::Error as StdError, fmt};
use thiserror::Error as ThisError;

///
/// EngineError
///
/// Every failure a resource operation can surface. `NotModified` is a
/// successful short-circuit rather than a fault.
///

#[derive(Debug, ThisError)]
pub enum EngineError {
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("invalid request: no operator \"{op}\" for key \"{field}\"")]
    NoSuchFilterOperator { field: String, op: String },

    #[error("precondition failed: {header}")]
    PreconditionFailed { header: &'static str },

    #[error("not modified")]
    NotModified { etag: String },

    #[error("no such resource: {path}")]
    NoSuchResource { path: String },

    #[error(
        "unsupported media type: for {method} requests on resources of kind \"{resource_kind}\", \
         Content-Type header must be one of [{}], but got {}",
        expected.join(", "),
        actual.as_deref().unwrap_or("nothing")
    )]
    UnsupportedContentType {
        method: String,
        resource_kind: String,
        expected: Vec<String>,
        actual: Option<String>,
    },

    #[error("entity is not representable at '{path}': {reason}")]
    UnrepresentableEntity { path: String, reason: String },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unexpected error: {message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

impl EngineError {
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Wrap an unclassified collaborator failure.
    pub fn unexpected<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Unexpected {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }

    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::InvalidRequest { .. }
            | Self::NoSuchFilterOperator { .. }
            | Self::UnrepresentableEntity { .. } => ErrorClass::BadRequest,
            Self::PreconditionFailed { .. } => ErrorClass::PreconditionFailed,
            Self::NotModified { .. } => ErrorClass::NotModified,
            Self::NoSuchResource { .. } => ErrorClass::NotFound,
            Self::UnsupportedContentType { .. } => ErrorClass::UnsupportedContentType,
            Self::Hook(hook) => hook.class(),
            Self::Config(_) | Self::Unexpected { .. } => ErrorClass::Internal,
        }
    }

    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Hook(HookError::Client { status, .. }) => *status,
            _ => self.class().status(),
        }
    }

    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Hook(HookError::Client { code, .. }) => code,
            _ => self.class().code(),
        }
    }

    /// True for failures that go through the unexpected-error hook.
    #[must_use]
    pub const fn is_unexpected(&self) -> bool {
        matches!(self.class(), ErrorClass::Internal)
    }

    #[must_use]
    pub fn display_with_class(&self) -> String {
        format!("{}: {self}", self.class())
    }
}

impl From<KeyError> for EngineError {
    fn from(err: KeyError) -> Self {
        Self::invalid_request(err.to_string())
    }
}

impl From<CodecError> for EngineError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnrepresentableEntity { path, reason } => {
                Self::UnrepresentableEntity { path, reason }
            }
            CodecError::Key(_) | CodecError::DuplicateKey { .. } => Self::unexpected(err),
        }
    }
}

impl From<CursorError> for EngineError {
    fn from(err: CursorError) -> Self {
        Self::invalid_request(format!("bad cursor: {err}"))
    }
}

impl From<FilterError> for EngineError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::NoSuchFilterOperator { field, op } => {
                Self::NoSuchFilterOperator { field, op }
            }
            other => Self::invalid_request(other.to_string()),
        }
    }
}

impl From<PageError> for EngineError {
    fn from(err: PageError) -> Self {
        Self::invalid_request(err.to_string())
    }
}

impl From<PatchError> for EngineError {
    fn from(err: PatchError) -> Self {
        match err {
            PatchError::Unrepresentable(err) => err.into(),
            _ => Self::invalid_request(err.to_string()),
        }
    }
}

impl From<JsonNumberError> for EngineError {
    fn from(err: JsonNumberError) -> Self {
        Self::UnrepresentableEntity {
            path: err.path,
            reason: format!("number {} has no exact representation", err.number),
        }
    }
}

impl From<PreconditionError> for EngineError {
    fn from(err: PreconditionError) -> Self {
        match err {
            PreconditionError::Failed { header } => Self::PreconditionFailed { header },
            PreconditionError::NotModified { etag } => Self::NotModified { etag },
            PreconditionError::Malformed { .. } => Self::invalid_request(err.to_string()),
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        Self::unexpected(err)
    }
}

///
/// ErrorClass
/// Error taxonomy used for status and code mapping.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    BadRequest,
    Validation,
    Unauthorized,
    Forbidden,
    NotFound,
    NotModified,
    PreconditionFailed,
    UnsupportedContentType,
    Client,
    Internal,
}

impl ErrorClass {
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::BadRequest | Self::Validation | Self::Client => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::NotModified => 304,
            Self::PreconditionFailed => 412,
            Self::UnsupportedContentType => 415,
            Self::Internal => 500,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BadRequest | Self::Client => "BAD_REQUEST",
            Self::Validation => "VALIDATION_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::NotModified => "NOT_MODIFIED",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::UnsupportedContentType => "UNSUPPORTED_CONTENT_TYPE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::BadRequest => "bad_request",
            Self::Validation => "validation",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::NotModified => "not_modified",
            Self::PreconditionFailed => "precondition_failed",
            Self::UnsupportedContentType => "unsupported_content_type",
            Self::Client => "client",
            Self::Internal => "internal",
        };
        write!(f, "{label}")
    }
}

///
/// TESTS
///
