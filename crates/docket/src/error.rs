use docket_core::{error::EngineError, hooks::HookError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error as ThisError;

/// Message returned in place of internal failure detail.
pub const INTERNAL_MESSAGE: &str = "Internal server error.";

///
/// Error
/// Public error type with a stable kind taxonomy and HTTP mapping.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,

    /// Structured detail attached by a validation or client hook.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    #[must_use]
    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.kind.status()
    }

    #[must_use]
    pub fn code(&self) -> &str {
        self.kind.code()
    }
}

impl From<EngineError> for Error {
    fn from(err: EngineError) -> Self {
        let message = err.to_string();

        match err {
            EngineError::InvalidRequest { .. } | EngineError::NoSuchFilterOperator { .. } => {
                Self::new(ErrorKind::Request(RequestErrorKind::Invalid), message)
            }
            EngineError::UnrepresentableEntity { .. } => {
                Self::new(ErrorKind::Request(RequestErrorKind::Unrepresentable), message)
            }
            EngineError::UnsupportedContentType { .. } => Self::new(
                ErrorKind::Request(RequestErrorKind::UnsupportedContentType),
                message,
            ),
            EngineError::NoSuchResource { .. } => Self::new(ErrorKind::NotFound, message),
            EngineError::NotModified { etag } => Self::new(
                ErrorKind::Condition(ConditionErrorKind::NotModified { etag }),
                message,
            ),
            EngineError::PreconditionFailed { .. } => Self::new(
                ErrorKind::Condition(ConditionErrorKind::PreconditionFailed),
                message,
            ),
            EngineError::Hook(hook) => hook.into(),
            EngineError::Config(_) | EngineError::Unexpected { .. } => {
                Self::new(ErrorKind::Internal, INTERNAL_MESSAGE)
            }
        }
    }
}

impl From<HookError> for Error {
    fn from(err: HookError) -> Self {
        match err {
            HookError::Validation { message, details } => Self {
                kind: ErrorKind::Hook(HookErrorKind::Validation),
                message,
                details,
            },
            HookError::Authentication { message } => {
                Self::new(ErrorKind::Hook(HookErrorKind::Authentication), message)
            }
            HookError::Authorization { message } => {
                Self::new(ErrorKind::Hook(HookErrorKind::Authorization), message)
            }
            HookError::Client {
                status,
                code,
                message,
                details,
            } => Self {
                kind: ErrorKind::Hook(HookErrorKind::Client { status, code }),
                message,
                details,
            },
            HookError::Unexpected { .. } => Self::new(ErrorKind::Internal, INTERNAL_MESSAGE),
        }
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers and transports.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Request(RequestErrorKind),
    Condition(ConditionErrorKind),
    Hook(HookErrorKind),

    /// No resource lives at the requested path.
    NotFound,

    /// The caller cannot remediate this.
    Internal,
}

impl ErrorKind {
    #[must_use]
    pub const fn status(&self) -> u16 {
        match self {
            Self::Request(RequestErrorKind::UnsupportedContentType) => 415,
            Self::Request(_) | Self::Hook(HookErrorKind::Validation) => 400,
            Self::Condition(ConditionErrorKind::NotModified { .. }) => 304,
            Self::Condition(ConditionErrorKind::PreconditionFailed) => 412,
            Self::Hook(HookErrorKind::Authentication) => 401,
            Self::Hook(HookErrorKind::Authorization) => 403,
            Self::Hook(HookErrorKind::Client { status, .. }) => *status,
            Self::NotFound => 404,
            Self::Internal => 500,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub fn code(&self) -> &str {
        match self {
            Self::Request(RequestErrorKind::UnsupportedContentType) => "UNSUPPORTED_CONTENT_TYPE",
            Self::Request(_) => "BAD_REQUEST",
            Self::Condition(ConditionErrorKind::NotModified { .. }) => "NOT_MODIFIED",
            Self::Condition(ConditionErrorKind::PreconditionFailed) => "PRECONDITION_FAILED",
            Self::Hook(HookErrorKind::Validation) => "VALIDATION_ERROR",
            Self::Hook(HookErrorKind::Authentication) => "UNAUTHORIZED",
            Self::Hook(HookErrorKind::Authorization) => "FORBIDDEN",
            Self::Hook(HookErrorKind::Client { code, .. }) => code,
            Self::NotFound => "NOT_FOUND",
            Self::Internal => "INTERNAL_ERROR",
        }
    }
}

///
/// RequestErrorKind
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum RequestErrorKind {
    /// Malformed identifier, selector, filter, cursor, page size or body.
    Invalid,

    /// The body holds a value the store cannot represent.
    Unrepresentable,

    UnsupportedContentType,
}

///
/// ConditionErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ConditionErrorKind {
    /// The caller's copy is current; not a failure.
    NotModified { etag: String },

    PreconditionFailed,
}

///
/// HookErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum HookErrorKind {
    Validation,
    Authentication,
    Authorization,
    Client { status: u16, code: String },
}

///
/// TESTS
///
