//! Module: obs
//! Responsibility: structured log events emitted by the engine.
//!
//! Engine code never calls `tracing` macros directly; every event flows
//! through `EngineEvent` and `record`.

use crate::{error::EngineError, hooks::RequestContext};
use std::error::Error as StdError;
use tracing::{debug, error, info, warn};

///
/// EngineEvent
///

#[derive(Debug)]
pub enum EngineEvent<'a> {
    IndexesReconciled {
        resource_kind: &'a str,
        created: usize,
        depended_upon: usize,
        retirable: usize,
    },
    IndexRetirable {
        resource_kind: &'a str,
        name: &'a str,
    },
    IndexRetired {
        resource_kind: &'a str,
        name: &'a str,
    },
    ListQuery {
        request_id: &'a str,
        ordering: &'a str,
        limit: usize,
        conjuncts: usize,
        has_cursor: bool,
    },
    UnexpectedError {
        request: &'a RequestContext,
        error: &'a EngineError,
    },
}

///
/// EventSink
///

pub trait EventSink {
    fn record(&self, event: &EngineEvent<'_>);
}

///
/// TracingSink
/// Default sink; forwards every event to `tracing` with structured fields.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: &EngineEvent<'_>) {
        match event {
            EngineEvent::IndexesReconciled {
                resource_kind,
                created,
                depended_upon,
                retirable,
            } => {
                info!(
                    resource_kind = %resource_kind,
                    created,
                    depended_upon,
                    retirable,
                    "indexes reconciled"
                );
            }

            EngineEvent::IndexRetirable {
                resource_kind,
                name,
            } => {
                warn!(
                    resource_kind = %resource_kind,
                    index = %name,
                    "index is no longer used by any ordering; retire it explicitly"
                );
            }

            EngineEvent::IndexRetired {
                resource_kind,
                name,
            } => {
                warn!(resource_kind = %resource_kind, index = %name, "index retired");
            }

            EngineEvent::ListQuery {
                request_id,
                ordering,
                limit,
                conjuncts,
                has_cursor,
            } => {
                debug!(
                    request_id = %request_id,
                    ordering = %ordering,
                    limit,
                    conjuncts,
                    has_cursor,
                    "list query compiled"
                );
            }

            EngineEvent::UnexpectedError { request, error } => {
                error!(
                    request_id = %request.request_id,
                    method = %request.method,
                    path = %request.path,
                    error = %error_chain(*error),
                    "unexpected error"
                );
            }
        }
    }
}

/// Send one event to the default sink.
pub fn record(event: EngineEvent<'_>) {
    TracingSink.record(&event);
}

/// Render an error followed by each of its causes.
#[must_use]
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": caused by: ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }

    out
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;

    #[test]
    fn error_chain_lists_every_cause() {
        let err = EngineError::from(StoreError::Unavailable {
            reason: "socket closed".to_string(),
        });

        assert_eq!(
            error_chain(&err),
            "unexpected error: store unavailable: socket closed: caused by: \
             store unavailable: socket closed"
        );
    }

    #[test]
    fn recording_without_a_subscriber_is_silent() {
        let request = RequestContext::new(crate::hooks::Method::Get, "/things/a");
        let err = EngineError::invalid_request("bad");

        record(EngineEvent::UnexpectedError {
            request: &request,
            error: &err,
        });
        record(EngineEvent::IndexRetirable {
            resource_kind: "thing",
            name: "Order [old+]",
        });
    }
}
