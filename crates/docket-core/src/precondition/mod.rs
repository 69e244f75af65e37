//! Module: precondition
//! Responsibility: `If-Match` / `If-None-Match` parsing and evaluation.
//! Boundary: pure; callers supply the current version tag (absent when the
//! resource does not exist).


use thiserror::Error as ThisError;

pub const IF_MATCH: &str = "If-Match";
pub const IF_NONE_MATCH: &str = "If-None-Match";

///
/// PreconditionError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum PreconditionError {
    #[error("precondition failed: {header}")]
    Failed { header: &'static str },

    #[error("not modified")]
    NotModified { etag: String },

    #[error("malformed {header} header: {reason}")]
    Malformed {
        header: &'static str,
        reason: String,
    },
}

///
/// EntityTagMatch
///
/// One entry of a conditional header.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EntityTagMatch {
    Any,
    Tag { tag: String, weak: bool },
}

impl EntityTagMatch {
    #[must_use]
    pub fn strong(tag: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            weak: false,
        }
    }

    #[must_use]
    pub fn weak(tag: impl Into<String>) -> Self {
        Self::Tag {
            tag: tag.into(),
            weak: true,
        }
    }

    // A weak entry never satisfies a strong comparison.
    fn strong_matches(&self, current: Option<&str>) -> bool {
        match (self, current) {
            (_, None) => false,
            (Self::Any, Some(_)) => true,
            (Self::Tag { tag, weak }, Some(current)) => !weak && tag == current,
        }
    }

    fn weak_matches(&self, current: Option<&str>) -> bool {
        match (self, current) {
            (_, None) => false,
            (Self::Any, Some(_)) => true,
            (Self::Tag { tag, .. }, Some(current)) => tag == current,
        }
    }
}

///
/// RequestKind
///
/// Reads turn an `If-None-Match` hit into `NotModified`; writes fail it.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RequestKind {
    Read,
    Write,
}

/// Evaluate conditional headers against the current version tag.
pub fn evaluate(
    current: Option<&str>,
    if_match: Option<&[EntityTagMatch]>,
    if_none_match: Option<&[EntityTagMatch]>,
    kind: RequestKind,
) -> Result<(), PreconditionError> {
    if let Some(entries) = if_match
        && !entries.iter().any(|entry| entry.strong_matches(current))
    {
        return Err(PreconditionError::Failed { header: IF_MATCH });
    }

    if let Some(entries) = if_none_match
        && entries.iter().any(|entry| entry.weak_matches(current))
    {
        return Err(match (kind, current) {
            (RequestKind::Read, Some(etag)) => PreconditionError::NotModified {
                etag: etag.to_string(),
            },
            _ => PreconditionError::Failed {
                header: IF_NONE_MATCH,
            },
        });
    }

    Ok(())
}

/// Parse a conditional header: `*`, or a comma-separated list of
/// `"tag"` / `W/"tag"` entries with optional whitespace.
pub fn parse_entity_tags(
    header: &'static str,
    value: &str,
) -> Result<Vec<EntityTagMatch>, PreconditionError> {
    let malformed = |reason: &str| PreconditionError::Malformed {
        header,
        reason: reason.to_string(),
    };

    let trimmed = value.trim();
    if trimmed == "*" {
        return Ok(vec![EntityTagMatch::Any]);
    }

    let mut entries = Vec::new();
    let mut rest = trimmed;
    loop {
        rest = rest.trim_start();

        let (weak, quoted) = match rest.strip_prefix("W/") {
            Some(after) => (true, after),
            None => (false, rest),
        };
        let Some(body) = quoted.strip_prefix('"') else {
            return Err(malformed("expected a quoted entity tag"));
        };
        let Some(end) = body.find('"') else {
            return Err(malformed("unterminated entity tag"));
        };

        entries.push(EntityTagMatch::Tag {
            tag: body[..end].to_string(),
            weak,
        });

        rest = body[end + 1..].trim_start();
        if rest.is_empty() {
            break;
        }
        let Some(after_comma) = rest.strip_prefix(',') else {
            return Err(malformed("expected ',' between entity tags"));
        };
        rest = after_comma;
    }

    Ok(entries)
}

/// Render a version tag as a JSON-quoted entity tag.
#[must_use]
pub fn quote_etag(tag: &str) -> String {
    serde_json::Value::String(tag.to_string()).to_string()
}
