//! Module: page
//! Responsibility: page-size bounds and next-page link construction.


use thiserror::Error as ThisError;
use url::form_urlencoded;

/// Page size when the request does not name one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Largest page a single request may ask for.
pub const MAX_PAGE_SIZE: usize = 500;

/// Query parameter carrying the continuation cursor.
pub const AFTER_PARAM: &str = "after";

///
/// PageError
///

#[derive(Clone, Debug, Eq, ThisError, PartialEq)]
pub enum PageError {
    #[error("page size '{raw}' is not an integer")]
    InvalidPageSize { raw: String },
}

/// Resolve the `first` parameter, clamped to `[0, max]`. An empty value
/// counts as absent.
pub fn parse_page_size(raw: Option<&str>, default: usize, max: usize) -> Result<usize, PageError> {
    let Some(raw) = raw.filter(|raw| !raw.is_empty()) else {
        return Ok(default.min(max));
    };

    let text = raw.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PageError::InvalidPageSize {
            raw: raw.to_string(),
        });
    }

    if negative {
        return Ok(0);
    }

    // Digits beyond usize saturate; the clamp below absorbs them.
    Ok(digits.parse::<usize>().unwrap_or(usize::MAX).min(max))
}

///
/// Page
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub has_more: bool,
}

/// Trim a `first + 1` fetch down to the page proper.
///
/// `has_more` is only reported for non-empty pages, since a cursor needs a
/// last row to continue from.
#[must_use]
pub fn split_page<T>(mut rows: Vec<T>, first: usize) -> Page<T> {
    let has_more = first > 0 && rows.len() > first;
    rows.truncate(first);

    Page {
        items: rows,
        has_more,
    }
}

/// Build a `Link` header value pointing at the next page.
///
/// Every query parameter other than `after` is carried over in order; the
/// new cursor is appended.
#[must_use]
pub fn next_link(path: &str, query: &[(String, String)], after: &str) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in query {
        if name != AFTER_PARAM {
            serializer.append_pair(name, value);
        }
    }
    serializer.append_pair(AFTER_PARAM, after);

    format!("<{path}?{}>; rel=\"next\"", serializer.finish())
}
