use crate::{ids::generate_request_id, value::Document};
use derive_more::Display;
use url::form_urlencoded;

///
/// Method
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Method {
    #[display("GET")]
    Get,
    #[display("POST")]
    Post,
    #[display("PUT")]
    Put,
    #[display("PATCH")]
    Patch,
    #[display("DELETE")]
    Delete,
}

///
/// RequestContext
///
/// Transport-neutral request metadata. Query parameters keep their order and
/// repetition; header values are raw.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub response_fields_mapping: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: generate_request_id(),
            method,
            path: path.into(),
            query: Vec::new(),
            if_match: None,
            if_none_match: None,
            response_fields_mapping: None,
        }
    }

    /// Decode an `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn with_query(mut self, raw: &str) -> Self {
        let raw = raw.strip_prefix('?').unwrap_or(raw);
        self.query = form_urlencoded::parse(raw.as_bytes())
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();
        self
    }

    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_if_match(mut self, value: impl Into<String>) -> Self {
        self.if_match = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_if_none_match(mut self, value: impl Into<String>) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    #[must_use]
    pub fn with_response_fields_mapping(mut self, value: impl Into<String>) -> Self {
        self.response_fields_mapping = Some(value.into());
        self
    }

    /// First value of a query parameter.
    #[must_use]
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Every value of a repeated query parameter, in order.
    #[must_use]
    pub fn query_values(&self, name: &str) -> Vec<&str> {
        self.query
            .iter()
            .filter(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
            .collect()
    }
}

///
/// HookContext
///
/// What a hook sees: the request, the resource's previous entity record
/// when one exists, and scratch state shared by every hook of one request.
///

#[derive(Debug)]
pub struct HookContext<'a> {
    pub request: &'a RequestContext,
    pub previous: Option<&'a Document>,
    pub state: &'a mut Document,
}

impl<'a> HookContext<'a> {
    #[must_use]
    pub const fn new(request: &'a RequestContext, state: &'a mut Document) -> Self {
        Self {
            request,
            previous: None,
            state,
        }
    }

    #[must_use]
    pub const fn with_previous(mut self, previous: Option<&'a Document>) -> Self {
        self.previous = previous;
        self
    }
}
