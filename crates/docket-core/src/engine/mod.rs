//! Module: engine
//! Responsibility: resource operations over a store, wiring translation,
//! preconditions, hooks, projection and pagination together.
//! Does not own: transport; callers map `EngineError` and the responses
//! onto their protocol.
//! Boundary: stateless between calls; all same-resource serialization is
//! the store's compare-and-set.

mod read;
mod write;

#[cfg(test)]
mod tests;

use crate::{
    codec::{self, stored_version},
    config::{EngineConfig, ValidatedConfig},
    error::EngineError,
    hooks::{HookContext, RequestContext, ResourceHooks},
    index::{IndexPlan, plan_indexes},
    obs::{self, EngineEvent},
    precondition::{
        EntityTagMatch, IF_MATCH, IF_NONE_MATCH, PreconditionError, RequestKind, evaluate,
        parse_entity_tags, quote_etag,
    },
    projection::{FieldSelectors, project},
    store::{Store, StoreError},
    value::Document,
};

/// Query parameter selecting response fields on reads.
pub const FIELDS_PARAM: &str = "fields";

///
/// ResourceResponse
///
/// One resource: its projected body and JSON-quoted entity tag.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ResourceResponse {
    pub body: Document,
    pub etag: Option<String>,
}

///
/// ListResponse
///
/// One page. `link` is a ready-made `Link` header value for the next page.
///

#[derive(Clone, Debug, PartialEq)]
pub struct ListResponse {
    pub items: Vec<Document>,
    pub next_cursor: Option<String>,
    pub link: Option<String>,
}

///
/// ResourceEngine
///

pub struct ResourceEngine<S, H> {
    store: S,
    hooks: H,
    config: ValidatedConfig,
}

impl<S: Store, H: ResourceHooks> ResourceEngine<S, H> {
    /// Validate configuration and reconcile indexes.
    ///
    /// Missing indexes are created; indexes this engine once proposed but no
    /// longer needs are only reported in the returned plan.
    pub fn open(store: S, hooks: H, config: EngineConfig) -> Result<(Self, IndexPlan), EngineError> {
        let config = config.validate()?;

        let existing = match store.list_indexes() {
            Ok(indexes) => indexes,
            Err(StoreError::NamespaceNotFound) => Vec::new(),
            Err(err) => return Err(err.into()),
        };

        let plan = plan_indexes(&existing, &config.desired_indexes());
        if !plan.to_create.is_empty() {
            store.create_indexes(&plan.to_create)?;
        }

        obs::record(EngineEvent::IndexesReconciled {
            resource_kind: &config.resource_kind_name,
            created: plan.to_create.len(),
            depended_upon: plan.depended_upon.len(),
            retirable: plan.to_retire.len(),
        });
        for name in &plan.to_retire {
            obs::record(EngineEvent::IndexRetirable {
                resource_kind: &config.resource_kind_name,
                name,
            });
        }

        Ok((
            Self {
                store,
                hooks,
                config,
            },
            plan,
        ))
    }

    /// Drop indexes by name, typically `IndexPlan::to_retire`.
    pub fn retire_indexes(&self, names: &[String]) -> Result<(), EngineError> {
        for name in names {
            self.store.drop_index(name)?;
            obs::record(EngineEvent::IndexRetired {
                resource_kind: &self.config.resource_kind_name,
                name,
            });
        }

        Ok(())
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn hooks(&self) -> &H {
        &self.hooks
    }

    #[must_use]
    pub const fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    // Run one operation with fresh per-request hook state. Unexpected
    // failures are reported to the hook, which may replace them.
    fn run<T>(
        &self,
        ctx: &RequestContext,
        op: impl FnOnce(&mut Document) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut state = Document::new();

        op(&mut state).map_err(|err| {
            if err.is_unexpected() {
                self.hooks.on_unexpected_error(ctx, &err).unwrap_or(err)
            } else {
                err
            }
        })
    }

    fn no_such_resource(ctx: &RequestContext) -> EngineError {
        EngineError::NoSuchResource {
            path: ctx.path.clone(),
        }
    }

    // Stored document → response body: decode, `from_db`, `view`, project.
    fn render(
        &self,
        hctx: &mut HookContext<'_>,
        stored: &Document,
        selectors: &FieldSelectors,
    ) -> Result<Document, EngineError> {
        let entity = self.hooks.from_db(codec::to_entity(stored)?);
        let viewed = self.hooks.view(hctx, entity)?;

        Ok(project(stored, &viewed, selectors))
    }

    fn respond(
        &self,
        hctx: &mut HookContext<'_>,
        stored: &Document,
        selectors: &FieldSelectors,
    ) -> Result<ResourceResponse, EngineError> {
        Ok(ResourceResponse {
            body: self.render(hctx, stored, selectors)?,
            etag: stored_version(stored).map(quote_etag),
        })
    }

    // Entity record → stored document, through `to_db`.
    fn encode(&self, entity: Document) -> Result<Document, EngineError> {
        Ok(codec::to_storage(&self.hooks.to_db(entity))?)
    }

    // Entity record of an existing stored document, through `from_db`.
    fn decode(&self, stored: &Document) -> Result<Document, EngineError> {
        Ok(self.hooks.from_db(codec::to_entity(stored)?))
    }
}

///
/// Conditions
/// Parsed conditional headers of one request.
///

#[derive(Debug, Default)]
struct Conditions {
    if_match: Option<Vec<EntityTagMatch>>,
    if_none_match: Option<Vec<EntityTagMatch>>,
}

impl Conditions {
    // Empty header values count as absent.
    fn from_request(ctx: &RequestContext) -> Result<Self, PreconditionError> {
        let parse = |header: &'static str, raw: Option<&String>| {
            raw.filter(|value| !value.trim().is_empty())
                .map(|value| parse_entity_tags(header, value))
                .transpose()
        };

        Ok(Self {
            if_match: parse(IF_MATCH, ctx.if_match.as_ref())?,
            if_none_match: parse(IF_NONE_MATCH, ctx.if_none_match.as_ref())?,
        })
    }

    const fn has_if_match(&self) -> bool {
        self.if_match.is_some()
    }

    fn check(&self, current: Option<&str>, kind: RequestKind) -> Result<(), PreconditionError> {
        evaluate(
            current,
            self.if_match.as_deref(),
            self.if_none_match.as_deref(),
            kind,
        )
    }
}

// Response selectors for writes come from the mapping header.
fn response_selectors(ctx: &RequestContext) -> Result<FieldSelectors, EngineError> {
    match ctx.response_fields_mapping.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Ok(FieldSelectors::parse(&[raw])?),
        _ => Ok(FieldSelectors::root()),
    }
}
