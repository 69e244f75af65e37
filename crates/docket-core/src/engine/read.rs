use crate::{
    codec::stored_version,
    config::CREATED_ORDERING,
    cursor::{decode_cursor, encode_cursor},
    engine::{Conditions, FIELDS_PARAM, ListResponse, ResourceEngine, ResourceResponse},
    error::EngineError,
    filter::parse_filter,
    hooks::{HookContext, RequestContext, ResourceHooks},
    obs::{self, EngineEvent},
    page::{AFTER_PARAM, next_link, parse_page_size, split_page},
    precondition::RequestKind,
    predicate::Predicate,
    projection::FieldSelectors,
    store::{FindQuery, Store},
};

/// Query parameter naming the ordering of a list.
pub const ORDER_PARAM: &str = "order";

/// Query parameter carrying filter expressions.
pub const FILTER_PARAM: &str = "filter";

/// Query parameter carrying the page size.
pub const FIRST_PARAM: &str = "first";

impl<S: Store, H: ResourceHooks> ResourceEngine<S, H> {
    /// Fetch one resource.
    ///
    /// A missing resource is `NoSuchResource` before any precondition is
    /// looked at; an `If-None-Match` hit is `NotModified`.
    pub fn get(&self, ctx: &RequestContext, raw_id: &str) -> Result<ResourceResponse, EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;

            let id = self.hooks.parse_url_id(raw_id)?;
            let conditions = Conditions::from_request(ctx)?;
            let selectors = FieldSelectors::parse(&ctx.query_values(FIELDS_PARAM))?;

            let stored = self
                .store
                .find_one(&id)?
                .ok_or_else(|| Self::no_such_resource(ctx))?;
            conditions.check(stored_version(&stored), RequestKind::Read)?;

            self.respond(&mut hctx, &stored, &selectors)
        })
    }

    /// One page of resources under a declared ordering.
    pub fn list(&self, ctx: &RequestContext) -> Result<ListResponse, EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;

            let requested = ctx
                .query_value(ORDER_PARAM)
                .filter(|name| !name.is_empty())
                .unwrap_or(CREATED_ORDERING);
            let (ordering, key) = self.config.resolve_ordering(requested).ok_or_else(|| {
                EngineError::invalid_request(format!("no such ordering: {requested}"))
            })?;

            let mut conjuncts = parse_filter(&ctx.query_values(FILTER_PARAM), &ordering.filters)?;
            let after = ctx.query_value(AFTER_PARAM).filter(|token| !token.is_empty());
            if let Some(token) = after {
                conjuncts.push(decode_cursor(token, key)?);
            }

            let first = parse_page_size(
                ctx.query_value(FIRST_PARAM),
                self.config.default_page_size,
                self.config.max_page_size,
            )?;
            let selectors = FieldSelectors::parse(&ctx.query_values(FIELDS_PARAM))?;

            obs::record(EngineEvent::ListQuery {
                request_id: &ctx.request_id,
                ordering: requested,
                limit: first,
                conjuncts: conjuncts.len(),
                has_cursor: after.is_some(),
            });

            let rows = self.store.find(&FindQuery {
                predicate: Predicate::all(conjuncts),
                sort: key.clone(),
                limit: first.saturating_add(1),
            })?;
            let page = split_page(rows, first);

            let next_cursor = match page.items.last() {
                Some(last) if page.has_more => Some(encode_cursor(last, key)?),
                _ => None,
            };
            let link = next_cursor
                .as_deref()
                .map(|cursor| next_link(&ctx.path, &ctx.query, cursor));

            let items = page
                .items
                .iter()
                .map(|stored| self.render(&mut hctx, stored, &selectors))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(ListResponse {
                items,
                next_cursor,
                link,
            })
        })
    }
}
