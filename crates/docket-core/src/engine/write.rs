use crate::{
    codec::stored_version,
    engine::{Conditions, ResourceEngine, ResourceResponse, response_selectors},
    error::EngineError,
    hooks::{HookContext, RequestContext, ResourceHooks, ValidateOptions},
    key::ID_FIELD,
    patch::{PatchApplier, parse_patch, parse_pointer, patch_delta, reapply_changes},
    precondition::RequestKind,
    store::Store,
    value::{Document, Value, lookup_path, set_path},
};
use serde_json::Value as JsonValue;

pub const JSON_PATCH_MEDIA_TYPE: &str = "application/json-patch+json";
pub const JSON_MEDIA_TYPE: &str = "application/json";

impl<S: Store, H: ResourceHooks> ResourceEngine<S, H> {
    /// Create a resource under a freshly generated identifier.
    pub fn create(
        &self,
        ctx: &RequestContext,
        body: Document,
    ) -> Result<ResourceResponse, EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;
            self.hooks.before_mutate(&mut hctx, None)?;

            if let Some(id) = body.get(ID_FIELD) {
                return Err(EngineError::invalid_request(format!(
                    "may not create a resource with an id: {}",
                    id.clone().into_json()
                )));
            }
            let selectors = response_selectors(ctx)?;

            let id = self.hooks.generate_id();
            let mut body = body;
            let mut previous = Document::new();
            if let Some(id) = id {
                body.insert(ID_FIELD.to_string(), id.clone());
                previous.insert(ID_FIELD.to_string(), id);
            }
            let previous = self.hooks.populate_missing(&mut hctx, previous)?;

            let mut hctx = hctx.with_previous(Some(&previous));
            let value = self.replace_resource(&mut hctx, body, &previous)?;
            self.hooks.validate(
                &mut hctx,
                &value,
                ValidateOptions {
                    create: true,
                    ..ValidateOptions::default()
                },
            )?;
            let value = self.hooks.propagate(&mut hctx, value)?;

            let stored = self.store.atomic_insert(self.encode(value)?)?;

            self.respond(&mut hctx, &stored, &selectors)
        })
    }

    /// Replace a resource wholesale, creating it when allowed.
    ///
    /// Preconditions are checked against the version the store is about to
    /// replace, inside its compare-and-set.
    pub fn replace(
        &self,
        ctx: &RequestContext,
        raw_id: &str,
        body: Document,
    ) -> Result<ResourceResponse, EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;
            let id = self.hooks.parse_url_id(raw_id)?;
            self.hooks.before_mutate(&mut hctx, Some(&id))?;

            if let Some(body_id) = body.get(ID_FIELD)
                && !body_id.store_eq(&id)
            {
                return Err(EngineError::invalid_request(format!(
                    "id in body must be omitted or match id in path; path id: {}, body id: {}",
                    id.clone().into_json(),
                    body_id.clone().into_json()
                )));
            }
            let conditions = Conditions::from_request(ctx)?;
            let selectors = response_selectors(ctx)?;

            let mut mutate = |current: Option<&Document>| -> Result<Document, EngineError> {
                conditions.check(current.and_then(stored_version), RequestKind::Write)?;

                let (previous, create) = match current {
                    Some(stored) => (self.decode(stored)?, false),
                    None => (self.missing_record(&mut hctx, &id)?, true),
                };

                let mut hctx =
                    HookContext::new(ctx, &mut *hctx.state).with_previous(Some(&previous));
                let value = self.replace_resource(&mut hctx, body.clone(), &previous)?;
                self.hooks.validate(
                    &mut hctx,
                    &value,
                    ValidateOptions {
                        create,
                        ..ValidateOptions::default()
                    },
                )?;
                let value = self.hooks.propagate(&mut hctx, value)?;

                self.encode(value)
            };

            let stored = self
                .store
                .atomic_update(&id, self.config.allow_put_create, &mut mutate)?;
            let Some(stored) = stored else {
                conditions.check(None, RequestKind::Write)?;
                return Err(Self::no_such_resource(ctx));
            };

            self.respond(&mut hctx, &stored, &selectors)
        })
    }

    /// Apply a JSON Patch to a resource.
    ///
    /// The patch runs against the caller's view of the resource; the
    /// resulting changes are replayed onto the unredacted record so fields
    /// hidden by `view` survive.
    pub fn patch(
        &self,
        ctx: &RequestContext,
        raw_id: &str,
        content_type: Option<&str>,
        body: JsonValue,
        applier: &dyn PatchApplier,
    ) -> Result<ResourceResponse, EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;
            let id = self.hooks.parse_url_id(raw_id)?;
            self.hooks.before_mutate(&mut hctx, Some(&id))?;

            if !is_json_patch(content_type, &body) {
                return Err(EngineError::UnsupportedContentType {
                    method: ctx.method.to_string(),
                    resource_kind: self.config.resource_kind_name.clone(),
                    expected: vec![JSON_PATCH_MEDIA_TYPE.to_string()],
                    actual: content_type.map(str::to_string),
                });
            }
            let ops = parse_patch(body)?;
            let conditions = Conditions::from_request(ctx)?;
            let selectors = response_selectors(ctx)?;
            let upsert = !conditions.has_if_match() && self.config.allow_patch_create;

            let mut mutate = |current: Option<&Document>| -> Result<Document, EngineError> {
                conditions.check(current.and_then(stored_version), RequestKind::Write)?;

                let (unredacted, create) = match current {
                    Some(stored) => (self.decode(stored)?, false),
                    None => {
                        let record = self.missing_record(&mut hctx, &id)?;
                        (self.hooks.view(&mut hctx, record)?, true)
                    }
                };

                let viewed = self.hooks.view(&mut hctx, unredacted.clone())?;
                let mut modified = viewed.clone();
                applier.apply(&mut modified, &ops)?;
                let delta = patch_delta(&modified, &ops)?;

                let mut value = unredacted.clone();
                reapply_changes(&viewed, &modified, &mut value);

                let mut hctx =
                    HookContext::new(ctx, &mut *hctx.state).with_previous(Some(&unredacted));
                self.hooks.validate(
                    &mut hctx,
                    &value,
                    ValidateOptions {
                        create,
                        delta: Some(&delta),
                        patch: Some(&ops),
                    },
                )?;

                self.encode(value)
            };

            let stored = self.store.atomic_update(&id, upsert, &mut mutate)?;
            let Some(stored) = stored else {
                conditions.check(None, RequestKind::Write)?;
                return Err(Self::no_such_resource(ctx));
            };

            self.respond(&mut hctx, &stored, &selectors)
        })
    }

    /// Delete a resource; preconditions are checked by the store's delete
    /// confirmation.
    pub fn delete(&self, ctx: &RequestContext, raw_id: &str) -> Result<(), EngineError> {
        self.run(ctx, |state| {
            let mut hctx = HookContext::new(ctx, state);
            self.hooks.before_request(&mut hctx)?;
            let id = self.hooks.parse_url_id(raw_id)?;
            self.hooks.before_mutate(&mut hctx, Some(&id))?;
            let conditions = Conditions::from_request(ctx)?;

            let mut confirm = |current: &Document| -> Result<(), EngineError> {
                Ok(conditions.check(stored_version(current), RequestKind::Write)?)
            };

            if self.store.atomic_delete(&id, &mut confirm)? {
                Ok(())
            } else {
                conditions.check(None, RequestKind::Write)?;
                Err(Self::no_such_resource(ctx))
            }
        })
    }

    // Starting record for a resource that does not exist yet.
    fn missing_record(
        &self,
        hctx: &mut HookContext<'_>,
        id: &Value,
    ) -> Result<Document, EngineError> {
        let mut record = Document::new();
        record.insert(ID_FIELD.to_string(), id.clone());

        Ok(self.hooks.populate_missing(hctx, record)?)
    }

    // New value for a full replacement: the proposed body, over the previous
    // values of preserved keys (always including `/id`).
    fn replace_resource(
        &self,
        hctx: &mut HookContext<'_>,
        proposed: Document,
        previous: &Document,
    ) -> Result<Document, EngineError> {
        let mut pointers = self.hooks.preserved_keys(hctx, previous, &proposed);
        pointers.push(format!("/{ID_FIELD}"));

        let mut value = Document::new();
        for pointer in &pointers {
            let tokens = parse_pointer(pointer).map_err(EngineError::unexpected)?;
            if let Some(kept) = lookup_path(previous, &tokens) {
                set_path(&mut value, &tokens, kept.clone());
            }
        }
        merge_into(&mut value, proposed);

        Ok(value)
    }
}

// Deep merge: maps merge key by key; anything else from `source` wins.
fn merge_into(target: &mut Document, source: Document) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Map(existing)), Value::Map(incoming)) => merge_into(existing, incoming),
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

// JSON Patch media type, or plain JSON whose body is an operation array.
fn is_json_patch(content_type: Option<&str>, body: &JsonValue) -> bool {
    let Some(raw) = content_type else {
        return false;
    };
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();

    match essence.as_str() {
        JSON_PATCH_MEDIA_TYPE => true,
        JSON_MEDIA_TYPE => body.is_array(),
        _ => false,
    }
}
