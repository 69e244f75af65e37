use super::*;
use crate::{
    config::OrderingConfig,
    hooks::{HookError, Method, NoHooks, ValidateOptions},
    ids::RESOURCE_ID_LEN,
    patch::{PatchError, PatchOp, parse_pointer},
    store::MemoryStore,
    value::{Value, set_path},
};
use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};

fn doc(json: JsonValue) -> Document {
    match Value::try_from(json).expect("representable") {
        Value::Map(map) => map,
        other => panic!("expected an object, found {other:?}"),
    }
}

fn json_of(doc: &Document) -> JsonValue {
    Value::Map(doc.clone()).into_json()
}

fn engine<H: ResourceHooks>(hooks: H) -> ResourceEngine<MemoryStore, H> {
    engine_with(hooks, EngineConfig::default())
}

fn engine_with<H: ResourceHooks>(hooks: H, config: EngineConfig) -> ResourceEngine<MemoryStore, H> {
    let (engine, _) = ResourceEngine::open(MemoryStore::new(), hooks, config).expect("opens");
    engine
}

fn put(path: &str) -> RequestContext {
    RequestContext::new(Method::Put, path)
}

// Handles add, replace and top-level remove, which is all these tests send.
fn apply_simple(target: &mut Document, ops: &[PatchOp]) -> Result<(), PatchError> {
    for op in ops {
        match op {
            PatchOp::Add { path, value } | PatchOp::Replace { path, value } => {
                set_path(target, &parse_pointer(path)?, value.clone());
            }
            PatchOp::Remove { path } => match parse_pointer(path)?.as_slice() {
                [key] => {
                    target.remove(key);
                }
                _ => {
                    return Err(PatchError::Apply {
                        reason: format!("nested remove at {path}"),
                    });
                }
            },
            other => {
                return Err(PatchError::Apply {
                    reason: format!("unsupported operation at {}", other.path()),
                });
            }
        }
    }

    Ok(())
}

///
/// Keeper
/// Hides `secret`, preserves `/owner`, rejects negative ages and records
/// what `validate` was told.
///

#[derive(Default)]
struct Keeper {
    validated: Mutex<Vec<(bool, Option<Document>)>>,
}

impl ResourceHooks for Keeper {
    fn preserved_keys(
        &self,
        _ctx: &mut HookContext<'_>,
        _previous: &Document,
        _proposed: &Document,
    ) -> Vec<String> {
        vec!["/owner".to_string()]
    }

    fn validate(
        &self,
        _ctx: &mut HookContext<'_>,
        value: &Document,
        options: ValidateOptions<'_>,
    ) -> Result<(), HookError> {
        self.validated
            .lock()
            .push((options.create, options.delta.cloned()));

        match value.get("age") {
            Some(Value::Int(age)) if *age < 0 => Err(HookError::validation("age must not be negative")),
            _ => Ok(()),
        }
    }

    fn view(&self, _ctx: &mut HookContext<'_>, mut value: Document) -> Result<Document, HookError> {
        value.remove("secret");
        Ok(value)
    }
}

///
/// Masking
/// Replaces every unexpected failure with a client error.
///

struct Masking;

impl ResourceHooks for Masking {
    fn on_unexpected_error(&self, _request: &RequestContext, _err: &EngineError) -> Option<EngineError> {
        Some(EngineError::Hook(HookError::Client {
            status: 503,
            code: "STORE_DOWN".to_string(),
            message: "try again later".to_string(),
            details: None,
        }))
    }
}

#[test]
fn create_generates_an_identifier_and_first_version() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Post, "/things");

    let created = engine
        .create(&ctx, doc(json!({ "name": "ada" })))
        .expect("created");

    let Some(Value::Text(id)) = created.body.get("id") else {
        panic!("id missing: {:?}", created.body);
    };
    assert_eq!(id.len(), RESOURCE_ID_LEN);
    assert_eq!(created.body.get("name"), Some(&Value::from("ada")));
    assert_eq!(created.etag.as_deref(), Some("\"1\""));
    assert_eq!(engine.store().len(), 1);
}

#[test]
fn create_rejects_a_body_that_names_its_identifier() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Post, "/things");

    let err = engine
        .create(&ctx, doc(json!({ "id": "mine" })))
        .expect_err("id in body");

    assert!(matches!(err, EngineError::InvalidRequest { .. }), "{err:?}");
    assert_eq!(err.status(), 400);
    assert!(engine.store().is_empty());
}

#[test]
fn create_projects_through_the_response_mapping_header() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Post, "/things").with_response_fields_mapping("name,$eTag");

    let created = engine
        .create(&ctx, doc(json!({ "name": "ada", "age": 3 })))
        .expect("created");

    assert_eq!(json_of(&created.body), json!({ "name": "ada", "$eTag": "1" }));
}

#[test]
fn get_reports_missing_resources_before_preconditions() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Get, "/things/nope").with_if_match("\"1\"");

    let err = engine.get(&ctx, "nope").expect_err("missing");

    assert!(matches!(&err, EngineError::NoSuchResource { path } if path == "/things/nope"));
    assert_eq!(err.status(), 404);
}

#[test]
fn get_honours_conditional_headers_and_fields() {
    let engine = engine(NoHooks);
    engine
        .replace(&put("/things/a"), "a", doc(json!({ "name": "ada", "age": 3 })))
        .expect("stored");

    let unchanged = RequestContext::new(Method::Get, "/things/a").with_if_none_match("W/\"1\"");
    let err = engine.get(&unchanged, "a").expect_err("not modified");
    assert!(matches!(&err, EngineError::NotModified { etag } if etag == "1"));
    assert_eq!(err.status(), 304);

    let stale = RequestContext::new(Method::Get, "/things/a").with_if_match("\"9\"");
    let err = engine.get(&stale, "a").expect_err("stale");
    assert!(matches!(err, EngineError::PreconditionFailed { .. }));

    let projected = RequestContext::new(Method::Get, "/things/a").with_query("fields=age");
    let found = engine.get(&projected, "a").expect("found");
    assert_eq!(json_of(&found.body), json!({ "age": 3 }));
    assert_eq!(found.etag.as_deref(), Some("\"1\""));
}

#[test]
fn empty_conditional_headers_are_ignored() {
    let engine = engine(NoHooks);
    engine
        .replace(&put("/things/a"), "a", doc(json!({})))
        .expect("stored");

    let ctx = RequestContext::new(Method::Get, "/things/a")
        .with_if_match("")
        .with_if_none_match("  ");

    assert!(engine.get(&ctx, "a").is_ok());
}

#[test]
fn replace_creates_missing_resources_when_allowed() {
    let engine = engine(NoHooks);

    let created = engine
        .replace(&put("/things/a"), "a", doc(json!({ "name": "ada" })))
        .expect("upserted");
    assert_eq!(json_of(&created.body), json!({ "id": "a", "name": "ada" }));

    let closed = engine_with(
        NoHooks,
        EngineConfig {
            allow_put_create: false,
            ..EngineConfig::default()
        },
    );
    let err = closed
        .replace(&put("/things/a"), "a", doc(json!({ "name": "ada" })))
        .expect_err("no upsert");
    assert!(matches!(err, EngineError::NoSuchResource { .. }), "{err:?}");
}

#[test]
fn replace_rejects_a_mismatched_body_identifier() {
    let engine = engine(NoHooks);

    let err = engine
        .replace(&put("/things/a"), "a", doc(json!({ "id": "b" })))
        .expect_err("mismatch");
    assert!(matches!(err, EngineError::InvalidRequest { .. }));

    engine
        .replace(&put("/things/a"), "a", doc(json!({ "id": "a", "n": 1 })))
        .expect("matching id is fine");
}

#[test]
fn replace_evaluates_preconditions_against_the_stored_version() {
    let engine = engine(NoHooks);
    engine
        .replace(&put("/things/a"), "a", doc(json!({ "n": 1 })))
        .expect("v1");

    let stale = put("/things/a").with_if_match("\"7\"");
    let err = engine
        .replace(&stale, "a", doc(json!({ "n": 2 })))
        .expect_err("stale");
    assert!(matches!(err, EngineError::PreconditionFailed { header: "If-Match" }));

    let fresh = put("/things/a").with_if_match("\"1\"");
    let replaced = engine
        .replace(&fresh, "a", doc(json!({ "n": 2 })))
        .expect("fresh");
    assert_eq!(replaced.etag.as_deref(), Some("\"2\""));

    let create_only = put("/things/a").with_if_none_match("*");
    let err = engine
        .replace(&create_only, "a", doc(json!({ "n": 3 })))
        .expect_err("already exists");
    assert!(matches!(err, EngineError::PreconditionFailed { header: "If-None-Match" }));
}

#[test]
fn replace_with_if_match_on_a_missing_resource_fails_the_precondition() {
    let engine = engine(NoHooks);
    let ctx = put("/things/a").with_if_match("*");

    let err = engine
        .replace(&ctx, "a", doc(json!({})))
        .expect_err("nothing to match");

    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err:?}");
    assert!(engine.store().is_empty());
}

#[test]
fn replace_keeps_preserved_keys_from_the_previous_value() {
    let engine = engine(Keeper::default());
    engine
        .replace(&put("/things/a"), "a", doc(json!({ "owner": "grace", "n": 1 })))
        .expect("v1");

    let replaced = engine
        .replace(&put("/things/a"), "a", doc(json!({ "n": 2 })))
        .expect("v2");

    assert_eq!(json_of(&replaced.body), json!({ "id": "a", "owner": "grace", "n": 2 }));

    let validated = engine.hooks().validated.lock();
    assert_eq!(validated.iter().map(|(create, _)| *create).collect::<Vec<_>>(), vec![true, false]);
}

#[test]
fn validation_failures_surface_unchanged_and_store_nothing() {
    let engine = engine(Keeper::default());

    let err = engine
        .replace(&put("/things/a"), "a", doc(json!({ "age": -1 })))
        .expect_err("invalid");

    assert_eq!(err.status(), 400);
    assert_eq!(err.code(), "VALIDATION_ERROR");
    assert_eq!(err.to_string(), "age must not be negative");
    assert!(engine.store().is_empty());
}

#[test]
fn patch_applies_to_the_view_and_keeps_hidden_fields() {
    let engine = engine(Keeper::default());
    engine
        .replace(
            &put("/things/a"),
            "a",
            doc(json!({ "name": "ada", "secret": "s3", "owner": "grace" })),
        )
        .expect("v1");

    let ctx = RequestContext::new(Method::Patch, "/things/a");
    let patched = engine
        .patch(
            &ctx,
            "a",
            Some("application/json-patch+json; charset=utf-8"),
            json!([{ "op": "replace", "path": "/name", "value": "lovelace" }]),
            &apply_simple,
        )
        .expect("patched");

    assert_eq!(
        json_of(&patched.body),
        json!({ "id": "a", "name": "lovelace", "owner": "grace" })
    );

    let stored = engine
        .store()
        .find_one(&Value::from("a"))
        .expect("readable")
        .expect("present");
    assert_eq!(stored.get("secret"), Some(&Value::from("s3")));

    let validated = engine.hooks().validated.lock();
    let (create, delta) = validated.last().expect("validated");
    assert!(!create);
    assert_eq!(delta.as_ref().map(json_of), Some(json!({ "name": "lovelace" })));
}

#[test]
fn patch_accepts_plain_json_only_for_operation_arrays() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Patch, "/things/a");

    let err = engine
        .patch(&ctx, "a", Some("application/json"), json!({ "name": "x" }), &apply_simple)
        .expect_err("merge patch");
    assert_eq!(err.status(), 415);
    assert!(err.to_string().contains("got application/json"), "{err}");

    let err = engine
        .patch(&ctx, "a", None, json!([]), &apply_simple)
        .expect_err("no content type");
    assert!(matches!(err, EngineError::UnsupportedContentType { actual: None, .. }));

    let created = engine
        .patch(
            &ctx,
            "a",
            Some("Application/JSON"),
            json!([{ "op": "add", "path": "/name", "value": "x" }]),
            &apply_simple,
        )
        .expect("array body");
    assert_eq!(json_of(&created.body), json!({ "id": "a", "name": "x" }));
}

#[test]
fn patch_never_upserts_under_if_match() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Patch, "/things/a").with_if_match("\"1\"");

    let err = engine
        .patch(
            &ctx,
            "a",
            Some("application/json-patch+json"),
            json!([{ "op": "add", "path": "/n", "value": 1 }]),
            &apply_simple,
        )
        .expect_err("missing");

    assert!(matches!(err, EngineError::PreconditionFailed { .. }), "{err:?}");
    assert!(engine.store().is_empty());
}

#[test]
fn malformed_patches_are_invalid_requests() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Patch, "/things/a");

    let err = engine
        .patch(
            &ctx,
            "a",
            Some("application/json-patch+json"),
            json!([{ "op": "add" }]),
            &apply_simple,
        )
        .expect_err("malformed");

    assert!(matches!(err, EngineError::InvalidRequest { .. }), "{err:?}");
}

#[test]
fn patching_an_integer_beyond_i64_fails_loudly() {
    let engine = engine(NoHooks);
    engine
        .replace(&put("/things/a"), "a", doc(json!({ "n": 1 })))
        .expect("stored");
    let ctx = RequestContext::new(Method::Patch, "/things/a");

    let err = engine
        .patch(
            &ctx,
            "a",
            Some("application/json-patch+json"),
            json!([{ "op": "replace", "path": "/n", "value": 18_446_744_073_709_551_615_u64 }]),
            &apply_simple,
        )
        .expect_err("u64::MAX");

    assert!(
        matches!(&err, EngineError::UnrepresentableEntity { path, .. } if path == "/0/value"),
        "{err:?}"
    );
    assert_eq!(err.status(), 400);

    let found = engine
        .get(&RequestContext::new(Method::Get, "/things/a"), "a")
        .expect("still there");
    assert_eq!(found.body.get("n"), Some(&Value::Int(1)));
    assert_eq!(found.etag.as_deref(), Some("\"1\""));
}

#[test]
fn delete_checks_preconditions_before_removing() {
    let engine = engine(NoHooks);
    engine
        .replace(&put("/things/a"), "a", doc(json!({})))
        .expect("stored");

    let stale = RequestContext::new(Method::Delete, "/things/a").with_if_match("\"5\"");
    let err = engine.delete(&stale, "a").expect_err("stale");
    assert!(matches!(err, EngineError::PreconditionFailed { .. }));
    assert_eq!(engine.store().len(), 1);

    let ctx = RequestContext::new(Method::Delete, "/things/a");
    engine.delete(&ctx, "a").expect("deleted");
    assert!(engine.store().is_empty());

    let err = engine.delete(&ctx, "a").expect_err("gone");
    assert!(matches!(err, EngineError::NoSuchResource { .. }));
}

#[test]
fn list_pages_with_a_next_link() {
    let engine = engine_with(
        NoHooks,
        EngineConfig::default().with_ordering("byName", OrderingConfig::new().field("name", 1)),
    );
    for (id, name) in [("a", "delta"), ("b", "alpha"), ("c", "charlie")] {
        engine
            .replace(&put(&format!("/things/{id}")), id, doc(json!({ "name": name })))
            .expect("stored");
    }

    let ctx = RequestContext::new(Method::Get, "/things").with_query("order=byName&first=2");
    let page = engine.list(&ctx).expect("first page");
    let names: Vec<JsonValue> = page.items.iter().map(|item| json_of(item)["name"].clone()).collect();
    assert_eq!(names, vec![json!("alpha"), json!("charlie")]);

    let cursor = page.next_cursor.expect("more rows");
    let link = page.link.expect("link");
    assert!(link.starts_with("</things?order=byName&first=2&after="), "{link}");
    assert!(link.ends_with(">; rel=\"next\""), "{link}");

    let ctx = ctx.with_param("after", cursor);
    let page = engine.list(&ctx).expect("second page");
    assert_eq!(page.items.len(), 1);
    assert_eq!(json_of(&page.items[0])["name"], json!("delta"));
    assert_eq!(page.next_cursor, None);
    assert_eq!(page.link, None);
}

#[test]
fn list_rejects_unknown_orderings() {
    let engine = engine(NoHooks);
    let ctx = RequestContext::new(Method::Get, "/things").with_query("order=byColour");

    let err = engine.list(&ctx).expect_err("unknown ordering");
    assert!(matches!(err, EngineError::InvalidRequest { .. }), "{err:?}");
}

#[test]
fn empty_order_and_page_size_fall_back_to_defaults() {
    let engine = engine(NoHooks);
    for id in ["a", "b"] {
        engine
            .replace(&put(&format!("/things/{id}")), id, doc(json!({})))
            .expect("stored");
    }

    let ctx = RequestContext::new(Method::Get, "/things").with_query("order=&first=");
    let page = engine.list(&ctx).expect("defaults");

    assert_eq!(page.items.len(), 2);
    assert_eq!(page.next_cursor, None);
}

#[test]
fn unexpected_failures_surface_as_internal_errors() {
    let engine = engine(NoHooks);
    engine.store().set_offline(true);

    let err = engine
        .get(&RequestContext::new(Method::Get, "/things/a"), "a")
        .expect_err("offline");

    assert!(err.is_unexpected());
    assert_eq!(err.status(), 500);
}

#[test]
fn the_unexpected_error_hook_may_replace_the_failure() {
    let engine = engine(Masking);
    engine.store().set_offline(true);

    let err = engine
        .list(&RequestContext::new(Method::Get, "/things"))
        .expect_err("offline");

    assert_eq!(err.status(), 503);
    assert_eq!(err.code(), "STORE_DOWN");
}

#[test]
fn open_aborts_when_index_listing_fails() {
    let store = MemoryStore::new();
    store.set_offline(true);

    let err = ResourceEngine::open(store, NoHooks, EngineConfig::default())
        .err()
        .expect("listing fails");

    assert!(err.is_unexpected(), "{err:?}");
    assert_eq!(err.status(), 500);
}

#[test]
fn open_creates_missing_indexes_once() {
    let (engine, plan) =
        ResourceEngine::open(MemoryStore::new(), NoHooks, EngineConfig::default()).expect("opens");
    assert_eq!(plan.to_create.len(), 1);
    assert_eq!(plan.to_create[0].name, "Order [$createdAt+,id+]");

    let existing = engine.store().list_indexes().expect("namespace exists");
    let again = plan_indexes(&existing, &engine.config().desired_indexes());
    assert!(again.is_settled());
    assert_eq!(again.depended_upon, vec!["Order [$createdAt+,id+]".to_string()]);
}
