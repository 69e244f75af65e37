use docket_core::prelude::*;
use serde_json::{Value as JsonValue, json};
use std::{
    collections::BTreeSet,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

const SIZES: [usize; 6] = [0, 1, 49, 50, 51, 160];
const PAGE_SIZES: [usize; 4] = [1, 20, 50, 500];

fn doc(json: JsonValue) -> Document {
    match Value::try_from(json).expect("representable") {
        Value::Map(map) => map,
        other => panic!("expected an object, found {other:?}"),
    }
}

// Ties on `_createdAt` are frequent so the identifier tie-break is exercised.
fn coarse_clock() -> docket_core::store::Clock {
    let tick = AtomicI64::new(0);
    Arc::new(move || Timestamp::from_millis(1_000 + tick.fetch_add(1, Ordering::SeqCst) / 4))
}

fn seeded(n: usize) -> ResourceEngine<MemoryStore, NoHooks> {
    let config = EngineConfig::default()
        .with_ordering("byScore", OrderingConfig::new().field("score", -1));
    let store = MemoryStore::new().with_clock(coarse_clock());
    let (engine, _) = ResourceEngine::open(store, NoHooks, config).expect("opens");

    for i in 0..n {
        // Interleave ids so insertion order differs from id order.
        let id = format!("r{:03}", (i * 37) % 1000);
        let ctx = RequestContext::new(Method::Put, format!("/things/{id}"));
        engine
            .replace(&ctx, &id, doc(json!({ "score": i % 7 })))
            .expect("seeded");
    }

    engine
}

// Follow `after` cursors to the end, checking page sizes on the way.
fn walk(
    engine: &ResourceEngine<MemoryStore, NoHooks>,
    order: &str,
    first: usize,
    total: usize,
) -> Vec<Document> {
    let mut rows = Vec::new();
    let mut after: Option<String> = None;

    loop {
        let mut ctx = RequestContext::new(Method::Get, "/things")
            .with_param("order", order)
            .with_param("first", first.to_string());
        if let Some(cursor) = after.take() {
            ctx = ctx.with_param("after", cursor);
        }

        let page = engine.list(&ctx).expect("page");
        let remaining = total - rows.len();
        assert_eq!(page.items.len(), remaining.min(first), "order {order}, first {first}");
        assert_eq!(page.link.is_some(), page.next_cursor.is_some());

        rows.extend(page.items);
        match page.next_cursor {
            Some(cursor) => after = Some(cursor),
            None => break,
        }
    }

    rows
}

fn id_of(row: &Document) -> String {
    match row.get("id") {
        Some(Value::Text(id)) => id.clone(),
        other => panic!("row without text id: {other:?}"),
    }
}

fn score_of(row: &Document) -> i64 {
    match row.get("score") {
        Some(Value::Int(score)) => *score,
        other => panic!("row without score: {other:?}"),
    }
}

#[test]
fn every_row_is_returned_exactly_once() {
    for n in SIZES {
        let engine = seeded(n);

        for order in ["created", "created-reverse", "byScore", "byScore-reverse"] {
            for first in PAGE_SIZES {
                let rows = walk(&engine, order, first, n);

                let ids: Vec<String> = rows.iter().map(id_of).collect();
                let unique: BTreeSet<&String> = ids.iter().collect();
                assert_eq!(ids.len(), n, "n {n}, order {order}, first {first}");
                assert_eq!(unique.len(), n, "duplicates for n {n}, order {order}, first {first}");
            }
        }
    }
}

#[test]
fn pages_follow_the_declared_ordering() {
    let engine = seeded(51);

    let rows = walk(&engine, "byScore", 20, 51);
    for pair in rows.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        assert!(
            score_of(a) > score_of(b) || (score_of(a) == score_of(b) && id_of(a) < id_of(b)),
            "{a:?} before {b:?}"
        );
    }

    let reversed = walk(&engine, "byScore-reverse", 7, 51);
    let mut forward: Vec<String> = rows.iter().map(id_of).collect();
    forward.reverse();
    assert_eq!(reversed.iter().map(id_of).collect::<Vec<_>>(), forward);
}

#[test]
fn cursors_survive_rows_inserted_behind_them() {
    let engine = seeded(10);

    let ctx = RequestContext::new(Method::Get, "/things")
        .with_param("order", "byScore")
        .with_param("first", "4");
    let page = engine.list(&ctx).expect("first page");
    let seen: Vec<String> = page.items.iter().map(id_of).collect();
    let cursor = page.next_cursor.expect("more");

    // A new top score sorts before the cursor and is not revisited.
    engine
        .replace(
            &RequestContext::new(Method::Put, "/things/zzz"),
            "zzz",
            doc(json!({ "score": 99 })),
        )
        .expect("inserted");

    let next = RequestContext::new(Method::Get, "/things")
        .with_param("order", "byScore")
        .with_param("after", cursor);
    let rest = engine.list(&next).expect("rest");
    let rest_ids: Vec<String> = rest.items.iter().map(id_of).collect();

    assert_eq!(rest_ids.len(), 6);
    assert!(rest_ids.iter().all(|id| !seen.contains(id) && id != "zzz"));
}

#[test]
fn page_size_is_clamped_and_checked() {
    let engine = seeded(3);

    let huge = RequestContext::new(Method::Get, "/things").with_query("first=100000");
    assert_eq!(engine.list(&huge).expect("clamped").items.len(), 3);

    let zero = RequestContext::new(Method::Get, "/things").with_query("first=0");
    let page = engine.list(&zero).expect("empty page");
    assert!(page.items.is_empty());
    assert_eq!(page.link, None);

    let junk = RequestContext::new(Method::Get, "/things").with_query("first=ten");
    let err = engine.list(&junk).expect_err("not a number");
    assert_eq!(err.status(), 400);
}

#[test]
fn malformed_cursors_are_bad_requests() {
    let engine = seeded(3);
    let ctx = RequestContext::new(Method::Get, "/things").with_query("after=%21%21not-a-cursor");

    let err = engine.list(&ctx).expect_err("bad cursor");
    assert!(err.to_string().contains("bad cursor"), "{err}");
    assert_eq!(err.status(), 400);
}
