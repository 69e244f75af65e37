use super::*;
use crate::ordering::{OrderField, compile};
use proptest::prelude::*;

fn key(pairs: &[(&str, i64)], reverse: bool) -> IndexKey {
    let fields: Vec<OrderField> = pairs
        .iter()
        .map(|(field, dir)| OrderField::parse(field, *dir).expect("valid order field"))
        .collect();
    compile(&fields, reverse).expect("ordering compiles")
}

fn row(name: Value, id: &str) -> Document {
    let mut doc = Document::new();
    doc.insert("name".to_string(), name);
    doc.insert("_id".to_string(), Value::from(id));
    doc
}

#[test]
fn cursor_normalizes_store_native_values() {
    let key = key(&[("$createdAt", 1), ("owner", 1)], false);
    let mut last = Document::new();
    last.insert(
        "_createdAt".to_string(),
        Value::Timestamp(Timestamp::from_millis(1_500)),
    );
    last.insert(
        "owner".to_string(),
        Value::ObjectId(ObjectId::from_bytes([1; 12])),
    );
    last.insert("_id".to_string(), Value::from("abc"));

    let token = encode_cursor(&last, &key).expect("encodable");
    let payload = decode_token(&token).expect("valid base-58");
    assert_eq!(
        String::from_utf8(payload).expect("utf-8 json"),
        r#"[{"date":1500},{"oid":"010101010101010101010101"},"abc"]"#
    );

    let values = decode_cursor_values(&token, &key).expect("decodes");
    assert_eq!(
        values,
        vec![
            Value::Timestamp(Timestamp::from_millis(1_500)),
            Value::ObjectId(ObjectId::from_bytes([1; 12])),
            Value::from("abc"),
        ]
    );
}

#[test]
fn missing_key_fields_encode_as_null() {
    let key = key(&[("nickname", 1)], false);
    let token = encode_cursor(&row(Value::from("x"), "a"), &key).expect("encodable");

    assert_eq!(
        decode_cursor_values(&token, &key).expect("decodes"),
        vec![Value::Null, Value::from("a")]
    );
}

#[test]
fn structured_values_cannot_be_cursor_values() {
    let key = key(&[("name", 1)], false);
    let err = encode_cursor(&row(Value::Array(vec![]), "a"), &key)
        .expect_err("arrays are not permitted");

    assert_eq!(
        err,
        CursorError::UnsupportedKeyValue {
            path: "name".to_string(),
            kind: ValueKind::Array,
        }
    );
}

#[test]
fn decode_rejects_wrong_arity_and_foreign_payloads() {
    let key = key(&[("name", 1)], false);

    let short = encode_token(br#"["only one"]"#);
    let err = decode_cursor(&short, &key).expect_err("arity must match");
    assert_eq!(
        err,
        CursorError::ArityMismatch {
            expected: 2,
            found: 1
        }
    );

    let object = encode_token(br#"{"name":"x"}"#);
    let err = decode_cursor(&object, &key).expect_err("payload must be an array");
    assert!(matches!(err, CursorError::Payload { .. }), "{err:?}");

    let nested = encode_token(br#"[[1],"a"]"#);
    let err = decode_cursor(&nested, &key).expect_err("arrays are not permitted");
    assert_eq!(err, CursorError::UnsupportedElement { position: 0 });

    let bad_tag = encode_token(br#"[{"date":"soon"},"a"]"#);
    let err = decode_cursor(&bad_tag, &key).expect_err("date tag needs millis");
    assert_eq!(err, CursorError::UnsupportedElement { position: 0 });
}

#[test]
fn continuation_predicate_nests_right_to_left() {
    let key = key(&[("name", -1)], false);
    let predicate = continuation_predicate(&key, &[Value::from("m"), Value::from("id9")])
        .expect("arity matches");

    let name = key.fields()[0].path.clone();
    let id = key.fields()[1].path.clone();
    assert_eq!(
        predicate,
        Predicate::Or(vec![
            Predicate::compare(name.clone(), CompareOp::Lt, Value::from("m")),
            Predicate::And(vec![
                Predicate::compare(name, CompareOp::Eq, Value::from("m")),
                Predicate::compare(id, CompareOp::Gt, Value::from("id9")),
            ]),
        ])
    );
}

fn name_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        (0i64..5).prop_map(Value::Int),
        "[a-c]{0,2}".prop_map(Value::Text),
        (0i64..3).prop_map(|ms| Value::Timestamp(Timestamp::from_millis(ms))),
    ]
}

proptest! {
    #[test]
    fn cursor_selects_exactly_the_rows_after_the_boundary(
        names in prop::collection::vec(name_value(), 1..24),
        pick in any::<prop::sample::Index>(),
        descending in any::<bool>(),
        reverse in any::<bool>(),
    ) {
        let key = key(&[("name", if descending { -1 } else { 1 })], reverse);
        let mut rows: Vec<Document> = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| row(name, &format!("id{idx:03}")))
            .collect();
        rows.sort_by(|a, b| key.compare_documents(a, b));

        let boundary = pick.index(rows.len());
        let token = encode_cursor(&rows[boundary], &key).expect("scalar rows encode");
        let predicate = decode_cursor(&token, &key).expect("own cursor decodes");

        for (idx, candidate) in rows.iter().enumerate() {
            prop_assert_eq!(predicate.matches(candidate), idx > boundary, "row {}", idx);
        }
    }
}
