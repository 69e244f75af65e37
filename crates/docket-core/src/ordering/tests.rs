use super::*;

fn fields(pairs: &[(&str, i64)]) -> Vec<OrderField> {
    pairs
        .iter()
        .map(|(field, dir)| OrderField::parse(field, *dir).expect("valid order field"))
        .collect()
}

fn shape(key: &IndexKey) -> Vec<(String, i64)> {
    key.fields()
        .iter()
        .map(|f| (f.path.to_string(), f.direction.as_raw()))
        .collect()
}

#[test]
fn compile_appends_identifier_tie_breaker() {
    let key = compile(&fields(&[("name", 1), ("age", -1)]), false).expect("compiles");

    assert_eq!(
        shape(&key),
        vec![
            ("name".to_string(), 1),
            ("age".to_string(), -1),
            ("_id".to_string(), 1)
        ]
    );
}

#[test]
fn compile_reverse_inverts_every_direction() {
    let key = compile(&fields(&[("name", 1), ("age", -1)]), true).expect("compiles");

    assert_eq!(
        shape(&key),
        vec![
            ("name".to_string(), -1),
            ("age".to_string(), 1),
            ("_id".to_string(), -1)
        ]
    );
}

#[test]
fn compile_keeps_declared_identifier_position() {
    let key = compile(&fields(&[("id", -1), ("name", 1)]), false).expect("compiles");

    assert_eq!(
        shape(&key),
        vec![("_id".to_string(), -1), ("name".to_string(), 1)]
    );
}

#[test]
fn compile_translates_meta_and_nested_selectors() {
    let key = compile(&fields(&[("$createdAt", 1), ("/bar/_x", 1)]), false).expect("compiles");

    assert_eq!(
        shape(&key),
        vec![
            ("_createdAt".to_string(), 1),
            ("bar.%5Fx".to_string(), 1),
            ("_id".to_string(), 1)
        ]
    );
}

#[test]
fn invalid_directions_are_configuration_errors() {
    for raw in [0, 2, -2, 100] {
        let err = OrderField::parse("name", raw).expect_err("only 1 and -1 are valid");
        assert_eq!(
            err,
            OrderingError::InvalidDirection {
                field: "name".to_string(),
                raw
            }
        );
    }
}

#[test]
fn duplicate_storage_fields_are_rejected() {
    let err = compile(&fields(&[("id", 1), ("$id", -1)]), false).expect_err("same storage path");
    assert_eq!(
        err,
        OrderingError::DuplicateField {
            path: "_id".to_string()
        }
    );
}

#[test]
fn suggested_names_list_selectors_with_direction_markers() {
    let name = suggested_index_name(&fields(&[("name", 1), ("age", -1), ("id", 1)]));
    assert_eq!(name, "Order [name+,age-,id+]");
}

#[test]
fn reverse_suffix_selects_backwards_traversal() {
    assert_eq!(parse_ordering_name("name"), ("name", false));
    assert_eq!(parse_ordering_name("name-reverse"), ("name", true));
}
