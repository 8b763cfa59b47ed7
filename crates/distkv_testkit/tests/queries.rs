//! Query evaluation against a populated store.

use distkv_core::query::{KEY_FIELD, VALUE_FIELD};
use distkv_core::{Entry, Query, TypedValue, KEY_COLUMN, VALUE_COLUMN};
use distkv_testkit::prelude::*;
use distkv_testkit::scenarios::{populated_store, user_json, user_key};

fn keys(rows: &[Entry]) -> Vec<String> {
    rows.iter().map(|e| e.key.clone()).collect()
}

#[test]
fn prefix_selection() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 30);
    store.put("other", 1i64).unwrap();
    assert_eq!(store.get_entries("user_").unwrap().len(), 30);
    assert_eq!(store.get_entries("user_01").unwrap().len(), 10);
    assert_eq!(store.get_entries("").unwrap().len(), 31);
}

#[test]
fn json_range_with_order_and_limit() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 60);
    // Ages cycle through 20..70.
    let mut query = Query::new();
    query
        .greater_than_or_equal_to("$.age", 65)
        .unwrap()
        .order_by_desc("$.age")
        .unwrap()
        .order_by_asc(KEY_FIELD)
        .unwrap()
        .limit(3, 1)
        .unwrap();
    let rows = store.get_entries(&query).unwrap();
    assert_eq!(keys(&rows), vec!["user_048", "user_047", "user_046"]);
    assert_eq!(store.get_result_size(&query).unwrap(), 3);
}

#[test]
fn or_and_groups() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 10);
    let mut query = Query::new();
    query
        .equal_to("$.name", "name_1")
        .unwrap()
        .or()
        .begin_group()
        .greater_than("$.id", 7)
        .unwrap()
        .and()
        .less_than("$.id", 9)
        .unwrap()
        .end_group();
    assert_eq!(
        keys(&store.get_entries(&query).unwrap()),
        vec!["user_001", "user_008"]
    );
}

#[test]
fn membership_and_like() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 15);
    let mut query = Query::new();
    query
        .in_number("$.id", vec![2.0, 4.0, 12.0])
        .unwrap()
        .unlike("$.name", "%_2")
        .unwrap();
    assert_eq!(keys(&store.get_entries(&query).unwrap()), vec!["user_004"]);

    let mut query = Query::new();
    query.in_string("$.name", ["name_3", "nobody"]).unwrap();
    assert_eq!(keys(&store.get_entries(&query).unwrap()), vec!["user_003"]);

    let mut query = Query::new();
    query.like(KEY_FIELD, "USER_00_").unwrap();
    assert_eq!(store.get_result_size(&query).unwrap(), 10);
}

#[test]
fn missing_fields_are_null() {
    with_temp_store(|store| {
        store.put("a", user_json(1, "a", 30)).unwrap();
        store.put("b", r#"{"id":2}"#).unwrap();
        store.put("c", 7i64).unwrap();

        let mut query = Query::new();
        query.is_null("$.age").unwrap();
        assert_eq!(keys(&store.get_entries(&query).unwrap()), vec!["b", "c"]);

        let mut query = Query::new();
        query.not_equal_to("$.age", 30).unwrap();
        assert!(store.get_entries(&query).unwrap().is_empty());
    });
}

#[test]
fn scalar_values_through_value_field() {
    with_temp_store(|store| {
        store
            .put_batch([
                ("a", TypedValue::Integer(5)),
                ("b", TypedValue::Double(2.5)),
                ("c", TypedValue::from("text")),
            ])
            .unwrap();
        let mut query = Query::new();
        query.greater_than(VALUE_FIELD, 2).unwrap().order_by_asc(VALUE_FIELD).unwrap();
        assert_eq!(keys(&store.get_entries(&query).unwrap()), vec!["b", "a"]);
    });
}

#[test]
fn in_keys_and_write_time() {
    with_temp_store(|store| {
        store.put("x", 1i64).unwrap();
        store.put("y", 2i64).unwrap();
        store.put("z", 3i64).unwrap();
        store.put("x", 4i64).unwrap();

        let mut query = Query::new();
        query
            .in_keys(["x", "z", "missing"])
            .unwrap()
            .order_by_write_time(false);
        assert_eq!(keys(&store.get_entries(&query).unwrap()), vec!["x", "z"]);
        assert!(query.in_keys(["y"]).is_err());
    });
}

#[test]
fn delete_by_query() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 20);
    let mut query = Query::new();
    query.less_than("$.id", 15).unwrap();
    store.delete(&query).unwrap();
    assert_eq!(store.get_entries("").unwrap().len(), 5);
    assert!(store.get(&user_key(14)).is_err());
    assert!(store.get(&user_key(15)).is_ok());
}

#[test]
fn result_set_walk() {
    let manager = TestManager::new();
    let store = populated_store(&manager, "users", 5);
    let mut query = Query::new();
    query.order_by_desc("$.id").unwrap();
    let mut rs = store.get_result_set(&query).unwrap();
    let mut seen = Vec::new();
    while rs.move_to_next().unwrap() {
        seen.push(rs.get_string(KEY_COLUMN).unwrap());
        assert!(rs.get_string(VALUE_COLUMN).unwrap().starts_with('{'));
    }
    assert_eq!(seen, vec!["user_004", "user_003", "user_002", "user_001", "user_000"]);
    assert!(rs.is_after_last().unwrap());
    store.close_result_set(&mut rs).unwrap();
}
