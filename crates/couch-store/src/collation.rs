//! CouchDB view key ordering.
//!
//! Keys sort by type first (`null < false < true < numbers < strings <
//! arrays < objects`), then by value. Objects compare their members in
//! stored order. Strings are compared by code point; the server's ICU
//! collation is not reproduced.

use std::cmp::Ordering;

use serde_json::Value;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(false) => 1,
        Value::Bool(true) => 2,
        Value::Number(_) => 3,
        Value::String(_) => 4,
        Value::Array(_) => 5,
        Value::Object(_) => 6,
    }
}

/// Compares two view keys in CouchDB collation order.
pub fn collate(a: &Value, b: &Value) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (l, r) in x.iter().zip(y.iter()) {
                let ord = collate(l, r);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(x), Value::Object(y)) => {
            for ((lk, lv), (rk, rv)) in x.iter().zip(y.iter()) {
                let ord = lk.cmp(rk).then_with(|| collate(lv, rv));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => Ordering::Equal,
    }
}

/// Compares `(key, doc_id)` pairs: by key, then by document id.
pub fn collate_row(a: (&Value, Option<&str>), b: (&Value, Option<&str>)) -> Ordering {
    collate(a.0, b.0).then_with(|| a.1.cmp(&b.1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn types_sort_in_couchdb_order() {
        let ordered = [
            json!(null),
            json!(false),
            json!(true),
            json!(1),
            json!("a"),
            json!(["a"]),
            json!({"a": 1}),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(collate(&pair[0], &pair[1]), Ordering::Less, "{pair:?}");
        }
    }

    #[test]
    fn numbers_compare_numerically() {
        assert_eq!(collate(&json!(2), &json!(10)), Ordering::Less);
        assert_eq!(collate(&json!(1.5), &json!(1)), Ordering::Greater);
        assert_eq!(collate(&json!(3), &json!(3.0)), Ordering::Equal);
    }

    #[test]
    fn arrays_compare_element_wise_then_by_length() {
        assert_eq!(collate(&json!(["a", 2]), &json!(["a", 10])), Ordering::Less);
        assert_eq!(collate(&json!(["a"]), &json!(["a", 1])), Ordering::Less);
        assert_eq!(collate(&json!(["b"]), &json!(["a", 1])), Ordering::Greater);
    }

    #[test]
    fn objects_compare_members_in_stored_order() {
        assert_eq!(
            collate(&json!({"b": 1, "a": 1}), &json!({"a": 2, "b": 0})),
            Ordering::Greater
        );
        assert_eq!(collate(&json!({"a": 1}), &json!({"a": 1, "b": 0})), Ordering::Less);
    }

    #[test]
    fn rows_with_equal_keys_order_by_id() {
        let key = json!("Foo");
        assert_eq!(
            collate_row((&key, Some("0001")), (&key, Some("0002"))),
            Ordering::Less
        );
    }
}
