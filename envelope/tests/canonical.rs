//! Property tests for the canonical serializer (spec §8 property 3).

use proptest::prelude::*;
use sealed_store_envelope::canonical::canonical_bytes;
use serde_json::{json, Value};

fn shuffle_object(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            // serde_json::Map default storage is a BTreeMap, so simply
            // re-inserting in a different order and re-reading it back
            // exercises iteration order independence at the Rust layer.
            let mut shuffled = serde_json::Map::new();
            for (k, val) in map.iter().rev() {
                shuffled.insert(k.clone(), shuffle_object(val));
            }
            Value::Object(shuffled)
        }
        Value::Array(items) => Value::Array(items.iter().map(shuffle_object).collect()),
        other => other.clone(),
    }
}

#[test]
fn permuted_key_order_yields_identical_bytes() {
    let original = json!({
        "writer_id": "w1",
        "user_id": "u1",
        "type": "test_record",
        "plain": {"b": "2", "a": "1"},
    });
    let shuffled = shuffle_object(&original);
    assert_eq!(canonical_bytes(&original), canonical_bytes(&shuffled));
}

proptest! {
    #[test]
    fn distinct_scalar_values_give_distinct_bytes(a in "[a-zA-Z0-9]{1,12}", b in "[a-zA-Z0-9]{1,12}") {
        prop_assume!(a != b);
        let doc_a = json!({"k": a});
        let doc_b = json!({"k": b});
        prop_assert_ne!(canonical_bytes(&doc_a), canonical_bytes(&doc_b));
    }

    #[test]
    fn key_permutation_is_order_independent(
        a in "[a-z]{1,6}", b in "[a-z]{1,6}", c in "[a-z]{1,6}"
    ) {
        prop_assume!(a != b && b != c && a != c);
        let forward = json!({ (a.clone()): 1, (b.clone()): 2, (c.clone()): 3 });
        let backward = json!({ (c): 3, (b): 2, (a): 1 });
        prop_assert_eq!(canonical_bytes(&forward), canonical_bytes(&backward));
    }
}
