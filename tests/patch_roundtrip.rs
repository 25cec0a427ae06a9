//! Property test: diff/apply round-trips arbitrary JSON state trees.

use proptest::prelude::*;
use serde_json::Value;

use turnkit::patch::{apply_patches, diff_values, PatchRoot};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Applying a diff's patches to the pre-state reconstructs the
    /// post-state exactly, whatever the two shapes are.
    #[test]
    fn diff_apply_reconstructs_state(before in json_value(), after in json_value()) {
        let patches = diff_values(&PatchRoot::Board, &before, &after);

        let mut rebuilt = before;
        apply_patches(&mut rebuilt, &patches).unwrap();
        prop_assert_eq!(rebuilt, after);
    }

    /// Identical trees diff to nothing.
    #[test]
    fn identical_values_produce_no_patches(value in json_value()) {
        prop_assert!(diff_values(&PatchRoot::Board, &value, &value).is_empty());
    }

    /// Diffing is deterministic: same inputs, same patch list.
    #[test]
    fn diffing_is_deterministic(before in json_value(), after in json_value()) {
        let first = diff_values(&PatchRoot::Board, &before, &after);
        let second = diff_values(&PatchRoot::Board, &before, &after);
        prop_assert_eq!(first, second);
    }
}
