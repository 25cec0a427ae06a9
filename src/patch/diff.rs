//! Structural diffing of JSON state trees.
//!
//! Objects recurse per key (removed keys emit `Remove`, new keys emit `Set`);
//! arrays recurse over the common prefix, then emit appends for growth or
//! trailing removals (highest index first) for shrinkage; any other shape
//! change replaces the node wholesale. Identical subtrees emit nothing.
//!
//! Ordering is deterministic: `serde_json`'s map keeps keys sorted, and the
//! walk is depth-first in key/index order.

use serde::Serialize;
use serde_json::Value;
use smallvec::smallvec;

use crate::error::EngineError;

use super::{Patch, PatchOp, PatchPath, PatchRoot, PathSeg};

/// Diff two JSON values under the given root.
#[must_use]
pub fn diff_values(root: &PatchRoot, before: &Value, after: &Value) -> Vec<Patch> {
    let mut out = Vec::new();
    let mut path: PatchPath = smallvec![];
    diff_into(root, &mut path, before, after, &mut out);
    out
}

/// Serialize two typed states and diff them.
///
/// The `PartialEq` short-circuit belongs to the caller - this always pays
/// for serialization.
pub fn diff_typed<T: Serialize>(
    root: &PatchRoot,
    before: &T,
    after: &T,
) -> Result<Vec<Patch>, EngineError> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;
    Ok(diff_values(root, &before, &after))
}

fn diff_into(
    root: &PatchRoot,
    path: &mut PatchPath,
    before: &Value,
    after: &Value,
    out: &mut Vec<Patch>,
) {
    if before == after {
        return;
    }

    match (before, after) {
        (Value::Object(b), Value::Object(a)) => {
            for (key, before_val) in b {
                match a.get(key) {
                    Some(after_val) => {
                        path.push(PathSeg::Key(key.clone()));
                        diff_into(root, path, before_val, after_val, out);
                        path.pop();
                    }
                    None => {
                        let mut removed = path.clone();
                        removed.push(PathSeg::Key(key.clone()));
                        out.push(Patch::new(root.clone(), removed, PatchOp::Remove));
                    }
                }
            }
            for (key, after_val) in a {
                if !b.contains_key(key) {
                    let mut added = path.clone();
                    added.push(PathSeg::Key(key.clone()));
                    out.push(Patch::new(root.clone(), added, PatchOp::Set(after_val.clone())));
                }
            }
        }

        (Value::Array(b), Value::Array(a)) => {
            let common = b.len().min(a.len());
            for i in 0..common {
                path.push(PathSeg::Index(i));
                diff_into(root, path, &b[i], &a[i], out);
                path.pop();
            }
            // Growth: appended elements in ascending order so each Set lands
            // at the current end of the array.
            for (i, after_val) in a.iter().enumerate().skip(common) {
                let mut added = path.clone();
                added.push(PathSeg::Index(i));
                out.push(Patch::new(root.clone(), added, PatchOp::Set(after_val.clone())));
            }
            // Shrinkage: trailing removals, highest index first, so earlier
            // removals don't shift later ones.
            for i in (common..b.len()).rev() {
                let mut removed = path.clone();
                removed.push(PathSeg::Index(i));
                out.push(Patch::new(root.clone(), removed, PatchOp::Remove));
            }
        }

        _ => {
            out.push(Patch::new(
                root.clone(),
                path.clone(),
                PatchOp::Set(after.clone()),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diff(before: Value, after: Value) -> Vec<Patch> {
        diff_values(&PatchRoot::Board, &before, &after)
    }

    #[test]
    fn test_identical_values_no_patches() {
        let v = json!({"a": 1, "b": [1, 2, 3]});
        assert!(diff(v.clone(), v).is_empty());
    }

    #[test]
    fn test_scalar_change() {
        let patches = diff(json!({"score": 3}), json!({"score": 5}));

        assert_eq!(patches.len(), 1);
        assert_eq!(format!("{}", patches[0]), "board.score = 5");
    }

    #[test]
    fn test_nested_change_minimal_path() {
        let patches = diff(
            json!({"players": {"alice": {"life": 20, "mana": 2}}}),
            json!({"players": {"alice": {"life": 17, "mana": 2}}}),
        );

        assert_eq!(patches.len(), 1);
        assert_eq!(
            patches[0].path.as_slice(),
            &[
                PathSeg::Key("players".to_string()),
                PathSeg::Key("alice".to_string()),
                PathSeg::Key("life".to_string())
            ]
        );
        assert_eq!(patches[0].op, PatchOp::Set(json!(17)));
    }

    #[test]
    fn test_key_added_and_removed() {
        let patches = diff(json!({"a": 1, "b": 2}), json!({"b": 2, "c": 3}));

        assert_eq!(patches.len(), 2);
        assert!(patches.contains(&Patch::new(
            PatchRoot::Board,
            smallvec![PathSeg::Key("a".to_string())],
            PatchOp::Remove
        )));
        assert!(patches.contains(&Patch::new(
            PatchRoot::Board,
            smallvec![PathSeg::Key("c".to_string())],
            PatchOp::Set(json!(3))
        )));
    }

    #[test]
    fn test_array_element_change() {
        let patches = diff(json!([1, 2, 3]), json!([1, 9, 3]));

        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].path.as_slice(), &[PathSeg::Index(1)]);
        assert_eq!(patches[0].op, PatchOp::Set(json!(9)));
    }

    #[test]
    fn test_array_growth_appends_ascending() {
        let patches = diff(json!([1]), json!([1, 2, 3]));

        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].path.as_slice(), &[PathSeg::Index(1)]);
        assert_eq!(patches[1].path.as_slice(), &[PathSeg::Index(2)]);
    }

    #[test]
    fn test_array_shrinkage_removes_descending() {
        let patches = diff(json!([1, 2, 3]), json!([1]));

        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0].path.as_slice(), &[PathSeg::Index(2)]);
        assert_eq!(patches[0].op, PatchOp::Remove);
        assert_eq!(patches[1].path.as_slice(), &[PathSeg::Index(1)]);
    }

    #[test]
    fn test_type_change_replaces_node() {
        let patches = diff(json!({"v": [1, 2]}), json!({"v": {"x": 1}}));

        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].op, PatchOp::Set(json!({"x": 1})));
    }

    #[test]
    fn test_root_replacement() {
        let patches = diff(json!(1), json!({"a": 1}));

        assert_eq!(patches.len(), 1);
        assert!(patches[0].path.is_empty());
    }

    #[test]
    fn test_diff_typed() {
        #[derive(Serialize)]
        struct Board {
            total: i64,
            turn: u32,
        }

        let patches = diff_typed(
            &PatchRoot::Board,
            &Board { total: 10, turn: 1 },
            &Board { total: 14, turn: 2 },
        )
        .unwrap();

        assert_eq!(patches.len(), 2);
    }
}
