//! Applying patches to a JSON state tree.
//!
//! The inverse of [`super::diff`]: applying a move's patches (filtered to one
//! root) to the pre-move value of that root yields the post-move value.
//! Hosts use this to mirror server patches onto client replicas; tests use
//! it for the round-trip property.

use serde_json::Value;

use crate::error::EngineError;

use super::{Patch, PatchOp, PathSeg};

/// Apply one patch to the value of its root.
///
/// The patch's `root` tag is not checked here - the caller routes patches to
/// the right tree.
pub fn apply_patch(target: &mut Value, patch: &Patch) -> Result<(), EngineError> {
    let Some((last, parents)) = patch.path.split_last() else {
        // Empty path addresses the root value itself.
        match &patch.op {
            PatchOp::Set(v) => *target = v.clone(),
            PatchOp::Remove => *target = Value::Null,
        }
        return Ok(());
    };

    let mut node = target;
    for seg in parents {
        node = descend(node, seg)?;
    }

    match (last, &patch.op) {
        (PathSeg::Key(key), PatchOp::Set(v)) => {
            let obj = node
                .as_object_mut()
                .ok_or_else(|| mismatch(patch, "expected an object"))?;
            obj.insert(key.clone(), v.clone());
        }
        (PathSeg::Key(key), PatchOp::Remove) => {
            let obj = node
                .as_object_mut()
                .ok_or_else(|| mismatch(patch, "expected an object"))?;
            obj.remove(key)
                .ok_or_else(|| mismatch(patch, "no such key"))?;
        }
        (PathSeg::Index(i), PatchOp::Set(v)) => {
            let arr = node
                .as_array_mut()
                .ok_or_else(|| mismatch(patch, "expected an array"))?;
            if *i < arr.len() {
                arr[*i] = v.clone();
            } else if *i == arr.len() {
                arr.push(v.clone());
            } else {
                return Err(mismatch(patch, "index past end of array"));
            }
        }
        (PathSeg::Index(i), PatchOp::Remove) => {
            let arr = node
                .as_array_mut()
                .ok_or_else(|| mismatch(patch, "expected an array"))?;
            if *i >= arr.len() {
                return Err(mismatch(patch, "index past end of array"));
            }
            arr.remove(*i);
        }
    }

    Ok(())
}

/// Apply a sequence of patches in order.
pub fn apply_patches<'a>(
    target: &mut Value,
    patches: impl IntoIterator<Item = &'a Patch>,
) -> Result<(), EngineError> {
    for patch in patches {
        apply_patch(target, patch)?;
    }
    Ok(())
}

fn descend<'v>(node: &'v mut Value, seg: &PathSeg) -> Result<&'v mut Value, EngineError> {
    match seg {
        PathSeg::Key(key) => node
            .get_mut(key.as_str())
            .ok_or_else(|| EngineError::PatchMismatch(format!("missing key `{}`", key))),
        PathSeg::Index(i) => node
            .get_mut(*i)
            .ok_or_else(|| EngineError::PatchMismatch(format!("missing index {}", i))),
    }
}

fn mismatch(patch: &Patch, why: &str) -> EngineError {
    EngineError::PatchMismatch(format!("{} at `{}`", why, patch))
}
