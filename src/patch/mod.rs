//! State patches: minimal structural diffs of the board roots.
//!
//! Handlers mutate a draft in place; the engine snapshots before, deep-diffs
//! after, and emits a patch list. The copy boundary is an explicit clone +
//! serialize - no proxy or freeze tricks. Each patch is tagged with the root
//! it belongs to so distribution code can redact secret and foreign-player
//! patches before routing.
//!
//! Applying a move's patch list to the pre-move state reconstructs the
//! post-move state exactly (see `tests/patch_roundtrip.rs`).

pub mod apply;
pub mod diff;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smallvec::SmallVec;

use crate::core::UserId;

pub use apply::{apply_patch, apply_patches};
pub use diff::{diff_typed, diff_values};

/// Which state root a patch touches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchRoot {
    /// The shared board.
    Board,
    /// One user's private board.
    Playerboard(UserId),
    /// The hidden board. Never distributed to any player.
    Secretboard,
}

/// One step into a JSON tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathSeg {
    /// Object member.
    Key(String),
    /// Array element.
    Index(usize),
}

/// Path from a root to the changed node.
/// SmallVec keeps the common shallow paths off the heap.
pub type PatchPath = SmallVec<[PathSeg; 4]>;

/// The change itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PatchOp {
    /// Set (insert or replace) the value at the path.
    Set(Value),
    /// Remove the object member or array element at the path.
    Remove,
}

/// A single minimal change to one state root.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Root this patch applies to.
    pub root: PatchRoot,

    /// Path from the root. Empty means the root value itself.
    pub path: PatchPath,

    /// The change.
    pub op: PatchOp,
}

impl Patch {
    /// Build a patch.
    #[must_use]
    pub fn new(root: PatchRoot, path: PatchPath, op: PatchOp) -> Self {
        Self { root, path, op }
    }
}

impl std::fmt::Display for Patch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            PatchRoot::Board => write!(f, "board")?,
            PatchRoot::Playerboard(user) => write!(f, "playerboards.{}", user)?,
            PatchRoot::Secretboard => write!(f, "secretboard")?,
        }
        for seg in &self.path {
            match seg {
                PathSeg::Key(k) => write!(f, ".{}", k)?,
                PathSeg::Index(i) => write!(f, "[{}]", i)?,
            }
        }
        match &self.op {
            PatchOp::Set(v) => write!(f, " = {}", v),
            PatchOp::Remove => write!(f, " (removed)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn test_patch_display() {
        let patch = Patch::new(
            PatchRoot::Board,
            smallvec![PathSeg::Key("cells".to_string()), PathSeg::Index(3)],
            PatchOp::Set(serde_json::json!(7)),
        );
        assert_eq!(format!("{}", patch), "board.cells[3] = 7");

        let patch = Patch::new(
            PatchRoot::Playerboard(UserId::new("alice")),
            smallvec![PathSeg::Key("hand".to_string())],
            PatchOp::Remove,
        );
        assert_eq!(format!("{}", patch), "playerboards.alice.hand (removed)");
    }

    #[test]
    fn test_patch_serde() {
        let patch = Patch::new(
            PatchRoot::Secretboard,
            smallvec![PathSeg::Key("deck".to_string()), PathSeg::Index(0)],
            PatchOp::Set(serde_json::json!("ace")),
        );

        let json = serde_json::to_string(&patch).unwrap();
        let back: Patch = serde_json::from_str(&json).unwrap();
        assert_eq!(patch, back);
    }
}
