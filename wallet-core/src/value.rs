//! Deep-merge and structural equality over [`Value`].
//!
//! "Same-keyed objects recurse; all other types overwrite." `serde_json`'s
//! `PartialEq` already gives us structural equality for free, so the only
//! thing this module adds is the merge.

use serde_json::{Map, Value};

/// Deep-merge `patch` into `base`, mutating `base` in place.
///
/// Objects merge key-by-key, recursing into same-keyed sub-objects. Arrays
/// and scalars (and an object meeting a non-object) overwrite wholesale —
/// this cannot express field deletion, which is why [`WalletContainer`] also
/// offers `delete_field`.
///
/// [`WalletContainer`]: crate::container::WalletContainer
pub fn deep_merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) =>
            merge_maps(base_map, patch_map),
        (base, patch) => {
            *base = patch.clone();
        }
    }
}

fn merge_maps(base: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, patch_value) in patch {
        match base.get_mut(key) {
            Some(base_value) => deep_merge(base_value, patch_value),
            None => {
                base.insert(key.clone(), patch_value.clone());
            }
        }
    }
}

/// Remove the value addressed by `path` from `tree`.
///
/// `path`'s last segment is looked up as an object key at the parent node; a
/// missing path is a no-op. This is the explicit deletion operation that
/// `deep_merge` alone cannot express.
pub fn delete_path(tree: &mut Value, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };
    let mut node = tree;
    for segment in parents {
        match node {
            Value::Object(map) => match map.get_mut(*segment) {
                Some(next) => node = next,
                None => return,
            },
            _ => return,
        }
    }
    if let Value::Object(map) = node {
        map.remove(*last);
    }
}
