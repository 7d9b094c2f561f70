//! Relationship merger
//!
//! Folds newly resolved ids into an owner's many-valued link field. The
//! result is always the union of what the owner already links and the new
//! ids: existing links are never dropped and nothing is duplicated.
//!
//! Pure; the caller persists the returned set.

use crate::model::{LinkSet, Record};

/// Merge `new_ids` into `owner.fields[field]`
///
/// If the owner has no value for `field` the result is exactly `new_ids`.
/// A scalar id and a list of ids are both accepted as the existing value.
pub fn merge_links(owner: &Record, new_ids: &LinkSet, field: &str) -> LinkSet {
    if !owner.has(field) {
        return new_ids.clone();
    }
    owner.links(field).union(new_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fields;
    use serde_json::json;

    fn owner(fields: serde_json::Value) -> Record {
        let fields: Fields = fields.as_object().cloned().unwrap_or_default();
        Record::new("recUser", fields)
    }

    fn ids(raw: &[&str]) -> LinkSet {
        raw.iter().copied().collect()
    }

    #[test]
    fn union_without_loss_or_duplicates() {
        let user = owner(json!({"songIds": ["1", "2"]}));
        let merged = merge_links(&user, &ids(&["2", "3"]), "songIds");
        assert_eq!(merged, ids(&["1", "2", "3"]));
    }

    #[test]
    fn missing_field_yields_new_ids() {
        let user = owner(json!({"username": "alice"}));
        assert_eq!(merge_links(&user, &ids(&["5"]), "songIds"), ids(&["5"]));
    }

    #[test]
    fn scalar_existing_value_is_normalized() {
        let user = owner(json!({"playlistIds": "p1"}));
        let merged = merge_links(&user, &ids(&["p2"]), "playlistIds");
        assert_eq!(merged, ids(&["p1", "p2"]));
    }

    #[test]
    fn merge_never_shrinks() {
        let user = owner(json!({"songIds": ["a", "b", "c"]}));
        let merged = merge_links(&user, &LinkSet::new(), "songIds");
        assert!(merged.is_superset(&user.links("songIds")));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn fields_are_independent() {
        let user = owner(json!({"songIds": ["s1"], "playlistIds": ["p1"]}));
        let songs = merge_links(&user, &ids(&["s2"]), "songIds");
        let playlists = merge_links(&user, &ids(&["p2"]), "playlistIds");
        assert!(!songs.contains(&"p1".into()));
        assert_eq!(playlists, ids(&["p1", "p2"]));
    }
}
