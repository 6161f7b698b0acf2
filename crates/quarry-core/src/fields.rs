use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One field definition inside an index mapping. Leaf fields carry a
/// type; container fields carry nested `properties`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<FieldTree>,
}

/// The field schema of one index: field name → definition, recursive
/// through `properties`.
pub type FieldTree = BTreeMap<String, FieldDef>;

/// Flatten a field tree into dotted paths.
///
/// Traversal is depth-first over the (sorted) field names, so the output
/// order is deterministic. Pure `object` containers contribute their
/// children but no entry of their own.
pub fn flatten_fields(tree: &FieldTree) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(tree, "", &mut out);
    out
}

fn flatten_into(tree: &FieldTree, prefix: &str, out: &mut BTreeMap<String, String>) {
    for (name, def) in tree {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}.{name}")
        };
        match def.field_type.as_deref() {
            Some("object") | None => {}
            Some(ty) => {
                out.insert(path.clone(), ty.to_string());
            }
        }
        if let Some(nested) = &def.properties {
            flatten_into(nested, &path, out);
        }
    }
}

/// Flatten and deduplicate fields across several indices.
///
/// When two indices define the same dotted path, the first definition
/// seen wins (indices are visited in sorted order).
pub fn merge_index_fields(mappings: &BTreeMap<String, FieldTree>) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for tree in mappings.values() {
        for (path, ty) in flatten_fields(tree) {
            merged.entry(path).or_insert(ty);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(json: serde_json::Value) -> FieldTree {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn flatten_leaf_fields() {
        let t = tree(serde_json::json!({
            "client_ip": {"type": "keyword"},
            "count": {"type": "long"}
        }));
        let flat = flatten_fields(&t);
        assert_eq!(flat.get("client_ip").map(String::as_str), Some("keyword"));
        assert_eq!(flat.get("count").map(String::as_str), Some("long"));
    }

    #[test]
    fn flatten_nested_properties_to_dotted_paths() {
        let t = tree(serde_json::json!({
            "geo": {
                "properties": {
                    "city": {"type": "keyword"},
                    "location": {"type": "geo_point"}
                }
            }
        }));
        let flat = flatten_fields(&t);
        assert_eq!(flat.get("geo.city").map(String::as_str), Some("keyword"));
        assert_eq!(
            flat.get("geo.location").map(String::as_str),
            Some("geo_point")
        );
        // the container itself has no type and no entry
        assert!(!flat.contains_key("geo"));
    }

    #[test]
    fn flatten_skips_explicit_object_containers() {
        let t = tree(serde_json::json!({
            "meta": {
                "type": "object",
                "properties": {"version": {"type": "integer"}}
            }
        }));
        let flat = flatten_fields(&t);
        assert!(!flat.contains_key("meta"));
        assert_eq!(flat.get("meta.version").map(String::as_str), Some("integer"));
    }

    #[test]
    fn merge_first_seen_definition_wins() {
        let mut mappings = BTreeMap::new();
        mappings.insert(
            "logs-a".to_string(),
            tree(serde_json::json!({"status": {"type": "keyword"}})),
        );
        mappings.insert(
            "logs-b".to_string(),
            tree(serde_json::json!({
                "status": {"type": "long"},
                "bytes": {"type": "long"}
            })),
        );
        let merged = merge_index_fields(&mappings);
        // logs-a sorts first, so its definition of `status` sticks
        assert_eq!(merged.get("status").map(String::as_str), Some("keyword"));
        assert_eq!(merged.get("bytes").map(String::as_str), Some("long"));
    }
}
