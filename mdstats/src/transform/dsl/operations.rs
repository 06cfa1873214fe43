//! Stylesheet operations.
//!
//! Operations are applied to the nodes a rule matches. Structural operations
//! act on elements; text operations act on attribute values, text nodes, or
//! the direct text children of an element.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// All available tree operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Detach the node
    Remove,

    /// Rename an element or attribute to `prefix:local`
    Rename { name: String },

    /// Set an attribute on an element
    SetAttribute { name: String, value: String },

    /// Remove an attribute from an element if present
    RemoveAttribute { name: String },

    /// Order attributes by namespace, then local name
    SortAttributes,

    /// Order child elements by namespace, then local name
    SortChildren,

    /// Drop whitespace-only text in the whole subtree
    StripWhitespace,

    /// Remove leading and trailing whitespace
    Trim,

    /// Collapse runs of whitespace to one space and trim
    NormalizeSpace,

    /// Convert to uppercase
    Uppercase,

    /// Convert to lowercase
    Lowercase,

    /// Replace using regex pattern
    Replace {
        pattern: String,
        #[serde(default)]
        value: String,
    },

    /// Map values using a lookup table
    Map {
        mapping: HashMap<String, String>,
        #[serde(default)]
        case_insensitive: bool,
        /// Value for unmapped input (null = keep the input)
        #[serde(default)]
        default_unmapped: Option<String>,
    },

    /// Replace the content with a single text value
    SetText { value: String },

    /// Replace an element by its children
    Unwrap,

    /// Wrap an element in a new element
    Wrap { name: String },

    /// Move names of the subtree from one namespace to another
    RemapNamespace { from: String, to: String },

    /// Fail the whole application with a message
    Fail { message: String },
}

impl Operation {
    /// The operation's `type` tag
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Remove => "remove",
            Operation::Rename { .. } => "rename",
            Operation::SetAttribute { .. } => "set_attribute",
            Operation::RemoveAttribute { .. } => "remove_attribute",
            Operation::SortAttributes => "sort_attributes",
            Operation::SortChildren => "sort_children",
            Operation::StripWhitespace => "strip_whitespace",
            Operation::Trim => "trim",
            Operation::NormalizeSpace => "normalize_space",
            Operation::Uppercase => "uppercase",
            Operation::Lowercase => "lowercase",
            Operation::Replace { .. } => "replace",
            Operation::Map { .. } => "map",
            Operation::SetText { .. } => "set_text",
            Operation::Unwrap => "unwrap",
            Operation::Wrap { .. } => "wrap",
            Operation::RemapNamespace { .. } => "remap_namespace",
            Operation::Fail { .. } => "fail",
        }
    }
}

pub(crate) fn normalize_space(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub(crate) fn map_value(
    value: &str,
    mapping: &HashMap<String, String>,
    case_insensitive: bool,
    default_unmapped: Option<&str>,
) -> String {
    let found = if case_insensitive {
        let key = value.to_lowercase();
        mapping.iter().find(|(k, _)| k.to_lowercase() == key)
    } else {
        mapping.get_key_value(value)
    };

    match (found, default_unmapped) {
        (Some((_, v)), _) => v.clone(),
        (None, Some(default)) => default.to_string(),
        (None, None) => value.to_string(),
    }
}

/// Get a description of all available operations
pub fn operations_description() -> String {
    r#"Available stylesheet operations:

| Operation | Applies to | Description | Parameters |
|-----------|------------|-------------|------------|
| remove | element, attribute, text | Detach the node | - |
| rename | element, attribute | Rename the node | name: prefix:local |
| set_attribute | element | Set an attribute | name: prefix:local, value |
| remove_attribute | element | Remove an attribute | name: prefix:local |
| sort_attributes | element | Order attributes by name | - |
| sort_children | element | Order child elements by name | - |
| strip_whitespace | element | Drop whitespace-only text in the subtree | - |
| trim | element, attribute, text | Remove leading/trailing whitespace | - |
| normalize_space | element, attribute, text | Collapse whitespace | - |
| uppercase | element, attribute, text | Convert to uppercase | - |
| lowercase | element, attribute, text | Convert to lowercase | - |
| replace | element, attribute, text | Regex replacement | pattern: regex, value: replacement |
| map | element, attribute, text | Lookup table | mapping: {source: target}, case_insensitive: bool, default_unmapped |
| set_text | element, attribute, text | Replace the content | value |
| unwrap | element | Replace an element by its children | - |
| wrap | element | Wrap in a new element | name: prefix:local |
| remap_namespace | element, attribute | Move names to another namespace | from, to: prefix or URI |
| fail | any | Fail the stage for this tree | message |

Text operations on an element rewrite its direct text children.

Example rule in JSON:
{
  "match": "//gmd:MD_LegalConstraints",
  "operations": [
    {"type": "remap_namespace", "from": "gmd", "to": "mco"},
    {"type": "sort_children"}
  ]
}"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_tagged() {
        let ops: Vec<Operation> = serde_json::from_str(
            r#"[
                {"type": "trim"},
                {"type": "rename", "name": "mco:MD_LegalConstraints"},
                {"type": "replace", "pattern": "\\s+"},
                {"type": "map", "mapping": {"license": "licence"}}
            ]"#,
        )
        .unwrap();
        assert_eq!(ops[0], Operation::Trim);
        assert_eq!(ops[1].name(), "rename");
        assert_eq!(
            ops[2],
            Operation::Replace {
                pattern: "\\s+".into(),
                value: String::new()
            }
        );
        assert!(matches!(&ops[3], Operation::Map { case_insensitive: false, default_unmapped: None, .. }));
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        assert!(serde_json::from_str::<Operation>(r#"{"type": "explode"}"#).is_err());
    }

    #[test]
    fn test_map() {
        let mut mapping = HashMap::new();
        mapping.insert("CC-BY".to_string(), "cc-by-4.0".to_string());

        assert_eq!(map_value("cc-by", &mapping, true, None), "cc-by-4.0");
        assert_eq!(map_value("cc-by", &mapping, false, None), "cc-by");
        assert_eq!(map_value("other", &mapping, false, Some("unknown")), "unknown");
    }

    #[test]
    fn test_normalize_space() {
        assert_eq!(normalize_space("  a \n\t b  "), "a b");
    }
}
