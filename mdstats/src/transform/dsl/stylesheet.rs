//! Stylesheet definition
//!
//! A stylesheet is an ordered list of rules. Each rule matches nodes with a
//! path expression and applies a chain of operations to every match.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::executor::CompiledStylesheet;
use super::operations::Operation;
use crate::error::StylesheetError;
use crate::tree::Namespaces;

/// A complete stylesheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stylesheet {
    /// Version of the stylesheet format
    #[serde(default = "default_version")]
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Prefix bindings layered over the stage vocabulary
    #[serde(default, skip_serializing_if = "Namespaces::is_empty")]
    pub namespaces: Namespaces,

    /// Rules, applied in order to the accumulating tree
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// One match-and-rewrite rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Path expression selecting the nodes to rewrite
    #[serde(rename = "match")]
    pub path: String,

    /// Fail the application when nothing matches
    #[serde(default)]
    pub required: bool,

    /// Failure text for a required rule without matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Ordered list of operations to apply to each match
    #[serde(default)]
    pub operations: Vec<Operation>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Stylesheet {
    /// Create an empty stylesheet
    pub fn new() -> Self {
        Self {
            version: default_version(),
            description: String::new(),
            namespaces: Namespaces::new(),
            rules: Vec::new(),
        }
    }

    /// Parse a stylesheet from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Read and parse a stylesheet file
    pub fn load(path: &Path) -> Result<Self, StylesheetError> {
        let json = std::fs::read_to_string(path).map_err(|source| StylesheetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_json(&json)?)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_namespace(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.insert(prefix, uri);
        self
    }

    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Compile against a stage vocabulary.
    ///
    /// The stylesheet's own namespaces take precedence over the vocabulary.
    pub fn compile(&self, vocabulary: &Namespaces) -> Result<CompiledStylesheet, StylesheetError> {
        CompiledStylesheet::compile(self, vocabulary)
    }
}

impl Default for Stylesheet {
    fn default() -> Self {
        Self::new()
    }
}

impl Rule {
    /// Create a rule for a path expression
    pub fn matching(path: &str) -> Self {
        Self {
            path: path.to_string(),
            required: false,
            message: None,
            operations: Vec::new(),
        }
    }

    /// Add an operation to the chain
    pub fn with_operation(mut self, op: Operation) -> Self {
        self.operations.push(op);
        self
    }

    /// Mark as required, with an optional failure message
    pub fn required(mut self, message: Option<&str>) -> Self {
        self.required = true;
        self.message = message.map(String::from);
        self
    }
}

/// Example cross-walk of legal constraints from ISO 19139 to ISO 19115-3
pub fn example_stylesheet() -> Stylesheet {
    Stylesheet::new()
        .with_description("Cross-walk gmd legal constraints to ISO 19115-3")
        .with_namespace("mri", "http://standards.iso.org/iso/19115/-3/mri/1.0")
        .with_namespace("mco", "http://standards.iso.org/iso/19115/-3/mco/1.0")
        .with_namespace("gco3", "http://standards.iso.org/iso/19115/-3/gco/1.0")
        .with_rule(
            Rule::matching("//gmd:resourceConstraints").with_operation(Operation::Rename {
                name: "mri:resourceConstraints".to_string(),
            }),
        )
        .with_rule(Rule::matching("//gmd:*").with_operation(Operation::RemapNamespace {
            from: "gmd".to_string(),
            to: "mco".to_string(),
        }))
        .with_rule(Rule::matching("//gco:*").with_operation(Operation::RemapNamespace {
            from: "gco".to_string(),
            to: "gco3".to_string(),
        }))
        .with_rule(
            Rule::matching("//gco3:CharacterString")
                .with_operation(Operation::NormalizeSpace),
        )
        .with_rule(
            Rule::matching("//mco:MD_LegalConstraints")
                .required(Some("no legal constraints to convert")),
        )
}
