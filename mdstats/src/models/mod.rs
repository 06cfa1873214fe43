//! Domain models for the pattern mining pipeline.
//!
//! - [`Record`] - One metadata document of the corpus
//! - [`Cell`] - Rendered canonical text of a tree
//! - [`Row`] - One pattern group of the result table
//! - [`Table`] - The ranked result of a run

use serde::{Deserialize, Serialize};

// =============================================================================
// Records
// =============================================================================

/// A corpus record: an identifier and the raw bytes of its document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub raw_document: Vec<u8>,
}

impl Record {
    pub fn new(id: impl Into<String>, raw_document: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            raw_document: raw_document.into(),
        }
    }
}

// =============================================================================
// Rendered text
// =============================================================================

/// Canonical text of a tree.
///
/// `text` is escaped for display and doubles as the grouping key. `failed`
/// marks text that describes a failure instead of content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub text: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failed: bool,
}

impl Cell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: false,
        }
    }

    pub fn failed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            failed: true,
        }
    }
}

// =============================================================================
// Result table
// =============================================================================

/// One pattern group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Short hash of the pattern text
    pub pattern_id: String,
    /// Short hash of the extract text
    pub extract_id: String,
    /// Records sharing this pattern, across all extracts
    pub total: usize,
    /// Records in this group
    pub count: usize,
    pub pattern: Cell,
    pub extract: Cell,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Cell>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converted: Option<Cell>,
    /// Contributing record ids, in corpus order
    pub records: Vec<String>,
}

/// Ranked pattern groups of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub rows: Vec<Row>,
    /// Number of records processed
    pub record_count: usize,
    pub has_transform: bool,
    pub has_converted: bool,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of distinct patterns
    pub fn pattern_count(&self) -> usize {
        let mut ids: Vec<&str> = self.rows.iter().map(|r| r.pattern_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_serialization_omits_success_flag() {
        assert_eq!(serde_json::to_string(&Cell::text("a")).unwrap(), r#"{"text":"a"}"#);
        assert_eq!(
            serde_json::to_string(&Cell::failed("error: x")).unwrap(),
            r#"{"text":"error: x","failed":true}"#
        );
        let cell: Cell = serde_json::from_str(r#"{"text":"a"}"#).unwrap();
        assert!(!cell.failed);
    }

    #[test]
    fn test_pattern_count() {
        let row = |pattern_id: &str| Row {
            pattern_id: pattern_id.into(),
            extract_id: "e".into(),
            total: 1,
            count: 1,
            pattern: Cell::text(""),
            extract: Cell::text(""),
            transform: None,
            converted: None,
            records: vec![],
        };
        let table = Table {
            rows: vec![row("a"), row("b"), row("a")],
            record_count: 3,
            ..Table::default()
        };
        assert_eq!(table.pattern_count(), 2);
    }
}
