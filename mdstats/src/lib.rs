//! # mdstats - Structural pattern statistics for metadata corpora
//!
//! mdstats reads a corpus of ISO 19139 metadata records, extracts a target
//! clause from each, masks the record-specific content away and ranks the
//! remaining structures by frequency. Each pattern can be cross-walked
//! through stylesheet stages into ISO 19115-3.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Corpus    │────▶│   Parser    │────▶│  Transform  │────▶│    Table    │
//! │ (dir / XML) │     │  (auto-enc) │     │ (path + DSL)│     │  (ranked)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mdstats::{run_corpus, PipelineConfig};
//! use std::path::Path;
//!
//! fn main() {
//!     let table = run_corpus(Path::new("harvest/"), &PipelineConfig::default()).unwrap();
//!     println!("Found {} patterns", table.pattern_count());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Domain models (Record, Cell, Row, Table)
//! - [`tree`] - Namespaced element tree and vocabularies
//! - [`parser`] - XML parsing with encoding detection
//! - [`xpath`] - XPath over `xee-xpath`, mapped back to tree handles
//! - [`render`] - Canonical text rendering
//! - [`transform`] - Selection, masking, stylesheets, grouping and pipeline
//! - [`corpus`] - Corpus directory enumeration
//! - [`export`] - CSV export
//! - [`logs`] - Log broadcaster and run log

// Core modules
pub mod error;
pub mod logs;
pub mod models;
pub mod tree;

// Parsing
pub mod parser;
pub mod xpath;

// Rendering
pub mod render;

// Transformation
pub mod transform;

// Input / output
pub mod corpus;
pub mod export;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ApplyError, ConfigError, CorpusError, DocumentError, ExportError, PathError, PipelineError,
    StylesheetError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{Cell, Record, Row, Table};
pub use tree::{Element, Namespaces, QName, Tree};

// =============================================================================
// Re-exports - Parsing and rendering
// =============================================================================

pub use parser::{decode_document, detect_encoding, parse_document, parse_str};
pub use render::{canonical_text, render, to_xml, unescape_display};
pub use xpath::XPath;

// =============================================================================
// Re-exports - Stylesheet DSL
// =============================================================================

pub use transform::dsl::{
    example_stylesheet, operations_description, CompiledStylesheet, Operation, Rule, Stylesheet,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    mask_lines, run_corpus, Pipeline, PipelineConfig, DEFAULT_EXTRACT, DEFAULT_MASKS,
};
pub use transform::{Masker, Selector, Stage, StageKind};

// =============================================================================
// Re-exports - Corpus and export
// =============================================================================

pub use corpus::Corpus;
pub use export::{export_csv, write_csv, Column, ExportOptions};
