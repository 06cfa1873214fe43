//! Error types for the mdstats pattern pipeline.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`PathError`] - Path expression compilation and evaluation errors
//! - [`StylesheetError`] - Stylesheet loading and compilation errors
//! - [`ConfigError`] - Everything that is fatal before the first record is read
//! - [`DocumentError`] - Per-record decoding and XML parsing errors
//! - [`ApplyError`] - Stage application failures (contained, never fatal)
//! - [`CorpusError`] - Record enumeration errors
//! - [`ExportError`] - Flat file export errors
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Path Expression Errors
// =============================================================================

/// Errors raised while compiling or evaluating a path expression.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PathError {
    /// The expression is blank where one is required.
    #[error("Empty path expression")]
    Empty,

    /// Rejected by the XPath compiler: syntax, an unbound prefix or an
    /// unknown function.
    #[error("Invalid path expression '{expr}': {message}")]
    Invalid { expr: String, message: String },

    /// The expression evaluates to a string, number or boolean.
    #[error("Path expression '{0}' does not select nodes")]
    NotANodeSet(String),

    /// A dynamic error while evaluating against a document.
    #[error("Failed to evaluate '{expr}': {message}")]
    Evaluation { expr: String, message: String },
}

// =============================================================================
// Stylesheet Errors
// =============================================================================

/// Errors raised while loading or compiling a stylesheet.
#[derive(Debug, Error)]
pub enum StylesheetError {
    /// Failed to read the stylesheet file.
    #[error("Failed to read stylesheet {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON.
    #[error("Invalid stylesheet JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A rule's match expression does not compile.
    #[error("Rule {rule}: {source}")]
    Path {
        rule: usize,
        #[source]
        source: PathError,
    },

    /// A `prefix:local` name uses a prefix the stylesheet does not declare.
    #[error("Rule {rule}: undefined namespace prefix in name '{name}'")]
    UndefinedPrefix { rule: usize, name: String },

    /// A `replace` pattern is not a valid regex.
    #[error("Rule {rule}: invalid regex '{pattern}': {message}")]
    Regex {
        rule: usize,
        pattern: String,
        message: String,
    },

    /// Structurally invalid rule.
    #[error("Rule {rule}: {message}")]
    InvalidRule { rule: usize, message: String },
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Fatal configuration errors, raised before any record is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The corpus root is missing or not a directory.
    #[error("Invalid corpus path: '{}'", .0.display())]
    InvalidCorpus(PathBuf),

    /// A path expression in the configuration does not compile.
    #[error("Invalid {field} expression: {source}")]
    Path {
        field: &'static str,
        #[source]
        source: PathError,
    },

    /// A stylesheet exists but cannot be loaded.
    #[error("Invalid {stage} stylesheet: {source}")]
    Stylesheet {
        stage: &'static str,
        #[source]
        source: StylesheetError,
    },

    /// The configuration file cannot be read.
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON.
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Document Errors
// =============================================================================

/// Errors while turning raw document bytes into a tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DocumentError {
    /// The XML reader rejected the document.
    #[error("XML error {0}")]
    Xml(String),

    /// An element or attribute uses an undeclared prefix.
    #[error("Undeclared namespace prefix '{0}'")]
    UnknownPrefix(String),

    /// Tags do not balance.
    #[error("Malformed document: {0}")]
    Malformed(String),

    /// No root element.
    #[error("Document has no root element")]
    Empty,
}

// =============================================================================
// Stage Application Errors
// =============================================================================

/// A stylesheet could not be applied to a tree.
///
/// These never abort a run: the stage turns them into a failed tree.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApplyError {
    /// Raised by a `fail` operation.
    #[error("{0}")]
    Failed(String),

    /// A `required` rule matched nothing.
    #[error("{message}")]
    RequiredMatch { path: String, message: String },

    /// The operation cannot apply to the matched node kind.
    #[error("operation '{operation}' cannot apply to {node}")]
    Unsupported {
        operation: &'static str,
        node: &'static str,
    },

    /// The operation would detach or replace the root element.
    #[error("operation '{0}' cannot apply to the root element")]
    Root(&'static str),

    /// A rule's path could not be evaluated.
    #[error(transparent)]
    Path(#[from] PathError),
}

// =============================================================================
// Corpus Errors
// =============================================================================

/// Errors while enumerating a corpus directory.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Failed to list or read from the corpus.
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while writing a flat export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown column name.
    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::run_corpus`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Corpus enumeration error.
    #[error("Corpus error: {0}")]
    Corpus(#[from] CorpusError),

    /// Export error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Document error outside a pipeline run (debug commands).
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for path compilation.
pub type PathResult<T> = Result<T, PathError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
