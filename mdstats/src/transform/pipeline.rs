//! High-level pipeline API for corpus pattern mining.
//!
//! This module wires all steps together: parsing, extraction, masking,
//! normalization, grouping and the per-group stylesheet stages.
//!
//! # Example
//!
//! ```rust,ignore
//! use mdstats::transform::pipeline::{run_corpus, PipelineConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let table = run_corpus(Path::new("harvest/"), &PipelineConfig::default())?;
//!     println!("{} patterns over {} records", table.pattern_count(), table.record_count);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::grouper::{aggregate, Downstream, Processed};
use super::mask::Masker;
use super::select::Selector;
use super::stage::{Stage, StageKind};
use crate::corpus::{Corpus, DOCUMENT_PATH};
use crate::error::{ConfigError, PipelineError};
use crate::logs::{log_error, log_info, log_success};
use crate::models::{Record, Table};
use crate::parser::parse_document;
use crate::tree::{Namespaces, Tree};

/// Extract path of the default legal-constraints audit
pub const DEFAULT_EXTRACT: &str = "//gmd:resourceConstraints[gmd:MD_LegalConstraints]";

/// Mask paths of the default legal-constraints audit
pub const DEFAULT_MASKS: &[&str] = &[
    "//gco:CharacterString",
    "//@codeList",
    r#"//*[@gco:nilReason="missing"]"#,
];

// =============================================================================
// Configuration
// =============================================================================

/// Options for a pipeline run.
///
/// Blank or absent paths disable the step they drive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Primary extraction path, in the source vocabulary
    pub extract: Option<String>,

    /// Mask paths, in the source vocabulary
    pub mask: Vec<String>,

    /// Extraction applied to the converted tree, in the target vocabulary
    pub secondary_extract: Option<String>,

    /// Per-record stylesheet applied to extract and pattern
    pub normalize: Option<PathBuf>,

    /// Per-group stylesheet applied to the representative extract
    pub transform: Option<PathBuf>,

    /// Per-group stylesheet applied to the transform output
    pub convert: Option<PathBuf>,

    pub source_namespaces: Namespaces,
    pub target_namespaces: Namespaces,

    /// Document location inside each corpus entry
    pub document_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extract: Some(DEFAULT_EXTRACT.to_string()),
            mask: DEFAULT_MASKS.iter().map(|m| m.to_string()).collect(),
            secondary_extract: None,
            normalize: None,
            transform: None,
            convert: None,
            source_namespaces: Namespaces::iso19139(),
            target_namespaces: Namespaces::iso19115_3(),
            document_path: PathBuf::from(DOCUMENT_PATH),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON; missing fields keep their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a configuration file.
    ///
    /// Relative stylesheet paths are taken from the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&content)?;
        Ok(match path.parent() {
            Some(base) => config.with_stylesheet_base(base),
            None => config,
        })
    }

    /// Join relative stylesheet paths onto `base`
    pub fn with_stylesheet_base(mut self, base: &Path) -> Self {
        for stylesheet in [&mut self.normalize, &mut self.transform, &mut self.convert]
            .into_iter()
            .flatten()
        {
            if stylesheet.is_relative() {
                *stylesheet = base.join(&*stylesheet);
            }
        }
        self
    }

    /// Set the mask paths from a newline-separated block
    pub fn with_mask_text(mut self, text: &str) -> Self {
        self.mask = mask_lines(text);
        self
    }
}

/// Split a newline-separated block of paths, dropping blank lines
pub fn mask_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

// =============================================================================
// Pipeline
// =============================================================================

/// A validated pipeline: every path and stylesheet is compiled.
#[derive(Debug)]
pub struct Pipeline {
    extract: Selector,
    masker: Masker,
    normalize: Stage,
    transform: Stage,
    convert: Stage,
    secondary: Selector,
}

impl Pipeline {
    /// Compile every path and load every stylesheet of `config`.
    pub fn build(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let source = &config.source_namespaces;
        let target = &config.target_namespaces;

        let extract = Selector::compile(config.extract.as_deref(), source)
            .map_err(|source| ConfigError::Path { field: "extract", source })?;
        let masker = Masker::compile(&config.mask, source)
            .map_err(|source| ConfigError::Path { field: "mask", source })?;
        let secondary = Selector::compile(config.secondary_extract.as_deref(), target)
            .map_err(|source| ConfigError::Path {
                field: "secondary_extract",
                source,
            })?;

        let normalize = Stage::load(StageKind::Normalize, config.normalize.as_deref(), source)?;
        let transform = Stage::load(StageKind::Transform, config.transform.as_deref(), source)?;
        // Convert input still carries source names; its output uses the target ones
        let convert = Stage::load(
            StageKind::Convert,
            config.convert.as_deref(),
            &target.merged(source),
        )?;

        if !masker.is_enabled() {
            log_info("No mask paths, patterns equal extracts");
        }

        Ok(Self {
            extract,
            masker,
            normalize,
            transform,
            convert,
            secondary,
        })
    }

    pub fn normalize(&self) -> &Stage {
        &self.normalize
    }

    pub fn transform(&self) -> &Stage {
        &self.transform
    }

    pub fn convert(&self) -> &Stage {
        &self.convert
    }

    /// Parse, extract, mask and normalize one record.
    pub fn process_record(&self, record: &Record) -> Processed {
        let document = match parse_document(&record.raw_document) {
            Ok(root) => Tree::Element(root),
            Err(e) => {
                log_error(format!("{}: {}", record.id, e));
                Tree::failed(format!("parse error: {}", e))
            }
        };
        let extract = self.extract.apply(&document);
        let pattern = self.masker.apply(&extract);

        Processed {
            id: record.id.clone(),
            pattern: self.normalize.apply(&pattern),
            normalized_extract: self.normalize.apply(&extract),
            extract,
        }
    }

    /// Run the whole chain over `records` and return the ranked table.
    pub fn run<I>(&self, records: I) -> Table
    where
        I: IntoIterator<Item = Record>,
    {
        let processed: Vec<Processed> = records
            .into_iter()
            .map(|record| self.process_record(&record))
            .collect();

        let downstream = Downstream {
            transform: &self.transform,
            convert: &self.convert,
            secondary: &self.secondary,
        };
        let table = aggregate(processed, &downstream);

        log_success(format!("Parsed {} records", table.record_count));
        table
    }
}

/// Open a corpus directory, build the pipeline and run it.
///
/// The corpus root, every path and every stylesheet are validated before
/// the first record is read.
pub fn run_corpus(root: &Path, config: &PipelineConfig) -> Result<Table, PipelineError> {
    let corpus = Corpus::open(root)?.with_document_path(&config.document_path);
    let pipeline = Pipeline::build(config)?;
    let records = corpus.records()?;
    log_info(format!("Processing {} records from {}", records.len(), root.display()));
    Ok(pipeline.run(records))
}
