//! Transformation module.
//!
//! This module handles the record pipeline:
//! - Select / Mask: Path-based extraction and masking
//! - DSL: Stylesheet operations and executor
//! - Stage: Optional stylesheet stages with contained failure
//! - Grouper: Processed records to ranked pattern rows
//! - Pipeline: Main pattern mining pipeline

pub mod dsl;
pub mod grouper;
pub mod hasher;
pub mod mask;
pub mod pipeline;
pub mod select;
pub mod stage;

pub use grouper::{aggregate, Downstream, Processed};
pub use hasher::short_hash;
pub use mask::Masker;
pub use pipeline::*;
pub use select::Selector;
pub use stage::{Stage, StageKind};
