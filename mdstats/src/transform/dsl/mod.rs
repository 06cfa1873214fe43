//! Stylesheet DSL for tree-to-tree transforms
//!
//! This module provides:
//! - `stylesheet`: Stylesheet definition (JSON rules)
//! - `operations`: Available tree operations
//! - `executor`: Compile stylesheets and apply them to trees
//!
//! ## Usage Flow
//!
//! ```text
//! JSON file → Stylesheet::load → compile(vocabulary) → CompiledStylesheet::apply(tree)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use mdstats::transform::dsl::Stylesheet;
//! use mdstats::tree::Namespaces;
//!
//! let stylesheet = Stylesheet::from_json(r#"{
//!     "rules": [
//!         {"match": "//gco:CharacterString", "operations": [{"type": "normalize_space"}]}
//!     ]
//! }"#)?;
//! let compiled = stylesheet.compile(&Namespaces::iso19139())?;
//! let normalized = compiled.apply(&tree)?;
//! ```

pub mod executor;
pub mod operations;
pub mod stylesheet;

// Re-exports for convenience
pub use executor::CompiledStylesheet;
pub use operations::{operations_description, Operation};
pub use stylesheet::{example_stylesheet, Rule, Stylesheet};
