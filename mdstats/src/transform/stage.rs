//! Optional stylesheet-driven stages.
//!
//! A stage compiles its stylesheet once and applies it many times. Failures
//! while applying never escape: they turn the tree into [`Tree::Failed`].

use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::dsl::{CompiledStylesheet, Stylesheet};
use crate::error::ConfigError;
use crate::logs::{log_info_indent, log_warning};
use crate::tree::{Namespaces, Tree};

/// Position of a stage in the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Per record, on both extract and pattern
    Normalize,
    /// Per group, on the representative extract
    Transform,
    /// Per group, on the transform output
    Convert,
}

impl StageKind {
    pub fn name(self) -> &'static str {
        match self {
            StageKind::Normalize => "normalize",
            StageKind::Transform => "transform",
            StageKind::Convert => "convert",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A compiled stage; disabled stages are the identity.
#[derive(Debug)]
pub struct Stage {
    kind: StageKind,
    stylesheet: Option<CompiledStylesheet>,
    applications: AtomicUsize,
}

impl Stage {
    pub fn disabled(kind: StageKind) -> Self {
        Self {
            kind,
            stylesheet: None,
            applications: AtomicUsize::new(0),
        }
    }

    pub fn new(kind: StageKind, stylesheet: CompiledStylesheet) -> Self {
        Self {
            kind,
            stylesheet: Some(stylesheet),
            applications: AtomicUsize::new(0),
        }
    }

    /// Load and compile the stylesheet at `path`.
    ///
    /// No path disables the stage. A path that does not exist disables it
    /// with a warning. A file that exists but cannot be read or compiled is
    /// a configuration error.
    pub fn load(kind: StageKind, path: Option<&Path>, vocabulary: &Namespaces) -> Result<Self, ConfigError> {
        let Some(path) = path.filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(Self::disabled(kind));
        };

        if !path.exists() {
            log_warning(format!(
                "{} stylesheet {} not found, stage disabled",
                kind,
                path.display()
            ));
            return Ok(Self::disabled(kind));
        }

        let compiled = Stylesheet::load(path)
            .and_then(|s| s.compile(vocabulary))
            .map_err(|source| ConfigError::Stylesheet {
                stage: kind.name(),
                source,
            })?;

        log_info_indent(
            format!(
                "{} stage enabled: {} ({} rules)",
                kind,
                path.display(),
                compiled.rule_count()
            ),
            1,
        );
        Ok(Self::new(kind, compiled))
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn is_enabled(&self) -> bool {
        self.stylesheet.is_some()
    }

    /// How many trees the stylesheet has been applied to
    pub fn applications(&self) -> usize {
        self.applications.load(Ordering::Relaxed)
    }

    pub fn apply(&self, tree: &Tree) -> Tree {
        let Some(stylesheet) = &self.stylesheet else {
            return tree.clone();
        };
        tree.and_then(|root| {
            self.applications.fetch_add(1, Ordering::Relaxed);
            match stylesheet.apply(root) {
                Ok(out) => Tree::Element(out),
                Err(e) => Tree::failed(e.to_string()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StylesheetError;
    use crate::parser::parse_str;
    use std::io::Write;

    fn stage(json: &str) -> Stage {
        let compiled = Stylesheet::from_json(json)
            .unwrap()
            .compile(&Namespaces::iso19139())
            .unwrap();
        Stage::new(StageKind::Transform, compiled)
    }

    #[test]
    fn test_disabled_stage_is_identity() {
        let stage = Stage::disabled(StageKind::Normalize);
        let tree = Tree::from(parse_str("<a/>").unwrap());
        assert_eq!(stage.apply(&tree), tree);
        assert_eq!(stage.applications(), 0);
    }

    #[test]
    fn test_failure_is_contained() {
        let stage = stage(r#"{"rules": [{"match": "//b", "operations": [{"type": "fail", "message": "no b allowed"}]}]}"#);
        let out = stage.apply(&Tree::from(parse_str("<a><b/></a>").unwrap()));
        assert_eq!(out, Tree::failed("no b allowed"));
        assert_eq!(stage.applications(), 1);
    }

    #[test]
    fn test_failed_input_is_not_applied() {
        let stage = stage(r#"{"rules": [{"match": "//b", "operations": [{"type": "remove"}]}]}"#);
        let out = stage.apply(&Tree::failed("parse error: x"));
        assert_eq!(out.failure(), Some("parse error: x"));
        assert_eq!(stage.applications(), 0);
    }

    #[test]
    fn test_load_missing_file_disables() {
        let stage = Stage::load(
            StageKind::Convert,
            Some(Path::new("/nonexistent/convert.json")),
            &Namespaces::iso19139(),
        )
        .unwrap();
        assert!(!stage.is_enabled());
        assert!(!Stage::load(StageKind::Convert, None, &Namespaces::new()).unwrap().is_enabled());
    }

    #[test]
    fn test_load_invalid_file_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = Stage::load(StageKind::Transform, Some(file.path()), &Namespaces::iso19139()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Stylesheet {
                stage: "transform",
                source: StylesheetError::Json(_)
            }
        ));
    }

    #[test]
    fn test_load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"rules": [{{"match": "//gco:CharacterString", "operations": [{{"type": "trim"}}]}}]}}"#
        )
        .unwrap();
        let stage = Stage::load(StageKind::Normalize, Some(file.path()), &Namespaces::iso19139()).unwrap();
        assert!(stage.is_enabled());
        assert_eq!(stage.kind(), StageKind::Normalize);
    }
}
