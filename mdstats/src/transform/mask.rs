//! Destructive masking of copied trees.

use crate::error::PathError;
use crate::tree::{Element, Namespaces, Tree};
use crate::xpath::XPath;

/// Removes every node matched by a list of paths from a copy of the tree.
#[derive(Debug, Clone, Default)]
pub struct Masker {
    paths: Vec<XPath>,
}

impl Masker {
    /// Compile mask expressions, ignoring blank ones
    pub fn compile<S: AsRef<str>>(exprs: &[S], namespaces: &Namespaces) -> Result<Self, PathError> {
        let paths = exprs
            .iter()
            .map(|e| e.as_ref().trim())
            .filter(|e| !e.is_empty())
            .map(|e| XPath::compile(e, namespaces))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { paths })
    }

    pub fn is_enabled(&self) -> bool {
        !self.paths.is_empty()
    }

    pub fn paths(&self) -> &[XPath] {
        &self.paths
    }

    pub fn apply(&self, tree: &Tree) -> Tree {
        if self.paths.is_empty() {
            return tree.clone();
        }
        tree.and_then(|root| match mask(root, &self.paths) {
            Ok(masked) => masked.into(),
            Err(e) => Tree::failed(e.to_string()),
        })
    }
}

/// Copy `root` and remove what each path matches, path by path.
///
/// Matches are detached in reverse document order so earlier handles stay
/// valid. The root element itself is never removed.
pub fn mask(root: &Element, paths: &[XPath]) -> Result<Element, PathError> {
    let mut masked = root.clone();
    for path in paths {
        for handle in path.select(&masked)?.iter().rev() {
            masked.detach(handle);
        }
    }
    Ok(masked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::render::canonical_text;
    use crate::transform::pipeline::DEFAULT_MASKS;
    use crate::tree::Node;

    const LEGAL: &str = r#"<gmd:MD_LegalConstraints xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
  <gmd:accessConstraints>
    <gmd:MD_RestrictionCode codeList="http://example.org/codes" codeListValue="license"/>
  </gmd:accessConstraints>
  <gmd:otherConstraints><gco:CharacterString>CC-BY 4.0</gco:CharacterString></gmd:otherConstraints>
  <gmd:useLimitation gco:nilReason="missing"><gco:CharacterString/></gmd:useLimitation>
</gmd:MD_LegalConstraints>"#;

    #[test]
    fn test_default_masks() {
        let masker = Masker::compile(DEFAULT_MASKS, &Namespaces::iso19139()).unwrap();
        let original = Tree::from(parse_str(LEGAL).unwrap());
        let masked = masker.apply(&original);

        assert_eq!(
            canonical_text(masked.as_element().unwrap()),
            "<gmd:MD_LegalConstraints>\n  <gmd:accessConstraints>\n    <gmd:MD_RestrictionCode codeListValue=\"license\"/>\n  </gmd:accessConstraints>\n  <gmd:otherConstraints/>\n</gmd:MD_LegalConstraints>"
        );
        // The input tree is left alone
        assert!(canonical_text(original.as_element().unwrap()).contains("CC-BY 4.0"));
    }

    #[test]
    fn test_strip_all_text() {
        let masker = Masker::compile(&["//text()"], &Namespaces::new()).unwrap();
        let root = parse_str("<Constraints><Text>CC-BY</Text></Constraints>").unwrap();
        let masked = mask(&root, masker.paths()).unwrap();
        assert_eq!(canonical_text(&masked), "<Constraints>\n  <Text/>\n</Constraints>");
    }

    #[test]
    fn test_root_is_never_removed() {
        let masker = Masker::compile(&["//*"], &Namespaces::new()).unwrap();
        let root = parse_str("<a><b/><c>x</c></a>").unwrap();
        let masked = mask(&root, masker.paths()).unwrap();
        assert_eq!(masked.name.local, "a");
        assert!(masked.children.is_empty());
    }

    #[test]
    fn test_nested_matches() {
        let root = parse_str("<a><b><b/></b>t<b/></a>").unwrap();
        let masked = mask(&root, &[XPath::compile("//b", &Namespaces::new()).unwrap()]).unwrap();
        assert_eq!(masked.children, vec![Node::Text("t".into())]);
    }

    #[test]
    fn test_no_paths_and_failures() {
        let masker = Masker::compile(&["", "  "], &Namespaces::new()).unwrap();
        assert!(!masker.is_enabled());
        let tree = Tree::from(parse_str("<a>x</a>").unwrap());
        assert_eq!(masker.apply(&tree), tree);

        let masker = Masker::compile(&["//a"], &Namespaces::new()).unwrap();
        assert_eq!(masker.apply(&Tree::failed("boom")), Tree::failed("boom"));
    }
}
