//! Path-based subtree extraction.

use crate::error::PathError;
use crate::tree::{Element, Namespaces, Node, NodeRef, Tree};
use crate::xpath::XPath;

/// Selects the nodes matching a path into a synthetic-rooted forest.
///
/// A selector without a path is the identity.
#[derive(Debug, Clone, Default)]
pub struct Selector {
    path: Option<XPath>,
    namespaces: Namespaces,
}

impl Selector {
    /// Compile a selector; a blank or absent expression disables it
    pub fn compile(expr: Option<&str>, namespaces: &Namespaces) -> Result<Self, PathError> {
        let path = match expr.map(str::trim) {
            Some(e) if !e.is_empty() => Some(XPath::compile(e, namespaces)?),
            _ => None,
        };
        Ok(Self {
            path,
            namespaces: namespaces.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn path(&self) -> Option<&XPath> {
        self.path.as_ref()
    }

    pub fn apply(&self, tree: &Tree) -> Tree {
        match &self.path {
            Some(path) => tree.and_then(|root| match select(root, path, &self.namespaces) {
                Ok(forest) => forest.into(),
                Err(e) => Tree::failed(e.to_string()),
            }),
            None => tree.clone(),
        }
    }
}

/// Copy every node `path` selects in `root` under a fresh synthetic root.
///
/// Elements and text become children in document order, attributes become
/// attributes of the synthetic root in match order (same-named matches are
/// all kept), and a match on the document copies the whole root element.
/// Prefixes are then rewritten to the vocabulary's preferred ones.
pub fn select(root: &Element, path: &XPath, namespaces: &Namespaces) -> Result<Element, PathError> {
    let mut forest = Element::synthetic_root();

    for handle in path.select(root)? {
        match root.resolve(&handle) {
            Some(NodeRef::Document(e)) | Some(NodeRef::Element(e)) => {
                forest.children.push(Node::Element(e.clone()));
            }
            Some(NodeRef::Text(t)) => forest.children.push(Node::Text(t.to_string())),
            Some(NodeRef::Attribute(a)) => forest.attributes.push(a.clone()),
            None => {}
        }
    }

    forest.adopt_prefixes(namespaces);
    Ok(forest)
}
