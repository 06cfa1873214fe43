//! Ordered XML tree model.
//!
//! Elements own their attributes and children outright, so a deep copy is a
//! plain `clone()`. Nodes are addressed by [`Handle`]s: child-index paths from
//! the root element, which is what path evaluation produces and what masking
//! and stylesheet operations consume.
//!
//! A processed record is a [`Tree`], which is either an element or a failure
//! message. Once a tree has failed it is carried unchanged through every
//! later stage.

use std::cmp::Ordering;
use std::fmt;

pub mod namespaces;

pub use namespaces::Namespaces;

/// Local name used when a synthetic root is written out as XML.
pub const SYNTHETIC_ROOT: &str = "root";

// =============================================================================
// Names
// =============================================================================

/// A namespace-qualified name.
///
/// Identity is `(namespace, local)`; `prefix` is only the preferred spelling.
#[derive(Debug, Clone, Eq)]
pub struct QName {
    pub namespace: Option<String>,
    pub prefix: Option<String>,
    pub local: String,
}

impl QName {
    /// A name in no namespace
    pub fn local(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local: local.into(),
        }
    }

    /// A namespaced name with an optional preferred prefix
    pub fn qualified(namespace: impl Into<String>, prefix: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            prefix: prefix.map(String::from),
            local: local.into(),
        }
    }

    /// Whether this name is `{namespace}local`
    pub fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local == local
    }

    fn sort_key(&self) -> (&str, &str) {
        (self.namespace.as_deref().unwrap_or(""), self.local.as_str())
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl std::hash::Hash for QName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => f.write_str(&self.local),
        }
    }
}

// =============================================================================
// Nodes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        }
    }

    /// Whether this is a text node containing only whitespace
    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub name: QName,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
    synthetic: bool,
}

impl Element {
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
            synthetic: false,
        }
    }

    /// The wrapper element that holds a forest of selected nodes.
    ///
    /// It renders as its content only; see [`crate::render`].
    pub fn synthetic_root() -> Self {
        Self {
            synthetic: true,
            ..Self::new(QName::local(SYNTHETIC_ROOT))
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }

    /// Builder: add an attribute
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Builder: add a child element
    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Builder: add a text child
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.push_text(text);
        self
    }

    /// Append text, merging with a trailing text node
    pub fn push_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        match self.children.last_mut() {
            Some(Node::Text(last)) => last.push_str(&text),
            _ => self.children.push(Node::Text(text)),
        }
    }

    pub fn attribute(&self, namespace: Option<&str>, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.is(namespace, local))
            .map(|a| a.value.as_str())
    }

    /// Set an attribute, replacing one with the same qualified name
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => self.attributes.push(Attribute { name, value }),
        }
    }

    pub fn remove_attribute(&mut self, name: &QName) -> Option<Attribute> {
        let index = self.attributes.iter().position(|a| &a.name == name)?;
        Some(self.attributes.remove(index))
    }

    /// Child elements, skipping text
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// Concatenated text of all descendants
    pub fn string_value(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Element(e) => e.collect_text(out),
                Node::Text(t) => out.push_str(t),
            }
        }
    }

    /// Whether the element has attributes or non-blank children
    pub fn has_content(&self) -> bool {
        !self.attributes.is_empty() || self.children.iter().any(|c| !c.is_blank_text())
    }

    /// Rewrite prefixes of every namespaced name to the table's preferred one.
    ///
    /// Namespace declarations are derived from usage when writing, so this is
    /// all the cleanup a selected forest needs.
    pub fn adopt_prefixes(&mut self, namespaces: &Namespaces) {
        adopt_prefix(&mut self.name, namespaces);
        for attr in &mut self.attributes {
            adopt_prefix(&mut attr.name, namespaces);
        }
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.adopt_prefixes(namespaces);
            }
        }
    }

    /// Remove whitespace-only text nodes from the whole subtree
    pub fn strip_blank_text(&mut self) {
        self.children.retain(|c| !c.is_blank_text());
        for child in &mut self.children {
            if let Node::Element(e) = child {
                e.strip_blank_text();
            }
        }
    }

    // -------------------------------------------------------------------------
    // Handle navigation
    // -------------------------------------------------------------------------

    /// Element at a child-index path (`[]` is `self`)
    pub fn element_at(&self, path: &[usize]) -> Option<&Element> {
        let mut current = self;
        for &index in path {
            current = current.children.get(index)?.as_element()?;
        }
        Some(current)
    }

    pub fn element_at_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let mut current = self;
        for &index in path {
            current = match current.children.get_mut(index)? {
                Node::Element(e) => e,
                Node::Text(_) => return None,
            };
        }
        Some(current)
    }

    /// Resolve a handle against this root element
    pub fn resolve(&self, handle: &Handle) -> Option<NodeRef<'_>> {
        match handle {
            Handle::Document => Some(NodeRef::Document(self)),
            Handle::Node(path) => match path.split_last() {
                None => Some(NodeRef::Element(self)),
                Some((last, parent)) => match self.element_at(parent)?.children.get(*last)? {
                    Node::Element(e) => Some(NodeRef::Element(e)),
                    Node::Text(t) => Some(NodeRef::Text(t)),
                },
            },
            Handle::Attribute(path, index) => self
                .element_at(path)?
                .attributes
                .get(*index)
                .map(NodeRef::Attribute),
        }
    }

    /// Detach the node a handle points at.
    ///
    /// Returns `None` for the document, the root element itself, or a
    /// dangling handle.
    pub fn detach(&mut self, handle: &Handle) -> Option<Detached> {
        match handle {
            Handle::Document => None,
            Handle::Node(path) => {
                let (last, parent) = path.split_last()?;
                let parent = self.element_at_mut(parent)?;
                if *last < parent.children.len() {
                    Some(Detached::Node(parent.children.remove(*last)))
                } else {
                    None
                }
            }
            Handle::Attribute(path, index) => {
                let owner = self.element_at_mut(path)?;
                if *index < owner.attributes.len() {
                    Some(Detached::Attribute(owner.attributes.remove(*index)))
                } else {
                    None
                }
            }
        }
    }
}

fn adopt_prefix(name: &mut QName, namespaces: &Namespaces) {
    if let Some(uri) = &name.namespace {
        if let Some(prefix) = namespaces.prefix_for(uri) {
            name.prefix = Some(prefix.to_string());
        }
    }
}

/// A node removed from a tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Detached {
    Node(Node),
    Attribute(Attribute),
}

// =============================================================================
// Handles
// =============================================================================

/// Address of a node inside a root element.
///
/// `Node(vec![])` is the root element; `Document` is the virtual parent of the
/// root that absolute paths start from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
    Document,
    Node(Vec<usize>),
    Attribute(Vec<usize>, usize),
}

impl Handle {
    pub fn root() -> Self {
        Handle::Node(Vec::new())
    }

    // Document first, then by path; an element's attributes sort after it
    // and before its children.
    fn order_key(&self) -> Option<(&[usize], usize)> {
        match self {
            Handle::Document => None,
            Handle::Node(path) => Some((path, 0)),
            Handle::Attribute(path, index) => Some((path, index + 1)),
        }
    }
}

impl PartialOrd for Handle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Handle {
    /// Document order
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

/// A borrowed view of the node behind a [`Handle`].
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Document(&'a Element),
    Element(&'a Element),
    Text(&'a str),
    Attribute(&'a Attribute),
}

// =============================================================================
// Processed trees
// =============================================================================

/// Result of carrying a record through the pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub enum Tree {
    Element(Element),
    /// Processing failed; the message is shown in place of content
    Failed(String),
}

impl Tree {
    pub fn failed(message: impl Into<String>) -> Self {
        Tree::Failed(message.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Tree::Element(e) => Some(e),
            Tree::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&str> {
        match self {
            Tree::Element(_) => None,
            Tree::Failed(message) => Some(message),
        }
    }

    /// Run `f` on the element; a failed tree is returned unchanged.
    pub fn and_then(&self, f: impl FnOnce(&Element) -> Tree) -> Tree {
        match self {
            Tree::Element(e) => f(e),
            Tree::Failed(_) => self.clone(),
        }
    }
}

impl From<Element> for Tree {
    fn from(element: Element) -> Self {
        Tree::Element(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Element {
        Element::new(QName::local("a"))
            .with_attribute(QName::local("x"), "1")
            .with_child(Element::new(QName::local("b")).with_text("one"))
            .with_text("  ")
            .with_child(
                Element::new(QName::local("c"))
                    .with_child(Element::new(QName::local("d")).with_text("two")),
            )
    }

    #[test]
    fn test_resolve_handles() {
        let root = sample();
        assert!(matches!(root.resolve(&Handle::root()), Some(NodeRef::Element(e)) if e.name.local == "a"));
        assert!(matches!(root.resolve(&Handle::Node(vec![1])), Some(NodeRef::Text("  "))));
        assert!(matches!(root.resolve(&Handle::Node(vec![2, 0])), Some(NodeRef::Element(e)) if e.name.local == "d"));
        assert!(matches!(root.resolve(&Handle::Attribute(vec![], 0)), Some(NodeRef::Attribute(a)) if a.value == "1"));
        assert!(root.resolve(&Handle::Node(vec![7])).is_none());
    }

    #[test]
    fn test_document_order() {
        let mut handles = vec![
            Handle::Node(vec![1]),
            Handle::Node(vec![0, 0]),
            Handle::Attribute(vec![0], 0),
            Handle::Node(vec![0]),
            Handle::Document,
            Handle::root(),
        ];
        handles.sort();
        assert_eq!(
            handles,
            vec![
                Handle::Document,
                Handle::root(),
                Handle::Node(vec![0]),
                Handle::Attribute(vec![0], 0),
                Handle::Node(vec![0, 0]),
                Handle::Node(vec![1]),
            ]
        );
    }

    #[test]
    fn test_detach() {
        let mut root = sample();
        assert!(root.detach(&Handle::root()).is_none());
        let removed = root.detach(&Handle::Node(vec![2, 0])).unwrap();
        assert!(matches!(removed, Detached::Node(Node::Element(e)) if e.name.local == "d"));
        assert!(root.detach(&Handle::Attribute(vec![], 0)).is_some());
        assert!(root.attributes.is_empty());
        assert_eq!(root.string_value(), "one  ");
    }

    #[test]
    fn test_clone_is_deep() {
        let original = sample();
        let mut copy = original.clone();
        copy.element_at_mut(&[0]).unwrap().children.clear();
        assert_eq!(original.string_value(), "one  two");
        assert_eq!(copy.string_value(), "  two");
    }

    #[test]
    fn test_failed_tree_short_circuits() {
        let failed = Tree::failed("boom");
        let out = failed.and_then(|_| panic!("must not be called"));
        assert_eq!(out.failure(), Some("boom"));
    }

    #[test]
    fn test_qname_identity_ignores_prefix() {
        let a = QName::qualified("urn:x", Some("x"), "n");
        let b = QName::qualified("urn:x", Some("y"), "n");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "x:n");
    }

    #[test]
    fn test_adopt_prefixes() {
        let ns = Namespaces::from_pairs(&[("gmd", "urn:gmd")]);
        let mut root = Element::new(QName::qualified("urn:gmd", Some("ns0"), "A"));
        root.adopt_prefixes(&ns);
        assert_eq!(root.name.to_string(), "gmd:A");
    }
}
