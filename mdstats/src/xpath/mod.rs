//! Path expressions.
//!
//! Expressions are compiled by `xee-xpath` against a namespace table and
//! evaluated over a `xot` document written from the owned tree. Matches come
//! back as [`Handle`]s into that tree, in document order.
//!
//! The context item is the root element: relative paths start there, and `/`
//! is the document node above it.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use xee_xpath::context::StaticContextBuilder;
use xee_xpath::query::SequenceQuery;
use xee_xpath::{Documents, Queries, Query};
use xot::{Node as XotNode, Value, Xot};

use crate::error::PathError;
use crate::render::to_document_xml;
use crate::tree::{Element, Handle, Namespaces, Node};

/// Base URI of the per-evaluation document
const DOCUMENT_URI: &str = "urn:mdstats:document";

/// A compiled node-selecting path expression.
#[derive(Clone)]
pub struct XPath {
    source: String,
    query: Rc<SequenceQuery>,
}

impl XPath {
    /// Compile `source` with `namespaces` providing the prefix bindings.
    ///
    /// Expressions that do not yield nodes (`count(//a)`, `'x'`) are
    /// rejected.
    pub fn compile(source: &str, namespaces: &Namespaces) -> Result<Self, PathError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(PathError::Empty);
        }

        let mut context = StaticContextBuilder::default();
        context.namespaces(namespaces.iter());
        let queries = Queries::new(context);
        let query = queries
            .sequence(&format!("/* ! ({})", source))
            .map_err(|e| PathError::Invalid {
                expr: source.to_string(),
                message: e.to_string(),
            })?;

        let path = Self {
            source: source.to_string(),
            query: Rc::new(query),
        };
        // Dynamic errors on an empty document say nothing about the result type
        if let Ok(items) = path.evaluate(&Element::synthetic_root()) {
            if items.iter().any(Option::is_none) {
                return Err(PathError::NotANodeSet(path.source));
            }
        }
        Ok(path)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Select nodes of `root`, in document order without duplicates.
    ///
    /// A selected attribute brings along later attributes of the same name
    /// on its element, which only a forest root can carry.
    pub fn select(&self, root: &Element) -> Result<Vec<Handle>, PathError> {
        let mut handles = Vec::new();
        for handle in self.evaluate(root)?.into_iter().flatten() {
            if let Handle::Attribute(path, index) = &handle {
                handles.extend(repeated_attributes(root, path, *index));
            }
            handles.push(handle);
        }
        handles.sort();
        handles.dedup();
        Ok(handles)
    }

    /// Evaluate against `root`; atomic items come back as `None`
    fn evaluate(&self, root: &Element) -> Result<Vec<Option<Handle>>, PathError> {
        let mut documents = Documents::new();
        let document = match DOCUMENT_URI.try_into() {
            Ok(uri) => documents.add_string(uri, &to_document_xml(root)),
            Err(_) => return Err(self.evaluation_error("invalid document URI")),
        }
        .map_err(|e| self.evaluation_error(e))?;

        let sequence = self
            .query
            .execute(&mut documents, document)
            .map_err(|e| self.evaluation_error(e))?;

        let mut handles = HandleMap::new(documents.xot(), root);
        Ok(sequence
            .iter()
            .map(|item| item.to_node().ok().and_then(|node| handles.get(node)))
            .collect())
    }

    fn evaluation_error(&self, message: impl fmt::Display) -> PathError {
        PathError::Evaluation {
            expr: self.source.clone(),
            message: message.to_string(),
        }
    }
}

impl fmt::Debug for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("XPath").field(&self.source).finish()
    }
}

impl fmt::Display for XPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

// =============================================================================
// Node → handle mapping
// =============================================================================

/// Maps nodes of the evaluation document back to handles in the owned tree.
struct HandleMap<'a> {
    xot: &'a Xot,
    root: &'a Element,
    known: HashMap<XotNode, Option<Handle>>,
}

impl<'a> HandleMap<'a> {
    fn new(xot: &'a Xot, root: &'a Element) -> Self {
        Self {
            xot,
            root,
            known: HashMap::new(),
        }
    }

    fn get(&mut self, node: XotNode) -> Option<Handle> {
        if let Some(known) = self.known.get(&node) {
            return known.clone();
        }
        let handle = self.locate(node);
        self.known.insert(node, handle.clone());
        handle
    }

    fn locate(&mut self, node: XotNode) -> Option<Handle> {
        let xot = self.xot;
        let root = self.root;
        let Some(parent) = xot.parent(node) else {
            return Some(Handle::Document);
        };

        match xot.value(node) {
            Value::Attribute(attribute) => {
                let (local, uri) = xot.name_ns_str(attribute.name());
                let namespace = (!uri.is_empty()).then_some(uri);
                let Handle::Node(path) = self.get(parent)? else {
                    return None;
                };
                let index = root
                    .element_at(&path)?
                    .attributes
                    .iter()
                    .position(|a| a.name.is(namespace, local))?;
                Some(Handle::Attribute(path, index))
            }
            Value::Element(_) | Value::Text(_) => match self.get(parent)? {
                Handle::Document => Some(Handle::root()),
                Handle::Node(mut path) => {
                    let index = child_index(xot, parent, node, root.element_at(&path)?)?;
                    path.push(index);
                    Some(Handle::Node(path))
                }
                Handle::Attribute(..) => None,
            },
            _ => None,
        }
    }
}

fn repeated_attributes(root: &Element, path: &[usize], index: usize) -> Vec<Handle> {
    let Some(owner) = root.element_at(path) else {
        return Vec::new();
    };
    let Some(first) = owner.attributes.get(index) else {
        return Vec::new();
    };
    owner
        .attributes
        .iter()
        .enumerate()
        .skip(index + 1)
        .filter(|(_, a)| a.name == first.name)
        .map(|(i, _)| Handle::Attribute(path.to_vec(), i))
        .collect()
}

/// Index in `element.children` of the node that became `target`.
///
/// Empty text nodes are never written, and adjacent text nodes come back as
/// one; the merged node maps to the first of them.
fn child_index(xot: &Xot, parent: XotNode, target: XotNode, element: &Element) -> Option<usize> {
    let mut ours = element
        .children
        .iter()
        .enumerate()
        .filter(|(_, child)| !matches!(child, Node::Text(t) if t.is_empty()));
    let mut pending = ours.next();

    for child in xot.children(parent) {
        let index = match xot.value(child) {
            Value::Element(_) => {
                while let Some((_, Node::Text(_))) = pending {
                    pending = ours.next();
                }
                let index = pending.map(|(i, _)| i);
                pending = ours.next();
                index
            }
            Value::Text(_) => match pending {
                Some((i, Node::Text(_))) => {
                    while let Some((_, Node::Text(_))) = pending {
                        pending = ours.next();
                    }
                    Some(i)
                }
                _ => None,
            },
            _ => None,
        };
        if child == target {
            return index;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_str;
    use crate::tree::{NodeRef, QName};

    const RECORD: &str = r#"<gmd:MD_Metadata xmlns:gmd="http://www.isotc211.org/2005/gmd" xmlns:gco="http://www.isotc211.org/2005/gco">
  <gmd:identificationInfo>
    <gmd:resourceConstraints>
      <gmd:MD_LegalConstraints>
        <gmd:accessConstraints>
          <gmd:MD_RestrictionCode codeList="http://example.org/codes#MD_RestrictionCode" codeListValue="license"/>
        </gmd:accessConstraints>
        <gmd:otherConstraints><gco:CharacterString>CC-BY 4.0</gco:CharacterString></gmd:otherConstraints>
        <gmd:otherConstraints gco:nilReason="missing"/>
      </gmd:MD_LegalConstraints>
    </gmd:resourceConstraints>
    <gmd:resourceConstraints>
      <gmd:MD_SecurityConstraints/>
    </gmd:resourceConstraints>
  </gmd:identificationInfo>
</gmd:MD_Metadata>"#;

    fn record() -> Element {
        parse_str(RECORD).unwrap()
    }

    fn select(expr: &str) -> Vec<Handle> {
        XPath::compile(expr, &Namespaces::iso19139())
            .unwrap()
            .select(&record())
            .unwrap()
    }

    fn describe(root: &Element, handles: &[Handle]) -> Vec<String> {
        handles
            .iter()
            .map(|h| match root.resolve(h) {
                Some(NodeRef::Element(e)) => e.name.local.clone(),
                Some(NodeRef::Attribute(a)) => format!("@{}", a.name.local),
                Some(NodeRef::Text(t)) => format!("text:{}", t.trim()),
                Some(NodeRef::Document(_)) => "/".to_string(),
                None => "?".to_string(),
            })
            .collect()
    }

    fn local_names(expr: &str) -> Vec<String> {
        describe(&record(), &select(expr))
    }

    #[test]
    fn test_default_extract_filters_by_child() {
        assert_eq!(
            local_names("//gmd:resourceConstraints[gmd:MD_LegalConstraints]"),
            vec!["resourceConstraints"]
        );
        assert_eq!(
            select("//gmd:resourceConstraints[gmd:MD_LegalConstraints]"),
            vec![Handle::Node(vec![1, 1])]
        );
    }

    #[test]
    fn test_default_masks() {
        assert_eq!(local_names("//gco:CharacterString"), vec!["CharacterString"]);
        assert_eq!(local_names("//@codeList"), vec!["@codeList"]);
        assert_eq!(local_names(r#"//*[@gco:nilReason="missing"]"#), vec!["otherConstraints"]);
        assert_eq!(local_names("//@gco:nilReason"), vec!["@nilReason"]);
    }

    #[test]
    fn test_results_are_in_document_order() {
        let names = local_names("//gmd:MD_SecurityConstraints | //gmd:MD_LegalConstraints");
        assert_eq!(names, vec!["MD_LegalConstraints", "MD_SecurityConstraints"]);
    }

    #[test]
    fn test_positions_and_reverse_axes() {
        assert_eq!(local_names("//gmd:otherConstraints[1]"), vec!["otherConstraints"]);
        assert_eq!(select("//gmd:otherConstraints[last()]").len(), 1);
        assert_eq!(
            local_names("//gco:CharacterString/ancestor::*[1]"),
            vec!["otherConstraints"]
        );
        assert_eq!(
            local_names("//gmd:otherConstraints[2]/preceding-sibling::*[1]"),
            vec!["otherConstraints"]
        );
    }

    #[test]
    fn test_text_and_functions() {
        assert_eq!(local_names("//gco:CharacterString/text()"), vec!["text:CC-BY 4.0"]);
        assert_eq!(
            select("//gco:CharacterString[contains(., 'CC') and string-length() > 3]").len(),
            1
        );
        assert_eq!(select("//*[local-name() = 'MD_RestrictionCode']").len(), 1);
        assert_eq!(select("//gmd:resourceConstraints[not(gmd:MD_LegalConstraints)]").len(), 1);
        assert_eq!(select("//*[@codeListValue = 'license']/..").len(), 1);
        assert_eq!(select("//gmd:*[count(*) = 3]").len(), 1);
    }

    #[test]
    fn test_equality_and_relational_comparisons() {
        let root = parse_str(r#"<a><v n="1"/><v n="2"/><v n="3"/><v n="4"/></a>"#).unwrap();
        let path = XPath::compile("//v[@n >= 2 and @n != 3]", &Namespaces::new()).unwrap();
        assert_eq!(
            path.select(&root).unwrap(),
            vec![Handle::Node(vec![1]), Handle::Node(vec![3])]
        );
        let path = XPath::compile("//v[(@n < 2) = false()]", &Namespaces::new()).unwrap();
        assert_eq!(path.select(&root).unwrap().len(), 3);
    }

    #[test]
    fn test_document_and_root() {
        assert_eq!(select("/"), vec![Handle::Document]);
        assert_eq!(select("."), vec![Handle::root()]);
        assert_eq!(select("/gmd:MD_Metadata"), vec![Handle::root()]);
        assert!(select("/gmd:Other").is_empty());
    }

    #[test]
    fn test_whitespace_text_keeps_positions() {
        let root = record();
        let found = select("//gmd:MD_SecurityConstraints");
        // identificationInfo is child 1 of the root, behind a whitespace text node
        assert_eq!(found, vec![Handle::Node(vec![1, 3, 1])]);
        assert_eq!(describe(&root, &found), vec!["MD_SecurityConstraints"]);
    }

    #[test]
    fn test_split_text_maps_to_first_node() {
        let mut root = Element::new(QName::local("a"));
        root.children.push(Node::Text("x".into()));
        root.children.push(Node::Text(String::new()));
        root.children.push(Node::Text("y".into()));
        root.children.push(Node::Element(Element::new(QName::local("b"))));

        let path = XPath::compile("//text() | //b", &Namespaces::new()).unwrap();
        assert_eq!(
            path.select(&root).unwrap(),
            vec![Handle::Node(vec![0]), Handle::Node(vec![3])]
        );
    }

    #[test]
    fn test_synthetic_root_attributes() {
        let forest = Element::synthetic_root()
            .with_attribute(QName::local("code"), "x")
            .with_child(Element::new(QName::qualified("urn:x", None, "c")));
        let path = XPath::compile("//@code | //*:c", &Namespaces::new()).unwrap();
        assert_eq!(
            path.select(&forest).unwrap(),
            vec![Handle::Attribute(vec![], 0), Handle::Node(vec![0])]
        );
    }

    #[test]
    fn test_repeated_forest_attributes_are_all_selected() {
        let mut forest = Element::synthetic_root().with_attribute(QName::local("code"), "x");
        forest.attributes.push(crate::tree::Attribute {
            name: QName::local("code"),
            value: "y".into(),
        });
        let path = XPath::compile("//@code", &Namespaces::new()).unwrap();
        assert_eq!(
            path.select(&forest).unwrap(),
            vec![Handle::Attribute(vec![], 0), Handle::Attribute(vec![], 1)]
        );
    }

    #[test]
    fn test_compile_errors() {
        let ns = Namespaces::iso19139();
        assert!(matches!(
            XPath::compile("count(//a)", &ns),
            Err(PathError::NotANodeSet(_))
        ));
        assert!(matches!(
            XPath::compile("'x'", &ns),
            Err(PathError::NotANodeSet(_))
        ));
        assert!(matches!(
            XPath::compile("//mdb:MD_Metadata", &ns),
            Err(PathError::Invalid { .. })
        ));
        assert!(matches!(
            XPath::compile("//gmd:a[", &ns),
            Err(PathError::Invalid { .. })
        ));
        assert_eq!(XPath::compile("  ", &ns).unwrap_err(), PathError::Empty);
        assert_eq!(XPath::compile(" //gmd:a ", &ns).unwrap().source(), "//gmd:a");
    }
}
