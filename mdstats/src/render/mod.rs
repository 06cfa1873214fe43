//! Canonical serialization of trees.
//!
//! [`render`] produces the display text stored in the result table. The same
//! text is the grouping key, so it depends on nothing but the tree: two equal
//! trees always render identically.
//!
//! Layout:
//!
//! ```text
//! <gmd:MD_LegalConstraints>                    element children: one per line,
//!   <gmd:otherConstraints>                     indented by two spaces
//!     <gco:CharacterString>CC-BY</gco:CharacterString>
//!   </gmd:otherConstraints>                    text content stays inline
//!   <gmd:useLimitation/>                       empty elements self-close
//! </gmd:MD_LegalConstraints>
//! ```
//!
//! A synthetic root is not printed: its attributes come first as
//! `@name="value"` lines, then its children at the top level. The result is
//! XML-escaped and newlines become `<br/>`.

use std::borrow::Cow;

use quick_xml::escape::{escape, partial_escape, unescape};

use crate::models::Cell;
use crate::tree::{Element, Node, QName, Tree};

/// Rendered in place of a forest with no content
pub const EMPTY_PLACEHOLDER: &str = "(empty)";

/// Replaces newlines in rendered text
pub const LINE_BREAK: &str = "<br/>";

const INDENT: &str = "  ";

/// Bound to `xml` implicitly; never declared
const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Render a tree to its canonical display cell
pub fn render(tree: &Tree) -> Cell {
    match tree {
        Tree::Element(element) => Cell::text(to_display(&canonical_text(element))),
        Tree::Failed(message) => Cell::failed(to_display(&format!("error: {}", message))),
    }
}

/// Unescaped canonical text of an element
pub fn canonical_text(element: &Element) -> String {
    if !element.is_synthetic() {
        let mut out = String::new();
        write_pretty(element, 0, &mut out, &[]);
        return out.trim_end().to_string();
    }

    let mut lines: Vec<String> = element
        .attributes
        .iter()
        .map(|a| format!("@{}=\"{}\"", a.name, escape(a.value.as_str())))
        .collect();

    for child in &element.children {
        match child {
            Node::Element(e) => {
                let mut out = String::new();
                write_pretty(e, 0, &mut out, &[]);
                lines.push(out.trim_end().to_string());
            }
            Node::Text(t) if !t.trim().is_empty() => lines.push(partial_escape(t.as_str()).into_owned()),
            Node::Text(_) => {}
        }
    }

    if lines.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        lines.join("\n")
    }
}

/// Escape `& < >` and replace newlines for display
pub fn to_display(text: &str) -> String {
    partial_escape(text).replace('\n', LINE_BREAK)
}

/// Reverse [`to_display`]: restore newlines and decode `&lt; &gt; &amp;`
pub fn unescape_display(text: &str) -> String {
    let restored = text.replace(LINE_BREAK, "\n");
    let decoded = unescape(&restored).map(Cow::into_owned);
    decoded.unwrap_or(restored)
}

/// Serialize an element as a standalone XML document fragment.
///
/// Namespace declarations for every namespace in use are written on the
/// outermost element. A prefix bound to two different namespaces in the
/// tree is renamed on output.
pub fn to_xml(element: &Element) -> String {
    let mut element = element.clone();
    let mut bindings: Vec<(Option<String>, String)> = Vec::new();
    bind_prefixes(&mut element, &mut bindings, false);

    let mut out = String::new();
    write_pretty(&element, 0, &mut out, &bindings);
    out
}

/// Unindented XML that parses back to the same nodes.
///
/// Every namespace gets a prefix declared on the root, so unprefixed names
/// are always in no namespace. Only the first of several same-named
/// attributes is written.
pub(crate) fn to_document_xml(element: &Element) -> String {
    let mut element = element.clone();
    drop_repeated_attributes(&mut element);
    let mut bindings: Vec<(Option<String>, String)> = Vec::new();
    bind_prefixes(&mut element, &mut bindings, true);

    let mut out = String::new();
    write_inline(&element, &mut out, &bindings);
    out
}

// =============================================================================
// Writer
// =============================================================================

fn write_pretty(element: &Element, level: usize, out: &mut String, declarations: &[(Option<String>, String)]) {
    let indent = INDENT.repeat(level);
    out.push_str(&indent);
    write_open_tag(element, out, declarations);

    let block = element.elements().next().is_some()
        && element
            .children
            .iter()
            .all(|c| c.as_element().is_some() || c.is_blank_text());
    let empty = element.children.iter().all(Node::is_blank_text);

    if empty {
        out.push_str("/>\n");
    } else if block {
        out.push_str(">\n");
        for child in element.elements() {
            write_pretty(child, level + 1, out, &[]);
        }
        out.push_str(&indent);
        write_close_tag(&element.name, out);
        out.push('\n');
    } else {
        out.push('>');
        write_inline_children(element, out);
        write_close_tag(&element.name, out);
        out.push('\n');
    }
}

fn write_inline(element: &Element, out: &mut String, declarations: &[(Option<String>, String)]) {
    write_open_tag(element, out, declarations);
    if element.children.is_empty() {
        out.push_str("/>");
    } else {
        out.push('>');
        write_inline_children(element, out);
        write_close_tag(&element.name, out);
    }
}

fn write_inline_children(element: &Element, out: &mut String) {
    for child in &element.children {
        match child {
            Node::Element(e) => write_inline(e, out, &[]),
            Node::Text(t) => out.push_str(&partial_escape(t.as_str())),
        }
    }
}

fn write_open_tag(element: &Element, out: &mut String, declarations: &[(Option<String>, String)]) {
    out.push('<');
    out.push_str(&element.name.to_string());
    for (prefix, uri) in declarations {
        match prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{}=\"{}\"", prefix, escape(uri.as_str()))),
            None => out.push_str(&format!(" xmlns=\"{}\"", escape(uri.as_str()))),
        }
    }
    for attr in &element.attributes {
        out.push_str(&format!(" {}=\"{}\"", attr.name, escape(attr.value.as_str())));
    }
}

fn write_close_tag(name: &QName, out: &mut String) {
    out.push_str("</");
    out.push_str(&name.to_string());
    out.push('>');
}

fn drop_repeated_attributes(element: &mut Element) {
    let mut seen: Vec<QName> = Vec::new();
    element.attributes.retain(|a| {
        if seen.contains(&a.name) {
            false
        } else {
            seen.push(a.name.clone());
            true
        }
    });
    for child in &mut element.children {
        if let Node::Element(e) = child {
            drop_repeated_attributes(e);
        }
    }
}

// =============================================================================
// Namespace declarations
// =============================================================================

fn bind_prefixes(element: &mut Element, bindings: &mut Vec<(Option<String>, String)>, prefixed: bool) {
    bind_name(&mut element.name, bindings, prefixed);
    for attr in &mut element.attributes {
        bind_name(&mut attr.name, bindings, true);
    }
    for child in &mut element.children {
        if let Node::Element(e) = child {
            bind_prefixes(e, bindings, prefixed);
        }
    }
}

fn bind_name(name: &mut QName, bindings: &mut Vec<(Option<String>, String)>, prefixed: bool) {
    let Some(uri) = name.namespace.clone() else {
        return;
    };
    if uri == XML_NAMESPACE {
        name.prefix = Some("xml".to_string());
        return;
    }

    // Attributes never take the default namespace
    let wanted = if prefixed && name.prefix.is_none() {
        Some("ns".to_string())
    } else {
        name.prefix.clone()
    };

    if bindings.iter().any(|(p, u)| *p == wanted && *u == uri) {
        name.prefix = wanted;
        return;
    }
    if !bindings.iter().any(|(p, _)| *p == wanted) {
        bindings.push((wanted.clone(), uri));
        name.prefix = wanted;
        return;
    }
    if let Some((p, _)) = bindings.iter().find(|(p, u)| *u == uri && p.is_some()) {
        name.prefix = p.clone();
        return;
    }

    let stem = wanted.unwrap_or_else(|| "ns".to_string());
    let fresh = (1..)
        .map(|n| format!("{}{}", stem, n))
        .find(|candidate| !bindings.iter().any(|(p, _)| p.as_deref() == Some(candidate.as_str())))
        .unwrap_or(stem);
    bindings.push((Some(fresh.clone()), uri));
    name.prefix = Some(fresh);
}
