//! Raw document decoding and XML parsing.
//!
//! Records arrive as raw bytes. The encoding is taken from a BOM, then from
//! the XML declaration, then by checking for valid UTF-8, and finally by
//! charset detection. The decoded text is parsed with a namespace-aware
//! reader into the [`Element`] tree model.

use encoding_rs::Encoding;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use regex::bytes::Regex;

use crate::error::DocumentError;
use crate::tree::{Attribute, Element, Node, QName};

static DECLARED_ENCODING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*<\?xml[^>]*?encoding\s*=\s*["']([A-Za-z0-9._:-]+)["']"#)
        .expect("encoding declaration pattern is valid")
});

/// Detect the encoding label of raw document bytes
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }
    if bytes.starts_with(&[0xFF, 0xFE]) {
        return "utf-16le".to_string();
    }
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return "utf-16be".to_string();
    }

    let head = &bytes[..bytes.len().min(256)];
    if let Some(caps) = DECLARED_ENCODING.captures(head) {
        return String::from_utf8_lossy(&caps[1]).to_lowercase();
    }

    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode raw bytes to text using the detected encoding.
///
/// Unknown labels fall back to lossy UTF-8.
pub fn decode_document(bytes: &[u8]) -> String {
    let label = detect_encoding(bytes);
    let encoding = Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

/// Decode and parse a raw record document
pub fn parse_document(bytes: &[u8]) -> Result<Element, DocumentError> {
    parse_str(&decode_document(bytes))
}

/// Parse XML text into an element tree.
///
/// Comments, processing instructions and the doctype are dropped; CDATA
/// becomes text.
pub fn parse_str(text: &str) -> Result<Element, DocumentError> {
    let mut reader = NsReader::from_str(text);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolved, event) = reader
            .read_resolved_event()
            .map_err(|e| DocumentError::Xml(e.to_string()))?;
        let namespace = owned_namespace(resolved)?;

        match event {
            Event::Start(start) => {
                let element = open_element(&reader, namespace, &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, namespace, &start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| DocumentError::Malformed("unbalanced end tag".into()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                let content = t.unescape().map_err(|e| DocumentError::Xml(e.to_string()))?;
                match stack.last_mut() {
                    Some(parent) => parent.push_text(content),
                    None if content.trim().is_empty() => {}
                    None => return Err(DocumentError::Malformed("text outside the root element".into())),
                }
            }
            Event::CData(c) => {
                if let Some(parent) = stack.last_mut() {
                    parent.push_text(String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(DocumentError::Malformed("unexpected end of document".into()));
    }
    root.ok_or(DocumentError::Empty)
}

fn owned_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, DocumentError> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(String::from_utf8_lossy(ns.as_ref()).into_owned())),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(DocumentError::UnknownPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn open_element(
    reader: &NsReader<&[u8]>,
    namespace: Option<String>,
    start: &BytesStart<'_>,
) -> Result<Element, DocumentError> {
    let name = start.name();
    let mut element = Element::new(QName {
        namespace,
        prefix: name
            .prefix()
            .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
        local: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
    });

    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocumentError::Xml(e.to_string()))?;
        if attr.key.as_namespace_binding().is_some() {
            continue;
        }
        let (resolved, local) = reader.resolve_attribute(attr.key);
        let value = attr
            .unescape_value()
            .map_err(|e| DocumentError::Xml(e.to_string()))?;
        element.attributes.push(Attribute {
            name: QName {
                namespace: owned_namespace(resolved)?,
                prefix: attr
                    .key
                    .prefix()
                    .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned()),
                local: String::from_utf8_lossy(local.as_ref()).into_owned(),
            },
            value: value.into_owned(),
        });
    }

    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<(), DocumentError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocumentError::Malformed("more than one root element".into())),
    }
}
