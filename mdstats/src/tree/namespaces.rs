//! Namespace vocabularies.
//!
//! A vocabulary is a closed prefix → URI table. Two are known statically:
//! ISO 19139 (the source records) and ISO 19115-3 (the cross-walk target).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::QName;

/// A closed, ordered prefix → namespace URI table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Namespaces(BTreeMap<String, String>);

impl Namespaces {
    /// Create an empty table
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build a table from `(prefix, uri)` pairs
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(p, u)| (p.to_string(), u.to_string()))
                .collect(),
        )
    }

    /// ISO 19139 (gmd) vocabulary used by the source records
    pub fn iso19139() -> Self {
        Self::from_pairs(&[
            ("gmd", "http://www.isotc211.org/2005/gmd"),
            ("gco", "http://www.isotc211.org/2005/gco"),
            ("gml", "http://www.opengis.net/gml/3.2"),
            ("gmx", "http://www.isotc211.org/2005/gmx"),
            ("xlink", "http://www.w3.org/1999/xlink"),
            ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("geonet", "http://www.fao.org/geonetwork"),
        ])
    }

    /// ISO 19115-3 (mdb) vocabulary used as cross-walk target
    pub fn iso19115_3() -> Self {
        Self::from_pairs(&[
            ("mdb", "http://standards.iso.org/iso/19115/-3/mdb/2.0"),
            ("cit", "http://standards.iso.org/iso/19115/-3/cit/2.0"),
            ("mri", "http://standards.iso.org/iso/19115/-3/mri/1.0"),
            ("mco", "http://standards.iso.org/iso/19115/-3/mco/1.0"),
            ("lan", "http://standards.iso.org/iso/19115/-3/lan/1.0"),
            ("gco", "http://standards.iso.org/iso/19115/-3/gco/1.0"),
            ("gcx", "http://standards.iso.org/iso/19115/-3/gcx/1.0"),
            ("gex", "http://standards.iso.org/iso/19115/-3/gex/1.0"),
            ("mcc", "http://standards.iso.org/iso/19115/-3/mcc/1.0"),
            ("gml", "http://www.opengis.net/gml/3.2"),
            ("xlink", "http://www.w3.org/1999/xlink"),
            ("xsi", "http://www.w3.org/2001/XMLSchema-instance"),
        ])
    }

    /// Namespace URI bound to `prefix`
    pub fn get(&self, prefix: &str) -> Option<&str> {
        self.0.get(prefix).map(String::as_str)
    }

    /// Preferred prefix for `uri` (first in prefix order)
    pub fn prefix_for(&self, uri: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(_, u)| u.as_str() == uri)
            .map(|(p, _)| p.as_str())
    }

    /// Bind `prefix` to `uri`, replacing any previous binding
    pub fn insert(&mut self, prefix: impl Into<String>, uri: impl Into<String>) {
        self.0.insert(prefix.into(), uri.into());
    }

    /// A copy of `self` with `other`'s bindings layered on top
    pub fn merged(&self, other: &Namespaces) -> Namespaces {
        let mut merged = self.clone();
        for (prefix, uri) in other.iter() {
            merged.insert(prefix, uri);
        }
        merged
    }

    /// Iterate `(prefix, uri)` in prefix order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a `prefix:local` or `local` name.
    ///
    /// Returns `None` when the prefix is not bound. Unprefixed names are in
    /// no namespace.
    pub fn resolve_qname(&self, name: &str) -> Option<QName> {
        match name.split_once(':') {
            Some((prefix, local)) => {
                let uri = self.get(prefix)?;
                Some(QName::qualified(uri, Some(prefix), local))
            }
            None => Some(QName::local(name)),
        }
    }

    /// Resolve a namespace given either as a bound prefix or a literal URI.
    ///
    /// Anything else (no binding, no `:` or `/`) is `None`.
    pub fn resolve_namespace<'a>(&'a self, prefix_or_uri: &'a str) -> Option<&'a str> {
        match self.get(prefix_or_uri) {
            Some(uri) => Some(uri),
            None if prefix_or_uri.contains([':', '/']) => Some(prefix_or_uri),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_namespace() {
        let ns = Namespaces::iso19115_3();
        assert_eq!(ns.resolve_namespace("mco"), ns.get("mco"));
        assert_eq!(ns.resolve_namespace("urn:x-custom"), Some("urn:x-custom"));
        assert_eq!(ns.resolve_namespace("http://example.org/ns"), Some("http://example.org/ns"));
        assert_eq!(ns.resolve_namespace("mcoo"), None);
    }

    #[test]
    fn test_vocabularies_share_xlink() {
        let source = Namespaces::iso19139();
        let target = Namespaces::iso19115_3();
        assert_eq!(source.get("xlink"), target.get("xlink"));
        assert_ne!(source.get("gco"), target.get("gco"));
    }

    #[test]
    fn test_merged_prefers_other() {
        let base = Namespaces::from_pairs(&[("a", "urn:a"), ("b", "urn:b")]);
        let over = Namespaces::from_pairs(&[("b", "urn:b2"), ("c", "urn:c")]);
        let merged = base.merged(&over);
        assert_eq!(merged.get("a"), Some("urn:a"));
        assert_eq!(merged.get("b"), Some("urn:b2"));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_resolve_qname() {
        let ns = Namespaces::iso19139();
        let q = ns.resolve_qname("gmd:MD_LegalConstraints").unwrap();
        assert_eq!(q.namespace.as_deref(), Some("http://www.isotc211.org/2005/gmd"));
        assert_eq!(q.local, "MD_LegalConstraints");
        assert!(ns.resolve_qname("nope:Thing").is_none());
        assert_eq!(ns.resolve_qname("Text").unwrap().namespace, None);
    }

    #[test]
    fn test_prefix_for() {
        let ns = Namespaces::iso19139();
        assert_eq!(ns.prefix_for("http://www.isotc211.org/2005/gco"), Some("gco"));
        assert_eq!(ns.prefix_for("urn:unknown"), None);
    }

    #[test]
    fn test_deserialize_from_map() {
        let ns: Namespaces = serde_json::from_str(r#"{"x": "urn:x"}"#).unwrap();
        assert_eq!(ns.get("x"), Some("urn:x"));
    }
}
