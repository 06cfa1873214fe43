//! Group processed records into ranked pattern rows.
//!
//! Records are keyed by their rendered pattern and extract. Each group keeps
//! the raw extract of its first member as representative, and only the
//! representative goes through the per-group stages.
//!
//! # Architecture
//!
//! ```text
//! Processed records                    Ranked rows
//! ┌─────────────────────────┐         ┌──────────────────────────────┐
//! │ rec1: pattern P, ext A  │         │ P / A  count 2  total 3      │
//! │ rec2: pattern P, ext A  │   →     │ P / B  count 1  total 3      │
//! │ rec3: pattern P, ext B  │         └──────────────────────────────┘
//! └─────────────────────────┘          transform + convert run once per row
//! ```

use std::collections::HashMap;

use super::hasher::short_hash;
use super::select::Selector;
use super::stage::Stage;
use crate::models::{Cell, Row, Table};
use crate::render::render;
use crate::tree::Tree;

/// A record after the per-record stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Processed {
    pub id: String,
    /// Selected subtree before masking and normalization
    pub extract: Tree,
    /// Masked and normalized extract
    pub pattern: Tree,
    /// Normalized extract
    pub normalized_extract: Tree,
}

/// The per-group stages.
#[derive(Debug, Clone, Copy)]
pub struct Downstream<'a> {
    pub transform: &'a Stage,
    pub convert: &'a Stage,
    pub secondary: &'a Selector,
}

impl Downstream<'_> {
    pub fn has_transform(&self) -> bool {
        self.transform.is_enabled()
    }

    pub fn has_converted(&self) -> bool {
        self.convert.is_enabled() || self.secondary.is_enabled()
    }

    /// Run the chain on a representative: transform, then convert and the
    /// secondary extraction on the transform output.
    fn run(&self, representative: &Tree) -> (Option<Cell>, Option<Cell>) {
        let transformed = self.transform.apply(representative);
        let transform = self.has_transform().then(|| render(&transformed));
        let converted = self
            .has_converted()
            .then(|| render(&self.secondary.apply(&self.convert.apply(&transformed))));
        (transform, converted)
    }
}

/// Group, count, rank and decorate processed records.
pub fn aggregate(records: Vec<Processed>, downstream: &Downstream<'_>) -> Table {
    let record_count = records.len();
    let mut index: HashMap<(Cell, Cell), usize> = HashMap::new();
    let mut groups: Vec<GroupBuilder> = Vec::new();

    for record in records {
        let key = (render(&record.pattern), render(&record.normalized_extract));
        match index.get(&key) {
            Some(&i) => groups[i].records.push(record.id),
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(GroupBuilder::new(key, record));
            }
        }
    }

    let mut totals: HashMap<&Cell, usize> = HashMap::new();
    for group in &groups {
        *totals.entry(&group.pattern).or_insert(0) += group.records.len();
    }
    let totals: Vec<usize> = groups.iter().map(|g| totals[&g.pattern]).collect();

    let mut rows: Vec<Row> = groups
        .into_iter()
        .zip(totals)
        .map(|(group, total)| group.build(total, downstream))
        .collect();

    // Stable: equal rows keep discovery order
    rows.sort_by(|a, b| b.total.cmp(&a.total).then(b.count.cmp(&a.count)));

    Table {
        rows,
        record_count,
        has_transform: downstream.has_transform(),
        has_converted: downstream.has_converted(),
    }
}

/// Builder for accumulating records while grouping.
struct GroupBuilder {
    pattern: Cell,
    extract: Cell,
    representative: Tree,
    records: Vec<String>,
}

impl GroupBuilder {
    fn new((pattern, extract): (Cell, Cell), first: Processed) -> Self {
        Self {
            pattern,
            extract,
            representative: first.extract,
            records: vec![first.id],
        }
    }

    fn build(self, total: usize, downstream: &Downstream<'_>) -> Row {
        let (transform, converted) = downstream.run(&self.representative);
        Row {
            pattern_id: short_hash(&self.pattern.text),
            extract_id: short_hash(&self.extract.text),
            total,
            count: self.records.len(),
            pattern: self.pattern,
            extract: self.extract,
            transform,
            converted,
            records: self.records,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::dsl::Stylesheet;
    use crate::transform::stage::StageKind;
    use crate::tree::{Element, Namespaces, QName};

    fn leaf(text: &str) -> Tree {
        Element::synthetic_root()
            .with_child(Element::new(QName::local("Text")).with_text(text))
            .into()
    }

    fn processed(id: &str, pattern: &Tree, extract: &Tree) -> Processed {
        Processed {
            id: id.into(),
            extract: extract.clone(),
            pattern: pattern.clone(),
            normalized_extract: extract.clone(),
        }
    }

    fn disabled() -> (Stage, Stage, Selector) {
        (
            Stage::disabled(StageKind::Transform),
            Stage::disabled(StageKind::Convert),
            Selector::default(),
        )
    }

    #[test]
    fn test_counts_totals_and_order() {
        let (transform, convert, secondary) = disabled();
        let downstream = Downstream {
            transform: &transform,
            convert: &convert,
            secondary: &secondary,
        };
        let p = leaf("");
        let q = Tree::from(Element::synthetic_root());
        let records = vec![
            processed("r1", &q, &leaf("x")),
            processed("r2", &p, &leaf("a")),
            processed("r3", &p, &leaf("b")),
            processed("r4", &p, &leaf("a")),
        ];

        let table = aggregate(records, &downstream);
        assert_eq!(table.record_count, 4);
        assert_eq!(table.rows.iter().map(|r| r.count).sum::<usize>(), 4);

        let summary: Vec<(usize, usize, Vec<String>)> = table
            .rows
            .iter()
            .map(|r| (r.total, r.count, r.records.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (3, 2, vec!["r2".to_string(), "r4".to_string()]),
                (3, 1, vec!["r3".to_string()]),
                (1, 1, vec!["r1".to_string()]),
            ]
        );
        assert_eq!(table.rows[0].pattern_id, table.rows[1].pattern_id);
        assert_ne!(table.rows[0].extract_id, table.rows[1].extract_id);
        assert!(table.rows[0].transform.is_none());
        assert!(!table.has_converted);
    }

    #[test]
    fn test_empty_input() {
        let (transform, convert, secondary) = disabled();
        let downstream = Downstream {
            transform: &transform,
            convert: &convert,
            secondary: &secondary,
        };
        let table = aggregate(Vec::new(), &downstream);
        assert!(table.is_empty());
        assert_eq!(table.record_count, 0);
    }

    #[test]
    fn test_stages_run_once_per_group() {
        let compiled = Stylesheet::from_json(r#"{"rules": [{"match": "//Text", "operations": [{"type": "uppercase"}]}]}"#)
            .unwrap()
            .compile(&Namespaces::new())
            .unwrap();
        let transform = Stage::new(StageKind::Transform, compiled);
        let convert = Stage::disabled(StageKind::Convert);
        let secondary = Selector::compile(Some("//Text/text()"), &Namespaces::new()).unwrap();
        let downstream = Downstream {
            transform: &transform,
            convert: &convert,
            secondary: &secondary,
        };

        let p = leaf("");
        let records = vec![
            processed("r1", &p, &leaf("a")),
            processed("r2", &p, &leaf("a")),
            processed("r3", &p, &leaf("b")),
        ];
        let table = aggregate(records, &downstream);

        assert_eq!(transform.applications(), 2);
        assert_eq!(table.rows[0].transform.as_ref().unwrap().text, "&lt;Text&gt;A&lt;/Text&gt;");
        assert_eq!(table.rows[0].converted, Some(Cell::text("A")));
        assert!(table.has_transform && table.has_converted);
    }

    #[test]
    fn test_failed_records_group_together() {
        let (transform, convert, secondary) = disabled();
        let downstream = Downstream {
            transform: &transform,
            convert: &convert,
            secondary: &secondary,
        };
        let failed = Tree::failed("parse error: boom");
        let table = aggregate(
            vec![processed("r1", &failed, &failed), processed("r2", &failed, &failed)],
            &downstream,
        );
        assert_eq!(table.rows.len(), 1);
        assert!(table.rows[0].pattern.failed);
        assert_eq!(table.rows[0].pattern.text, "error: parse error: boom");
    }
}
