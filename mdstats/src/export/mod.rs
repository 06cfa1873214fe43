//! Flat file export of a result table.
//!
//! Rows are projected onto the requested columns, canonical text is turned
//! back into plain XML and rows that become identical are collapsed.

use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use crate::error::ExportError;
use crate::models::{Cell, Row, Table};
use crate::render::unescape_display;

/// Separator between record ids in the `records` column
pub const DEFAULT_ID_SEPARATOR: &str = ";";

/// An exportable column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    PatternId,
    ExtractId,
    Total,
    Count,
    Pattern,
    Extract,
    Transform,
    Converted,
    Records,
}

impl Column {
    pub const ALL: [Column; 9] = [
        Column::PatternId,
        Column::ExtractId,
        Column::Total,
        Column::Count,
        Column::Pattern,
        Column::Extract,
        Column::Transform,
        Column::Converted,
        Column::Records,
    ];

    /// Header name, also accepted by `FromStr`
    pub fn header(self) -> &'static str {
        match self {
            Column::PatternId => "pattern_id",
            Column::ExtractId => "extract_id",
            Column::Total => "total",
            Column::Count => "count",
            Column::Pattern => "pattern",
            Column::Extract => "extract",
            Column::Transform => "transform",
            Column::Converted => "converted",
            Column::Records => "records",
        }
    }

    /// Columns a table actually carries
    pub fn available(table: &Table) -> Vec<Column> {
        Self::ALL
            .into_iter()
            .filter(|c| match c {
                Column::Transform => table.has_transform,
                Column::Converted => table.has_converted,
                _ => true,
            })
            .collect()
    }

    fn value(self, row: &Row, id_separator: &str) -> String {
        let text = |cell: Option<&Cell>| cell.map(|c| unescape_display(&c.text)).unwrap_or_default();
        match self {
            Column::PatternId => row.pattern_id.clone(),
            Column::ExtractId => row.extract_id.clone(),
            Column::Total => row.total.to_string(),
            Column::Count => row.count.to_string(),
            Column::Pattern => text(Some(&row.pattern)),
            Column::Extract => text(Some(&row.extract)),
            Column::Transform => text(row.transform.as_ref()),
            Column::Converted => text(row.converted.as_ref()),
            Column::Records => row.records.join(id_separator),
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

impl FromStr for Column {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|c| c.header() == name)
            .ok_or_else(|| ExportError::UnknownColumn(s.to_string()))
    }
}

/// Export settings
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub delimiter: u8,
    /// Empty means every column the table carries
    pub columns: Vec<Column>,
    pub id_separator: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            delimiter: b',',
            columns: Vec::new(),
            id_separator: DEFAULT_ID_SEPARATOR.to_string(),
        }
    }
}

impl ExportOptions {
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_columns(mut self, columns: Vec<Column>) -> Self {
        self.columns = columns;
        self
    }

    /// Parse a comma-separated column list
    pub fn with_column_list(self, list: &str) -> Result<Self, ExportError> {
        let columns = list
            .split(',')
            .filter(|c| !c.trim().is_empty())
            .map(Column::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_columns(columns))
    }

    fn resolve_columns(&self, table: &Table) -> Vec<Column> {
        if self.columns.is_empty() {
            Column::available(table)
        } else {
            self.columns.clone()
        }
    }
}

/// Project, unescape and deduplicate the rows of `table`
pub fn export_rows(table: &Table, options: &ExportOptions) -> (Vec<Column>, Vec<Vec<String>>) {
    let columns = options.resolve_columns(table);
    let mut seen = HashSet::new();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| c.value(row, &options.id_separator))
                .collect::<Vec<_>>()
        })
        .filter(|values| seen.insert(values.clone()))
        .collect();
    (columns, rows)
}

/// Write `table` as delimited text, header first
pub fn write_csv<W: Write>(writer: W, table: &Table, options: &ExportOptions) -> Result<usize, ExportError> {
    let (columns, rows) = export_rows(table, options);
    let mut csv_writer = csv::WriterBuilder::new()
        .delimiter(options.delimiter)
        .from_writer(writer);

    csv_writer.write_record(columns.iter().map(|c| c.header()))?;
    for row in &rows {
        csv_writer.write_record(row)?;
    }
    csv_writer.flush()?;
    Ok(rows.len())
}

/// Write `table` to a file; returns the number of rows written
pub fn export_csv(path: &Path, table: &Table, options: &ExportOptions) -> Result<usize, ExportError> {
    let file = File::create(path)?;
    write_csv(file, table, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pattern: &str, extract: &str, records: &[&str]) -> Row {
        Row {
            pattern_id: "0000000a".into(),
            extract_id: extract.len().to_string(),
            total: 3,
            count: records.len(),
            pattern: Cell::text(pattern),
            extract: Cell::text(extract),
            transform: None,
            converted: None,
            records: records.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn table() -> Table {
        Table {
            rows: vec![
                row("&lt;a&gt;<br/>  &lt;b/&gt;<br/>&lt;/a&gt;", "x &amp; y", &["r1", "r2"]),
                row("&lt;a&gt;<br/>  &lt;b/&gt;<br/>&lt;/a&gt;", "z", &["r3"]),
            ],
            record_count: 3,
            has_transform: false,
            has_converted: false,
        }
    }

    #[test]
    fn test_column_parsing() {
        assert_eq!("pattern_id".parse::<Column>().unwrap(), Column::PatternId);
        assert_eq!(" Records ".parse::<Column>().unwrap(), Column::Records);
        assert!(matches!(
            "nope".parse::<Column>(),
            Err(ExportError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_available_columns_follow_table() {
        let mut t = table();
        assert!(!Column::available(&t).contains(&Column::Transform));
        t.has_converted = true;
        assert!(Column::available(&t).contains(&Column::Converted));
    }

    #[test]
    fn test_rows_are_unescaped() {
        let (columns, rows) = export_rows(&table(), &ExportOptions::default());
        assert_eq!(columns.len(), 7);
        assert_eq!(rows[0][4], "<a>\n  <b/>\n</a>");
        assert_eq!(rows[0][5], "x & y");
        assert_eq!(rows[0][6], "r1;r2");
    }

    #[test]
    fn test_projection_collapses_duplicates() {
        let options = ExportOptions::default().with_column_list("pattern_id,total,pattern").unwrap();
        let (_, rows) = export_rows(&table(), &options);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_write_csv() {
        let options = ExportOptions::default()
            .with_delimiter(b';')
            .with_columns(vec![Column::Count, Column::Extract, Column::Records]);
        let mut out = Vec::new();
        let written = write_csv(&mut out, &table(), &options).unwrap();
        assert_eq!(written, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "count;extract;records\n2;x & y;r1;r2\n1;z;r3\n".replace("r1;r2", "\"r1;r2\"")
        );
    }

    #[test]
    fn test_export_csv_to_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        export_csv(file.path(), &table(), &ExportOptions::default()).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("pattern_id,extract_id,total,count,pattern,extract,records\n"));
        assert!(content.contains("\"<a>\n  <b/>\n</a>\""));
    }
}
