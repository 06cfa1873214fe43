//! Corpus directory enumeration.
//!
//! Each immediate subdirectory of the root is one record, named by the
//! directory. A record is kept only if its document exists beneath it.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, CorpusError};
use crate::logs::log_info;
use crate::models::Record;

/// Document location inside a corpus entry
pub const DOCUMENT_PATH: &str = "metadata/metadata.xml";

/// A validated corpus root
#[derive(Debug, Clone)]
pub struct Corpus {
    root: PathBuf,
    document_path: PathBuf,
}

impl Corpus {
    /// Open a corpus; the root must be an existing directory
    pub fn open(root: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let root = root.as_ref();
        if !root.is_dir() {
            return Err(ConfigError::InvalidCorpus(root.to_path_buf()));
        }
        Ok(Self {
            root: root.to_path_buf(),
            document_path: PathBuf::from(DOCUMENT_PATH),
        })
    }

    pub fn with_document_path(mut self, path: impl AsRef<Path>) -> Self {
        self.document_path = path.as_ref().to_path_buf();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record ids and document paths, in directory-name order
    pub fn entries(&self) -> Result<Vec<(String, PathBuf)>, CorpusError> {
        let listing = fs::read_dir(&self.root).map_err(|source| CorpusError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for entry in listing {
            let entry = entry.map_err(|source| CorpusError::Io {
                path: self.root.clone(),
                source,
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let document = path.join(&self.document_path);
            if !document.is_file() {
                skipped += 1;
                continue;
            }
            entries.push((entry.file_name().to_string_lossy().into_owned(), document));
        }

        if skipped > 0 {
            log_info(format!(
                "Skipped {} entries without {}",
                skipped,
                self.document_path.display()
            ));
        }

        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Read every record of the corpus
    pub fn records(&self) -> Result<Vec<Record>, CorpusError> {
        self.entries()?
            .into_iter()
            .map(|(id, path)| {
                fs::read(&path)
                    .map(|bytes| Record::new(id, bytes))
                    .map_err(|source| CorpusError::Io { path, source })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_record(root: &Path, name: &str, relative: &str, content: &str) {
        let path = root.join(name).join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_records_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        add_record(dir.path(), "uuid-2", DOCUMENT_PATH, "<b/>");
        add_record(dir.path(), "uuid-1", DOCUMENT_PATH, "<a/>");
        add_record(dir.path(), "uuid-3", "metadata/other.xml", "<c/>");
        fs::write(dir.path().join("README"), "not a record").unwrap();

        let records = Corpus::open(dir.path()).unwrap().records().unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["uuid-1", "uuid-2"]);
        assert_eq!(records[0].raw_document, b"<a/>".to_vec());
    }

    #[test]
    fn test_custom_document_path() {
        let dir = tempfile::tempdir().unwrap();
        add_record(dir.path(), "r", "record.xml", "<a/>");
        let corpus = Corpus::open(dir.path()).unwrap().with_document_path("record.xml");
        assert_eq!(corpus.records().unwrap().len(), 1);
    }

    #[test]
    fn test_open_rejects_non_directory() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            Corpus::open(file.path()),
            Err(ConfigError::InvalidCorpus(_))
        ));
        assert!(Corpus::open("/nonexistent/corpus").is_err());
    }

    #[test]
    fn test_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Corpus::open(dir.path()).unwrap().records().unwrap().is_empty());
    }
}
