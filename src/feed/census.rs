//! Unique document id census.

use std::collections::BTreeSet;
use std::path::Path;

use serde::Serialize;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::reader::scan_feed;
use crate::feed::record::document_id_of;

#[derive(Debug, Clone, Serialize)]
pub struct DocumentCensus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub generated_at: String,
    pub total_records: usize,
    /// Sorted, distinct.
    pub document_ids: Vec<String>,
}

impl DocumentCensus {
    pub fn from_ids(total_records: usize, ids: BTreeSet<String>) -> Self {
        Self {
            source_path: None,
            generated_at: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            total_records,
            document_ids: ids.into_iter().collect(),
        }
    }

    pub fn unique_documents(&self) -> usize {
        self.document_ids.len()
    }

    pub fn average_records_per_document(&self) -> f64 {
        if self.document_ids.is_empty() {
            return 0.0;
        }
        self.total_records as f64 / self.document_ids.len() as f64
    }
}

/// Records whose document id is absent or blank still count toward `total_records`.
/// Ids are compared verbatim, so `" DOC1"` and `"DOC1"` are distinct documents.
pub fn count_unique_documents(path: &Path, config: &FeedConfig) -> Result<DocumentCensus, FeedError> {
    let mut ids = BTreeSet::new();
    let summary = scan_feed(path, config, |_, value| {
        if let Some(id) = value.as_object().and_then(document_id_of) {
            ids.insert(id.to_string());
        }
        Ok(())
    })?;
    let mut census = DocumentCensus::from_ids(summary.entries, ids);
    census.source_path = Some(path.display().to_string());
    Ok(census)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn counts_distinct_ids_and_ignores_missing() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":"B"}}"#).expect("write");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":"A"}}"#).expect("write");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":"B"}}"#).expect("write");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":""}}"#).expect("write");
        writeln!(file, r#"{{"OTHER":1}}"#).expect("write");

        let census = count_unique_documents(file.path(), &FeedConfig::default()).expect("census");
        assert_eq!(census.total_records, 5);
        assert_eq!(census.document_ids, vec!["A".to_string(), "B".to_string()]);
        assert!((census.average_records_per_document() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn padded_ids_are_distinct_documents() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":"DOC1"}}"#).expect("write");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":" DOC1"}}"#).expect("write");
        writeln!(file, r#"{{"RP_DOCUMENT_ID":"   "}}"#).expect("write");

        let census = count_unique_documents(file.path(), &FeedConfig::default()).expect("census");
        assert_eq!(census.document_ids, vec![" DOC1".to_string(), "DOC1".to_string()]);
    }

    #[test]
    fn empty_census_average_is_zero() {
        let census = DocumentCensus::from_ids(0, BTreeSet::new());
        assert_eq!(census.unique_documents(), 0);
        assert_eq!(census.average_records_per_document(), 0.0);
    }
}
