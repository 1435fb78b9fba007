//! Document integrity validation.
//!
//! The feed carries one record per (document, entity mention). Each record states how many
//! records its document has in total and its own 1-based position. The validator regroups the
//! flat stream by document and reports documents whose mentions don't add up.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::FeedConfig;
use crate::error::{FeedError, RecordIssue};
use crate::feed::reader::{scan_feed, ScanSummary};
use crate::feed::record::{is_valid_entity_id, FeedRecord, ENTITY_ID_LEN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingSeverity {
    /// Makes the document invalid.
    Error,
    /// Reported for diagnosis only.
    Warning,
}

impl FindingSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

impl fmt::Display for FindingSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub severity: FindingSeverity,
    pub message: String,
}

/// A run of consecutive record indices, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct IndexSpan {
    pub start: i64,
    pub end: i64,
}

impl IndexSpan {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn single(index: i64) -> Self {
        Self::new(index, index)
    }

    /// Number of indices covered. Never zero.
    pub fn count(&self) -> u64 {
        self.end.abs_diff(self.start) + 1
    }
}

impl fmt::Display for IndexSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}..={}", self.start, self.end)
        }
    }
}

/// Everything seen for one document id during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentAggregate {
    /// Taken from the first record seen for the document.
    pub declared_count: i64,
    pub observed_indices: BTreeSet<i64>,
    /// One entry per mention, in arrival order. Absent ids are kept as empty strings.
    pub entity_ids: Vec<String>,
    /// Record counts from later records that disagree with `declared_count`.
    pub conflicting_counts: BTreeSet<i64>,
}

impl DocumentAggregate {
    fn new(declared_count: i64) -> Self {
        Self {
            declared_count,
            observed_indices: BTreeSet::new(),
            entity_ids: Vec::new(),
            conflicting_counts: BTreeSet::new(),
        }
    }

    fn absorb(&mut self, record: &FeedRecord) {
        if record.record_count != self.declared_count {
            self.conflicting_counts.insert(record.record_count);
        }
        self.entity_ids.push(record.entity_id.clone().unwrap_or_default());
        self.observed_indices.insert(record.record_index);
    }

    pub fn mentions(&self) -> usize {
        self.entity_ids.len()
    }

    pub fn count_mismatch(&self) -> bool {
        usize::try_from(self.declared_count).map_or(true, |declared| declared != self.mentions())
    }

    /// Gaps in `1..=declared_count`, as spans built from the observed indices. Empty when the
    /// declared count is not positive. The result holds at most one span more than there are
    /// observed indices, whatever the declared count.
    pub fn missing_indices(&self) -> Vec<IndexSpan> {
        let mut gaps = Vec::new();
        if self.declared_count < 1 {
            return gaps;
        }
        let mut next = Some(1i64);
        for &index in self.observed_indices.range(1..=self.declared_count) {
            let Some(expected) = next else { break };
            if index > expected {
                gaps.push(IndexSpan::new(expected, index - 1));
            }
            next = index.checked_add(1);
        }
        if let Some(expected) = next.filter(|expected| *expected <= self.declared_count) {
            gaps.push(IndexSpan::new(expected, self.declared_count));
        }
        gaps
    }

    /// Observed indices outside `1..=declared_count`.
    pub fn extra_indices(&self) -> Vec<i64> {
        self.observed_indices
            .iter()
            .copied()
            .filter(|index| *index < 1 || *index > self.declared_count)
            .collect()
    }

    pub fn format_violations(&self) -> Vec<String> {
        let mut invalid: Vec<String> = self
            .entity_ids
            .iter()
            .filter(|id| !is_valid_entity_id(id))
            .cloned()
            .collect();
        invalid.sort();
        invalid.dedup();
        invalid
    }

    pub fn verdict(&self, document_id: &str) -> DocumentVerdict {
        let count_mismatch = self.count_mismatch();
        let missing_indices = self.missing_indices();
        DocumentVerdict {
            document_id: document_id.to_string(),
            declared_count: self.declared_count,
            mentions: self.mentions(),
            distinct_indices: self.observed_indices.len(),
            valid: !count_mismatch && missing_indices.is_empty(),
            count_mismatch,
            missing_count: missing_indices.iter().map(IndexSpan::count).sum(),
            missing_indices,
            extra_indices: self.extra_indices(),
            conflicting_counts: self.conflicting_counts.iter().copied().collect(),
            format_violations: self.format_violations(),
        }
    }
}

/// The finalized, read-only result for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentVerdict {
    pub document_id: String,
    pub declared_count: i64,
    pub mentions: usize,
    pub distinct_indices: usize,
    pub count_mismatch: bool,
    /// Total indices covered by `missing_indices`.
    pub missing_count: u64,
    pub missing_indices: Vec<IndexSpan>,
    pub extra_indices: Vec<i64>,
    pub conflicting_counts: Vec<i64>,
    pub format_violations: Vec<String>,
    pub valid: bool,
}

impl DocumentVerdict {
    pub fn findings(&self) -> Vec<Finding> {
        let mut findings = Vec::new();
        let mut push = |severity, message: String| findings.push(Finding { severity, message });

        if self.count_mismatch {
            push(
                FindingSeverity::Error,
                format!(
                    "record count mismatch: expected {}, found {}",
                    self.declared_count, self.mentions
                ),
            );
        }
        if !self.missing_indices.is_empty() {
            let spans: Vec<String> = self.missing_indices.iter().map(ToString::to_string).collect();
            push(
                FindingSeverity::Error,
                format!("missing record indexes: [{}]", spans.join(", ")),
            );
        }
        if !self.extra_indices.is_empty() {
            push(
                FindingSeverity::Warning,
                format!(
                    "record indexes outside 1..={}: {:?}",
                    self.declared_count, self.extra_indices
                ),
            );
        }
        if !self.conflicting_counts.is_empty() {
            push(
                FindingSeverity::Warning,
                format!(
                    "inconsistent record counts {:?} (first record declared {})",
                    self.conflicting_counts, self.declared_count
                ),
            );
        }
        for entity_id in &self.format_violations {
            push(
                FindingSeverity::Warning,
                format!("entity id '{entity_id}' is not {ENTITY_ID_LEN} base-36 characters"),
            );
        }
        findings
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub generated_at: String,
    /// Entries that parsed as JSON.
    pub records_read: usize,
    pub records_aggregated: usize,
    pub documents: Vec<DocumentVerdict>,
    /// Skipped records, in input order.
    pub issues: Vec<RecordIssue>,
}

impl ValidationReport {
    pub fn documents_checked(&self) -> usize {
        self.documents.len()
    }

    pub fn valid_documents(&self) -> usize {
        self.documents.iter().filter(|doc| doc.valid).count()
    }

    pub fn invalid_documents(&self) -> impl Iterator<Item = &DocumentVerdict> {
        self.documents.iter().filter(|doc| !doc.valid)
    }

    pub fn format_violation_count(&self) -> usize {
        self.documents
            .iter()
            .map(|doc| doc.format_violations.len())
            .sum()
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentVerdict> {
        self.documents
            .binary_search_by(|doc| doc.document_id.as_str().cmp(document_id))
            .ok()
            .map(|position| &self.documents[position])
    }

    /// Document id to finding messages. Documents without findings map to an empty list.
    pub fn findings_by_document(&self) -> BTreeMap<String, Vec<String>> {
        self.documents
            .iter()
            .map(|doc| {
                let messages = doc
                    .findings()
                    .into_iter()
                    .map(|finding| finding.message)
                    .collect();
                (doc.document_id.clone(), messages)
            })
            .collect()
    }
}

/// Regroups a record stream by document id.
#[derive(Debug, Clone)]
pub struct DocumentValidator {
    config: FeedConfig,
    documents: BTreeMap<String, DocumentAggregate>,
    records_aggregated: usize,
}

impl DocumentValidator {
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            documents: BTreeMap::new(),
            records_aggregated: 0,
        }
    }

    /// Fold one record into its document's aggregate. The first record for a document fixes
    /// its declared count; duplicate indices collapse in the index set.
    pub fn ingest(&mut self, record: &FeedRecord) {
        self.documents
            .entry(record.document_id.clone())
            .or_insert_with(|| DocumentAggregate::new(record.record_count))
            .absorb(record);
        self.records_aggregated += 1;
    }

    /// Extract and ingest a raw JSON entry. Errors are record-level and left to the caller's policy.
    pub fn ingest_value(&mut self, line: usize, value: &Value) -> Result<(), FeedError> {
        let record = FeedRecord::from_value(line, value)?;
        self.ingest(&record);
        Ok(())
    }

    pub fn document(&self, document_id: &str) -> Option<&DocumentAggregate> {
        self.documents.get(document_id)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Run a full pass over `path` and finalize.
    pub fn validate_file(mut self, path: &Path) -> Result<ValidationReport, FeedError> {
        let config = self.config.clone();
        let summary = scan_feed(path, &config, |line, value| self.ingest_value(line, &value))?;
        if self.is_empty() {
            warn!(path = %path.display(), "no document ids found");
        } else {
            debug!(documents = self.len(), "records aggregated");
        }
        let mut report = self.finalize_with(summary);
        report.source_path = Some(path.display().to_string());
        info!(
            documents = report.documents_checked(),
            valid = report.valid_documents(),
            skipped = report.issues.len(),
            "validation complete"
        );
        Ok(report)
    }

    pub fn finalize(self) -> ValidationReport {
        let records_read = self.records_aggregated;
        self.finalize_with(ScanSummary {
            format: None,
            entries: records_read,
            issues: Vec::new(),
        })
    }

    fn finalize_with(self, summary: ScanSummary) -> ValidationReport {
        let documents: Vec<DocumentVerdict> = self
            .documents
            .iter()
            .map(|(document_id, aggregate)| aggregate.verdict(document_id))
            .collect();
        for doc in documents.iter().filter(|doc| !doc.valid) {
            debug!(document_id = %doc.document_id, "document failed integrity check");
        }
        ValidationReport {
            source_path: None,
            generated_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            records_read: summary.entries,
            records_aggregated: self.records_aggregated,
            documents,
            issues: summary.issues,
        }
    }
}

/// Validate the feed at `path` with `config`.
pub fn validate_feed(path: &Path, config: &FeedConfig) -> Result<ValidationReport, FeedError> {
    DocumentValidator::new(config.clone()).validate_file(path)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn validator_with(records: &[FeedRecord]) -> DocumentValidator {
        let mut validator = DocumentValidator::new(FeedConfig::default());
        for record in records {
            validator.ingest(record);
        }
        validator
    }

    #[test]
    fn complete_document_is_valid() {
        let report = validator_with(&[
            FeedRecord::new("DOC1", "99D862", 3, 1),
            FeedRecord::new("DOC1", "C204FE", 3, 2),
            FeedRecord::new("DOC1", "A1B2C3", 3, 3),
        ])
        .finalize();

        let doc = report.document("DOC1").expect("DOC1 aggregated");
        assert!(doc.valid);
        assert!(!doc.count_mismatch);
        assert!(doc.missing_indices.is_empty());
        assert!(doc.extra_indices.is_empty());
        assert!(doc.findings().is_empty());
        assert_eq!(report.invalid_documents().count(), 0);
    }

    #[test]
    fn missing_record_reports_mismatch_and_missing_index() {
        let report = validator_with(&[
            FeedRecord::new("DOC2", "99D862", 3, 1),
            FeedRecord::new("DOC2", "C204FE", 3, 3),
        ])
        .finalize();

        let doc = report.document("DOC2").expect("DOC2 aggregated");
        assert!(!doc.valid);
        assert!(doc.count_mismatch);
        assert_eq!(doc.mentions, 2);
        assert_eq!(doc.missing_indices, vec![IndexSpan::single(2)]);
        let messages = &report.findings_by_document()["DOC2"];
        assert_eq!(messages[0], "record count mismatch: expected 3, found 2");
        assert_eq!(messages[1], "missing record indexes: [2]");
    }

    #[test]
    fn duplicate_index_is_a_plain_count_mismatch() {
        let validator = validator_with(&[
            FeedRecord::new("DOC3", "99D862", 3, 1),
            FeedRecord::new("DOC3", "C204FE", 3, 2),
            FeedRecord::new("DOC3", "C204FE", 3, 2),
            FeedRecord::new("DOC3", "A1B2C3", 3, 3),
        ]);
        let aggregate = validator.document("DOC3").expect("aggregated");
        assert_eq!(aggregate.entity_ids.len(), 4);
        assert_eq!(aggregate.observed_indices, BTreeSet::from([1, 2, 3]));

        let report = validator.finalize();
        let doc = report.document("DOC3").expect("DOC3");
        assert!(doc.count_mismatch);
        assert!(doc.missing_indices.is_empty());
        assert!(doc.extra_indices.is_empty());
        assert!(!doc.valid);
    }

    #[test]
    fn out_of_range_indices_are_extra_but_not_fatal_alone() {
        let report = validator_with(&[
            FeedRecord::new("DOC4", "99D862", 2, 1),
            FeedRecord::new("DOC4", "C204FE", 2, 5),
        ])
        .finalize();
        let doc = report.document("DOC4").expect("DOC4");
        assert_eq!(doc.extra_indices, vec![5]);
        assert_eq!(doc.missing_indices, vec![IndexSpan::single(2)]);
        assert!(!doc.valid);

        let zero = validator_with(&[FeedRecord::new("DOC5", "99D862", 0, 0)]).finalize();
        let doc = zero.document("DOC5").expect("DOC5");
        assert!(doc.missing_indices.is_empty());
        assert_eq!(doc.extra_indices, vec![0]);
        assert!(doc.count_mismatch);
    }

    #[test]
    fn missing_indices_collapse_into_spans() {
        let report = validator_with(&[
            FeedRecord::new("DOC8", "99D862", 10, 3),
            FeedRecord::new("DOC8", "C204FE", 10, 4),
            FeedRecord::new("DOC8", "A1B2C3", 10, 8),
        ])
        .finalize();
        let doc = report.document("DOC8").expect("DOC8");
        assert_eq!(
            doc.missing_indices,
            vec![IndexSpan::new(1, 2), IndexSpan::new(5, 7), IndexSpan::new(9, 10)]
        );
        assert_eq!(doc.missing_count, 7);
        assert_eq!(
            doc.findings()[1].message,
            "missing record indexes: [1..=2, 5..=7, 9..=10]"
        );
    }

    #[test]
    fn huge_declared_count_is_reported_without_enumerating() {
        let report = validator_with(&[
            FeedRecord::new("DOC9", "99D862", i64::MAX, 1),
            FeedRecord::new("DOC9", "C204FE", i64::MAX, i64::MAX),
        ])
        .finalize();
        let doc = report.document("DOC9").expect("DOC9");
        assert!(!doc.valid);
        assert!(doc.count_mismatch);
        assert_eq!(doc.missing_indices, vec![IndexSpan::new(2, i64::MAX - 1)]);
        assert_eq!(doc.missing_count, (i64::MAX - 2) as u64);
        assert!(doc.extra_indices.is_empty());

        let lone = validator_with(&[FeedRecord::new("DOC10", "99D862", i64::MAX, 1)]).finalize();
        let doc = lone.document("DOC10").expect("DOC10");
        assert_eq!(doc.missing_indices, vec![IndexSpan::new(2, i64::MAX)]);
        assert_eq!(doc.missing_count, (i64::MAX - 1) as u64);
    }

    #[test]
    fn non_positive_declared_count_has_empty_expected_range() {
        let aggregate = DocumentAggregate::new(-3);
        assert!(aggregate.missing_indices().is_empty());
        assert!(aggregate.count_mismatch());
    }

    #[test]
    fn format_violations_do_not_affect_validity() {
        let report = validator_with(&[
            FeedRecord::new("DOC6", "12345", 2, 1),
            FeedRecord::new("DOC6", "12345G!", 2, 2),
        ])
        .finalize();
        let doc = report.document("DOC6").expect("DOC6");
        assert!(doc.valid);
        assert_eq!(doc.format_violations, vec!["12345".to_string(), "12345G!".to_string()]);
        assert_eq!(report.format_violation_count(), 2);
        assert_eq!(doc.findings().len(), 2);
        assert!(doc
            .findings()
            .iter()
            .all(|finding| finding.severity == FindingSeverity::Warning));
    }

    #[test]
    fn later_disagreeing_record_count_is_reported_but_first_wins() {
        let report = validator_with(&[
            FeedRecord::new("DOC7", "99D862", 2, 1),
            FeedRecord::new("DOC7", "C204FE", 4, 2),
        ])
        .finalize();
        let doc = report.document("DOC7").expect("DOC7");
        assert_eq!(doc.declared_count, 2);
        assert_eq!(doc.conflicting_counts, vec![4]);
        assert!(doc.valid);
    }

    #[test]
    fn ingest_value_rejects_records_without_document_id() {
        let mut validator = DocumentValidator::new(FeedConfig::default());
        let err = validator
            .ingest_value(
                1,
                &json!({"RP_ENTITY_ID": "99D862", "DOCUMENT_RECORD_COUNT": 1, "DOCUMENT_RECORD_INDEX": 1}),
            )
            .unwrap_err();
        assert!(matches!(err, FeedError::MissingRequiredField { .. }));
        assert!(validator.is_empty());
    }

    #[test]
    fn absent_entity_id_counts_as_a_mention_and_a_format_violation() {
        let mut validator = DocumentValidator::new(FeedConfig::default());
        validator
            .ingest_value(
                1,
                &json!({"RP_DOCUMENT_ID": "DOC8", "DOCUMENT_RECORD_COUNT": 1, "DOCUMENT_RECORD_INDEX": 1}),
            )
            .expect("valid record");
        let report = validator.finalize();
        let doc = report.document("DOC8").expect("DOC8");
        assert!(doc.valid);
        assert_eq!(doc.format_violations, vec![String::new()]);
    }

    #[test]
    fn report_documents_are_sorted_by_id() {
        let report = validator_with(&[
            FeedRecord::new("b", "99D862", 1, 1),
            FeedRecord::new("a", "99D862", 1, 1),
            FeedRecord::new("c", "99D862", 1, 1),
        ])
        .finalize();
        let ids: Vec<&str> = report
            .documents
            .iter()
            .map(|doc| doc.document_id.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.records_aggregated, 3);
        assert_eq!(report.valid_documents(), 3);
    }
}
