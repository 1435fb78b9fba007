//! Report output: human-readable text, JSON and CSV.
//!
//! Text layouts are for people and may change; the JSON and CSV forms carry the findings.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io;

use serde::Serialize;

use crate::error::FeedError;
use crate::feed::census::DocumentCensus;
use crate::feed::normalize::FieldStructure;
use crate::feed::stats::{percentage, StatisticsReport};
use crate::feed::validator::{DocumentVerdict, ValidationReport};

const RULE: &str = "============================================================";
const CENSUS_PREVIEW: usize = 5;
const MOST_NULL_FIELDS: usize = 10;
const TITLE_WIDTH: usize = 60;

/// Machine-readable validation output: the full report plus the document to findings map.
#[derive(Debug, Serialize)]
pub struct ValidationOutput<'a> {
    pub documents_checked: usize,
    pub valid_documents: usize,
    pub invalid_documents: usize,
    pub format_violations: usize,
    pub findings: BTreeMap<String, Vec<String>>,
    #[serde(flatten)]
    pub report: &'a ValidationReport,
}

impl<'a> ValidationOutput<'a> {
    pub fn new(report: &'a ValidationReport) -> Self {
        Self {
            documents_checked: report.documents_checked(),
            valid_documents: report.valid_documents(),
            invalid_documents: report.invalid_documents().count(),
            format_violations: report.format_violation_count(),
            findings: report.findings_by_document(),
            report,
        }
    }
}

pub fn validation_json(report: &ValidationReport) -> Result<String, FeedError> {
    to_json_pretty(&ValidationOutput::new(report))
}

pub fn to_json_pretty<T: Serialize + ?Sized>(value: &T) -> Result<String, FeedError> {
    Ok(serde_json::to_string_pretty(value)?)
}

pub fn render_validation_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== DOCUMENT INTEGRITY REPORT ===");
    if let Some(path) = &report.source_path {
        let _ = writeln!(out, "Source: {path}");
    }
    let _ = writeln!(out, "Generated: {}", report.generated_at);
    let _ = writeln!(out, "Records read: {}", report.records_read);
    let _ = writeln!(out, "Records aggregated: {}", report.records_aggregated);
    let _ = writeln!(out, "Records skipped: {}", report.issues.len());
    let _ = writeln!(
        out,
        "Documents: {} checked, {} valid, {} invalid",
        report.documents_checked(),
        report.valid_documents(),
        report.invalid_documents().count()
    );
    let _ = writeln!(out, "Entity id format violations: {}", report.format_violation_count());

    let flagged: Vec<&DocumentVerdict> = report
        .documents
        .iter()
        .filter(|doc| !doc.findings().is_empty())
        .collect();
    if !flagged.is_empty() {
        let _ = writeln!(out, "\n=== FINDINGS ===");
        for doc in flagged {
            let _ = writeln!(
                out,
                "{} [{}]",
                doc.document_id,
                if doc.valid { "valid" } else { "INVALID" }
            );
            for finding in doc.findings() {
                let _ = writeln!(out, "  - {}: {}", finding.severity, finding.message);
            }
        }
    }

    if !report.issues.is_empty() {
        let _ = writeln!(out, "\n=== SKIPPED RECORDS ===");
        for issue in &report.issues {
            let _ = writeln!(out, "  {issue}");
        }
    }
    out
}

/// One row per document.
pub fn write_validation_csv<W: io::Write>(report: &ValidationReport, writer: W) -> Result<(), FeedError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record([
        "document_id",
        "declared_count",
        "mentions",
        "distinct_indices",
        "count_mismatch",
        "missing_indices",
        "extra_indices",
        "conflicting_counts",
        "format_violations",
        "valid",
    ])?;
    for doc in &report.documents {
        csv.write_record([
            doc.document_id.clone(),
            doc.declared_count.to_string(),
            doc.mentions.to_string(),
            doc.distinct_indices.to_string(),
            doc.count_mismatch.to_string(),
            join_values(&doc.missing_indices),
            join_values(&doc.extra_indices),
            join_values(&doc.conflicting_counts),
            doc.format_violations.join(" "),
            doc.valid.to_string(),
        ])?;
    }
    csv.flush().map_err(|err| FeedError::Serialize(err.to_string()))?;
    Ok(())
}

pub fn render_statistics_text(report: &StatisticsReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== FEED STATISTICS ===");
    if let Some(path) = &report.source_path {
        let _ = writeln!(out, "Source: {path}");
    }
    let _ = writeln!(out, "Total records: {}", report.total_records);
    let _ = writeln!(out, "Unique documents: {}", report.unique_documents);
    let _ = writeln!(out, "Unique entities: {}", report.unique_entities);
    let _ = writeln!(
        out,
        "Average mentions per document: {:.2}",
        report.average_mentions_per_document()
    );

    let _ = writeln!(out, "\n=== NULL RATES ===");
    for rate in &report.fields {
        let _ = writeln!(
            out,
            "{:<22} null {:>8} ({:>5.1}%)  present {:>8}",
            rate.field, rate.null, rate.null_pct, rate.non_null
        );
    }

    let _ = writeln!(out, "\n=== ENTITY ID FORMAT ===");
    let _ = writeln!(out, "Entity ids seen: {}", report.entity_ids_seen);
    let _ = writeln!(
        out,
        "Well-formed (6 base-36 chars): {} ({:.1}%)",
        report.well_formed_entity_ids,
        percentage(report.well_formed_entity_ids, report.entity_ids_seen)
    );
    let _ = writeln!(
        out,
        "Pure hexadecimal: {} ({:.1}%)",
        report.hex_entity_ids,
        percentage(report.hex_entity_ids, report.entity_ids_seen)
    );
    let alphabet: String = report.entity_id_alphabet.iter().collect();
    let _ = writeln!(
        out,
        "Alphabet ({} chars): {alphabet}",
        report.entity_id_alphabet.len()
    );
    let _ = writeln!(out, "Encoding: {}", report.entity_id_encoding.label());
    for (length, count) in &report.entity_id_lengths {
        let _ = writeln!(out, "  {length} characters: {count}");
    }
    if !report.entity_char_frequency.is_empty() {
        let _ = writeln!(out, "Most frequent characters:");
        let total_chars: usize = report.entity_id_lengths.iter().map(|(len, n)| len * n).sum();
        for entry in &report.entity_char_frequency {
            let _ = writeln!(
                out,
                "  {}: {} ({:.2}%)",
                entry.value,
                entry.count,
                percentage(entry.count, total_chars)
            );
        }
    }
    for position in &report.entity_id_positions {
        let common: Vec<String> = position
            .most_common
            .iter()
            .map(|entry| format!("{}({})", entry.value, entry.count))
            .collect();
        let _ = writeln!(
            out,
            "  position {}: {} distinct, most common {}",
            position.position,
            position.distinct,
            common.join(", ")
        );
    }

    let _ = writeln!(out, "\n=== DOCUMENT ID FORMAT ===");
    for (length, count) in &report.document_id_lengths {
        let _ = writeln!(out, "  {length} characters: {count} documents");
    }
    let _ = writeln!(
        out,
        "Hexadecimal ids: {}/{} ({:.1}%)",
        report.hex_document_ids,
        report.unique_documents,
        percentage(report.hex_document_ids, report.unique_documents)
    );
    let alphabet: String = report.document_id_alphabet.iter().collect();
    let _ = writeln!(
        out,
        "Alphabet ({} chars): {alphabet}",
        report.document_id_alphabet.len()
    );
    let _ = writeln!(out, "Encoding: {}", report.document_id_encoding.label());

    let _ = writeln!(out, "\n=== MOST MENTIONED ENTITIES ===");
    for (rank, entity) in report.top_entities.iter().enumerate() {
        let _ = writeln!(
            out,
            "{:>2}. {} | {} ({}) | {} mentions",
            rank + 1,
            entity.entity_id,
            entity.name.as_deref().unwrap_or("-"),
            entity.entity_type.as_deref().unwrap_or("-"),
            entity.mentions
        );
    }

    let _ = writeln!(out, "\n=== DOCUMENTS WITH MOST MENTIONS ===");
    for (rank, doc) in report.top_documents.iter().enumerate() {
        let title: String = doc.title.as_deref().unwrap_or("-").chars().take(TITLE_WIDTH).collect();
        let _ = writeln!(out, "{:>2}. {} mentions | {title}", rank + 1, doc.mentions);
        let _ = writeln!(out, "     id: {}", doc.document_id);
        let _ = writeln!(
            out,
            "     source: {} | published: {}",
            doc.source.as_deref().unwrap_or("-"),
            doc.timestamp_utc.as_deref().unwrap_or("-")
        );
        let _ = writeln!(
            out,
            "     words: {}, paragraphs: {}",
            optional(doc.word_count),
            optional(doc.paragraph_count)
        );
        if doc.average_relevance.is_some() || doc.average_sentiment.is_some() {
            let _ = writeln!(
                out,
                "     avg relevance: {}, avg sentiment: {}",
                doc.average_relevance.map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
                doc.average_sentiment.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
            );
        }
    }

    let _ = writeln!(out, "\n=== UNIQUE ENTITIES BY TYPE ===");
    for (entity_type, count) in &report.unique_entities_by_type {
        let _ = writeln!(out, "{entity_type}: {count}");
    }

    let _ = writeln!(out, "\n=== MENTIONS PER DOCUMENT ===");
    for (mentions, documents) in &report.mentions_per_document {
        let _ = writeln!(
            out,
            "{:>6} | {} documents ({:.1}%)",
            mentions,
            documents,
            percentage(*documents, report.unique_documents)
        );
    }

    for (title, ranked) in [
        ("DOCUMENT TYPES", &report.document_types),
        ("LANGUAGES", &report.languages),
        ("SOURCES", &report.sources),
    ] {
        let _ = writeln!(out, "\n=== {title} ===");
        for entry in ranked {
            let _ = writeln!(
                out,
                "{}: {} documents ({:.1}%)",
                entry.value,
                entry.count,
                percentage(entry.count, report.unique_documents)
            );
        }
    }
    out
}

pub fn render_census_text(census: &DocumentCensus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "UNIQUE RP_DOCUMENT_ID");
    let _ = writeln!(out, "Total records processed: {}", census.total_records);
    let _ = writeln!(out, "Unique documents: {}", census.unique_documents());
    let _ = writeln!(
        out,
        "Average records per document: {:.2}",
        census.average_records_per_document()
    );
    let _ = writeln!(out, "Generated: {}", census.generated_at);
    let _ = writeln!(out, "{RULE}\n");
    for (position, document_id) in census.document_ids.iter().enumerate() {
        let _ = writeln!(out, "{:3}. {document_id}", position + 1);
    }
    out
}

/// Short console form of a census: the first few ids only.
pub fn render_census_preview(census: &DocumentCensus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Total records processed: {}", census.total_records);
    let _ = writeln!(out, "Unique documents: {}", census.unique_documents());
    for (position, document_id) in census.document_ids.iter().take(CENSUS_PREVIEW).enumerate() {
        let _ = writeln!(out, "{}. {document_id}", position + 1);
    }
    if census.unique_documents() > CENSUS_PREVIEW {
        let _ = writeln!(out, "... and {} more", census.unique_documents() - CENSUS_PREVIEW);
    }
    out
}

pub fn render_structure_summary(structure: &FieldStructure) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== DATA STRUCTURE ANALYSIS ===\n");
    let _ = writeln!(out, "Total records: {}", structure.total_records);
    let _ = writeln!(out, "Total fields: {}\n", structure.fields.len());
    let _ = writeln!(out, "=== FIELDS AND DATA TYPES ===\n");
    for (name, profile) in &structure.fields {
        let types: Vec<&str> = profile.data_types.iter().copied().collect();
        let _ = writeln!(out, "Field: {name}");
        let _ = writeln!(out, "  Types: {}", types.join(", "));
        let _ = writeln!(
            out,
            "  Null values: {} ({:.1}%)",
            profile.null_values, profile.null_percentage
        );
        if !profile.value_examples.is_empty() {
            let examples: Vec<String> = profile.value_examples.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "  Examples: {}", examples.join(", "));
        }
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "=== FIELDS WITH MOST NULL VALUES ===\n");
    for (name, profile) in structure.most_null_fields(MOST_NULL_FIELDS) {
        let _ = writeln!(
            out,
            "  {name}: {} ({:.1}%)",
            profile.null_values, profile.null_percentage
        );
    }
    let types: Vec<&str> = structure.all_types().into_iter().collect();
    let _ = writeln!(out, "\nData types found: {}", types.join(", "));
    out
}

fn optional(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

fn join_values<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}
