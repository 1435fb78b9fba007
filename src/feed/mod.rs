//! The news-analytics feed: record model, input reader, integrity validation and statistics.

pub mod census;
pub mod normalize;
pub mod reader;
pub mod record;
pub mod report;
pub mod stats;
pub mod validator;

pub use census::{count_unique_documents, DocumentCensus};
pub use normalize::{normalize_feed, FieldProfile, FieldStructure, NormalizeOutputs, NormalizedFeed};
pub use reader::{scan_entries, scan_feed, FeedEntries, FeedEntry, ScanSummary};
pub use record::{document_id_of, entity_id_text, is_valid_entity_id, FeedRecord, MentionDetails};
pub use stats::{collect_statistics, DocumentTally, IdAlphabet, StatisticsCollector, StatisticsReport};
pub use validator::{
    validate_feed, DocumentAggregate, DocumentValidator, DocumentVerdict, Finding,
    FindingSeverity, IndexSpan, ValidationReport,
};
