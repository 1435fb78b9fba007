//! Descriptive statistics over a feed: null rates, identifier shapes, entity and document
//! distributions. One pass builds count maps; [`StatisticsCollector::finish`] freezes them
//! into a serializable [`StatisticsReport`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::feed::reader::scan_feed;
use crate::feed::record::{
    document_id_of, entity_id_text, is_null_field, is_valid_entity_id, json_type_name,
    MentionDetails, ENTITY_ID, ENTITY_ID_LEN, TRACKED_FIELDS,
};

const UNKNOWN: &str = "(none)";
const HEX_DIGITS: &str = "0123456789ABCDEF";
const POSITION_TOP: usize = 3;
const TOP_DOCUMENTS: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldPresence {
    pub null: usize,
    pub non_null: usize,
}

impl FieldPresence {
    pub fn total(&self) -> usize {
        self.null + self.non_null
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldNullRate {
    pub field: String,
    pub null: usize,
    pub non_null: usize,
    pub null_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityTally {
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    pub mentions: usize,
}

/// A document ranked by mentions, with descriptive fields from its first record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentTally {
    pub document_id: String,
    pub mentions: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_utc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_count: Option<i64>,
    /// Mean over the mentions that carry a relevance score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_relevance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_sentiment: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionSummary {
    /// 1-based character position.
    pub position: usize,
    pub distinct: usize,
    pub most_common: Vec<RankedCount>,
}

/// Narrowest alphabet that covers every (uppercase-folded) identifier character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IdAlphabet {
    Empty,
    Decimal,
    Hexadecimal,
    Alphabetic,
    Base36,
    Custom { outside_base36: Vec<char> },
}

impl IdAlphabet {
    pub fn classify(chars: &BTreeSet<char>) -> Self {
        if chars.is_empty() {
            return Self::Empty;
        }
        if chars.iter().all(char::is_ascii_digit) {
            return Self::Decimal;
        }
        if chars.iter().all(|ch| HEX_DIGITS.contains(*ch)) {
            return Self::Hexadecimal;
        }
        if chars.iter().all(char::is_ascii_uppercase) {
            return Self::Alphabetic;
        }
        let outside: Vec<char> = chars
            .iter()
            .copied()
            .filter(|ch| !(ch.is_ascii_digit() || ch.is_ascii_uppercase()))
            .collect();
        if outside.is_empty() {
            Self::Base36
        } else {
            Self::Custom {
                outside_base36: outside,
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Empty => "no identifiers".to_string(),
            Self::Decimal => "decimal (0-9)".to_string(),
            Self::Hexadecimal => "hexadecimal (0-9, A-F)".to_string(),
            Self::Alphabetic => "alphabetic (A-Z)".to_string(),
            Self::Base36 => "base-36 (0-9, A-Z)".to_string(),
            Self::Custom { outside_base36 } => {
                let extra: String = outside_base36.iter().collect();
                format!("custom (characters outside base-36: {extra})")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    samples: usize,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(value) = value {
            self.sum += value;
            self.samples += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

#[derive(Debug, Clone, Default)]
struct DocumentProfile {
    mentions: usize,
    /// Descriptive fields of the first record seen for the document.
    first: MentionDetails,
    relevance: Mean,
    sentiment: Mean,
}

/// Accumulates counts over one pass.
#[derive(Debug, Clone, Default)]
pub struct StatisticsCollector {
    total_records: usize,
    field_presence: BTreeMap<&'static str, FieldPresence>,
    entity_id_lengths: BTreeMap<usize, usize>,
    entity_chars: BTreeMap<char, usize>,
    entity_positions: Vec<BTreeMap<char, usize>>,
    entity_ids_seen: usize,
    hex_entity_ids: usize,
    well_formed_entity_ids: usize,
    entities: HashMap<String, EntityTally>,
    entity_types: BTreeMap<String, BTreeSet<String>>,
    documents: HashMap<String, DocumentProfile>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self {
            entity_positions: vec![BTreeMap::new(); ENTITY_ID_LEN],
            ..Self::default()
        }
    }

    pub fn total_records(&self) -> usize {
        self.total_records
    }

    pub fn observe_value(&mut self, line: usize, value: &Value) -> Result<(), FeedError> {
        let Some(object) = value.as_object() else {
            return Err(FeedError::MalformedLine {
                line,
                reason: format!("expected a JSON object, found {}", json_type_name(value)),
            });
        };
        self.observe(object);
        Ok(())
    }

    pub fn observe(&mut self, object: &Map<String, Value>) {
        self.total_records += 1;
        for field in TRACKED_FIELDS {
            let presence = self.field_presence.entry(field).or_default();
            if is_null_field(object, field) {
                presence.null += 1;
            } else {
                presence.non_null += 1;
            }
        }

        let details = MentionDetails::from_object(object);
        let entity_id = object
            .get(ENTITY_ID)
            .and_then(entity_id_text)
            .filter(|id| !id.is_empty());
        if let Some(entity_id) = entity_id {
            self.observe_entity_id(&entity_id, &details);
        }

        if let Some(document_id) = document_id_of(object) {
            let profile = self
                .documents
                .entry(document_id.to_string())
                .or_insert_with(|| DocumentProfile {
                    first: details.clone(),
                    ..DocumentProfile::default()
                });
            profile.mentions += 1;
            profile.relevance.add(details.entity_relevance);
            profile.sentiment.add(details.entity_sentiment);
        }
    }

    fn observe_entity_id(&mut self, entity_id: &str, details: &MentionDetails) {
        self.entity_ids_seen += 1;
        *self
            .entity_id_lengths
            .entry(entity_id.chars().count())
            .or_insert(0) += 1;

        let folded = entity_id.to_uppercase();
        for (position, ch) in folded.chars().enumerate() {
            *self.entity_chars.entry(ch).or_insert(0) += 1;
            if let Some(slot) = self.entity_positions.get_mut(position) {
                *slot.entry(ch).or_insert(0) += 1;
            }
        }
        if folded.chars().all(|ch| HEX_DIGITS.contains(ch)) {
            self.hex_entity_ids += 1;
        }
        if is_valid_entity_id(entity_id) {
            self.well_formed_entity_ids += 1;
        }

        let tally = self
            .entities
            .entry(entity_id.to_string())
            .or_insert_with(|| EntityTally {
                entity_id: entity_id.to_string(),
                name: details.entity_name.clone(),
                entity_type: details.entity_type.clone(),
                country: details.country_code.clone(),
                mentions: 0,
            });
        tally.mentions += 1;

        let entity_type = details
            .entity_type
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string());
        self.entity_types
            .entry(entity_type)
            .or_default()
            .insert(entity_id.to_string());
    }

    pub fn finish(self, top_k: usize) -> StatisticsReport {
        let total = self.total_records;
        let fields = TRACKED_FIELDS
            .iter()
            .map(|field| {
                let presence = self.field_presence.get(field).copied().unwrap_or_default();
                FieldNullRate {
                    field: field.to_string(),
                    null: presence.null,
                    non_null: presence.non_null,
                    null_pct: percentage(presence.null, presence.total()),
                }
            })
            .collect();

        let alphabet: BTreeSet<char> = self.entity_chars.keys().copied().collect();
        let entity_id_positions = self
            .entity_positions
            .iter()
            .enumerate()
            .filter(|(_, counts)| !counts.is_empty())
            .map(|(position, counts)| PositionSummary {
                position: position + 1,
                distinct: counts.len(),
                most_common: rank(counts.iter().map(|(ch, n)| (ch.to_string(), *n)), POSITION_TOP),
            })
            .collect();

        let mut top_entities: Vec<EntityTally> = self.entities.into_values().collect();
        top_entities.sort_by(|a, b| {
            b.mentions
                .cmp(&a.mentions)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        let unique_entities = top_entities.len();
        top_entities.truncate(top_k);

        let mut document_id_lengths = BTreeMap::new();
        let mut document_chars = BTreeSet::new();
        let mut hex_document_ids = 0;
        let mut mentions_per_document = BTreeMap::new();
        let mut document_types = HashMap::new();
        let mut languages = HashMap::new();
        let mut sources = HashMap::new();
        for (document_id, profile) in &self.documents {
            *document_id_lengths
                .entry(document_id.chars().count())
                .or_insert(0) += 1;
            let folded = document_id.to_uppercase();
            if folded.chars().all(|ch| HEX_DIGITS.contains(ch)) {
                hex_document_ids += 1;
            }
            document_chars.extend(folded.chars());
            *mentions_per_document.entry(profile.mentions).or_insert(0) += 1;
            *document_types.entry(label(&profile.first.document_type)).or_insert(0) += 1;
            *languages.entry(label(&profile.first.original_language)).or_insert(0) += 1;
            *sources.entry(label(&profile.first.source_name)).or_insert(0) += 1;
        }

        let mut top_documents: Vec<DocumentTally> = self
            .documents
            .iter()
            .map(|(document_id, profile)| DocumentTally {
                document_id: document_id.clone(),
                mentions: profile.mentions,
                title: profile.first.title.clone(),
                timestamp_utc: profile.first.timestamp_utc.clone(),
                source: profile.first.source_name.clone(),
                word_count: profile.first.word_count,
                paragraph_count: profile.first.paragraph_count,
                average_relevance: profile.relevance.value(),
                average_sentiment: profile.sentiment.value(),
            })
            .collect();
        top_documents.sort_by(|a, b| {
            b.mentions
                .cmp(&a.mentions)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        top_documents.truncate(TOP_DOCUMENTS.min(top_k));

        StatisticsReport {
            source_path: None,
            generated_at: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            total_records: total,
            unique_documents: self.documents.len(),
            unique_entities,
            fields,
            entity_ids_seen: self.entity_ids_seen,
            well_formed_entity_ids: self.well_formed_entity_ids,
            hex_entity_ids: self.hex_entity_ids,
            entity_id_lengths: self.entity_id_lengths,
            document_id_lengths,
            hex_document_ids,
            document_id_encoding: IdAlphabet::classify(&document_chars),
            document_id_alphabet: document_chars.into_iter().collect(),
            entity_id_encoding: IdAlphabet::classify(&alphabet),
            entity_id_alphabet: alphabet.into_iter().collect(),
            entity_char_frequency: rank(
                self.entity_chars.iter().map(|(ch, n)| (ch.to_string(), *n)),
                top_k,
            ),
            entity_id_positions,
            top_entities,
            top_documents,
            unique_entities_by_type: self
                .entity_types
                .into_iter()
                .map(|(entity_type, ids)| (entity_type, ids.len()))
                .collect(),
            mentions_per_document,
            document_types: rank(document_types, top_k),
            languages: rank(languages, top_k),
            sources: rank(sources, top_k),
        }
    }
}

/// Read-only result of a statistics pass.
#[derive(Debug, Clone, Serialize)]
pub struct StatisticsReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    pub generated_at: String,
    pub total_records: usize,
    pub unique_documents: usize,
    pub unique_entities: usize,
    pub fields: Vec<FieldNullRate>,
    pub entity_ids_seen: usize,
    pub well_formed_entity_ids: usize,
    pub hex_entity_ids: usize,
    pub entity_id_lengths: BTreeMap<usize, usize>,
    pub document_id_lengths: BTreeMap<usize, usize>,
    /// Unique document ids made only of hexadecimal digits.
    pub hex_document_ids: usize,
    pub document_id_encoding: IdAlphabet,
    pub document_id_alphabet: Vec<char>,
    pub entity_id_encoding: IdAlphabet,
    pub entity_id_alphabet: Vec<char>,
    pub entity_char_frequency: Vec<RankedCount>,
    pub entity_id_positions: Vec<PositionSummary>,
    pub top_entities: Vec<EntityTally>,
    pub top_documents: Vec<DocumentTally>,
    pub unique_entities_by_type: BTreeMap<String, usize>,
    /// Mentions in a document to number of documents with that many mentions.
    pub mentions_per_document: BTreeMap<usize, usize>,
    pub document_types: Vec<RankedCount>,
    pub languages: Vec<RankedCount>,
    pub sources: Vec<RankedCount>,
}

impl StatisticsReport {
    pub fn field(&self, name: &str) -> Option<&FieldNullRate> {
        self.fields.iter().find(|rate| rate.field == name)
    }

    pub fn average_mentions_per_document(&self) -> f64 {
        let mentions: usize = self
            .mentions_per_document
            .iter()
            .map(|(mentions, docs)| mentions * docs)
            .sum();
        ratio(mentions, self.unique_documents)
    }
}

pub fn collect_statistics(path: &Path, config: &FeedConfig) -> Result<StatisticsReport, FeedError> {
    let mut collector = StatisticsCollector::new();
    scan_feed(path, config, |line, value| collector.observe_value(line, &value))?;
    let mut report = collector.finish(config.top_k);
    report.source_path = Some(path.display().to_string());
    Ok(report)
}

/// Sort by count descending, then value ascending, and keep `limit` entries.
pub fn rank<K, I>(counts: I, limit: usize) -> Vec<RankedCount>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, usize)>,
{
    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(value, count)| RankedCount {
            value: value.into(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    ranked.truncate(limit);
    ranked
}

pub fn percentage(part: usize, total: usize) -> f64 {
    ratio(part * 100, total)
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn label(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| UNKNOWN.to_string())
}
