//! Typed view of one feed record: one (document, entity mention) pair.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::FeedError;

pub const DOCUMENT_ID: &str = "RP_DOCUMENT_ID";
pub const ENTITY_ID: &str = "RP_ENTITY_ID";
pub const RECORD_COUNT: &str = "DOCUMENT_RECORD_COUNT";
pub const RECORD_INDEX: &str = "DOCUMENT_RECORD_INDEX";

pub const ENTITY_NAME: &str = "ENTITY_NAME";
pub const ENTITY_TYPE: &str = "ENTITY_TYPE";
pub const ENTITY_RELEVANCE: &str = "ENTITY_RELEVANCE";
pub const ENTITY_SENTIMENT: &str = "ENTITY_SENTIMENT";
pub const TITLE: &str = "TITLE";
pub const TIMESTAMP_UTC: &str = "TIMESTAMP_UTC";
pub const SOURCE_NAME: &str = "SOURCE_NAME";
pub const WORD_COUNT: &str = "WORD_COUNT";
pub const PARAGRAPH_COUNT: &str = "PARAGRAPH_COUNT";
pub const DOCUMENT_TYPE: &str = "DOCUMENT_TYPE";
pub const ORIGINAL_LANGUAGE: &str = "ORIGINAL_LANGUAGE";
pub const COUNTRY_CODE: &str = "COUNTRY_CODE";

/// Fields the statistics pass reports null rates for, in report order.
pub const TRACKED_FIELDS: &[&str] = &[
    DOCUMENT_ID,
    ENTITY_ID,
    RECORD_COUNT,
    RECORD_INDEX,
    ENTITY_NAME,
    ENTITY_TYPE,
    ENTITY_RELEVANCE,
    ENTITY_SENTIMENT,
    TITLE,
    TIMESTAMP_UTC,
    SOURCE_NAME,
    WORD_COUNT,
    PARAGRAPH_COUNT,
    DOCUMENT_TYPE,
    ORIGINAL_LANGUAGE,
    COUNTRY_CODE,
];

pub const ENTITY_ID_LEN: usize = 6;

/// Exactly six characters, each in `0-9A-Z` once folded to uppercase.
pub fn is_valid_entity_id(id: &str) -> bool {
    id.chars().count() == ENTITY_ID_LEN
        && id
            .chars()
            .map(|ch| ch.to_ascii_uppercase())
            .all(|ch| ch.is_ascii_digit() || ch.is_ascii_uppercase())
}

/// The fields the integrity validator consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedRecord {
    pub document_id: String,
    pub entity_id: Option<String>,
    pub record_count: i64,
    pub record_index: i64,
}

impl FeedRecord {
    pub fn new(
        document_id: impl Into<String>,
        entity_id: impl Into<String>,
        record_count: i64,
        record_index: i64,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            entity_id: Some(entity_id.into()),
            record_count,
            record_index,
        }
    }

    /// Extract the required fields from a parsed JSON value.
    ///
    /// `line` is the 1-based line (NDJSON) or element position (array) used in errors.
    pub fn from_value(line: usize, value: &Value) -> Result<Self, FeedError> {
        let Some(object) = value.as_object() else {
            return Err(FeedError::MalformedLine {
                line,
                reason: format!("expected a JSON object, found {}", json_type_name(value)),
            });
        };
        Self::from_object(line, object)
    }

    pub fn from_object(line: usize, object: &Map<String, Value>) -> Result<Self, FeedError> {
        if let Some(other) = object.get(DOCUMENT_ID).filter(|id| !id.is_null() && !id.is_string()) {
            return Err(FeedError::MalformedLine {
                line,
                reason: format!("'{DOCUMENT_ID}' must be a string, found {}", json_type_name(other)),
            });
        }
        let Some(document_id) = document_id_of(object) else {
            return Err(FeedError::MissingRequiredField {
                line,
                field: DOCUMENT_ID,
            });
        };

        let entity_id = match object.get(ENTITY_ID) {
            None | Some(Value::Null) => None,
            Some(value) => Some(entity_id_text(value).ok_or_else(|| FeedError::MalformedLine {
                line,
                reason: format!("'{ENTITY_ID}' must be a string, found {}", json_type_name(value)),
            })?),
        };

        Ok(Self {
            document_id: document_id.to_string(),
            entity_id,
            record_count: required_int(line, object, RECORD_COUNT)?,
            record_index: required_int(line, object, RECORD_INDEX)?,
        })
    }
}

/// Optional descriptive fields, read only by the statistics pass.
///
/// Values of an unexpected JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MentionDetails {
    pub entity_name: Option<String>,
    pub entity_type: Option<String>,
    pub entity_relevance: Option<f64>,
    pub entity_sentiment: Option<f64>,
    pub title: Option<String>,
    pub timestamp_utc: Option<String>,
    pub source_name: Option<String>,
    pub word_count: Option<i64>,
    pub paragraph_count: Option<i64>,
    pub document_type: Option<String>,
    pub original_language: Option<String>,
    pub country_code: Option<String>,
}

impl MentionDetails {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        Self {
            entity_name: text(object, ENTITY_NAME),
            entity_type: text(object, ENTITY_TYPE),
            entity_relevance: object.get(ENTITY_RELEVANCE).and_then(Value::as_f64),
            entity_sentiment: object.get(ENTITY_SENTIMENT).and_then(Value::as_f64),
            title: text(object, TITLE),
            timestamp_utc: text(object, TIMESTAMP_UTC),
            source_name: text(object, SOURCE_NAME),
            word_count: object.get(WORD_COUNT).and_then(lenient_int),
            paragraph_count: object.get(PARAGRAPH_COUNT).and_then(lenient_int),
            document_type: text(object, DOCUMENT_TYPE),
            original_language: text(object, ORIGINAL_LANGUAGE),
            country_code: text(object, COUNTRY_CODE),
        }
    }
}

/// The document id exactly as written. Absent, non-string and blank ids yield `None`.
pub fn document_id_of(object: &Map<String, Value>) -> Option<&str> {
    object
        .get(DOCUMENT_ID)
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
}

/// Entity ids are strings, but numeric ids are accepted and stringified.
pub fn entity_id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(id) => Some(id.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// A field counts as null when it is absent or explicitly `null`.
pub fn is_null_field(object: &Map<String, Value>, field: &str) -> bool {
    matches!(object.get(field), None | Some(Value::Null))
}

pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(number) if number.is_i64() || number.is_u64() => "int",
        Value::Number(_) => "float",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn required_int(
    line: usize,
    object: &Map<String, Value>,
    field: &'static str,
) -> Result<i64, FeedError> {
    match object.get(field) {
        None | Some(Value::Null) => Err(FeedError::MissingRequiredField { line, field }),
        Some(value) => lenient_int(value).ok_or_else(|| FeedError::MalformedLine {
            line,
            reason: format!("'{field}' is not an integer: {value}"),
        }),
    }
}

/// Integers arrive either as JSON numbers or as strings holding a number.
fn lenient_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn text(object: &Map<String, Value>, field: &str) -> Option<String> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}
