//! Feed normalization: rewrite a feed as a pretty-printed JSON array and profile its fields.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::info;

use crate::config::FeedConfig;
use crate::error::{FeedError, RecordIssue};
use crate::feed::reader::scan_feed;
use crate::feed::record::json_type_name;
use crate::feed::report::render_structure_summary;
use crate::feed::stats::percentage;

const SAMPLES_KEPT: usize = 3;

/// Per-field shape observed across all records that carry the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldProfile {
    pub data_types: BTreeSet<&'static str>,
    /// Records where the field is present with a `null` value.
    pub null_values: usize,
    pub null_percentage: f64,
    pub value_examples: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldStructure {
    pub total_records: usize,
    pub fields: BTreeMap<String, FieldProfile>,
}

impl FieldStructure {
    pub fn observe(&mut self, object: &Map<String, Value>) {
        self.total_records += 1;
        for (key, value) in object {
            let profile = self.fields.entry(key.clone()).or_default();
            profile.data_types.insert(json_type_name(value));
            if value.is_null() {
                profile.null_values += 1;
            } else if profile.value_examples.len() < SAMPLES_KEPT {
                profile.value_examples.push(value.clone());
            }
        }
    }

    fn seal(&mut self) {
        let total = self.total_records;
        for profile in self.fields.values_mut() {
            profile.null_percentage = (percentage(profile.null_values, total) * 100.0).round() / 100.0;
        }
    }

    /// Fields ordered by null count, most nulls first.
    pub fn most_null_fields(&self, limit: usize) -> Vec<(&str, &FieldProfile)> {
        let mut ranked: Vec<(&str, &FieldProfile)> = self
            .fields
            .iter()
            .filter(|(_, profile)| profile.null_values > 0)
            .map(|(name, profile)| (name.as_str(), profile))
            .collect();
        ranked.sort_by(|a, b| b.1.null_values.cmp(&a.1.null_values).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn all_types(&self) -> BTreeSet<&'static str> {
        self.fields
            .values()
            .flat_map(|profile| profile.data_types.iter().copied())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneralSummary {
    pub total_records: usize,
    pub total_fields: usize,
    pub analysis_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StructureAnalysis<'a> {
    pub general_summary: GeneralSummary,
    pub field_structure: &'a BTreeMap<String, FieldProfile>,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizedFeed {
    pub records: Vec<Value>,
    pub structure: FieldStructure,
    pub issues: Vec<RecordIssue>,
}

/// Paths written by [`NormalizedFeed::write_outputs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizeOutputs {
    pub formatted: PathBuf,
    pub analysis: PathBuf,
    pub summary: PathBuf,
}

impl NormalizedFeed {
    pub fn analysis(&self) -> StructureAnalysis<'_> {
        StructureAnalysis {
            general_summary: GeneralSummary {
                total_records: self.structure.total_records,
                total_fields: self.structure.fields.len(),
                analysis_date: chrono::Utc::now().format("%Y-%m-%d").to_string(),
            },
            field_structure: &self.structure.fields,
        }
    }

    /// Write `<stem>-formatted.json`, `<stem>-analysis.json` and `<stem>-summary.txt` into `dir`.
    pub fn write_outputs(&self, dir: &Path, stem: &str) -> Result<NormalizeOutputs, FeedError> {
        fs::create_dir_all(dir).map_err(|err| FeedError::io(dir, err))?;
        let outputs = NormalizeOutputs {
            formatted: dir.join(format!("{stem}-formatted.json")),
            analysis: dir.join(format!("{stem}-analysis.json")),
            summary: dir.join(format!("{stem}-summary.txt")),
        };

        let formatted = serde_json::to_string_pretty(&self.records)?;
        fs::write(&outputs.formatted, formatted).map_err(|err| FeedError::io(&outputs.formatted, err))?;

        let analysis = serde_json::to_string_pretty(&self.analysis())?;
        fs::write(&outputs.analysis, analysis).map_err(|err| FeedError::io(&outputs.analysis, err))?;

        let summary = render_structure_summary(&self.structure);
        fs::write(&outputs.summary, summary).map_err(|err| FeedError::io(&outputs.summary, err))?;

        info!(
            records = self.records.len(),
            formatted = %outputs.formatted.display(),
            "normalized feed written"
        );
        Ok(outputs)
    }
}

pub fn normalize_feed(path: &Path, config: &FeedConfig) -> Result<NormalizedFeed, FeedError> {
    let mut normalized = NormalizedFeed::default();
    let summary = scan_feed(path, config, |line, value| {
        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(FeedError::MalformedLine {
                    line,
                    reason: format!("expected a JSON object, found {}", json_type_name(&other)),
                })
            }
        };
        normalized.structure.observe(&object);
        normalized.records.push(Value::Object(object));
        Ok(())
    })?;
    normalized.structure.seal();
    normalized.issues = summary.issues;
    Ok(normalized)
}
