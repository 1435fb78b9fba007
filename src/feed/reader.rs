//! Feed input: a single JSON array or newline-delimited JSON objects.
//!
//! NDJSON is streamed line by line; a JSON array is parsed whole. Either way the
//! caller sees a flat sequence of [`FeedEntry`] values with a 1-based position.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{FeedConfig, InputFormat};
use crate::error::{FeedError, RecordIssue};
use crate::feed::record::DOCUMENT_ID;

/// One raw entry from the feed. `value` holds the parse error text when the entry is not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub line: usize,
    pub value: Result<Value, String>,
}

enum Entries<R> {
    Lines {
        lines: io::Split<R>,
        line: usize,
    },
    Elements(std::iter::Enumerate<std::vec::IntoIter<Value>>),
}

pub struct FeedEntries<R> {
    source: PathBuf,
    format: InputFormat,
    entries: Entries<R>,
}

impl<R: BufRead> FeedEntries<R> {
    pub fn from_reader(
        mut reader: R,
        format: InputFormat,
        source: impl Into<PathBuf>,
    ) -> Result<Self, FeedError> {
        let source = source.into();
        let mut leading_lines = 0;
        let format = match format {
            InputFormat::Auto => {
                let (sniffed, skipped) =
                    sniff_format(&mut reader).map_err(|err| FeedError::io(&source, err))?;
                leading_lines = skipped;
                sniffed
            }
            explicit => explicit,
        };

        let entries = match format {
            InputFormat::Array => {
                let elements: Vec<Value> =
                    serde_json::from_reader(reader).map_err(|err| FeedError::InvalidDocument {
                        path: source.clone(),
                        source: err,
                    })?;
                Entries::Elements(elements.into_iter().enumerate())
            }
            _ => Entries::Lines {
                lines: reader.split(b'\n'),
                line: leading_lines,
            },
        };

        Ok(Self {
            source,
            format,
            entries,
        })
    }

    /// The resolved layout; never `Auto`.
    pub fn format(&self) -> InputFormat {
        self.format
    }
}

impl FeedEntries<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>, format: InputFormat) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| FeedError::io(path, err))?;
        Self::from_reader(BufReader::new(file), format, path)
    }
}

impl<R: BufRead> Iterator for FeedEntries<R> {
    type Item = Result<FeedEntry, FeedError>;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.entries {
            Entries::Elements(elements) => elements.next().map(|(index, value)| {
                Ok(FeedEntry {
                    line: index + 1,
                    value: Ok(value),
                })
            }),
            Entries::Lines { lines, line } => loop {
                let raw = match lines.next()? {
                    Ok(raw) => raw,
                    Err(err) => return Some(Err(FeedError::io(&self.source, err))),
                };
                *line += 1;
                let text = match String::from_utf8(raw) {
                    Ok(text) => text,
                    Err(err) => {
                        return Some(Ok(FeedEntry {
                            line: *line,
                            value: Err(format!("invalid UTF-8: {err}")),
                        }))
                    }
                };
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    continue;
                }
                return Some(Ok(FeedEntry {
                    line: *line,
                    value: serde_json::from_str(trimmed).map_err(|err| err.to_string()),
                }));
            },
        }
    }
}

/// Peek at the first non-whitespace byte. Whitespace-only buffers are consumed and their
/// newlines counted so NDJSON line numbers stay accurate.
fn sniff_format<R: BufRead>(reader: &mut R) -> io::Result<(InputFormat, usize)> {
    let mut skipped_lines = 0;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Ok((InputFormat::Ndjson, skipped_lines));
        }
        if let Some(pos) = buf.iter().position(|byte| !byte.is_ascii_whitespace()) {
            let format = if buf[pos] == b'[' {
                InputFormat::Array
            } else {
                InputFormat::Ndjson
            };
            return Ok((format, skipped_lines));
        }
        let len = buf.len();
        skipped_lines += buf.iter().filter(|byte| **byte == b'\n').count();
        reader.consume(len);
    }
}

/// Outcome of one pass over a feed.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub format: Option<InputFormat>,
    /// Entries that parsed as JSON and reached the visitor.
    pub entries: usize,
    /// Records skipped under the lenient policy.
    pub issues: Vec<RecordIssue>,
}

/// Drive one pass over `path`, handing every parsed entry to `visit`.
///
/// Parse failures and recoverable errors returned by `visit` go through the malformed-record
/// policy: lenient runs record them and continue, strict runs stop on the first one.
pub fn scan_feed<F>(path: &Path, config: &FeedConfig, visit: F) -> Result<ScanSummary, FeedError>
where
    F: FnMut(usize, Value) -> Result<(), FeedError>,
{
    let entries = FeedEntries::open(path, config.format)?;
    info!(path = %path.display(), format = %entries.format(), "reading feed");
    scan_entries(entries, config, visit)
}

pub fn scan_entries<R, F>(
    entries: FeedEntries<R>,
    config: &FeedConfig,
    mut visit: F,
) -> Result<ScanSummary, FeedError>
where
    R: BufRead,
    F: FnMut(usize, Value) -> Result<(), FeedError>,
{
    let mut summary = ScanSummary {
        format: Some(entries.format()),
        ..ScanSummary::default()
    };

    for entry in entries {
        let FeedEntry { line, value } = entry?;
        let outcome = match value {
            Ok(value) => {
                summary.entries += 1;
                if config.progress_interval > 0 && summary.entries % config.progress_interval == 0 {
                    debug!(records = summary.entries, "progress");
                }
                visit(line, value)
            }
            Err(reason) => Err(FeedError::MalformedLine { line, reason }),
        };
        if let Err(err) = outcome {
            summary.issues.push(apply_policy(err, config)?);
        }
    }

    info!(
        records = summary.entries,
        skipped = summary.issues.len(),
        "feed pass complete"
    );
    Ok(summary)
}

/// A record without a document id is always skipped, even under the strict policy.
fn apply_policy(err: FeedError, config: &FeedConfig) -> Result<RecordIssue, FeedError> {
    let always_skipped = matches!(
        &err,
        FeedError::MissingRequiredField { field, .. } if *field == DOCUMENT_ID
    );
    match err.as_record_issue() {
        Some(issue) if !config.is_strict() || always_skipped => {
            warn!(line = issue.line, kind = %issue.kind, "skipping record: {}", issue.detail);
            Ok(issue)
        }
        _ => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::config::MalformedPolicy;
    use crate::error::IssueKind;

    fn entries(raw: &str, format: InputFormat) -> FeedEntries<Cursor<Vec<u8>>> {
        FeedEntries::from_reader(Cursor::new(raw.as_bytes().to_vec()), format, "inline")
            .expect("readable")
    }

    #[test]
    fn ndjson_skips_blank_lines_and_keeps_line_numbers() {
        let raw = "{\"a\":1}\n\n  \n{\"a\":2}\r\nnot json\n";
        let collected: Vec<FeedEntry> = entries(raw, InputFormat::Ndjson)
            .map(|entry| entry.expect("no io error"))
            .collect();
        assert_eq!(collected.len(), 3);
        assert_eq!(collected[0].line, 1);
        assert_eq!(collected[1].line, 4);
        assert_eq!(collected[1].value, Ok(json!({"a": 2})));
        assert_eq!(collected[2].line, 5);
        assert!(collected[2].value.is_err());
    }

    #[test]
    fn auto_detects_array_and_ndjson() {
        let array = entries("\n  [ {\"a\":1}, {\"a\":2} ]", InputFormat::Auto);
        assert_eq!(array.format(), InputFormat::Array);
        let positions: Vec<usize> = array.map(|e| e.expect("entry").line).collect();
        assert_eq!(positions, vec![1, 2]);

        let ndjson = entries("{\"a\":1}\n", InputFormat::Auto);
        assert_eq!(ndjson.format(), InputFormat::Ndjson);

        let empty = entries("", InputFormat::Auto);
        assert_eq!(empty.format(), InputFormat::Ndjson);
        assert_eq!(empty.count(), 0);
    }

    #[test]
    fn broken_array_is_fatal() {
        let result =
            FeedEntries::from_reader(Cursor::new(b"[{\"a\":1},".to_vec()), InputFormat::Array, "x");
        assert!(matches!(result, Err(FeedError::InvalidDocument { .. })));
    }

    #[test]
    fn invalid_utf8_line_is_a_recoverable_entry() {
        let mut raw = b"{\"a\":1}\n".to_vec();
        raw.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let collected: Vec<FeedEntry> =
            FeedEntries::from_reader(Cursor::new(raw), InputFormat::Ndjson, "x")
                .expect("readable")
                .map(|entry| entry.expect("no io error"))
                .collect();
        assert_eq!(collected.len(), 2);
        assert!(collected[1].value.as_ref().unwrap_err().contains("UTF-8"));
    }

    #[test]
    fn lenient_scan_collects_issues_and_strict_scan_aborts() {
        let raw = "{\"a\":1}\n{oops\n{\"a\":3}\n";
        let lenient = FeedConfig::default();
        let mut seen = Vec::new();
        let summary = scan_entries(entries(raw, InputFormat::Ndjson), &lenient, |line, _| {
            seen.push(line);
            Ok(())
        })
        .expect("lenient pass");
        assert_eq!(seen, vec![1, 3]);
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.issues[0].kind, IssueKind::MalformedLine);
        assert_eq!(summary.issues[0].line, 2);

        let strict = FeedConfig {
            policy: MalformedPolicy::Strict,
            ..FeedConfig::default()
        };
        let err = scan_entries(entries(raw, InputFormat::Ndjson), &strict, |_, _| Ok(()))
            .unwrap_err();
        assert!(matches!(err, FeedError::MalformedLine { line: 2, .. }));
    }

    #[test]
    fn strict_scan_still_skips_missing_document_id() {
        let strict = FeedConfig {
            policy: MalformedPolicy::Strict,
            ..FeedConfig::default()
        };
        let summary = scan_entries(entries("{}\n", InputFormat::Ndjson), &strict, |line, _| {
            Err(FeedError::MissingRequiredField {
                line,
                field: DOCUMENT_ID,
            })
        })
        .expect("skipped, not aborted");
        assert_eq!(summary.issues.len(), 1);
        assert_eq!(summary.issues[0].kind, IssueKind::MissingRequiredField);
    }
}
