use std::fmt;
use std::io;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failures that stop a run. Integrity findings are never reported through this type.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("input file not found: {}", path.display())]
    InputNotFound { path: PathBuf },
    #[error("i/o failure on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("'{}' is not a valid JSON document: {source}", path.display())]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed record at line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },
    #[error("record at line {line} is missing required field '{field}'")]
    MissingRequiredField { line: usize, field: &'static str },
    #[error("invalid config '{}': {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("failed to serialize report: {0}")]
    Serialize(String),
}

impl FeedError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            return Self::InputNotFound { path };
        }
        Self::Io { path, source }
    }

    /// Recoverable errors are downgraded to a [`RecordIssue`] under the lenient policy.
    pub fn as_record_issue(&self) -> Option<RecordIssue> {
        match self {
            Self::MalformedLine { line, reason } => Some(RecordIssue {
                line: *line,
                kind: IssueKind::MalformedLine,
                detail: reason.clone(),
            }),
            Self::MissingRequiredField { line, field } => Some(RecordIssue {
                line: *line,
                kind: IssueKind::MissingRequiredField,
                detail: format!("missing '{field}'"),
            }),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

impl From<csv::Error> for FeedError {
    fn from(err: csv::Error) -> Self {
        Self::Serialize(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MalformedLine,
    MissingRequiredField,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedLine => "malformed_line",
            Self::MissingRequiredField => "missing_required_field",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A record that was skipped during a lenient pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordIssue {
    pub line: usize,
    pub kind: IssueKind,
    pub detail: String,
}

impl fmt::Display for RecordIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.kind, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_io_error_becomes_input_not_found() {
        let err = FeedError::io("feed.ndjson", io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, FeedError::InputNotFound { .. }));
        assert_eq!(err.to_string(), "input file not found: feed.ndjson");
    }

    #[test]
    fn only_record_level_errors_downgrade_to_issues() {
        let missing = FeedError::MissingRequiredField {
            line: 4,
            field: "DOCUMENT_RECORD_INDEX",
        };
        let issue = missing.as_record_issue().expect("recoverable");
        assert_eq!(issue.kind, IssueKind::MissingRequiredField);
        assert_eq!(issue.line, 4);

        let fatal = FeedError::InputNotFound {
            path: PathBuf::from("absent"),
        };
        assert!(fatal.as_record_issue().is_none());
    }
}
