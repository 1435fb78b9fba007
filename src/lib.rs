pub mod cli;
pub mod config;
pub mod error;
pub mod feed;
pub mod logging;

pub use config::{FeedConfig, InputFormat, MalformedPolicy};
pub use error::{FeedError, IssueKind, RecordIssue};
