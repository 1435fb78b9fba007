use std::fs;
use std::path::PathBuf;

use proptest::prelude::*;
use rtfeed::feed::{validate_feed, DocumentValidator, FeedRecord, IndexSpan};
use rtfeed::{FeedConfig, InputFormat, IssueKind, MalformedPolicy};

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn verdicts(records: &[FeedRecord]) -> Vec<rtfeed::feed::DocumentVerdict> {
    let mut validator = DocumentValidator::new(FeedConfig::default());
    for record in records {
        validator.ingest(record);
    }
    validator.finalize().documents
}

/// Documents with a fixed declared count each, then any subset of indices in `0..=count + 1`.
fn feed_strategy() -> impl Strategy<Value = Vec<FeedRecord>> {
    prop::collection::vec((1i64..6, prop::collection::vec(0i64..8, 0..8)), 1..6).prop_map(
        |documents| {
            let mut records = Vec::new();
            for (doc, (count, indices)) in documents.into_iter().enumerate() {
                for index in indices {
                    records.push(FeedRecord::new(
                        format!("DOC{doc}"),
                        format!("{:06X}", index * 17 + doc as i64),
                        count,
                        index.min(count + 1),
                    ));
                }
            }
            records
        },
    )
}

proptest! {
    #[test]
    fn verdicts_do_not_depend_on_record_order(
        (records, shuffled) in feed_strategy().prop_flat_map(|records| {
            let shuffled = Just(records.clone()).prop_shuffle();
            (Just(records), shuffled)
        })
    ) {
        prop_assert_eq!(verdicts(&records), verdicts(&shuffled));
    }

    #[test]
    fn distinct_indices_never_exceed_mentions(records in feed_strategy()) {
        for verdict in verdicts(&records) {
            prop_assert!(verdict.distinct_indices <= verdict.mentions);
        }
    }

    #[test]
    fn valid_means_exact_index_coverage(records in feed_strategy()) {
        for verdict in verdicts(&records) {
            let mut observed: Vec<i64> = records
                .iter()
                .filter(|record| record.document_id == verdict.document_id)
                .map(|record| record.record_index)
                .collect();
            observed.sort_unstable();
            observed.dedup();
            let expected: Vec<i64> = (1..=verdict.declared_count).collect();
            let exact = observed == expected
                && verdict.mentions as i64 == verdict.declared_count;
            prop_assert_eq!(verdict.valid, exact);
        }
    }
}

#[test]
fn ndjson_fixture_matches_expected_verdicts() {
    let report = validate_feed(&fixture_path("feed_sample.ndjson"), &FeedConfig::default())
        .expect("lenient validation succeeds");

    assert_eq!(report.records_read, 12);
    assert_eq!(report.records_aggregated, 10);
    assert_eq!(report.documents_checked(), 4);

    let doc1 = report.document("DOC1").expect("DOC1");
    assert!(doc1.valid);
    assert!(doc1.findings().is_empty());

    let doc2 = report.document("DOC2").expect("DOC2");
    assert!(!doc2.valid);
    assert!(doc2.count_mismatch);
    assert_eq!(doc2.missing_indices, vec![IndexSpan::single(2)]);

    let doc3 = report.document("DOC3").expect("DOC3");
    assert!(!doc3.valid);
    assert_eq!(doc3.mentions, 4);
    assert_eq!(doc3.distinct_indices, 3);
    assert!(doc3.missing_indices.is_empty());

    let doc4 = report.document("DOC4").expect("DOC4");
    assert!(doc4.valid);
    assert_eq!(doc4.format_violations, vec!["12345".to_string()]);

    let skipped: Vec<(usize, IssueKind)> = report
        .issues
        .iter()
        .map(|issue| (issue.line, issue.kind))
        .collect();
    assert_eq!(
        skipped,
        vec![
            (12, IssueKind::MissingRequiredField),
            (13, IssueKind::MissingRequiredField),
            (14, IssueKind::MalformedLine),
        ]
    );
}

#[test]
fn array_fixture_agrees_with_ndjson() {
    let ndjson = validate_feed(&fixture_path("feed_sample.ndjson"), &FeedConfig::default())
        .expect("ndjson validates");
    let config = FeedConfig {
        format: InputFormat::Array,
        ..FeedConfig::default()
    };
    let array = validate_feed(&fixture_path("feed_sample.json"), &config).expect("array validates");

    assert_eq!(ndjson.documents, array.documents);
    assert_eq!(array.issues.len(), 2);
}

#[test]
fn strict_policy_stops_at_first_incomplete_record() {
    let config = FeedConfig {
        policy: MalformedPolicy::Strict,
        ..FeedConfig::default()
    };
    let err = validate_feed(&fixture_path("feed_sample.ndjson"), &config)
        .expect_err("strict validation fails");
    let issue = err.as_record_issue().expect("record-level error");
    assert_eq!(issue.line, 13);
    assert_eq!(issue.kind, IssueKind::MissingRequiredField);
}

#[test]
fn maximal_declared_count_completes_with_a_single_gap() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = dir.path().join("huge.ndjson");
    fs::write(
        &input,
        "{\"RP_DOCUMENT_ID\":\"D\",\"RP_ENTITY_ID\":\"99D862\",\"DOCUMENT_RECORD_COUNT\":9223372036854775807,\"DOCUMENT_RECORD_INDEX\":1}\n",
    )
    .expect("feed written");

    let report = validate_feed(&input, &FeedConfig::default()).expect("validation completes");
    let doc = report.document("D").expect("aggregated");
    assert!(!doc.valid);
    assert_eq!(doc.declared_count, i64::MAX);
    assert_eq!(doc.missing_indices, vec![IndexSpan::new(2, i64::MAX)]);
    assert_eq!(
        report.findings_by_document()["D"][1],
        format!("missing record indexes: [2..={}]", i64::MAX)
    );
}
