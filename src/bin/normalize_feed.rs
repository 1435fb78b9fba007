//! Rewrite a feed as a pretty-printed JSON array and profile its fields.
//! Run: cargo run --bin normalize_feed -- <feed> [output-dir]
//!
//! Writes <stem>-formatted.json, <stem>-analysis.json and <stem>-summary.txt.

use std::path::{Path, PathBuf};

use rtfeed::config::{FeedConfig, CONFIG_ENV_VAR};
use rtfeed::feed::normalize_feed;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    rtfeed::logging::init_tracing(1, false);

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next().map(PathBuf::from) else {
        eprintln!("usage: normalize_feed <feed> [output-dir]");
        std::process::exit(2);
    };
    let output_dir = args.next().map(PathBuf::from).unwrap_or_else(|| {
        input
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    });

    let config = match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) => FeedConfig::load(path)?,
        Err(_) => FeedConfig::default(),
    };

    let stem = input
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("feed")
        .to_string();

    let normalized = normalize_feed(&input, &config)?;
    let outputs = normalized.write_outputs(&output_dir, &stem)?;

    println!(
        "Normalized {} records ({} fields, {} skipped)",
        normalized.records.len(),
        normalized.structure.fields.len(),
        normalized.issues.len()
    );
    println!("  formatted: {}", outputs.formatted.display());
    println!("  analysis:  {}", outputs.analysis.display());
    println!("  summary:   {}", outputs.summary.display());
    Ok(())
}
