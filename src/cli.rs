use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing::info;

use crate::config::{FeedConfig, InputFormat, MalformedPolicy};
use crate::error::FeedError;
use crate::feed::census::count_unique_documents;
use crate::feed::report::{
    render_census_preview, render_census_text, render_statistics_text, render_validation_text,
    to_json_pretty, validation_json, write_validation_csv,
};
use crate::feed::stats::collect_statistics;
use crate::feed::validator::validate_feed;
use crate::logging;

#[derive(Debug, Parser)]
#[command(name = "rtfeed")]
#[command(about = "Integrity checks and statistics for news-analytics feeds")]
pub struct Cli {
    /// YAML config file; flags override its values.
    #[arg(long, global = true, env = "RTFEED_CONFIG")]
    pub config: Option<PathBuf>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long, global = true, default_value_t = false)]
    pub quiet: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check per-document record completeness.
    Validate(ValidateArgs),
    /// Descriptive statistics over the feed.
    Stats(StatsArgs),
    /// Count and list unique document ids.
    Count(CountArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    pub input: PathBuf,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub io: InputArgs,
    /// Abort on the first malformed record instead of skipping it.
    #[arg(long, default_value_t = false)]
    pub strict: bool,
    #[arg(long, default_value_t = false)]
    pub json: bool,
    /// Also write one CSV row per document.
    #[arg(long)]
    pub csv: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub io: InputArgs,
    #[arg(long)]
    pub top: Option<usize>,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct CountArgs {
    #[command(flatten)]
    pub io: InputArgs,
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Auto,
    Array,
    Ndjson,
}

impl From<FormatArg> for InputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Auto => Self::Auto,
            FormatArg::Array => Self::Array,
            FormatArg::Ndjson => Self::Ndjson,
        }
    }
}

/// Parse `args` (including the program name), run the command and return the exit code.
/// Findings never change the exit code; only unrecoverable failures do.
pub fn run_with_args(args: &[String]) -> i32 {
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return err.exit_code();
        }
    };
    logging::init_tracing(cli.verbose, cli.quiet);

    let config = match cli.config.as_deref().map(FeedConfig::load).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("rtfeed: {err}");
            return 1;
        }
    };

    let outcome = match cli.command {
        Command::Validate(args) => handle_validate(config, args),
        Command::Stats(args) => handle_stats(config, args),
        Command::Count(args) => handle_count(config, args),
    };
    match outcome {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("rtfeed: {err}");
            1
        }
    }
}

fn handle_validate(mut config: FeedConfig, args: ValidateArgs) -> Result<(), FeedError> {
    apply_input_overrides(&mut config, &args.io);
    if args.strict {
        config.policy = MalformedPolicy::Strict;
    }

    let report = validate_feed(&args.io.input, &config)?;
    let rendered = if wants_json(args.json, args.io.output.as_deref()) {
        validation_json(&report)?
    } else {
        render_validation_text(&report)
    };
    emit(args.io.output.as_deref(), &rendered)?;

    if let Some(csv_path) = &args.csv {
        let file = create_file(csv_path)?;
        write_validation_csv(&report, BufWriter::new(file))?;
        info!(path = %csv_path.display(), "csv report written");
    }

    if let Some(output) = &args.io.output {
        println!(
            "validated {} documents: {} valid, {} invalid, {} records skipped; report written to {}",
            report.documents_checked(),
            report.valid_documents(),
            report.invalid_documents().count(),
            report.issues.len(),
            output.display()
        );
    }
    Ok(())
}

fn handle_stats(mut config: FeedConfig, args: StatsArgs) -> Result<(), FeedError> {
    apply_input_overrides(&mut config, &args.io);
    if let Some(top) = args.top.filter(|top| *top > 0) {
        config.top_k = top;
    }

    let report = collect_statistics(&args.io.input, &config)?;
    let rendered = if wants_json(args.json, args.io.output.as_deref()) {
        to_json_pretty(&report)?
    } else {
        render_statistics_text(&report)
    };
    emit(args.io.output.as_deref(), &rendered)?;
    if let Some(output) = &args.io.output {
        println!(
            "analyzed {} records across {} documents; report written to {}",
            report.total_records,
            report.unique_documents,
            output.display()
        );
    }
    Ok(())
}

fn handle_count(mut config: FeedConfig, args: CountArgs) -> Result<(), FeedError> {
    apply_input_overrides(&mut config, &args.io);

    let census = count_unique_documents(&args.io.input, &config)?;
    let rendered = if wants_json(args.json, args.io.output.as_deref()) {
        to_json_pretty(&census)?
    } else {
        render_census_text(&census)
    };
    emit(args.io.output.as_deref(), &rendered)?;
    if let Some(output) = &args.io.output {
        print!("{}", render_census_preview(&census));
        println!("complete list written to {}", output.display());
    }
    Ok(())
}

fn apply_input_overrides(config: &mut FeedConfig, io: &InputArgs) {
    if let Some(format) = io.format {
        config.format = format.into();
    }
}

fn wants_json(flag: bool, output: Option<&Path>) -> bool {
    flag || output
        .and_then(Path::extension)
        .map_or(false, |ext| ext.eq_ignore_ascii_case("json"))
}

/// Write to `output`, or stdout when no path is given.
fn emit(output: Option<&Path>, content: &str) -> Result<(), FeedError> {
    let Some(path) = output else {
        print!("{content}");
        if !content.ends_with('\n') {
            println!();
        }
        return Ok(());
    };
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| FeedError::io(parent, err))?;
    }
    fs::write(path, content).map_err(|err| FeedError::io(path, err))
}

fn create_file(path: &Path) -> Result<File, FeedError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| FeedError::io(parent, err))?;
    }
    File::create(path).map_err(|err| FeedError::io(path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    #[test]
    fn parses_validate_with_overrides() {
        let cli = parse(&[
            "rtfeed", "validate", "feed.ndjson", "-o", "out.json", "--format", "ndjson", "--strict",
        ]);
        let Command::Validate(args) = cli.command else {
            panic!("expected validate");
        };
        assert_eq!(args.io.input, PathBuf::from("feed.ndjson"));
        assert_eq!(args.io.format, Some(FormatArg::Ndjson));
        assert!(args.strict);

        let mut config = FeedConfig::default();
        apply_input_overrides(&mut config, &args.io);
        assert_eq!(config.format, InputFormat::Ndjson);
    }

    #[test]
    fn json_is_chosen_by_flag_or_extension() {
        assert!(wants_json(true, None));
        assert!(wants_json(false, Some(Path::new("report.JSON"))));
        assert!(!wants_json(false, Some(Path::new("report.txt"))));
        assert!(!wants_json(false, None));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = parse(&["rtfeed", "stats", "feed.json", "-vv", "--top", "5"]);
        assert_eq!(cli.verbose, 2);
        let Command::Stats(args) = cli.command else {
            panic!("expected stats");
        };
        assert_eq!(args.top, Some(5));
    }

    #[test]
    fn missing_subcommand_is_a_usage_error() {
        let args: Vec<String> = vec!["rtfeed".to_string()];
        assert_eq!(run_with_args(&args), 2);
    }
}
