// logweave - main.rs
//
// Application entry point. Handles:
// 1. CLI argument parsing
// 2. Logging initialisation (debug mode support)
// 3. Ingest pipeline execution and grouped summary output

use clap::Parser;
use logweave::app::pipeline::{PipelineConfig, PipelineManager};
use logweave::core::delivery::DeliveryController;
use logweave::core::grouping::{validate_pattern, Group, GroupFilter, GroupMode, GroupSet};
use logweave::core::model::{IngestProgress, LogEntry, LogLevel};
use logweave::util;
use std::path::PathBuf;

/// logweave - Multi-file log parser and grouping engine.
///
/// Ingests log files of mixed formats into a unified entry stream, then
/// groups the entries by severity level, hour of day, or a custom
/// regular expression.
#[derive(Parser, Debug)]
#[command(name = "logweave", version, about)]
struct Cli {
    /// Log files to ingest (one or more).
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Grouping mode: level, hour, or custom.
    #[arg(short = 'g', long = "group-by", default_value = "level")]
    group_by: String,

    /// Regular expression for custom grouping (first capture group, or
    /// whole match, becomes the group key). Required with --group-by custom.
    #[arg(short = 'p', long = "pattern", required_if_eq("group_by", "custom"))]
    pattern: Option<String>,

    /// Substring filter applied to entry content before grouping.
    #[arg(short = 'f', long = "filter")]
    filter: Option<String>,

    /// Entries per delivery chunk.
    #[arg(long = "chunk-entries", default_value_t = util::constants::CHUNK_ENTRIES)]
    chunk_entries: usize,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialise logging subsystem
    util::logging::init(cli.debug);

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        files = cli.files.len(),
        "logweave starting"
    );

    let mode = match cli.group_by.as_str() {
        "level" => GroupMode::LogLevel,
        "hour" => GroupMode::Hour,
        "custom" => GroupMode::Custom,
        other => {
            eprintln!("Error: unknown grouping mode '{other}' (expected level, hour, or custom)");
            std::process::exit(2);
        }
    };

    // Clap guarantees --pattern is present in custom mode; still reject
    // patterns that do not compile before spinning up the pipeline.
    if mode == GroupMode::Custom {
        let pattern = cli.pattern.as_deref().unwrap_or_default();
        let validation = validate_pattern(pattern, false);
        if !validation.is_valid {
            eprintln!(
                "Error: invalid grouping pattern: {}",
                validation.error.unwrap_or_else(|| "empty pattern".to_owned())
            );
            std::process::exit(2);
        }
    }

    let mut manager = PipelineManager::new();
    let config = PipelineConfig {
        chunk_entries: cli.chunk_entries.max(1),
        ..PipelineConfig::default()
    };
    manager.start_ingest(cli.files.clone(), config);

    let rx = match manager.progress_rx.take() {
        Some(rx) => rx,
        None => {
            eprintln!("Error: ingest pipeline failed to start");
            std::process::exit(1);
        }
    };

    // Drain the pipeline to completion. The CLI has no scroll position to
    // report, so every queued chunk is released as soon as it arrives.
    let mut delivery = DeliveryController::new();
    let mut entries: Vec<LogEntry> = Vec::new();
    let mut failures: Vec<String> = Vec::new();
    let mut completed_files = 0usize;

    for msg in rx {
        match msg {
            IngestProgress::FileStarted { file, size_bytes } => {
                tracing::debug!(file = %file.file_name, size_bytes, "File started");
            }
            IngestProgress::Preview { chunk, .. } => {
                entries.extend(chunk.entries);
            }
            IngestProgress::ChunksReady { file_id, chunks } => {
                delivery.register_chunks(file_id, chunks);
            }
            IngestProgress::Progress { .. } => {}
            IngestProgress::FileComplete {
                file_id,
                lines,
                processed_files,
            } => {
                completed_files = processed_files;
                tracing::debug!(file_id, lines, "File complete");
            }
            IngestProgress::FileFailed { file, reason } => {
                eprintln!("Warning: {}: {reason}", file.file_name);
                failures.push(file.file_name);
            }
            IngestProgress::Completed { processed_files } => {
                completed_files = processed_files;
                break;
            }
            IngestProgress::Cancelled => break,
        }
    }

    while delivery.has_more_data() {
        for chunk in delivery.release_next() {
            entries.extend(chunk.entries);
        }
    }

    if completed_files == 0 {
        eprintln!("Error: no files could be read");
        std::process::exit(1);
    }

    let set = GroupSet::regroup(&entries, mode, cli.pattern.as_deref());

    let filter = GroupFilter {
        text: cli.filter.clone().unwrap_or_default(),
        ..GroupFilter::default()
    };
    let groups = filter.apply(set.groups());

    print_summary(&groups, completed_files, &failures);
}

fn print_summary(groups: &[Group], files: usize, failures: &[String]) {
    let total: usize = groups.iter().map(Group::count).sum();
    println!(
        "{} entries across {} group(s) from {} file(s)",
        total,
        groups.len(),
        files
    );
    for group in groups {
        println!(
            "  {:<24} {:>8}  {}",
            group.key,
            group.count(),
            level_breakdown(group)
        );
    }
    if !failures.is_empty() {
        println!("{} file(s) failed: {}", failures.len(), failures.join(", "));
    }
}

/// Compact per-level counts for one group, e.g. "ERR 3 WRN 1".
fn level_breakdown(group: &Group) -> String {
    LogLevel::all()
        .iter()
        .filter_map(|level| {
            let n = group.entries.iter().filter(|e| e.level == *level).count();
            (n > 0).then(|| format!("{} {n}", level.short_label()))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_custom_mode_requires_pattern() {
        let err = Cli::try_parse_from(["logweave", "--group-by", "custom", "app.log"])
            .expect_err("custom mode without --pattern must be rejected");
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_custom_mode_with_pattern_parses() {
        let cli = Cli::try_parse_from([
            "logweave",
            "--group-by",
            "custom",
            "--pattern",
            r"user=(\w+)",
            "app.log",
        ])
        .expect("custom mode with --pattern parses");
        assert_eq!(cli.pattern.as_deref(), Some(r"user=(\w+)"));
    }

    #[test]
    fn test_default_mode_needs_no_pattern() {
        let cli = Cli::try_parse_from(["logweave", "app.log"]).expect("level mode parses");
        assert_eq!(cli.group_by, "level");
        assert!(cli.pattern.is_none());
    }
}
