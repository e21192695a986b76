// logweave - core/model.rs
//
// Core data model types. Pure data definitions with no I/O and no
// dependency on the app layer.
//
// These types are the shared vocabulary across the whole pipeline.

use chrono::{DateTime, Utc};
use serde::Serialize;

// =============================================================================
// Log Entry (normalised output of parsing)
// =============================================================================

/// A single parsed log line, normalised across all recognized formats.
///
/// This is the core data unit that flows through delivery, grouping, and
/// display. Immutable once created: the pattern matcher builds it, nothing
/// downstream mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// Monotonically increasing unique ID within the ingest session.
    pub id: u64,

    /// ID of the source file within the session.
    pub file_id: u64,

    /// Display name of the source file.
    pub file_name: String,

    /// 1-based line number in the source file.
    pub line_number: u64,

    /// Full original line text.
    pub content: String,

    /// The original timestamp substring exactly as it appeared in the
    /// source line. Never reformatted or re-rendered; the source text is
    /// the source of truth. `None` when no timestamp was recognized.
    pub timestamp: Option<String>,

    /// Detected log level. Lines with no recognizable level token carry
    /// `Info` (the historical default, see `detect_level`).
    pub level: LogLevel,

    /// Derived comparable value used only for ordering. Defaults to the
    /// Unix epoch when the line had no recognizable timestamp, which sorts
    /// such entries to the front of a merged timeline.
    pub sort_key: DateTime<Utc>,
}

// =============================================================================
// Log level
// =============================================================================

/// Normalised log levels, ordered from most to least severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Returns all variants in display order (most severe first).
    pub fn all() -> &'static [LogLevel] {
        &[
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ]
    }

    /// Human-readable label, also used as the grouping key in level mode.
    pub fn label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    /// Short label for compact display (e.g. summary columns).
    pub fn short_label(&self) -> &'static str {
        match self {
            LogLevel::Error => "ERR",
            LogLevel::Warn => "WRN",
            LogLevel::Info => "INF",
            LogLevel::Debug => "DBG",
            LogLevel::Trace => "TRC",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// File metadata
// =============================================================================

/// Identity of a source file within an ingest session.
#[derive(Debug, Clone)]
pub struct FileMeta {
    /// Session-unique file ID.
    pub file_id: u64,

    /// Display name (file name without directory).
    pub file_name: String,
}

// =============================================================================
// Chunk (unit of lazy delivery)
// =============================================================================

/// An ordered batch of parsed entries produced by one read-and-parse cycle.
/// Chunks are the unit of lazy delivery: parsed up front, released to the
/// grouping engine only when the consumer asks for more.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub entries: Vec<LogEntry>,
}

impl Chunk {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Ingest progress (messages from the pipeline thread to the consumer)
// =============================================================================

/// Progress messages sent from the ingest thread to the consuming side.
#[derive(Debug)]
pub enum IngestProgress {
    /// Ingestion of a file has started.
    FileStarted { file: FileMeta, size_bytes: u64 },

    /// The first parsed chunk of a file, delivered immediately so the
    /// consumer has content to show before the rest of the file is read.
    Preview { file_id: u64, chunk: Chunk },

    /// Parsed-but-undelivered chunks for a file, to be registered with the
    /// delivery controller and released on demand.
    ChunksReady { file_id: u64, chunks: Vec<Chunk> },

    /// Bytes-read progress for the file currently being ingested.
    Progress {
        file_id: u64,
        bytes_read: u64,
        size_bytes: u64,
        /// Percentage complete (0–100), derived from bytes read / file size.
        percent: f32,
    },

    /// A file finished ingesting successfully.
    FileComplete {
        file_id: u64,
        lines: u64,
        /// Count of files fully processed so far, for the progress display.
        processed_files: usize,
    },

    /// A file's ingestion failed. Other files continue unaffected; chunks
    /// already delivered for this file remain valid.
    FileFailed { file: FileMeta, reason: String },

    /// All files have been processed (some may have failed individually).
    Completed { processed_files: usize },

    /// The session was cancelled before completion. Already-emitted
    /// results are not retracted.
    Cancelled,
}
