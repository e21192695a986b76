// logweave - util/error.rs
//
// Typed per-subsystem errors with context-preserving error chains.
// No string-based error propagation; all errors preserve the causal
// chain for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Read errors
// ---------------------------------------------------------------------------

/// Errors from the chunked reader. Always carry the file path so the
/// failure can be surfaced to the user with its source file named.
/// Batches already delivered before the failure remain valid.
#[derive(Debug)]
pub enum ReadError {
    /// The file could not be opened.
    Open { path: PathBuf, source: io::Error },

    /// Reading a byte window failed mid-file.
    Window {
        path: PathBuf,
        offset: u64,
        source: io::Error,
    },

    /// The file's metadata (size) could not be determined.
    Metadata { path: PathBuf, source: io::Error },
}

impl ReadError {
    /// Path of the file whose ingestion failed.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Open { path, .. } | Self::Window { path, .. } | Self::Metadata { path, .. } => {
                path
            }
        }
    }
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, source } => {
                write!(f, "Cannot open '{}': {source}", path.display())
            }
            Self::Window {
                path,
                offset,
                source,
            } => write!(
                f,
                "Read failed at byte {offset} of '{}': {source}",
                path.display()
            ),
            Self::Metadata { path, source } => {
                write!(f, "Cannot stat '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ReadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Open { source, .. }
            | Self::Window { source, .. }
            | Self::Metadata { source, .. } => Some(source),
        }
    }
}

// ---------------------------------------------------------------------------
// Executor errors
// ---------------------------------------------------------------------------

/// Errors from the background batch executor.
///
/// Any of these triggers the one-time permanent downgrade to synchronous
/// parsing; none of them loses data because the supervisor re-runs the
/// failed batch locally.
#[derive(Debug)]
pub enum ExecutorError {
    /// The worker thread could not be spawned.
    Spawn { source: io::Error },

    /// The request channel to the worker is closed (worker exited).
    Dispatch,

    /// The response channel from the worker is closed before a reply
    /// arrived (worker panicked mid-batch).
    Reply,
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { source } => write!(f, "Cannot spawn parse worker: {source}"),
            Self::Dispatch => write!(f, "Parse worker request channel closed"),
            Self::Reply => write!(f, "Parse worker exited before replying"),
        }
    }
}

impl std::error::Error for ExecutorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source } => Some(source),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Grouping errors
// ---------------------------------------------------------------------------

/// Errors from grouping operations.
///
/// Note that an invalid custom pattern during `regroup` is NOT an error:
/// affected entries route to the fallback group. This type exists for the
/// explicit validation entry point and for pattern-length enforcement.
#[derive(Debug)]
pub enum GroupError {
    /// User-provided grouping regex is invalid.
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },

    /// User-provided grouping regex exceeds the maximum allowed length.
    PatternTooLong { length: usize, max_length: usize },
}

impl fmt::Display for GroupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPattern { pattern, source } => {
                write!(f, "Invalid grouping pattern '{pattern}': {source}")
            }
            Self::PatternTooLong { length, max_length } => write!(
                f,
                "Grouping pattern is {length} chars, exceeds maximum of {max_length}"
            ),
        }
    }
}

impl std::error::Error for GroupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidPattern { source, .. } => Some(source),
            Self::PatternTooLong { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_read_error_carries_path_and_source() {
        let e = ReadError::Window {
            path: PathBuf::from("/var/log/app.log"),
            offset: 4096,
            source: io::Error::new(io::ErrorKind::UnexpectedEof, "truncated"),
        };
        assert_eq!(e.path(), &PathBuf::from("/var/log/app.log"));
        assert!(e.to_string().contains("4096"));
        assert!(e.source().unwrap().to_string().contains("truncated"));
    }

    #[test]
    fn test_group_error_source_chain() {
        let regex_err = regex::Regex::new("[unclosed").unwrap_err();
        let e = GroupError::InvalidPattern {
            pattern: "[unclosed".to_owned(),
            source: regex_err,
        };
        assert!(e.to_string().contains("[unclosed"));
        assert!(e.source().is_some(), "regex error preserved as source");

        let too_long = GroupError::PatternTooLong {
            length: 5_000,
            max_length: 4_096,
        };
        assert!(too_long.to_string().contains("5000"));
        assert!(too_long.source().is_none());
    }
}
