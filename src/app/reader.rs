// logweave - app/reader.rs
//
// Chunked file reader: reads a file in fixed-size byte windows,
// reassembles lines across window boundaries via a remainder buffer, and
// flushes batches of complete lines to a callback as they accumulate.
//
// Architecture (mirrors the tail watcher's incremental read loop):
//   - One window read per loop iteration; the loop yields between windows
//     so a host sharing the core stays responsive.
//   - The last split segment of every window is never treated as a
//     complete line; it is carried forward as the remainder, because a
//     line may be split across a window boundary.
//   - A cooperative cancel flag is checked before each window read and
//     each batch flush; once set, no further callbacks fire.
//   - I/O failures terminate the loop with a ReadError; batches already
//     flushed remain valid and are not rolled back.
//
// Encoding: windows are decoded as lossy UTF-8, same as the tail path; a
// multi-byte character split exactly at a window boundary degrades to
// replacement characters for that character only.

use crate::util::constants;
use crate::util::error::ReadError;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

// =============================================================================
// Configuration
// =============================================================================

/// Tunable bounds for one reader instance.
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Byte size of the first window (small, for a fast first batch).
    pub first_window_bytes: usize,

    /// Byte size of every subsequent window.
    pub steady_window_bytes: usize,

    /// Complete lines accumulated before a batch flush.
    pub batch_lines: usize,

    /// Remainder-buffer size at which a newline-less fragment is
    /// force-flushed as a line of its own.
    pub max_remainder_bytes: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            first_window_bytes: constants::FIRST_WINDOW_BYTES,
            steady_window_bytes: constants::STEADY_WINDOW_BYTES,
            batch_lines: constants::LINE_BATCH_SIZE,
            max_remainder_bytes: constants::MAX_REMAINDER_BYTES,
        }
    }
}

// =============================================================================
// Per-file ingestion state
// =============================================================================

/// Progress state for one file being read. Owned exclusively by the
/// reader processing that file.
#[derive(Debug, Default)]
pub struct FileIngestState {
    /// Bytes consumed from the file so far.
    pub offset: u64,

    /// Decoded text after the last newline seen: an in-progress line,
    /// prepended to the next window before splitting.
    pub remaining: String,

    /// Complete lines emitted so far (1-based numbering continues from
    /// here for the next batch).
    pub lines_emitted: u64,

    /// True once end-of-file has been reached and the final flush done.
    pub is_complete: bool,
}

/// How a read loop ended, short of an error.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    /// End of file reached; every line was delivered exactly once.
    Completed { lines: u64, bytes: u64 },

    /// The cancel flag was observed; no further batches were delivered.
    Cancelled,
}

// =============================================================================
// Read loop
// =============================================================================

/// Read `path` incrementally, invoking `on_batch(lines, bytes_read)` with
/// batches of complete lines as they become available.
///
/// `bytes_read` is the cumulative byte offset after the window that
/// produced the batch, for progress reporting against the file size.
/// The final line of a file with no trailing newline is flushed at EOF,
/// so no line is ever dropped at a window boundary.
pub fn read_in_chunks<F>(
    path: &Path,
    config: &ReaderConfig,
    cancel: &AtomicBool,
    mut on_batch: F,
) -> Result<ReadOutcome, ReadError>
where
    F: FnMut(Vec<String>, u64),
{
    let mut file = File::open(path).map_err(|e| ReadError::Open {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut state = FileIngestState::default();
    let mut pending: Vec<String> = Vec::with_capacity(config.batch_lines);
    let mut window = vec![0u8; config.steady_window_bytes.max(config.first_window_bytes)];
    let mut first = true;

    loop {
        if cancel.load(Ordering::SeqCst) {
            tracing::debug!(file = %path.display(), offset = state.offset, "Read cancelled");
            return Ok(ReadOutcome::Cancelled);
        }

        let want = if first {
            config.first_window_bytes
        } else {
            config.steady_window_bytes
        };
        first = false;

        let n = file
            .read(&mut window[..want])
            .map_err(|e| ReadError::Window {
                path: path.to_path_buf(),
                offset: state.offset,
                source: e,
            })?;

        if n == 0 {
            // End of file: the leftover remainder, if any, is the final
            // line (the source had no trailing newline).
            if !state.remaining.is_empty() {
                pending.push(std::mem::take(&mut state.remaining));
            }
            if !pending.is_empty() {
                state.lines_emitted += pending.len() as u64;
                if cancel.load(Ordering::SeqCst) {
                    return Ok(ReadOutcome::Cancelled);
                }
                on_batch(std::mem::take(&mut pending), state.offset);
            }
            state.is_complete = true;
            tracing::debug!(
                file = %path.display(),
                lines = state.lines_emitted,
                bytes = state.offset,
                "Read complete"
            );
            return Ok(ReadOutcome::Completed {
                lines: state.lines_emitted,
                bytes: state.offset,
            });
        }

        state.offset += n as u64;
        let decoded = String::from_utf8_lossy(&window[..n]);
        state.remaining.push_str(&decoded);

        // Split out complete lines; the final segment stays behind as the
        // new remainder.
        while let Some(nl) = state.remaining.find('\n') {
            let mut line: String = state.remaining.drain(..=nl).collect();
            line.pop(); // trailing '\n'
            if line.ends_with('\r') {
                line.pop();
            }
            pending.push(line);
        }

        // A pathological newline-less file must not grow the remainder
        // without bound; force the oversized fragment out as a line.
        if state.remaining.len() > config.max_remainder_bytes {
            tracing::warn!(
                file = %path.display(),
                bytes = state.remaining.len(),
                "No newline within remainder bound, force-flushing fragment"
            );
            pending.push(std::mem::take(&mut state.remaining));
        }

        if pending.len() >= config.batch_lines {
            state.lines_emitted += pending.len() as u64;
            if cancel.load(Ordering::SeqCst) {
                return Ok(ReadOutcome::Cancelled);
            }
            on_batch(std::mem::take(&mut pending), state.offset);
            pending = Vec::with_capacity(config.batch_lines);
        }

        // Cooperative yield between windows: when the reader shares a
        // core with a renderer, this keeps the host responsive.
        std::thread::yield_now();
    }
}
