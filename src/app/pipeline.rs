// logweave - app/pipeline.rs
//
// Ingest lifecycle management. Orchestrates chunked reading and batch
// parsing on a background thread, sending progress messages to the
// consuming thread via an mpsc channel.
//
// Architecture:
//   - `PipelineManager` lives on the consuming thread; `run_ingest` runs
//     on a background thread.
//   - An `Arc<AtomicBool>` cancel flag stops the session cooperatively.
//   - All cross-thread communication is via `IngestProgress` messages.
//   - Files are processed sequentially, one at a time; interleaving
//     happens later at chunk-release time in the delivery controller.
//   - Per-file failures are non-fatal: the failing file is reported and
//     the remaining files continue through their own pipelines.

use crate::app::executor::{BatchExecutor, ExecutorSupervisor};
use crate::app::reader::{self, ReaderConfig, ReadOutcome};
use crate::core::model::{Chunk, FileMeta, IngestProgress, LogEntry};
use crate::util::constants;
use crate::util::error::ReadError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};

// =============================================================================
// Configuration
// =============================================================================

/// Bounds and toggles for one ingest session.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chunked reader windows and batch threshold.
    pub reader: ReaderConfig,

    /// Entries per lazily-delivered chunk.
    pub chunk_entries: usize,

    /// Whether to attempt the off-thread parse worker. The supervisor
    /// still degrades to synchronous parsing on the first failure.
    pub use_worker: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            chunk_entries: constants::CHUNK_ENTRIES,
            use_worker: true,
        }
    }
}

// =============================================================================
// PipelineManager
// =============================================================================

/// Manages an ingest session on a background thread.
pub struct PipelineManager {
    /// Channel receiver for the consumer to poll (or drain) progress.
    pub progress_rx: Option<mpsc::Receiver<IngestProgress>>,

    /// Cancel flag shared with the background thread.
    cancel_flag: Option<Arc<AtomicBool>>,
}

impl PipelineManager {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            cancel_flag: None,
        }
    }

    /// Start ingesting `paths` with the given configuration.
    ///
    /// Spawns a background thread immediately; progress arrives over the
    /// channel. If a session is already running it is cancelled first.
    pub fn start_ingest(&mut self, paths: Vec<PathBuf>, config: PipelineConfig) {
        self.cancel_ingest();

        let (tx, rx) = mpsc::channel();
        let cancel = Arc::new(AtomicBool::new(false));

        self.progress_rx = Some(rx);
        self.cancel_flag = Some(Arc::clone(&cancel));

        let file_count = paths.len();
        std::thread::spawn(move || {
            run_ingest(paths, config, tx, cancel);
        });

        tracing::info!(files = file_count, "Ingest started");
    }

    /// Request cancellation of the running session. The background thread
    /// sends `IngestProgress::Cancelled` and exits; already-emitted
    /// results are not retracted.
    pub fn cancel_ingest(&mut self) {
        if let Some(flag) = &self.cancel_flag {
            flag.store(true, Ordering::SeqCst);
        }
        self.cancel_flag = None;
    }

    /// Poll for progress messages without blocking. Returns all pending.
    pub fn poll_progress(&self) -> Vec<IngestProgress> {
        let mut messages = Vec::new();
        if let Some(ref rx) = self.progress_rx {
            while let Ok(msg) = rx.try_recv() {
                messages.push(msg);
            }
        }
        messages
    }
}

impl Default for PipelineManager {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Background ingest pipeline
// =============================================================================

/// Full ingest pipeline: per file, windowed read → batch parse → preview
/// chunk delivered immediately, remaining chunks queued for lazy release.
///
/// Runs on a background thread. Checks `cancel` before each significant
/// operation (the reader re-checks it before every window).
fn run_ingest(
    paths: Vec<PathBuf>,
    config: PipelineConfig,
    tx: mpsc::Sender<IngestProgress>,
    cancel: Arc<AtomicBool>,
) {
    macro_rules! send {
        ($msg:expr) => {
            if tx.send($msg).is_err() {
                return; // Receiver dropped (consumer closed); exit quietly.
            }
        };
    }

    macro_rules! check_cancel {
        () => {
            if cancel.load(Ordering::SeqCst) {
                send!(IngestProgress::Cancelled);
                return;
            }
        };
    }

    let mut executor = if config.use_worker {
        ExecutorSupervisor::new()
    } else {
        ExecutorSupervisor::local_only()
    };

    // Session-wide monotonic entry IDs across all files.
    let mut entry_id: u64 = 0;
    let mut processed_files: usize = 0;

    for (idx, path) in paths.iter().enumerate() {
        check_cancel!();

        let file = FileMeta {
            file_id: idx as u64,
            file_name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        };

        let size_bytes = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(e) => {
                let err = ReadError::Metadata {
                    path: path.to_path_buf(),
                    source: e,
                };
                tracing::warn!(file = %path.display(), error = %err, "File skipped");
                send!(IngestProgress::FileFailed {
                    file: file.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };

        send!(IngestProgress::FileStarted {
            file: file.clone(),
            size_bytes,
        });

        // Per-file parse state threaded through the reader callback.
        let mut next_line: u64 = 1;
        let mut preview_sent = false;
        let mut channel_open = true;

        let result = reader::read_in_chunks(path, &config.reader, &cancel, |lines, bytes_read| {
            let start_line = next_line;
            next_line += lines.len() as u64;
            let id_start = entry_id;
            entry_id += lines.len() as u64;

            let entries = match executor.parse_batch(lines, &file, start_line, id_start) {
                Ok(entries) => entries,
                Err(e) => {
                    // The supervisor re-parses locally on worker failure,
                    // so an error here means even local parsing failed.
                    tracing::error!(error = %e, "Batch parse failed, batch skipped");
                    return;
                }
            };

            let mut chunks = split_chunks(entries, config.chunk_entries);
            if !preview_sent && !chunks.is_empty() {
                preview_sent = true;
                let preview = chunks.remove(0);
                if tx
                    .send(IngestProgress::Preview {
                        file_id: file.file_id,
                        chunk: preview,
                    })
                    .is_err()
                {
                    channel_open = false;
                }
            }
            if !chunks.is_empty()
                && tx
                    .send(IngestProgress::ChunksReady {
                        file_id: file.file_id,
                        chunks,
                    })
                    .is_err()
            {
                channel_open = false;
            }

            let percent = if size_bytes == 0 {
                100.0
            } else {
                ((bytes_read as f64 / size_bytes as f64) * 100.0).min(100.0) as f32
            };
            if tx
                .send(IngestProgress::Progress {
                    file_id: file.file_id,
                    bytes_read,
                    size_bytes,
                    percent,
                })
                .is_err()
            {
                channel_open = false;
            }

            if !channel_open {
                // Consumer is gone; stop the read loop promptly.
                cancel.store(true, Ordering::SeqCst);
            }
        });

        if !channel_open {
            return;
        }

        match result {
            Ok(ReadOutcome::Completed { lines, .. }) => {
                processed_files += 1;
                send!(IngestProgress::FileComplete {
                    file_id: file.file_id,
                    lines,
                    processed_files,
                });
            }
            Ok(ReadOutcome::Cancelled) => {
                send!(IngestProgress::Cancelled);
                return;
            }
            Err(e) => {
                // Chunks already delivered for this file remain valid;
                // the failure stops this file only.
                tracing::warn!(file = %path.display(), error = %e, "File ingestion failed");
                send!(IngestProgress::FileFailed {
                    file: file.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    check_cancel!();
    send!(IngestProgress::Completed { processed_files });

    tracing::info!(
        files = processed_files,
        entries = entry_id,
        degraded = executor.is_degraded(),
        "Ingest complete"
    );
}

/// Split a parsed batch into delivery-sized chunks.
fn split_chunks(entries: Vec<LogEntry>, chunk_entries: usize) -> Vec<Chunk> {
    if entries.is_empty() {
        return Vec::new();
    }
    let mut chunks = Vec::with_capacity(entries.len() / chunk_entries.max(1) + 1);
    let mut current = Vec::with_capacity(chunk_entries.min(entries.len()));
    for entry in entries {
        current.push(entry);
        if current.len() >= chunk_entries {
            chunks.push(Chunk::new(std::mem::take(&mut current)));
        }
    }
    if !current.is_empty() {
        chunks.push(Chunk::new(current));
    }
    chunks
}
