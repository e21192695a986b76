// logweave - app/executor.rs
//
// Batch parse execution strategies: in-process, or offloaded to a
// dedicated parse worker thread, bridged by message passing.
//
// The supervisor selects the worker strategy at construction and swaps to
// local execution EXACTLY ONCE on the first dispatch failure, a one-way
// degradation, never retried per call, so a dead worker costs one failed
// send rather than one per batch. The failed batch is re-parsed locally,
// so callers always get their entries; degradation is logged, not raised.
//
// Cache isolation: the worker thread owns its own LineParser (and thus
// its own memo caches). No parser state crosses the channel; only line
// batches go in and parsed entries come out.

use crate::core::model::{FileMeta, LogEntry};
use crate::core::pattern::LineParser;
use crate::util::error::ExecutorError;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;

// =============================================================================
// Strategy trait
// =============================================================================

/// A way to turn a batch of raw lines into parsed entries.
///
/// `start_line` is the 1-based line number of the first line in the
/// batch; `id_start` the session-wide ID of the first produced entry.
pub trait BatchExecutor {
    fn parse_batch(
        &mut self,
        lines: Vec<String>,
        file: &FileMeta,
        start_line: u64,
        id_start: u64,
    ) -> Result<Vec<LogEntry>, ExecutorError>;
}

fn parse_with(
    parser: &mut LineParser,
    lines: Vec<String>,
    file: &FileMeta,
    start_line: u64,
    id_start: u64,
) -> Vec<LogEntry> {
    lines
        .into_iter()
        .enumerate()
        .map(|(i, line)| {
            parser.parse_line(&line, start_line + i as u64, id_start + i as u64, file)
        })
        .collect()
}

// =============================================================================
// Local (synchronous, in-process) executor
// =============================================================================

/// Parses batches on the calling thread with its own parser instance.
pub struct LocalExecutor {
    parser: LineParser,
}

impl LocalExecutor {
    pub fn new() -> Self {
        Self {
            parser: LineParser::new(),
        }
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchExecutor for LocalExecutor {
    fn parse_batch(
        &mut self,
        lines: Vec<String>,
        file: &FileMeta,
        start_line: u64,
        id_start: u64,
    ) -> Result<Vec<LogEntry>, ExecutorError> {
        Ok(parse_with(&mut self.parser, lines, file, start_line, id_start))
    }
}

// =============================================================================
// Worker (off-thread) executor
// =============================================================================

struct WorkerRequest {
    lines: Vec<String>,
    file: FileMeta,
    start_line: u64,
    id_start: u64,
}

/// Dispatches batches to a dedicated parse thread over a request/response
/// channel pair. The worker maintains its own independent pattern caches
/// for the calls it serves.
pub struct WorkerExecutor {
    req_tx: Sender<WorkerRequest>,
    resp_rx: Receiver<Vec<LogEntry>>,
    _handle: JoinHandle<()>,
}

impl WorkerExecutor {
    pub fn spawn() -> Result<Self, ExecutorError> {
        let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
        let (resp_tx, resp_rx) = mpsc::channel::<Vec<LogEntry>>();

        let handle = std::thread::Builder::new()
            .name("logweave-parse-worker".to_owned())
            .spawn(move || {
                // The worker's parser lives and dies with the thread.
                let mut parser = LineParser::new();
                while let Ok(req) = req_rx.recv() {
                    let entries = parse_with(
                        &mut parser,
                        req.lines,
                        &req.file,
                        req.start_line,
                        req.id_start,
                    );
                    if resp_tx.send(entries).is_err() {
                        // Supervisor side gone; nothing left to serve.
                        break;
                    }
                }
            })
            .map_err(|e| ExecutorError::Spawn { source: e })?;

        Ok(Self {
            req_tx,
            resp_rx,
            _handle: handle,
        })
    }

    /// A worker whose thread has already exited, so every dispatch fails.
    /// Exercises the supervisor's degradation path in tests.
    #[cfg(test)]
    fn broken() -> Self {
        let (req_tx, req_rx) = mpsc::channel::<WorkerRequest>();
        let (_resp_tx, resp_rx) = mpsc::channel::<Vec<LogEntry>>();
        let handle = std::thread::spawn(move || drop(req_rx));
        Self {
            req_tx,
            resp_rx,
            _handle: handle,
        }
    }
}

impl BatchExecutor for WorkerExecutor {
    fn parse_batch(
        &mut self,
        lines: Vec<String>,
        file: &FileMeta,
        start_line: u64,
        id_start: u64,
    ) -> Result<Vec<LogEntry>, ExecutorError> {
        self.req_tx
            .send(WorkerRequest {
                lines,
                file: file.clone(),
                start_line,
                id_start,
            })
            .map_err(|_| ExecutorError::Dispatch)?;
        self.resp_rx.recv().map_err(|_| ExecutorError::Reply)
    }
}

// =============================================================================
// Supervisor (one-way degradation)
// =============================================================================

enum Strategy {
    Worker(WorkerExecutor),
    Local(LocalExecutor),
}

/// Worker-first batch executor that permanently downgrades to local
/// execution on the first worker failure.
pub struct ExecutorSupervisor {
    strategy: Strategy,
    degraded: bool,
}

impl ExecutorSupervisor {
    /// Worker-first construction. If the worker thread cannot even be
    /// spawned, the supervisor starts out degraded.
    pub fn new() -> Self {
        match WorkerExecutor::spawn() {
            Ok(worker) => Self {
                strategy: Strategy::Worker(worker),
                degraded: false,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Parse worker unavailable, using synchronous parsing");
                Self {
                    strategy: Strategy::Local(LocalExecutor::new()),
                    degraded: true,
                }
            }
        }
    }

    /// Synchronous-only construction (no worker thread at all).
    pub fn local_only() -> Self {
        Self {
            strategy: Strategy::Local(LocalExecutor::new()),
            degraded: false,
        }
    }

    #[cfg(test)]
    fn with_broken_worker() -> Self {
        Self {
            strategy: Strategy::Worker(WorkerExecutor::broken()),
            degraded: false,
        }
    }

    /// True once the worker strategy has been abandoned.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Drop the worker and re-run the failed batch in-process. Called at
    /// most once per supervisor lifetime.
    fn degrade(
        &mut self,
        cause: ExecutorError,
        lines: Vec<String>,
        file: &FileMeta,
        start_line: u64,
        id_start: u64,
    ) -> Vec<LogEntry> {
        tracing::warn!(
            error = %cause,
            "Parse worker failed, permanently downgrading to synchronous parsing"
        );
        let mut local = LocalExecutor::new();
        let entries = parse_with(&mut local.parser, lines, file, start_line, id_start);
        self.strategy = Strategy::Local(local);
        self.degraded = true;
        entries
    }
}

impl Default for ExecutorSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchExecutor for ExecutorSupervisor {
    fn parse_batch(
        &mut self,
        lines: Vec<String>,
        file: &FileMeta,
        start_line: u64,
        id_start: u64,
    ) -> Result<Vec<LogEntry>, ExecutorError> {
        let (cause, retry) = match &mut self.strategy {
            Strategy::Local(local) => {
                return local.parse_batch(lines, file, start_line, id_start)
            }
            Strategy::Worker(worker) => {
                // The worker consumes the batch on success; keep a copy so
                // the degradation path can re-parse it locally.
                let retry = lines.clone();
                match worker.parse_batch(lines, file, start_line, id_start) {
                    Ok(entries) => return Ok(entries),
                    Err(e) => (e, retry),
                }
            }
        };
        Ok(self.degrade(cause, retry, file, start_line, id_start))
    }
}
