// logweave - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.
// Every bound on a growing collection or read loop is named here.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "logweave";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Chunked reading limits
// =============================================================================

/// Byte size of the very first read window per file.
///
/// Deliberately smaller than the steady-state window so the first batch of
/// parsed lines (the instant preview) is available quickly even on slow
/// storage, so the consumer sees content before the bulk of the file is read.
pub const FIRST_WINDOW_BYTES: usize = 64 * 1024; // 64 KiB

/// Byte size of every read window after the first.
pub const STEADY_WINDOW_BYTES: usize = 1024 * 1024; // 1 MiB

/// Number of complete lines accumulated before a batch is flushed to the
/// parse stage. Windows that produce fewer lines carry them over to the
/// next flush; end-of-file always flushes whatever remains.
pub const LINE_BATCH_SIZE: usize = 500;

/// Maximum accumulated size of the partial (in-progress) line buffer for a
/// single file. Guards against unbounded growth when a file contains no
/// newlines at all (binary content or one pathological multi-megabyte line).
/// When exceeded, the fragment is force-flushed as a line of its own.
pub const MAX_REMAINDER_BYTES: usize = 4 * STEADY_WINDOW_BYTES; // 4 MiB

// =============================================================================
// Pattern matcher limits
// =============================================================================

/// Maximum number of memoized full-line parse results per parser instance.
/// Once the cache is full, new misses are computed but not cached; entries
/// already present remain valid (keys are exact line text, so no eviction
/// is needed for correctness).
pub const PARSE_CACHE_CAPACITY: usize = 1_000;

/// Maximum number of memoized level-detection results per parser instance.
pub const LEVEL_CACHE_CAPACITY: usize = 1_000;

// =============================================================================
// Delivery limits
// =============================================================================

/// Number of parsed entries per lazily-delivered chunk.
pub const CHUNK_ENTRIES: usize = 200;

/// Fraction of scrolled content (0.0–1.0) at which the next round of
/// chunks is released to the grouping engine.
pub const SCROLL_RELEASE_THRESHOLD: f32 = 0.8;

// =============================================================================
// Grouping limits
// =============================================================================

/// Group key used for entries that do not match the active grouping
/// pattern (custom-mode non-matches, invalid patterns, hour-mode entries
/// with no recognized timestamp).
pub const FALLBACK_GROUP_KEY: &str = "Other";

/// Maximum length of a user-supplied grouping regex, to prevent ReDoS.
pub const MAX_PATTERN_LENGTH: usize = 4_096;

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";
