// logweave - core/pattern.rs
//
// Per-line pattern matching: an ordered cascade of timestamp-capturing
// regexes plus keyword-based level detection, both memoized through
// bounded caches owned by one parser instance.
//
// Core layer: pure logic, no I/O. Each execution context (pipeline thread,
// parse worker) constructs its own LineParser; caches are never shared.

use crate::core::model::{FileMeta, LogEntry, LogLevel};
use crate::util::constants;
use chrono::{DateTime, Datelike, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

// =============================================================================
// Parsed line (position-independent parse result)
// =============================================================================

/// The position-independent result of parsing one line: everything except
/// the entry ID and line number, which vary by position and are therefore
/// excluded from the memoization key space.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// Original timestamp substring, untouched. `None` for the catch-all.
    pub timestamp: Option<String>,

    /// Detected level (default `Info`).
    pub level: LogLevel,

    /// Line text after the timestamp (the whole line for the catch-all).
    pub message: String,

    /// Comparable ordering key derived from `timestamp`; Unix epoch when
    /// no timestamp was recognized.
    pub sort_key: DateTime<Utc>,
}

// =============================================================================
// Bounded memo cache
// =============================================================================

/// Insert-bounded memoization cache keyed by exact text.
///
/// Once full, new misses are computed but not stored. Entries already
/// cached stay valid forever because keys are exact input text and parse
/// results are deterministic, so no eviction or invalidation is needed.
#[derive(Debug)]
pub struct BoundedCache<V> {
    map: HashMap<String, V>,
    capacity: usize,
}

impl<V: Clone> BoundedCache<V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.map.get(key)
    }

    /// Store `value` under `key` unless the cache is at capacity.
    pub fn insert(&mut self, key: &str, value: V) {
        if self.map.len() < self.capacity {
            self.map.insert(key.to_owned(), value);
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// Pattern cascade
// =============================================================================

/// One cascade candidate: a regex that anchors a timestamp at the start of
/// the line, plus a parsing function converting the matched timestamp text
/// to a comparable `DateTime<Utc>`.
///
/// Capture groups by contract: group 1 = timestamp, group 2 = message.
struct LinePattern {
    re: Regex,
    to_sort_key: fn(&str) -> Option<DateTime<Utc>>,
}

/// The ordered cascade. Earlier patterns take priority; the final
/// catch-all (handled separately in `parse_parts`) guarantees that every
/// line produces a result, so no line is ever unparseable.
fn patterns() -> &'static [LinePattern] {
    static PATTERNS: OnceLock<Vec<LinePattern>> = OnceLock::new();

    PATTERNS.get_or_init(|| {
        // Patterns are exercised by the unit tests below, so a regex
        // mistake shows up as a failing test rather than a runtime panic.
        fn re(pat: &str) -> Regex {
            Regex::new(pat).expect("pattern cascade: invalid regex")
        }

        vec![
            // -----------------------------------------------------------------
            // ISO-like: YYYY-MM-DD HH:MM:SS[.fff]
            // Example: 2024-01-15 14:30:22.123 ERROR boom
            // -----------------------------------------------------------------
            LinePattern {
                re: re(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)\s*(.*)$"),
                to_sort_key: |s| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
                        .ok()
                        .map(|ndt| ndt.and_utc())
                },
            },
            // -----------------------------------------------------------------
            // US slash: MM/DD/YYYY HH:MM:SS
            // Example: 01/15/2024 14:30:22 Connection accepted
            // -----------------------------------------------------------------
            LinePattern {
                re: re(r"^(\d{2}/\d{2}/\d{4} \d{2}:\d{2}:\d{2})\s*(.*)$"),
                to_sort_key: |s| {
                    NaiveDateTime::parse_from_str(s, "%m/%d/%Y %H:%M:%S")
                        .ok()
                        .map(|ndt| ndt.and_utc())
                },
            },
            // -----------------------------------------------------------------
            // BSD syslog year-less: Mon DD HH:MM:SS (space-padded day: Jan  5)
            // Year is injected from current UTC year (best-effort).
            // -----------------------------------------------------------------
            LinePattern {
                re: re(r"^([A-Z][a-z]{2}\s+\d{1,2} \d{2}:\d{2}:\d{2})\s*(.*)$"),
                to_sort_key: |s| {
                    let year = Utc::now().year();
                    let with_year = format!("{year} {s}");
                    NaiveDateTime::parse_from_str(&with_year, "%Y %b %e %H:%M:%S")
                        .ok()
                        .map(|ndt| ndt.and_utc())
                },
            },
            // -----------------------------------------------------------------
            // ISO 8601 with T separator, optional fraction and timezone.
            // Examples: 2024-01-15T14:30:22Z, 2024-01-15T14:30:22.123+05:30
            // -----------------------------------------------------------------
            LinePattern {
                re: re(
                    r"^(\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:\.\d+)?(?:Z|[+-]\d{2}:?\d{2})?)\s*(.*)$",
                ),
                to_sort_key: |s| {
                    DateTime::parse_from_rfc3339(s)
                        .ok()
                        .map(|dt| dt.into())
                        .or_else(|| {
                            // No timezone suffix: parse as naive and assume UTC.
                            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                                .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
                                .ok()
                                .map(|ndt| ndt.and_utc())
                        })
                },
            },
            // -----------------------------------------------------------------
            // Bare time of day: HH:MM:SS[.fff]
            // Anchored to the epoch date so entries order by time of day.
            // -----------------------------------------------------------------
            LinePattern {
                re: re(r"^(\d{2}:\d{2}:\d{2}(?:\.\d+)?)\s*(.*)$"),
                to_sort_key: |s| {
                    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
                        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
                        .ok()
                        .map(|t| DateTime::<Utc>::UNIX_EPOCH.date_naive().and_time(t).and_utc())
                },
            },
        ]
    })
}

// =============================================================================
// Level detection
// =============================================================================

/// Keyword table in priority order: the first group with a matching token
/// wins, so "error" beats a later "info" on the same line.
const LEVEL_KEYWORDS: &[(&[&str], LogLevel)] = &[
    (&["error", "fail", "exception"], LogLevel::Error),
    (&["warn"], LogLevel::Warn),
    (&["debug"], LogLevel::Debug),
    (&["trace"], LogLevel::Trace),
    (&["info"], LogLevel::Info),
];

/// Case-insensitive substring level detection with the historical default
/// of `Info` for lines carrying no level token at all. The default applies
/// even to lines that only matched the catch-all and may visually look
/// like errors; callers relying on level grouping should be aware that
/// unclassifiable lines land in INFO.
fn detect_level(text: &str) -> LogLevel {
    let lower = text.to_lowercase();
    for (tokens, level) in LEVEL_KEYWORDS {
        if tokens.iter().any(|t| lower.contains(t)) {
            return *level;
        }
    }
    LogLevel::Info
}

// =============================================================================
// LineParser
// =============================================================================

/// Pattern matcher with per-instance memoization.
///
/// Owns two bounded caches: full-line parse results keyed by exact line
/// text, and level-detection results keyed by the message text the keyword
/// scan actually runs over. Keying levels by message lets repeated messages
/// under distinct timestamps hit the level cache even when the full-line
/// cache misses.
/// Never a process-wide singleton: the pipeline thread and the parse
/// worker each construct their own instance, so cache state never crosses
/// execution contexts.
#[derive(Debug)]
pub struct LineParser {
    parse_cache: BoundedCache<ParsedLine>,
    level_cache: BoundedCache<LogLevel>,
}

impl LineParser {
    pub fn new() -> Self {
        Self::with_capacity(
            constants::PARSE_CACHE_CAPACITY,
            constants::LEVEL_CACHE_CAPACITY,
        )
    }

    /// Construct with explicit cache bounds (tests use small bounds to
    /// exercise the at-capacity path).
    pub fn with_capacity(parse_capacity: usize, level_capacity: usize) -> Self {
        Self {
            parse_cache: BoundedCache::new(parse_capacity),
            level_cache: BoundedCache::new(level_capacity),
        }
    }

    /// Parse one line into its position-independent parts.
    ///
    /// Tries the cascade in order and returns the first successful
    /// extraction; lines matching no timestamp pattern degrade to the
    /// catch-all (no timestamp, whole line as message). Never fails.
    pub fn parse_parts(&mut self, content: &str) -> ParsedLine {
        if let Some(cached) = self.parse_cache.get(content) {
            return cached.clone();
        }

        let parts = self.parse_uncached(content);
        self.parse_cache.insert(content, parts.clone());
        parts
    }

    /// Full per-line contract: parse and assemble a `LogEntry`.
    pub fn parse_line(
        &mut self,
        content: &str,
        line_number: u64,
        id: u64,
        file: &FileMeta,
    ) -> LogEntry {
        let parts = self.parse_parts(content);
        LogEntry {
            id,
            file_id: file.file_id,
            file_name: file.file_name.clone(),
            line_number,
            content: content.to_owned(),
            timestamp: parts.timestamp,
            level: parts.level,
            sort_key: parts.sort_key,
        }
    }

    /// Number of memoized full-line results currently held.
    pub fn cached_lines(&self) -> usize {
        self.parse_cache.len()
    }

    /// Number of memoized level-detection results currently held.
    pub fn cached_levels(&self) -> usize {
        self.level_cache.len()
    }

    fn parse_uncached(&mut self, content: &str) -> ParsedLine {
        for pattern in patterns() {
            if let Some(caps) = pattern.re.captures(content) {
                // Group 1 is the timestamp, group 2 the message, by the
                // cascade's capture contract.
                let raw_ts = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
                let message = caps
                    .get(2)
                    .map(|m| m.as_str().to_owned())
                    .unwrap_or_default();

                // A matched timestamp that fails chrono parsing (e.g. month
                // 13) still keeps the original substring; only the sort key
                // degrades to the epoch.
                let sort_key =
                    (pattern.to_sort_key)(raw_ts).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

                let level = self.level_for(&message);
                return ParsedLine {
                    timestamp: Some(raw_ts.to_owned()),
                    level,
                    message,
                    sort_key,
                };
            }
        }

        // Catch-all: every line parses, degraded to defaults.
        ParsedLine {
            timestamp: None,
            level: self.level_for(content),
            message: content.to_owned(),
            sort_key: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    fn level_for(&mut self, text: &str) -> LogLevel {
        if let Some(level) = self.level_cache.get(text) {
            return *level;
        }
        let level = detect_level(text);
        self.level_cache.insert(text, level);
        level
    }
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> ParsedLine {
        LineParser::new().parse_parts(line)
    }

    fn sort_key_str(parts: &ParsedLine) -> String {
        parts.sort_key.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    // -------------------------------------------------------------------------
    // Cascade order and extraction
    // -------------------------------------------------------------------------

    #[test]
    fn test_iso_space_timestamp() {
        let parts = parse("2024-01-15 14:30:22 ERROR boom");
        assert_eq!(parts.timestamp.as_deref(), Some("2024-01-15 14:30:22"));
        assert_eq!(parts.level, LogLevel::Error);
        assert_eq!(parts.message, "ERROR boom");
        assert_eq!(sort_key_str(&parts), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_iso_space_with_millis() {
        let parts = parse("2024-01-15 14:30:22.123 INFO ok");
        assert_eq!(parts.timestamp.as_deref(), Some("2024-01-15 14:30:22.123"));
        assert_eq!(sort_key_str(&parts), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_us_slash_timestamp() {
        let parts = parse("01/15/2024 14:30:22 request handled");
        assert_eq!(parts.timestamp.as_deref(), Some("01/15/2024 14:30:22"));
        assert_eq!(sort_key_str(&parts), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_syslog_timestamp_injects_current_year() {
        let parts = parse("Jan 15 14:30:22 hostname sshd[1]: accepted");
        assert_eq!(parts.timestamp.as_deref(), Some("Jan 15 14:30:22"));
        let year: i32 = parts.sort_key.format("%Y").to_string().parse().unwrap();
        assert!(year >= 2024, "injected year {year} should be recent");
        assert_eq!(
            parts.sort_key.format("%m-%d %H:%M:%S").to_string(),
            "01-15 14:30:22"
        );
    }

    #[test]
    fn test_iso_t_timestamp_with_zone() {
        let parts = parse("2024-01-15T14:30:22+05:30 started");
        assert_eq!(parts.timestamp.as_deref(), Some("2024-01-15T14:30:22+05:30"));
        // Converted to UTC for ordering; original substring untouched.
        assert_eq!(sort_key_str(&parts), "2024-01-15 09:00:22");
    }

    #[test]
    fn test_iso_t_timestamp_naive() {
        let parts = parse("2024-01-15T14:30:22 started");
        assert_eq!(sort_key_str(&parts), "2024-01-15 14:30:22");
    }

    #[test]
    fn test_bare_time_anchors_to_epoch_date() {
        let parts = parse("14:30:22 tick");
        assert_eq!(parts.timestamp.as_deref(), Some("14:30:22"));
        assert_eq!(sort_key_str(&parts), "1970-01-01 14:30:22");
        assert_eq!(parts.message, "tick");
    }

    #[test]
    fn test_catch_all_never_fails() {
        let parts = parse("not a log line");
        assert_eq!(parts.timestamp, None);
        assert_eq!(parts.level, LogLevel::Info);
        assert_eq!(parts.message, "not a log line");
        assert_eq!(parts.sort_key, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn test_empty_line_parses() {
        let parts = parse("");
        assert_eq!(parts.timestamp, None);
        assert_eq!(parts.message, "");
    }

    /// Earlier patterns take priority: a line that could match both the
    /// ISO-space pattern and the bare-time pattern must use the former.
    #[test]
    fn test_cascade_priority_order() {
        let parts = parse("2024-01-15 14:30:22 body");
        assert_eq!(parts.timestamp.as_deref(), Some("2024-01-15 14:30:22"));
        assert_ne!(sort_key_str(&parts), "1970-01-01 14:30:22");
    }

    /// A cascade match whose timestamp text fails chrono parsing keeps the
    /// original substring but degrades the sort key to the epoch.
    #[test]
    fn test_unparseable_matched_timestamp_degrades_sort_key() {
        let parts = parse("2024-13-40 25:61:61 impossible date");
        assert_eq!(parts.timestamp.as_deref(), Some("2024-13-40 25:61:61"));
        assert_eq!(parts.sort_key, DateTime::<Utc>::UNIX_EPOCH);
    }

    // -------------------------------------------------------------------------
    // Level detection
    // -------------------------------------------------------------------------

    #[test]
    fn test_level_priority() {
        assert_eq!(detect_level("ERROR something"), LogLevel::Error);
        assert_eq!(detect_level("operation FAILED"), LogLevel::Error);
        assert_eq!(detect_level("unhandled Exception"), LogLevel::Error);
        assert_eq!(detect_level("WARN disk almost full"), LogLevel::Warn);
        assert_eq!(detect_level("DEBUG cache hit"), LogLevel::Debug);
        assert_eq!(detect_level("TRACE enter fn"), LogLevel::Trace);
        assert_eq!(detect_level("INFO all good"), LogLevel::Info);
        assert_eq!(detect_level("nothing to see"), LogLevel::Info);
    }

    /// "error" outranks "info" when both tokens appear on one line.
    #[test]
    fn test_level_error_beats_info() {
        assert_eq!(detect_level("info: error while saving"), LogLevel::Error);
    }

    #[test]
    fn test_level_case_insensitive() {
        assert_eq!(detect_level("eRrOr"), LogLevel::Error);
        assert_eq!(detect_level("Warning"), LogLevel::Warn);
    }

    // -------------------------------------------------------------------------
    // Memoization
    // -------------------------------------------------------------------------

    /// Idempotent parse: identical results whether served cold, from
    /// cache, or with the cache full.
    #[test]
    fn test_parse_idempotent_across_cache_states() {
        let line = "2024-01-15 14:30:22 ERROR boom";

        let mut parser = LineParser::new();
        let first = parser.parse_parts(line);
        let second = parser.parse_parts(line);
        assert_eq!(first, second);

        // Zero-capacity caches: nothing is ever stored, results identical.
        let mut uncached = LineParser::with_capacity(0, 0);
        let third = uncached.parse_parts(line);
        assert_eq!(first, third);
        assert_eq!(uncached.cached_lines(), 0);
    }

    /// Once the cache is at capacity new misses are not stored, but
    /// already-cached entries keep being served.
    #[test]
    fn test_cache_bounded_insertion() {
        let mut parser = LineParser::with_capacity(2, 2);
        parser.parse_parts("line one");
        parser.parse_parts("line two");
        assert_eq!(parser.cached_lines(), 2);

        parser.parse_parts("line three");
        assert_eq!(parser.cached_lines(), 2, "cache must not grow past capacity");

        // Cached entries still hit.
        let again = parser.parse_parts("line one");
        assert_eq!(again.message, "line one");
    }

    /// The level cache is keyed by message text, so the same message under
    /// two different timestamps costs two parse-cache slots but only one
    /// level-cache slot.
    #[test]
    fn test_level_cache_shared_across_timestamps() {
        let mut parser = LineParser::new();
        let first = parser.parse_parts("2024-01-01 10:00:00 ERROR boom");
        let second = parser.parse_parts("2024-01-01 10:00:01 ERROR boom");

        assert_eq!(first.level, LogLevel::Error);
        assert_eq!(second.level, LogLevel::Error);
        assert_eq!(parser.cached_lines(), 2);
        assert_eq!(
            parser.cached_levels(),
            1,
            "identical messages share one level-cache entry"
        );
    }

    #[test]
    fn test_parse_line_assembles_entry() {
        let file = FileMeta {
            file_id: 7,
            file_name: "app.log".to_owned(),
        };
        let mut parser = LineParser::new();
        let entry = parser.parse_line("2024-01-15 14:30:22 WARN low disk", 42, 9, &file);
        assert_eq!(entry.id, 9);
        assert_eq!(entry.file_id, 7);
        assert_eq!(entry.file_name, "app.log");
        assert_eq!(entry.line_number, 42);
        assert_eq!(entry.level, LogLevel::Warn);
        assert_eq!(entry.content, "2024-01-15 14:30:22 WARN low disk");
        assert_eq!(entry.timestamp.as_deref(), Some("2024-01-15 14:30:22"));
    }
}
