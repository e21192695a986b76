// logweave - core/grouping.rs
//
// Grouping/sorting engine: buckets delivered entries by a grouping key,
// keeps groups sorted by descending size, and layers a composable filter
// stage on top of the grouped data.
//
// Core layer: pure logic, no I/O or threading. Not thread-safe;
// only the single consuming context may touch a GroupSet.

use crate::core::model::{LogEntry, LogLevel};
use crate::util::constants;
use crate::util::error::GroupError;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

// =============================================================================
// Grouping modes
// =============================================================================

/// How entries are bucketed into groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupMode {
    /// Group by detected log level.
    LogLevel,

    /// Group by the sort key's hour of day ("14:00").
    Hour,

    /// Group by the first capture group (or whole match) of a
    /// user-supplied regex applied to the entry content.
    Custom,
}

// =============================================================================
// Group
// =============================================================================

/// A named bucket of entries. Entries keep their delivery order within the
/// group; groups themselves are ordered by descending entry count.
#[derive(Debug, Clone, Serialize)]
pub struct Group {
    pub key: String,
    pub entries: Vec<LogEntry>,
}

impl Group {
    pub fn count(&self) -> usize {
        self.entries.len()
    }
}

// =============================================================================
// Pattern validation (external configuration input)
// =============================================================================

/// Outcome of validating a user-supplied grouping pattern. Invalid input is
/// reported, never raised: the caller shows `error` and keeps the previous
/// pattern active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternValidation {
    pub is_valid: bool,
    pub error: Option<String>,
}

/// Compile a user-supplied grouping pattern, enforcing the length cap.
/// Shared by validation and the grouping pass so both apply identical
/// flags and limits.
fn compile_pattern(pattern: &str, case_sensitive: bool) -> Result<Regex, GroupError> {
    if pattern.len() > constants::MAX_PATTERN_LENGTH {
        return Err(GroupError::PatternTooLong {
            length: pattern.len(),
            max_length: constants::MAX_PATTERN_LENGTH,
        });
    }
    RegexBuilder::new(pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| GroupError::InvalidPattern {
            pattern: pattern.to_owned(),
            source: e,
        })
}

/// Validate a custom grouping pattern without applying it.
///
/// `case_sensitive` mirrors the checkbox next to the pattern input; the
/// validation compiles with the same flags the grouping pass would use.
pub fn validate_pattern(pattern: &str, case_sensitive: bool) -> PatternValidation {
    match compile_pattern(pattern, case_sensitive) {
        Ok(_) => PatternValidation {
            is_valid: true,
            error: None,
        },
        Err(e) => PatternValidation {
            is_valid: false,
            error: Some(e.to_string()),
        },
    }
}

// =============================================================================
// GroupSet
// =============================================================================

/// The grouped view of all delivered entries under one mode/pattern.
///
/// `regroup` rebuilds from scratch (mode or pattern changed); `append`
/// extends in place when new chunks are released under the same mode,
/// without disturbing the membership of already-grouped entries. Both end
/// with a stable descending-count sort, so the tiebreak for equal counts
/// is first-seen order and deterministic for a fixed input.
#[derive(Debug)]
pub struct GroupSet {
    mode: GroupMode,
    /// Compiled custom pattern. `None` in custom mode means the pattern
    /// failed to compile; every entry then routes to the fallback group
    /// rather than aborting the regroup.
    pattern: Option<Regex>,
    groups: Vec<Group>,
    index: HashMap<String, usize>,
}

impl GroupSet {
    /// Build a grouped view of `entries` under the given mode.
    ///
    /// For `GroupMode::Custom`, `pattern` is compiled case-insensitively
    /// exactly once; a compile failure is logged and downgrades every
    /// entry to the fallback group (failure isolation, not an error).
    pub fn regroup(entries: &[LogEntry], mode: GroupMode, pattern: Option<&str>) -> Self {
        let compiled = match (mode, pattern) {
            (GroupMode::Custom, Some(pat)) => match compile_pattern(pat, false) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid grouping pattern, all entries routed to fallback group");
                    None
                }
            },
            _ => None,
        };

        let mut set = Self {
            mode,
            pattern: compiled,
            groups: Vec::new(),
            index: HashMap::new(),
        };
        set.append(entries);
        set
    }

    /// Append newly released entries into existing or new groups, then
    /// restore the descending-count group order. Existing entries are not
    /// re-bucketed.
    pub fn append(&mut self, entries: &[LogEntry]) {
        for entry in entries {
            let key = self.key_for(entry);
            match self.index.get(&key) {
                Some(&i) => self.groups[i].entries.push(entry.clone()),
                None => {
                    self.index.insert(key.clone(), self.groups.len());
                    self.groups.push(Group {
                        key,
                        entries: vec![entry.clone()],
                    });
                }
            }
        }
        self.sort_groups();
    }

    /// Groups in descending-count order.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn mode(&self) -> GroupMode {
        self.mode
    }

    /// Total entries across all groups. Always equals the number of
    /// entries ever appended: every entry lands in exactly one group.
    pub fn total_entries(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum()
    }

    fn key_for(&self, entry: &LogEntry) -> String {
        match self.mode {
            GroupMode::LogLevel => entry.level.label().to_owned(),
            GroupMode::Hour => match entry.timestamp {
                // Hour of the derived sort key, not of the raw substring,
                // so zoned timestamps share one bucket space. A sort key
                // degraded to the epoch carries no usable hour; those
                // entries join the timestamp-less ones in the fallback.
                Some(_) if entry.sort_key != DateTime::<Utc>::UNIX_EPOCH => {
                    entry.sort_key.format("%H:00").to_string()
                }
                _ => constants::FALLBACK_GROUP_KEY.to_owned(),
            },
            GroupMode::Custom => match &self.pattern {
                Some(re) => match re.captures(&entry.content) {
                    Some(caps) => caps
                        .get(1)
                        .or_else(|| caps.get(0))
                        .map(|m| m.as_str().to_owned())
                        .unwrap_or_else(|| constants::FALLBACK_GROUP_KEY.to_owned()),
                    None => constants::FALLBACK_GROUP_KEY.to_owned(),
                },
                None => constants::FALLBACK_GROUP_KEY.to_owned(),
            },
        }
    }

    fn sort_groups(&mut self) {
        // Vec::sort_by is stable: equal counts keep their previous
        // relative order (first-seen for a fresh regroup).
        self.groups
            .sort_by(|a, b| b.entries.len().cmp(&a.entries.len()));
        self.index = self
            .groups
            .iter()
            .enumerate()
            .map(|(i, g)| (g.key.clone(), i))
            .collect();
    }
}

/// One-shot convenience matching the engine contract:
/// `regroup(entries, mode, pattern) -> Vec<Group>`.
pub fn regroup(entries: &[LogEntry], mode: GroupMode, pattern: Option<&str>) -> Vec<Group> {
    GroupSet::regroup(entries, mode, pattern).groups.clone()
}

// =============================================================================
// Filter stage (operates on already-grouped data)
// =============================================================================

/// Secondary filter applied on top of grouped data. All active parts are
/// AND-combined. Filtering never reorders entries within a group; groups
/// emptied by the filter are dropped from the result.
#[derive(Debug, Clone, Default)]
pub struct GroupFilter {
    /// Levels to include (empty = all).
    pub levels: HashSet<LogLevel>,

    /// Case-insensitive substring search over entry content. Empty = off.
    pub text: String,

    /// Case-insensitive substring search over group keys. Empty = off.
    pub key_query: String,
}

impl GroupFilter {
    /// Returns true if no filter parts are active.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty() && self.text.is_empty() && self.key_query.is_empty()
    }

    /// Apply the filter to a grouped view, producing a new group list.
    pub fn apply(&self, groups: &[Group]) -> Vec<Group> {
        if self.is_empty() {
            return groups.to_vec();
        }

        let text_lower = self.text.to_lowercase();
        let key_lower = self.key_query.to_lowercase();

        groups
            .iter()
            .filter(|g| key_lower.is_empty() || g.key.to_lowercase().contains(&key_lower))
            .filter_map(|g| {
                let entries: Vec<LogEntry> = g
                    .entries
                    .iter()
                    .filter(|e| self.matches_entry(e, &text_lower))
                    .cloned()
                    .collect();
                if entries.is_empty() {
                    None
                } else {
                    Some(Group {
                        key: g.key.clone(),
                        entries,
                    })
                }
            })
            .collect()
    }

    fn matches_entry(&self, entry: &LogEntry, text_lower: &str) -> bool {
        if !self.levels.is_empty() && !self.levels.contains(&entry.level) {
            return false;
        }
        if !text_lower.is_empty() && !entry.content.to_lowercase().contains(text_lower) {
            return false;
        }
        true
    }
}

// =============================================================================
// Renderer contract: positional lookup over the grouped view
// =============================================================================

/// One row of the flattened grouped view, as consumed by a fixed-row-height
/// virtualized list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayRow {
    /// Header marker for a group; the index points into the group list.
    Header { group: usize },

    /// An entry at `entry` within group `group`.
    Entry { group: usize, entry: usize },
}

/// Flattened positional index over a grouped (and possibly filtered) view.
/// Built once per grouping/filtering pass; answers "what occupies list
/// position i" in O(1).
#[derive(Debug, Default)]
pub struct DisplayIndex {
    rows: Vec<DisplayRow>,
}

impl DisplayIndex {
    pub fn build(groups: &[Group]) -> Self {
        let total: usize = groups.iter().map(|g| g.entries.len() + 1).sum();
        let mut rows = Vec::with_capacity(total);
        for (gi, group) in groups.iter().enumerate() {
            rows.push(DisplayRow::Header { group: gi });
            for ei in 0..group.entries.len() {
                rows.push(DisplayRow::Entry {
                    group: gi,
                    entry: ei,
                });
            }
        }
        Self { rows }
    }

    pub fn row(&self, index: usize) -> Option<DisplayRow> {
        self.rows.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// =============================================================================
// Chronological merge
// =============================================================================

/// Order entries from all files into one merged timeline: by sort key,
/// then by file and line number so the order is total and stable across
/// identical timestamps.
pub fn sort_chronological(entries: &mut [LogEntry]) {
    entries.sort_by(|a, b| {
        a.sort_key
            .cmp(&b.sort_key)
            .then_with(|| a.file_id.cmp(&b.file_id))
            .then_with(|| a.line_number.cmp(&b.line_number))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::FileMeta;
    use crate::core::pattern::LineParser;

    fn entries_from(lines: &[&str]) -> Vec<LogEntry> {
        let file = FileMeta {
            file_id: 1,
            file_name: "test.log".to_owned(),
        };
        let mut parser = LineParser::new();
        lines
            .iter()
            .enumerate()
            .map(|(i, line)| parser.parse_line(line, i as u64 + 1, i as u64, &file))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Level mode
    // -------------------------------------------------------------------------

    /// Two recognized lines plus a catch-all line, grouped by level. The
    /// catch-all line carries the default INFO level, so no "Other" group
    /// exists in level mode.
    #[test]
    fn test_level_mode_scenario() {
        let entries = entries_from(&[
            "2024-01-01 10:00:00 ERROR boom",
            "not a log line",
            "2024-01-01 10:00:01 INFO ok",
        ]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);

        assert_eq!(groups.len(), 2);
        let error = groups.iter().find(|g| g.key == "ERROR").unwrap();
        assert_eq!(error.count(), 1);
        assert!(error.entries[0].content.contains("boom"));

        let info = groups.iter().find(|g| g.key == "INFO").unwrap();
        assert_eq!(info.count(), 2, "catch-all line defaults to INFO");
        assert!(groups.iter().all(|g| g.key != "Other"));
    }

    /// Conservation: every entry lands in exactly one group, in all modes.
    #[test]
    fn test_grouping_conservation_all_modes() {
        let entries = entries_from(&[
            "2024-01-01 10:00:00 ERROR user=alice boom",
            "2024-01-01 11:00:00 WARN user=bob slow",
            "no timestamp here",
            "2024-01-01 11:30:00 INFO done",
        ]);
        for (mode, pattern) in [
            (GroupMode::LogLevel, None),
            (GroupMode::Hour, None),
            (GroupMode::Custom, Some(r"user=(\w+)")),
        ] {
            let groups = regroup(&entries, mode, pattern);
            let total: usize = groups.iter().map(Group::count).sum();
            assert_eq!(total, entries.len(), "conservation violated in {mode:?}");
        }
    }

    // -------------------------------------------------------------------------
    // Hour mode
    // -------------------------------------------------------------------------

    #[test]
    fn test_hour_mode_buckets() {
        let entries = entries_from(&[
            "2024-01-01 10:05:00 INFO a",
            "2024-01-01 10:55:00 INFO b",
            "2024-01-01 11:00:00 INFO c",
            "no timestamp line",
        ]);
        let groups = regroup(&entries, GroupMode::Hour, None);

        let ten = groups.iter().find(|g| g.key == "10:00").unwrap();
        assert_eq!(ten.count(), 2);
        assert!(groups.iter().any(|g| g.key == "11:00"));
        let other = groups.iter().find(|g| g.key == "Other").unwrap();
        assert_eq!(other.count(), 1, "timestamp-less entries bucket to Other");
    }

    /// A timestamp that matched the cascade but failed chrono parsing has
    /// an epoch sort key and no usable hour: it buckets to "Other", not
    /// to a fabricated midnight group.
    #[test]
    fn test_hour_mode_degraded_timestamp_goes_to_other() {
        let entries = entries_from(&[
            "2024-13-40 25:61:61 impossible date",
            "2024-01-01 10:00:00 INFO a",
        ]);
        let groups = regroup(&entries, GroupMode::Hour, None);

        let other = groups.iter().find(|g| g.key == "Other").unwrap();
        assert_eq!(other.count(), 1);
        assert!(groups.iter().any(|g| g.key == "10:00"));
        assert!(groups.iter().all(|g| g.key != "00:00"));
    }

    // -------------------------------------------------------------------------
    // Custom mode
    // -------------------------------------------------------------------------

    /// Capture group 1 becomes the group key.
    #[test]
    fn test_custom_mode_capture_group_keys() {
        let entries = entries_from(&["2024 user=alice login", "2024 user=bob login"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(r"user=(\w+)"));

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().any(|g| g.key == "alice" && g.count() == 1));
        assert!(groups.iter().any(|g| g.key == "bob" && g.count() == 1));
    }

    /// A pattern without capture groups keys by the whole match.
    #[test]
    fn test_custom_mode_whole_match_key() {
        let entries = entries_from(&["alpha request", "beta request", "alpha again"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(r"alpha|beta"));
        assert!(groups.iter().any(|g| g.key == "alpha" && g.count() == 2));
        assert!(groups.iter().any(|g| g.key == "beta" && g.count() == 1));
    }

    /// The custom pattern is case-insensitive.
    #[test]
    fn test_custom_mode_case_insensitive() {
        let entries = entries_from(&["USER=Alice in", "user=alice out"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(r"user=(alice)"));
        let total: usize = groups.iter().map(Group::count).sum();
        assert_eq!(total, 2);
        assert_eq!(groups.len(), 2, "capture text differs by case: two keys");
    }

    /// Non-matching entries route to "Other" rather than vanishing.
    #[test]
    fn test_custom_mode_non_match_goes_to_other() {
        let entries = entries_from(&["user=alice ok", "no user here"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(r"user=(\w+)"));
        let other = groups.iter().find(|g| g.key == "Other").unwrap();
        assert_eq!(other.count(), 1);
    }

    /// A pattern that fails to compile routes every entry to "Other" and
    /// does not abort the regroup.
    #[test]
    fn test_custom_mode_invalid_pattern_fallback() {
        let entries = entries_from(&["a", "b", "c"]);
        let groups = regroup(&entries, GroupMode::Custom, Some("[unclosed"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "Other");
        assert_eq!(groups[0].count(), 3);
    }

    // -------------------------------------------------------------------------
    // Sort order and incremental append
    // -------------------------------------------------------------------------

    /// Group counts are non-increasing across the returned list.
    #[test]
    fn test_groups_sorted_by_descending_count() {
        let entries = entries_from(&[
            "ERROR a", "ERROR b", "ERROR c", "WARN a", "WARN b", "DEBUG a",
        ]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);
        for pair in groups.windows(2) {
            assert!(pair[0].count() >= pair[1].count());
        }
        assert_eq!(groups[0].key, "ERROR");
    }

    /// Appending released chunks extends existing groups in place: prior
    /// entries keep their group and their order within it.
    #[test]
    fn test_append_preserves_existing_membership() {
        let first = entries_from(&["ERROR one", "INFO two"]);
        let mut set = GroupSet::regroup(&first, GroupMode::LogLevel, None);

        let more = entries_from(&["ERROR three", "ERROR four"]);
        set.append(&more);

        assert_eq!(set.total_entries(), 4);
        let error = set.groups().iter().find(|g| g.key == "ERROR").unwrap();
        assert_eq!(error.count(), 3);
        assert!(error.entries[0].content.contains("one"), "order preserved");
        // After the append ERROR outnumbers INFO and sorts first.
        assert_eq!(set.groups()[0].key, "ERROR");
    }

    // -------------------------------------------------------------------------
    // Pattern validation
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_pattern_ok() {
        let v = validate_pattern(r"user=(\w+)", false);
        assert!(v.is_valid);
        assert_eq!(v.error, None);
    }

    #[test]
    fn test_validate_pattern_invalid_is_reported_not_thrown() {
        let v = validate_pattern("[unclosed", true);
        assert!(!v.is_valid);
        assert!(v.error.is_some());
    }

    #[test]
    fn test_validate_pattern_too_long() {
        let long = "a".repeat(constants::MAX_PATTERN_LENGTH + 1);
        let v = validate_pattern(&long, false);
        assert!(!v.is_valid);
        assert!(v.error.unwrap().contains("exceeds maximum"));
    }

    /// The grouping pass enforces the same length cap as validation: an
    /// over-long pattern routes every entry to the fallback group.
    #[test]
    fn test_custom_mode_overlong_pattern_fallback() {
        let long = "a".repeat(constants::MAX_PATTERN_LENGTH + 1);
        let entries = entries_from(&["x", "y"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(&long));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].key, "Other");
        assert_eq!(groups[0].count(), 2);
    }

    // -------------------------------------------------------------------------
    // Filter stage
    // -------------------------------------------------------------------------

    #[test]
    fn test_filter_drops_empty_groups() {
        let entries = entries_from(&["ERROR boom", "INFO fine"]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);

        let filter = GroupFilter {
            levels: [LogLevel::Error].into_iter().collect(),
            ..Default::default()
        };
        let filtered = filter.apply(&groups);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key, "ERROR");
    }

    #[test]
    fn test_filter_text_preserves_entry_order() {
        let entries = entries_from(&["ERROR one match", "ERROR skip", "ERROR two match"]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);

        let filter = GroupFilter {
            text: "match".to_owned(),
            ..Default::default()
        };
        let filtered = filter.apply(&groups);
        assert_eq!(filtered[0].entries.len(), 2);
        assert!(filtered[0].entries[0].content.contains("one"));
        assert!(filtered[0].entries[1].content.contains("two"));
    }

    #[test]
    fn test_filter_group_key_query() {
        let entries = entries_from(&["user=alice a", "user=bob b"]);
        let groups = regroup(&entries, GroupMode::Custom, Some(r"user=(\w+)"));

        let filter = GroupFilter {
            key_query: "ali".to_owned(),
            ..Default::default()
        };
        let filtered = filter.apply(&groups);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].key, "alice");
    }

    #[test]
    fn test_empty_filter_is_identity() {
        let entries = entries_from(&["ERROR a", "INFO b"]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);
        let filtered = GroupFilter::default().apply(&groups);
        assert_eq!(filtered.len(), groups.len());
    }

    // -------------------------------------------------------------------------
    // Display index
    // -------------------------------------------------------------------------

    #[test]
    fn test_display_index_rows() {
        let entries = entries_from(&["ERROR a", "ERROR b", "INFO c"]);
        let groups = regroup(&entries, GroupMode::LogLevel, None);
        let index = DisplayIndex::build(&groups);

        // One header per group plus one row per entry.
        assert_eq!(index.len(), groups.len() + entries.len());
        assert_eq!(index.row(0), Some(DisplayRow::Header { group: 0 }));
        assert_eq!(index.row(1), Some(DisplayRow::Entry { group: 0, entry: 0 }));
        assert_eq!(index.row(2), Some(DisplayRow::Entry { group: 0, entry: 1 }));
        assert_eq!(index.row(3), Some(DisplayRow::Header { group: 1 }));
        assert_eq!(index.row(index.len()), None);
    }

    // -------------------------------------------------------------------------
    // Chronological merge
    // -------------------------------------------------------------------------

    #[test]
    fn test_sort_chronological_merges_files() {
        let file_a = FileMeta {
            file_id: 1,
            file_name: "a.log".to_owned(),
        };
        let file_b = FileMeta {
            file_id: 2,
            file_name: "b.log".to_owned(),
        };
        let mut parser = LineParser::new();
        let mut entries = vec![
            parser.parse_line("2024-01-01 10:00:02 INFO late", 1, 0, &file_a),
            parser.parse_line("2024-01-01 10:00:01 INFO early", 1, 0, &file_b),
            parser.parse_line("no timestamp", 2, 1, &file_a),
        ];
        sort_chronological(&mut entries);

        // Epoch-default sort keys order first, then by timestamp.
        assert_eq!(entries[0].content, "no timestamp");
        assert!(entries[1].content.contains("early"));
        assert!(entries[2].content.contains("late"));
    }
}
