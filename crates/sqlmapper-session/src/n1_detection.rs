//! N+1 query detection for nested-query associations.
//!
//! Every secondary fetch of a nested-query association is one extra statement
//! per owning entity. Loading N blogs and then touching each blog's lazy
//! `author` issues N+1 statements where one joined select would do. The
//! tracker counts fetches per (owner type, property) and warns once a pair
//! reaches the threshold.
//!
//! The usual fix is a nested-result association fed by a join:
//!
//! ```text
//! association(author) -> query selectAuthor       N+1 statements
//! association(author) -> nested AuthorResultMap   1 statement
//! ```

use std::collections::HashMap;

/// Tracks nested-query loads for N+1 detection.
#[derive(Debug)]
pub struct N1QueryTracker {
    /// (owner_type, property) -> load count
    counts: HashMap<(String, String), usize>,
    /// Threshold for warning (loads per association)
    threshold: usize,
    /// Whether detection is enabled
    enabled: bool,
}

impl Default for N1QueryTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about N+1 detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct N1Stats {
    /// Total number of nested-query loads recorded
    pub total_loads: usize,
    /// Number of distinct associations loaded
    pub associations_loaded: usize,
    /// Number of associations that reached the threshold
    pub potential_n1: usize,
}

impl N1QueryTracker {
    /// Create a new tracker with default threshold (3).
    #[must_use]
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
            threshold: 3,
            enabled: true,
        }
    }

    /// Build a tracker from the `n1_threshold` setting.
    #[must_use]
    pub fn from_threshold(threshold: Option<usize>) -> Self {
        let mut tracker = Self::new();
        match threshold {
            Some(t) => tracker.threshold = t.max(1),
            None => tracker.enabled = false,
        }
        tracker
    }

    /// Set the threshold for N+1 warnings.
    #[must_use]
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold.max(1);
        self
    }

    #[must_use]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Record one nested-query load.
    ///
    /// Emits a warning when the count for the (owner_type, property) pair
    /// reaches the threshold.
    pub fn record_load(&mut self, owner_type: &str, property: &str, statement: &str) {
        if !self.enabled {
            return;
        }

        let count = self
            .counts
            .entry((owner_type.to_string(), property.to_string()))
            .or_insert(0);
        *count += 1;

        if *count == self.threshold {
            tracing::warn!(
                target: "sqlmapper::n1",
                owner = owner_type,
                property = property,
                statement = statement,
                queries = *count,
                threshold = self.threshold,
                "N+1 QUERY PATTERN DETECTED! Consider a nested result map fed by a join."
            );
        }
    }

    /// Reset all counts.
    pub fn reset(&mut self) {
        self.counts.clear();
    }

    /// Get the current count for a specific association.
    #[must_use]
    pub fn count_for(&self, owner_type: &str, property: &str) -> usize {
        self.counts
            .get(&(owner_type.to_string(), property.to_string()))
            .copied()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn stats(&self) -> N1Stats {
        N1Stats {
            total_loads: self.counts.values().sum(),
            associations_loaded: self.counts.len(),
            potential_n1: self
                .counts
                .values()
                .filter(|c| **c >= self.threshold)
                .count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracker_new_defaults() {
        let tracker = N1QueryTracker::new();
        assert_eq!(tracker.threshold(), 3);
        assert!(tracker.is_enabled());
    }

    #[test]
    fn test_tracker_from_setting() {
        assert_eq!(N1QueryTracker::from_threshold(Some(5)).threshold(), 5);
        assert!(!N1QueryTracker::from_threshold(None).is_enabled());
        assert_eq!(N1QueryTracker::from_threshold(Some(0)).threshold(), 1);
    }

    #[test]
    fn test_tracker_records_multiple_associations() {
        let mut tracker = N1QueryTracker::new();
        tracker.record_load("Blog", "author", "selectAuthor");
        tracker.record_load("Blog", "author", "selectAuthor");
        tracker.record_load("Blog", "comments", "selectComments");
        tracker.record_load("Author", "blogs", "selectBlogs");

        assert_eq!(tracker.count_for("Blog", "author"), 2);
        assert_eq!(tracker.count_for("Blog", "comments"), 1);
        assert_eq!(tracker.count_for("Author", "blogs"), 1);
        assert_eq!(tracker.count_for("Author", "missing"), 0);
    }

    #[test]
    fn test_tracker_disabled_no_recording() {
        let mut tracker = N1QueryTracker::new();
        tracker.disable();
        tracker.record_load("Blog", "author", "selectAuthor");
        assert_eq!(tracker.count_for("Blog", "author"), 0);

        tracker.enable();
        tracker.record_load("Blog", "author", "selectAuthor");
        assert_eq!(tracker.count_for("Blog", "author"), 1);
    }

    #[test]
    fn test_stats_and_reset() {
        let mut tracker = N1QueryTracker::new().with_threshold(2);
        for _ in 0..3 {
            tracker.record_load("Blog", "author", "selectAuthor");
        }
        tracker.record_load("Blog", "comments", "selectComments");

        let stats = tracker.stats();
        assert_eq!(stats.total_loads, 4);
        assert_eq!(stats.associations_loaded, 2);
        assert_eq!(stats.potential_n1, 1);

        tracker.reset();
        assert_eq!(tracker.stats(), N1Stats::default());
    }
}
