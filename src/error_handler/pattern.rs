//! Recurring-pattern detection (§4.4 step 5).
//!
//! Patterns are hashed from `(adapter, operation, error type, first 100
//! characters of the message)`, the same coarse fingerprint the teacher's
//! correlation code uses for deduplicating alerts. A pattern is evicted
//! once it has been silent for 24 hours.

use crate::taxonomy::{ErrorCategory, ErrorRecord};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::time::Duration;

const PATTERN_TTL_MILLIS: u64 = 24 * 60 * 60 * 1000;
const SUGGESTION_THRESHOLD: u64 = 5;

/// Hashes the fields that define "the same recurring error".
pub fn pattern_hash(error_type: &str, adapter: &str, operation: &str, message: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    error_type.hash(&mut hasher);
    adapter.hash(&mut hasher);
    operation.hash(&mut hasher);
    message.chars().take(100).collect::<String>().hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone)]
pub struct ErrorPattern {
    pub hash: u64,
    pub occurrences: u64,
    pub first_seen_millis: u64,
    pub last_seen_millis: u64,
    pub affected_adapters: Vec<String>,
    pub category: ErrorCategory,
    pub resolution_suggestions: Vec<String>,
}

impl ErrorPattern {
    fn new(hash: u64, record: &ErrorRecord, now_millis: u64) -> Self {
        Self {
            hash,
            occurrences: 1,
            first_seen_millis: now_millis,
            last_seen_millis: now_millis,
            affected_adapters: vec![record.context.adapter.clone()],
            category: record.category,
            resolution_suggestions: Vec::new(),
        }
    }

    fn record(&mut self, record: &ErrorRecord, now_millis: u64) {
        self.occurrences += 1;
        self.last_seen_millis = now_millis;
        if !self.affected_adapters.contains(&record.context.adapter) {
            self.affected_adapters.push(record.context.adapter.clone());
        }
    }

    fn is_stale(&self, now_millis: u64) -> bool {
        now_millis.saturating_sub(self.last_seen_millis) > PATTERN_TTL_MILLIS
    }
}

/// Heuristic suggestions keyed by category, attached once a pattern has
/// occurred often enough to be worth surfacing (§4.4 step 5).
fn suggestions_for(category: ErrorCategory) -> Vec<String> {
    match category {
        ErrorCategory::Network | ErrorCategory::Timeout => {
            vec!["check upstream site availability".to_string(), "consider widening the adapter timeout".to_string()]
        }
        ErrorCategory::RateLimit => vec!["lower requests-per-minute for this site".to_string()],
        ErrorCategory::Captcha => vec!["rotate user agent or proxy pool".to_string()],
        ErrorCategory::Parsing | ErrorCategory::Validation => {
            vec!["site markup may have changed; review selectors".to_string()]
        }
        ErrorCategory::Authentication => vec!["session cookies may be expiring early".to_string()],
        _ => Vec::new(),
    }
}

/// Tracks recurring error fingerprints across the process lifetime.
#[derive(Debug, Default)]
pub struct PatternTable {
    patterns: HashMap<u64, ErrorPattern>,
}

impl PatternTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `record` under its pattern hash, evicting anything silent for
    /// over 24h first. Returns the updated pattern.
    pub fn record(&mut self, record: &ErrorRecord, now_millis: u64) -> &ErrorPattern {
        self.evict_stale(now_millis);

        let hash = record.pattern_hash;
        match self.patterns.get_mut(&hash) {
            Some(pattern) => pattern.record(record, now_millis),
            None => {
                self.patterns.insert(hash, ErrorPattern::new(hash, record, now_millis));
            }
        }
        let pattern = self.patterns.get_mut(&hash).expect("just inserted or updated");
        if pattern.occurrences >= SUGGESTION_THRESHOLD && pattern.resolution_suggestions.is_empty() {
            pattern.resolution_suggestions = suggestions_for(pattern.category);
        }
        self.patterns.get(&hash).expect("just inserted")
    }

    pub fn get(&self, hash: u64) -> Option<&ErrorPattern> {
        self.patterns.get(&hash)
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    fn evict_stale(&mut self, now_millis: u64) {
        self.patterns.retain(|_, p| !p.is_stale(now_millis));
    }

    /// Sweep stale patterns outside of `record`'s write path, for the
    /// periodic background scan ([`super::ErrorHandler::spawn_pattern_scanner`]).
    pub fn sweep_stale(&mut self, now_millis: u64) {
        self.evict_stale(now_millis);
    }
}

/// Interval for the background pattern-resolution scan (§4.4 step 5).
pub const SCAN_INTERVAL: Duration = Duration::from_secs(30 * 60);
