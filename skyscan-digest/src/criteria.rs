use time::OffsetDateTime;

pub const DEFAULT_WINDOW_HOURS: f64 = 6.0;
pub const DEFAULT_MIN_REPOSTS: u64 = 10;
pub const DEFAULT_MIN_LIKES: u64 = 0;
pub const DEFAULT_MAX_SCAN: usize = 50;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// What one search request asks for. Built once per request, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchCriteria {
    /// Trimmed, non-empty search text.
    pub query: String,
    /// Recency window; posts older than `now - window_hours` are dropped.
    pub window_hours: f64,
    pub min_reposts: u64,
    pub min_likes: u64,
    /// Cap on raw posts fetched from the upstream, not on the result size.
    pub max_scan: usize,
}

impl SearchCriteria {
    /// Criteria with the default window, thresholds and scan cap.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            window_hours: DEFAULT_WINDOW_HOURS,
            min_reposts: DEFAULT_MIN_REPOSTS,
            min_likes: DEFAULT_MIN_LIKES,
            max_scan: DEFAULT_MAX_SCAN,
        }
    }

    /// Earliest admissible timestamp, in epoch milliseconds.
    pub fn cutoff_ms(&self, now: OffsetDateTime) -> i64 {
        let window_ms = (self.window_hours * MS_PER_HOUR).round() as i64;
        epoch_ms(now).saturating_sub(window_ms)
    }
}

pub(crate) fn epoch_ms(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}
