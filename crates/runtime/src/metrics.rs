/// Running min/max/sum of a sampled value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Histogram {
    pub count: u64,
    pub sum: u64,
    pub min: u64,
    pub max: u64,
}

impl Histogram {
    pub fn record(&mut self, value: u64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> Option<u64> {
        (self.count > 0).then(|| self.sum / self.count)
    }
}

/// Counters describing what one session did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionMetrics {
    /// Session cursor of every fetch issued, in issue order.
    pub fetched_cursors: Vec<u32>,
    pub records_appended: u64,
    /// Appended records without a usable position.
    pub records_unpositioned: u64,
    /// Records dropped because the scope's total was already reached.
    pub records_truncated: u64,
    pub stale_batches_discarded: u32,
    pub fetch_latency_ms: Histogram,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fetches(&self) -> usize {
        self.fetched_cursors.len()
    }

    pub fn record_fetch(&mut self, cursor: u32, latency_ms: u64) {
        self.fetched_cursors.push(cursor);
        self.fetch_latency_ms.record(latency_ms);
    }

    pub fn record_batch(&mut self, appended: usize, unpositioned: usize, truncated: usize) {
        self.records_appended += appended as u64;
        self.records_unpositioned += unpositioned as u64;
        self.records_truncated += truncated as u64;
    }

    pub fn record_stale(&mut self) {
        self.stale_batches_discarded += 1;
    }
}
