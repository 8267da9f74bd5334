/// Caps how many records a session may still accept.
///
/// Works like a frame budget, but the units are records and the initial amount
/// is the scope's precomputed total. Once exhausted, further batches are
/// truncated to nothing, which keeps a session from ever holding more records
/// than the totals table says exist.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RecordBudget {
    remaining: u64,
}

impl RecordBudget {
    pub fn new(total: u64) -> Self {
        Self { remaining: total }
    }

    /// Budget left after `used` records have already been accepted.
    pub fn remaining_of(total: u64, used: u64) -> Self {
        Self {
            remaining: total.saturating_sub(used),
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Grants up to `requested` records and returns how many were granted.
    pub fn grant(&mut self, requested: usize) -> usize {
        let granted = (requested as u64).min(self.remaining);
        self.remaining -= granted;
        granted as usize
    }
}
