use std::sync::Arc;

use foundation::{Aabb2, SessionId};
use tokio::sync::watch;
use tracing::debug;

use crate::record::Record;

/// Immutable view of what is currently displayed.
#[derive(Debug, Clone, Default)]
pub struct SinkSnapshot {
    /// Session that owns the sink, if any.
    pub session: Option<SessionId>,
    pub records: Arc<Vec<Record>>,
    /// Records with a valid position.
    pub positioned: usize,
    /// Extent of all valid positions, `[lon, lat]`.
    pub bounds: Option<Aabb2>,
    /// Bumped on every reset and accepted append.
    pub version: u64,
}

impl SinkSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records a map can actually place.
    pub fn positioned(&self) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(|r| r.has_position())
    }
}

/// The record collection the rendering surface reads.
///
/// Only the session that last called [`ResultSink::reset`] may append; a
/// batch from any other session is dropped. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct ResultSink {
    state: Arc<watch::Sender<SinkSnapshot>>,
}

impl ResultSink {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SinkSnapshot::default());
        Self {
            state: Arc::new(tx),
        }
    }

    /// Empties the sink and hands it to `owner`.
    pub fn reset(&self, owner: SessionId) {
        self.state.send_modify(|s| {
            s.session = Some(owner);
            s.records = Arc::new(Vec::new());
            s.positioned = 0;
            s.bounds = None;
            s.version += 1;
        });
    }

    /// Empties the sink without an owner; every append is ignored until the
    /// next reset.
    pub fn clear(&self) {
        self.state.send_modify(|s| {
            s.session = None;
            s.records = Arc::new(Vec::new());
            s.positioned = 0;
            s.bounds = None;
            s.version += 1;
        });
    }

    /// Appends in order. Returns `false` if `owner` does not own the sink.
    pub fn append(&self, owner: SessionId, records: &[Record]) -> bool {
        let mut accepted = false;
        self.state.send_if_modified(|s| {
            if s.session != Some(owner) {
                debug!(session = %owner, "sink owned by another session; batch dropped");
                return false;
            }
            accepted = true;
            if records.is_empty() {
                return false;
            }
            let all = Arc::make_mut(&mut s.records);
            all.reserve(records.len());
            for r in records {
                if let Some(p) = r.position() {
                    s.positioned += 1;
                    s.bounds = Some(Aabb2::include(s.bounds, p));
                }
                all.push(r.clone());
            }
            s.version += 1;
            true
        });
        accepted
    }

    pub fn snapshot(&self) -> SinkSnapshot {
        self.state.borrow().clone()
    }

    pub fn owner(&self) -> Option<SessionId> {
        self.state.borrow().session
    }

    /// Receiver that observes every reset and append.
    pub fn subscribe(&self) -> watch::Receiver<SinkSnapshot> {
        self.state.subscribe()
    }
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}
