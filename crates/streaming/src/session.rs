use catalog::Scope;
use foundation::SessionId;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::record::Record;

/// Lifecycle of one loading session.
///
/// `Idle → Fetching → {Waiting → Fetching}* → Completed`; any non-terminal
/// state may move to `Cancelled`, and a failed fetch moves to `Halted`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Idle,
    Fetching,
    Waiting,
    Completed,
    Cancelled,
    Halted,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionStatus::Completed | SessionStatus::Cancelled | SessionStatus::Halted
        )
    }

    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;
        match (self, next) {
            (Idle, Fetching | Completed | Cancelled) => true,
            (Fetching, Waiting | Completed | Cancelled | Halted) => true,
            (Waiting, Fetching | Completed | Cancelled) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Fetching => "fetching",
            SessionStatus::Waiting => "waiting",
            SessionStatus::Completed => "completed",
            SessionStatus::Cancelled => "cancelled",
            SessionStatus::Halted => "halted",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authoritative state of one loading effort.
///
/// The cursor is a page number in units of the session's base page size.
/// Cursor 0 is the preview request of an initial load; regular pages start
/// at 1. `covered` is the record offset up to which the backend's ordering
/// has already been consumed, which is what keeps overlapping fetch windows
/// from producing duplicates.
#[derive(Debug)]
pub struct LoadSession {
    id: SessionId,
    scope: Scope,
    cursor: u32,
    covered: u64,
    accumulated: Vec<Record>,
    in_flight: bool,
    cancel: CancellationToken,
    status: watch::Sender<SessionStatus>,
}

impl LoadSession {
    pub fn create(id: SessionId, scope: Scope) -> Self {
        Self::with_cursor(id, scope, 1)
    }

    /// Session whose first fetch is the small preview page.
    pub fn create_with_preview(id: SessionId, scope: Scope) -> Self {
        Self::with_cursor(id, scope, 0)
    }

    fn with_cursor(id: SessionId, scope: Scope, cursor: u32) -> Self {
        let (status, _) = watch::channel(SessionStatus::Idle);
        Self {
            id,
            scope,
            cursor,
            covered: 0,
            accumulated: Vec::new(),
            in_flight: false,
            cancel: CancellationToken::new(),
            status,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    pub fn covered(&self) -> u64 {
        self.covered
    }

    pub fn accumulated(&self) -> &[Record] {
        &self.accumulated
    }

    pub fn len(&self) -> usize {
        self.accumulated.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulated.is_empty()
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// A handle that cancels this session from anywhere.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Appends a batch and returns how many records were taken.
    ///
    /// Does nothing once the session is cancelled: a fetch that resolves after
    /// cancellation must not leak into the result.
    pub fn append(&mut self, hits: Vec<Record>) -> usize {
        if self.is_cancelled() {
            return 0;
        }
        let n = hits.len();
        self.accumulated.extend(hits);
        n
    }

    /// Moves the cursor forward by `step` pages (at least one).
    pub fn advance(&mut self, step: u32) {
        self.cursor = self.cursor.saturating_add(step.max(1));
    }

    pub fn mark_covered(&mut self, offset: u64) {
        self.covered = self.covered.max(offset);
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Claims the in-flight slot. Returns `false` if a fetch is already out.
    pub fn try_begin_fetch(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn end_fetch(&mut self) {
        self.in_flight = false;
    }

    /// Applies a status change if the state machine allows it.
    pub fn transition(&mut self, next: SessionStatus) -> bool {
        let current = self.status();
        if current == next {
            return true;
        }
        if !current.can_transition_to(next) {
            warn!(
                session = %self.id,
                from = %current,
                to = %next,
                "ignoring invalid session transition"
            );
            return false;
        }
        self.status.send_replace(next);
        true
    }

    pub fn into_records(self) -> Vec<Record> {
        self.accumulated
    }
}
