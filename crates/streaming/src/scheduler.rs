use std::sync::Arc;
use std::time::Duration;

use catalog::{pages_for, Scope, ScopeTotals, Totals};
use foundation::SessionId;
use runtime::{LoadStrategy, RecordBudget, SessionMetrics};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::client::SearchBackend;
use crate::error::LoadError;
use crate::record::Record;
use crate::session::{LoadSession, SessionStatus};
use crate::sink::ResultSink;

/// Outcome of a single [`ProgressionScheduler::step`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Iteration {
    /// A batch was appended; fetch again after the pacing delay.
    Continue { after: Duration },
    /// The session reached a terminal status.
    Finished,
    /// Another fetch for this session is still in flight.
    Skipped,
}

/// One backend request, derived from the session cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct FetchPlan {
    pub cursor: u32,
    pub page: u32,
    pub page_size: u32,
    /// Offset of the first record this request returns.
    pub window_start: u64,
    pub next_cursor: u32,
    /// The window reaches the scope's last page.
    pub is_final: bool,
    pub preview: bool,
}

/// What a finished session leaves behind.
#[derive(Debug)]
pub struct SessionReport {
    pub id: SessionId,
    pub scope: Scope,
    pub status: SessionStatus,
    pub records: Vec<Record>,
    pub metrics: SessionMetrics,
    /// The failure that halted the session, if any.
    pub error: Option<LoadError>,
}

/// Drives one session from its first fetch to a terminal status.
///
/// Each step fetches at most one batch. The precomputed totals decide when to
/// stop; the backend's own count only informs the coarse jump decision.
pub struct ProgressionScheduler {
    backend: Arc<dyn SearchBackend>,
    totals: Arc<ScopeTotals>,
    sink: ResultSink,
    strategy: LoadStrategy,
    step_pages: Option<u32>,
    metrics: SessionMetrics,
    error: Option<LoadError>,
}

impl ProgressionScheduler {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        totals: Arc<ScopeTotals>,
        sink: ResultSink,
        strategy: LoadStrategy,
    ) -> Self {
        Self {
            backend,
            totals,
            sink,
            strategy,
            step_pages: None,
            metrics: SessionMetrics::new(),
            error: None,
        }
    }

    pub fn strategy(&self) -> &LoadStrategy {
        &self.strategy
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Totals for `scope`, with pages expressed in this strategy's page size.
    pub fn totals_for(&self, scope: &Scope) -> Totals {
        let t = self.totals.totals(scope);
        t.with_page_size(self.strategy.base_page_size(t.page_size))
    }

    /// Runs the session until it completes, halts or is cancelled.
    pub async fn run(mut self, mut session: LoadSession) -> SessionReport {
        let totals = self.totals_for(session.scope());
        info!(
            session = %session.id(),
            scope = %session.scope(),
            strategy = ?self.strategy.kind,
            total_hits = totals.total_hits,
            total_pages = totals.total_pages,
            page_size = totals.page_size,
            "session started"
        );

        let cancel = session.cancel_token();
        loop {
            match self.step(&mut session).await {
                Iteration::Continue { after } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            session.transition(SessionStatus::Cancelled);
                            break;
                        }
                        _ = tokio::time::sleep(after) => {}
                    }
                }
                Iteration::Skipped => tokio::task::yield_now().await,
                Iteration::Finished => break,
            }
        }

        let status = session.status();
        info!(
            session = %session.id(),
            scope = %session.scope(),
            %status,
            records = session.len(),
            fetches = self.metrics.fetches(),
            "session finished"
        );

        SessionReport {
            id: session.id(),
            scope: session.scope().clone(),
            status,
            metrics: self.metrics,
            error: self.error,
            records: session.into_records(),
        }
    }

    /// Performs one iteration: check termination, fetch one batch, append.
    pub async fn step(&mut self, session: &mut LoadSession) -> Iteration {
        if session.status().is_terminal() {
            return Iteration::Finished;
        }
        if session.is_cancelled() {
            session.transition(SessionStatus::Cancelled);
            return Iteration::Finished;
        }
        if session.is_in_flight() {
            return Iteration::Skipped;
        }

        let totals = self.totals_for(session.scope());
        let accumulated = session.len() as u64;
        if accumulated >= totals.total_hits || session.cursor() > totals.total_pages {
            debug!(
                session = %session.id(),
                accumulated,
                cursor = session.cursor(),
                "scope exhausted"
            );
            session.transition(SessionStatus::Completed);
            return Iteration::Finished;
        }

        let plan = self.plan(session, totals);
        if !session.try_begin_fetch() {
            return Iteration::Skipped;
        }
        session.transition(SessionStatus::Fetching);

        let started = Instant::now();
        let cancel = session.cancel_token();
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            res = self.backend.fetch_batch(session.scope(), plan.page, plan.page_size) => Some(res),
        };
        session.end_fetch();
        self.metrics
            .record_fetch(plan.cursor, started.elapsed().as_millis() as u64);

        let Some(result) = fetched.filter(|_| !session.is_cancelled()) else {
            self.metrics.record_stale();
            debug!(
                session = %session.id(),
                page = plan.page,
                "session cancelled; fetch result discarded"
            );
            session.transition(SessionStatus::Cancelled);
            return Iteration::Finished;
        };
        let batch = match result {
            Ok(batch) => batch,
            Err(err) => {
                warn!(
                    session = %session.id(),
                    scope = %session.scope(),
                    page = plan.page,
                    page_size = plan.page_size,
                    kind = err.kind(),
                    error = %err,
                    "fetch failed; session halted"
                );
                self.error = Some(err);
                session.transition(SessionStatus::Halted);
                return Iteration::Finished;
            }
        };

        let received = batch.len();
        let reported_total = batch.total_hits;
        if self.step_pages.is_none() {
            let hinted_pages = reported_total
                .map(|hits| pages_for(hits, totals.page_size))
                .unwrap_or(totals.total_pages);
            let step = self.strategy.step_pages(totals.page_size, hinted_pages);
            if step > 1 {
                debug!(session = %session.id(), step, hinted_pages, "coarse jump engaged");
            }
            self.step_pages = Some(step);
        }

        // Records before `covered` were already taken from an earlier window.
        let overlap = session.covered().saturating_sub(plan.window_start);
        let overlap = usize::try_from(overlap).unwrap_or(usize::MAX).min(received);
        let mut fresh: Vec<Record> = batch.hits.into_iter().skip(overlap).collect();

        let mut budget = RecordBudget::remaining_of(totals.total_hits, accumulated);
        let granted = budget.grant(fresh.len());
        let truncated = fresh.len() - granted;
        fresh.truncate(granted);

        let unpositioned = fresh.iter().filter(|r| !r.has_position()).count();
        self.sink.append(session.id(), &fresh);
        let appended = session.append(fresh);
        session.mark_covered(plan.window_start + received as u64);
        self.metrics.record_batch(appended, unpositioned, truncated);

        debug!(
            session = %session.id(),
            page = plan.page,
            page_size = plan.page_size,
            preview = plan.preview,
            received,
            appended,
            truncated,
            total = session.len(),
            "batch appended"
        );

        let short = received < plan.page_size as usize;
        if plan.is_final || short || budget.is_exhausted() {
            session.transition(SessionStatus::Completed);
            return Iteration::Finished;
        }

        session.advance(plan.next_cursor - plan.cursor);
        session.transition(SessionStatus::Waiting);
        Iteration::Continue {
            after: self.strategy.delay,
        }
    }

    pub(crate) fn plan(&self, session: &LoadSession, totals: Totals) -> FetchPlan {
        let cursor = session.cursor();
        let base = totals.page_size;

        if cursor == 0 {
            if let Some(size) = self.strategy.preview_page_size(base) {
                return FetchPlan {
                    cursor,
                    page: 1,
                    page_size: size,
                    window_start: 0,
                    next_cursor: 1,
                    is_final: false,
                    preview: true,
                };
            }
        }

        // A session created for preview without a preview size starts at page 1.
        let cursor = cursor.max(1);
        let step = self.step_pages.unwrap_or(1).max(1);
        let (page, page_size, span) = if step > 1 && (cursor - 1) % step == 0 {
            ((cursor - 1) / step + 1, base * step, step)
        } else {
            (cursor, base, 1)
        };
        let next_cursor = cursor.saturating_add(span);
        FetchPlan {
            cursor: session.cursor(),
            page,
            page_size,
            window_start: u64::from(cursor - 1) * u64::from(base),
            next_cursor,
            is_final: next_cursor > totals.total_pages,
            preview: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use catalog::{Scope, ScopeTotals, Totals, DEFAULT_REGION_TOTALS};
    use foundation::SessionId;
    use pretty_assertions::assert_eq;
    use runtime::LoadStrategy;
    use tokio::time::Instant;

    use super::{Iteration, ProgressionScheduler, SessionReport};
    use crate::session::{LoadSession, SessionStatus};
    use crate::sink::ResultSink;
    use crate::testing::{record_id, shared, FakeBackend};

    fn totals() -> Arc<ScopeTotals> {
        Arc::new(
            ScopeTotals::new(Totals::new(450, 3, 200), DEFAULT_REGION_TOTALS)
                .with_region("Region-X", Totals::new(25, 1, 100))
                .with_region("Big", Totals::new(6_000, 60, 100))
                .with_region("Empty", Totals::new(0, 0, 100)),
        )
    }

    fn scheduler(
        backend: FakeBackend,
        strategy: LoadStrategy,
    ) -> (ProgressionScheduler, Arc<FakeBackend>, ResultSink) {
        let (fake, erased) = shared(backend);
        let sink = ResultSink::new();
        let s = ProgressionScheduler::new(erased, totals(), sink.clone(), strategy);
        (s, fake, sink)
    }

    async fn run(
        backend: FakeBackend,
        strategy: LoadStrategy,
        session: LoadSession,
    ) -> (SessionReport, Arc<FakeBackend>, ResultSink) {
        let (s, fake, sink) = scheduler(backend, strategy);
        sink.reset(session.id());
        let report = s.run(session).await;
        (report, fake, sink)
    }

    fn ids(report: &SessionReport) -> Vec<String> {
        report.records.iter().map(|r| r.id.clone()).collect()
    }

    fn expected_ids(scope: &str, n: u64) -> Vec<String> {
        (0..n).map(|i| record_id(scope, i)).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn small_region_loads_in_one_fetch() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Region-X"));
        let (report, fake, sink) = run(
            FakeBackend::new().with_scope("Region-X", 25),
            LoadStrategy::fine(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.pages(), vec![(1, 100)]);
        assert_eq!(report.records.len(), 25);
        assert_eq!(sink.snapshot().len(), 25);
        assert!(report.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn global_scope_stops_at_last_page() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let started = Instant::now();
        let (report, fake, sink) = run(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.pages(), vec![(1, 200), (2, 200), (3, 200)]);
        assert_eq!(ids(&report), expected_ids("global", 450));
        assert_eq!(sink.snapshot().len(), 450);
        assert_eq!(report.metrics.records_appended, 450);
        assert_eq!(report.metrics.records_unpositioned, 45);
        assert_eq!(report.metrics.fetched_cursors, vec![1, 2, 3]);

        // Two pacing delays between three fetches, none after the last.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(2), "{elapsed:?}");
        assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn failure_halts_and_keeps_earlier_records() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let (report, fake, sink) = run(
            FakeBackend::new().with_scope("global", 450).fail_page(2),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Halted);
        assert_eq!(fake.pages(), vec![(1, 200), (2, 200)]);
        assert_eq!(report.records.len(), 200);
        assert_eq!(sink.snapshot().len(), 200);
        assert_eq!(report.error.as_ref().map(|e| e.kind()), Some("backend_unavailable"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_batch_appends_nothing() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let (report, fake, sink) = run(
            FakeBackend::new().with_scope("global", 450).malformed_page(1),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Halted);
        assert_eq!(fake.calls().len(), 1);
        assert!(report.records.is_empty());
        assert!(sink.snapshot().is_empty());
        assert_eq!(report.error.as_ref().map(|e| e.kind()), Some("malformed_batch"));
    }

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_precomputed_total() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("global", 600),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.calls().len(), 3);
        assert_eq!(report.records.len(), 450);
        assert_eq!(report.metrics.records_truncated, 150);
    }

    #[tokio::test(start_paused = true)]
    async fn short_page_completes_early() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("global", 300),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.pages(), vec![(1, 200), (2, 200)]);
        assert_eq!(report.records.len(), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_page_completes() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("global", 200),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.pages(), vec![(1, 200), (2, 200)]);
        assert_eq!(report.records.len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_total_never_fetches() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Empty"));
        let (report, fake, _) = run(FakeBackend::new(), LoadStrategy::fine(), session).await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert!(fake.calls().is_empty());
        assert!(report.records.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_region_uses_default_totals() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Nowhere"));
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("Nowhere", 30),
            LoadStrategy::fine(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(fake.pages(), vec![(1, 100)]);
        assert_eq!(report.records.len(), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_then_full_pages_without_duplicates() {
        let session = LoadSession::create_with_preview(SessionId::new(1), Scope::Global);
        let (report, fake, sink) = run(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::fine().with_preview(10),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Completed);
        assert_eq!(
            fake.pages(),
            vec![(1, 10), (1, 100), (2, 100), (3, 100), (4, 100), (5, 100)]
        );
        assert_eq!(ids(&report), expected_ids("global", 450));
        assert_eq!(sink.snapshot().len(), 450);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_shows_first_records_before_the_pacing_delay() {
        let (mut s, _fake, sink) = scheduler(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::fine().with_preview(10),
        );
        let mut session = LoadSession::create_with_preview(SessionId::new(1), Scope::Global);
        sink.reset(session.id());

        let it = s.step(&mut session).await;
        assert_eq!(
            it,
            Iteration::Continue {
                after: Duration::from_secs(1)
            }
        );
        assert_eq!(sink.snapshot().len(), 10);
        assert_eq!(session.cursor(), 1);
        assert_eq!(session.status(), SessionStatus::Waiting);
    }

    #[tokio::test(start_paused = true)]
    async fn coarse_jump_aligns_then_covers_five_pages_per_request() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Big"));
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("Big", 6_000),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        let mut expected = vec![(1, 100), (2, 100), (3, 100), (4, 100), (5, 100)];
        expected.extend((2..=12).map(|p| (p, 500)));
        assert_eq!(fake.pages(), expected);
        assert_eq!(report.metrics.fetches(), 16);
        assert_eq!(ids(&report), expected_ids("Big", 6_000));

        let cursors = &report.metrics.fetched_cursors;
        assert!(cursors.windows(2).all(|w| w[0] < w[1]), "{cursors:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn coarse_jump_falls_back_to_table_hint() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Big"));
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("Big", 6_000).without_reported_total(),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(fake.calls().len(), 16);
        assert_eq!(report.records.len(), 6_000);
    }

    #[tokio::test(start_paused = true)]
    async fn fine_strategy_never_jumps() {
        let session = LoadSession::create(SessionId::new(1), Scope::region("Big"));
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("Big", 6_000),
            LoadStrategy::fine().with_delay(Duration::from_millis(10)),
            session,
        )
        .await;

        assert_eq!(fake.calls().len(), 60);
        assert!(fake.pages().iter().all(|&(_, size)| size == 100));
        assert_eq!(report.records.len(), 6_000);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_waiting_stops_scheduling() {
        let (s, fake, sink) = scheduler(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::coarse(),
        );
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        sink.reset(session.id());
        let token = session.cancel_token();
        let task = tokio::spawn(s.run(session));

        fake.wait_for_calls(1).await;
        token.cancel();
        let report = task.await.unwrap();

        assert_eq!(report.status, SessionStatus::Cancelled);
        assert_eq!(fake.calls().len(), 1);
        assert_eq!(report.records.len(), 200);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_flight_discards_the_late_batch() {
        let (s, fake, sink) = scheduler(
            FakeBackend::new().with_scope("global", 450).hold_page(1),
            LoadStrategy::coarse(),
        );
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        sink.reset(session.id());
        let token = session.cancel_token();
        let task = tokio::spawn(s.run(session));

        fake.wait_for_calls(1).await;
        assert_eq!(fake.in_flight(), 1);
        token.cancel();
        fake.release();
        let report = task.await.unwrap();

        assert_eq!(report.status, SessionStatus::Cancelled);
        assert!(report.records.is_empty());
        assert!(sink.snapshot().is_empty());
        assert_eq!(report.metrics.stale_batches_discarded, 1);
        assert_eq!(fake.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_before_start_never_fetches() {
        let session = LoadSession::create(SessionId::new(1), Scope::Global);
        session.cancel();
        let (report, fake, _) = run(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::coarse(),
            session,
        )
        .await;

        assert_eq!(report.status, SessionStatus::Cancelled);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn step_is_skipped_while_a_fetch_is_out() {
        let (mut s, fake, _) = scheduler(
            FakeBackend::new().with_scope("global", 450),
            LoadStrategy::coarse(),
        );
        let mut session = LoadSession::create(SessionId::new(1), Scope::Global);
        assert!(session.try_begin_fetch());
        assert_eq!(s.step(&mut session).await, Iteration::Skipped);
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn plan_aligns_jumps_to_step_boundaries() {
        let (mut s, _, _) = scheduler(FakeBackend::new(), LoadStrategy::coarse());
        s.step_pages = Some(5);
        let totals = Totals::new(6_000, 60, 100);
        let mut session = LoadSession::create(SessionId::new(1), Scope::region("Big"));

        session.advance(1);
        let p = s.plan(&session, totals);
        assert_eq!((p.page, p.page_size, p.next_cursor), (2, 100, 3));

        session.advance(4);
        let p = s.plan(&session, totals);
        assert_eq!(p.cursor, 6);
        assert_eq!((p.page, p.page_size, p.next_cursor), (2, 500, 11));
        assert_eq!(p.window_start, 500);
        assert!(!p.is_final);

        session.advance(50);
        let p = s.plan(&session, totals);
        assert_eq!((p.page, p.page_size), (12, 500));
        assert!(p.is_final);
    }

    #[test]
    fn totals_are_rescaled_to_the_strategy_page_size() {
        let (s, _, _) = scheduler(FakeBackend::new(), LoadStrategy::fine());
        assert_eq!(s.totals_for(&Scope::Global), Totals::new(450, 5, 100));
        let (s, _, _) = scheduler(FakeBackend::new(), LoadStrategy::coarse());
        assert_eq!(s.totals_for(&Scope::Global), Totals::new(450, 3, 200));
    }
}
