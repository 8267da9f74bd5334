use std::sync::Arc;

use catalog::{Scope, ScopeTotals};
use foundation::{SessionId, SessionIdAllocator};
use runtime::{LoadStrategy, DEFAULT_PREVIEW_SIZE};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::SearchBackend;
use crate::scheduler::{ProgressionScheduler, SessionReport};
use crate::session::{LoadSession, SessionStatus};
use crate::sink::ResultSink;

/// Strategy per user action.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub initial: LoadStrategy,
    pub region: LoadStrategy,
    pub all: LoadStrategy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial: LoadStrategy::fine().with_preview(DEFAULT_PREVIEW_SIZE),
            region: LoadStrategy::fine(),
            all: LoadStrategy::coarse(),
        }
    }
}

/// Observer for a started session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    id: SessionId,
    scope: Scope,
    status: watch::Receiver<SessionStatus>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Waits for a terminal status.
    pub async fn finished(&mut self) -> SessionStatus {
        if let Ok(status) = self.status.wait_for(|s| s.is_terminal()).await {
            return *status;
        }
        *self.status.borrow()
    }
}

#[derive(Debug)]
struct ActiveSession {
    id: SessionId,
    scope: Scope,
    cancel: CancellationToken,
    status: watch::Receiver<SessionStatus>,
    task: JoinHandle<SessionReport>,
}

/// Owns the active session and the sink, and switches scope on user action.
///
/// At most one session is active. Starting a new one cancels the current one
/// and waits for its task to end before the sink is handed over, so two
/// sessions never have fetches out at the same time.
pub struct ScopeController {
    backend: Arc<dyn SearchBackend>,
    totals: Arc<ScopeTotals>,
    sink: ResultSink,
    config: ControllerConfig,
    ids: SessionIdAllocator,
    active: Option<ActiveSession>,
}

impl ScopeController {
    pub fn new(
        backend: Arc<dyn SearchBackend>,
        totals: Arc<ScopeTotals>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            backend,
            totals,
            sink: ResultSink::new(),
            config,
            ids: SessionIdAllocator::new(),
            active: None,
        }
    }

    pub fn sink(&self) -> &ResultSink {
        &self.sink
    }

    pub fn totals(&self) -> &ScopeTotals {
        &self.totals
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Global load with a quick preview page first.
    pub async fn load_initial(&mut self) -> SessionHandle {
        let strategy = self.config.initial.clone();
        self.start(Scope::Global, strategy, true).await
    }

    /// Loads one region by its human-readable name.
    pub async fn load_region(&mut self, name: &str) -> SessionHandle {
        let strategy = self.config.region.clone();
        self.start(Scope::region(name), strategy, false).await
    }

    /// Loads every record, jumping ahead for large datasets.
    pub async fn load_all(&mut self) -> SessionHandle {
        let strategy = self.config.all.clone();
        self.start(Scope::Global, strategy, false).await
    }

    pub fn active_id(&self) -> Option<SessionId> {
        self.active.as_ref().map(|a| a.id)
    }

    pub fn active_scope(&self) -> Option<&Scope> {
        self.active.as_ref().map(|a| &a.scope)
    }

    pub fn active_status(&self) -> Option<SessionStatus> {
        self.active.as_ref().map(|a| *a.status.borrow())
    }

    /// Cancels the active session without starting another.
    ///
    /// Returns `false` when there is nothing left to cancel.
    pub fn cancel_active(&self) -> bool {
        let Some(active) = &self.active else {
            return false;
        };
        if active.status.borrow().is_terminal() {
            return false;
        }
        info!(session = %active.id, scope = %active.scope, "cancelling active session");
        active.cancel.cancel();
        true
    }

    /// Waits for the active session to end and returns its report.
    pub async fn join(&mut self) -> Option<SessionReport> {
        let active = self.active.take()?;
        Self::await_task(active).await
    }

    async fn start(&mut self, scope: Scope, strategy: LoadStrategy, preview: bool) -> SessionHandle {
        if let Some(previous) = self.active.take() {
            previous.cancel.cancel();
            if let Some(report) = Self::await_task(previous).await {
                info!(
                    session = %report.id,
                    scope = %report.scope,
                    status = %report.status,
                    records = report.records.len(),
                    "session superseded"
                );
            }
        }

        let id = self.ids.allocate();
        let session = if preview && strategy.preview_size.is_some() {
            LoadSession::create_with_preview(id, scope.clone())
        } else {
            LoadSession::create(id, scope.clone())
        };
        self.sink.reset(id);

        let status = session.subscribe();
        let cancel = session.cancel_token();
        let scheduler = ProgressionScheduler::new(
            Arc::clone(&self.backend),
            Arc::clone(&self.totals),
            self.sink.clone(),
            strategy,
        );
        let task = tokio::spawn(scheduler.run(session));

        self.active = Some(ActiveSession {
            id,
            scope: scope.clone(),
            cancel,
            status: status.clone(),
            task,
        });
        SessionHandle { id, scope, status }
    }

    async fn await_task(active: ActiveSession) -> Option<SessionReport> {
        match active.task.await {
            Ok(report) => Some(report),
            Err(err) => {
                warn!(session = %active.id, error = %err, "session task ended abnormally");
                None
            }
        }
    }
}

impl Drop for ScopeController {
    fn drop(&mut self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }
}
