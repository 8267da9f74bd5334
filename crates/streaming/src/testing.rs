//! In-process `SearchBackend` for scheduler and controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use catalog::Scope;
use serde_json::json;
use tokio::sync::Notify;

use crate::client::{validate_request, BoxFuture, SearchBackend};
use crate::error::LoadError;
use crate::protocol::Batch;
use crate::record::Record;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub scope: String,
    pub page: u32,
    pub page_size: u32,
}

#[derive(Default)]
struct Faults {
    fail: HashSet<u32>,
    malformed: HashSet<u32>,
    held: HashSet<u32>,
}

/// Serves `total` synthetic records per scope key in a fixed order.
///
/// Every tenth record has no coordinates. Fetches for held pages park until
/// [`FakeBackend::release`] is called.
pub struct FakeBackend {
    datasets: HashMap<String, u64>,
    report_total: bool,
    latency: Option<Duration>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<Call>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate: Notify,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            datasets: HashMap::new(),
            report_total: true,
            latency: None,
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: Notify::new(),
        }
    }

    pub fn with_scope(mut self, key: &str, total: u64) -> Self {
        self.datasets.insert(key.to_string(), total);
        self
    }

    pub fn without_reported_total(mut self) -> Self {
        self.report_total = false;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn fail_page(self, page: u32) -> Self {
        self.faults.lock().unwrap().fail.insert(page);
        self
    }

    pub fn malformed_page(self, page: u32) -> Self {
        self.faults.lock().unwrap().malformed.insert(page);
        self
    }

    pub fn hold_page(self, page: u32) -> Self {
        self.faults.lock().unwrap().held.insert(page);
        self
    }

    /// Lets every parked fetch continue and stops holding new ones.
    pub fn release(&self) {
        self.faults.lock().unwrap().held.clear();
        self.gate.notify_waiters();
    }

    /// Resolves once at least `n` fetches have been issued.
    pub async fn wait_for_calls(&self, n: usize) {
        while self.calls.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, scope: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.scope == scope)
            .collect()
    }

    pub fn pages(&self) -> Vec<(u32, u32)> {
        self.calls().iter().map(|c| (c.page, c.page_size)).collect()
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn serve(&self, scope: &Scope, page: u32, page_size: u32) -> Result<Batch, LoadError> {
        validate_request(page, page_size)?;
        self.calls.lock().unwrap().push(Call {
            scope: scope.key().to_string(),
            page,
            page_size,
        });
        let _guard = InFlight::enter(self);

        let released = self.gate.notified();
        tokio::pin!(released);
        released.as_mut().enable();
        let held = self.faults.lock().unwrap().held.contains(&page);
        if held {
            released.await;
        }
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        {
            let faults = self.faults.lock().unwrap();
            if faults.fail.contains(&page) {
                return Err(LoadError::unavailable(format!("page {page} unavailable")));
            }
            if faults.malformed.contains(&page) {
                return Err(LoadError::malformed("missing `hits`"));
            }
        }

        let total = self.datasets.get(scope.key()).copied().unwrap_or(0);
        let start = u64::from(page - 1) * u64::from(page_size);
        let end = (start + u64::from(page_size)).min(total);
        let hits = (start..end)
            .map(|i| synthetic(scope.key(), i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Batch {
            hits,
            total_hits: self.report_total.then_some(total),
        })
    }
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchBackend for FakeBackend {
    fn fetch_batch<'a>(
        &'a self,
        scope: &'a Scope,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Batch, LoadError>> {
        Box::pin(self.serve(scope, page, page_size))
    }
}

/// Id of the `index`-th record the fake serves for `scope`.
pub fn record_id(scope: &str, index: u64) -> String {
    format!("{scope}-{index}")
}

fn synthetic(scope: &str, index: u64) -> Result<Record, LoadError> {
    let id = record_id(scope, index);
    let hit = if index % 10 == 9 {
        json!({ "id": id, "Region": scope })
    } else {
        json!({
            "id": id,
            "Region": scope,
            "Latitude": 5.0 + (index % 100) as f64 * 0.1,
            "Longitude": 117.0 + (index % 80) as f64 * 0.1,
        })
    };
    Record::from_hit(hit)
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(backend: &'a FakeBackend) -> Self {
        let now = backend.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        backend.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self(&backend.in_flight)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps a backend in the `Arc<dyn SearchBackend>` the scheduler takes while
/// keeping a typed handle for assertions.
pub fn shared(backend: FakeBackend) -> (Arc<FakeBackend>, Arc<dyn SearchBackend>) {
    let typed = Arc::new(backend);
    let erased: Arc<dyn SearchBackend> = typed.clone();
    (typed, erased)
}
