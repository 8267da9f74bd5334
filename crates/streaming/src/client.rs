//! Search backend access.
//!
//! [`SearchBackend`] is the seam the scheduler talks to; [`BackendClient`] is
//! the HTTP implementation. Neither retries: one call is one request, and the
//! retry policy (there is none) belongs to the scheduler.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use catalog::{RegionDirectory, Scope};
use tracing::debug;

use crate::error::LoadError;
use crate::protocol::{filter_expression, Batch, SearchRequest, SearchResponse};

/// Type alias for a boxed future that can be sent between threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A paginated record source.
///
/// Implementations must be `Send + Sync` for use across async tasks.
/// Methods return boxed futures for dyn-compatibility.
pub trait SearchBackend: Send + Sync {
    /// Fetches page `page` (1-based) of `page_size` records for `scope`.
    ///
    /// An empty page is a valid answer, not an error.
    fn fetch_batch<'a>(
        &'a self,
        scope: &'a Scope,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Batch, LoadError>>;
}

/// Rejects requests the backend contract does not allow.
pub fn validate_request(page: u32, page_size: u32) -> Result<(), LoadError> {
    if page == 0 || page_size == 0 {
        return Err(LoadError::InvalidRequest { page, page_size });
    }
    Ok(())
}

#[derive(Clone)]
pub struct ClientConfig {
    /// Full URL of the index search endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    /// Value of the `type` filter every request carries.
    pub dataset_type: String,
    /// Transport-level timeout; `None` keeps the client default.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, dataset_type: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            dataset_type: dataset_type.into(),
            timeout: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dataset_type", &self.dataset_type)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// HTTP search client. Stateless apart from the connection pool.
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: ClientConfig,
    regions: Arc<RegionDirectory>,
}

impl BackendClient {
    pub fn new(config: ClientConfig, regions: Arc<RegionDirectory>) -> Result<Self, LoadError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| LoadError::transport("failed to build HTTP client", e))?;
        Ok(Self {
            http,
            config,
            regions,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Request body for one page of `scope`.
    pub fn request_for(&self, scope: &Scope, page: u32, page_size: u32) -> SearchRequest {
        let region = match scope {
            Scope::Global => None,
            Scope::Region(name) => Some(self.regions.backend_key(name)),
        };
        SearchRequest {
            hits_per_page: page_size,
            page,
            filter: filter_expression(&self.config.dataset_type, region),
        }
    }

    async fn fetch(&self, scope: &Scope, page: u32, page_size: u32) -> Result<Batch, LoadError> {
        validate_request(page, page_size)?;

        let body = self.request_for(scope, page, page_size);
        let mut request = self.http.post(&self.config.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| LoadError::transport("search request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(LoadError::unavailable(format!(
                "search returned HTTP {status}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| LoadError::transport("failed to read search response", e))?;

        let parsed: SearchResponse = serde_json::from_slice(&bytes)
            .map_err(|e| LoadError::malformed(format!("response is not a search result: {e}")))?;
        let batch = parsed.into_batch()?;

        debug!(
            scope = %scope,
            page,
            page_size,
            hits = batch.len(),
            "search page fetched"
        );
        Ok(batch)
    }
}

impl SearchBackend for BackendClient {
    fn fetch_batch<'a>(
        &'a self,
        scope: &'a Scope,
        page: u32,
        page_size: u32,
    ) -> BoxFuture<'a, Result<Batch, LoadError>> {
        Box::pin(self.fetch(scope, page, page_size))
    }
}
