/// Compute Service - Concurrent Search Orchestration
///
/// This service sits between the network front ends and the search engine. Every
/// request passes through the same pipeline regardless of which front end
/// received it.
///
/// ## Pipeline
/// 1. **Validate**: malformed queries are rejected before any CPU is spent
/// 2. **Cache**: identical validated requests are answered from a bounded cache
/// 3. **Admit**: wait for one of `workers` compute permits
/// 4. **Compute**: run the search on a blocking thread (`spawn_blocking`)
/// 5. **Bound**: the whole wait + compute is limited by `compute_timeout`
///
/// ## Concurrency
/// - Searches run in parallel, at most `workers` at a time (default: CPU count)
/// - The search engine is shared read-only across workers
/// - The cache is the only mutable shared state; its lock is held for a single
///   lookup or insert, never across a computation
///
/// ## Timeouts
/// When the timeout fires the caller gets `ServiceError::Timeout` immediately and
/// the search's cancellation flag is raised. The blocking thread keeps its
/// compute permit until the engine actually returns, so abandoned searches still
/// count against CPU capacity.

use crate::application::use_cases::TopMovesUseCase;
use crate::domain::search::{Cancellation, MoveSearch, SearchError, SearchRequest};
use crate::domain::validation::{QueryValidator, ValidationError};
use crate::shared::collections::BoundedCache;
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{ErrorCode, TopMovesQuery, TopMovesResponse};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Compute service configuration
#[derive(Debug, Clone)]
pub struct ComputeConfig {
    /// Maximum number of searches running at once
    pub workers: usize,

    /// Upper bound on waiting for a worker plus running the search
    pub compute_timeout: Duration,

    /// Result cache entries (0 disables the cache)
    pub cache_capacity: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            compute_timeout: Duration::from_secs(10),
            cache_capacity: 1024,
        }
    }
}

/// Errors surfaced to the front ends
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Search(#[from] SearchError),

    #[error("computation exceeded {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("computation panicked")]
    Panicked,

    #[error("compute workers are shut down")]
    WorkersClosed,
}

impl ServiceError {
    /// Wire error code; validation failures are protocol errors, everything
    /// else is a computation error
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Invalid(_) => ErrorCode::InvalidRequest,
            ServiceError::Search(SearchError::Cancelled) | ServiceError::Timeout(_) => {
                ErrorCode::ComputeTimeout
            }
            ServiceError::Search(SearchError::Internal(_))
            | ServiceError::Panicked
            | ServiceError::WorkersClosed => ErrorCode::ComputeFailed,
        }
    }
}

/// Compute Service
///
/// # Type Parameters
/// * `S` - Search implementation (must implement `MoveSearch`)
pub struct ComputeService<S: MoveSearch> {
    use_case: Arc<TopMovesUseCase<S>>,
    validator: QueryValidator,
    workers: Arc<Semaphore>,
    worker_count: usize,
    compute_timeout: Duration,
    cache: Option<Mutex<BoundedCache<SearchRequest, TopMovesResponse>>>,
}

impl<S: MoveSearch> ComputeService<S> {
    /// Creates a new compute service
    ///
    /// # Arguments
    /// * `engine` - The search implementation
    /// * `validator` - Query validation rules
    /// * `config` - Worker count, timeout and cache size
    pub fn new(engine: S, validator: QueryValidator, config: ComputeConfig) -> Self {
        let worker_count = config.workers.max(1);
        let cache = (config.cache_capacity > 0)
            .then(|| Mutex::new(BoundedCache::with_capacity(config.cache_capacity)));

        Self {
            use_case: Arc::new(TopMovesUseCase::new(engine)),
            validator,
            workers: Arc::new(Semaphore::new(worker_count)),
            worker_count,
            compute_timeout: config.compute_timeout,
            cache,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn compute_timeout(&self) -> Duration {
        self.compute_timeout
    }

    /// Workers not currently running a search
    pub fn idle_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Validates `query`, then answers it from the cache or a fresh search
    pub async fn top_moves(&self, query: &TopMovesQuery) -> Result<TopMovesResponse, ServiceError> {
        let request = self.validator.validate(query)?;

        if let Some(hit) = self.cache_get(&request) {
            return Ok(hit);
        }

        let response = self.compute(request.clone()).await?;
        self.cache_put(request, response.clone());
        Ok(response)
    }

    async fn compute(&self, request: SearchRequest) -> Result<TopMovesResponse, ServiceError> {
        let cancel = Cancellation::new();
        let started = Instant::now();

        let work = {
            let workers = Arc::clone(&self.workers);
            let use_case = Arc::clone(&self.use_case);
            let cancel = cancel.clone();
            async move {
                let permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| ServiceError::WorkersClosed)?;

                let handle = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    let _in_flight = InFlight::enter();
                    use_case.execute(&request, &cancel)
                });

                match handle.await {
                    Ok(result) => result.map_err(ServiceError::from),
                    Err(e) if e.is_panic() => Err(ServiceError::Panicked),
                    Err(_) => Err(ServiceError::WorkersClosed),
                }
            }
        };

        let result = match tokio::time::timeout(self.compute_timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                cancel.cancel();
                Err(ServiceError::Timeout(self.compute_timeout))
            }
        };

        let elapsed = started.elapsed();
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.code().as_str(),
        };
        METRICS
            .compute_duration
            .with_label_values(&[outcome])
            .observe(elapsed.as_secs_f64());

        match &result {
            Ok(_) => debug!(elapsed_ms = elapsed.as_millis() as u64, "计算完成"),
            Err(e) => warn!(elapsed_ms = elapsed.as_millis() as u64, error = %e, "计算失败"),
        }
        result
    }

    fn cache_get(&self, request: &SearchRequest) -> Option<TopMovesResponse> {
        let cache = self.cache.as_ref()?;
        let hit = cache.lock().get(request);
        let label = if hit.is_some() { "hit" } else { "miss" };
        METRICS.cache_lookups.with_label_values(&[label]).inc();
        hit
    }

    fn cache_put(&self, request: SearchRequest, response: TopMovesResponse) {
        if let Some(cache) = &self.cache {
            cache.lock().insert(request, response);
        }
    }
}

/// 正在执行的计算数 guard，panic 时也会递减
struct InFlight;

impl InFlight {
    fn enter() -> Self {
        METRICS.computations_in_flight.with_label_values(&["hybrid"]).inc();
        InFlight
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        METRICS.computations_in_flight.with_label_values(&["hybrid"]).dec();
    }
}
