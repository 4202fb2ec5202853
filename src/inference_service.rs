//! Process-wide owner of the inference client handle.
//!
//! **Design**:
//! - The client is created lazily on the first `acquire()` through an
//!   injected factory, then reused across requests
//! - Each `acquire()` returns a `ModelLease`; leases stamp last-use time
//! - When the backend is not concurrency-safe the lease also holds the
//!   exclusive lock, so calls run one at a time
//! - `evict_if_idle()` drops the handle after the idle timeout;
//!   `IdleReaper` calls it periodically from a background thread
//! - `shutdown()` tears the handle down until `restart()`

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::pipeline::extraction::{ChatRequest, ExtractionError, LlmClient};
use crate::pipeline::retrieval::index_cache::EmbeddingIndexCache;

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Builds the inference client on first use.
pub type ClientFactory =
    Box<dyn Fn() -> Result<Arc<dyn LlmClient>, ExtractionError> + Send + Sync>;

/// Snapshot of the service state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InferenceStatus {
    pub initialized: bool,
    pub shut_down: bool,
    pub model: String,
    /// Seconds since the last lease, if any lease was taken.
    pub idle_for_secs: Option<u64>,
    pub calls: u64,
}

struct ServiceState {
    client: Option<Arc<dyn LlmClient>>,
    last_used: Option<Instant>,
    shut_down: bool,
}

// ═══════════════════════════════════════════════════════════
// InferenceService
// ═══════════════════════════════════════════════════════════

pub struct InferenceService {
    factory: ClientFactory,
    model: String,
    idle_timeout: Duration,
    state: Mutex<ServiceState>,
    /// Held by leases on backends that are not concurrency-safe.
    exclusive: Mutex<()>,
    calls: AtomicU64,
}

impl InferenceService {
    pub fn new(factory: ClientFactory, model: &str, idle_timeout: Duration) -> Self {
        Self {
            factory,
            model: model.to_string(),
            idle_timeout,
            state: Mutex::new(ServiceState {
                client: None,
                last_used: None,
                shut_down: false,
            }),
            exclusive: Mutex::new(()),
            calls: AtomicU64::new(0),
        }
    }

    /// Service around an already-built client. Used by tests and callers
    /// that manage the client themselves.
    pub fn with_client(client: Arc<dyn LlmClient>, model: &str, idle_timeout: Duration) -> Self {
        Self::new(Box::new(move || Ok(client.clone())), model, idle_timeout)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Get a lease on the client, building it first if needed.
    ///
    /// Blocks while another lease holds the exclusive lock of a backend
    /// that is not concurrency-safe.
    pub fn acquire(&self) -> Result<ModelLease<'_>, ExtractionError> {
        let client = {
            let mut state = self.lock_state()?;
            if state.shut_down {
                return Err(ExtractionError::ServiceShutdown);
            }
            let client = match &state.client {
                Some(client) => client.clone(),
                None => {
                    tracing::info!(model = %self.model, "Initializing inference client");
                    let client = (self.factory)()?;
                    state.client = Some(client.clone());
                    client
                }
            };
            state.last_used = Some(Instant::now());
            client
        };

        let guard = if client.is_concurrency_safe() {
            None
        } else {
            Some(
                self.exclusive
                    .lock()
                    .map_err(|_| ExtractionError::LockPoisoned)?,
            )
        };
        self.calls.fetch_add(1, Ordering::Relaxed);

        Ok(ModelLease {
            client,
            service: self,
            _guard: guard,
        })
    }

    /// Drop the client if unused for longer than the idle timeout.
    /// Returns whether it was dropped.
    pub fn evict_if_idle(&self, now: Instant) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        let idle = state
            .last_used
            .is_some_and(|t| now.saturating_duration_since(t) >= self.idle_timeout);
        if state.client.is_some() && idle {
            state.client = None;
            tracing::info!(model = %self.model, "Inference client evicted after idle timeout");
            return true;
        }
        false
    }

    /// Tear down the client. `acquire` fails until `restart`.
    pub fn shutdown(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.client = None;
            state.shut_down = true;
            tracing::info!(model = %self.model, "Inference service shut down");
        }
    }

    pub fn restart(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.shut_down = false;
            tracing::info!(model = %self.model, "Inference service restarted");
        }
    }

    pub fn status(&self) -> InferenceStatus {
        let calls = self.calls.load(Ordering::Relaxed);
        match self.state.lock() {
            Ok(state) => InferenceStatus {
                initialized: state.client.is_some(),
                shut_down: state.shut_down,
                model: self.model.clone(),
                idle_for_secs: state.last_used.map(|t| t.elapsed().as_secs()),
                calls,
            },
            Err(_) => InferenceStatus {
                initialized: false,
                shut_down: true,
                model: self.model.clone(),
                idle_for_secs: None,
                calls,
            },
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ServiceState>, ExtractionError> {
        self.state.lock().map_err(|_| ExtractionError::LockPoisoned)
    }

    fn touch(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.last_used = Some(Instant::now());
        }
    }
}

/// RAII lease on the inference client.
///
/// Dropping it stamps the last-use time and, for backends that are not
/// concurrency-safe, releases the exclusive lock.
pub struct ModelLease<'a> {
    client: Arc<dyn LlmClient>,
    service: &'a InferenceService,
    _guard: Option<MutexGuard<'a, ()>>,
}

impl ModelLease<'_> {
    pub fn chat(&self, request: &ChatRequest) -> Result<String, ExtractionError> {
        self.client.chat(request)
    }

    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    pub fn model(&self) -> &str {
        &self.service.model
    }
}

impl Drop for ModelLease<'_> {
    fn drop(&mut self) {
        self.service.touch();
    }
}

// ═══════════════════════════════════════════════════════════
// Idle reaper
// ═══════════════════════════════════════════════════════════

/// Sleep granularity for shutdown responsiveness.
const SLEEP_GRANULARITY: Duration = Duration::from_millis(250);

/// Handle for the background thread that evicts idle resources.
///
/// Holds only weak references, so it never keeps the service or the cache
/// alive. Stops on `shutdown()`, on `Drop`, or once both targets are gone.
pub struct IdleReaper {
    shutdown: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl IdleReaper {
    pub fn start(
        service: &Arc<InferenceService>,
        cache: &Arc<EmbeddingIndexCache>,
        interval: Duration,
    ) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let flag = shutdown.clone();
        let service = Arc::downgrade(service);
        let cache = Arc::downgrade(cache);

        let handle = std::thread::spawn(move || {
            tracing::debug!(interval_ms = interval.as_millis() as u64, "Idle reaper started");
            reaper_loop(&service, &cache, interval, &flag);
            tracing::debug!("Idle reaper stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl Drop for IdleReaper {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(h) = self.handle.take() {
            join_reaper(h);
        }
    }
}

/// Wait for the reaper thread. Returns false if it panicked.
fn join_reaper(handle: std::thread::JoinHandle<()>) -> bool {
    match handle.join() {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!("Idle reaper thread panicked");
            false
        }
    }
}

fn reaper_loop(
    service: &Weak<InferenceService>,
    cache: &Weak<EmbeddingIndexCache>,
    interval: Duration,
    shutdown: &AtomicBool,
) {
    while !shutdown.load(Ordering::Relaxed) {
        let mut slept = Duration::ZERO;
        while slept < interval {
            if shutdown.load(Ordering::Relaxed) {
                return;
            }
            let step = SLEEP_GRANULARITY.min(interval - slept);
            std::thread::sleep(step);
            slept += step;
        }

        let service = service.upgrade();
        let cache = cache.upgrade();
        if service.is_none() && cache.is_none() {
            return;
        }
        reap_once(service.as_deref(), cache.as_deref(), Instant::now());
    }
}

/// One eviction pass. The evicting side logs what it dropped.
/// Returns whether the client was dropped and how many indexes were.
fn reap_once(
    service: Option<&InferenceService>,
    cache: Option<&EmbeddingIndexCache>,
    now: Instant,
) -> (bool, usize) {
    let client_evicted = service.is_some_and(|s| s.evict_if_idle(now));
    let indexes_evicted = cache.map_or(0, |c| c.evict_idle(now));
    (client_evicted, indexes_evicted)
}
