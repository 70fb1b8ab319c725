//! # Store
//!
//! The shared store handle. One `Store` is built at the application root
//! and cloned into whatever needs it; every clone sees the same state.
//!
//! ## Read / Write Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                            Store                                        │
//! │                                                                         │
//! │   readers                         writers                               │
//! │   ───────                         ───────                               │
//! │   snapshot() ──► Arc<StoreState>  dispatch(action)                      │
//! │        │                               │                                │
//! │        │                               ▼                                │
//! │        │                   ┌──────────────────────────┐                 │
//! │        │                   │ write lock               │                 │
//! │        │                   │ next = reduce(&cur, a)   │                 │
//! │        │                   │ cur  = Arc::new(next)    │                 │
//! │        │                   └──────────────────────────┘                 │
//! │        ▼                                                                │
//! │   an old snapshot stays valid and unchanged after later dispatches      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The lock is held only for the reducer call, never across an `.await`.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, warn};

use atrium_core::{reduce, Action, ModelRegistry, StoreError, StoreResult, StoreState, CACHE_DURATION_MS};

use crate::clock::{Clock, SystemClock};
use crate::config::ClientConfig;
use crate::domain::{Bookings, Carrots, Metrics};
use crate::error::ClientResult;
use crate::facade::ModelFacade;
use crate::transport::{ApiRequest, HttpTransport, Transport, TransportConfig};

// =============================================================================
// Store
// =============================================================================

/// Cheap-to-clone handle on the normalized cache.
pub struct Store<T = HttpTransport, C = SystemClock> {
    inner: Arc<StoreInner<T, C>>,
}

struct StoreInner<T, C> {
    state: RwLock<Arc<StoreState>>,
    transport: T,
    clock: C,
    registry: ModelRegistry,
    cache_duration_ms: i64,
}

impl<T, C> Clone for Store<T, C> {
    fn clone(&self) -> Self {
        Store {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Store<T, SystemClock> {
    /// Starts building a store over `transport`.
    pub fn builder(transport: T) -> StoreBuilder<T, SystemClock> {
        StoreBuilder::new(transport)
    }
}

impl Store<HttpTransport, SystemClock> {
    /// Production wiring: HTTP transport, wall clock, models and freshness
    /// window from configuration.
    pub fn from_config(config: &ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(TransportConfig::from(&config.api))?;

        Ok(StoreBuilder::new(transport)
            .with_registry(config.registry())
            .with_cache_duration_ms(config.cache_duration_ms())
            .build())
    }
}

impl<T: Transport, C: Clock> Store<T, C> {
    // =========================================================================
    // State
    // =========================================================================

    /// The current state. Later dispatches never change a returned snapshot.
    pub fn snapshot(&self) -> Arc<StoreState> {
        let guard = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Applies `action` through the reducer and publishes the result.
    pub fn dispatch(&self, action: Action) {
        debug!(kind = %action.kind(), model = ?action.model(), "Dispatching action");

        let mut guard = self.inner.state.write().unwrap_or_else(PoisonError::into_inner);
        let next = reduce(&guard, action);
        *guard = Arc::new(next);
    }

    /// Decodes an action from JSON and dispatches it.
    ///
    /// An action whose `kind` is not recognised is rejected and the state is
    /// left exactly as it was.
    pub fn dispatch_json(&self, json: &str) -> StoreResult<()> {
        let action = Action::from_json(json).map_err(|e| {
            warn!(error = %e, "Rejected action");
            e
        })?;
        self.dispatch(action);
        Ok(())
    }

    // =========================================================================
    // Facades
    // =========================================================================

    /// Per-model facade.
    pub fn model(&self, name: &str) -> ModelFacade<'_, T, C> {
        ModelFacade::new(self, name)
    }

    pub fn bookings(&self) -> Bookings<'_, T, C> {
        Bookings::new(self)
    }

    pub fn carrots(&self) -> Carrots<'_, T, C> {
        Carrots::new(self)
    }

    pub fn metrics(&self) -> Metrics<'_, T, C> {
        Metrics::new(self)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn registry(&self) -> &ModelRegistry {
        &self.inner.registry
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    pub fn clock(&self) -> &C {
        &self.inner.clock
    }

    pub fn cache_duration_ms(&self) -> i64 {
        self.inner.cache_duration_ms
    }

    pub(crate) fn now_ms(&self) -> i64 {
        self.inner.clock.now_ms()
    }

    /// Sends `request` and unwraps the `results` field of the response.
    ///
    /// A successful response without `results` (or with `results: null`) is
    /// reported as [`StoreError::NoResults`].
    pub(crate) async fn fetch(&self, request: ApiRequest) -> StoreResult<Value> {
        let path = request.path.clone();
        let mut body = self.inner.transport.send(request).await?;

        match body.get_mut("results").map(Value::take) {
            None | Some(Value::Null) => Err(StoreError::NoResults { path }),
            Some(results) => Ok(results),
        }
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating a Store with options.
pub struct StoreBuilder<T, C = SystemClock> {
    transport: T,
    clock: C,
    registry: ModelRegistry,
    cache_duration_ms: i64,
}

impl<T: Transport> StoreBuilder<T, SystemClock> {
    /// Creates a builder with the default models, the wall clock and a
    /// five minute freshness window.
    pub fn new(transport: T) -> Self {
        StoreBuilder {
            transport,
            clock: SystemClock,
            registry: ModelRegistry::default(),
            cache_duration_ms: CACHE_DURATION_MS,
        }
    }
}

impl<T: Transport, C: Clock> StoreBuilder<T, C> {
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replaces the registry with the given model names.
    pub fn with_models<I, S>(self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_registry(ModelRegistry::new(models))
    }

    pub fn with_cache_duration_ms(mut self, duration_ms: i64) -> Self {
        self.cache_duration_ms = duration_ms;
        self
    }

    /// Swaps the clock.
    pub fn with_clock<C2: Clock>(self, clock: C2) -> StoreBuilder<T, C2> {
        StoreBuilder {
            transport: self.transport,
            clock,
            registry: self.registry,
            cache_duration_ms: self.cache_duration_ms,
        }
    }

    pub fn build(self) -> Store<T, C> {
        let state = StoreState::initial(&self.registry);
        debug!(models = self.registry.len(), "Store initialized");

        Store {
            inner: Arc::new(StoreInner {
                state: RwLock::new(Arc::new(state)),
                transport: self.transport,
                clock: self.clock,
                registry: self.registry,
                cache_duration_ms: self.cache_duration_ms,
            }),
        }
    }
}
