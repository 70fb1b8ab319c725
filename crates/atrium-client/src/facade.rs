//! # Model Facade
//!
//! The per-model surface consuming code talks to: synchronous `find*`
//! reads against the current snapshot, and async `get*`/`post`/`patch`
//! operations that go to the backend and dispatch their results.
//!
//! ## Fetch Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     model("booking").get(filter)                        │
//! │                                                                         │
//! │  key = filter_key(filter)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  by_filter[key] fresh? ──yes──► return cached Arc (no dispatch, no I/O) │
//! │       │ no                                                              │
//! │       ▼                                                                 │
//! │  dispatch GET_INIT ─► GET /booking?where=..&sort_by=-created            │
//! │       │                                                                 │
//! │       ├── { results: [...] } ──► dispatch GET_SUCCESS ──► Ok(data)      │
//! │       │                                                                 │
//! │       └── error / no results ──► dispatch GET_ERROR   ──► Err(error)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `get_one`, `get_count` and `get_graph` follow the same shape against
//! their own sub-partition. Concurrent calls for the same key are not
//! deduplicated; each one performs its own round trip and the last one to
//! resolve wins.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use atrium_core::{
    entity_id, filter_key, Action, CacheEntry, Filter, StoreError, StoreResult, StoreState,
};

use crate::clock::Clock;
use crate::store::Store;
use crate::transport::{filter_query, resource_path, ApiRequest, Transport};

/// Sort applied to list fetches that do not specify one.
pub const DEFAULT_SORT: &str = "-created";

/// Page size applied to `config` list fetches that do not specify one.
pub const CONFIG_DEFAULT_LIMIT: u64 = 100;

const CONFIG_MODEL: &str = "config";
const USER_MODEL: &str = "user";
const CREATOR_FIELD: &str = "createdBy";

/// Options for [`ModelFacade::get_one`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOneOptions {
    /// Also warm the `user` cache with the entity's creator (or, for the
    /// `user` model, the entity itself).
    pub with_creator: bool,
}

impl GetOneOptions {
    pub fn with_creator() -> Self {
        GetOneOptions { with_creator: true }
    }
}

// =============================================================================
// Model Facade
// =============================================================================

/// Facade over one model's partition.
pub struct ModelFacade<'a, T, C> {
    store: &'a Store<T, C>,
    model: String,
}

impl<'a, T: Transport, C: Clock> ModelFacade<'a, T, C> {
    pub(crate) fn new(store: &'a Store<T, C>, model: &str) -> Self {
        ModelFacade {
            store,
            model: model.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.model
    }

    // =========================================================================
    // Synchronous Reads
    // =========================================================================

    /// Cached list for `filter`.
    pub fn find(&self, filter: Option<&Filter>) -> Option<Arc<Vec<Value>>> {
        let state = self.store.snapshot();
        state.list(&self.model, &filter_key(filter))?.data.clone()
    }

    /// Cached entity by id.
    pub fn find_one(&self, id: &str) -> Option<Arc<Value>> {
        let state = self.store.snapshot();
        state.entity(&self.model, id)?.data.clone()
    }

    /// Cached count for `filter`.
    pub fn find_count(&self, filter: Option<&Filter>) -> Option<u64> {
        let state = self.store.snapshot();
        state.count(&self.model, &filter_key(filter))?.data.as_deref().copied()
    }

    /// Cached graph points for `filter`.
    pub fn find_graph(&self, filter: Option<&Filter>) -> Option<Arc<Vec<Value>>> {
        let state = self.store.snapshot();
        state.graph(&self.model, &filter_key(filter))?.data.clone()
    }

    /// True while a single-entity fetch for `id` is in flight.
    pub fn is_loading(&self, id: &str) -> bool {
        let state = self.store.snapshot();
        state.entity(&self.model, id).is_some_and(|entry| entry.loading)
    }

    /// True while a list fetch for `filter` is in flight.
    pub fn are_loading(&self, filter: Option<&Filter>) -> bool {
        let state = self.store.snapshot();
        state
            .list(&self.model, &filter_key(filter))
            .is_some_and(|entry| entry.loading)
    }

    /// Last error recorded for the entity `id`.
    pub fn error(&self, id: &str) -> Option<StoreError> {
        let state = self.store.snapshot();
        state.entity(&self.model, id)?.error.clone()
    }

    /// Last error recorded for the list under `filter`.
    pub fn list_error(&self, filter: Option<&Filter>) -> Option<StoreError> {
        let state = self.store.snapshot();
        state.list(&self.model, &filter_key(filter))?.error.clone()
    }

    pub fn is_posting(&self) -> bool {
        let state = self.store.snapshot();
        state.partition(&self.model).is_some_and(|p| p.is_posting)
    }

    pub fn post_error(&self) -> Option<StoreError> {
        let state = self.store.snapshot();
        state.partition(&self.model)?.post_error.clone()
    }

    /// Puts a locally known entity into the by-id index as if it had just
    /// been fetched.
    pub fn set(&self, object: Value) -> StoreResult<()> {
        self.ensure_registered()?;
        let id = entity_id(&object).ok_or_else(|| StoreError::MissingId {
            model: self.model.clone(),
        })?;

        self.store.dispatch(Action::GetOneSuccess {
            model: self.model.clone(),
            id,
            result: Some(object),
            received_at: self.store.now_ms(),
        });
        Ok(())
    }

    // =========================================================================
    // Fetches
    // =========================================================================

    /// Fetches the list for `filter`, or returns it from cache while fresh.
    ///
    /// Unless the caller says otherwise the request sorts by `-created`, and
    /// `config` lists are limited to 100 entries. Those defaults only shape
    /// the outbound query; the cache key is derived from `filter` as given.
    pub async fn get(&self, filter: Option<&Filter>) -> StoreResult<Arc<Vec<Value>>> {
        self.ensure_registered()?;
        let key = filter_key(filter);
        let request = ApiRequest::get(resource_path([self.model.as_str()]))
            .with_query(filter_query(&self.list_query(filter)));

        self.fetch_cached(
            |state| state.list(&self.model, &key),
            Action::GetInit {
                model: self.model.clone(),
                filter_key: key.clone(),
            },
            request,
            decode_list,
            |results, received_at| Action::GetSuccess {
                model: self.model.clone(),
                filter_key: key.clone(),
                results: Some(results),
                received_at,
            },
            |error| Action::GetError {
                model: self.model.clone(),
                filter_key: key.clone(),
                error,
            },
        )
        .await
    }

    /// Fetches one entity, or returns it from cache while fresh.
    ///
    /// With `with_creator`, the entity's `createdBy` user is fetched as
    /// well. A failure there is logged and does not fail the call.
    pub async fn get_one(&self, id: &str, options: GetOneOptions) -> StoreResult<Arc<Value>> {
        let entity = self.fetch_one(id).await?;
        if options.with_creator {
            self.warm_creator(&entity).await;
        }
        Ok(entity)
    }

    /// Fetches the number of entities matching `filter`.
    pub async fn get_count(&self, filter: Option<&Filter>) -> StoreResult<Arc<u64>> {
        self.ensure_registered()?;
        let key = filter_key(filter);
        let request = ApiRequest::get(resource_path(["count", self.model.as_str()]))
            .with_query(filter.map(filter_query).unwrap_or_default());

        self.fetch_cached(
            |state| state.count(&self.model, &key),
            Action::GetCountInit {
                model: self.model.clone(),
                filter_key: key.clone(),
            },
            request,
            decode_count,
            |result, received_at| Action::GetCountSuccess {
                model: self.model.clone(),
                filter_key: key.clone(),
                result,
                received_at,
            },
            |error| Action::GetCountError {
                model: self.model.clone(),
                filter_key: key.clone(),
                error,
            },
        )
        .await
    }

    /// Fetches graph points for `filter`.
    pub async fn get_graph(&self, filter: Option<&Filter>) -> StoreResult<Arc<Vec<Value>>> {
        self.ensure_registered()?;
        let key = filter_key(filter);
        let request = ApiRequest::get(resource_path(["graph", self.model.as_str()]))
            .with_query(filter.map(filter_query).unwrap_or_default());

        self.fetch_cached(
            |state| state.graph(&self.model, &key),
            Action::GetGraphInit {
                model: self.model.clone(),
                filter_key: key.clone(),
            },
            request,
            decode_list,
            |results, received_at| Action::GetGraphSuccess {
                model: self.model.clone(),
                filter_key: key.clone(),
                results,
                received_at,
            },
            |error| Action::GetGraphError {
                model: self.model.clone(),
                filter_key: key.clone(),
                error,
            },
        )
        .await
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Creates an entity. On success it is indexed by id and prepended to
    /// every cached list whose `where` clause it matches.
    pub async fn post(&self, data: Value) -> StoreResult<Arc<Value>> {
        self.ensure_registered()?;
        self.store.dispatch(Action::PostInit {
            model: self.model.clone(),
        });

        let request = ApiRequest::post(resource_path([self.model.as_str()])).with_body(data);
        match self.store.fetch(request).await.and_then(decode_entity) {
            Ok(result) => {
                self.store.dispatch(Action::PostSuccess {
                    model: self.model.clone(),
                    result: result.clone(),
                    received_at: self.store.now_ms(),
                });
                Ok(self.stored(&result).unwrap_or_else(|| Arc::new(result)))
            }
            Err(error) => {
                warn!(model = %self.model, error = %error, "Create failed");
                self.store.dispatch(Action::PostError {
                    model: self.model.clone(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    /// Updates an entity. On success every cached copy of it is replaced,
    /// in the by-id index and in every list that contains it.
    pub async fn patch(&self, id: &str, data: Value) -> StoreResult<Arc<Value>> {
        let request = ApiRequest::patch(self.entity_path(id)?).with_body(data);
        self.apply_patch(id, request, None, None).await
    }

    /// Like [`patch`](Self::patch), and also overwrites position `index` of
    /// the list cached under `filter`.
    pub async fn patch_in_list(
        &self,
        id: &str,
        data: Value,
        filter: Option<&Filter>,
        index: usize,
    ) -> StoreResult<Arc<Value>> {
        let request = ApiRequest::patch(self.entity_path(id)?).with_body(data);
        self.apply_patch(id, request, Some(filter_key(filter)), Some(index))
            .await
    }

    /// Sends an update-shaped request and feeds its result through
    /// PATCH_SUCCESS / PATCH_ERROR.
    pub(crate) async fn apply_patch(
        &self,
        id: &str,
        request: ApiRequest,
        filter_key: Option<String>,
        result_index: Option<usize>,
    ) -> StoreResult<Arc<Value>> {
        self.ensure_registered()?;
        self.store.dispatch(Action::PatchInit {
            model: self.model.clone(),
            id: id.to_string(),
        });

        match self.store.fetch(request).await.and_then(decode_entity) {
            Ok(result) => {
                self.store.dispatch(Action::PatchSuccess {
                    model: self.model.clone(),
                    id: id.to_string(),
                    result: result.clone(),
                    filter_key,
                    result_index,
                    received_at: self.store.now_ms(),
                });
                Ok(self.find_one(id).unwrap_or_else(|| Arc::new(result)))
            }
            Err(error) => {
                warn!(model = %self.model, %id, error = %error, "Update failed");
                self.store.dispatch(Action::PatchError {
                    model: self.model.clone(),
                    id: id.to_string(),
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn ensure_registered(&self) -> StoreResult<()> {
        if self.store.registry().contains(&self.model) {
            Ok(())
        } else {
            warn!(model = %self.model, "Model is not registered");
            Err(StoreError::UnknownModel(self.model.clone()))
        }
    }

    /// `/{model}/{id}`, with the id escaped as a single path segment.
    fn entity_path(&self, id: &str) -> StoreResult<String> {
        self.ensure_registered()?;
        check_id(&self.model, id)?;
        Ok(resource_path([self.model.as_str(), id]))
    }

    /// The query actually sent for a list fetch.
    fn list_query(&self, filter: Option<&Filter>) -> Filter {
        let mut query = filter.cloned().unwrap_or_default();
        if query.sort_by.is_none() {
            query.sort_by = Some(DEFAULT_SORT.to_string());
        }
        if self.model == CONFIG_MODEL && query.limit.is_none() {
            query.limit = Some(CONFIG_DEFAULT_LIMIT);
        }
        query
    }

    fn stored(&self, entity: &Value) -> Option<Arc<Value>> {
        self.find_one(&entity_id(entity)?)
    }

    async fn fetch_one(&self, id: &str) -> StoreResult<Arc<Value>> {
        let request = ApiRequest::get(self.entity_path(id)?);

        self.fetch_cached(
            |state| state.entity(&self.model, id),
            Action::GetOneInit {
                model: self.model.clone(),
                id: id.to_string(),
            },
            request,
            decode_entity,
            |result, received_at| Action::GetOneSuccess {
                model: self.model.clone(),
                id: id.to_string(),
                result: Some(result),
                received_at,
            },
            |error| Action::GetOneError {
                model: self.model.clone(),
                id: id.to_string(),
                error,
            },
        )
        .await
    }

    async fn warm_creator(&self, entity: &Value) {
        let creator = if self.model == USER_MODEL {
            entity_id(entity)
        } else {
            entity.get(CREATOR_FIELD).and_then(creator_id)
        };
        let Some(creator) = creator else {
            return;
        };

        let users = ModelFacade::new(self.store, USER_MODEL);
        if let Err(error) = users.fetch_one(&creator).await {
            warn!(model = %self.model, creator = %creator, error = %error, "Could not load creator");
        }
    }

    /// Freshness check, then INIT / request / SUCCESS or ERROR.
    ///
    /// `read` locates the cache entry in a state snapshot; on success the
    /// returned `Arc` is the one now stored in that entry.
    async fn fetch_cached<D, R, S, E>(
        &self,
        read: R,
        init: Action,
        request: ApiRequest,
        decode: fn(Value) -> StoreResult<D>,
        on_success: S,
        on_error: E,
    ) -> StoreResult<Arc<D>>
    where
        R: Fn(&StoreState) -> Option<&CacheEntry<D>>,
        S: FnOnce(D, i64) -> Action,
        E: FnOnce(StoreError) -> Action,
    {
        let path = request.path.clone();
        let cached = {
            let state = self.store.snapshot();
            let now = self.store.now_ms();
            read(&state)
                .filter(|entry| entry.is_fresh(now, self.store.cache_duration_ms()))
                .and_then(|entry| entry.data.clone())
        };
        if let Some(data) = cached {
            debug!(model = %self.model, %path, "Cache hit");
            return Ok(data);
        }

        debug!(model = %self.model, %path, "Cache miss, fetching");
        self.store.dispatch(init);

        match self.store.fetch(request).await.and_then(decode) {
            Ok(data) => {
                self.store.dispatch(on_success(data, self.store.now_ms()));
                let state = self.store.snapshot();
                read(&state)
                    .and_then(|entry| entry.data.clone())
                    .ok_or(StoreError::NoResults { path })
            }
            Err(error) => {
                warn!(model = %self.model, %path, error = %error, "Fetch failed");
                self.store.dispatch(on_error(error.clone()));
                Err(error)
            }
        }
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Rejects ids that cannot name a single resource once placed in a path.
pub(crate) fn check_id(model: &str, id: &str) -> StoreResult<()> {
    if matches!(id, "" | "." | "..") {
        warn!(%model, %id, "Refusing identifier");
        return Err(StoreError::InvalidId {
            model: model.to_string(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Response Decoding
// =============================================================================

fn decode_list(results: Value) -> StoreResult<Vec<Value>> {
    match results {
        Value::Array(items) => Ok(items),
        other => Err(StoreError::InvalidResponse(format!(
            "expected a list of results, got {}",
            other
        ))),
    }
}

fn decode_entity(result: Value) -> StoreResult<Value> {
    if result.is_object() {
        Ok(result)
    } else {
        Err(StoreError::InvalidResponse(format!(
            "expected an entity, got {}",
            result
        )))
    }
}

fn decode_count(result: Value) -> StoreResult<u64> {
    result
        .as_u64()
        .ok_or_else(|| StoreError::InvalidResponse(format!("expected a count, got {}", result)))
}

/// `createdBy` is either a user id or an embedded user.
fn creator_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(_) => entity_id(value),
        _ => None,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
