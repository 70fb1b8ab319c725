//! # Store State
//!
//! The shape of the normalized store: one partition per model, each with
//! two independent indices over the same records, plus two auxiliary
//! partitions that are keyed by filter only.
//!
//! ## State Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          StoreState                                     │
//! │                                                                         │
//! │  models ─┬─ "booking" ──► ModelPartition                                │
//! │          │                 ├── by_id     { "b1": CacheEntry<Entity> }   │
//! │          │                 ├── by_filter { key: CacheEntry<[Entity]> }  │
//! │          │                 ├── count     { key: CacheEntry<u64> }       │
//! │          │                 ├── graph     { key: CacheEntry<[Point]> }   │
//! │          │                 └── is_posting / post_error                  │
//! │          ├─ "user"    ──► ModelPartition                                │
//! │          └─ ...                                                         │
//! │                                                                         │
//! │  balance      ──► created on first write, keyed by filter key           │
//! │  token_sales  ──► created on first write, keyed by filter key           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Structural Sharing
//! Partitions sit behind `Arc`. Cloning a `StoreState` copies a map of
//! pointers, and the reducer only deep-copies the partition it changes
//! (`Arc::make_mut`). A reader holding an older snapshot keeps seeing the
//! old partition untouched.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// Freshness window for cache entries, in milliseconds (5 minutes).
pub const CACHE_DURATION_MS: i64 = 300_000;

/// Models known to the platform out of the box.
pub const DEFAULT_MODELS: &[&str] = &[
    "booking",
    "user",
    "event",
    "charge",
    "listing",
    "lesson",
    "metric",
    "config",
    "ticket",
    "product",
    "subscription",
    "article",
    "photo",
    "message",
    "channel",
    "proposal",
    "resource",
];

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached fetch result and its request-lifecycle flags.
///
/// ## Lifecycle
/// ```text
/// <uninitialized> ──INIT──► loading ──SUCCESS──► fresh data, error cleared
///                              │
///                              └────ERROR────► error set, stale data kept
/// ```
#[derive(Debug, Serialize)]
pub struct CacheEntry<T> {
    /// Last successfully fetched payload. Shared by reference with readers.
    pub data: Option<Arc<T>>,

    /// True strictly between a request's INIT and its resolution.
    pub loading: bool,

    /// Last error, cleared by the next success.
    pub error: Option<StoreError>,

    /// Epoch millis of the last successful population.
    pub received_at: Option<i64>,
}

// Manual impls: derive would require `T: Clone`/`T: Default` even though
// only the `Arc` is cloned.
impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        CacheEntry {
            data: self.data.clone(),
            loading: self.loading,
            error: self.error.clone(),
            received_at: self.received_at,
        }
    }
}

impl<T> Default for CacheEntry<T> {
    fn default() -> Self {
        CacheEntry {
            data: None,
            loading: false,
            error: None,
            received_at: None,
        }
    }
}

impl<T> CacheEntry<T> {
    /// Entry populated by a successful fetch.
    pub fn loaded(data: Arc<T>, received_at: i64) -> Self {
        CacheEntry {
            data: Some(data),
            loading: false,
            error: None,
            received_at: Some(received_at),
        }
    }

    /// True if the entry was populated less than `ttl_ms` before `now_ms`.
    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        match (self.received_at, &self.data) {
            (Some(received_at), Some(_)) => now_ms - received_at < ttl_ms,
            _ => false,
        }
    }
}

// =============================================================================
// Partitions
// =============================================================================

/// Entities indexed by identifier.
pub type ByIdIndex = HashMap<String, CacheEntry<Value>>;

/// Entity lists indexed by filter key.
pub type ByFilterIndex = HashMap<String, CacheEntry<Vec<Value>>>;

/// Auxiliary single-level partition (balance, token sales).
pub type AuxPartition = HashMap<String, CacheEntry<Value>>;

/// Everything cached for one model.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ModelPartition {
    pub by_id: ByIdIndex,
    pub by_filter: ByFilterIndex,
    pub count: HashMap<String, CacheEntry<u64>>,
    pub graph: HashMap<String, CacheEntry<Vec<Value>>>,
    pub is_posting: bool,
    pub post_error: Option<StoreError>,
}

// =============================================================================
// Model Registry
// =============================================================================

/// The fixed set of model names that get a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    names: Vec<String>,
}

impl ModelRegistry {
    /// Builds a registry from names. Duplicates and blank names are dropped;
    /// first occurrence wins the ordering.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into().trim().to_string();
            if !name.is_empty() && !unique.contains(&name) {
                unique.push(name);
            }
        }
        ModelRegistry { names: unique }
    }

    /// Model names in registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// True if `model` is registered.
    pub fn contains(&self, model: &str) -> bool {
        self.names.iter().any(|name| name == model)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        ModelRegistry::new(DEFAULT_MODELS.iter().copied())
    }
}

// =============================================================================
// Store State
// =============================================================================

/// The whole store. Produced by the reducer, never mutated in place once
/// published.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StoreState {
    pub models: BTreeMap<String, Arc<ModelPartition>>,
    pub balance: Option<Arc<AuxPartition>>,
    pub token_sales: Option<Arc<AuxPartition>>,
}

impl StoreState {
    /// Empty state with one partition per registered model. Auxiliary
    /// partitions are created lazily by their first write.
    pub fn initial(registry: &ModelRegistry) -> Self {
        let models = registry
            .names()
            .iter()
            .map(|name| (name.clone(), Arc::new(ModelPartition::default())))
            .collect();

        StoreState {
            models,
            balance: None,
            token_sales: None,
        }
    }

    /// Partition of `model`, or `None` if it is not registered.
    pub fn partition(&self, model: &str) -> Option<&ModelPartition> {
        self.models.get(model).map(Arc::as_ref)
    }

    /// Cached list for `(model, filter_key)`.
    pub fn list(&self, model: &str, filter_key: &str) -> Option<&CacheEntry<Vec<Value>>> {
        self.partition(model)?.by_filter.get(filter_key)
    }

    /// Cached entity for `(model, id)`.
    pub fn entity(&self, model: &str, id: &str) -> Option<&CacheEntry<Value>> {
        self.partition(model)?.by_id.get(id)
    }

    /// Cached count for `(model, filter_key)`.
    pub fn count(&self, model: &str, filter_key: &str) -> Option<&CacheEntry<u64>> {
        self.partition(model)?.count.get(filter_key)
    }

    /// Cached graph for `(model, filter_key)`.
    pub fn graph(&self, model: &str, filter_key: &str) -> Option<&CacheEntry<Vec<Value>>> {
        self.partition(model)?.graph.get(filter_key)
    }

    /// Cached balance for a filter key.
    pub fn balance(&self, filter_key: &str) -> Option<&CacheEntry<Value>> {
        self.balance.as_deref()?.get(filter_key)
    }

    /// Cached token-sale metrics for a filter key.
    pub fn token_sales(&self, filter_key: &str) -> Option<&CacheEntry<Value>> {
        self.token_sales.as_deref()?.get(filter_key)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_state_has_every_model() {
        let registry = ModelRegistry::default();
        let state = StoreState::initial(&registry);

        assert_eq!(state.models.len(), DEFAULT_MODELS.len());
        for model in DEFAULT_MODELS {
            let partition = state.partition(model).unwrap();
            assert!(partition.by_id.is_empty());
            assert!(partition.by_filter.is_empty());
            assert!(!partition.is_posting);
        }
        assert!(state.balance.is_none());
        assert!(state.token_sales.is_none());
    }

    #[test]
    fn test_unregistered_model_reads_are_none() {
        let state = StoreState::initial(&ModelRegistry::new(["booking"]));
        assert!(state.partition("spaceship").is_none());
        assert!(state.list("spaceship", "__").is_none());
        assert!(state.entity("spaceship", "x").is_none());
    }

    #[test]
    fn test_registry_dedupes() {
        let registry = ModelRegistry::new(["user", "booking", "user", " ", "event"]);
        assert_eq!(registry.names(), &["user", "booking", "event"]);
        assert!(registry.contains("booking"));
        assert!(!registry.contains("charge"));
    }

    #[test]
    fn test_freshness() {
        let entry = CacheEntry::loaded(Arc::new(json!({ "_id": "a" })), 1_000);

        assert!(entry.is_fresh(1_000, CACHE_DURATION_MS));
        assert!(entry.is_fresh(1_000 + CACHE_DURATION_MS - 1, CACHE_DURATION_MS));
        assert!(!entry.is_fresh(1_000 + CACHE_DURATION_MS, CACHE_DURATION_MS));

        let never_loaded: CacheEntry<Value> = CacheEntry::default();
        assert!(!never_loaded.is_fresh(0, CACHE_DURATION_MS));
    }

    #[test]
    fn test_clone_shares_partitions() {
        let state = StoreState::initial(&ModelRegistry::default());
        let copy = state.clone();
        assert!(Arc::ptr_eq(&state.models["booking"], &copy.models["booking"]));
    }
}
