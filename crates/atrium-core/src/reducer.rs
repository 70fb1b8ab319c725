//! # Reducer
//!
//! The single state transition function: `(state, action) -> state`.
//!
//! ## Transition Table
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Reducer Transitions                              │
//! │                                                                         │
//! │  GET_INIT          by_filter[key].loading = true (data/error kept)      │
//! │  GET_SUCCESS       by_filter[key] = loaded(results)                     │
//! │                    + by_id[e.id] = loaded(e) for every result           │
//! │  GET_ERROR         by_filter[key] += { error, loading: false }          │
//! │                                                                         │
//! │  GET_ONE_*         same, against by_id[id] (no list cross-population)   │
//! │                                                                         │
//! │  POST_INIT         is_posting = true                                    │
//! │  POST_SUCCESS      is_posting = false, by_id[new.id] = new,             │
//! │                    new prepended to every loaded list it matches        │
//! │  POST_ERROR        is_posting = false, post_error = error               │
//! │                                                                         │
//! │  PATCH_INIT/ERROR  no-op                                                │
//! │  PATCH_SUCCESS     by_id[id] = patched, optional (key, index) slot,     │
//! │                    + every list entry with the same id replaced         │
//! │                                                                         │
//! │  GET_COUNT_*       like GET_*, against count[key]                       │
//! │  GET_GRAPH_*       like GET_*, against graph[key]                       │
//! │  GET_BALANCE_SUCCESS / GET_TOKEN_SALES_SUCCESS                          │
//! │                    auxiliary[key] = loaded(result), partition created   │
//! │                    on first write                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Purity
//! The input state is never modified. The returned state shares every
//! partition the action did not touch with the input.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::action::Action;
use crate::filter::{entity_id, parse_filter_key};
use crate::state::{AuxPartition, CacheEntry, ModelPartition, StoreState};

/// Applies `action` to `state` and returns the next state.
pub fn reduce(state: &StoreState, action: Action) -> StoreState {
    debug!(kind = %action.kind(), model = ?action.model(), "Reducing action");

    match action {
        // =====================================================================
        // List fetch
        // =====================================================================
        Action::GetInit { model, filter_key } => with_partition(state, &model, |partition| {
            partition.by_filter.entry(filter_key).or_default().loading = true;
        }),

        Action::GetSuccess {
            model,
            filter_key,
            results,
            received_at,
        } => {
            let Some(results) = results else {
                warn!(%model, %filter_key, "GET_SUCCESS without results, state unchanged");
                return state.clone();
            };

            with_partition(state, &model, |partition| {
                for entity in &results {
                    if let Some(id) = entity_id(entity) {
                        partition
                            .by_id
                            .insert(id, CacheEntry::loaded(Arc::new(entity.clone()), received_at));
                    }
                }
                partition
                    .by_filter
                    .insert(filter_key, CacheEntry::loaded(Arc::new(results), received_at));
            })
        }

        Action::GetError {
            model,
            filter_key,
            error,
        } => with_partition(state, &model, |partition| {
            let entry = partition.by_filter.entry(filter_key).or_default();
            entry.error = Some(error);
            entry.loading = false;
        }),

        // =====================================================================
        // Single fetch
        // =====================================================================
        Action::GetOneInit { model, id } => with_partition(state, &model, |partition| {
            partition.by_id.entry(id).or_default().loading = true;
        }),

        Action::GetOneSuccess {
            model,
            id,
            result,
            received_at,
        } => {
            let Some(result) = result else {
                warn!(%model, %id, "GET_ONE_SUCCESS without result, state unchanged");
                return state.clone();
            };

            with_partition(state, &model, |partition| {
                partition
                    .by_id
                    .insert(id, CacheEntry::loaded(Arc::new(result), received_at));
            })
        }

        Action::GetOneError { model, id, error } => with_partition(state, &model, |partition| {
            let entry = partition.by_id.entry(id).or_default();
            entry.error = Some(error);
            entry.loading = false;
        }),

        // =====================================================================
        // Create
        // =====================================================================
        Action::PostInit { model } => with_partition(state, &model, |partition| {
            partition.is_posting = true;
        }),

        Action::PostSuccess {
            model,
            result,
            received_at,
        } => with_partition(state, &model, |partition| {
            partition.is_posting = false;
            partition.post_error = None;

            match entity_id(&result) {
                Some(id) => {
                    partition
                        .by_id
                        .insert(id, CacheEntry::loaded(Arc::new(result.clone()), received_at));
                }
                None => warn!(%model, "POST_SUCCESS result has no id, by_id not updated"),
            }

            prepend_to_matching_lists(partition, &result);
        }),

        Action::PostError { model, error } => with_partition(state, &model, |partition| {
            partition.is_posting = false;
            partition.post_error = Some(error);
        }),

        // =====================================================================
        // Update
        // =====================================================================
        Action::PatchInit { .. } => state.clone(),

        Action::PatchError { model, id, error } => {
            debug!(%model, %id, %error, "PATCH_ERROR leaves state unchanged");
            state.clone()
        }

        Action::PatchSuccess {
            model,
            id,
            result,
            filter_key,
            result_index,
            received_at,
        } => with_partition(state, &model, |partition| {
            partition.by_id.insert(
                id.clone(),
                CacheEntry::loaded(Arc::new(result.clone()), received_at),
            );

            if let (Some(key), Some(index)) = (filter_key, result_index) {
                overwrite_slot(partition, &key, index, &result);
            }

            replace_in_all_lists(partition, &id, &result);
        }),

        // =====================================================================
        // Count
        // =====================================================================
        Action::GetCountInit { model, filter_key } => with_partition(state, &model, |partition| {
            partition.count.entry(filter_key).or_default().loading = true;
        }),

        Action::GetCountSuccess {
            model,
            filter_key,
            result,
            received_at,
        } => with_partition(state, &model, |partition| {
            partition
                .count
                .insert(filter_key, CacheEntry::loaded(Arc::new(result), received_at));
        }),

        Action::GetCountError {
            model,
            filter_key,
            error,
        } => with_partition(state, &model, |partition| {
            let entry = partition.count.entry(filter_key).or_default();
            entry.error = Some(error);
            entry.loading = false;
        }),

        // =====================================================================
        // Graph
        // =====================================================================
        Action::GetGraphInit { model, filter_key } => with_partition(state, &model, |partition| {
            partition.graph.entry(filter_key).or_default().loading = true;
        }),

        Action::GetGraphSuccess {
            model,
            filter_key,
            results,
            received_at,
        } => with_partition(state, &model, |partition| {
            partition
                .graph
                .insert(filter_key, CacheEntry::loaded(Arc::new(results), received_at));
        }),

        Action::GetGraphError {
            model,
            filter_key,
            error,
        } => with_partition(state, &model, |partition| {
            let entry = partition.graph.entry(filter_key).or_default();
            entry.error = Some(error);
            entry.loading = false;
        }),

        // =====================================================================
        // Auxiliary partitions
        // =====================================================================
        Action::GetBalanceSuccess {
            filter_key,
            result,
            received_at,
        } => {
            let mut next = state.clone();
            write_aux(&mut next.balance, filter_key, result, received_at);
            next
        }

        Action::GetTokenSalesSuccess {
            filter_key,
            results,
            received_at,
        } => {
            let mut next = state.clone();
            write_aux(&mut next.token_sales, filter_key, results, received_at);
            next
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Clones `state` and applies `update` to a private copy of `model`'s
/// partition. Unregistered models leave the state unchanged.
fn with_partition<F>(state: &StoreState, model: &str, update: F) -> StoreState
where
    F: FnOnce(&mut ModelPartition),
{
    let mut next = state.clone();
    match next.models.get_mut(model) {
        Some(partition) => update(Arc::make_mut(partition)),
        None => warn!(model, "Action targets an unregistered model, state unchanged"),
    }
    next
}

/// Inserts a freshly created entity at the front of every loaded list whose
/// filter it satisfies. Keys that do not parse back into a filter (including
/// the no-filter sentinel) are skipped.
fn prepend_to_matching_lists(partition: &mut ModelPartition, entity: &Value) {
    for (key, entry) in partition.by_filter.iter_mut() {
        let Some(filter) = parse_filter_key(key) else {
            continue;
        };
        if !filter.matches(entity) {
            continue;
        }
        if let Some(data) = entry.data.as_mut() {
            Arc::make_mut(data).insert(0, entity.clone());
        }
    }
}

/// Overwrites `by_filter[key].data[index]` if that slot exists.
fn overwrite_slot(partition: &mut ModelPartition, key: &str, index: usize, entity: &Value) {
    let Some(data) = partition
        .by_filter
        .get_mut(key)
        .and_then(|entry| entry.data.as_mut())
    else {
        debug!(key, "PATCH_SUCCESS slot refers to an unloaded list");
        return;
    };

    if index < data.len() {
        Arc::make_mut(data)[index] = entity.clone();
    } else {
        debug!(key, index, len = data.len(), "PATCH_SUCCESS slot out of range");
    }
}

/// Replaces every list element whose id is `id` with `entity`.
fn replace_in_all_lists(partition: &mut ModelPartition, id: &str, entity: &Value) {
    let same_id = |candidate: &Value| entity_id(candidate).as_deref() == Some(id);

    for entry in partition.by_filter.values_mut() {
        let Some(data) = entry.data.as_mut() else {
            continue;
        };
        // Only copy lists that actually contain the entity.
        if !data.iter().any(same_id) {
            continue;
        }
        for slot in Arc::make_mut(data).iter_mut() {
            if same_id(&*slot) {
                *slot = entity.clone();
            }
        }
    }
}

fn write_aux(
    partition: &mut Option<Arc<AuxPartition>>,
    filter_key: String,
    value: Value,
    received_at: i64,
) {
    let partition = partition.get_or_insert_with(Default::default);
    Arc::make_mut(partition).insert(filter_key, CacheEntry::loaded(Arc::new(value), received_at));
}

// =============================================================================
// Unit Tests
// =============================================================================
