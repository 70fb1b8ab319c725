//! # atrium-core: Pure Store Logic for Atrium
//!
//! This crate is the **heart** of the Atrium client store. It contains the
//! normalized cache's state shape and the reducer that moves it from one
//! state to the next, as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Atrium Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Consuming UI / services                      │   │
//! │  │    store.model("booking").get(filter) ─► find(filter)           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 atrium-client (Store facade)                    │   │
//! │  │    freshness check ─► REST call ─► dispatch(Action)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ atrium-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐   │   │
//! │  │   │  action   │  │  filter   │  │   state   │  │  reducer  │   │   │
//! │  │   │  Action   │  │  Filter   │  │ StoreState│  │  reduce() │   │   │
//! │  │   │ ActionKind│  │ filter_key│  │ CacheEntry│  │           │   │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO CLOCK • NO NETWORK • PURE FUNCTIONS               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`action`] - Closed set of state transitions
//! - [`filter`] - Query filters, cache keys, write-time matching
//! - [`state`] - Partitions, cache entries, model registry
//! - [`reducer`] - The transition function
//! - [`error`] - Store error types
//!
//! ## Example Usage
//!
//! ```rust
//! use atrium_core::{filter_key, reduce, Action, Filter, ModelRegistry, StoreState};
//! use serde_json::json;
//!
//! let state = StoreState::initial(&ModelRegistry::default());
//! let open = Filter::new().where_eq("status", "open");
//!
//! let state = reduce(
//!     &state,
//!     Action::GetSuccess {
//!         model: "booking".into(),
//!         filter_key: filter_key(Some(&open)),
//!         results: Some(vec![json!({ "_id": "b1", "status": "open" })]),
//!         received_at: 1_000,
//!     },
//! );
//!
//! // The list fetch also warmed the by-id index.
//! assert!(state.entity("booking", "b1").is_some());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod action;
pub mod error;
pub mod filter;
pub mod reducer;
pub mod state;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use action::{Action, ActionKind};
pub use error::{StoreError, StoreResult};
pub use filter::{entity_id, filter_key, format_search, parse_filter_key, Filter, Operator};
pub use reducer::reduce;
pub use state::{
    CacheEntry, ModelPartition, ModelRegistry, StoreState, CACHE_DURATION_MS, DEFAULT_MODELS,
};
