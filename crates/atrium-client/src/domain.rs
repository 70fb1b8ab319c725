//! # Domain Facades
//!
//! Endpoints that do not fit the generic per-model CRUD shape.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  bookings().confirm(id)   POST /bookings/{id}/confirm    ─► PATCH_*     │
//! │  bookings().reject(id)    POST /bookings/{id}/reject     ─► PATCH_*     │
//! │  bookings().check_in(id)  POST /bookings/{id}/check-in   ─► PATCH_*     │
//! │  bookings().check_out(id) POST /bookings/{id}/check-out  ─► PATCH_*     │
//! │                                                                         │
//! │  carrots().get_balance(f)     GET /carrots/balance   ─► balance[key]    │
//! │  metrics().get_token_sales(f) GET /metrics/token-sales                  │
//! │                                                     ─► token_sales[key] │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Booking transitions go through the regular update path, so every cached
//! list and the by-id entry show the new booking state. Balance and token
//! sales are plain reads: they always hit the network, record only their
//! success, and report failures to the caller alone.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use atrium_core::{filter_key, Action, Filter, StoreResult};

use crate::clock::Clock;
use crate::store::Store;
use crate::facade::check_id;
use crate::transport::{filter_query, resource_path, ApiRequest, Transport};

const BOOKING_MODEL: &str = "booking";
const BALANCE_PATH: &str = "/carrots/balance";
const TOKEN_SALES_PATH: &str = "/metrics/token-sales";

// =============================================================================
// Bookings
// =============================================================================

/// Booking lifecycle transitions.
pub struct Bookings<'a, T, C> {
    store: &'a Store<T, C>,
}

impl<'a, T: Transport, C: Clock> Bookings<'a, T, C> {
    pub(crate) fn new(store: &'a Store<T, C>) -> Self {
        Bookings { store }
    }

    pub async fn confirm(&self, id: &str) -> StoreResult<Arc<Value>> {
        self.transition(id, "confirm").await
    }

    pub async fn reject(&self, id: &str) -> StoreResult<Arc<Value>> {
        self.transition(id, "reject").await
    }

    pub async fn check_in(&self, id: &str) -> StoreResult<Arc<Value>> {
        self.transition(id, "check-in").await
    }

    pub async fn check_out(&self, id: &str) -> StoreResult<Arc<Value>> {
        self.transition(id, "check-out").await
    }

    async fn transition(&self, id: &str, action: &str) -> StoreResult<Arc<Value>> {
        debug!(%id, action, "Booking transition");
        check_id(BOOKING_MODEL, id)?;
        let request = ApiRequest::post(resource_path(["bookings", id, action]));
        self.store
            .model(BOOKING_MODEL)
            .apply_patch(id, request, None, None)
            .await
    }
}

// =============================================================================
// Carrots
// =============================================================================

/// Carrot balance reads.
pub struct Carrots<'a, T, C> {
    store: &'a Store<T, C>,
}

impl<'a, T: Transport, C: Clock> Carrots<'a, T, C> {
    pub(crate) fn new(store: &'a Store<T, C>) -> Self {
        Carrots { store }
    }

    /// Fetches the balance for `filter` and caches it.
    pub async fn get_balance(&self, filter: Option<&Filter>) -> StoreResult<Arc<Value>> {
        let key = filter_key(filter);
        let request = aux_request(BALANCE_PATH, filter);

        let result = self.store.fetch(request).await.map_err(|error| {
            warn!(filter_key = %key, error = %error, "Balance fetch failed");
            error
        })?;

        self.store.dispatch(Action::GetBalanceSuccess {
            filter_key: key.clone(),
            result: result.clone(),
            received_at: self.store.now_ms(),
        });
        Ok(self.find_balance(filter).unwrap_or_else(|| Arc::new(result)))
    }

    /// Cached balance for `filter`.
    pub fn find_balance(&self, filter: Option<&Filter>) -> Option<Arc<Value>> {
        let state = self.store.snapshot();
        state.balance(&filter_key(filter))?.data.clone()
    }
}

// =============================================================================
// Metrics
// =============================================================================

/// Platform metrics reads.
pub struct Metrics<'a, T, C> {
    store: &'a Store<T, C>,
}

impl<'a, T: Transport, C: Clock> Metrics<'a, T, C> {
    pub(crate) fn new(store: &'a Store<T, C>) -> Self {
        Metrics { store }
    }

    /// Fetches token-sale metrics for `filter` and caches them.
    pub async fn get_token_sales(&self, filter: Option<&Filter>) -> StoreResult<Arc<Value>> {
        let key = filter_key(filter);
        let request = aux_request(TOKEN_SALES_PATH, filter);

        let results = self.store.fetch(request).await.map_err(|error| {
            warn!(filter_key = %key, error = %error, "Token sales fetch failed");
            error
        })?;

        self.store.dispatch(Action::GetTokenSalesSuccess {
            filter_key: key.clone(),
            results: results.clone(),
            received_at: self.store.now_ms(),
        });
        Ok(self
            .find_token_sales(filter)
            .unwrap_or_else(|| Arc::new(results)))
    }

    /// Cached token-sale metrics for `filter`.
    pub fn find_token_sales(&self, filter: Option<&Filter>) -> Option<Arc<Value>> {
        let state = self.store.snapshot();
        state.token_sales(&filter_key(filter))?.data.clone()
    }
}

fn aux_request(path: &str, filter: Option<&Filter>) -> ApiRequest {
    ApiRequest::get(path).with_query(filter.map(filter_query).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::testing::ScriptedTransport;
    use crate::transport::ApiMethod;
    use atrium_core::StoreError;
    use serde_json::json;

    fn store() -> Store<ScriptedTransport, ManualClock> {
        Store::builder(ScriptedTransport::new())
            .with_clock(ManualClock::new(5_000))
            .build()
    }

    #[tokio::test]
    async fn test_booking_transitions_update_cached_copies() {
        let store = store();
        let transport = store.transport();
        let pending = Filter::new().where_eq("status", "pending");

        transport.respond(
            ApiMethod::Get,
            "/booking",
            json!({ "results": [{ "_id": "b1", "status": "pending" }] }),
        );
        store.model("booking").get(Some(&pending)).await.unwrap();

        let steps = [
            ("confirm", "confirmed"),
            ("reject", "rejected"),
            ("check-in", "checked_in"),
            ("check-out", "checked_out"),
        ];
        for (action, status) in steps {
            transport.respond(
                ApiMethod::Post,
                &format!("/bookings/b1/{}", action),
                json!({ "results": { "_id": "b1", "status": status } }),
            );
        }

        let bookings = store.bookings();
        assert_eq!(bookings.confirm("b1").await.unwrap()["status"], "confirmed");
        assert_eq!(bookings.reject("b1").await.unwrap()["status"], "rejected");
        assert_eq!(bookings.check_in("b1").await.unwrap()["status"], "checked_in");
        let final_state = bookings.check_out("b1").await.unwrap();

        let expected = json!({ "_id": "b1", "status": "checked_out" });
        assert_eq!(*final_state, expected);
        assert_eq!(store.model("booking").find_one("b1").as_deref(), Some(&expected));
        assert_eq!(store.model("booking").find(Some(&pending)).unwrap()[0], expected);

        let paths: Vec<String> = transport.calls().into_iter().map(|c| c.path).collect();
        assert_eq!(
            &paths[1..],
            &[
                "/bookings/b1/confirm",
                "/bookings/b1/reject",
                "/bookings/b1/check-in",
                "/bookings/b1/check-out"
            ]
        );
    }

    #[tokio::test]
    async fn test_booking_transition_failure_is_returned() {
        let store = store();
        let failure = StoreError::Http {
            status: 409,
            message: "already checked in".into(),
        };
        store
            .transport()
            .fail(ApiMethod::Post, "/bookings/b1/check-in", failure.clone());

        assert_eq!(store.bookings().check_in("b1").await.unwrap_err(), failure);
        assert!(store.model("booking").find_one("b1").is_none());
    }

    #[tokio::test]
    async fn test_booking_transition_escapes_the_id() {
        let store = store();
        store.transport().respond(
            ApiMethod::Post,
            "/bookings/b%2F1/confirm",
            json!({ "results": { "_id": "b/1", "status": "confirmed" } }),
        );

        let confirmed = store.bookings().confirm("b/1").await.unwrap();
        assert_eq!(confirmed["status"], "confirmed");

        let err = store.bookings().reject("..").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidId { .. }));
        assert_eq!(store.transport().call_count(), 1);
    }

    #[tokio::test]
    async fn test_balance_is_cached_per_filter() {
        let store = store();
        store.transport().respond(
            ApiMethod::Get,
            BALANCE_PATH,
            json!({ "results": { "balance": 120 } }),
        );
        let carrots = store.carrots();
        let mine = Filter::new().where_eq("user", "u1");

        assert!(carrots.find_balance(Some(&mine)).is_none());
        let balance = carrots.get_balance(Some(&mine)).await.unwrap();

        assert_eq!(balance["balance"], 120);
        assert_eq!(carrots.find_balance(Some(&mine)), Some(balance));
        assert!(carrots.find_balance(None).is_none());

        let calls = store.transport().calls();
        assert_eq!(calls[0].query[0].0, "where");
    }

    #[tokio::test]
    async fn test_balance_reads_always_hit_network() {
        let store = store();
        store
            .transport()
            .respond(ApiMethod::Get, BALANCE_PATH, json!({ "results": { "balance": 1 } }));

        store.carrots().get_balance(None).await.unwrap();
        store.carrots().get_balance(None).await.unwrap();

        assert_eq!(store.transport().call_count(), 2);
    }

    #[tokio::test]
    async fn test_balance_failure_leaves_state_alone() {
        let store = store();
        let before = store.snapshot();

        let err = store.carrots().get_balance(None).await.unwrap_err();

        assert!(matches!(err, StoreError::Http { status: 404, .. }));
        assert!(store.snapshot().balance.is_none());
        assert!(Arc::ptr_eq(&before, &store.snapshot()));
    }

    #[tokio::test]
    async fn test_token_sales() {
        let store = store();
        let sales = json!([{ "day": "2024-03-01", "tokens": 900 }]);
        store
            .transport()
            .respond(ApiMethod::Get, TOKEN_SALES_PATH, json!({ "results": sales.clone() }));
        let metrics = store.metrics();

        let result = metrics.get_token_sales(None).await.unwrap();

        assert_eq!(*result, sales);
        assert_eq!(metrics.find_token_sales(None).as_deref(), Some(&sales));
        assert!(store.snapshot().balance.is_none());
    }
}
