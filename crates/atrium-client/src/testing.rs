//! In-memory transport for store tests.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use serde_json::Value;

use atrium_core::{StoreError, StoreResult};

use crate::transport::{ApiMethod, ApiRequest, Transport};

/// Answers requests from a route table and records every request it saw.
///
/// Responses are returned after one scheduler yield, so two fetches started
/// together are both in flight before either resolves.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<(ApiMethod, String), StoreResult<Value>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Answers `method path` with `body` until told otherwise.
    pub(crate) fn respond(&self, method: ApiMethod, path: &str, body: Value) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Ok(body));
    }

    /// Fails `method path` with `error` until told otherwise.
    pub(crate) fn fail(&self, method: ApiMethod, path: &str, error: StoreError) {
        self.routes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Err(error));
    }

    pub(crate) fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: ApiRequest) -> impl Future<Output = StoreResult<Value>> + Send {
        let response = self
            .routes
            .lock()
            .unwrap()
            .get(&(request.method, request.path.clone()))
            .cloned()
            .unwrap_or_else(|| {
                Err(StoreError::Http {
                    status: 404,
                    message: format!("no route for {} {}", request.method, request.path),
                })
            });
        self.calls.lock().unwrap().push(request);

        async move {
            tokio::task::yield_now().await;
            response
        }
    }
}
