//! # Actions
//!
//! Every state transition the store knows about, as a closed sum type.
//!
//! ## Action Families
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Action Kinds                                   │
//! │                                                                         │
//! │  List fetch     GET_INIT        GET_SUCCESS        GET_ERROR            │
//! │  Single fetch   GET_ONE_INIT    GET_ONE_SUCCESS    GET_ONE_ERROR        │
//! │  Create         POST_INIT       POST_SUCCESS       POST_ERROR           │
//! │  Update         PATCH_INIT      PATCH_SUCCESS      PATCH_ERROR          │
//! │  Count          GET_COUNT_INIT  GET_COUNT_SUCCESS  GET_COUNT_ERROR      │
//! │  Graph          GET_GRAPH_INIT  GET_GRAPH_SUCCESS  GET_GRAPH_ERROR      │
//! │  Auxiliary                      GET_BALANCE_SUCCESS                     │
//! │                                 GET_TOKEN_SALES_SUCCESS                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Because `Action` is an enum, the reducer matches exhaustively and an
//! "unknown kind" cannot reach it. Unknown kinds can only show up when an
//! action is decoded from JSON, where [`Action::from_json`] rejects them
//! with [`StoreError::UnknownAction`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Action Kind
// =============================================================================

/// Discriminant of an [`Action`], with its wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    GetInit,
    GetSuccess,
    GetError,
    GetOneInit,
    GetOneSuccess,
    GetOneError,
    PostInit,
    PostSuccess,
    PostError,
    PatchInit,
    PatchSuccess,
    PatchError,
    GetCountInit,
    GetCountSuccess,
    GetCountError,
    GetGraphInit,
    GetGraphSuccess,
    GetGraphError,
    GetBalanceSuccess,
    GetTokenSalesSuccess,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActionKind; 20] = [
        ActionKind::GetInit,
        ActionKind::GetSuccess,
        ActionKind::GetError,
        ActionKind::GetOneInit,
        ActionKind::GetOneSuccess,
        ActionKind::GetOneError,
        ActionKind::PostInit,
        ActionKind::PostSuccess,
        ActionKind::PostError,
        ActionKind::PatchInit,
        ActionKind::PatchSuccess,
        ActionKind::PatchError,
        ActionKind::GetCountInit,
        ActionKind::GetCountSuccess,
        ActionKind::GetCountError,
        ActionKind::GetGraphInit,
        ActionKind::GetGraphSuccess,
        ActionKind::GetGraphError,
        ActionKind::GetBalanceSuccess,
        ActionKind::GetTokenSalesSuccess,
    ];

    /// Wire name, e.g. `GET_ONE_SUCCESS`.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ActionKind::GetInit => "GET_INIT",
            ActionKind::GetSuccess => "GET_SUCCESS",
            ActionKind::GetError => "GET_ERROR",
            ActionKind::GetOneInit => "GET_ONE_INIT",
            ActionKind::GetOneSuccess => "GET_ONE_SUCCESS",
            ActionKind::GetOneError => "GET_ONE_ERROR",
            ActionKind::PostInit => "POST_INIT",
            ActionKind::PostSuccess => "POST_SUCCESS",
            ActionKind::PostError => "POST_ERROR",
            ActionKind::PatchInit => "PATCH_INIT",
            ActionKind::PatchSuccess => "PATCH_SUCCESS",
            ActionKind::PatchError => "PATCH_ERROR",
            ActionKind::GetCountInit => "GET_COUNT_INIT",
            ActionKind::GetCountSuccess => "GET_COUNT_SUCCESS",
            ActionKind::GetCountError => "GET_COUNT_ERROR",
            ActionKind::GetGraphInit => "GET_GRAPH_INIT",
            ActionKind::GetGraphSuccess => "GET_GRAPH_SUCCESS",
            ActionKind::GetGraphError => "GET_GRAPH_ERROR",
            ActionKind::GetBalanceSuccess => "GET_BALANCE_SUCCESS",
            ActionKind::GetTokenSalesSuccess => "GET_TOKEN_SALES_SUCCESS",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::UnknownAction(s.to_string()))
    }
}

// =============================================================================
// Action
// =============================================================================

/// A state transition, with its payload.
///
/// Timestamps (`received_at`) are supplied by the dispatcher so the reducer
/// stays pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    // -------------------------------------------------------------------------
    // List fetch
    // -------------------------------------------------------------------------
    GetInit {
        model: String,
        filter_key: String,
    },
    GetSuccess {
        model: String,
        filter_key: String,
        /// `None` models a success response without payload.
        results: Option<Vec<Value>>,
        received_at: i64,
    },
    GetError {
        model: String,
        filter_key: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Single fetch
    // -------------------------------------------------------------------------
    GetOneInit {
        model: String,
        id: String,
    },
    GetOneSuccess {
        model: String,
        id: String,
        result: Option<Value>,
        received_at: i64,
    },
    GetOneError {
        model: String,
        id: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Create
    // -------------------------------------------------------------------------
    PostInit {
        model: String,
    },
    PostSuccess {
        model: String,
        result: Value,
        received_at: i64,
    },
    PostError {
        model: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Update
    // -------------------------------------------------------------------------
    PatchInit {
        model: String,
        id: String,
    },
    PatchSuccess {
        model: String,
        id: String,
        result: Value,
        /// Optional list slot the caller knows the entity lives in.
        filter_key: Option<String>,
        result_index: Option<usize>,
        received_at: i64,
    },
    PatchError {
        model: String,
        id: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Count
    // -------------------------------------------------------------------------
    GetCountInit {
        model: String,
        filter_key: String,
    },
    GetCountSuccess {
        model: String,
        filter_key: String,
        result: u64,
        received_at: i64,
    },
    GetCountError {
        model: String,
        filter_key: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Graph
    // -------------------------------------------------------------------------
    GetGraphInit {
        model: String,
        filter_key: String,
    },
    GetGraphSuccess {
        model: String,
        filter_key: String,
        results: Vec<Value>,
        received_at: i64,
    },
    GetGraphError {
        model: String,
        filter_key: String,
        error: StoreError,
    },

    // -------------------------------------------------------------------------
    // Auxiliary partitions
    // -------------------------------------------------------------------------
    GetBalanceSuccess {
        filter_key: String,
        result: Value,
        received_at: i64,
    },
    GetTokenSalesSuccess {
        filter_key: String,
        results: Value,
        received_at: i64,
    },
}

impl Action {
    /// Decodes an action from JSON.
    ///
    /// An unrecognized `kind` is reported as [`StoreError::UnknownAction`];
    /// any other shape problem as [`StoreError::InvalidResponse`].
    pub fn from_json(json: &str) -> StoreResult<Action> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| StoreError::InvalidResponse(format!("action is not JSON: {}", e)))?;

        let kind = value
            .get("kind")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| StoreError::UnknownAction("<missing>".to_string()))?;
        kind.parse::<ActionKind>()?;

        serde_json::from_value(value)
            .map_err(|e| StoreError::InvalidResponse(format!("malformed {} action: {}", kind, e)))
    }

    /// Discriminant of this action.
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::GetInit { .. } => ActionKind::GetInit,
            Action::GetSuccess { .. } => ActionKind::GetSuccess,
            Action::GetError { .. } => ActionKind::GetError,
            Action::GetOneInit { .. } => ActionKind::GetOneInit,
            Action::GetOneSuccess { .. } => ActionKind::GetOneSuccess,
            Action::GetOneError { .. } => ActionKind::GetOneError,
            Action::PostInit { .. } => ActionKind::PostInit,
            Action::PostSuccess { .. } => ActionKind::PostSuccess,
            Action::PostError { .. } => ActionKind::PostError,
            Action::PatchInit { .. } => ActionKind::PatchInit,
            Action::PatchSuccess { .. } => ActionKind::PatchSuccess,
            Action::PatchError { .. } => ActionKind::PatchError,
            Action::GetCountInit { .. } => ActionKind::GetCountInit,
            Action::GetCountSuccess { .. } => ActionKind::GetCountSuccess,
            Action::GetCountError { .. } => ActionKind::GetCountError,
            Action::GetGraphInit { .. } => ActionKind::GetGraphInit,
            Action::GetGraphSuccess { .. } => ActionKind::GetGraphSuccess,
            Action::GetGraphError { .. } => ActionKind::GetGraphError,
            Action::GetBalanceSuccess { .. } => ActionKind::GetBalanceSuccess,
            Action::GetTokenSalesSuccess { .. } => ActionKind::GetTokenSalesSuccess,
        }
    }

    /// Model partition this action targets, `None` for auxiliary actions.
    pub fn model(&self) -> Option<&str> {
        match self {
            Action::GetInit { model, .. }
            | Action::GetSuccess { model, .. }
            | Action::GetError { model, .. }
            | Action::GetOneInit { model, .. }
            | Action::GetOneSuccess { model, .. }
            | Action::GetOneError { model, .. }
            | Action::PostInit { model }
            | Action::PostSuccess { model, .. }
            | Action::PostError { model, .. }
            | Action::PatchInit { model, .. }
            | Action::PatchSuccess { model, .. }
            | Action::PatchError { model, .. }
            | Action::GetCountInit { model, .. }
            | Action::GetCountSuccess { model, .. }
            | Action::GetCountError { model, .. }
            | Action::GetGraphInit { model, .. }
            | Action::GetGraphSuccess { model, .. }
            | Action::GetGraphError { model, .. } => Some(model.as_str()),
            Action::GetBalanceSuccess { .. } | Action::GetTokenSalesSuccess { .. } => None,
        }
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
    fn test_kind_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(kind.as_str().parse::<ActionKind>().unwrap(), kind);
        }
        assert!("FETCH_EVERYTHING".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_serialized_tag_matches_kind_name() {
        let action = Action::GetOneInit {
            model: "booking".into(),
            id: "b1".into(),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "GET_ONE_INIT");
        assert_eq!(action.kind().as_str(), "GET_ONE_INIT");

        let action = Action::GetTokenSalesSuccess {
            filter_key: "__".into(),
            results: json!([]),
            received_at: 0,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["kind"], "GET_TOKEN_SALES_SUCCESS");
    }

    #[test]
    fn test_from_json() {
        let action = Action::from_json(
            r#"{ "kind": "PATCH_SUCCESS", "model": "booking", "id": "b1",
                 "result": { "_id": "b1" }, "received_at": 5 }"#,
        )
        .unwrap();

        assert_eq!(
            action,
            Action::PatchSuccess {
                model: "booking".into(),
                id: "b1".into(),
                result: json!({ "_id": "b1" }),
                filter_key: None,
                result_index: None,
                received_at: 5,
            }
        );
    }

    #[test]
    fn test_from_json_rejects_unknown_kind() {
        let err = Action::from_json(r#"{ "kind": "DELETE_EVERYTHING" }"#).unwrap_err();
        assert_eq!(err, StoreError::UnknownAction("DELETE_EVERYTHING".into()));

        let err = Action::from_json(r#"{ "model": "booking" }"#).unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction(_)));
    }

    #[test]
    fn test_from_json_rejects_malformed_payload() {
        let err = Action::from_json(r#"{ "kind": "GET_INIT" }"#).unwrap_err();
        assert!(matches!(err, StoreError::InvalidResponse(_)));
    }

    #[test]
    fn test_model() {
        let action = Action::PostInit {
            model: "event".into(),
        };
        assert_eq!(action.model(), Some("event"));

        let action = Action::GetBalanceSuccess {
            filter_key: "__".into(),
            result: json!({ "amount": 3 }),
            received_at: 0,
        };
        assert_eq!(action.model(), None);
    }
}
