//! # Query Filters
//!
//! Query filters, the cache keys derived from them, and the matching rules
//! used to keep cached lists coherent after a write.
//!
//! ## Filter → Key → Partition
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Filter Key Derivation                               │
//! │                                                                         │
//! │  Filter { where: { status: "open" }, limit: 20 }                        │
//! │       │                                                                 │
//! │       ▼  canonical JSON (object keys sorted, recursively)               │
//! │  {"limit":20,"where":{"status":"open"}}                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  by_filter["{\"limit\":20,...}"] = CacheEntry { data: [...], .. }       │
//! │                                                                         │
//! │  No filter at all ───────────► "__"   (sentinel)                        │
//! │  Filter::default() ──────────► "{}"   (match everything)                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Ordering
//! Keys are canonical: two filters with the same fields produce the same key
//! no matter in which order the fields (or nested `where` conditions) were
//! inserted. Callers never have to build filters in a particular order to
//! get cache hits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Cache key used when a fetch is issued without any filter.
pub const NO_FILTER_KEY: &str = "__";

/// Fields consulted, in order, when looking for an entity identifier.
pub const ID_FIELDS: [&str; 2] = ["_id", "id"];

// =============================================================================
// Operators
// =============================================================================

/// Conditional operators understood by the backend search syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    In,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    Exists,
}

impl Operator {
    /// Wire name of the operator (`$in`, `$gt`, ...).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operator::In => "$in",
            Operator::Gt => "$gt",
            Operator::Gte => "$gte",
            Operator::Lt => "$lt",
            Operator::Lte => "$lte",
            Operator::Ne => "$ne",
            Operator::Exists => "$exists",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Filter
// =============================================================================

/// A list query: an optional `where` clause plus paging and sorting.
///
/// ## Example
/// ```rust
/// use atrium_core::filter::{filter_key, Filter, Operator};
///
/// let filter = Filter::new()
///     .where_eq("status", "open")
///     .where_op("start", Operator::Gte, 1_700_000_000_000_i64)
///     .limit(20);
///
/// assert_eq!(
///     filter_key(Some(&filter)),
///     r#"{"limit":20,"where":{"start":{"$gte":1700000000000},"status":"open"}}"#
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field → condition pairs. A condition is either a literal (exact
    /// match) or an operator object such as `{ "$in": [...] }`.
    #[serde(rename = "where", default, skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Map<String, Value>>,

    /// Sort field, `-` prefix for descending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_by: Option<String>,

    /// Page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
}

impl Filter {
    /// An empty filter. Matches every record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match condition.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_clause
            .get_or_insert_with(Map::new)
            .insert(field.into(), value.into());
        self
    }

    /// Adds an operator condition. Several operators on the same field are
    /// merged into one condition object (e.g. a `$gte`/`$lt` range).
    pub fn where_op(
        mut self,
        field: impl Into<String>,
        op: Operator,
        value: impl Into<Value>,
    ) -> Self {
        let clause = self.where_clause.get_or_insert_with(Map::new);
        let condition = clause
            .entry(field.into())
            .or_insert_with(|| Value::Object(Map::new()));

        if !condition.is_object() {
            *condition = Value::Object(Map::new());
        }
        if let Value::Object(ops) = condition {
            ops.insert(op.as_str().to_string(), value.into());
        }
        self
    }

    /// Sets the sort field.
    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_by = Some(field.into());
        self
    }

    /// Sets the page size.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets the page number.
    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Returns true if `entity` satisfies this filter's `where` clause.
    ///
    /// Each condition is compared by exact equality against the entity's
    /// field of the same name. A filter without a `where` clause, or with an
    /// empty one, matches everything. Operator conditions never match a
    /// literal field value, so entities are only inserted into lists whose
    /// membership can be decided locally.
    pub fn matches(&self, entity: &Value) -> bool {
        let Some(clause) = &self.where_clause else {
            return true;
        };

        clause
            .iter()
            .all(|(field, expected)| entity.get(field) == Some(expected))
    }
}

// =============================================================================
// Key Derivation
// =============================================================================

/// Derives the cache key for a filter.
///
/// `None` maps to [`NO_FILTER_KEY`]; anything else to its canonical JSON.
pub fn filter_key(filter: Option<&Filter>) -> String {
    match filter {
        None => NO_FILTER_KEY.to_string(),
        Some(filter) => canonicalize(&filter_value(filter)).to_string(),
    }
}

/// The filter as a JSON object, field for field like its serde form.
fn filter_value(filter: &Filter) -> Value {
    let mut object = Map::new();
    if let Some(clause) = &filter.where_clause {
        object.insert("where".to_string(), Value::Object(clause.clone()));
    }
    if let Some(sort_by) = &filter.sort_by {
        object.insert("sort_by".to_string(), Value::from(sort_by.as_str()));
    }
    if let Some(limit) = filter.limit {
        object.insert("limit".to_string(), Value::from(limit));
    }
    if let Some(page) = filter.page {
        object.insert("page".to_string(), Value::from(page));
    }
    Value::Object(object)
}

/// Parses a cache key back into a filter.
///
/// Returns `None` for the sentinel key and for keys that are not a JSON
/// filter object.
pub fn parse_filter_key(key: &str) -> Option<Filter> {
    if key == NO_FILTER_KEY {
        return None;
    }
    serde_json::from_str(key).ok()
}

/// Encodes a `where` clause for the `where=` query parameter.
pub fn format_search(clause: &Map<String, Value>) -> String {
    canonicalize(&Value::Object(clause.clone())).to_string()
}

/// Rebuilds a JSON value with every object's keys in sorted order.
///
/// Independent of whether `serde_json` keeps insertion order, the result
/// serializes identically for equal inputs.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// =============================================================================
// Entity Identity
// =============================================================================

/// Extracts an entity's identifier, looking at `_id` then `id`.
///
/// String and integer identifiers are accepted; empty strings are not.
pub fn entity_id(entity: &Value) -> Option<String> {
    ID_FIELDS.iter().find_map(|field| match entity.get(field)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
