//! Stored snapshot layout.
//!
//! ```text
//! { "buster": "...", "timestamp": 1715652068434,
//!   "clientState": { "mutations": [], "queries": [ { "state": {...},
//!                    "queryKey": ["config"], "queryHash": "[\"config\"]" } ] } }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::DehydratedQuery;

/// Storage key the snapshot lives under.
pub const OFFLINE_CACHE_KEY: &str = "REACT_QUERY_OFFLINE_CACHE";

/// Dehydrated cache contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DehydratedClient<T> {
    /// Always empty; kept for layout compatibility.
    #[serde(default)]
    pub mutations: Vec<Value>,
    pub queries: Vec<DehydratedQuery<T>>,
}

/// One versioned snapshot of a query client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedClient<T> {
    #[serde(default)]
    pub buster: String,
    /// Milliseconds since the Unix epoch at write time.
    pub timestamp: u64,
    pub client_state: DehydratedClient<T>,
}

impl<T> PersistedClient<T> {
    pub fn new(buster: impl Into<String>, timestamp: u64, queries: Vec<DehydratedQuery<T>>) -> Self {
        Self {
            buster: buster.into(),
            timestamp,
            client_state: DehydratedClient {
                mutations: Vec::new(),
                queries,
            },
        }
    }
}
